//! Concurrent registry of live client sessions.
//!
//! Inserted into by the accept loop, removed from by each connection's own
//! read loop, and snapshot-iterated by broadcast senders. The `RwLock`
//! guarantees a broadcast never observes a half-removed session, and
//! `remove` returning `None` on a second call keeps teardown exactly-once.

use std::collections::HashMap;
use std::sync::Arc;

use crosspoint_core::ConnectionId;
use tokio::sync::RwLock;

use crate::session::ClientSession;

/// The set of all live client sessions.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Arc<ClientSession>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a session under its connection ID.
    pub async fn insert(&self, session: Arc<ClientSession>) {
        let mut conns = self.connections.write().await;
        let _ = conns.insert(session.id.clone(), session);
    }

    /// Remove a session; `None` if it was already removed.
    pub async fn remove(&self, id: &ConnectionId) -> Option<Arc<ClientSession>> {
        let mut conns = self.connections.write().await;
        conns.remove(id)
    }

    /// Look up a session by connection ID.
    pub async fn get(&self, id: &ConnectionId) -> Option<Arc<ClientSession>> {
        let conns = self.connections.read().await;
        conns.get(id).cloned()
    }

    /// Number of live sessions.
    pub async fn count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// IDs of all live sessions.
    pub async fn ids(&self) -> Vec<ConnectionId> {
        let conns = self.connections.read().await;
        conns.keys().cloned().collect()
    }

    /// Snapshot of all live sessions, for broadcast iteration.
    ///
    /// The snapshot is taken atomically; sessions removed afterwards simply
    /// fail their write, which the sender handles per-session.
    pub async fn sessions(&self) -> Vec<Arc<ClientSession>> {
        let conns = self.connections.read().await;
        conns.values().cloned().collect()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::{TcpListener, TcpStream};

    async fn make_session() -> (Arc<ClientSession>, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (accepted, peer) = tokio::join!(listener.accept(), TcpStream::connect(addr));
        let (stream, _) = accepted.unwrap();
        let remote = stream.peer_addr().unwrap();
        let (_read, write) = stream.into_split();
        (
            Arc::new(ClientSession::new(ConnectionId::new(), remote, write, 1024)),
            peer.unwrap(),
        )
    }

    #[tokio::test]
    async fn insert_and_count() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.count().await, 0);

        let (s1, _p1) = make_session().await;
        let (s2, _p2) = make_session().await;
        registry.insert(s1).await;
        assert_eq!(registry.count().await, 1);
        registry.insert(s2).await;
        assert_eq!(registry.count().await, 2);
    }

    #[tokio::test]
    async fn remove_returns_the_session_once() {
        let registry = ConnectionRegistry::new();
        let (session, _peer) = make_session().await;
        let id = session.id.clone();
        registry.insert(session).await;

        assert!(registry.remove(&id).await.is_some());
        assert!(registry.remove(&id).await.is_none());
        assert_eq!(registry.count().await, 0);
    }

    #[tokio::test]
    async fn remove_unknown_id_is_none() {
        let registry = ConnectionRegistry::new();
        assert!(registry.remove(&ConnectionId::from("ghost")).await.is_none());
    }

    #[tokio::test]
    async fn get_finds_live_sessions_only() {
        let registry = ConnectionRegistry::new();
        let (session, _peer) = make_session().await;
        let id = session.id.clone();
        registry.insert(session).await;

        assert!(registry.get(&id).await.is_some());
        let _ = registry.remove(&id).await;
        assert!(registry.get(&id).await.is_none());
    }

    #[tokio::test]
    async fn ids_and_sessions_agree() {
        let registry = ConnectionRegistry::new();
        let (s1, _p1) = make_session().await;
        let (s2, _p2) = make_session().await;
        let expected: Vec<ConnectionId> = vec![s1.id.clone(), s2.id.clone()];
        registry.insert(s1).await;
        registry.insert(s2).await;

        let mut ids = registry.ids().await;
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        let mut expected = expected;
        expected.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        assert_eq!(ids, expected);
        assert_eq!(registry.sessions().await.len(), 2);
    }

    #[tokio::test]
    async fn concurrent_removal_during_snapshots() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut peers = Vec::new();
        let mut ids = Vec::new();
        for _ in 0..16 {
            let (session, peer) = make_session().await;
            ids.push(session.id.clone());
            peers.push(peer);
            registry.insert(session).await;
        }

        let snapshotter = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                for _ in 0..100 {
                    let _ = registry.sessions().await;
                    let _ = registry.count().await;
                }
            })
        };
        let remover = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                for id in &ids[..8] {
                    let _ = registry.remove(id).await;
                }
            })
        };

        snapshotter.await.unwrap();
        remover.await.unwrap();
        assert_eq!(registry.count().await, 8);
    }
}
