//! `CrosspointServer` — accept loop, lifecycle, and the feedback-send API.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crosspoint_core::{ConnectionId, JoinNumber, codec};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::ServerConfig;
use crate::connection::{self, run_connection};
use crate::error::ServerError;
use crate::events::JoinEvent;
use crate::registry::ConnectionRegistry;
use crate::session::ClientSession;

/// The Crosspoint TCP join server.
///
/// Owns the connection registry and the event broadcast channel. `start`
/// spawns the accept loop on its own task; every accepted connection gets a
/// dedicated read-loop task, so a stalled client never blocks the others.
pub struct CrosspointServer {
    config: ServerConfig,
    registry: Arc<ConnectionRegistry>,
    events: broadcast::Sender<JoinEvent>,
    cancel: CancellationToken,
    started: AtomicBool,
    local_addr: OnceLock<SocketAddr>,
}

impl CrosspointServer {
    /// Create a new server with the given configuration.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity);
        Self {
            config,
            registry: Arc::new(ConnectionRegistry::new()),
            events,
            cancel: CancellationToken::new(),
            started: AtomicBool::new(false),
            local_addr: OnceLock::new(),
        }
    }

    /// Subscribe to decoded join events and raw reads.
    ///
    /// Events for one connection arrive in read order; events from
    /// different connections interleave arbitrarily.
    pub fn subscribe(&self) -> broadcast::Receiver<JoinEvent> {
        self.events.subscribe()
    }

    /// Bind the configured address and begin accepting connections.
    ///
    /// Returns the bound address (useful with port `0`). Calling `start` a
    /// second time returns [`ServerError::AlreadyStarted`].
    pub async fn start(&self) -> Result<SocketAddr, ServerError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ServerError::AlreadyStarted);
        }

        let addr = self.config.bind_addr();
        let listener = match TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(source) => {
                self.started.store(false, Ordering::SeqCst);
                return Err(ServerError::Bind { addr, source });
            }
        };
        let local = match listener.local_addr() {
            Ok(local) => local,
            Err(source) => {
                self.started.store(false, Ordering::SeqCst);
                return Err(ServerError::Bind { addr, source });
            }
        };
        let _ = self.local_addr.set(local);
        info!(addr = %local, "server listening");

        let _ = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&self.registry),
            self.events.clone(),
            self.cancel.clone(),
            self.config.read_buffer_size,
            self.config.write_buffer_size,
        ));
        Ok(local)
    }

    /// Stop accepting connections and tear down every live connection.
    ///
    /// Idempotent; takes effect at each loop's next poll.
    pub fn stop(&self) {
        if self.is_running() {
            info!("server stopping");
        }
        self.cancel.cancel();
    }

    /// Whether the server has been started and not yet stopped.
    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.cancel.is_cancelled()
    }

    /// The address the listener bound, once `start` has succeeded.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// Number of currently connected clients.
    pub async fn connected_count(&self) -> usize {
        self.registry.count().await
    }

    /// IDs of the currently connected clients.
    pub async fn connected_clients(&self) -> Vec<ConnectionId> {
        self.registry.ids().await
    }

    /// Encode and broadcast a digital feedback frame to every client.
    pub async fn send_digital_feedback(&self, join: JoinNumber, value: bool) {
        self.broadcast_frame(&codec::encode_digital_feedback(join, value))
            .await;
    }

    /// Encode and broadcast an analog feedback frame to every client.
    pub async fn send_analog_feedback(&self, join: JoinNumber, value: u16) {
        self.broadcast_frame(&codec::encode_analog_feedback(join, value))
            .await;
    }

    /// Encode and broadcast a serial feedback frame to every client.
    pub async fn send_serial_feedback(&self, join: JoinNumber, text: &str) {
        self.broadcast_frame(&codec::encode_serial_feedback(join, text))
            .await;
    }

    /// Broadcast an already-encoded frame to every client.
    pub async fn send_raw_to_all(&self, frame: &[u8]) {
        self.broadcast_frame(frame).await;
    }

    /// Send an already-encoded frame to one client.
    ///
    /// A no-op if the connection is gone; a write failure drops that
    /// client. Neither case reaches the caller.
    pub async fn send_raw_to(&self, connection: &ConnectionId, frame: &[u8]) {
        let Some(session) = self.registry.get(connection).await else {
            debug!(%connection, "send target is gone, skipping");
            return;
        };
        if let Err(e) = session.send_now(frame).await {
            warn!(%connection, error = %e, "targeted write failed, dropping client");
            connection::disconnect(&self.registry, &session).await;
        }
    }

    /// Append a frame to every session's buffer and flush each immediately.
    ///
    /// Failures are per-session: the failing client is disconnected and the
    /// broadcast continues with the rest.
    async fn broadcast_frame(&self, frame: &[u8]) {
        let sessions = self.registry.sessions().await;
        debug!(recipients = sessions.len(), len = frame.len(), "broadcasting frame");
        for session in sessions {
            if let Err(e) = session.send_now(frame).await {
                warn!(connection = %session.id, error = %e, "broadcast write failed, dropping client");
                connection::disconnect(&self.registry, &session).await;
            }
        }
    }
}

/// Accept connections until cancelled or the listener fails.
///
/// Accept failure is fatal to the server: it is logged and the loop exits
/// without retrying. Live connections are unaffected.
#[instrument(skip_all)]
async fn accept_loop(
    listener: TcpListener,
    registry: Arc<ConnectionRegistry>,
    events: broadcast::Sender<JoinEvent>,
    cancel: CancellationToken,
    read_buffer_size: usize,
    write_buffer_size: usize,
) {
    loop {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            () = cancel.cancelled() => {
                info!("accept loop cancelled");
                break;
            }
        };

        match accepted {
            Ok((stream, peer)) => {
                let (reader, writer) = stream.into_split();
                let session = Arc::new(ClientSession::new(
                    ConnectionId::new(),
                    peer,
                    writer,
                    write_buffer_size,
                ));
                info!(connection = %session.id, %peer, "client connected");
                registry.insert(Arc::clone(&session)).await;
                let _ = tokio::spawn(run_connection(
                    session,
                    reader,
                    Arc::clone(&registry),
                    events.clone(),
                    read_buffer_size,
                    cancel.clone(),
                ));
            }
            Err(e) => {
                error!(error = %e, "accept failed, shutting down accept loop");
                break;
            }
        }
    }
}
