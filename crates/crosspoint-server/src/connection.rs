//! Per-connection read loop — decode, dispatch, teardown.

use std::sync::Arc;

use bytes::Bytes;
use crosspoint_core::codec;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::events::JoinEvent;
use crate::registry::ConnectionRegistry;
use crate::session::ClientSession;

/// Run the read loop for one connected client.
///
/// Reads await on the socket with no timeout; disconnection is detected by
/// a zero-byte read or an I/O error, either of which tears this connection
/// down without touching any other. Each read is decoded as one frame; the
/// decoded event (if any) is dispatched first, then the raw-data event, and
/// the next read does not begin until both are sent.
#[instrument(skip_all, fields(connection = %session.id, peer = %session.peer))]
pub async fn run_connection(
    session: Arc<ClientSession>,
    mut reader: OwnedReadHalf,
    registry: Arc<ConnectionRegistry>,
    events: broadcast::Sender<JoinEvent>,
    read_buffer_size: usize,
    cancel: CancellationToken,
) {
    let mut buf = vec![0u8; read_buffer_size];

    loop {
        let n = tokio::select! {
            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    info!("client closed the connection");
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    warn!(error = %e, "socket read failed");
                    break;
                }
            },
            () = cancel.cancelled() => {
                debug!("connection loop cancelled");
                break;
            }
        };

        let frame = &buf[..n];
        if let Some(message) = codec::decode(frame) {
            debug!(kind = message.kind(), join = %message.join(), "frame decoded");
            let _ = events.send(JoinEvent::from(message));
        }
        let _ = events.send(JoinEvent::Raw {
            connection: session.id.clone(),
            data: Bytes::copy_from_slice(frame),
            len: n,
        });
    }

    disconnect(&registry, &session).await;
}

/// Remove the session from the registry and close its socket.
///
/// Safe to call from the loop's own failure path and from broadcast
/// senders; the registry removal happens at most once.
pub(crate) async fn disconnect(registry: &ConnectionRegistry, session: &ClientSession) {
    if registry.remove(&session.id).await.is_some() {
        session.shutdown().await;
        info!(connection = %session.id, peer = %session.peer, "client disconnected");
    }
}
