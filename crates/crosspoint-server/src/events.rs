//! Join events dispatched to subscribers.
//!
//! Collaborators call [`crate::CrosspointServer::subscribe`] and drain a
//! `tokio::sync::broadcast` receiver. Events for one connection arrive in
//! read order; events from different connections interleave arbitrarily.

use bytes::Bytes;
use crosspoint_core::{ConnectionId, JoinMessage, JoinNumber};

/// An event fanned out to subscribers.
///
/// The first three variants mirror the decoded message kinds. `Raw` fires
/// for every read, regardless of decode outcome, carrying the bytes and the
/// originating connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JoinEvent {
    /// A digital join state was received.
    Digital {
        /// The addressed join.
        join: JoinNumber,
        /// Decoded logical state.
        value: bool,
    },
    /// An analog join value was received.
    Analog {
        /// The addressed join.
        join: JoinNumber,
        /// Decoded 16-bit value.
        value: u16,
    },
    /// A serial join string was received.
    Serial {
        /// The addressed join.
        join: JoinNumber,
        /// Decoded text.
        text: String,
    },
    /// Raw bytes from one socket read.
    Raw {
        /// Connection the bytes arrived on.
        connection: ConnectionId,
        /// The bytes of this read.
        data: Bytes,
        /// Byte count of this read.
        len: usize,
    },
}

impl JoinEvent {
    /// Event kind as a static string, for structured logging.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Digital { .. } => "digital",
            Self::Analog { .. } => "analog",
            Self::Serial { .. } => "serial",
            Self::Raw { .. } => "raw",
        }
    }
}

impl From<JoinMessage> for JoinEvent {
    fn from(message: JoinMessage) -> Self {
        match message {
            JoinMessage::Digital { join, value } => Self::Digital { join, value },
            JoinMessage::Analog { join, value } => Self::Analog { join, value },
            JoinMessage::Serial { join, text } => Self::Serial { join, text },
        }
    }
}
