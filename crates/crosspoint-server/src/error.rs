//! Server error types.
//!
//! The surface is deliberately small: broadcast sends never propagate I/O
//! errors to their caller (a failing client is dropped instead), so only
//! the lifecycle operations carry typed failures.

use std::io;

use thiserror::Error;

/// Errors surfaced by server lifecycle operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not bind the configured address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that failed to bind.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// `start` was called on a server that is already running.
    #[error("server already started")]
    AlreadyStarted,
}
