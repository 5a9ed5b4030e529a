//! Error types for the join protocol.

use thiserror::Error;

/// Protocol-level validation errors.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Join number outside the addressable 10-bit space.
    #[error("join number {join} is outside the valid range 1..=1024")]
    JoinOutOfRange {
        /// The rejected value.
        join: u16,
    },
}
