//! # crosspoint-core
//!
//! Foundation types for the Crosspoint join protocol.
//!
//! This crate provides the shared vocabulary the server crate builds on:
//!
//! - **Join numbers**: [`JoinNumber`] — the 1-based, 10-bit control-point address
//! - **Branded IDs**: [`ConnectionId`] newtype naming one live client connection
//! - **Codec**: pure encode/decode between raw byte frames and [`JoinMessage`]s
//! - **Errors**: [`ProtocolError`] via `thiserror`
//!
//! Everything here is pure — no I/O, no async, no state.

#![deny(unsafe_code)]

pub mod codec;
pub mod errors;
pub mod ids;
pub mod joins;

pub use codec::JoinMessage;
pub use errors::ProtocolError;
pub use ids::ConnectionId;
pub use joins::JoinNumber;
