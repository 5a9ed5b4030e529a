//! # crosspoint-server
//!
//! TCP join server — connection lifecycle, buffered per-client sessions,
//! and event broadcasting.
//!
//! - One task per client connection plus one for the accept loop
//! - Binary join codec from `crosspoint-core`; no wire framing — one socket
//!   read is one frame
//! - Decoded events fanned out via `tokio::sync::broadcast`
//! - Feedback sends encode once and broadcast-write to every session
//! - `stop()` via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod logging;
pub mod registry;
pub mod server;
pub mod session;

pub use config::ServerConfig;
pub use error::ServerError;
pub use events::JoinEvent;
pub use server::CrosspointServer;
