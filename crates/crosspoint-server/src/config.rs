//! Server configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the Crosspoint server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `16384`; `0` auto-assigns, for tests).
    pub port: u16,
    /// Per-connection read buffer size in bytes.
    pub read_buffer_size: usize,
    /// Per-connection write (accumulation) buffer capacity in bytes.
    pub write_buffer_size: usize,
    /// Capacity of the decoded-event broadcast channel.
    pub event_capacity: usize,
}

impl ServerConfig {
    /// The `host:port` string handed to the listener.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 16384,
            read_buffer_size: 1024,
            write_buffer_size: 1024,
            event_capacity: 256,
        }
    }
}
