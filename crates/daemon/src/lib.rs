//! TunnelGate Daemon
//!
//! The relay process: accepts TCP connections, reads the one-line token
//! header, resolves it to a backend and pipes bytes until both sides close.
//!
//! ## Components
//!
//! - **TunnelServer**: listener loop, one supervised task per connection
//! - **ServerStats**: connection, failure and byte counters
//! - **raise_fd_limit**: startup bump of the open-file limit

mod connection;
mod limits;
mod server;
mod stats;

pub use connection::{ConnectionError, FailureKind, Stage};
pub use limits::raise_fd_limit;
pub use server::{ServerConfig, TunnelServer};
pub use stats::{ServerStats, StatsSnapshot};

use std::net::SocketAddr;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("Accept failed: {0}")]
    Accept(std::io::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DaemonError>;
