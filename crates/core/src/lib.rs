//! TunnelGate Core Types
//!
//! Types and defaults shared by every TunnelGate crate: the wire token a
//! client sends, the destination address it decodes to, and the errors raised
//! while validating that address.

mod config;
mod error;
mod types;

pub use config::*;
pub use error::*;
pub use types::*;
