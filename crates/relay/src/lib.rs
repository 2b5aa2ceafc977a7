//! TunnelGate Relay
//!
//! Everything between "header line received" and "tunnel torn down":
//! memoized token resolution and the bidirectional byte pipe.

mod cache;
mod pipe;
mod resolver;

pub use cache::AddressCache;
pub use pipe::{relay, DirectionReport, RelayError, RelayReport};
pub use resolver::{Resolution, Resolver};
