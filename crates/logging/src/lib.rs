//! TunnelGate Logging
//!
//! Installs the global `tracing` subscriber. `RUST_LOG` wins when set;
//! otherwise the default filter is used.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "info,tunnelgate=debug";

/// Filter used when `RUST_LOG` is not set and verbose output was requested
pub const VERBOSE_FILTER: &str = "debug";

/// Pick the filter directives for the given verbosity
pub fn filter_for(verbose: bool) -> EnvFilter {
    let fallback = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Install the global subscriber. Calling it twice is a no-op.
pub fn init(verbose: bool) {
    let installed = tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter_for(verbose))
        .try_init();

    if installed.is_ok() {
        tracing::debug!("Logging initialised (verbose: {})", verbose);
    }
}
