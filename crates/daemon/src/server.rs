//! Listener loop
//!
//! One supervised task per accepted connection. Connection failures, panics
//! included, stop at the task boundary. Running out of descriptors or a peer
//! aborting mid-handshake pauses the loop; any other `accept` error ends it.

use std::any::Any;
use std::io;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use tunnelgate_core::DEFAULT_MAX_HEADER_LEN;
use tunnelgate_crypto::TokenCodec;
use tunnelgate_relay::{AddressCache, Resolver};
use tunnelgate_settings::Settings;

use crate::connection::handle_connection;
use crate::{DaemonError, FailureKind, Result, ServerStats};

/// Pause after a transient accept error, giving connections time to close
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Per-connection limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub max_header_len: usize,
    pub header_timeout: Option<Duration>,
    pub dial_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_header_len: DEFAULT_MAX_HEADER_LEN,
            header_timeout: None,
            dial_timeout: None,
        }
    }
}

impl From<&Settings> for ServerConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            max_header_len: settings.max_header_len,
            header_timeout: settings.header_timeout(),
            dial_timeout: settings.dial_timeout(),
        }
    }
}

/// State shared by every connection task
pub(crate) struct Shared {
    pub(crate) resolver: Resolver,
    pub(crate) config: ServerConfig,
    pub(crate) stats: ServerStats,
}

/// TCP tunnel endpoint
pub struct TunnelServer {
    listener: TcpListener,
    shared: Arc<Shared>,
}

impl TunnelServer {
    /// Bind `addr` and serve tunnels resolved through `resolver`
    pub async fn bind(addr: SocketAddr, config: ServerConfig, resolver: Resolver) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| DaemonError::Bind { addr, source })?;
        Ok(Self::from_listener(listener, config, resolver))
    }

    /// Build everything (cache, resolver, listener) from loaded settings
    pub async fn from_settings(settings: &Settings, codec: TokenCodec) -> Result<Self> {
        let cache = Arc::new(AddressCache::with_max_entries(settings.max_cache_entries));
        let resolver = Resolver::new(cache, Arc::new(codec));
        Self::bind(settings.listen_addr, ServerConfig::from(settings), resolver).await
    }

    pub fn from_listener(listener: TcpListener, config: ServerConfig, resolver: Resolver) -> Self {
        Self {
            listener,
            shared: Arc::new(Shared {
                resolver,
                config,
                stats: ServerStats::new(),
            }),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn stats(&self) -> ServerStats {
        self.shared.stats.clone()
    }

    /// Accept connections until the listener fails.
    ///
    /// Never returns `Ok`. Descriptor exhaustion and aborted handshakes are
    /// logged and retried after a short pause; any other error is returned.
    pub async fn run(self) -> Result<()> {
        if let Ok(addr) = self.listener.local_addr() {
            info!("Tunnel server listening on {}", addr);
        }

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) if is_transient_accept_error(&e) => {
                    self.shared.stats.accept_failed();
                    warn!("Accept failed, still listening: {}", e);
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                    continue;
                }
                Err(e) => {
                    error!("Accept failed: {}", e);
                    return Err(DaemonError::Accept(e));
                }
            };

            let shared = self.shared.clone();
            tokio::spawn(supervise(stream, peer, shared));
        }
    }
}

/// Run one connection, turning every outcome (panics included) into a log
/// line and a stats update
async fn supervise(stream: TcpStream, peer: SocketAddr, shared: Arc<Shared>) {
    let conn_id = shared.stats.connection_opened();
    debug!("Conn {} accepted from {}", conn_id, peer);

    let outcome = AssertUnwindSafe(handle_connection(stream, peer, conn_id, &shared))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(report)) => {
            shared.stats.relay_finished(&report);
            debug!(
                "Conn {} closed: {} bytes up, {} bytes down",
                conn_id, report.a_to_b.bytes, report.b_to_a.bytes
            );
            if let Some(e) = &report.a_to_b.error {
                debug!("Conn {} client -> backend ended with error: {}", conn_id, e);
            }
            if let Some(e) = &report.b_to_a.error {
                debug!("Conn {} backend -> client ended with error: {}", conn_id, e);
            }
        }
        Ok(Err(e)) => {
            shared.stats.connection_failed(e.kind());
            match e.kind() {
                FailureKind::Protocol => warn!("Conn {} from {} rejected: {}", conn_id, peer, e),
                FailureKind::Backend => warn!("Conn {} from {}: {}", conn_id, peer, e),
            }
        }
        Err(panic) => {
            shared.stats.connection_panicked();
            error!("Conn {} panicked: {}", conn_id, panic_message(&*panic));
        }
    }

    shared.stats.connection_closed();
}

/// Accept errors that leave the listener usable: descriptor or buffer
/// exhaustion, and peers that gave up before the handshake finished
fn is_transient_accept_error(e: &io::Error) -> bool {
    if matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    ) {
        return true;
    }

    #[cfg(unix)]
    if let Some(code) = e.raw_os_error() {
        return matches!(
            code,
            libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM
        );
    }

    false
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
