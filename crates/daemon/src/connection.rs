//! Per-connection tunnel setup
//!
//! Accept → read header → resolve → dial → relay → close. Any failure before
//! the relay starts ends the connection without sending anything back.

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use tunnelgate_core::{DestinationAddress, WireToken};
use tunnelgate_crypto::DecodeError;
use tunnelgate_relay::{relay, RelayReport};

use crate::server::Shared;

/// Step a timeout fired in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Header,
    Dial,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Header => f.write_str("header read"),
            Stage::Dial => f.write_str("backend dial"),
        }
    }
}

/// Which side of the tunnel a failure is blamed on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Bad or missing header from the client
    Protocol,
    /// Backend unreachable
    Backend,
}

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Client closed before sending a header")]
    MissingHeader,

    #[error("Header line exceeds {limit} bytes")]
    HeaderTooLong { limit: usize },

    #[error("Client closed mid-header after {len} bytes")]
    IncompleteHeader { len: usize },

    #[error("Failed to read header: {0}")]
    HeaderRead(std::io::Error),

    #[error("Timed out during {0}")]
    Timeout(Stage),

    #[error("Invalid token: {0}")]
    Decode(#[from] DecodeError),

    #[error("Failed to connect to {address}: {source}")]
    Dial {
        address: DestinationAddress,
        source: std::io::Error,
    },
}

impl ConnectionError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ConnectionError::Dial { .. } | ConnectionError::Timeout(Stage::Dial) => {
                FailureKind::Backend
            }
            _ => FailureKind::Protocol,
        }
    }
}

/// Drive one accepted connection to completion.
///
/// Returns once both relay directions are finished; both sockets are closed
/// by then.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    conn_id: u64,
    shared: &Shared,
) -> Result<RelayReport, ConnectionError> {
    set_nodelay(&stream);

    // The client keeps its BufReader so bytes sent right after the header
    // line are relayed rather than dropped
    let mut client = BufReader::new(stream);
    let max_len = shared.config.max_header_len;
    let token = with_timeout(
        shared.config.header_timeout,
        Stage::Header,
        read_header(&mut client, max_len),
    )
    .await?;

    let resolution = shared.resolver.resolve(&token)?;
    if resolution.cached {
        shared.stats.cache_hit();
    }
    let address = resolution.address;
    debug!(
        "Conn {} from {}: token {} -> {}{}",
        conn_id,
        peer,
        token.fingerprint(),
        address,
        if resolution.cached { " (cached)" } else { "" }
    );

    let backend = with_timeout(shared.config.dial_timeout, Stage::Dial, async {
        TcpStream::connect(address.as_str())
            .await
            .map_err(|source| ConnectionError::Dial {
                address: address.clone(),
                source,
            })
    })
    .await?;
    set_nodelay(&backend);

    debug!("Conn {}: tunnel to {} established", conn_id, address);
    Ok(relay(client, backend).await)
}

/// Read the header line, terminator stripped.
///
/// At most `max_len` bytes are consumed, newline included. A trailing `\r`
/// is stripped along with the `\n`.
pub(crate) async fn read_header<R>(
    reader: &mut R,
    max_len: usize,
) -> Result<WireToken, ConnectionError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::with_capacity(256.min(max_len));
    let mut limited = reader.take(max_len as u64);
    let n = limited
        .read_until(b'\n', &mut line)
        .await
        .map_err(ConnectionError::HeaderRead)?;

    if n == 0 {
        return Err(ConnectionError::MissingHeader);
    }
    if line.last() != Some(&b'\n') {
        return Err(if n >= max_len {
            ConnectionError::HeaderTooLong { limit: max_len }
        } else {
            ConnectionError::IncompleteHeader { len: n }
        });
    }

    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Ok(WireToken::new(line))
}

async fn with_timeout<T, F>(
    limit: Option<Duration>,
    stage: Stage,
    fut: F,
) -> Result<T, ConnectionError>
where
    F: Future<Output = Result<T, ConnectionError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| ConnectionError::Timeout(stage))?,
        None => fut.await,
    }
}

fn set_nodelay(stream: &TcpStream) {
    if let Err(e) = stream.set_nodelay(true) {
        trace!("Failed to set TCP_NODELAY: {}", e);
    }
}
