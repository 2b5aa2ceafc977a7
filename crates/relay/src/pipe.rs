//! Bidirectional byte relay
//!
//! Each direction is copied by its own task. When a direction's source is
//! exhausted (or fails) the write side it was feeding is shut down, so the
//! half-close reaches the peer and the opposite direction can drain on its own.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinError;
use tracing::{trace, warn};

/// Copy buffer per direction
const RELAY_BUF_SIZE: usize = 16 * 1024;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Read failed: {0}")]
    Read(std::io::Error),

    #[error("Write failed: {0}")]
    Write(std::io::Error),

    #[error("Relay task panicked")]
    Panicked,

    #[error("Relay task cancelled")]
    Cancelled,
}

/// How one direction of the tunnel ended
#[derive(Debug, Default)]
pub struct DirectionReport {
    /// Bytes successfully written to the destination side
    pub bytes: u64,
    /// `None` when the source reached EOF cleanly
    pub error: Option<RelayError>,
}

impl DirectionReport {
    pub fn is_clean(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of a finished relay
#[derive(Debug, Default)]
pub struct RelayReport {
    pub a_to_b: DirectionReport,
    pub b_to_a: DirectionReport,
}

impl RelayReport {
    pub fn is_clean(&self) -> bool {
        self.a_to_b.is_clean() && self.b_to_a.is_clean()
    }
}

/// Pipe bytes between `a` and `b` until both directions have terminated.
///
/// A failure in one direction does not cancel the other. Both streams are
/// owned by the relay for its duration and are closed when it returns.
pub async fn relay<A, B>(a: A, b: B) -> RelayReport
where
    A: AsyncRead + AsyncWrite + Send + 'static,
    B: AsyncRead + AsyncWrite + Send + 'static,
{
    let (a_reader, a_writer) = tokio::io::split(a);
    let (b_reader, b_writer) = tokio::io::split(b);

    let a_to_b = tokio::spawn(copy_half(a_reader, b_writer));
    let b_to_a = tokio::spawn(copy_half(b_reader, a_writer));

    let (a_to_b, b_to_a) = tokio::join!(a_to_b, b_to_a);

    RelayReport {
        a_to_b: settle(a_to_b),
        b_to_a: settle(b_to_a),
    }
}

async fn copy_half<R, W>(mut reader: R, mut writer: W) -> DirectionReport
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut report = DirectionReport::default();
    let mut buf = vec![0u8; RELAY_BUF_SIZE];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                report.error = Some(RelayError::Read(e));
                break;
            }
        };

        if let Err(e) = writer.write_all(&buf[..n]).await {
            report.error = Some(RelayError::Write(e));
            break;
        }
        report.bytes += n as u64;
    }

    // Peer may already be gone; nothing useful to do with a shutdown error
    if let Err(e) = writer.shutdown().await {
        trace!("Half-close after relay failed: {}", e);
    }

    report
}

fn settle(joined: Result<DirectionReport, JoinError>) -> DirectionReport {
    match joined {
        Ok(report) => report,
        Err(e) if e.is_panic() => {
            warn!("Relay direction panicked: {}", e);
            DirectionReport {
                bytes: 0,
                error: Some(RelayError::Panicked),
            }
        }
        Err(_) => DirectionReport {
            bytes: 0,
            error: Some(RelayError::Cancelled),
        },
    }
}
