//! One direction of the relay: copy a source into a sink.

use std::fmt;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::TunnelError;

/// Copy buffer size per read.
pub const COPY_BUF_LEN: usize = 32 * 1024;

/// Which way bytes flow through a relay loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Local input into the remote stream.
    LocalToRemote,
    /// Remote stream into the local output.
    RemoteToLocal,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalToRemote => f.write_str("local->remote"),
            Self::RemoteToLocal => f.write_str("remote->local"),
        }
    }
}

/// Why a loop stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpExit {
    /// The source reported end of input and the sink was shut down.
    Eof,
    /// The shared token was cancelled.
    Cancelled,
}

/// Summary of a loop that ended without an I/O error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpReport {
    pub direction: Direction,
    pub bytes: u64,
    pub exit: PumpExit,
}

/// Copy `src` into `dst` until EOF, an I/O error, or cancellation.
///
/// Every chunk is flushed as soon as it is written. On EOF the sink is shut
/// down so the far side sees end of input too. Cancellation is checked at
/// every read, write and shutdown; an operation interrupted by it is dropped.
pub async fn pump<R, W>(
    direction: Direction,
    mut src: R,
    mut dst: W,
    cancel: CancellationToken,
) -> Result<PumpReport, TunnelError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; COPY_BUF_LEN];
    let mut bytes: u64 = 0;
    let report = |bytes, exit| PumpReport {
        direction,
        bytes,
        exit,
    };

    loop {
        let n = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(report(bytes, PumpExit::Cancelled)),
            read = src.read(&mut buf) => read.map_err(|e| TunnelError::relay(direction, e))?,
        };

        if n == 0 {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(report(bytes, PumpExit::Cancelled)),
                shut = dst.shutdown() => shut.map_err(|e| TunnelError::relay(direction, e))?,
            }
            debug!(%direction, bytes, "Source reached EOF");
            return Ok(report(bytes, PumpExit::Eof));
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(report(bytes, PumpExit::Cancelled)),
            written = write_chunk(&mut dst, &buf[..n]) => {
                written.map_err(|e| TunnelError::relay(direction, e))?;
            }
        }
        bytes += n as u64;
    }
}

async fn write_chunk<W: AsyncWrite + Unpin>(dst: &mut W, chunk: &[u8]) -> std::io::Result<()> {
    dst.write_all(chunk).await?;
    dst.flush().await
}
