//! Transport seam between the tunnel lifecycle and the QUIC library.
//!
//! The tunnel only needs three things from a transport: dial a session, open
//! one bidirectional stream on it, and close it. [`quic`] provides the real
//! implementation on top of `quinn`.

pub mod quic;

use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

use crate::error::TunnelError;
use crate::tls::TlsPolicy;

pub use quic::{QuicConnector, QuicSession};

/// Application close code sent when the tunnel ends normally.
pub const CLOSE_CODE: u32 = 0;

/// Application close reason sent alongside [`CLOSE_CODE`].
pub const CLOSE_REASON: &str = "close";

/// Dial parameters for one session.
#[derive(Debug, Clone)]
pub struct DialOptions<'a> {
    pub addr: &'a str,
    pub policy: &'a TlsPolicy,
    pub keep_alive: Option<Duration>,
    pub connect_timeout: Duration,
}

/// Establishes sessions.
pub trait Connector {
    type Session: Session;

    /// Make exactly one connection attempt. No retries.
    fn connect(
        &self,
        opts: DialOptions<'_>,
    ) -> impl Future<Output = Result<Self::Session, TunnelError>> + Send;
}

/// An established, encrypted, multiplexed session.
pub trait Session: Send {
    type SendStream: AsyncWrite + Unpin + Send + 'static;
    type RecvStream: AsyncRead + Unpin + Send + 'static;

    /// Open a bidirectional stream, giving up when `cancel` fires.
    fn open_bi(
        &self,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(Self::SendStream, Self::RecvStream), TunnelError>> + Send;

    /// Close the session with an application code and reason.
    ///
    /// Consumes the handle: a session can only be closed once.
    fn close(self, code: u32, reason: &str)
    -> impl Future<Output = Result<(), TunnelError>> + Send;
}
