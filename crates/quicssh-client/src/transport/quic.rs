//! QUIC transport backed by `quinn`.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use quinn::crypto::rustls::QuicClientConfig;
use quinn::{Connection, Endpoint, RecvStream, SendStream, TransportConfig, VarInt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{Connector, DialOptions, Session};
use crate::error::TunnelError;

/// SNI-less placeholder handed to quinn when verification is disabled.
/// The insecure rustls config never sends or checks it.
const UNVERIFIED_SERVER_NAME: &str = "quicssh.invalid";

/// Upper bound on waiting for the endpoint to drain after close.
const CLOSE_DRAIN_TIMEOUT: Duration = Duration::from_secs(3);

/// Dials QUIC sessions with `quinn`.
#[derive(Debug, Default, Clone, Copy)]
pub struct QuicConnector;

impl QuicConnector {
    pub const fn new() -> Self {
        Self
    }
}

impl Connector for QuicConnector {
    type Session = QuicSession;

    async fn connect(&self, opts: DialOptions<'_>) -> Result<QuicSession, TunnelError> {
        let remote = resolve(opts.addr).await?;
        let crypto = QuicClientConfig::try_from(opts.policy.rustls_config()?)
            .map_err(|e| TunnelError::TlsConfig(e.to_string()))?;

        let mut transport = TransportConfig::default();
        transport.keep_alive_interval(opts.keep_alive);
        let mut client_config = quinn::ClientConfig::new(Arc::new(crypto));
        client_config.transport_config(Arc::new(transport));

        let bind: SocketAddr = if remote.is_ipv6() {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        };
        let mut endpoint = Endpoint::client(bind)
            .map_err(|e| TunnelError::Dial(format!("Failed to bind {bind}: {e}")))?;
        endpoint.set_default_client_config(client_config);

        let server_name = opts.policy.server_name().unwrap_or(UNVERIFIED_SERVER_NAME);
        info!(addr = %opts.addr, %remote, keep_alive = ?opts.keep_alive, "Dialing");
        let connecting = endpoint
            .connect(remote, server_name)
            .map_err(|e| TunnelError::Dial(e.to_string()))?;
        let connection = tokio::time::timeout(opts.connect_timeout, connecting)
            .await
            .map_err(|_| {
                TunnelError::Dial(format!(
                    "Timed out after {}s connecting to {}",
                    opts.connect_timeout.as_secs_f64(),
                    opts.addr
                ))
            })?
            .map_err(|e| TunnelError::Dial(format!("{}: {e}", opts.addr)))?;

        info!(remote = %connection.remote_address(), "Session established");
        Ok(QuicSession {
            endpoint,
            connection,
        })
    }
}

/// Resolve `addr` to the first socket address it names.
async fn resolve(addr: &str) -> Result<SocketAddr, TunnelError> {
    tokio::net::lookup_host(addr)
        .await
        .map_err(|e| TunnelError::Dial(format!("Failed to resolve {addr}: {e}")))?
        .next()
        .ok_or_else(|| TunnelError::Dial(format!("No addresses found for {addr}")))
}

/// A live QUIC connection plus the endpoint driving it.
#[derive(Debug)]
pub struct QuicSession {
    endpoint: Endpoint,
    connection: Connection,
}

impl Session for QuicSession {
    type SendStream = SendStream;
    type RecvStream = RecvStream;

    async fn open_bi(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(SendStream, RecvStream), TunnelError> {
        tokio::select! {
            () = cancel.cancelled() => Err(TunnelError::StreamOpen("cancelled while opening stream".into())),
            opened = self.connection.open_bi() => {
                let (send, recv) = opened.map_err(|e| TunnelError::StreamOpen(e.to_string()))?;
                debug!(stream_id = %send.id(), "Stream opened");
                Ok((send, recv))
            }
        }
    }

    async fn close(self, code: u32, reason: &str) -> Result<(), TunnelError> {
        self.connection
            .close(VarInt::from_u32(code), reason.as_bytes());
        tokio::time::timeout(CLOSE_DRAIN_TIMEOUT, self.endpoint.wait_idle())
            .await
            .map_err(|_| {
                TunnelError::Close(format!(
                    "endpoint did not drain within {}s",
                    CLOSE_DRAIN_TIMEOUT.as_secs()
                ))
            })
    }
}
