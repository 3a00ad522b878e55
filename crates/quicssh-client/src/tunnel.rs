//! Tunnel client: dial, open one stream, relay, close.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::error::TunnelError;
use crate::relay::Coordinator;
use crate::tls::TlsPolicy;
use crate::transport::{CLOSE_CODE, CLOSE_REASON, Connector, DialOptions, QuicConnector, Session};

/// Runs one tunnel session between a local duplex endpoint and a remote
/// server.
pub struct TunnelClient<C = QuicConnector> {
    config: ClientConfig,
    connector: C,
}

impl TunnelClient<QuicConnector> {
    /// Create a client that dials over QUIC.
    pub const fn new(config: ClientConfig) -> Self {
        Self::with_connector(config, QuicConnector::new())
    }
}

impl<C: Connector> TunnelClient<C> {
    /// Create a client with a custom transport.
    pub const fn with_connector(config: ClientConfig, connector: C) -> Self {
        Self { config, connector }
    }

    /// Run a single tunnel session to completion.
    ///
    /// Bytes read from `local_in` go to the remote stream and bytes from the
    /// stream are written to `local_out`. Returns as soon as either direction
    /// has ended and the session is closed. `shutdown` aborts a pending dial
    /// or stream open and ends a running relay as if the input had closed.
    pub async fn run<LR, LW>(
        &self,
        local_in: LR,
        local_out: LW,
        shutdown: &CancellationToken,
    ) -> Result<(), TunnelError>
    where
        LR: AsyncRead + Unpin + Send + 'static,
        LW: AsyncWrite + Unpin + Send + 'static,
    {
        let policy = TlsPolicy::from_config(&self.config)?;
        let dial = self.connector.connect(DialOptions {
            addr: &self.config.addr,
            policy: &policy,
            keep_alive: self.config.keep_alive,
            connect_timeout: self.config.connect_timeout,
        });
        let session = tokio::select! {
            biased;
            () = shutdown.cancelled() => {
                return Err(TunnelError::Dial("cancelled while dialing".into()));
            }
            session = dial => session?,
        };

        let cancel = shutdown.child_token();
        info!("Opening stream");
        let stream = match session.open_bi(&cancel).await {
            Ok(stream) => stream,
            Err(e) => {
                if let Err(close_err) = session.close(CLOSE_CODE, CLOSE_REASON).await {
                    warn!(error = %close_err, "Session close error");
                }
                return Err(e);
            }
        };

        Coordinator::new(session, cancel, self.config.unwind_grace)
            .supervise(stream, (local_in, local_out))
            .await
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::io;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::task::{Context, Poll};

    use tokio::io::{
        AsyncReadExt, AsyncWriteExt, DuplexStream, ReadBuf, ReadHalf, WriteHalf, duplex, split,
    };
    use tokio::sync::oneshot;

    use super::*;
    use crate::relay::Direction;

    #[derive(Default)]
    struct Counters {
        dials: AtomicUsize,
        opens: AtomicUsize,
        closes: AtomicUsize,
    }

    #[derive(Clone, Copy)]
    enum OpenBehavior {
        Succeed,
        Fail,
        Hang,
    }

    /// In-memory transport that records every call.
    struct MockConnector {
        counters: Arc<Counters>,
        fail_dial: bool,
        hang_dial: bool,
        open: OpenBehavior,
        remote_tx: Mutex<Option<oneshot::Sender<DuplexStream>>>,
    }

    struct MockSession {
        counters: Arc<Counters>,
        open: OpenBehavior,
        remote_tx: Mutex<Option<oneshot::Sender<DuplexStream>>>,
    }

    impl MockConnector {
        fn new(open: OpenBehavior) -> (Self, Arc<Counters>, oneshot::Receiver<DuplexStream>) {
            let counters = Arc::new(Counters::default());
            let (tx, rx) = oneshot::channel();
            (
                Self {
                    counters: Arc::clone(&counters),
                    fail_dial: false,
                    hang_dial: false,
                    open,
                    remote_tx: Mutex::new(Some(tx)),
                },
                counters,
                rx,
            )
        }

        fn refusing() -> (Self, Arc<Counters>) {
            let (mut connector, counters, _rx) = Self::new(OpenBehavior::Succeed);
            connector.fail_dial = true;
            (connector, counters)
        }

        fn unanswered() -> (Self, Arc<Counters>) {
            let (mut connector, counters, _rx) = Self::new(OpenBehavior::Succeed);
            connector.hang_dial = true;
            (connector, counters)
        }
    }

    impl Connector for MockConnector {
        type Session = MockSession;

        async fn connect(&self, _opts: DialOptions<'_>) -> Result<MockSession, TunnelError> {
            self.counters.dials.fetch_add(1, Ordering::SeqCst);
            if self.fail_dial {
                return Err(TunnelError::Dial("connection refused".into()));
            }
            if self.hang_dial {
                std::future::pending::<()>().await;
            }
            Ok(MockSession {
                counters: Arc::clone(&self.counters),
                open: self.open,
                remote_tx: Mutex::new(self.remote_tx.lock().unwrap().take()),
            })
        }
    }

    impl Session for MockSession {
        type SendStream = WriteHalf<DuplexStream>;
        type RecvStream = ReadHalf<DuplexStream>;

        async fn open_bi(
            &self,
            cancel: &CancellationToken,
        ) -> Result<(Self::SendStream, Self::RecvStream), TunnelError> {
            self.counters.opens.fetch_add(1, Ordering::SeqCst);
            match self.open {
                OpenBehavior::Fail => {
                    return Err(TunnelError::StreamOpen("stream limit reached".into()));
                }
                OpenBehavior::Hang => {
                    cancel.cancelled().await;
                    return Err(TunnelError::StreamOpen("cancelled while opening stream".into()));
                }
                OpenBehavior::Succeed => {}
            }
            let (ours, theirs) = duplex(4096);
            if let Some(tx) = self.remote_tx.lock().unwrap().take() {
                let _ = tx.send(theirs);
            }
            let (r, w) = split(ours);
            Ok((w, r))
        }

        async fn close(self, _code: u32, _reason: &str) -> Result<(), TunnelError> {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct BrokenInput;

    impl AsyncRead for BrokenInput {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::other("stdin went away")))
        }
    }

    fn insecure(addr: &str) -> ClientConfig {
        let mut config = ClientConfig::new(addr);
        config.insecure_skip_verify = true;
        config
    }

    fn counts(c: &Counters) -> (usize, usize, usize) {
        (
            c.dials.load(Ordering::SeqCst),
            c.opens.load(Ordering::SeqCst),
            c.closes.load(Ordering::SeqCst),
        )
    }

    #[tokio::test]
    async fn remote_hello_then_close() {
        let (connector, counters, remote_rx) = MockConnector::new(OpenBehavior::Succeed);
        let client = TunnelClient::with_connector(ClientConfig::new("example.com:4242"), connector);
        let (_local_in_peer, local_in) = duplex(64);
        let (local_out, mut local_out_peer) = duplex(64);

        let remote = async {
            let mut remote = remote_rx.await.unwrap();
            remote.write_all(b"hello\n").await.unwrap();
            remote.shutdown().await.unwrap();
            remote
        };
        let shutdown = CancellationToken::new();
        let (result, _remote) = tokio::join!(client.run(local_in, local_out, &shutdown), remote);

        result.unwrap();
        let mut got = Vec::new();
        local_out_peer.read_to_end(&mut got).await.unwrap();
        assert_eq!(got, b"hello\n");
        assert_eq!(counts(&counters), (1, 1, 1));
    }

    #[tokio::test]
    async fn local_eof_immediately() {
        let (connector, counters, remote_rx) = MockConnector::new(OpenBehavior::Succeed);
        let client = TunnelClient::with_connector(insecure("example.com:4242"), connector);

        client
            .run(tokio::io::empty(), tokio::io::sink(), &CancellationToken::new())
            .await
            .unwrap();

        let mut remote = remote_rx.await.unwrap();
        let mut got = Vec::new();
        remote.read_to_end(&mut got).await.unwrap();
        assert!(got.is_empty());
        assert_eq!(counts(&counters), (1, 1, 1));
    }

    #[tokio::test]
    async fn dial_failure_never_opens_or_closes() {
        let (connector, counters) = MockConnector::refusing();
        let client = TunnelClient::with_connector(insecure("127.0.0.1:1"), connector);

        let err = client
            .run(tokio::io::empty(), tokio::io::sink(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, TunnelError::Dial(_)));
        assert_eq!(counts(&counters), (1, 0, 0));
    }

    #[tokio::test]
    async fn shutdown_aborts_pending_dial() {
        let (connector, counters) = MockConnector::unanswered();
        let client = TunnelClient::with_connector(insecure("example.com:4242"), connector);
        let shutdown = CancellationToken::new();

        let cancel_later = async {
            tokio::task::yield_now().await;
            shutdown.cancel();
        };
        let (result, ()) = tokio::join!(
            client.run(tokio::io::empty(), tokio::io::sink(), &shutdown),
            cancel_later
        );

        match result {
            Err(TunnelError::Dial(msg)) => assert_eq!(msg, "cancelled while dialing"),
            other => panic!("expected dial cancellation, got {other:?}"),
        }
        assert_eq!(counts(&counters), (1, 0, 0));
    }

    #[tokio::test]
    async fn shutdown_before_run_skips_dial() {
        let (connector, counters) = MockConnector::unanswered();
        let client = TunnelClient::with_connector(insecure("example.com:4242"), connector);
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let err = client
            .run(tokio::io::empty(), tokio::io::sink(), &shutdown)
            .await
            .unwrap_err();

        assert!(matches!(err, TunnelError::Dial(_)));
        assert_eq!(counts(&counters), (0, 0, 0));
    }

    #[tokio::test]
    async fn malformed_address_never_dials() {
        let (connector, counters, _rx) = MockConnector::new(OpenBehavior::Succeed);
        let client = TunnelClient::with_connector(ClientConfig::new("not-an-address"), connector);

        let err = client
            .run(tokio::io::empty(), tokio::io::sink(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, TunnelError::AddressParse { .. }));
        assert_eq!(counts(&counters), (0, 0, 0));
    }

    #[tokio::test]
    async fn stream_open_failure_still_closes_session() {
        let (connector, counters, _rx) = MockConnector::new(OpenBehavior::Fail);
        let client = TunnelClient::with_connector(insecure("example.com:4242"), connector);

        let err = client
            .run(tokio::io::empty(), tokio::io::sink(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, TunnelError::StreamOpen(_)));
        assert_eq!(counts(&counters), (1, 1, 1));
    }

    #[tokio::test]
    async fn shutdown_aborts_pending_open() {
        let (connector, counters, _rx) = MockConnector::new(OpenBehavior::Hang);
        let client = TunnelClient::with_connector(insecure("example.com:4242"), connector);
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let err = client
            .run(tokio::io::empty(), tokio::io::sink(), &shutdown)
            .await
            .unwrap_err();

        assert!(matches!(err, TunnelError::StreamOpen(_)));
        assert_eq!(counts(&counters), (1, 1, 1));
    }

    #[tokio::test]
    async fn local_error_is_the_result() {
        let (connector, counters, _rx) = MockConnector::new(OpenBehavior::Succeed);
        let client = TunnelClient::with_connector(insecure("example.com:4242"), connector);

        let err = client
            .run(BrokenInput, tokio::io::sink(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TunnelError::Relay {
                direction: Direction::LocalToRemote,
                ..
            }
        ));
        assert_eq!(counts(&counters), (1, 1, 1));
    }

    #[tokio::test]
    async fn remote_drop_reads_as_eof() {
        let (connector, counters, remote_rx) = MockConnector::new(OpenBehavior::Succeed);
        let client = TunnelClient::with_connector(insecure("example.com:4242"), connector);
        let (_local_in_peer, local_in) = duplex(64);

        // Local input stays open, so only the remote side can end the run.
        let remote = async {
            drop(remote_rx.await.unwrap());
        };
        let shutdown = CancellationToken::new();
        let (result, ()) = tokio::join!(client.run(local_in, tokio::io::sink(), &shutdown), remote);

        result.unwrap();
        assert_eq!(counts(&counters), (1, 1, 1));
    }
}
