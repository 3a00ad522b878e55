//! Tunnel client configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default remote address, matching the server's default listen port.
pub const DEFAULT_ADDR: &str = "localhost:4242";

/// Configuration for one tunnel run.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Remote address in `host:port` form.
    pub addr: String,

    /// Disable server certificate verification entirely.
    pub insecure_skip_verify: bool,

    /// QUIC keep-alive interval (None = disabled).
    pub keep_alive: Option<Duration>,

    /// Extra PEM file of trusted CA certificates, added to the bundled roots.
    pub ca_cert_path: Option<PathBuf>,

    /// Upper bound on session establishment.
    pub connect_timeout: Duration,

    /// How long the losing relay loop may take to unwind after cancellation
    /// before it is aborted (None = wait indefinitely).
    pub unwind_grace: Option<Duration>,
}

impl ClientConfig {
    /// Create a config for `addr` with defaults for everything else.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            insecure_skip_verify: false,
            keep_alive: None,
            ca_cert_path: None,
            connect_timeout: Duration::from_secs(10),
            unwind_grace: Some(Duration::from_secs(5)),
        }
    }

    /// Set the keep-alive interval from whole seconds; zero disables it.
    #[must_use]
    pub fn with_keep_alive_secs(mut self, secs: u64) -> Self {
        self.keep_alive = secs_or_disabled(secs);
        self
    }

    /// Set the unwind grace from whole seconds; zero waits indefinitely.
    #[must_use]
    pub fn with_unwind_grace_secs(mut self, secs: u64) -> Self {
        self.unwind_grace = secs_or_disabled(secs);
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ADDR)
    }
}

fn secs_or_disabled(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
