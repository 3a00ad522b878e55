//! Shared tracing/logging initialization.
//!
//! Every `quicssh` binary speaks its payload on stdout, so the subscriber
//! installed here always writes to stderr.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "quicssh=info,quicssh_client=info,quicssh_core=info";

/// Initialise the global tracing subscriber.
///
/// * `default_filter` -- default `RUST_LOG` value when the env-var is not set
///   (e.g. [`DEFAULT_FILTER`]).
/// * `log_json` -- when `true`, emit structured JSON log lines instead of the
///   human-readable format.
pub fn init_tracing(default_filter: &str, log_json: bool) {
    let env_filter = env_filter(std::env::var("RUST_LOG").ok().as_deref(), default_filter);
    if log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Build the filter from an explicit `RUST_LOG` value, falling back to
/// `default_filter` when it is unset or empty.
fn env_filter(rust_log: Option<&str>, default_filter: &str) -> tracing_subscriber::EnvFilter {
    let directives = rust_log
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default_filter);
    tracing_subscriber::EnvFilter::new(directives)
}
