//! quicssh
//!
//! Tunnels stdin/stdout over a QUIC stream, for use as an SSH `ProxyCommand`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use quicssh_client::config::DEFAULT_ADDR;
use quicssh_client::{ClientConfig, TunnelClient};
use quicssh_core::tracing_init::{DEFAULT_FILTER, init_tracing};

#[derive(Parser, Debug)]
#[command(name = "quicssh")]
#[command(version, about = "SSH over QUIC")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Relay stdin/stdout to a quicssh server.
    Client(ClientArgs),
}

#[derive(Args, Debug)]
struct ClientArgs {
    /// Server address (host:port).
    #[arg(long, env = "QUICSSH_ADDR", default_value = DEFAULT_ADDR)]
    addr: String,

    /// Skip server certificate verification. Development only.
    #[arg(long, env = "QUICSSH_INSECURE_SKIP_VERIFY")]
    insecure_skip_verify: bool,

    /// QUIC keep-alive period in seconds (0 = disabled).
    #[arg(long, default_value_t = 0)]
    keep_alive_period_secs: u64,

    /// Extra CA certificate(s) to trust, PEM.
    #[arg(long, env = "QUICSSH_CA_CERT")]
    ca_cert: Option<PathBuf>,

    /// Give up establishing the session after this many seconds.
    #[arg(long, default_value_t = 10)]
    connect_timeout_secs: u64,

    /// Seconds the second relay direction may take to stop once the first
    /// has ended (0 = wait indefinitely).
    #[arg(long, default_value_t = 5)]
    unwind_grace_secs: u64,
}

impl ClientArgs {
    fn into_config(self) -> ClientConfig {
        let mut config = ClientConfig::new(self.addr)
            .with_keep_alive_secs(self.keep_alive_period_secs)
            .with_unwind_grace_secs(self.unwind_grace_secs);
        config.insecure_skip_verify = self.insecure_skip_verify;
        config.ca_cert_path = self.ca_cert;
        config.connect_timeout = std::time::Duration::from_secs(self.connect_timeout_secs);
        config
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(DEFAULT_FILTER, cli.log_json);

    // stdin reads run on a blocking thread that cannot be interrupted, so the
    // runtime is torn down without waiting for it.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(cli.command));
    runtime.shutdown_background();
    result
}

async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Client(args) => {
            let config = args.into_config();
            info!(
                version = env!("CARGO_PKG_VERSION"),
                addr = %config.addr,
                "Starting quicssh client"
            );

            let shutdown = CancellationToken::new();
            let on_signal = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Received Ctrl+C shutdown signal");
                    on_signal.cancel();
                }
            });

            TunnelClient::new(config)
                .run(tokio::io::stdin(), tokio::io::stdout(), &shutdown)
                .await?;
            Ok(())
        }
    }
}
