use clap::Parser;
use daemon::supervisor::run::run_supervisor;
use daemon::supervisor::types::{BackoffConfig, SupervisorConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "daemon-supervisor",
    about = "Keeps the Daemon running and restarts it after each self-rewrite"
)]
struct Cli {
    /// Shell command run before restarting a rewritten Daemon (e.g. "cargo build --release")
    #[arg(long)]
    rebuild: Option<String>,

    /// Source file the Daemon rewrites; its .bak is restored when the rebuild fails
    #[arg(long, default_value = "crates/daemon-mind/src/daemon.rs")]
    source: PathBuf,

    /// Initial crash backoff in milliseconds
    #[arg(long, default_value_t = 1000)]
    backoff_base_ms: u64,

    /// Maximum crash backoff in milliseconds
    #[arg(long, default_value_t = 60000)]
    backoff_max_ms: u64,

    /// Seconds a child must run before its crash counter resets
    #[arg(long, default_value_t = 60)]
    stable_secs: u64,

    /// Consecutive crashes tolerated before giving up
    #[arg(long)]
    max_restarts: Option<u32>,

    /// Program to supervise and its arguments
    #[arg(trailing_var_arg = true, required = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "daemon=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let config = SupervisorConfig {
        command: cli.command,
        rebuild: cli.rebuild,
        source_path: cli.source,
        backoff: BackoffConfig {
            base_ms: cli.backoff_base_ms,
            multiplier: 2.0,
            max_ms: cli.backoff_max_ms,
        },
        stable_after: Duration::from_secs(cli.stable_secs),
        max_restarts: cli.max_restarts,
    };

    std::process::exit(run_supervisor(config).await);
}
