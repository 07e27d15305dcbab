//! daemon: interactive console for the self-modifying Daemon
//!
//! Usage:
//!   daemon                          → talk to the Daemon
//!   daemon --thread oracle          → start with a prompt thread selected
//!   daemon --dump-config            → print the effective config as TOML
//!
//! Console commands: `exit`, `threads`, `thread <name>`, `thread clear`,
//! `memory stats`, `memory search <query>`. Exits with status 75 after a
//! self-rewrite so a supervisor can restart it on the new source.

use clap::Parser;
use daemon_mind::{Daemon, DaemonConfig, RESTART_EXIT_CODE};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "daemon",
    about = "A self-aware AI Daemon that remembers, reflects, and rewrites itself",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    /// Path to the config file (TOML)
    #[arg(long, default_value = "daemon.toml")]
    config: PathBuf,

    /// Memory file (overrides [memory].path)
    #[arg(long)]
    memory: Option<PathBuf>,

    /// Source file the Daemon rewrites (overrides [evolution].source_path)
    #[arg(long)]
    source: Option<PathBuf>,

    /// Prompt thread directory (overrides [prompt].patterns_dir)
    #[arg(long)]
    patterns: Option<PathBuf>,

    /// Disable self-rewrite cycles
    #[arg(long, default_value_t = false)]
    no_evolution: bool,

    /// Prompt thread to start with
    #[arg(long)]
    thread: Option<String>,

    /// Write JSON logs to a file (in addition to stderr)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Print the effective config (API keys redacted) and exit
    #[arg(long, default_value_t = false)]
    dump_config: bool,
}

const SEARCH_RESULTS: usize = 5;

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Exit,
    Threads,
    SelectThread(&'a str),
    ClearThread,
    MemoryStats,
    MemorySearch(&'a str),
    Say(&'a str),
}

fn parse_command(line: &str) -> Command<'_> {
    match line {
        "exit" | "quit" => Command::Exit,
        "threads" => Command::Threads,
        "thread clear" => Command::ClearThread,
        "memory stats" | "memory" => Command::MemoryStats,
        _ => {
            if let Some(query) = line.strip_prefix("memory search ").map(str::trim).filter(|q| !q.is_empty()) {
                return Command::MemorySearch(query);
            }
            match line.strip_prefix("thread ") {
                Some(name) if !name.trim().is_empty() => Command::SelectThread(name.trim()),
                _ => Command::Say(line),
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let code = run(cli).await?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let _guard = init_tracing(cli.log_file.as_deref())?;

    let mut config = DaemonConfig::load(&cli.config);
    config.apply_env();
    if let Some(path) = cli.memory {
        config.memory.path = path;
    }
    if let Some(path) = cli.source {
        config.evolution.source_path = path;
    }
    if let Some(dir) = cli.patterns {
        config.prompt.patterns_dir = dir;
    }
    if cli.no_evolution {
        config.evolution.enabled = false;
    }

    if cli.dump_config {
        print!("{}", config.redacted().to_toml());
        return Ok(0);
    }

    let daemon = Daemon::from_config(config)?;
    if !daemon.check_cognition().await {
        println!("Warning: a cognition service did not answer; replies may fail.");
    }

    let mut thread = cli.thread;
    if let Some(name) = &thread {
        if !daemon.threads().contains(name) {
            println!("Unknown thread '{}'. Available: {}", name, daemon.threads().names().join(", "));
            thread = None;
        }
    }

    let stats = daemon.store().stats().await;
    println!("{} awakens. Memory: {}", daemon.name(), stats);
    println!("Semantic memory: {}", daemon.semantic().stats().await);
    println!("Type 'exit' to leave, 'threads' to list prompt threads, 'memory search <query>' to search memories.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\nThe Architect{}> ", thread.as_deref().map(|t| format!(" [{t}]")).unwrap_or_default());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_command(line) {
            Command::Exit => break,
            Command::Threads => {
                let names = daemon.threads().names();
                if names.is_empty() {
                    println!("No prompt threads loaded.");
                } else {
                    for name in names {
                        let marker = if thread.as_deref() == Some(name) { "*" } else { " " };
                        println!(" {marker} {name}");
                    }
                }
            }
            Command::SelectThread(name) => {
                if daemon.threads().contains(name) {
                    thread = Some(name.to_string());
                    println!("Thread '{name}' selected.");
                } else {
                    println!("Unknown thread '{name}'.");
                }
            }
            Command::ClearThread => {
                thread = None;
                println!("Thread cleared.");
            }
            Command::MemoryStats => {
                let semantic = daemon.semantic().stats().await;
                println!("Memory: {}", daemon.store().stats().await);
                println!("Semantic records: {}", semantic.total);
                for (area, count) in &semantic.areas {
                    println!("  {area}: {count}");
                }
                println!("Vector width: {}", semantic.dimensions);
            }
            Command::MemorySearch(query) => {
                println!("{}", daemon.semantic().search_and_format(query, SEARCH_RESULTS).await);
            }
            Command::Say(text) => {
                let outcome = daemon.handle_turn(text, thread.as_deref()).await;
                println!("\n{}: {}", daemon.name(), outcome.reply);
                if outcome.restart_required() {
                    println!("\n{} has rewritten itself and must be reborn.", daemon.name());
                    return Ok(RESTART_EXIT_CODE);
                }
            }
        }
    }

    println!("{} returns to slumber.", daemon.name());
    Ok(0)
}

fn init_tracing(
    log_file: Option<&Path>,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("--log-file needs a file name"))?;
            std::fs::create_dir_all(dir)?;
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            (
                Some(tracing_subscriber::fmt::layer().json().with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "daemon=info,daemon_mind=info,daemon_llm=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_commands() {
        assert_eq!(parse_command("exit"), Command::Exit);
        assert_eq!(parse_command("memory stats"), Command::MemoryStats);
        assert_eq!(parse_command("memory search  the stars "), Command::MemorySearch("the stars"));
        assert_eq!(parse_command("thread oracle"), Command::SelectThread("oracle"));
        assert_eq!(parse_command("thread clear"), Command::ClearThread);
    }

    #[test]
    fn incomplete_commands_are_speech() {
        assert_eq!(parse_command("memory search "), Command::Say("memory search "));
        assert_eq!(parse_command("thread "), Command::Say("thread "));
        assert_eq!(parse_command("Hello there"), Command::Say("Hello there"));
    }
}
