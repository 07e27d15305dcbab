use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub base_ms: u64,
    pub multiplier: f64,
    pub max_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: 1000,
            multiplier: 2.0,
            max_ms: 60000,
        }
    }
}

impl BackoffConfig {
    /// Delay that follows `current_ms`, capped at `max_ms`.
    pub fn next(&self, current_ms: u64) -> u64 {
        ((current_ms as f64 * self.multiplier) as u64).min(self.max_ms)
    }
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Program to run, followed by its arguments.
    pub command: Vec<String>,
    /// Shell command run before restarting a rewritten child.
    pub rebuild: Option<String>,
    /// Source file the child rewrites; its `.bak` is restored when a rebuild fails.
    pub source_path: PathBuf,
    pub backoff: BackoffConfig,
    /// A child that ran at least this long resets the crash backoff.
    pub stable_after: Duration,
    /// Consecutive crashes tolerated before giving up. `None` retries forever.
    pub max_restarts: Option<u32>,
}

/// How the child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildExit {
    /// Status 0: the operator asked it to stop.
    Clean,
    /// The child replaced its own source and wants to be restarted.
    RestartRequested,
    /// Any other status, or killed by a signal (`None`).
    Crashed(Option<i32>),
}

impl ChildExit {
    pub fn from_code(code: Option<i32>, restart_code: i32) -> Self {
        match code {
            Some(0) => Self::Clean,
            Some(c) if c == restart_code => Self::RestartRequested,
            other => Self::Crashed(other),
        }
    }
}

impl std::fmt::Display for ChildExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clean => write!(f, "clean"),
            Self::RestartRequested => write!(f, "restart-requested"),
            Self::Crashed(Some(code)) => write!(f, "crashed({code})"),
            Self::Crashed(None) => write!(f, "killed"),
        }
    }
}

/// What the supervisor does next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStep {
    Stop,
    /// Rebuild (if configured) and restart immediately.
    Evolve,
    /// Restart after waiting this long.
    Retry(Duration),
    GiveUp,
}

#[derive(Debug, Clone)]
pub struct SupervisorState {
    pub current_backoff_ms: u64,
    pub consecutive_crashes: u32,
    pub evolutions: u32,
}

impl SupervisorState {
    pub fn new(backoff_base_ms: u64) -> Self {
        Self {
            current_backoff_ms: backoff_base_ms,
            consecutive_crashes: 0,
            evolutions: 0,
        }
    }

    /// Record one child exit and decide what follows.
    pub fn on_exit(&mut self, exit: ChildExit, ran_for: Duration, config: &SupervisorConfig) -> NextStep {
        if ran_for >= config.stable_after {
            self.consecutive_crashes = 0;
            self.current_backoff_ms = config.backoff.base_ms;
        }
        match exit {
            ChildExit::Clean => NextStep::Stop,
            ChildExit::RestartRequested => {
                self.evolutions += 1;
                self.consecutive_crashes = 0;
                self.current_backoff_ms = config.backoff.base_ms;
                NextStep::Evolve
            }
            ChildExit::Crashed(_) => {
                self.consecutive_crashes += 1;
                if config
                    .max_restarts
                    .is_some_and(|max| self.consecutive_crashes > max)
                {
                    return NextStep::GiveUp;
                }
                let delay = Duration::from_millis(self.current_backoff_ms);
                self.current_backoff_ms = config.backoff.next(self.current_backoff_ms);
                NextStep::Retry(delay)
            }
        }
    }
}
