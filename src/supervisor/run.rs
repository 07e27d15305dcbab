use std::time::Instant;

use daemon_mind::RESTART_EXIT_CODE;
use tracing::{error, info, warn};

use super::lifecycle;
use super::types::*;

/// Keep the child running until it exits cleanly or crashes too often.
/// Returns the supervisor's own exit status.
pub async fn run_supervisor(config: SupervisorConfig) -> i32 {
    let mut sv = SupervisorState::new(config.backoff.base_ms);

    info!(
        command = ?config.command,
        rebuild = ?config.rebuild,
        max_restarts = ?config.max_restarts,
        "supervisor started"
    );

    loop {
        let started = Instant::now();
        let exit = match lifecycle::run_child(&config.command).await {
            Ok(code) => ChildExit::from_code(code, RESTART_EXIT_CODE),
            Err(e) => {
                error!(error = %e, "child could not be started");
                ChildExit::Crashed(None)
            }
        };
        let ran_for = started.elapsed();
        info!(%exit, ran_secs = ran_for.as_secs(), "child exited");

        match sv.on_exit(exit, ran_for, &config) {
            NextStep::Stop => {
                info!(evolutions = sv.evolutions, "child stopped cleanly, supervisor exiting");
                return 0;
            }
            NextStep::Evolve => {
                info!(evolutions = sv.evolutions, "child rewrote itself, restarting");
                if let Some(cmd) = &config.rebuild {
                    if let Err(e) = lifecycle::rebuild_or_rollback(cmd, &config.source_path).await {
                        error!(error = %e, "rewrite rejected");
                    }
                }
            }
            NextStep::Retry(delay) => {
                warn!(
                    delay_ms = delay.as_millis() as u64,
                    crashes = sv.consecutive_crashes,
                    "child crashed, restarting after backoff"
                );
                tokio::time::sleep(delay).await;
            }
            NextStep::GiveUp => {
                error!(crashes = sv.consecutive_crashes, "too many consecutive crashes, giving up");
                return 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn config(script: &str, max_restarts: Option<u32>) -> SupervisorConfig {
        SupervisorConfig {
            command: vec!["sh".into(), "-c".into(), script.into()],
            rebuild: None,
            source_path: PathBuf::from("unused.rs"),
            backoff: BackoffConfig {
                base_ms: 1,
                multiplier: 1.0,
                max_ms: 1,
            },
            stable_after: Duration::from_secs(3600),
            max_restarts,
        }
    }

    #[tokio::test]
    async fn clean_child_stops_supervisor() {
        assert_eq!(run_supervisor(config("exit 0", None)).await, 0);
    }

    #[tokio::test]
    async fn crashing_child_exhausts_restarts() {
        assert_eq!(run_supervisor(config("exit 2", Some(2))).await, 1);
    }

    #[tokio::test]
    async fn restart_request_runs_child_again() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran-once");
        // First run asks for a restart, second run exits cleanly.
        let script = format!(
            "if [ -f {m} ]; then exit 0; else touch {m}; exit {code}; fi",
            m = marker.display(),
            code = RESTART_EXIT_CODE
        );
        assert_eq!(run_supervisor(config(&script, Some(0))).await, 0);
        assert!(marker.exists());
    }
}
