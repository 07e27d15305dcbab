//! Process supervisor for the Daemon
//!
//! Runs the Daemon as a child process. Exit status 0 stops supervision,
//! [`daemon_mind::RESTART_EXIT_CODE`] means the child rewrote its source
//! (rebuild, then restart at once), anything else is a crash restarted
//! with exponential backoff.

pub mod lifecycle;
pub mod run;
pub mod types;
