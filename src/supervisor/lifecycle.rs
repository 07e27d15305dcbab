use std::path::Path;
use tokio::process::Command;
use tracing::{info, warn};

/// Run the child to completion with inherited stdio. Returns its exit code,
/// `None` when it was killed by a signal.
pub async fn run_child(command: &[String]) -> Result<Option<i32>, String> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| "no command to supervise".to_string())?;
    info!(program = %program, args = ?args, "starting child");
    let status = Command::new(program)
        .args(args)
        .status()
        .await
        .map_err(|e| format!("spawn {program}: {e}"))?;
    Ok(status.code())
}

/// Run the rebuild command through the shell.
pub async fn rebuild(cmd: &str) -> Result<(), String> {
    info!(cmd, "rebuilding");
    let output = Command::new("sh")
        .args(["-c", cmd])
        .output()
        .await
        .map_err(|e| format!("rebuild exec failed: {e}"))?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(format!("rebuild failed: {}", stderr.trim()))
    }
}

/// Put `<source>.bak` back over `source`.
pub async fn restore_backup(source: &Path) -> Result<(), String> {
    let mut backup = source.as_os_str().to_owned();
    backup.push(".bak");
    let backup = Path::new(&backup);
    tokio::fs::copy(backup, source)
        .await
        .map_err(|e| format!("restore {}: {e}", backup.display()))?;
    warn!(source = %source.display(), "restored source from backup");
    Ok(())
}

/// Rebuild after a rewrite; on failure restore the backup and rebuild the
/// previous source so the next start runs a working program.
pub async fn rebuild_or_rollback(cmd: &str, source: &Path) -> Result<(), String> {
    let Err(first) = rebuild(cmd).await else {
        return Ok(());
    };
    warn!(error = %first, "rewritten source does not build, rolling back");
    restore_backup(source).await?;
    rebuild(cmd).await.map_err(|e| format!("rollback rebuild: {e}"))?;
    Err(first)
}
