//! Best-effort removal of daemon instances the launcher does not hold a
//! handle to.
//!
//! Two mechanisms exist: the PID file left by a previous launcher run, and
//! a name match through `pkill -x`. Both wait for the old processes to be
//! gone before returning, escalating to SIGKILL after the grace period, so
//! a new daemon never shares the socket path with an old one. Callers
//! ignore errors from both.

use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::time::{sleep, Instant};

use super::error::{DaemonError, Result};

/// Program used for the name-based sweep.
const PKILL: &str = "pkill";

/// Program used to check whether swept processes are gone.
const PGREP: &str = "pgrep";

/// Interval between checks while an old daemon shuts down.
const EXIT_POLL_MS: u64 = 50;

/// Terminates every process whose name is exactly `name`.
///
/// Mirrors `pkill -x <name>`, then waits up to `grace` for the matches to
/// exit and sends SIGKILL to any that remain. Only the file name of `name`
/// is used, so an absolute daemon path still matches the process name.
///
/// # Returns
/// `Ok(true)` if at least one process was signalled, `Ok(false)` if none
/// matched.
///
/// # Errors
/// Returns an error if `pkill` cannot run or reports a failure other than
/// "no processes matched".
pub async fn sweep_by_name(name: &str, grace: Duration) -> Result<bool> {
    let process_name = process_name(name);

    if !pkill(process_name, "TERM")? {
        tracing::debug!("No running '{}' instance found", process_name);
        return Ok(false);
    }
    tracing::info!("Sent SIGTERM to running '{}' instances", process_name);

    if !wait_until(grace, || !name_running(process_name)).await {
        tracing::warn!(
            "'{}' still running after {:?}, sending SIGKILL",
            process_name,
            grace
        );
        pkill(process_name, "KILL")?;
        if !wait_until(grace, || !name_running(process_name)).await {
            tracing::warn!("'{}' survived SIGKILL", process_name);
        }
    }

    Ok(true)
}

/// Stops the daemon recorded in `pid_path` by a previous run.
///
/// The PID is only signalled if `/proc/<pid>/cmdline` still names the
/// daemon, so a recycled PID is never killed. The call returns once the
/// process is gone: SIGTERM first, SIGKILL after `grace`. Stale or
/// unreadable PID files are removed.
///
/// # Returns
/// `Ok(true)` if a recorded daemon was stopped.
pub async fn stop_recorded(pid_path: &Path, name: &str, grace: Duration) -> Result<bool> {
    let contents = match fs::read_to_string(pid_path) {
        Ok(contents) => contents,
        Err(_) => return Ok(false),
    };

    let pid = match contents.trim().parse::<i32>() {
        Ok(pid) if pid > 0 => pid,
        _ => {
            tracing::warn!("Removing invalid PID file {:?}", pid_path);
            remove_pid_file(pid_path)?;
            return Ok(false);
        }
    };

    if !is_daemon_process(pid as u32, name) {
        tracing::debug!("PID {} is no longer the daemon, removing stale PID file", pid);
        remove_pid_file(pid_path)?;
        return Ok(false);
    }

    signal_pid(pid, Signal::SIGTERM)?;
    tracing::info!("Sent SIGTERM to recorded daemon (PID: {})", pid);

    let gone = || !is_daemon_process(pid as u32, name);
    if !wait_until(grace, gone).await {
        tracing::warn!(
            "Recorded daemon (PID: {}) ignored SIGTERM for {:?}, sending SIGKILL",
            pid,
            grace
        );
        signal_pid(pid, Signal::SIGKILL)?;
        if !wait_until(grace, gone).await {
            tracing::warn!("Recorded daemon (PID: {}) survived SIGKILL", pid);
        }
    }

    remove_pid_file(pid_path)?;
    Ok(true)
}

/// Reads the PID recorded in `pid_path`, if any.
#[must_use]
pub fn read_pid(pid_path: &Path) -> Option<u32> {
    fs::read_to_string(pid_path)
        .ok()
        .and_then(|s| s.trim().parse::<u32>().ok())
        .filter(|pid| *pid > 0)
}

/// Checks whether `pid` is alive and its command line names `name`.
#[must_use]
pub fn is_daemon_process(pid: u32, name: &str) -> bool {
    let cmdline = match fs::read(format!("/proc/{}/cmdline", pid)) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let wanted = process_name(name);

    cmdline
        .split(|b| *b == 0)
        .filter(|arg| !arg.is_empty())
        .take(2)
        .any(|arg| {
            let arg = String::from_utf8_lossy(arg);
            process_name(&arg) == wanted
        })
}

pub(crate) fn remove_pid_file(pid_path: &Path) -> Result<()> {
    match fs::remove_file(pid_path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(DaemonError::PidFile {
            path: pid_path.to_path_buf(),
            source,
        }),
    }
}

/// Sends `signal` to `pid`. A process that is already gone is not an error.
fn signal_pid(pid: i32, signal: Signal) -> Result<()> {
    match kill(Pid::from_raw(pid), signal) {
        Ok(()) | Err(nix::Error::ESRCH) => Ok(()),
        Err(e) => Err(DaemonError::Signal(pid as u32, e)),
    }
}

/// Runs `pkill -<signal> -x <name>`.
///
/// Returns `Ok(false)` when nothing matched (exit status 1).
fn pkill(name: &str, signal: &str) -> Result<bool> {
    let output = Command::new(PKILL)
        .arg(format!("-{}", signal))
        .arg("-x")
        .arg(name)
        .output()
        .map_err(|e| DaemonError::Sweep(name.to_string(), e.to_string()))?;

    match output.status.code() {
        Some(0) => Ok(true),
        Some(1) => Ok(false),
        _ => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(DaemonError::Sweep(
                name.to_string(),
                format!("{} {}", output.status, stderr.trim()),
            ))
        }
    }
}

/// Whether `pgrep -x <name>` still finds a process.
///
/// A `pgrep` that cannot run counts as "none left".
fn name_running(name: &str) -> bool {
    Command::new(PGREP)
        .arg("-x")
        .arg(name)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Polls `done` until it holds or `limit` elapses. Returns the last result.
async fn wait_until<F>(limit: Duration, mut done: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + limit;
    loop {
        if done() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(Duration::from_millis(EXIT_POLL_MS)).await;
    }
}

/// File-name part of a binary path, as the kernel reports process names.
fn process_name(binary: &str) -> &str {
    Path::new(binary)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(binary)
}
