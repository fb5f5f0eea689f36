//! Daemon management for the input-injection daemon (`ydotoold`).
//!
//! This module covers the daemon's whole lifecycle around one launcher run:
//! - `sweep`: best-effort removal of earlier instances (PID file, then name)
//! - `process`: spawning the tracked daemon and stopping it by PID
//! - `socket`: socket readiness polling and mode/ownership inspection
//!
//! # Error Handling
//!
//! Every [`DaemonError`] is recoverable. The launcher logs these errors and
//! carries on, so cleanup never blocks the main workflow.

pub mod error;
pub mod process;
pub mod socket;
pub mod sweep;

pub use error::{DaemonError, Result};
pub use process::{DaemonArgs, DaemonHandle, ReadyState};
pub use socket::{remove_stale_socket, socket_status, SocketStatus};
pub use sweep::{is_daemon_process, read_pid, stop_recorded, sweep_by_name};

use std::time::Duration;

use crate::config::LaunchConfig;

/// Clears any daemon left over from an earlier run.
///
/// The PID file is tried first. The name-based sweep runs afterwards if
/// `config.sweep_stale` is set. Each step waits up to `stop_grace_ms` for
/// the old process to exit before escalating, so nothing it stopped is
/// still alive on return. Failures are logged and swallowed.
///
/// # Returns
/// `true` if anything was terminated.
pub async fn clear_previous(config: &LaunchConfig) -> bool {
    let grace = Duration::from_millis(config.stop_grace_ms);

    let recorded = match stop_recorded(&config.pid_path, &config.daemon_binary, grace).await {
        Ok(stopped) => stopped,
        Err(e) => {
            tracing::warn!("Ignoring failure to stop recorded daemon: {}", e);
            false
        }
    };

    let swept = if config.sweep_stale {
        match sweep_by_name(&config.daemon_binary, grace).await {
            Ok(swept) => swept,
            Err(e) => {
                tracing::warn!("Ignoring failed daemon sweep: {}", e);
                false
            }
        }
    } else {
        false
    };

    recorded || swept
}

/// Status of the daemon as seen from outside any launcher run.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DaemonStatus {
    /// PID recorded in the PID file, if any.
    pub recorded_pid: Option<u32>,
    /// Whether the recorded PID is a live daemon process.
    pub running: bool,
    pub socket: SocketStatus,
}

/// Collects PID-file and socket status for `config`.
#[must_use]
pub fn status(config: &LaunchConfig) -> DaemonStatus {
    let recorded_pid = read_pid(&config.pid_path);
    let running = recorded_pid
        .map(|pid| is_daemon_process(pid, &config.daemon_binary))
        .unwrap_or(false);

    DaemonStatus {
        recorded_pid,
        running,
        socket: socket_status(&config.socket_path),
    }
}
