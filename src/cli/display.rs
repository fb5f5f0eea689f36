//! Display utilities for the launcher CLI.
//!
//! This module provides formatted output for:
//! - Run summaries
//! - Stop results
//! - Daemon and socket status
//! - Error messages

use crate::config::{format_mode, LaunchConfig};
use crate::daemon::{DaemonStatus, ReadyState, SocketStatus};
use crate::launcher::LaunchReport;

// ============================================================================
// Display
// ============================================================================

/// Display utilities for CLI output.
pub struct Display;

impl Display {
    /// Shows a short summary after a run.
    ///
    /// Printed to stderr so the main program's stdout stays untouched.
    pub fn show_run_summary(report: &LaunchReport) {
        for line in Self::run_summary_lines(report) {
            eprintln!("{}", line);
        }
    }

    /// Shows the result of the stop command.
    pub fn show_stop_result(stopped: bool) {
        if stopped {
            println!("* ydotoold stopped");
        } else {
            println!("ydotoold was not running");
        }
    }

    /// Shows daemon and socket status.
    pub fn show_status(config: &LaunchConfig, status: &DaemonStatus) {
        for line in Self::status_lines(config, status) {
            println!("{}", line);
        }
    }

    /// Shows an error message.
    pub fn show_error(message: &str) {
        eprintln!("error: {}", message);
    }

    fn run_summary_lines(report: &LaunchReport) -> Vec<String> {
        let mut lines = Vec::new();
        match (report.daemon_pid, report.ready) {
            (None, _) => lines.push("! ydotoold could not be started".to_string()),
            // A skipped check says nothing about the socket.
            (Some(pid), Some(ReadyState::Ready | ReadyState::Skipped)) => {
                lines.push(format!("* ydotoold ran as PID {}", pid));
            }
            (Some(pid), Some(ReadyState::Exited(_))) => {
                lines.push(format!("! ydotoold (PID {}) exited before opening its socket", pid));
            }
            (Some(pid), _) => {
                lines.push(format!("! ydotoold (PID {}) never opened its socket", pid));
            }
        }

        if !report.main_started {
            lines.push("! main program could not be started".to_string());
        } else {
            match report.exit_code {
                Some(0) => lines.push("* main program finished".to_string()),
                Some(code) => lines.push(format!("! main program exited with status {}", code)),
                None => lines.push("! main program was terminated by a signal".to_string()),
            }
        }

        if report.daemon_pid.is_some() && !report.daemon_stopped {
            lines.push("! ydotoold may still be running; try `ydo-launcher stop`".to_string());
        }
        lines
    }

    fn status_lines(config: &LaunchConfig, status: &DaemonStatus) -> Vec<String> {
        let mut lines = vec![
            "ydotoold status".to_string(),
            "─────────────────────────────".to_string(),
        ];

        let state = match (status.recorded_pid, status.running) {
            (Some(pid), true) => format!("running (PID {})", pid),
            (Some(pid), false) => format!("not running (stale PID {})", pid),
            (None, _) => "not running".to_string(),
        };
        lines.push(format!("daemon: {}", state));
        lines.push(format!("socket: {}", Self::format_socket(config, &status.socket)));
        lines.push(format!("log:    {}", config.log_path.display()));
        lines
    }

    fn format_socket(config: &LaunchConfig, socket: &SocketStatus) -> String {
        if !socket.exists {
            return format!("{} (missing)", config.socket_path.display());
        }
        let mode = socket
            .mode
            .map(format_mode)
            .unwrap_or_else(|| "?".to_string());
        let owner = match (socket.uid, socket.gid) {
            (Some(uid), Some(gid)) => format!("{}:{}", uid, gid),
            _ => "?".to_string(),
        };
        let expected = config.owner();
        let matches = socket.matches(config.socket_mode, expected.uid, expected.gid);
        format!(
            "{} (mode {}, owner {}{})",
            config.socket_path.display(),
            mode,
            owner,
            if matches { "" } else { ", unexpected" }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
