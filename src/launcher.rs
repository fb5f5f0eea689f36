//! The launch sequence: sweep, start daemon, run main program, teardown.
//!
//! Only configuration problems stop a run before it starts. Once running,
//! every failure is logged and the sequence continues, so the daemon is
//! always torn down after the main program.

use std::time::Duration;

use crate::config::LaunchConfig;
use crate::daemon::{self, DaemonHandle, ReadyState};
use crate::runner::{self, MainCommand};

/// Outcome of one launcher run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchReport {
    /// Whether step 1 terminated an earlier daemon.
    pub cleared_previous: bool,
    /// PID of the daemon this run started.
    pub daemon_pid: Option<u32>,
    /// Outcome of the socket readiness check. `None` if the daemon never
    /// started.
    pub ready: Option<ReadyState>,
    /// Exit code of the main program. `None` if it was killed by a signal
    /// or never started.
    pub exit_code: Option<i32>,
    /// Whether the main program could be started at all.
    pub main_started: bool,
    /// Whether this run's daemon was stopped cleanly.
    pub daemon_stopped: bool,
}

impl LaunchReport {
    /// Whether the socket appeared before the main program started.
    #[must_use]
    pub fn socket_ready(&self) -> bool {
        self.ready.is_some_and(|state| state.is_ready())
    }

    /// Process exit code for the launcher itself.
    ///
    /// 0 unless `propagate_exit` is set, in which case the main program's
    /// code is used, and 1 when it has none.
    #[must_use]
    pub fn process_exit_code(&self, propagate_exit: bool) -> i32 {
        if !propagate_exit {
            return 0;
        }
        self.exit_code.unwrap_or(1)
    }
}

/// Runs the whole launch sequence for `config`.
pub async fn launch(config: &LaunchConfig) -> LaunchReport {
    // Step 1: clear earlier instances.
    let cleared_previous = daemon::clear_previous(config).await;

    // Step 2: start the daemon in the background.
    let mut handle = match DaemonHandle::spawn(config) {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!("{} ({})", e, e.suggestion());
            None
        }
    };

    let ready = match handle.as_mut() {
        Some(handle) => {
            let state = handle
                .wait_ready(Duration::from_millis(config.ready_timeout_ms))
                .await;
            log_ready_state(config, state);
            Some(state)
        }
        None => None,
    };

    // Step 3: the main program, blocking.
    let command = MainCommand::from_env(config);
    tracing::info!("Running main program: {}", command);
    let (main_started, exit_code) = match runner::run(&command).await {
        Ok(code) => (true, code),
        Err(e) => {
            tracing::warn!("Main program did not run: {}", e);
            (false, None)
        }
    };

    // Step 4: teardown, regardless of step 3.
    let daemon_pid = handle.as_ref().map(DaemonHandle::pid);
    let daemon_stopped = match handle {
        Some(handle) => {
            match handle
                .terminate(Duration::from_millis(config.stop_grace_ms))
                .await
            {
                Ok(status) => {
                    tracing::info!("Daemon stopped ({})", status);
                    true
                }
                Err(e) => {
                    tracing::warn!("Ignoring daemon teardown failure: {}", e);
                    false
                }
            }
        }
        None => false,
    };

    LaunchReport {
        cleared_previous,
        daemon_pid,
        ready,
        exit_code,
        main_started,
        daemon_stopped,
    }
}

/// Stops whatever daemon a previous run left behind.
///
/// Used by the `stop` command. Returns true if anything was terminated.
pub async fn stop(config: &LaunchConfig) -> bool {
    daemon::clear_previous(config).await
}

fn log_ready_state(config: &LaunchConfig, state: ReadyState) {
    match state {
        ReadyState::Ready => tracing::info!("Daemon socket ready at {:?}", config.socket_path),
        ReadyState::Skipped => tracing::debug!("Socket readiness check disabled"),
        ReadyState::TimedOut => tracing::warn!(
            "Socket {:?} did not appear within {}ms, continuing anyway",
            config.socket_path,
            config.ready_timeout_ms
        ),
        ReadyState::Exited(code) => tracing::warn!(
            "Daemon exited early (status {:?}), see {:?}; continuing anyway",
            code,
            config.log_path
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(exit_code: Option<i32>) -> LaunchReport {
        LaunchReport {
            cleared_previous: false,
            daemon_pid: Some(100),
            ready: Some(ReadyState::Ready),
            exit_code,
            main_started: true,
            daemon_stopped: true,
        }
    }

    #[test]
    fn test_exit_code_not_propagated() {
        assert_eq!(report(Some(3)).process_exit_code(false), 0);
        assert_eq!(report(None).process_exit_code(false), 0);
    }

    #[test]
    fn test_exit_code_propagated() {
        assert_eq!(report(Some(0)).process_exit_code(true), 0);
        assert_eq!(report(Some(3)).process_exit_code(true), 3);
        assert_eq!(report(None).process_exit_code(true), 1);
    }

    #[test]
    fn test_socket_ready_only_when_ready() {
        let with = |ready| LaunchReport {
            ready,
            ..report(Some(0))
        };
        assert!(with(Some(ReadyState::Ready)).socket_ready());
        assert!(!with(Some(ReadyState::Skipped)).socket_ready());
        assert!(!with(Some(ReadyState::TimedOut)).socket_ready());
        assert!(!with(None).socket_ready());
    }

    #[tokio::test]
    async fn test_launch_survives_missing_daemon_and_program() {
        let dir = tempfile::tempdir().unwrap();
        let config = LaunchConfig {
            daemon_binary: dir.path().join("no-daemon").to_string_lossy().into_owned(),
            socket_path: dir.path().join("sock"),
            log_path: dir.path().join("d.log"),
            pid_path: dir.path().join("d.pid"),
            project_dir: dir.path().join("missing-project"),
            elevate: false,
            sweep_stale: false,
            ..LaunchConfig::default()
        };

        let report = launch(&config).await;
        assert_eq!(report.daemon_pid, None);
        assert_eq!(report.ready, None);
        assert!(!report.socket_ready());
        assert!(!report.main_started);
        assert!(!report.daemon_stopped);
        assert_eq!(report.process_exit_code(false), 0);
    }
}
