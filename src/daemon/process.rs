//! Spawning and stopping the tracked daemon process.
//!
//! The daemon is started in its own process group so a Ctrl-C aimed at the
//! foreground main program does not reach it. It is stopped through the
//! PID captured at spawn time rather than by name.

use std::fs::{self, File, OpenOptions};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tokio::time::timeout;

use super::error::{DaemonError, Result};
use super::socket::{remove_stale_socket, wait_for_path};
use super::sweep::remove_pid_file;
use crate::config::{format_mode, LaunchConfig, SocketOwner};

// ============================================================================
// DaemonArgs
// ============================================================================

/// Command-line arguments for the daemon: `-p <socket> -P <mode> -o <uid>:<gid>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonArgs {
    pub socket_path: PathBuf,
    pub mode: u32,
    pub owner: SocketOwner,
}

impl DaemonArgs {
    #[must_use]
    pub fn from_config(config: &LaunchConfig) -> Self {
        Self {
            socket_path: config.socket_path.clone(),
            mode: config.socket_mode,
            owner: config.owner(),
        }
    }

    /// Renders the arguments in the order the daemon expects.
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        vec![
            "-p".to_string(),
            self.socket_path.to_string_lossy().into_owned(),
            "-P".to_string(),
            format_mode(self.mode),
            "-o".to_string(),
            self.owner.to_string(),
        ]
    }
}

// ============================================================================
// ReadyState
// ============================================================================

/// Outcome of waiting for the daemon socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    /// The socket path exists.
    Ready,
    /// The daemon exited before the socket appeared.
    Exited(Option<i32>),
    /// The timeout elapsed without the socket appearing.
    TimedOut,
    /// Readiness checking is disabled.
    Skipped,
}

impl ReadyState {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

// ============================================================================
// DaemonHandle
// ============================================================================

/// A daemon process started by this launcher.
#[derive(Debug)]
pub struct DaemonHandle {
    child: Child,
    pid: u32,
    pid_path: PathBuf,
    socket_path: PathBuf,
}

impl DaemonHandle {
    /// Spawns the daemon in the background.
    ///
    /// Anything left at the socket path is removed first. The log file is
    /// truncated and receives both stdout and stderr. The PID is written to
    /// `config.pid_path`. The daemon is not waited on.
    ///
    /// # Errors
    ///
    /// Returns an error if the log file cannot be opened or the binary
    /// cannot be spawned. A PID file write failure is only logged.
    pub fn spawn(config: &LaunchConfig) -> Result<Self> {
        let args = DaemonArgs::from_config(config).to_args();
        let (stdout, stderr) = open_log(&config.log_path)?;
        remove_stale_socket(&config.socket_path);

        tracing::debug!("Spawning {} {}", config.daemon_binary, args.join(" "));

        let mut std_cmd = std::process::Command::new(&config.daemon_binary);
        std_cmd
            .args(&args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .process_group(0);

        let child = Command::from(std_cmd)
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DaemonError::Spawn {
                binary: config.daemon_binary.clone(),
                source,
            })?;

        // A spawned child that has not been polled always reports its id.
        let pid = child.id().unwrap_or_default();

        if let Err(source) = fs::write(&config.pid_path, format!("{}\n", pid)) {
            tracing::warn!(
                "{}",
                DaemonError::PidFile {
                    path: config.pid_path.clone(),
                    source,
                }
            );
        }

        tracing::info!(
            "Started {} (PID: {}), logging to {:?}",
            config.daemon_binary,
            pid,
            config.log_path
        );

        Ok(Self {
            child,
            pid,
            pid_path: config.pid_path.clone(),
            socket_path: config.socket_path.clone(),
        })
    }

    /// PID of the daemon.
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Returns the exit status if the daemon has already exited.
    pub fn try_exit_status(&mut self) -> Option<ExitStatus> {
        self.child.try_wait().ok().flatten()
    }

    /// Waits until the socket exists, the daemon exits, or `limit` elapses.
    pub async fn wait_ready(&mut self, limit: Duration) -> ReadyState {
        if limit.is_zero() {
            return ReadyState::Skipped;
        }

        let mut exited = None;
        let child = &mut self.child;
        let ready = wait_for_path(&self.socket_path, limit, || match child.try_wait() {
            Ok(Some(status)) => {
                exited = Some(status);
                false
            }
            _ => true,
        })
        .await;

        match (ready, exited) {
            (true, _) => ReadyState::Ready,
            (false, Some(status)) => ReadyState::Exited(status.code()),
            (false, None) => ReadyState::TimedOut,
        }
    }

    /// Stops the daemon: SIGTERM, then SIGKILL after `grace`.
    ///
    /// A daemon that already exited counts as stopped. The PID file is
    /// removed in every case.
    ///
    /// # Returns
    /// The daemon's exit status once reaped.
    pub async fn terminate(mut self, grace: Duration) -> Result<ExitStatus> {
        let result = self.stop(grace).await;
        remove_pid_file(&self.pid_path)?;
        result
    }

    async fn stop(&mut self, grace: Duration) -> Result<ExitStatus> {
        if let Some(status) = self.try_exit_status() {
            tracing::debug!("Daemon (PID: {}) already exited: {}", self.pid, status);
            return Ok(status);
        }

        // PID 0 would signal our own process group.
        if self.pid == 0 {
            self.child
                .kill()
                .await
                .map_err(|e| DaemonError::Wait(self.pid, e))?;
            return self
                .child
                .wait()
                .await
                .map_err(|e| DaemonError::Wait(self.pid, e));
        }

        let pid = Pid::from_raw(self.pid as i32);
        match kill(pid, Signal::SIGTERM) {
            Ok(()) => tracing::debug!("Sent SIGTERM to daemon (PID: {})", self.pid),
            // Exited between try_wait and kill; reaped below.
            Err(nix::Error::ESRCH) => {}
            Err(e) => return Err(DaemonError::Signal(self.pid, e)),
        }

        match timeout(grace, self.child.wait()).await {
            Ok(status) => status.map_err(|e| DaemonError::Wait(self.pid, e)),
            Err(_) => {
                tracing::warn!(
                    "Daemon (PID: {}) ignored SIGTERM for {:?}, sending SIGKILL",
                    self.pid,
                    grace
                );
                self.child
                    .kill()
                    .await
                    .map_err(|e| DaemonError::Wait(self.pid, e))?;
                self.child
                    .wait()
                    .await
                    .map_err(|e| DaemonError::Wait(self.pid, e))
            }
        }
    }
}

/// Opens (truncating) the log file and returns two handles to it.
fn open_log(path: &Path) -> Result<(File, File)> {
    let to_err = |source: std::io::Error| DaemonError::LogFile {
        path: path.to_path_buf(),
        source,
    };
    let stdout = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(to_err)?;
    let stderr = stdout.try_clone().map_err(to_err)?;
    Ok((stdout, stderr))
}
