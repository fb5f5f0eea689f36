//! Daemon management error types.
//!
//! Nearly every daemon failure is recoverable: the launcher logs it and
//! keeps going, so the main program still runs and teardown still happens.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while sweeping, starting, or stopping the daemon.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// The log file could not be created or truncated.
    #[error("Failed to open daemon log {path:?}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The daemon binary could not be spawned.
    #[error("Failed to spawn daemon '{binary}': {source}")]
    Spawn {
        binary: String,
        #[source]
        source: io::Error,
    },

    /// The PID file could not be written or removed.
    #[error("Failed to update PID file {path:?}: {source}")]
    PidFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The name-based sweep command could not run or reported an error.
    #[error("Failed to sweep '{0}' processes: {1}")]
    Sweep(String, String),

    /// Sending a signal to the daemon failed.
    #[error("Failed to signal daemon (PID {0}): {1}")]
    Signal(u32, #[source] nix::Error),

    /// Waiting on the daemon process failed.
    #[error("Failed to wait for daemon (PID {0}): {1}")]
    Wait(u32, #[source] io::Error),
}

impl DaemonError {
    /// Returns true if the launcher may continue past this error.
    ///
    /// The launcher never aborts because of the daemon. A failed spawn
    /// means the main program will fail to reach the socket on its own.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        true
    }

    /// A hint for the user about how to resolve this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::LogFile { .. } => "Check that the log directory exists and is writable",
            Self::Spawn { .. } => "Install ydotool and make sure ydotoold is on PATH",
            Self::PidFile { .. } => "Check permissions on the PID file location",
            Self::Sweep(_, _) => "Make sure pkill (procps) is installed",
            Self::Signal(_, _) => "The daemon may be owned by another user; stop it manually",
            Self::Wait(_, _) => "Check the daemon log for details",
        }
    }
}

/// Result type for daemon operations.
pub type Result<T> = std::result::Result<T, DaemonError>;
