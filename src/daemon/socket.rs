//! Socket inspection and readiness polling.

use std::fs;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{sleep, Instant};

/// Interval between readiness checks.
const POLL_INTERVAL_MS: u64 = 50;

/// Snapshot of the daemon socket file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SocketStatus {
    pub exists: bool,
    /// Whether the path is an actual Unix socket rather than a plain file.
    pub is_socket: bool,
    /// Permission bits only (`st_mode & 0o7777`).
    pub mode: Option<u32>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
}

impl SocketStatus {
    fn missing() -> Self {
        Self {
            exists: false,
            is_socket: false,
            mode: None,
            uid: None,
            gid: None,
        }
    }

    /// True if the socket exists with exactly this mode and owner.
    #[must_use]
    pub fn matches(&self, mode: u32, uid: u32, gid: u32) -> bool {
        self.exists && self.mode == Some(mode) && self.uid == Some(uid) && self.gid == Some(gid)
    }
}

/// Reads mode and ownership of `path` without following symlinks.
#[must_use]
pub fn socket_status(path: &Path) -> SocketStatus {
    match fs::symlink_metadata(path) {
        Ok(meta) => SocketStatus {
            exists: true,
            is_socket: meta.file_type().is_socket(),
            mode: Some(meta.mode() & 0o7777),
            uid: Some(meta.uid()),
            gid: Some(meta.gid()),
        },
        Err(_) => SocketStatus::missing(),
    }
}

/// Removes whatever an earlier daemon left at `path`.
///
/// Called after earlier instances are stopped and before a new daemon
/// starts, so readiness polling only ever sees the new daemon's socket.
/// Returns true if something was removed. Failures are logged.
pub fn remove_stale_socket(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!("Removed stale socket {:?}", path);
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!("Could not remove stale socket {:?}: {}", path, e);
            false
        }
    }
}

/// Polls until `path` exists or `timeout` elapses.
///
/// `is_alive` is consulted between polls so a daemon that died early ends
/// the wait immediately. Returns true once the path exists.
pub async fn wait_for_path<F>(path: &Path, timeout: Duration, mut is_alive: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if path.exists() {
            return true;
        }
        if !is_alive() || Instant::now() >= deadline {
            return path.exists();
        }
        sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
    }
}
