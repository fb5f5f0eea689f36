//! Launcher configuration.
//!
//! All values the launcher needs are gathered in [`LaunchConfig`]. Every
//! field has a default matching the fixed values of the original launch
//! script, so an empty or absent config file yields a working setup.
//!
//! Precedence: built-in defaults, then the JSON config file, then CLI flags.
//!
//! # Example
//!
//! ```
//! use ydo_launcher::config::LaunchConfig;
//!
//! let config = LaunchConfig::default();
//! assert_eq!(config.socket_path.to_str(), Some("/tmp/.ydotool_socket"));
//! assert_eq!(config.socket_mode, 0o660);
//! assert_eq!(config.device, "/dev/input/event3");
//! ```

pub mod error;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use error::{ConfigError, Result};

/// Directory name under the user config dir.
const CONFIG_DIR_NAME: &str = "ydo-launcher";

/// Config file name.
const CONFIG_FILE_NAME: &str = "config.json";

fn default_daemon_binary() -> String {
    "ydotoold".to_string()
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/tmp/.ydotool_socket")
}

fn default_socket_mode() -> u32 {
    0o660
}

fn default_log_path() -> PathBuf {
    PathBuf::from("/tmp/ydotoold.log")
}

fn default_pid_path() -> PathBuf {
    PathBuf::from("/tmp/ydotoold.pid")
}

fn default_project_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_venv_dir() -> PathBuf {
    PathBuf::from(".venv")
}

fn default_python() -> String {
    "python".to_string()
}

fn default_entry_point() -> String {
    "main.py".to_string()
}

fn default_device() -> String {
    "/dev/input/event3".to_string()
}

fn default_sudo_binary() -> String {
    "sudo".to_string()
}

fn default_true() -> bool {
    true
}

fn default_ready_timeout_ms() -> u64 {
    2000
}

fn default_stop_grace_ms() -> u64 {
    1500
}

/// Renders permission bits the way the daemon takes them, e.g. `0660`.
#[must_use]
pub fn format_mode(mode: u32) -> String {
    format!("{:04o}", mode)
}

// ============================================================================
// SocketOwner
// ============================================================================

/// Ownership applied to the daemon socket, passed as `-o <uid>:<gid>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketOwner {
    pub uid: u32,
    pub gid: u32,
}

impl SocketOwner {
    /// Real user and group IDs of the calling process.
    #[must_use]
    pub fn current() -> Self {
        Self {
            uid: nix::unistd::getuid().as_raw(),
            gid: nix::unistd::getgid().as_raw(),
        }
    }
}

impl fmt::Display for SocketOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.uid, self.gid)
    }
}

// ============================================================================
// LaunchConfig
// ============================================================================

/// Everything one launcher run needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchConfig {
    /// Daemon executable, resolved through PATH unless absolute.
    #[serde(default = "default_daemon_binary")]
    pub daemon_binary: String,

    /// Socket the daemon listens on.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Permission bits applied to the socket.
    #[serde(default = "default_socket_mode", with = "octal_mode")]
    pub socket_mode: u32,

    /// Socket ownership. `None` resolves to the caller's real uid/gid.
    #[serde(default)]
    pub socket_owner: Option<SocketOwner>,

    /// Combined daemon stdout/stderr, truncated on every run.
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,

    /// PID file for the daemon started by the launcher.
    #[serde(default = "default_pid_path")]
    pub pid_path: PathBuf,

    /// Working directory of the main program.
    #[serde(default = "default_project_dir")]
    pub project_dir: PathBuf,

    /// Virtual environment, relative paths are resolved against `project_dir`.
    #[serde(default = "default_venv_dir")]
    pub venv_dir: PathBuf,

    /// Interpreter name inside the venv's `bin/`.
    #[serde(default = "default_python")]
    pub python: String,

    /// Script executed by the interpreter.
    #[serde(default = "default_entry_point")]
    pub entry_point: String,

    /// Pass `--global` to the main program.
    #[serde(default = "default_true")]
    pub global_mode: bool,

    /// Input device passed as `--device`.
    #[serde(default = "default_device")]
    pub device: String,

    /// Run the main program through `sudo_binary`.
    #[serde(default = "default_true")]
    pub elevate: bool,

    #[serde(default = "default_sudo_binary")]
    pub sudo_binary: String,

    /// Kill untracked daemon instances by name before starting.
    #[serde(default = "default_true")]
    pub sweep_stale: bool,

    /// How long to wait for the socket to appear. Zero skips the check.
    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,

    /// Delay between SIGTERM and SIGKILL on teardown.
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,

    /// Exit with the main program's exit code instead of 0.
    #[serde(default)]
    pub propagate_exit: bool,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            daemon_binary: default_daemon_binary(),
            socket_path: default_socket_path(),
            socket_mode: default_socket_mode(),
            socket_owner: None,
            log_path: default_log_path(),
            pid_path: default_pid_path(),
            project_dir: default_project_dir(),
            venv_dir: default_venv_dir(),
            python: default_python(),
            entry_point: default_entry_point(),
            global_mode: true,
            device: default_device(),
            elevate: true,
            sudo_binary: default_sudo_binary(),
            sweep_stale: true,
            ready_timeout_ms: default_ready_timeout_ms(),
            stop_grace_ms: default_stop_grace_ms(),
            propagate_exit: false,
        }
    }
}

impl LaunchConfig {
    /// Default config file location, `<config_dir>/ydo-launcher/config.json`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Loads the configuration.
    ///
    /// An explicit `path` must exist and parse. Without one, the default
    /// location is read if present and built-in defaults are used otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// resulting configuration fails [`LaunchConfig::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => {
                    tracing::debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Checks values the launcher cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.daemon_binary.trim().is_empty() {
            return Err(ConfigError::invalid("daemon_binary", "must not be empty"));
        }
        if self.entry_point.trim().is_empty() {
            return Err(ConfigError::invalid("entry_point", "must not be empty"));
        }
        if self.device.trim().is_empty() {
            return Err(ConfigError::invalid("device", "must not be empty"));
        }
        if !Path::new(&self.device).is_absolute() {
            return Err(ConfigError::invalid(
                "device",
                format!("{:?} must be an absolute path", self.device),
            ));
        }
        if self.python.trim().is_empty() {
            return Err(ConfigError::invalid("python", "must not be empty"));
        }
        if self.socket_mode & !0o7777 != 0 {
            return Err(ConfigError::invalid(
                "socket_mode",
                format!("{:o} is not a permission mode", self.socket_mode),
            ));
        }
        if self.elevate && self.sudo_binary.trim().is_empty() {
            return Err(ConfigError::invalid("sudo_binary", "must not be empty"));
        }
        Ok(())
    }

    /// Venv directory with relative paths resolved against `project_dir`.
    #[must_use]
    pub fn resolved_venv_dir(&self) -> PathBuf {
        if self.venv_dir.is_absolute() {
            self.venv_dir.clone()
        } else {
            self.project_dir.join(&self.venv_dir)
        }
    }

    /// Socket owner, falling back to the caller's real uid/gid.
    #[must_use]
    pub fn owner(&self) -> SocketOwner {
        self.socket_owner.unwrap_or_else(SocketOwner::current)
    }

    /// Applies command-line overrides on top of this configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(device) = &overrides.device {
            self.device = device.clone();
        }
        if let Some(venv) = &overrides.venv_dir {
            self.venv_dir = venv.clone();
        }
        if let Some(dir) = &overrides.project_dir {
            self.project_dir = dir.clone();
        }
        if let Some(socket) = &overrides.socket_path {
            self.socket_path = socket.clone();
        }
        if let Some(log) = &overrides.log_path {
            self.log_path = log.clone();
        }
        if let Some(pid) = &overrides.pid_path {
            self.pid_path = pid.clone();
        }
        if let Some(daemon) = &overrides.daemon_binary {
            self.daemon_binary = daemon.clone();
        }
        if let Some(ms) = overrides.ready_timeout_ms {
            self.ready_timeout_ms = ms;
        }
        if overrides.no_elevate {
            self.elevate = false;
        }
        if overrides.no_sweep {
            self.sweep_stale = false;
        }
        if overrides.no_global {
            self.global_mode = false;
        }
        if overrides.propagate_exit {
            self.propagate_exit = true;
        }
    }
}

/// Values supplied on the command line. `None`/`false` leaves the config as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub device: Option<String>,
    pub venv_dir: Option<PathBuf>,
    pub project_dir: Option<PathBuf>,
    pub socket_path: Option<PathBuf>,
    pub log_path: Option<PathBuf>,
    pub pid_path: Option<PathBuf>,
    pub daemon_binary: Option<String>,
    pub ready_timeout_ms: Option<u64>,
    pub no_elevate: bool,
    pub no_sweep: bool,
    pub no_global: bool,
    pub propagate_exit: bool,
}

/// Serializes permission bits as an octal string (`"0660"`). Plain JSON
/// numbers are accepted on input and read as octal digits.
mod octal_mode {
    use serde::de::{self, Deserializer, Visitor};
    use serde::Serializer;
    use std::fmt;

    pub fn serialize<S: Serializer>(mode: &u32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_mode(*mode))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        struct ModeVisitor;

        impl Visitor<'_> for ModeVisitor {
            type Value = u32;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an octal permission mode such as \"0660\"")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<u32, E> {
                let digits = v.trim().trim_start_matches("0o");
                u32::from_str_radix(digits, 8).map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<u32, E> {
                self.visit_str(&v.to_string())
            }
        }

        deserializer.deserialize_any(ModeVisitor)
    }
}
