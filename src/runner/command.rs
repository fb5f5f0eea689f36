//! Building the main-program command line.
//!
//! Activating a virtual environment amounts to three environment changes:
//! `VIRTUAL_ENV` points at the venv, the venv's `bin/` goes first on
//! `PATH`, and `PYTHONHOME` is unset. Under `sudo` the environment is reset,
//! so the values are passed through `env` on the elevated side.

use std::env;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::LaunchConfig;

/// Socket variable read by ydotool clients.
pub const SOCKET_ENV: &str = "YDOTOOL_SOCKET";

/// A fully resolved main-program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Variables set on the spawned process.
    pub envs: Vec<(String, String)>,
    /// Variables removed from the spawned process.
    pub env_remove: Vec<String>,
    pub current_dir: PathBuf,
    /// Arguments the script receives after its own path.
    pub script_args: Vec<String>,
}

impl MainCommand {
    /// Builds the invocation for `config`, forwarding `caller_path` as the
    /// caller's `PATH`.
    #[must_use]
    pub fn build(config: &LaunchConfig, caller_path: Option<&str>) -> Self {
        let current_dir = absolutize(&config.project_dir);
        let venv = absolutize(&config.resolved_venv_dir());
        let venv_bin = venv.join("bin");

        let activated_path = activated_path(&venv_bin, caller_path);
        let python = interpreter(&venv_bin, &config.python);

        let mut script_args = Vec::new();
        if config.global_mode {
            script_args.push("--global".to_string());
        }
        script_args.push("--device".to_string());
        script_args.push(config.device.clone());

        let activation = vec![
            ("PATH".to_string(), activated_path),
            ("VIRTUAL_ENV".to_string(), venv.to_string_lossy().into_owned()),
            (
                SOCKET_ENV.to_string(),
                config.socket_path.to_string_lossy().into_owned(),
            ),
        ];

        if config.elevate {
            let mut args = vec!["env".to_string()];
            args.extend(activation.iter().map(|(k, v)| format!("{}={}", k, v)));
            args.push(python);
            args.push(config.entry_point.clone());
            args.extend(script_args.iter().cloned());

            Self {
                program: config.sudo_binary.clone(),
                args,
                envs: Vec::new(),
                env_remove: Vec::new(),
                current_dir,
                script_args,
            }
        } else {
            let mut args = vec![config.entry_point.clone()];
            args.extend(script_args.iter().cloned());

            Self {
                program: python,
                args,
                envs: activation,
                env_remove: vec!["PYTHONHOME".to_string()],
                current_dir,
                script_args,
            }
        }
    }

    /// Builds the invocation using this process's `PATH`.
    #[must_use]
    pub fn from_env(config: &LaunchConfig) -> Self {
        let caller_path = env::var("PATH").ok();
        Self::build(config, caller_path.as_deref())
    }
}

impl fmt::Display for MainCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(' ') {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// `<venv>/bin` followed by the caller's PATH entries.
fn activated_path(venv_bin: &Path, caller_path: Option<&str>) -> String {
    let mut entries = vec![venv_bin.to_path_buf()];
    if let Some(caller_path) = caller_path {
        entries.extend(env::split_paths(caller_path).filter(|p| !p.as_os_str().is_empty()));
    }
    env::join_paths(entries)
        .unwrap_or_else(|_| OsString::from(venv_bin.as_os_str()))
        .to_string_lossy()
        .into_owned()
}

/// The venv interpreter when present, otherwise the bare name for PATH lookup.
fn interpreter(venv_bin: &Path, python: &str) -> String {
    let candidate = venv_bin.join(python);
    if candidate.exists() {
        candidate.to_string_lossy().into_owned()
    } else {
        tracing::warn!(
            "No interpreter at {:?}, falling back to '{}' on PATH",
            candidate,
            python
        );
        python.to_string()
    }
}

fn absolutize(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
