//! Command definitions for the launcher CLI.
//!
//! Uses clap derive macro for argument parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::ConfigOverrides;

// ============================================================================
// CLI Structure
// ============================================================================

/// ydo-launcher - run an input-device program alongside ydotoold
#[derive(Parser, Debug)]
#[command(
    name = "ydo-launcher",
    version,
    about = "Start ydotoold, run the main program with elevated privileges, then stop ydotoold",
    long_about = "Starts the ydotoold input-injection daemon on a private socket, runs the \n\
                  Python main program from its virtual environment under sudo, and tears the \n\
                  daemon down when the program exits. Running without a subcommand is the \n\
                  same as `run`.",
    propagate_version = true
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a JSON config file
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

// ============================================================================
// Subcommands
// ============================================================================

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the daemon, run the main program, and stop the daemon
    Run(RunArgs),

    /// Stop a daemon left behind by an earlier run
    Stop {
        /// Only stop the daemon recorded in the PID file
        #[arg(long)]
        no_sweep: bool,
    },

    /// Show daemon and socket status
    Status {
        /// Print status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell type for completion script
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ============================================================================
// Run Command Arguments
// ============================================================================

/// Arguments for the run command
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Input device passed to the main program
    #[arg(short, long, value_name = "PATH", value_parser = validate_device)]
    pub device: Option<String>,

    /// Virtual environment directory
    #[arg(long = "venv", value_name = "DIR")]
    pub venv_dir: Option<PathBuf>,

    /// Working directory of the main program
    #[arg(short, long, value_name = "DIR")]
    pub project_dir: Option<PathBuf>,

    /// Daemon socket path
    #[arg(short, long = "socket", value_name = "PATH")]
    pub socket_path: Option<PathBuf>,

    /// Daemon log file (truncated on each run)
    #[arg(short, long = "log", value_name = "PATH")]
    pub log_path: Option<PathBuf>,

    /// Daemon PID file
    #[arg(long = "pid-file", value_name = "PATH")]
    pub pid_path: Option<PathBuf>,

    /// Daemon binary
    #[arg(long = "daemon", value_name = "BIN")]
    pub daemon_binary: Option<String>,

    /// Milliseconds to wait for the daemon socket (0 disables the check)
    #[arg(long = "ready-timeout", value_name = "MS")]
    pub ready_timeout_ms: Option<u64>,

    /// Run the main program without sudo
    #[arg(long)]
    pub no_elevate: bool,

    /// Do not kill other daemon instances by name before starting
    #[arg(long)]
    pub no_sweep: bool,

    /// Do not pass --global to the main program
    #[arg(long)]
    pub no_global: bool,

    /// Exit with the main program's exit code
    #[arg(long)]
    pub propagate_exit: bool,
}

impl RunArgs {
    /// Converts the flags into config overrides.
    #[must_use]
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            device: self.device.clone(),
            venv_dir: self.venv_dir.clone(),
            project_dir: self.project_dir.clone(),
            socket_path: self.socket_path.clone(),
            log_path: self.log_path.clone(),
            pid_path: self.pid_path.clone(),
            daemon_binary: self.daemon_binary.clone(),
            ready_timeout_ms: self.ready_timeout_ms,
            no_elevate: self.no_elevate,
            no_sweep: self.no_sweep,
            no_global: self.no_global,
            propagate_exit: self.propagate_exit,
        }
    }
}

// ============================================================================
// Validation Functions
// ============================================================================

/// Validates the device path.
///
/// - Must not be empty
/// - Must be an absolute path
fn validate_device(s: &str) -> Result<String, String> {
    if s.trim().is_empty() {
        return Err("device path must not be empty".to_string());
    }
    if !s.starts_with('/') {
        return Err("device path must be absolute, e.g. /dev/input/event3".to_string());
    }
    Ok(s.to_string())
}

// ============================================================================
// Tests
// ============================================================================
