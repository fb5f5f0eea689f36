//! ydo-launcher library
//!
//! This library provides the pieces behind the `ydo-launcher` binary:
//! - Configuration with defaults, a JSON config file, and CLI overrides
//! - Lifecycle management for the `ydotoold` input-injection daemon
//! - Running the Python main program from its virtual environment under sudo
//! - The launch sequence tying both together, with best-effort cleanup
//! - CLI command parsing and display utilities

pub mod cli;
pub mod config;
pub mod daemon;
pub mod launcher;
pub mod runner;

// Re-export commonly used types for convenience
pub use config::{ConfigError, ConfigOverrides, LaunchConfig, SocketOwner};
pub use daemon::{DaemonError, DaemonHandle, DaemonStatus, ReadyState, SocketStatus};
pub use launcher::{launch, LaunchReport};
pub use runner::{MainCommand, RunnerError};
