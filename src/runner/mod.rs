//! Running the main program.
//!
//! The main program runs in the foreground with the launcher's stdio. The
//! launcher blocks until it exits and never interprets its output.

pub mod command;
pub mod error;

use std::process::Stdio;

use tokio::process::Command;

pub use command::{MainCommand, SOCKET_ENV};
pub use error::{Result, RunnerError};

/// Runs `command` to completion.
///
/// A Ctrl-C while waiting is logged and the wait continues. The terminal
/// delivers the same SIGINT to the child, and the launcher must outlive it
/// to tear the daemon down.
///
/// # Returns
/// The exit code, or `None` if the program was killed by a signal.
///
/// # Errors
/// Returns an error if the working directory is missing or the program
/// cannot be spawned or waited on.
pub async fn run(command: &MainCommand) -> Result<Option<i32>> {
    if !command.current_dir.is_dir() {
        return Err(RunnerError::ProjectDirMissing(command.current_dir.clone()));
    }

    tracing::debug!("Running {} in {:?}", command, command.current_dir);

    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .current_dir(&command.current_dir)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    for (key, value) in &command.envs {
        cmd.env(key, value);
    }
    for key in &command.env_remove {
        cmd.env_remove(key);
    }

    let mut child = cmd
        .spawn()
        .map_err(|e| RunnerError::Spawn(command.program.clone(), e))?;

    let status = loop {
        tokio::select! {
            status = child.wait() => {
                break status.map_err(|e| RunnerError::Wait(command.program.clone(), e))?;
            }
            signal = tokio::signal::ctrl_c() => {
                if signal.is_ok() {
                    tracing::info!("Interrupted, waiting for main program to exit");
                } else {
                    // No signal handler available; just wait.
                    break child
                        .wait()
                        .await
                        .map_err(|e| RunnerError::Wait(command.program.clone(), e))?;
                }
            }
        }
    };

    match status.code() {
        Some(code) => tracing::info!("Main program exited with status {}", code),
        None => tracing::warn!("Main program terminated by signal"),
    }

    Ok(status.code())
}
