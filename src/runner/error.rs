//! Main-program runner error types.

use std::io;

use thiserror::Error;

/// Errors from running the main program.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The program (or `sudo`) could not be started.
    #[error("Failed to start '{0}': {1}")]
    Spawn(String, #[source] io::Error),

    /// Waiting on the program failed.
    #[error("Failed to wait for '{0}': {1}")]
    Wait(String, #[source] io::Error),

    /// The working directory does not exist.
    #[error("Project directory {0:?} does not exist")]
    ProjectDirMissing(std::path::PathBuf),
}

/// Result type for runner operations.
pub type Result<T> = std::result::Result<T, RunnerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_spawn() {
        let err = RunnerError::Spawn(
            "sudo".to_string(),
            io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        );
        assert!(err.to_string().contains("sudo"));
        assert!(err.to_string().contains("No such file"));
    }

    #[test]
    fn test_error_display_project_dir() {
        let err = RunnerError::ProjectDirMissing("/opt/missing".into());
        assert!(err.to_string().contains("/opt/missing"));
    }
}
