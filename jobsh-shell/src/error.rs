use std::path::PathBuf;

use crate::config::ConfigLoadError;

/// Errors that end the shell.
#[derive(thiserror::Error, Debug)]
pub enum ShellError {
    /// An error from the shell core.
    #[error("{0}")]
    ShellError(#[from] jobsh_core::Error),

    /// A script file could not be opened.
    #[error("{0}: {1}")]
    ScriptOpenFailure(PathBuf, std::io::Error),

    /// An explicitly requested configuration file could not be loaded.
    #[error("{0}: {1}")]
    ConfigLoadFailure(PathBuf, ConfigLoadError),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The tracing configuration could not be updated.
    #[error("failed to update tracing configuration")]
    TracingReloadFailure,
}
