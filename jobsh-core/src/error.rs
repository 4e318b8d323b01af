use std::io::Write;
use std::path::PathBuf;

use jobsh_parser::RedirectKind;

use crate::processes::ProcessId;
use crate::trace_categories;

/// Monolithic error type for the shell
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A child process could not be created.
    #[cfg(unix)]
    #[error("failed to create child process: {0}")]
    ChildCreationFailure(nix::errno::Errno),

    /// A pipe could not be created.
    #[error("failed to create pipe: {0}")]
    PipeCreationFailure(std::io::Error),

    /// Waiting on a child process failed.
    #[cfg(unix)]
    #[error("failed to wait for process {0}: {1}")]
    WaitFailure(ProcessId, nix::errno::Errno),

    /// The indicated process is not a child of this shell (or was already reaped).
    #[error("no such child process: {0}")]
    NoSuchChild(ProcessId),

    /// A redirection target could not be opened.
    #[error("{0}: {1}")]
    RedirectionFailure(String, std::io::Error),

    /// The working directory could not be changed to the given path.
    #[error("cd: {0}: {1}")]
    ChangeDirectoryFailure(PathBuf, std::io::Error),

    /// The given path is not a directory.
    #[error("cd: {0}: not a directory")]
    NotADirectory(PathBuf),

    /// `cd` was run without an argument and `HOME` is not set.
    #[error("cd: HOME not set")]
    HomeNotSet,

    /// A builtin was given more arguments than it accepts.
    #[error("{0}: too many arguments")]
    TooManyArguments(&'static str),

    /// `exit` was given a non-numeric status.
    #[error("exit: {0}: numeric argument required")]
    NumericArgumentRequired(String),

    /// The command line could not be tokenized.
    #[error("syntax error: {0}")]
    TokenizerError(#[from] jobsh_parser::TokenizerError),

    /// The command line is not valid UTF-8.
    #[error("syntax error: line is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// An operator appeared where a command was expected.
    #[error("syntax error near unexpected token `{0}'")]
    UnexpectedToken(String),

    /// A redirection operator was not followed by a file name.
    #[error("syntax error: expected file name after `{0}'")]
    MissingRedirectionTarget(RedirectKind),

    /// A conditional operator was derived from something other than `&&` or `||`.
    #[error("internal error: unexpected conditional operator `{0}'")]
    MalformedConditional(String),

    /// An argument could not be passed to a program because it contains a NUL byte.
    #[error("argument contains a NUL byte: {0}")]
    NulInArgument(#[from] std::ffi::NulError),

    /// An I/O error occurred.
    #[error("i/o error: {0}")]
    IoError(#[from] std::io::Error),

    /// A system error occurred.
    #[cfg(unix)]
    #[error("system error: {0}")]
    ErrnoError(#[from] nix::errno::Errno),
}

/// Writes a diagnostic for the given error to the shell's standard error.
///
/// # Arguments
///
/// * `error` - The error to report.
pub(crate) fn report(error: &Error) {
    tracing::debug!(target: trace_categories::COMMANDS, "reporting error: {error:?}");

    // Nothing sensible can be done if stderr itself is broken.
    let _ = writeln!(std::io::stderr(), "jobsh: {error}");
}
