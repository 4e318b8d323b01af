//! Results of running command lists.

use crate::processes::ProcessStatus;

/// Encapsulates the result of running a command list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    /// The numerical exit code of the last pipeline that ran.
    pub exit_code: u8,
    /// Whether the shell should exit after this list.
    pub exit_shell: bool,
}

impl From<ProcessStatus> for ExecutionResult {
    fn from(status: ProcessStatus) -> Self {
        Self::new(status.exit_code())
    }
}

impl ExecutionResult {
    /// Returns a new `ExecutionResult` with the given exit code.
    ///
    /// # Arguments
    ///
    /// * `exit_code` - The exit code of the command.
    pub const fn new(exit_code: u8) -> Self {
        Self {
            exit_code,
            exit_shell: false,
        }
    }

    /// Returns a new `ExecutionResult` with an exit code of 0.
    pub const fn success() -> Self {
        Self::new(0)
    }

    /// Returns a result requesting that the shell exit with the given code.
    pub const fn exit(exit_code: u8) -> Self {
        Self {
            exit_code,
            exit_shell: true,
        }
    }

    /// Returns whether the command was successful.
    pub const fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}
