//! Process management

use std::path::Path;

use crate::command::Command;
use crate::error;

/// Identifier of an OS process (or of the process group it leads).
pub type ProcessId = i32;

/// Signal number delivered by the terminal's interrupt character.
#[cfg(unix)]
const SIGINT: i32 = nix::libc::SIGINT;
#[cfg(not(unix))]
const SIGINT: i32 = 2;

/// How a process ended, as reported by waiting on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessStatus {
    /// The process exited normally with the given status.
    Exited(i32),
    /// The process was terminated by the given signal.
    Signaled(i32),
}

impl ProcessStatus {
    /// Synthetic status for something that succeeded without a process.
    pub const SUCCESS: Self = Self::Exited(0);
    /// Synthetic status for something that failed without a process.
    pub const FAILURE: Self = Self::Exited(1);
    /// Status used by a child whose program image could not be replaced.
    pub const NOT_FOUND: Self = Self::Exited(127);

    /// Returns whether the process exited normally with status 0.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }

    /// Returns whether the process was killed by the terminal's interrupt signal.
    pub const fn was_interrupted(&self) -> bool {
        matches!(self, Self::Signaled(SIGINT))
    }

    /// Returns the shell-style exit code: the low 8 bits of a normal exit status,
    /// or 128 plus the signal number.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Exited(code) => (*code & 0xFF) as u8,
            Self::Signaled(signal) => 128u8.wrapping_add((*signal & 0x7F) as u8),
        }
    }
}

/// Policy for how to manage spawned external processes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessGroupPolicy {
    /// Place the process in a new process group, led by the process itself.
    NewProcessGroup,
    /// Place the process in the given, already existing process group.
    JoinProcessGroup(ProcessId),
    /// Leave the process in the shell's own process group.
    SameProcessGroup,
}

impl ProcessGroupPolicy {
    /// Returns the policy to use for the next stage of a pipeline whose earlier
    /// stages were placed in `group`.
    pub const fn for_next_stage(self, group: Option<ProcessId>) -> Self {
        match (self, group) {
            (Self::SameProcessGroup, _) => Self::SameProcessGroup,
            (_, Some(group)) => Self::JoinProcessGroup(group),
            (_, None) => Self::NewProcessGroup,
        }
    }
}

/// Creates and waits on child processes.
///
/// The real implementation forks and execs; tests substitute a launcher that
/// returns scripted statuses without creating processes.
pub trait ProcessLauncher {
    /// Starts a child running the given command and returns its process ID.
    ///
    /// # Arguments
    ///
    /// * `command` - The command to run; its I/O targets are applied in the child.
    /// * `working_dir` - The directory the child should start in.
    /// * `group` - Which process group the child should be placed in.
    fn spawn(
        &mut self,
        command: &Command,
        working_dir: &Path,
        group: ProcessGroupPolicy,
    ) -> Result<ProcessId, error::Error>;

    /// Blocks until the given child exits.
    fn wait(&mut self, pid: ProcessId) -> Result<ProcessStatus, error::Error>;

    /// Checks without blocking whether the given child has exited.
    fn try_wait(&mut self, pid: ProcessId) -> Result<Option<ProcessStatus>, error::Error>;
}
