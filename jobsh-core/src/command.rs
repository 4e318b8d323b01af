//! Command records and the per-line command list.

use std::fmt::Display;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use jobsh_parser::{RedirectKind, Token};

use crate::error;
use crate::processes::{ProcessId, ProcessStatus};

/// Governs whether a command's successor runs, based on the command's exit status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConditionalOperator {
    /// The successor always runs.
    #[default]
    None,
    /// `&&`: the successor runs only if this command succeeded.
    And,
    /// `||`: the successor runs only if this command failed.
    Or,
}

impl ConditionalOperator {
    /// Returns whether the successor should run, given this command's status.
    pub const fn allows_successor(self, status: ProcessStatus) -> bool {
        match self {
            Self::None => true,
            Self::And => status.is_success(),
            Self::Or => !status.is_success(),
        }
    }
}

impl TryFrom<&Token> for ConditionalOperator {
    type Error = error::Error;

    fn try_from(token: &Token) -> Result<Self, Self::Error> {
        match token {
            Token::And => Ok(Self::And),
            Token::Or => Ok(Self::Or),
            other => Err(error::Error::MalformedConditional(other.to_string())),
        }
    }
}

/// The pair of descriptor numbers of one pipe; both commands of a
/// source/sink pair carry the same value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipeDescriptors {
    /// Descriptor of the read end.
    pub read: RawFd,
    /// Descriptor of the write end.
    pub write: RawFd,
}

/// A command's position relative to the pipes around it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipeRole {
    /// Not connected to any pipe.
    None,
    /// Standard output feeds the next command.
    Source,
    /// Standard input is fed by the previous command.
    Sink,
    /// A middle pipeline stage: both a sink and a source.
    Relay,
}

/// Where one of a command's standard streams points at launch time.
#[derive(Debug, Default)]
pub enum IoTarget {
    /// Inherit the shell's own stream.
    #[default]
    Inherit,
    /// One end of a pipe shared with an adjacent command.
    Pipe(OwnedFd),
    /// A file opened by a redirection.
    File(std::fs::File),
}

impl IoTarget {
    /// Returns the descriptor to duplicate onto the standard stream, if any.
    pub fn as_raw_fd(&self) -> Option<RawFd> {
        match self {
            Self::Inherit => None,
            Self::Pipe(fd) => Some(fd.as_raw_fd()),
            Self::File(file) => Some(file.as_raw_fd()),
        }
    }

    /// Returns whether the target inherits the shell's stream.
    pub const fn is_inherit(&self) -> bool {
        matches!(self, Self::Inherit)
    }
}

/// A file redirection requested on the command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Redirection {
    /// Which stream is redirected.
    pub kind: RedirectKind,
    /// Path of the file, as written.
    pub target: String,
}

/// One shell command.
#[derive(Debug, Default)]
pub struct Command {
    /// Program name followed by its arguments; empty for the end-of-list sentinel.
    pub args: Vec<String>,
    /// Process running this command, once launched.
    pub pid: Option<ProcessId>,
    /// Whether `&` was given after this command.
    pub background: bool,
    /// Relationship to the next command in the list.
    pub conditional: ConditionalOperator,
    /// Pipe feeding this command's standard input.
    pub pipe_in: Option<PipeDescriptors>,
    /// Pipe fed by this command's standard output.
    pub pipe_out: Option<PipeDescriptors>,
    /// Target for standard input.
    pub stdin: IoTarget,
    /// Target for standard output.
    pub stdout: IoTarget,
    /// Target for standard error.
    pub stderr: IoTarget,
    /// File redirections, applied in order at launch time.
    pub redirects: Vec<Redirection>,
    exit_status: Option<ProcessStatus>,
}

impl Command {
    /// Returns a new, empty command.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a command with the given arguments and no redirections.
    pub fn with_args<S: Into<String>>(args: impl IntoIterator<Item = S>) -> Self {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Returns whether this is the end-of-list sentinel.
    pub fn is_sentinel(&self) -> bool {
        self.args.is_empty()
    }

    /// Returns the command's name, if it has one.
    pub fn name(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    /// Returns the command's pipe role.
    pub const fn pipe_role(&self) -> PipeRole {
        match (self.pipe_in.is_some(), self.pipe_out.is_some()) {
            (false, false) => PipeRole::None,
            (false, true) => PipeRole::Source,
            (true, false) => PipeRole::Sink,
            (true, true) => PipeRole::Relay,
        }
    }

    /// Returns whether this command's output feeds the next command.
    pub const fn is_pipe_source(&self) -> bool {
        self.pipe_out.is_some()
    }

    /// Returns whether the list runner should move on without waiting for this
    /// command. Pipe sources are implicitly asynchronous so that every stage of a
    /// pipeline is started before any of them is waited on.
    pub const fn runs_asynchronously(&self) -> bool {
        self.background || self.is_pipe_source()
    }

    /// Returns the recorded exit status, if the command has completed.
    pub const fn exit_status(&self) -> Option<ProcessStatus> {
        self.exit_status
    }

    /// Records the command's exit status. Only the first recorded status sticks.
    pub fn record_exit_status(&mut self, status: ProcessStatus) {
        if let Some(existing) = self.exit_status {
            tracing::warn!("ignoring status {status:?} for '{self}'; already recorded {existing:?}");
            return;
        }

        self.exit_status = Some(status);
    }

    /// Closes this command's pipe ends and redirection files held by the shell.
    pub fn release_io(&mut self) {
        self.stdin = IoTarget::Inherit;
        self.stdout = IoTarget::Inherit;
        self.stderr = IoTarget::Inherit;
    }

    /// Returns whether the shell still holds any descriptor for this command.
    pub const fn holds_descriptors(&self) -> bool {
        !(self.stdin.is_inherit() && self.stdout.is_inherit() && self.stderr.is_inherit())
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.args.join(" "))?;

        for redirect in &self.redirects {
            write!(f, " {}{}", redirect.kind, redirect.target)?;
        }

        if self.background {
            f.write_str(" &")?;
        }

        Ok(())
    }
}

/// The commands parsed from one line, terminated by an empty sentinel command.
///
/// The list owns every command in it; dropping the list drops them all.
#[derive(Debug)]
pub struct CommandList {
    commands: Vec<Command>,
}

impl Default for CommandList {
    fn default() -> Self {
        Self {
            commands: vec![Command::new()],
        }
    }
}

impl CommandList {
    /// Builds a list from the given commands, appending the sentinel.
    ///
    /// Empty commands are dropped so that the sentinel stays the only empty node.
    pub fn from_commands(commands: impl IntoIterator<Item = Command>) -> Self {
        let mut commands: Vec<_> = commands
            .into_iter()
            .filter(|c| !c.is_sentinel())
            .collect();
        commands.push(Command::new());
        Self { commands }
    }

    /// Returns the number of nodes, including the sentinel.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns whether the list contains no real commands.
    pub fn is_empty(&self) -> bool {
        self.commands.iter().all(Command::is_sentinel)
    }

    /// Returns the command at the given index.
    pub fn get(&self, index: usize) -> Option<&Command> {
        self.commands.get(index)
    }

    /// Returns the command at the given index, mutably.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Command> {
        self.commands.get_mut(index)
    }

    /// Returns an iterator over every node, including the sentinel.
    pub fn iter(&self) -> std::slice::Iter<'_, Command> {
        self.commands.iter()
    }

    /// Returns the index of the last stage of the pipeline starting at `start`.
    pub fn pipeline_end(&self, start: usize) -> usize {
        let mut end = start;
        while self
            .commands
            .get(end)
            .is_some_and(Command::is_pipe_source)
            && self.commands.get(end + 1).is_some_and(|c| !c.is_sentinel())
        {
            end += 1;
        }
        end
    }

    pub(crate) fn into_commands(self) -> Vec<Command> {
        self.commands
    }
}

impl std::ops::Index<usize> for CommandList {
    type Output = Command;

    fn index(&self, index: usize) -> &Self::Output {
        &self.commands[index]
    }
}

impl std::ops::IndexMut<usize> for CommandList {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.commands[index]
    }
}

impl<'a> IntoIterator for &'a CommandList {
    type Item = &'a Command;
    type IntoIter = std::slice::Iter<'a, Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn conditional_from_tokens() -> anyhow::Result<()> {
        assert_eq!(ConditionalOperator::try_from(&Token::And)?, ConditionalOperator::And);
        assert_eq!(ConditionalOperator::try_from(&Token::Or)?, ConditionalOperator::Or);
        assert!(matches!(
            ConditionalOperator::try_from(&Token::Pipe),
            Err(error::Error::MalformedConditional(op)) if op == "|"
        ));
        Ok(())
    }

    #[test]
    fn conditional_evaluation() {
        let ok = ProcessStatus::SUCCESS;
        let failed = ProcessStatus::Exited(2);
        let killed = ProcessStatus::Signaled(9);

        assert!(ConditionalOperator::None.allows_successor(failed));
        assert!(ConditionalOperator::And.allows_successor(ok));
        assert!(!ConditionalOperator::And.allows_successor(failed));
        assert!(!ConditionalOperator::And.allows_successor(killed));
        assert!(ConditionalOperator::Or.allows_successor(failed));
        assert!(ConditionalOperator::Or.allows_successor(killed));
        assert!(!ConditionalOperator::Or.allows_successor(ok));
    }

    #[test]
    fn exit_status_is_recorded_once() {
        let mut cmd = Command::with_args(["true"]);
        cmd.record_exit_status(ProcessStatus::SUCCESS);
        cmd.record_exit_status(ProcessStatus::FAILURE);
        assert_eq!(cmd.exit_status(), Some(ProcessStatus::SUCCESS));
    }

    #[test]
    fn pipe_roles() {
        let fds = PipeDescriptors { read: 3, write: 4 };
        let mut cmd = Command::with_args(["cat"]);
        assert_eq!(cmd.pipe_role(), PipeRole::None);
        assert!(!cmd.runs_asynchronously());

        cmd.pipe_out = Some(fds);
        assert_eq!(cmd.pipe_role(), PipeRole::Source);
        assert!(cmd.runs_asynchronously());

        cmd.pipe_in = Some(fds);
        assert_eq!(cmd.pipe_role(), PipeRole::Relay);

        cmd.pipe_out = None;
        assert_eq!(cmd.pipe_role(), PipeRole::Sink);
        assert!(!cmd.runs_asynchronously());
    }

    #[test]
    fn list_always_ends_with_single_sentinel() {
        let list = CommandList::from_commands([
            Command::with_args(["a"]),
            Command::new(),
            Command::with_args(["b"]),
        ]);

        assert_eq!(list.len(), 3);
        assert_eq!(list[0].name(), Some("a"));
        assert_eq!(list[1].name(), Some("b"));
        assert!(list[2].is_sentinel());
        assert!(!list.is_empty());
        assert!(CommandList::default().is_empty());
    }

    #[test]
    fn pipeline_end_follows_pipe_sources() {
        let fds = PipeDescriptors { read: 3, write: 4 };
        let mut a = Command::with_args(["a"]);
        a.pipe_out = Some(fds);
        let mut b = Command::with_args(["b"]);
        b.pipe_in = Some(fds);
        b.pipe_out = Some(fds);
        let mut c = Command::with_args(["c"]);
        c.pipe_in = Some(fds);
        let list = CommandList::from_commands([a, b, c, Command::with_args(["d"])]);

        assert_eq!(list.pipeline_end(0), 2);
        assert_eq!(list.pipeline_end(3), 3);
    }

    #[test]
    fn display_includes_redirections_and_background() {
        let mut cmd = Command::with_args(["sort", "-r"]);
        cmd.redirects.push(Redirection {
            kind: RedirectKind::Output,
            target: "out.txt".into(),
        });
        cmd.background = true;
        assert_eq!(cmd.to_string(), "sort -r >out.txt &");
    }
}
