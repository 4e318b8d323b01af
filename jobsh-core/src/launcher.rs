//! Launches one command, either as a builtin or as a child process.

use std::fs::{File, OpenOptions};
use std::path::Path;

use jobsh_parser::RedirectKind;

use crate::builtins::Builtin;
use crate::command::{Command, IoTarget, Redirection};
use crate::processes::{ProcessGroupPolicy, ProcessId, ProcessStatus};
use crate::{Shell, error, trace_categories};

/// What happened when a command was launched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// A child process was started.
    Spawned(ProcessId),
    /// The command finished without a child process (a builtin, or a command
    /// whose redirections could not be opened).
    Completed(ProcessStatus),
    /// The `exit` builtin ran and asked for the shell to end with the given code.
    ExitRequested(u8),
}

/// Launches the given command.
///
/// Whatever the outcome, the shell's copies of the command's pipe ends and
/// redirection files are closed before returning, so that the command's pipeline
/// partners see end-of-input once the command's own process is done with them.
///
/// # Arguments
///
/// * `shell` - The session the command runs in.
/// * `command` - The command to launch; its process ID is recorded on success.
/// * `group` - Process group to place a child in.
pub(crate) fn launch(
    shell: &mut Shell,
    command: &mut Command,
    group: ProcessGroupPolicy,
) -> Result<LaunchOutcome, error::Error> {
    let outcome = launch_without_cleanup(shell, command, group);
    command.release_io();
    outcome
}

fn launch_without_cleanup(
    shell: &mut Shell,
    command: &mut Command,
    group: ProcessGroupPolicy,
) -> Result<LaunchOutcome, error::Error> {
    if let Err(err) = open_redirections(command, &shell.working_dir) {
        error::report(&err);
        return Ok(LaunchOutcome::Completed(ProcessStatus::FAILURE));
    }

    if let Some(builtin) = command.name().and_then(Builtin::lookup) {
        return Ok(builtin.execute(shell, &command.args[1..]));
    }

    let pid = shell.launcher.spawn(command, &shell.working_dir, group)?;
    command.pid = Some(pid);

    Ok(LaunchOutcome::Spawned(pid))
}

/// Opens the command's redirection targets, in order, replacing any pipe end
/// previously attached to the same stream.
fn open_redirections(command: &mut Command, working_dir: &Path) -> Result<(), error::Error> {
    let Command {
        redirects,
        stdin,
        stdout,
        stderr,
        ..
    } = command;

    for redirect in redirects.iter() {
        let file = open_redirection(redirect, working_dir)?;

        tracing::debug!(target: trace_categories::COMMANDS, "redirecting {}{}", redirect.kind, redirect.target);

        let slot = match redirect.kind {
            RedirectKind::Input => &mut *stdin,
            RedirectKind::Output => &mut *stdout,
            RedirectKind::Error => &mut *stderr,
        };
        *slot = IoTarget::File(file);
    }

    Ok(())
}

fn open_redirection(redirect: &Redirection, working_dir: &Path) -> Result<File, error::Error> {
    let path = working_dir.join(&redirect.target);

    let mut options = OpenOptions::new();
    match redirect.kind {
        RedirectKind::Input => options.read(true),
        RedirectKind::Output | RedirectKind::Error => options.write(true).create(true).truncate(true),
    };

    options
        .open(&path)
        .map_err(|err| error::Error::RedirectionFailure(redirect.target.clone(), err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Event, TestShell};
    use pretty_assertions::assert_eq;

    #[test]
    fn external_command_is_spawned() -> anyhow::Result<()> {
        let mut test = TestShell::new()?;
        let mut command = Command::with_args(["ls", "-l"]);

        let outcome = launch(&mut test.shell, &mut command, ProcessGroupPolicy::NewProcessGroup)?;

        let LaunchOutcome::Spawned(pid) = outcome else {
            anyhow::bail!("expected a spawned child, got {outcome:?}");
        };
        assert_eq!(command.pid, Some(pid));
        assert_eq!(test.events(), vec![Event::Spawn("ls".into())]);
        assert_eq!(
            test.spawned_groups(),
            vec![ProcessGroupPolicy::NewProcessGroup]
        );
        Ok(())
    }

    #[test]
    fn builtins_never_spawn() -> anyhow::Result<()> {
        let mut test = TestShell::new()?;
        let dir = tempfile::tempdir()?;
        let mut command = Command::with_args(["cd".to_owned(), dir.path().display().to_string()]);

        let outcome = launch(&mut test.shell, &mut command, ProcessGroupPolicy::NewProcessGroup)?;

        assert_eq!(outcome, LaunchOutcome::Completed(ProcessStatus::SUCCESS));
        assert_eq!(command.pid, None);
        assert!(test.events().is_empty());
        assert_eq!(test.shell.working_dir(), dir.path());
        Ok(())
    }

    #[test]
    fn cd_to_missing_directory_fails() -> anyhow::Result<()> {
        let mut test = TestShell::new()?;
        let before = test.shell.working_dir().to_owned();
        let mut command = Command::with_args(["cd", "/nonexistent/jobsh-test-dir"]);

        let outcome = launch(&mut test.shell, &mut command, ProcessGroupPolicy::NewProcessGroup)?;

        assert_eq!(outcome, LaunchOutcome::Completed(ProcessStatus::FAILURE));
        assert_eq!(test.shell.working_dir(), before.as_path());
        assert!(test.events().is_empty());
        Ok(())
    }

    #[test]
    fn exit_requests_shell_exit() -> anyhow::Result<()> {
        let mut test = TestShell::new()?;
        let mut command = Command::with_args(["exit", "4"]);

        let outcome = launch(&mut test.shell, &mut command, ProcessGroupPolicy::NewProcessGroup)?;

        assert_eq!(outcome, LaunchOutcome::ExitRequested(4));
        Ok(())
    }

    #[test]
    fn unopenable_redirection_skips_the_command() -> anyhow::Result<()> {
        let mut test = TestShell::new()?;
        let mut command = Command::with_args(["cat"]);
        command.redirects.push(Redirection {
            kind: RedirectKind::Input,
            target: "/nonexistent/jobsh-input".into(),
        });

        let outcome = launch(&mut test.shell, &mut command, ProcessGroupPolicy::NewProcessGroup)?;

        assert_eq!(outcome, LaunchOutcome::Completed(ProcessStatus::FAILURE));
        assert!(test.events().is_empty());
        Ok(())
    }

    #[test]
    fn output_redirection_is_relative_to_working_dir() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("out.txt"), "stale contents")?;

        let mut test = TestShell::new()?;
        test.shell.set_working_dir(dir.path())?;

        let mut command = Command::with_args(["echo"]);
        command.redirects.push(Redirection {
            kind: RedirectKind::Output,
            target: "out.txt".into(),
        });

        launch(&mut test.shell, &mut command, ProcessGroupPolicy::NewProcessGroup)?;

        // Truncated on open, and released by the shell after launch.
        assert_eq!(std::fs::read_to_string(dir.path().join("out.txt"))?, "");
        assert!(!command.holds_descriptors());
        Ok(())
    }

    #[test]
    fn spawn_failure_is_surfaced_and_releases_io() -> anyhow::Result<()> {
        let mut test = TestShell::new()?;
        test.fail_spawn("ls");

        let (reader, writer) = os_pipe::pipe()?;
        let mut command = Command::with_args(["ls"]);
        command.stdin = IoTarget::Pipe(reader.into());
        command.stdout = IoTarget::Pipe(writer.into());

        let result = launch(&mut test.shell, &mut command, ProcessGroupPolicy::NewProcessGroup);

        assert!(matches!(result, Err(error::Error::ChildCreationFailure(_))));
        assert_eq!(command.pid, None);
        assert!(!command.holds_descriptors());
        Ok(())
    }
}
