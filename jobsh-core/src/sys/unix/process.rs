//! Process creation and reaping via `fork`, `exec`, and `waitpid`.

use std::ffi::{CString, c_char};
use std::os::fd::RawFd;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use nix::errno::Errno;
use nix::sys::wait::{WaitPidFlag, WaitStatus};
use nix::unistd::{ForkResult, Pid};

use crate::command::Command;
use crate::processes::{ProcessGroupPolicy, ProcessId, ProcessLauncher, ProcessStatus};
use crate::{error, sys, trace_categories};

/// Returns the process group of the calling process.
pub(crate) fn current_process_group() -> ProcessId {
    nix::unistd::getpgrp().as_raw()
}

/// Launches commands as real child processes.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsProcessLauncher;

impl ProcessLauncher for OsProcessLauncher {
    fn spawn(
        &mut self,
        command: &Command,
        working_dir: &Path,
        group: ProcessGroupPolicy,
    ) -> Result<ProcessId, error::Error> {
        let plan = ExecPlan::new(command, working_dir, group)?;

        // SAFETY:
        // The child branch only runs `ExecPlan::exec`, which never returns and makes no
        // allocations of its own: it only hands data prepared before the fork to
        // `setpgid`, `sigaction`, `dup2`, `chdir`, and `execvp`.
        let fork_result = unsafe { nix::unistd::fork() }.map_err(error::Error::ChildCreationFailure)?;

        match fork_result {
            ForkResult::Parent { child } => {
                // The child makes the same call before exec'ing; whichever runs first wins,
                // so the group is in place before anyone can signal it.
                if let Some(group) = plan.group {
                    let group = if group.as_raw() == 0 { child } else { group };
                    if let Err(err) = nix::unistd::setpgid(child, group) {
                        tracing::debug!(target: trace_categories::JOBS, "setpgid({child}, {group}) from parent: {err}");
                    }
                }

                tracing::debug!(target: trace_categories::COMMANDS, "spawned {child}: '{command}'");
                Ok(child.as_raw())
            }
            ForkResult::Child => plan.exec(),
        }
    }

    fn wait(&mut self, pid: ProcessId) -> Result<ProcessStatus, error::Error> {
        loop {
            match nix::sys::wait::waitpid(Pid::from_raw(pid), None) {
                Ok(status) => {
                    if let Some(status) = translate_wait_status(status) {
                        return Ok(status);
                    }
                }
                Err(Errno::EINTR) => (),
                Err(Errno::ECHILD) => return Err(error::Error::NoSuchChild(pid)),
                Err(err) => return Err(error::Error::WaitFailure(pid, err)),
            }
        }
    }

    fn try_wait(&mut self, pid: ProcessId) -> Result<Option<ProcessStatus>, error::Error> {
        loop {
            match nix::sys::wait::waitpid(Pid::from_raw(pid), Some(WaitPidFlag::WNOHANG)) {
                Ok(status) => return Ok(translate_wait_status(status)),
                Err(Errno::EINTR) => (),
                Err(Errno::ECHILD) => return Err(error::Error::NoSuchChild(pid)),
                Err(err) => return Err(error::Error::WaitFailure(pid, err)),
            }
        }
    }
}

fn translate_wait_status(status: WaitStatus) -> Option<ProcessStatus> {
    match status {
        WaitStatus::Exited(_, code) => Some(ProcessStatus::Exited(code)),
        WaitStatus::Signaled(_, signal, _) => Some(ProcessStatus::Signaled(signal as i32)),
        _ => None,
    }
}

/// Everything the child needs, prepared before forking so that the child does not
/// allocate.
struct ExecPlan {
    /// Owns the argument strings that `argv_ptrs` points into.
    #[allow(dead_code, reason = "kept alive for argv_ptrs")]
    argv: Vec<CString>,
    /// Null-terminated pointer array handed to `execvp`.
    argv_ptrs: Vec<*const c_char>,
    working_dir: CString,
    stdio: [(Option<RawFd>, RawFd); 3],
    /// Group to join; `Some(0)` means a new group led by the child.
    group: Option<Pid>,
    failure_prefix: Vec<u8>,
}

impl ExecPlan {
    fn new(
        command: &Command,
        working_dir: &Path,
        group: ProcessGroupPolicy,
    ) -> Result<Self, error::Error> {
        let argv = command
            .args
            .iter()
            .map(|arg| CString::new(arg.as_bytes()))
            .collect::<Result<Vec<_>, _>>()?;

        let argv_ptrs = argv
            .iter()
            .map(|arg| arg.as_ptr())
            .chain(std::iter::once(std::ptr::null()))
            .collect();

        let name = command.name().unwrap_or_default();

        Ok(Self {
            argv,
            argv_ptrs,
            working_dir: CString::new(working_dir.as_os_str().as_bytes())?,
            stdio: [
                (command.stdin.as_raw_fd(), nix::libc::STDIN_FILENO),
                (command.stdout.as_raw_fd(), nix::libc::STDOUT_FILENO),
                (command.stderr.as_raw_fd(), nix::libc::STDERR_FILENO),
            ],
            group: match group {
                ProcessGroupPolicy::NewProcessGroup => Some(Pid::from_raw(0)),
                ProcessGroupPolicy::JoinProcessGroup(pgid) => Some(Pid::from_raw(pgid)),
                ProcessGroupPolicy::SameProcessGroup => None,
            },
            failure_prefix: format!("jobsh: {name}: ").into_bytes(),
        })
    }

    /// Runs in the forked child: wires up the standard streams, joins the process
    /// group, and replaces the program image.
    fn exec(&self) -> ! {
        if let Some(group) = self.group {
            // Failure here only means the parent got there first.
            let _ = nix::unistd::setpgid(Pid::from_raw(0), group);

            // Jobs of a job-control session get back the signals the shell ignores.
            if let Err(err) = sys::signal::restore_terminal_signals() {
                self.fail(err);
            }
        }

        for (source, target) in self.stdio {
            if let Some(source) = source {
                if let Err(err) = redirect_fd(source, target) {
                    self.fail(err);
                }
            }
        }

        if let Err(err) = nix::unistd::chdir(self.working_dir.as_c_str()) {
            self.fail(err);
        }

        // Every descriptor the shell opened is close-on-exec; only the duplicated
        // standard streams survive into the new image.
        // SAFETY: `argv_ptrs` is null-terminated and points into `argv`, which outlives
        // the call. `execvp` only returns on failure.
        unsafe { nix::libc::execvp(self.argv_ptrs[0], self.argv_ptrs.as_ptr()) };
        self.fail(Errno::last())
    }

    fn fail(&self, err: Errno) -> ! {
        write_to_stderr(&self.failure_prefix);
        write_to_stderr(err.desc().as_bytes());
        write_to_stderr(b"\n");

        // SAFETY:
        // `_exit` is async-signal-safe and skips the parent's atexit handlers and
        // buffered stdio, which must not run in the forked copy.
        unsafe { nix::libc::_exit(ProcessStatus::NOT_FOUND.exit_code().into()) }
    }
}

/// Duplicates `source` onto `target`, leaving the result inheritable across `exec`.
fn redirect_fd(source: RawFd, target: RawFd) -> Result<(), Errno> {
    if source == target {
        // `dup2` would be a no-op that leaves close-on-exec set.
        // SAFETY: `fcntl` is async-signal-safe and only touches the descriptor flags.
        Errno::result(unsafe { nix::libc::fcntl(target, nix::libc::F_SETFD, 0) })?;
    } else {
        // SAFETY: `dup2` is async-signal-safe; `source` is held open by the parent's
        // command record for the duration of the fork.
        Errno::result(unsafe { nix::libc::dup2(source, target) })?;
    }
    Ok(())
}

fn write_to_stderr(buf: &[u8]) {
    // SAFETY: `write` is async-signal-safe and `buf` is valid for `buf.len()` bytes.
    let _ = unsafe { nix::libc::write(nix::libc::STDERR_FILENO, buf.as_ptr().cast(), buf.len()) };
}
