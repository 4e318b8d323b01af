use crate::processes::ProcessId;
use crate::{error, sys, trace_categories};

/// Hands the terminal's foreground to jobs and takes it back.
pub trait TerminalControl {
    /// Makes the given process group the terminal's foreground group.
    fn acquire_foreground(&mut self, process_group: ProcessId) -> Result<(), error::Error>;

    /// Returns the terminal's foreground to the shell.
    fn release_foreground(&mut self) -> Result<(), error::Error>;
}

/// Terminal control for sessions without a controlling terminal; does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoTerminalControl;

impl TerminalControl for NoTerminalControl {
    fn acquire_foreground(&mut self, _process_group: ProcessId) -> Result<(), error::Error> {
        Ok(())
    }

    fn release_foreground(&mut self) -> Result<(), error::Error> {
        Ok(())
    }
}

/// Encapsulates the state of a controlled terminal.
pub struct TerminalOwner {
    shell_group: ProcessId,
    prev_fg_pid: Option<ProcessId>,
}

impl TerminalOwner {
    /// Acquire the terminal for the shell.
    pub fn acquire() -> Result<Self, error::Error> {
        let prev_fg_pid = sys::terminal::get_foreground_pid();

        // Break out into new process group. This fails harmlessly if the shell
        // already leads its own group (e.g., as a session leader).
        if let Err(err) = sys::signal::lead_new_process_group() {
            tracing::debug!(target: trace_categories::TERMINAL, "failed to lead new process group: {err}");
        }

        // Ignore SIGTTOU before taking ownership, so that handing the terminal back
        // and forth never stops the shell. Interrupts typed at the prompt must not
        // end it either; jobs get the default dispositions back when they start.
        sys::signal::ignore_terminal_signals()?;

        // Take ownership.
        sys::terminal::move_self_to_foreground()?;

        Ok(Self {
            shell_group: sys::process::current_process_group(),
            prev_fg_pid,
        })
    }

    fn try_release(&mut self) {
        // Restore the previous foreground process group.
        if let Some(pid) = self.prev_fg_pid {
            if sys::terminal::move_to_foreground(pid).is_ok() {
                self.prev_fg_pid = None;
            }
        }
    }
}

impl TerminalControl for TerminalOwner {
    fn acquire_foreground(&mut self, process_group: ProcessId) -> Result<(), error::Error> {
        tracing::debug!(target: trace_categories::TERMINAL, "moving process group {process_group} to foreground");
        sys::terminal::move_to_foreground(process_group)
    }

    fn release_foreground(&mut self) -> Result<(), error::Error> {
        tracing::debug!(target: trace_categories::TERMINAL, "moving shell group {} back to foreground", self.shell_group);
        sys::terminal::move_to_foreground(self.shell_group)
    }
}

impl Drop for TerminalOwner {
    fn drop(&mut self) {
        self.try_release();
    }
}
