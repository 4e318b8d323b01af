use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal};

use crate::error;

/// Signals an interactive shell ignores while it owns the terminal: interrupts and
/// quits typed at the prompt, and the stop sent when it hands the terminal around.
const SHELL_IGNORED_SIGNALS: [Signal; 3] = [Signal::SIGINT, Signal::SIGQUIT, Signal::SIGTTOU];

pub(crate) fn lead_new_process_group() -> Result<(), error::Error> {
    nix::unistd::setpgid(nix::unistd::Pid::from_raw(0), nix::unistd::Pid::from_raw(0))?;
    Ok(())
}

pub(crate) fn ignore_terminal_signals() -> Result<(), error::Error> {
    for signal in SHELL_IGNORED_SIGNALS {
        set_handler(signal, SigHandler::SigIgn)?;
    }
    Ok(())
}

/// Restores the default dispositions of the signals the shell ignores; ignored
/// dispositions survive `exec`, so children must undo what the shell set up for itself.
///
/// Only calls `sigaction`, which is async-signal-safe, so this may run between
/// `fork` and `exec`.
pub(crate) fn restore_terminal_signals() -> Result<(), nix::errno::Errno> {
    for signal in SHELL_IGNORED_SIGNALS {
        set_handler(signal, SigHandler::SigDfl)?;
    }
    Ok(())
}

fn set_handler(signal: Signal, handler: SigHandler) -> Result<(), nix::errno::Errno> {
    let action = SigAction::new(handler, SaFlags::empty(), SigSet::empty());

    // SAFETY:
    // We only install SIG_IGN or SIG_DFL, never a handler function, so there is no
    // handler code whose signal safety we would need to vouch for.
    unsafe { nix::sys::signal::sigaction(signal, &action) }?;
    Ok(())
}
