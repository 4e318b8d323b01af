use std::io::IsTerminal;

use crate::error;
use crate::processes::ProcessId;

pub(crate) fn get_foreground_pid() -> Option<ProcessId> {
    nix::unistd::tcgetpgrp(std::io::stdin())
        .ok()
        .map(nix::unistd::Pid::as_raw)
}

pub(crate) fn move_to_foreground(pid: ProcessId) -> Result<(), error::Error> {
    nix::unistd::tcsetpgrp(std::io::stdin(), nix::unistd::Pid::from_raw(pid))?;
    Ok(())
}

pub(crate) fn move_self_to_foreground() -> Result<(), error::Error> {
    if std::io::stdin().is_terminal() {
        let pgid = nix::unistd::getpgid(None)?;
        move_to_foreground(pgid.as_raw())?;
    }

    Ok(())
}
