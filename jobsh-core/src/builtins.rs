//! Commands implemented inside the shell process.

use std::path::PathBuf;

use crate::launcher::LaunchOutcome;
use crate::processes::ProcessStatus;
use crate::{Shell, error, trace_categories};

/// Exit code used when `exit` is given a malformed argument.
const BAD_USAGE: u8 = 2;

/// A command implemented by the shell itself; runs without forking.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Builtin {
    /// `cd [dir]`: changes the session's working directory.
    Cd,
    /// `exit [n]`: ends the shell.
    Exit,
}

impl Builtin {
    /// Returns the builtin with the given name, if there is one.
    pub fn lookup(name: &str) -> Option<Self> {
        match name {
            "cd" => Some(Self::Cd),
            "exit" => Some(Self::Exit),
            _ => None,
        }
    }

    /// Returns the builtin's name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Cd => "cd",
            Self::Exit => "exit",
        }
    }

    /// Runs the builtin in the shell process. Failures are reported on standard
    /// error and turned into a failing status.
    ///
    /// # Arguments
    ///
    /// * `shell` - The session the builtin operates on.
    /// * `args` - Arguments following the builtin's name.
    pub(crate) fn execute(self, shell: &mut Shell, args: &[String]) -> LaunchOutcome {
        tracing::debug!(target: trace_categories::COMMANDS, "running builtin {} {args:?}", self.name());

        match self {
            Self::Cd => match change_dir(shell, args) {
                Ok(()) => LaunchOutcome::Completed(ProcessStatus::SUCCESS),
                Err(err) => {
                    error::report(&err);
                    LaunchOutcome::Completed(ProcessStatus::FAILURE)
                }
            },
            Self::Exit => match parse_exit_code(args) {
                Ok(code) => LaunchOutcome::ExitRequested(code),
                // The shell keeps running when it cannot tell which status was meant.
                Err(err @ error::Error::TooManyArguments(_)) => {
                    error::report(&err);
                    LaunchOutcome::Completed(ProcessStatus::FAILURE)
                }
                Err(err) => {
                    error::report(&err);
                    LaunchOutcome::ExitRequested(BAD_USAGE)
                }
            },
        }
    }
}

fn change_dir(shell: &mut Shell, args: &[String]) -> Result<(), error::Error> {
    let target = match args {
        [] => std::env::var_os("HOME")
            .map(PathBuf::from)
            .ok_or(error::Error::HomeNotSet)?,
        [dir] => PathBuf::from(dir),
        _ => return Err(error::Error::TooManyArguments(Builtin::Cd.name())),
    };

    shell.set_working_dir(&target)
}

fn parse_exit_code(args: &[String]) -> Result<u8, error::Error> {
    match args {
        [] => Ok(ProcessStatus::SUCCESS.exit_code()),
        [code] => {
            let code: i32 = code
                .parse()
                .map_err(|_| error::Error::NumericArgumentRequired(code.clone()))?;
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            Ok((code & 0xFF) as u8)
        }
        _ => Err(error::Error::TooManyArguments(Builtin::Exit.name())),
    }
}
