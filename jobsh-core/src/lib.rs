//! Core implementation of the jobsh shell. Turns token streams into command lists and runs
//! them as process groups, with pipes, `&&`/`||` short-circuiting, background jobs, and
//! terminal foreground handoff.

pub mod builder;
mod builtins;
pub mod command;
mod error;
mod jobs;
mod launcher;
pub mod processes;
mod reclaimer;
mod results;
mod runner;
mod shell;
mod sys;
mod terminal;
pub mod trace_categories;

#[cfg(test)]
mod testing;

pub use builder::{LineBuilder, OsPipeFactory, PipeFactory, build_list};
pub use builtins::Builtin;
pub use command::{Command, CommandList, ConditionalOperator, IoTarget, PipeRole, Redirection};
pub use error::Error;
pub use jobs::{BackgroundJob, BackgroundJobs};
pub use launcher::LaunchOutcome;
pub use processes::{ProcessGroupPolicy, ProcessId, ProcessLauncher, ProcessStatus};
pub use results::ExecutionResult;
pub use shell::{CreateOptions, Shell};
pub use sys::process::OsProcessLauncher;
pub use terminal::{NoTerminalControl, TerminalControl, TerminalOwner};
