//! The shell session context.

use std::path::{Path, PathBuf};

use jobsh_parser::Token;
use normalize_path::NormalizePath;

use crate::builder::{self, OsPipeFactory, PipeFactory};
use crate::jobs::BackgroundJobs;
use crate::processes::{ProcessGroupPolicy, ProcessLauncher};
use crate::results::ExecutionResult;
use crate::sys::process::OsProcessLauncher;
use crate::terminal::{NoTerminalControl, TerminalControl, TerminalOwner};
use crate::{error, reclaimer, runner, trace_categories};

/// Exit code for a line that could not be decoded or tokenized.
const SYNTAX_ERROR: u8 = 2;

/// Options for creating a new shell.
#[derive(Clone, Debug, Default, bon::Builder)]
pub struct CreateOptions {
    /// Whether the shell is interactive: it takes over the terminal and runs each
    /// pipeline in its own process group.
    #[builder(default)]
    pub interactive: bool,
    /// Initial working directory; defaults to the process's current directory.
    pub working_dir: Option<PathBuf>,
}

/// Represents an instance of a shell.
pub struct Shell {
    pub(crate) working_dir: PathBuf,
    pub(crate) launcher: Box<dyn ProcessLauncher>,
    pub(crate) terminal: Box<dyn TerminalControl>,
    pub(crate) pipes: Box<dyn PipeFactory>,
    pub(crate) jobs: BackgroundJobs,
    pub(crate) last_exit_status: u8,
    job_control: bool,
}

impl Shell {
    /// Returns a new shell that runs real processes.
    ///
    /// An interactive shell moves itself into its own process group and takes
    /// the terminal's foreground.
    ///
    /// # Arguments
    ///
    /// * `options` - The options to use when creating the shell.
    pub fn new(options: CreateOptions) -> Result<Self, error::Error> {
        let terminal: Box<dyn TerminalControl> = if options.interactive {
            Box::new(TerminalOwner::acquire()?)
        } else {
            Box::new(NoTerminalControl)
        };

        Self::with_components(
            options,
            Box::new(OsProcessLauncher),
            terminal,
            Box::new(OsPipeFactory),
        )
    }

    /// Returns a new shell built from the given components.
    ///
    /// # Arguments
    ///
    /// * `options` - The options to use when creating the shell.
    /// * `launcher` - Creates and waits on child processes.
    /// * `terminal` - Hands the terminal's foreground to jobs.
    /// * `pipes` - Creates the pipes between pipeline stages.
    pub fn with_components(
        options: CreateOptions,
        launcher: Box<dyn ProcessLauncher>,
        terminal: Box<dyn TerminalControl>,
        pipes: Box<dyn PipeFactory>,
    ) -> Result<Self, error::Error> {
        let working_dir = match options.working_dir {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };

        Ok(Self {
            working_dir: working_dir.normalize(),
            launcher,
            terminal,
            pipes,
            jobs: BackgroundJobs::new(),
            last_exit_status: 0,
            job_control: options.interactive,
        })
    }

    /// Tokenizes and runs one command line.
    ///
    /// A line that cannot be tokenized is reported on standard error and fails
    /// with exit code 2 without running anything.
    ///
    /// # Arguments
    ///
    /// * `line` - The command line to run.
    pub fn run_string(&mut self, line: &str) -> Result<ExecutionResult, error::Error> {
        match jobsh_parser::tokenize_str(line) {
            Ok(tokens) => self.run_tokens(tokens),
            Err(err) => Ok(self.reject_line(&err.into())),
        }
    }

    /// Runs one command line given as raw bytes, as read from a script or
    /// terminal.
    ///
    /// A line that is not valid UTF-8 is reported on standard error and fails
    /// with exit code 2 without running anything.
    ///
    /// # Arguments
    ///
    /// * `line` - The command line to run.
    pub fn run_bytes(&mut self, line: &[u8]) -> Result<ExecutionResult, error::Error> {
        match std::str::from_utf8(line) {
            Ok(line) => self.run_string(line),
            Err(err) => Ok(self.reject_line(&err.into())),
        }
    }

    fn reject_line(&mut self, err: &error::Error) -> ExecutionResult {
        error::report(err);
        self.last_exit_status = SYNTAX_ERROR;
        self.reap_background_jobs();
        ExecutionResult::new(SYNTAX_ERROR)
    }

    /// Builds and runs the command list described by the given tokens, then
    /// reaps any background children that have finished.
    ///
    /// # Arguments
    ///
    /// * `tokens` - The line's tokens.
    pub fn run_tokens(
        &mut self,
        tokens: impl IntoIterator<Item = Token>,
    ) -> Result<ExecutionResult, error::Error> {
        let mut list = builder::build_list(tokens, self.pipes.as_mut());

        let result = runner::run_list(self, &mut list);
        reclaimer::reclaim(list);

        self.last_exit_status = result.exit_code;
        self.reap_background_jobs();

        Ok(result)
    }

    /// Reaps, without blocking, background children that have finished.
    pub fn reap_background_jobs(&mut self) {
        for (job, status) in self.jobs.poll(self.launcher.as_mut()) {
            tracing::debug!(target: trace_categories::JOBS, "background job {job} done: exit code {}", status.exit_code());
        }
    }

    /// Returns the shell's current working directory.
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Updates the shell's current working directory.
    ///
    /// # Arguments
    ///
    /// * `target_dir` - The new working directory; relative paths are resolved
    ///   against the current one.
    pub fn set_working_dir(&mut self, target_dir: impl AsRef<Path>) -> Result<(), error::Error> {
        let target_dir = target_dir.as_ref();
        let abs_path = self.working_dir.join(target_dir);

        match std::fs::metadata(&abs_path) {
            Ok(m) => {
                if !m.is_dir() {
                    return Err(error::Error::NotADirectory(target_dir.to_owned()));
                }
            }
            Err(e) => {
                return Err(error::Error::ChangeDirectoryFailure(target_dir.to_owned(), e));
            }
        }

        // Normalize the path (but don't canonicalize it).
        self.working_dir = abs_path.normalize();

        tracing::debug!(target: trace_categories::COMMANDS, "working directory is now {}", self.working_dir.display());
        Ok(())
    }

    /// Returns the exit code of the last command line that ran.
    pub const fn last_exit_status(&self) -> u8 {
        self.last_exit_status
    }

    /// Returns the background children not yet reaped.
    pub const fn background_jobs(&self) -> &BackgroundJobs {
        &self.jobs
    }

    /// Returns the process group placement for the first stage of a pipeline.
    pub(crate) const fn pipeline_group_policy(&self) -> ProcessGroupPolicy {
        if self.job_control {
            ProcessGroupPolicy::NewProcessGroup
        } else {
            // Without job control, children stay in the shell's group so that they
            // can still read from a terminal the shell does not own.
            ProcessGroupPolicy::SameProcessGroup
        }
    }
}
