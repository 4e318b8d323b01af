use std::fmt::Display;

use crate::processes::{ProcessId, ProcessLauncher, ProcessStatus};
use crate::{error, trace_categories};

/// A child the shell started without waiting for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackgroundJob {
    /// Shell-assigned job number, starting at 1.
    pub id: usize,
    /// The child's process ID.
    pub pid: ProcessId,
    /// The command the child is running, for display.
    pub command_line: String,
}

impl Display for BackgroundJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {} {}", self.id, self.pid, self.command_line)
    }
}

/// Tracks background children until they are reaped.
#[derive(Debug, Default)]
pub struct BackgroundJobs {
    jobs: Vec<BackgroundJob>,
    next_id: usize,
}

impl BackgroundJobs {
    /// Returns an empty job table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a background child; returns its job number.
    ///
    /// # Arguments
    ///
    /// * `pid` - The child's process ID.
    /// * `command_line` - Description of what the child runs.
    pub fn add(&mut self, pid: ProcessId, command_line: String) -> usize {
        self.next_id += 1;
        let id = self.next_id;

        tracing::debug!(target: trace_categories::JOBS, "tracking background job [{id}] {pid}: {command_line}");

        self.jobs.push(BackgroundJob {
            id,
            pid,
            command_line,
        });
        id
    }

    /// Returns the jobs still being tracked.
    pub fn iter(&self) -> impl Iterator<Item = &BackgroundJob> {
        self.jobs.iter()
    }

    /// Returns the number of jobs still being tracked.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Returns whether no jobs are being tracked.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Reaps, without blocking, every tracked job that has exited.
    ///
    /// Returns the reaped jobs along with their statuses. Jobs that can no longer
    /// be waited on are dropped from the table.
    ///
    /// # Arguments
    ///
    /// * `launcher` - The launcher that started the jobs.
    pub fn poll(&mut self, launcher: &mut dyn ProcessLauncher) -> Vec<(BackgroundJob, ProcessStatus)> {
        let mut results = vec![];

        let mut i = 0;
        while i != self.jobs.len() {
            match launcher.try_wait(self.jobs[i].pid) {
                Ok(None) => i += 1,
                Ok(Some(status)) => {
                    let job = self.jobs.remove(i);
                    tracing::debug!(target: trace_categories::JOBS, "reaped {job}: {status:?}");
                    results.push((job, status));
                }
                Err(err @ (error::Error::NoSuchChild(_) | error::Error::WaitFailure(..))) => {
                    let job = self.jobs.remove(i);
                    tracing::debug!(target: trace_categories::JOBS, "dropping {job}: {err}");
                }
                Err(err) => {
                    tracing::warn!("failed to poll background job: {err}");
                    i += 1;
                }
            }
        }

        results
    }
}
