//! Drives a command list: launches pipelines, waits on them, and applies
//! `&&`/`||` short-circuiting.

use crate::command::CommandList;
use crate::launcher::{self, LaunchOutcome};
use crate::processes::{ProcessId, ProcessStatus};
use crate::results::ExecutionResult;
use crate::{Shell, error, trace_categories};

/// Steps of a list traversal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RunState {
    /// Launch every stage of the pipeline at the cursor.
    Launch,
    /// Wait on the pipeline's last stage, unless it runs in the background.
    Wait,
    /// Apply the conditional operator of the pipeline that just completed.
    Decide,
    /// Move past the current pipeline, running or skipping what follows.
    Advance { run_next: bool },
    /// Nothing more to run.
    Done,
}

/// Runs the given list to completion in the given shell.
///
/// # Arguments
///
/// * `shell` - The session to run in.
/// * `list` - The list to run.
pub(crate) fn run_list(shell: &mut Shell, list: &mut CommandList) -> ExecutionResult {
    ListRunner::new(shell, list).run()
}

struct ListRunner<'a> {
    shell: &'a mut Shell,
    list: &'a mut CommandList,
    /// First stage of the current pipeline.
    cursor: usize,
    /// Last stage of the current pipeline.
    last: usize,
    /// Process group of the current pipeline, once a stage has been spawned.
    group: Option<ProcessId>,
    status: ProcessStatus,
    exit_requested: Option<u8>,
    launched_any: bool,
    waited_any: bool,
}

impl<'a> ListRunner<'a> {
    fn new(shell: &'a mut Shell, list: &'a mut CommandList) -> Self {
        let status = ProcessStatus::Exited(shell.last_exit_status.into());

        Self {
            shell,
            list,
            cursor: 0,
            last: 0,
            group: None,
            status,
            exit_requested: None,
            launched_any: false,
            waited_any: false,
        }
    }

    fn run(mut self) -> ExecutionResult {
        let mut state = if self.list.is_empty() {
            RunState::Done
        } else {
            RunState::Launch
        };

        while state != RunState::Done {
            tracing::trace!(target: trace_categories::JOBS, "list runner: {state:?} at {}", self.cursor);

            state = match state {
                RunState::Launch => self.launch_pipeline(),
                RunState::Wait => self.wait_for_pipeline(),
                RunState::Decide => self.decide(),
                RunState::Advance { run_next } => self.advance(run_next),
                RunState::Done => RunState::Done,
            };
        }

        // A line that only started background work still hands the terminal back.
        if self.launched_any && !self.waited_any {
            self.release_foreground();
        }

        match self.exit_requested {
            Some(code) => ExecutionResult::exit(code),
            None => self.status.into(),
        }
    }

    /// Launches every stage of the pipeline at the cursor before any of them is
    /// waited on.
    fn launch_pipeline(&mut self) -> RunState {
        self.last = self.list.pipeline_end(self.cursor);
        self.group = None;

        let mut policy = self.shell.pipeline_group_policy();

        for index in self.cursor..=self.last {
            let command = &mut self.list[index];

            match launcher::launch(self.shell, command, policy) {
                Ok(LaunchOutcome::Spawned(pid)) => {
                    self.launched_any = true;
                    let group = *self.group.get_or_insert(pid);
                    policy = policy.for_next_stage(Some(group));

                    let command = &self.list[index];
                    if command.runs_asynchronously() {
                        self.shell.jobs.add(pid, command.to_string());
                    }
                }
                Ok(LaunchOutcome::Completed(status)) => command.record_exit_status(status),
                Ok(LaunchOutcome::ExitRequested(code)) => {
                    tracing::debug!(target: trace_categories::COMMANDS, "exit requested with code {code}");
                    self.exit_requested = Some(code);
                    return RunState::Done;
                }
                Err(err) => {
                    error::report(&err);
                    command.record_exit_status(ProcessStatus::FAILURE);
                }
            }
        }

        RunState::Wait
    }

    /// Waits on the pipeline's last stage; its status is the pipeline's status.
    fn wait_for_pipeline(&mut self) -> RunState {
        let last = &self.list[self.last];

        if let Some(status) = last.exit_status() {
            self.status = status;
            return RunState::Decide;
        }

        if last.background {
            self.status = ProcessStatus::SUCCESS;
            return RunState::Decide;
        }

        let Some(pid) = last.pid else {
            tracing::error!("pipeline stage '{last}' was neither launched nor completed");
            self.status = ProcessStatus::FAILURE;
            return RunState::Decide;
        };

        if let Some(group) = self.group {
            if let Err(err) = self.shell.terminal.acquire_foreground(group) {
                tracing::debug!(target: trace_categories::TERMINAL, "failed to move {group} to foreground: {err}");
            }
        }

        let status = match self.shell.launcher.wait(pid) {
            Ok(status) => status,
            Err(err) => {
                error::report(&err);
                ProcessStatus::FAILURE
            }
        };

        self.waited_any = true;
        self.release_foreground();

        tracing::debug!(target: trace_categories::JOBS, "pipeline ending with {pid} finished: {status:?}");

        self.list[self.last].pid = None;
        self.list[self.last].record_exit_status(status);
        self.status = status;

        RunState::Decide
    }

    fn decide(&mut self) -> RunState {
        let last = &self.list[self.last];

        if !last.background && self.status.was_interrupted() {
            tracing::debug!(target: trace_categories::JOBS, "'{last}' was interrupted; cancelling the rest of the line");
            return RunState::Done;
        }

        RunState::Advance {
            run_next: last.conditional.allows_successor(self.status),
        }
    }

    fn advance(&mut self, run_next: bool) -> RunState {
        let next = self.last + 1;

        if self.list.get(next).is_none_or(|c| c.is_sentinel()) {
            return RunState::Done;
        }

        self.cursor = next;

        if run_next {
            return RunState::Launch;
        }

        // Skip the whole pipeline; the status that caused the skip then meets the
        // skipped pipeline's own operator.
        self.last = self.list.pipeline_end(next);
        for index in next..=self.last {
            let skipped = &mut self.list[index];
            tracing::debug!(target: trace_categories::JOBS, "skipping '{skipped}'");
            skipped.release_io();
        }

        RunState::Decide
    }

    fn release_foreground(&mut self) {
        if let Err(err) = self.shell.terminal.release_foreground() {
            tracing::debug!(target: trace_categories::TERMINAL, "failed to reclaim terminal: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processes::ProcessGroupPolicy;
    use crate::testing::{Event, TestShell};
    use pretty_assertions::assert_eq;

    fn spawn(name: &str) -> Event {
        Event::Spawn(name.into())
    }

    fn wait(name: &str) -> Event {
        Event::Wait(name.into())
    }

    #[test]
    fn single_command_is_waited_on_in_the_foreground() -> anyhow::Result<()> {
        let mut test = TestShell::new()?;

        let result = test.run("ls -l")?;

        assert_eq!(result, ExecutionResult::success());
        assert_eq!(
            test.events(),
            vec![
                spawn("ls"),
                Event::Acquire(100),
                wait("ls"),
                Event::Release
            ]
        );
        Ok(())
    }

    #[test]
    fn and_runs_successor_only_on_success() -> anyhow::Result<()> {
        let mut test = TestShell::new()?;
        test.set_status("a", ProcessStatus::SUCCESS);
        test.run("a && b")?;
        assert_eq!(test.spawned(), vec!["a", "b"]);

        let mut test = TestShell::new()?;
        test.set_status("a", ProcessStatus::Exited(1));
        let result = test.run("a && b")?;
        assert_eq!(test.spawned(), vec!["a"]);
        assert_eq!(result.exit_code, 1);
        Ok(())
    }

    #[test]
    fn or_runs_successor_only_on_failure() -> anyhow::Result<()> {
        let mut test = TestShell::new()?;
        test.run("a || b")?;
        assert_eq!(test.spawned(), vec!["a"]);

        let mut test = TestShell::new()?;
        test.set_status("a", ProcessStatus::Signaled(9));
        test.run("a || b")?;
        assert_eq!(test.spawned(), vec!["a", "b"]);
        Ok(())
    }

    #[test]
    fn short_circuit_resumes_after_the_chain() -> anyhow::Result<()> {
        let mut test = TestShell::new()?;
        test.set_status("a", ProcessStatus::FAILURE);

        let result = test.run("a && b && c || d; e")?;

        assert_eq!(test.spawned(), vec!["a", "d", "e"]);
        assert_eq!(result, ExecutionResult::success());
        Ok(())
    }

    #[test]
    fn skipped_or_keeps_success_flowing() -> anyhow::Result<()> {
        let mut test = TestShell::new()?;

        test.run("a || b && c")?;

        assert_eq!(test.spawned(), vec!["a", "c"]);
        Ok(())
    }

    #[test]
    fn sequence_runs_regardless_of_status() -> anyhow::Result<()> {
        let mut test = TestShell::new()?;
        test.set_status("echo", ProcessStatus::Exited(3));

        let result = test.run("echo hi; echo bye")?;

        assert_eq!(test.spawned(), vec!["echo", "echo"]);
        assert_eq!(result.exit_code, 3);
        Ok(())
    }

    #[test]
    fn pipeline_launches_all_stages_before_waiting() -> anyhow::Result<()> {
        let mut test = TestShell::new()?;
        test.set_status("a", ProcessStatus::Exited(5));
        test.set_status("c", ProcessStatus::Exited(7));

        let result = test.run("a | b | c")?;

        assert_eq!(
            test.events(),
            vec![
                spawn("a"),
                spawn("b"),
                spawn("c"),
                Event::Acquire(100),
                wait("c"),
                Event::Release,
                Event::Reap("a".into()),
                Event::Reap("b".into()),
            ]
        );
        assert_eq!(result.exit_code, 7);
        assert!(test.shell.background_jobs().is_empty());
        Ok(())
    }

    #[test]
    fn pipeline_stages_share_the_first_stage_group() -> anyhow::Result<()> {
        let mut test = TestShell::new()?;

        test.run("a | b | c; d")?;

        assert_eq!(
            test.spawned_groups(),
            vec![
                ProcessGroupPolicy::NewProcessGroup,
                ProcessGroupPolicy::JoinProcessGroup(100),
                ProcessGroupPolicy::JoinProcessGroup(100),
                ProcessGroupPolicy::NewProcessGroup,
            ]
        );
        Ok(())
    }

    #[test]
    fn without_job_control_children_stay_in_shell_group() -> anyhow::Result<()> {
        let mut test = TestShell::without_job_control()?;

        test.run("a | b")?;

        assert_eq!(
            test.spawned_groups(),
            vec![
                ProcessGroupPolicy::SameProcessGroup,
                ProcessGroupPolicy::SameProcessGroup,
            ]
        );
        Ok(())
    }

    #[test]
    fn pipeline_status_feeds_conditional() -> anyhow::Result<()> {
        let mut test = TestShell::new()?;
        test.set_status("b", ProcessStatus::FAILURE);

        test.run("a | b && c")?;
        assert_eq!(test.spawned(), vec!["a", "b"]);

        let mut test = TestShell::new()?;
        test.set_status("a", ProcessStatus::FAILURE);

        test.run("a | b && c")?;
        assert_eq!(test.spawned(), vec!["a", "b", "c"]);
        Ok(())
    }

    #[test]
    fn background_command_is_not_waited_on() -> anyhow::Result<()> {
        let mut test = TestShell::new()?;
        test.keep_running("sleep");

        let result = test.run("sleep 10 &")?;

        assert_eq!(result, ExecutionResult::success());
        assert_eq!(test.events(), vec![spawn("sleep"), Event::Release]);
        assert_eq!(test.shell.background_jobs().len(), 1);

        let job = test.shell.background_jobs().iter().next().cloned();
        assert_eq!(job.map(|j| j.command_line), Some("sleep 10 &".to_owned()));
        Ok(())
    }

    #[test]
    fn background_command_does_not_block_successor() -> anyhow::Result<()> {
        let mut test = TestShell::new()?;
        test.keep_running("a");

        test.run("a & b")?;

        assert_eq!(
            test.events(),
            vec![
                spawn("a"),
                spawn("b"),
                Event::Acquire(101),
                wait("b"),
                Event::Release
            ]
        );
        Ok(())
    }

    #[test]
    fn background_jobs_are_reaped_on_later_lines() -> anyhow::Result<()> {
        let mut test = TestShell::new()?;
        test.keep_running("a");

        test.run("a &")?;
        assert_eq!(test.shell.background_jobs().len(), 1);

        test.finish("a");
        test.run("b")?;
        assert!(test.shell.background_jobs().is_empty());
        Ok(())
    }

    #[test]
    fn exit_stops_the_list() -> anyhow::Result<()> {
        let mut test = TestShell::new()?;

        let result = test.run("a; exit 3; b")?;

        assert_eq!(result, ExecutionResult::exit(3));
        assert_eq!(test.spawned(), vec!["a"]);
        Ok(())
    }

    #[test]
    fn exit_honors_conditionals() -> anyhow::Result<()> {
        let mut test = TestShell::new()?;

        let result = test.run("a || exit 1")?;

        assert!(!result.exit_shell);
        Ok(())
    }

    #[test]
    fn failed_cd_blocks_and_chain() -> anyhow::Result<()> {
        let mut test = TestShell::new()?;

        let result = test.run("cd /nonexistent/jobsh-test-dir && a")?;

        assert_eq!(result.exit_code, 1);
        assert!(test.events().is_empty());
        Ok(())
    }

    #[test]
    fn interrupted_command_cancels_the_line() -> anyhow::Result<()> {
        let mut test = TestShell::new()?;
        test.set_status("a", ProcessStatus::Signaled(nix::libc::SIGINT));

        let result = test.run("a; b || c")?;

        assert_eq!(test.spawned(), vec!["a"]);
        assert_eq!(result.exit_code, 130);
        Ok(())
    }

    #[test]
    fn spawn_failure_counts_as_failure() -> anyhow::Result<()> {
        let mut test = TestShell::new()?;
        test.fail_spawn("a");

        let result = test.run("a || b")?;

        assert_eq!(test.spawned(), vec!["b"]);
        assert_eq!(result, ExecutionResult::success());

        let mut test = TestShell::new()?;
        test.fail_spawn("a");

        let result = test.run("a")?;
        assert_eq!(result.exit_code, 1);
        Ok(())
    }

    #[test]
    fn empty_line_keeps_last_status() -> anyhow::Result<()> {
        let mut test = TestShell::new()?;
        test.set_status("a", ProcessStatus::Exited(4));

        test.run("a")?;
        let result = test.run("")?;

        assert_eq!(result.exit_code, 4);
        assert_eq!(test.shell.last_exit_status(), 4);
        Ok(())
    }
}
