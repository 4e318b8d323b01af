//! Scripted stand-ins for the process and terminal layers, for unit tests.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::rc::Rc;

use crate::builder::OsPipeFactory;
use crate::command::Command;
use crate::processes::{ProcessGroupPolicy, ProcessId, ProcessLauncher, ProcessStatus};
use crate::terminal::TerminalControl;
use crate::{CreateOptions, ExecutionResult, Shell, error};

/// Something the fakes observed, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Event {
    Spawn(String),
    Wait(String),
    Reap(String),
    Acquire(ProcessId),
    Release,
}

#[derive(Default)]
struct FakeState {
    events: Vec<Event>,
    groups: Vec<ProcessGroupPolicy>,
    statuses: HashMap<String, ProcessStatus>,
    unspawnable: HashSet<String>,
    long_running: HashSet<String>,
    running: HashMap<ProcessId, String>,
    next_pid: ProcessId,
}

impl FakeState {
    fn status_of(&self, name: &str) -> ProcessStatus {
        self.statuses
            .get(name)
            .copied()
            .unwrap_or(ProcessStatus::SUCCESS)
    }
}

type SharedState = Rc<RefCell<FakeState>>;

struct FakeLauncher(SharedState);

impl ProcessLauncher for FakeLauncher {
    fn spawn(
        &mut self,
        command: &Command,
        _working_dir: &Path,
        group: ProcessGroupPolicy,
    ) -> Result<ProcessId, error::Error> {
        let mut state = self.0.borrow_mut();
        let name = command.name().unwrap_or_default().to_owned();

        if state.unspawnable.contains(&name) {
            return Err(error::Error::ChildCreationFailure(nix::errno::Errno::EAGAIN));
        }

        let pid = 100 + state.next_pid;
        state.next_pid += 1;

        state.groups.push(group);
        state.events.push(Event::Spawn(name.clone()));
        state.running.insert(pid, name);

        Ok(pid)
    }

    fn wait(&mut self, pid: ProcessId) -> Result<ProcessStatus, error::Error> {
        let mut state = self.0.borrow_mut();
        let name = state
            .running
            .remove(&pid)
            .ok_or(error::Error::NoSuchChild(pid))?;

        let status = state.status_of(&name);
        state.events.push(Event::Wait(name));
        Ok(status)
    }

    fn try_wait(&mut self, pid: ProcessId) -> Result<Option<ProcessStatus>, error::Error> {
        let mut state = self.0.borrow_mut();
        let name = state
            .running
            .get(&pid)
            .cloned()
            .ok_or(error::Error::NoSuchChild(pid))?;

        if state.long_running.contains(&name) {
            return Ok(None);
        }

        state.running.remove(&pid);
        let status = state.status_of(&name);
        state.events.push(Event::Reap(name));
        Ok(Some(status))
    }
}

struct RecordingTerminal(SharedState);

impl TerminalControl for RecordingTerminal {
    fn acquire_foreground(&mut self, process_group: ProcessId) -> Result<(), error::Error> {
        self.0.borrow_mut().events.push(Event::Acquire(process_group));
        Ok(())
    }

    fn release_foreground(&mut self) -> Result<(), error::Error> {
        self.0.borrow_mut().events.push(Event::Release);
        Ok(())
    }
}

/// A shell wired to a scripted launcher and a recording terminal.
///
/// Spawned commands exit with status 0 unless scripted otherwise, and background
/// commands finish as soon as they are polled unless marked as long-running.
pub(crate) struct TestShell {
    pub shell: Shell,
    state: SharedState,
}

impl TestShell {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_job_control(true)
    }

    pub fn without_job_control() -> anyhow::Result<Self> {
        Self::with_job_control(false)
    }

    fn with_job_control(interactive: bool) -> anyhow::Result<Self> {
        let state = SharedState::default();

        let options = CreateOptions::builder()
            .interactive(interactive)
            .working_dir(std::env::temp_dir())
            .build();

        let shell = Shell::with_components(
            options,
            Box::new(FakeLauncher(state.clone())),
            Box::new(RecordingTerminal(state.clone())),
            Box::new(OsPipeFactory),
        )?;

        Ok(Self { shell, state })
    }

    pub fn run(&mut self, line: &str) -> anyhow::Result<ExecutionResult> {
        Ok(self.shell.run_string(line)?)
    }

    pub fn set_status(&mut self, name: &str, status: ProcessStatus) {
        self.state.borrow_mut().statuses.insert(name.into(), status);
    }

    pub fn fail_spawn(&mut self, name: &str) {
        self.state.borrow_mut().unspawnable.insert(name.into());
    }

    pub fn keep_running(&mut self, name: &str) {
        self.state.borrow_mut().long_running.insert(name.into());
    }

    pub fn finish(&mut self, name: &str) {
        self.state.borrow_mut().long_running.remove(name);
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.borrow().events.clone()
    }

    pub fn spawned(&self) -> Vec<String> {
        self.state
            .borrow()
            .events
            .iter()
            .filter_map(|event| match event {
                Event::Spawn(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn spawned_groups(&self) -> Vec<ProcessGroupPolicy> {
        self.state.borrow().groups.clone()
    }
}
