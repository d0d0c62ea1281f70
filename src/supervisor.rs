//! Process supervisor
//!
//! Wraps one external command invocation: owns the OS child handle and the
//! job lifecycle state derived from it. State is refreshed lazily, only
//! when someone polls.

use crate::description::JobDescription;
use crate::error::{JobError, JobResult};
use crate::job_state::JobState;
use crate::logging::debug;
use crate::platform;
use crate::wait::{poll_until, PollSettings, WaitTimeout};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;

/// Supervisor shared between the bookkeeper and in-flight verbs
pub type SharedSupervisor = Arc<Mutex<ProcessSupervisor>>;

#[derive(Debug)]
pub struct ProcessSupervisor {
    executable: String,
    arguments: Vec<String>,
    environment: BTreeMap<String, String>,
    child: Option<Child>,
    pid: Option<u32>,
    state: JobState,
    exit_code: Option<i32>,
    reaped: bool,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl ProcessSupervisor {
    /// Copy everything needed from `description`; the supervisor never looks at it again
    pub fn new(description: &JobDescription) -> Self {
        Self {
            executable: description.executable.clone(),
            arguments: description.arguments.clone(),
            environment: description.environment.clone(),
            child: None,
            pid: None,
            state: JobState::New,
            exit_code: None,
            reaped: false,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn shared(description: &JobDescription) -> SharedSupervisor {
        Arc::new(Mutex::new(Self::new(description)))
    }

    /// Spawn the process and move to `Running`.
    ///
    /// Calling this twice spawns a second process; the first child handle
    /// is dropped without being reaped.
    pub fn start(&mut self) -> JobResult<u32> {
        if self.executable.trim().is_empty() {
            return Err(JobError::bad_parameter("cannot run a job with an empty executable"));
        }

        let mut command = Command::new(&self.executable);
        command.args(&self.arguments);
        command.envs(&self.environment);
        command.stdin(Stdio::null());
        platform::prepare_command(&mut command);

        let child = command.spawn().map_err(|err| {
            JobError::no_success_with_source(
                format!("failed to spawn '{}': {}", self.executable, err),
                err,
            )
        })?;
        let pid = child.id();

        if self.child.is_some() && !self.reaped {
            debug(format!(
                "re-running '{}': previous pid={:?} is no longer supervised",
                self.executable, self.pid
            ));
        }

        self.child = Some(child);
        self.pid = Some(pid);
        self.state = JobState::Running;
        self.exit_code = None;
        self.reaped = false;
        self.started_at = Some(Utc::now());
        self.finished_at = None;

        debug(format!(
            "Started '{}' pid={} args={:?}",
            self.executable, pid, self.arguments
        ));
        Ok(pid)
    }

    /// Check the child without blocking; returns whether no live child remains.
    ///
    /// An exit observed while `Running` moves to `Done` or `Failed`. An exit
    /// observed after a cancel keeps `Canceled` but records the exit code.
    pub fn reap(&mut self) -> JobResult<bool> {
        if self.reaped {
            return Ok(true);
        }
        let Some(child) = self.child.as_mut() else {
            return Ok(true);
        };

        match child.try_wait() {
            Ok(Some(status)) => {
                self.record_exit(status);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(err) => Err(JobError::no_success_with_source(
                format!("failed to poll pid={:?}: {}", self.pid, err),
                err,
            )),
        }
    }

    /// Refresh (if running) and return the lifecycle state
    pub fn poll(&mut self) -> JobResult<JobState> {
        if self.state == JobState::Running {
            self.reap()?;
        }
        Ok(self.state)
    }

    /// Signal the process group and mark the job `Canceled` right away.
    ///
    /// Best-effort: the process may still be alive when this returns; a
    /// later wait observes the actual exit.
    pub fn terminate(&mut self) -> JobResult<()> {
        match self.state {
            JobState::Running => {}
            JobState::New => {
                return Err(JobError::incorrect_state("cannot cancel a job that was never run"));
            }
            state => {
                return Err(JobError::incorrect_state(format!(
                    "cannot cancel a job in state {}",
                    state
                )));
            }
        }

        if let (Some(pid), false) = (self.pid, self.reaped) {
            platform::terminate_group(pid)?;
        }
        self.state = JobState::Canceled;
        self.finished_at.get_or_insert_with(Utc::now);
        debug(format!("Canceled '{}' pid={:?}", self.executable, self.pid));
        Ok(())
    }

    /// Wait while holding exclusive access; see [`wait_shared`] for the shared form
    pub fn wait(&mut self, settings: &PollSettings, timeout: WaitTimeout) -> JobResult<JobState> {
        poll_until(settings, timeout, || self.reap())?;
        Ok(self.state)
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    fn record_exit(&mut self, status: ExitStatus) {
        self.reaped = true;
        self.exit_code = extract_exit_code(status);
        self.finished_at.get_or_insert_with(Utc::now);
        if self.state == JobState::Running {
            self.state = JobState::from_exit_code(self.exit_code);
        }
        debug(format!(
            "pid={:?} exited status={} state={}",
            self.pid, status, self.state
        ));
    }
}

/// Wait on a shared supervisor, locking only for each poll.
///
/// Sleeping between polls happens without the lock, so a concurrent cancel
/// or state query never queues behind a long wait.
pub fn wait_shared(
    supervisor: &SharedSupervisor,
    settings: &PollSettings,
    timeout: WaitTimeout,
) -> JobResult<JobState> {
    poll_until(settings, timeout, || supervisor.lock().reap())?;
    Ok(supervisor.lock().state())
}

/// Exit code, or `128 + signal` for a signal death on unix
fn extract_exit_code(status: ExitStatus) -> Option<i32> {
    if let Some(code) = status.code() {
        return Some(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        status.signal().map(|signal| 128 + signal)
    }
    #[cfg(not(unix))]
    {
        None
    }
}
