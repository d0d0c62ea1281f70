//! Job façade
//!
//! One task submitted through one service. Every verb forwards to the
//! backend the service was bound to.

use crate::backend::{Backend, JobTimes};
use crate::description::JobDescription;
use crate::error::{JobError, JobResult};
use crate::job_state::JobState;
use crate::keys::{JobKey, ServiceKey};
use crate::wait::WaitTimeout;
use std::fmt;
use std::sync::Arc;

pub struct Job {
    key: JobKey,
    service: ServiceKey,
    description: JobDescription,
    backend: Option<Arc<dyn Backend>>,
}

impl Job {
    pub(crate) fn bound(
        key: JobKey,
        service: ServiceKey,
        description: JobDescription,
        backend: Arc<dyn Backend>,
    ) -> Self {
        Self {
            key,
            service,
            description,
            backend: Some(backend),
        }
    }

    fn backend(&self) -> JobResult<&Arc<dyn Backend>> {
        self.backend.as_ref().ok_or_else(JobError::not_bound)
    }

    /// Start the job. Running it again spawns again; nothing guards against that.
    pub fn run(&self) -> JobResult<()> {
        self.backend()?.run(self.key)
    }

    /// Request termination; the state becomes `Canceled` immediately.
    ///
    /// `timeout` is advisory. Use [`Job::wait`] to observe the actual exit.
    pub fn cancel(&self, timeout: WaitTimeout) -> JobResult<()> {
        self.backend()?.cancel(self.key, timeout)
    }

    /// Wait for the job to finish, up to `timeout`, and return the state seen last.
    ///
    /// A wait that times out is not an error; the state may still be `Running`.
    pub fn wait(&self, timeout: WaitTimeout) -> JobResult<JobState> {
        self.backend()?.wait(self.key, timeout)
    }

    pub fn state(&self) -> JobResult<JobState> {
        self.backend()?.get_state(self.key)
    }

    /// `[<service-url>]-[<native-id>]`, available once the job has been run
    pub fn job_id(&self) -> JobResult<String> {
        self.backend()?.get_job_id(self.key)
    }

    pub fn native_id(&self) -> JobResult<u32> {
        self.backend()?.get_native_id(self.key)
    }

    /// Exit code of a terminal job; `None` when the backend could not tell
    pub fn exit_code(&self) -> JobResult<Option<i32>> {
        self.backend()?.get_exit_code(self.key)
    }

    pub fn times(&self) -> JobResult<JobTimes> {
        self.backend()?.get_times(self.key)
    }

    pub fn description(&self) -> &JobDescription {
        &self.description
    }

    pub fn key(&self) -> JobKey {
        self.key
    }

    pub fn service_key(&self) -> ServiceKey {
        self.service
    }

    pub fn is_bound(&self) -> bool {
        self.backend.is_some()
    }

    /// Unregister from the backend. Idempotent and never fails; a running
    /// process is left running.
    pub fn close(&mut self) {
        if let Some(backend) = self.backend.take() {
            backend.unregister_job(self.key);
        }
    }
}

impl Drop for Job {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("key", &self.key)
            .field("service", &self.service)
            .field("executable", &self.description.executable)
            .field("bound", &self.is_bound())
            .finish()
    }
}
