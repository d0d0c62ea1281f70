//! Container façade
//!
//! An unordered set of jobs from one service, run, canceled and waited on
//! together. Membership is by job identity.

use crate::backend::{Backend, WaitMode};
use crate::error::{JobError, JobResult};
use crate::job::Job;
use crate::job_state::JobState;
use crate::keys::{ContainerKey, JobKey, ServiceKey};
use crate::wait::WaitTimeout;
use std::fmt;
use std::sync::Arc;

pub struct Container {
    key: ContainerKey,
    service: ServiceKey,
    backend: Option<Arc<dyn Backend>>,
}

impl Container {
    pub(crate) fn bound(key: ContainerKey, service: ServiceKey, backend: Arc<dyn Backend>) -> Self {
        Self {
            key,
            service,
            backend: Some(backend),
        }
    }

    fn backend(&self) -> JobResult<&Arc<dyn Backend>> {
        self.backend.as_ref().ok_or_else(JobError::not_bound)
    }

    pub fn add(&self, job: &Job) -> JobResult<()> {
        if job.service_key() != self.service {
            return Err(JobError::bad_parameter(format!(
                "{} was not created by the service that owns {}",
                job.key(),
                self.key
            )));
        }
        self.backend()?.container_add(self.key, job.key())
    }

    pub fn remove(&self, job: &Job) -> JobResult<()> {
        self.backend()?.container_remove(self.key, job.key())
    }

    pub fn list(&self) -> JobResult<Vec<JobKey>> {
        self.backend()?.container_list(self.key)
    }

    pub fn run(&self) -> JobResult<()> {
        self.backend()?.container_run(self.key)
    }

    pub fn cancel(&self, timeout: WaitTimeout) -> JobResult<()> {
        self.backend()?.container_cancel(self.key, timeout)
    }

    /// Members that are terminal when the wait ends
    pub fn wait(&self, timeout: WaitTimeout, mode: WaitMode) -> JobResult<Vec<JobKey>> {
        self.backend()?.container_wait(self.key, timeout, mode)
    }

    pub fn states(&self) -> JobResult<Vec<(JobKey, JobState)>> {
        self.backend()?.container_states(self.key)
    }

    pub fn key(&self) -> ContainerKey {
        self.key
    }

    pub fn is_bound(&self) -> bool {
        self.backend.is_some()
    }

    /// Unregister from the backend. Idempotent and never fails; member jobs are untouched.
    pub fn close(&mut self) {
        if let Some(backend) = self.backend.take() {
            backend.unregister_container(self.key);
        }
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("key", &self.key)
            .field("service", &self.service)
            .field("bound", &self.is_bound())
            .finish()
    }
}
