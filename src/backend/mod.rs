//! Backend plugin contract
//!
//! A backend executes jobs for one class of target. The runtime only ever
//! talks to backends through [`Backend`] and creates them through
//! [`BackendFactory`].
//!
//! Registration hooks are required. Every verb has a default body that
//! fails with `NotImplemented` naming the verb, so a backend opts in to
//! exactly the capabilities it supports.

pub mod local;
pub mod ssh;

use crate::config::RuntimeConfig;
use crate::description::JobDescription;
use crate::error::{JobError, JobResult};
use crate::job_state::JobState;
use crate::keys::{ContainerKey, JobKey, ServiceKey};
use crate::locator::ResourceLocator;
use crate::wait::WaitTimeout;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

pub use local::{LocalBackend, LocalBackendFactory};
pub use ssh::{SshBackend, SshBackendFactory};

/// How a container wait decides it is finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitMode {
    /// Every member has terminated
    #[default]
    All,
    /// At least one member has terminated
    Any,
}

/// When a job started and finished, as far as the backend knows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct JobTimes {
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Creates backend instances and answers questions that need no instance
pub trait BackendFactory: Send + Sync {
    /// Stable backend name, used in diagnostics and `disabled_backends`
    fn name(&self) -> &'static str;

    /// URL schemes this backend serves
    fn declared_schemes(&self) -> &'static [&'static str];

    /// Whether the backend can work on this host at all; run once per process
    fn sanity_check(&self) -> bool;

    fn create(&self, config: &RuntimeConfig) -> Arc<dyn Backend>;
}

pub trait Backend: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Accept a service for `locator`, or reject it with `BadParameter`
    fn register_service(&self, service: ServiceKey, locator: &ResourceLocator) -> JobResult<()>;

    /// Must not fail; called during teardown
    fn unregister_service(&self, service: ServiceKey);

    /// Allocate backend-private execution state for `job`
    fn register_job(
        &self,
        job: JobKey,
        service: ServiceKey,
        description: &JobDescription,
    ) -> JobResult<()>;

    /// Best-effort and silent; called during teardown
    fn unregister_job(&self, job: JobKey);

    fn register_container(&self, container: ContainerKey, service: ServiceKey) -> JobResult<()> {
        let _ = (container, service);
        Err(JobError::not_implemented("register_container", self.name()))
    }

    fn unregister_container(&self, container: ContainerKey) {
        let _ = container;
    }

    fn run(&self, job: JobKey) -> JobResult<()> {
        let _ = job;
        Err(JobError::not_implemented("run", self.name()))
    }

    fn cancel(&self, job: JobKey, timeout: WaitTimeout) -> JobResult<()> {
        let _ = (job, timeout);
        Err(JobError::not_implemented("cancel", self.name()))
    }

    fn wait(&self, job: JobKey, timeout: WaitTimeout) -> JobResult<JobState> {
        let _ = (job, timeout);
        Err(JobError::not_implemented("wait", self.name()))
    }

    fn get_state(&self, job: JobKey) -> JobResult<JobState> {
        let _ = job;
        Err(JobError::not_implemented("get_state", self.name()))
    }

    fn get_job_id(&self, job: JobKey) -> JobResult<String> {
        let _ = job;
        Err(JobError::not_implemented("get_job_id", self.name()))
    }

    fn get_native_id(&self, job: JobKey) -> JobResult<u32> {
        let _ = job;
        Err(JobError::not_implemented("get_native_id", self.name()))
    }

    fn get_exit_code(&self, job: JobKey) -> JobResult<Option<i32>> {
        let _ = job;
        Err(JobError::not_implemented("get_exit_code", self.name()))
    }

    fn get_times(&self, job: JobKey) -> JobResult<JobTimes> {
        let _ = job;
        Err(JobError::not_implemented("get_times", self.name()))
    }

    /// Identifiers of the service's jobs that have been started
    fn list_jobs(&self, service: ServiceKey) -> JobResult<Vec<String>> {
        let _ = service;
        Err(JobError::not_implemented("list_jobs", self.name()))
    }

    /// Resolve a job identifier to the job it names
    fn find_job(&self, service: ServiceKey, job_id: &str) -> JobResult<JobKey> {
        let _ = (service, job_id);
        Err(JobError::not_implemented("find_job", self.name()))
    }

    fn container_add(&self, container: ContainerKey, job: JobKey) -> JobResult<()> {
        let _ = (container, job);
        Err(JobError::not_implemented("container_add", self.name()))
    }

    fn container_remove(&self, container: ContainerKey, job: JobKey) -> JobResult<()> {
        let _ = (container, job);
        Err(JobError::not_implemented("container_remove", self.name()))
    }

    fn container_list(&self, container: ContainerKey) -> JobResult<Vec<JobKey>> {
        let _ = container;
        Err(JobError::not_implemented("container_list", self.name()))
    }

    fn container_run(&self, container: ContainerKey) -> JobResult<()> {
        let _ = container;
        Err(JobError::not_implemented("container_run", self.name()))
    }

    fn container_cancel(&self, container: ContainerKey, timeout: WaitTimeout) -> JobResult<()> {
        let _ = (container, timeout);
        Err(JobError::not_implemented("container_cancel", self.name()))
    }

    /// Returns the members that are terminal when the wait ends
    fn container_wait(
        &self,
        container: ContainerKey,
        timeout: WaitTimeout,
        mode: WaitMode,
    ) -> JobResult<Vec<JobKey>> {
        let _ = (container, timeout, mode);
        Err(JobError::not_implemented("container_wait", self.name()))
    }

    fn container_states(&self, container: ContainerKey) -> JobResult<Vec<(JobKey, JobState)>> {
        let _ = container;
        Err(JobError::not_implemented("container_states", self.name()))
    }
}

/// Job identifier in the form `[<service-url>]-[<native-id>]`
pub fn format_job_id(locator: &ResourceLocator, native_id: impl fmt::Display) -> String {
    format!("[{}]-[{}]", locator, native_id)
}

/// Split a job identifier back into service URL and native id
pub fn parse_job_id(job_id: &str) -> JobResult<(&str, &str)> {
    let malformed = || {
        JobError::bad_parameter(format!(
            "malformed job id '{}': expected [<service-url>]-[<native-id>]",
            job_id
        ))
    };
    let inner = job_id
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(malformed)?;
    let (url, native) = inner.rsplit_once("]-[").ok_or_else(malformed)?;
    if url.is_empty() || native.is_empty() {
        return Err(malformed());
    }
    Ok((url, native))
}
