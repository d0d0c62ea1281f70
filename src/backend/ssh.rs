//! Remote-shell backend stub
//!
//! Accepts services and jobs so it can be loaded and routed to, but offers
//! no execution verbs: every verb falls through to `NotImplemented`.

use super::{Backend, BackendFactory};
use crate::config::{RuntimeConfig, SSH_SCHEMES};
use crate::description::JobDescription;
use crate::error::{JobError, JobResult};
use crate::keys::{JobKey, ServiceKey};
use crate::locator::ResourceLocator;
use crate::logging::debug;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default, Clone, Copy)]
pub struct SshBackendFactory;

impl BackendFactory for SshBackendFactory {
    fn name(&self) -> &'static str {
        "ssh"
    }

    fn declared_schemes(&self) -> &'static [&'static str] {
        SSH_SCHEMES
    }

    /// Usable only where an `ssh` client is on PATH
    fn sanity_check(&self) -> bool {
        which::which("ssh").is_ok()
    }

    fn create(&self, _config: &RuntimeConfig) -> Arc<dyn Backend> {
        Arc::new(SshBackend::default())
    }
}

#[derive(Debug, Default)]
pub struct SshBackend {
    services: Mutex<HashMap<ServiceKey, ResourceLocator>>,
    jobs: Mutex<HashMap<JobKey, ServiceKey>>,
}

impl Backend for SshBackend {
    fn name(&self) -> &'static str {
        "ssh"
    }

    fn register_service(&self, service: ServiceKey, locator: &ResourceLocator) -> JobResult<()> {
        if locator.host().is_empty() {
            return Err(JobError::bad_parameter(format!(
                "{} names no remote host",
                locator
            )));
        }
        self.services.lock().insert(service, locator.clone());
        Ok(())
    }

    fn unregister_service(&self, service: ServiceKey) {
        self.services.lock().remove(&service);
    }

    fn register_job(
        &self,
        job: JobKey,
        service: ServiceKey,
        _description: &JobDescription,
    ) -> JobResult<()> {
        if !self.services.lock().contains_key(&service) {
            return Err(JobError::no_success(format!(
                "{} must be registered before its jobs",
                service
            )));
        }
        self.jobs.lock().insert(job, service);
        Ok(())
    }

    fn unregister_job(&self, job: JobKey) {
        if self.jobs.lock().remove(&job).is_none() {
            debug(format!("{} was not registered; nothing to release", job));
        }
    }
}
