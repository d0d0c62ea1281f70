//! Service façade
//!
//! A submission endpoint bound to one locator and therefore one backend.
//! The binding is fixed at construction; `close` (or drop) unregisters it.

use crate::backend::Backend;
use crate::container::Container;
use crate::description::JobDescription;
use crate::error::{JobError, JobResult};
use crate::job::Job;
use crate::keys::{ContainerKey, JobKey, ServiceKey};
use crate::locator::ResourceLocator;
use crate::runtime::Runtime;
use std::fmt;
use std::sync::Arc;

pub struct Service {
    key: ServiceKey,
    locator: ResourceLocator,
    backend: Option<Arc<dyn Backend>>,
}

impl Service {
    /// Parse `url`, resolve its backend and register with it
    pub fn new(runtime: &Runtime, url: &str) -> JobResult<Self> {
        Self::with_locator(runtime, ResourceLocator::parse(url)?)
    }

    pub fn with_locator(runtime: &Runtime, locator: ResourceLocator) -> JobResult<Self> {
        let backend = runtime.resolve(&locator)?;
        let key = ServiceKey::new();
        backend.register_service(key, &locator)?;
        Ok(Self {
            key,
            locator,
            backend: Some(backend),
        })
    }

    fn backend(&self) -> JobResult<&Arc<dyn Backend>> {
        self.backend.as_ref().ok_or_else(JobError::not_bound)
    }

    /// Register a new job for `description` with this service's backend
    pub fn create_job(&self, description: JobDescription) -> JobResult<Job> {
        let backend = Arc::clone(self.backend()?);
        let key = JobKey::new();
        backend.register_job(key, self.key, &description)?;
        Ok(Job::bound(key, self.key, description, backend))
    }

    pub fn create_container(&self) -> JobResult<Container> {
        let backend = Arc::clone(self.backend()?);
        let key = ContainerKey::new();
        backend.register_container(key, self.key)?;
        Ok(Container::bound(key, self.key, backend))
    }

    /// Identifiers of this service's jobs that have been run
    pub fn list(&self) -> JobResult<Vec<String>> {
        self.backend()?.list_jobs(self.key)
    }

    /// Look up the job named by `job_id` and return its key.
    ///
    /// This does not hand out a second [`Job`]: the handle returned by
    /// [`Service::create_job`] owns the registration. Match the key against
    /// [`Job::key`] to find it. `DoesNotExist` when no job matches.
    pub fn find(&self, job_id: &str) -> JobResult<JobKey> {
        self.backend()?.find_job(self.key, job_id)
    }

    pub fn key(&self) -> ServiceKey {
        self.key
    }

    pub fn locator(&self) -> &ResourceLocator {
        &self.locator
    }

    pub fn backend_name(&self) -> Option<&'static str> {
        self.backend.as_ref().map(|backend| backend.name())
    }

    pub fn is_bound(&self) -> bool {
        self.backend.is_some()
    }

    /// Unregister from the backend. Idempotent and never fails.
    ///
    /// Jobs created from this service stay usable until they are closed.
    pub fn close(&mut self) {
        if let Some(backend) = self.backend.take() {
            backend.unregister_service(self.key);
        }
    }
}

impl Drop for Service {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("key", &self.key)
            .field("locator", &self.locator.as_str())
            .field("backend", &self.backend_name())
            .finish()
    }
}
