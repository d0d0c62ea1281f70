//! Per-backend bookkeeping
//!
//! Associates façade keys with backend-private execution state: which jobs
//! and containers a service owns, and the process supervisor behind every
//! job. All tables sit behind one lock so a registration and a removal are
//! never observed half-done.

use crate::description::JobDescription;
use crate::error::{JobError, JobResult};
use crate::job_state::JobState;
use crate::keys::{ContainerKey, JobKey, ServiceKey};
use crate::locator::ResourceLocator;
use crate::logging::debug;
use crate::supervisor::{ProcessSupervisor, SharedSupervisor};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug)]
struct ServiceEntry {
    locator: ResourceLocator,
    jobs: Vec<JobKey>,
    containers: Vec<ContainerKey>,
    /// Unregistered, but kept until its last job and container go away
    retired: bool,
}

impl ServiceEntry {
    fn is_empty(&self) -> bool {
        self.jobs.is_empty() && self.containers.is_empty()
    }
}

#[derive(Debug)]
struct JobEntry {
    service: ServiceKey,
    process: SharedSupervisor,
}

#[derive(Debug)]
struct ContainerEntry {
    service: ServiceKey,
    jobs: Vec<JobKey>,
}

#[derive(Debug, Default)]
struct Tables {
    services: HashMap<ServiceKey, ServiceEntry>,
    jobs: HashMap<JobKey, JobEntry>,
    containers: HashMap<ContainerKey, ContainerEntry>,
}

impl Tables {
    fn forget_service_if_done(&mut self, service: ServiceKey) {
        let done = self
            .services
            .get(&service)
            .map(|entry| entry.retired && entry.is_empty())
            .unwrap_or(false);
        if done {
            self.services.remove(&service);
            debug(format!("{} released after its last job", service));
        }
    }
}

/// Serializable view of the tables, for tests and diagnostics
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BookkeeperSnapshot {
    pub services: Vec<ServiceSnapshot>,
    pub jobs: Vec<JobSnapshot>,
    pub containers: Vec<ContainerSnapshot>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ServiceSnapshot {
    pub key: ServiceKey,
    pub locator: String,
    pub retired: bool,
    pub jobs: Vec<JobKey>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct JobSnapshot {
    pub key: JobKey,
    pub service: ServiceKey,
    pub state: JobState,
    pub pid: Option<u32>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ContainerSnapshot {
    pub key: ContainerKey,
    pub service: ServiceKey,
    pub jobs: Vec<JobKey>,
}

#[derive(Debug, Default)]
pub struct Bookkeeper {
    tables: Mutex<Tables>,
}

impl Bookkeeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_service(&self, service: ServiceKey, locator: ResourceLocator) -> JobResult<()> {
        let mut tables = self.tables.lock();
        if tables.services.contains_key(&service) {
            return Err(JobError::no_success(format!("{} is already registered", service)));
        }
        tables.services.insert(
            service,
            ServiceEntry {
                locator,
                jobs: Vec::new(),
                containers: Vec::new(),
                retired: false,
            },
        );
        Ok(())
    }

    /// Unregister a service. Returns whether an entry was known.
    ///
    /// A service that still owns jobs or containers is retired instead of
    /// removed, so every registered job stays reachable from its service.
    pub fn remove_service(&self, service: ServiceKey) -> bool {
        let mut tables = self.tables.lock();
        let Some(entry) = tables.services.get_mut(&service) else {
            return false;
        };
        entry.retired = true;
        tables.forget_service_if_done(service);
        true
    }

    pub fn has_service(&self, service: ServiceKey) -> bool {
        self.tables.lock().services.contains_key(&service)
    }

    pub fn locator_for_service(&self, service: ServiceKey) -> JobResult<ResourceLocator> {
        self.tables
            .lock()
            .services
            .get(&service)
            .map(|entry| entry.locator.clone())
            .ok_or_else(|| JobError::no_success(format!("{} is not registered", service)))
    }

    /// Allocate a supervisor for `job` and attach it to `service`
    pub fn add_job(
        &self,
        job: JobKey,
        service: ServiceKey,
        description: &JobDescription,
    ) -> JobResult<()> {
        let mut tables = self.tables.lock();
        if tables.jobs.contains_key(&job) {
            return Err(JobError::no_success(format!("{} is already registered", job)));
        }
        let entry = match tables.services.get_mut(&service) {
            Some(entry) if !entry.retired => entry,
            Some(_) => {
                return Err(JobError::no_success(format!(
                    "{} was unregistered and accepts no new jobs",
                    service
                )))
            }
            None => {
                return Err(JobError::no_success(format!(
                    "{} must be registered before its jobs",
                    service
                )))
            }
        };
        entry.jobs.push(job);
        tables.jobs.insert(
            job,
            JobEntry {
                service,
                process: ProcessSupervisor::shared(description),
            },
        );
        Ok(())
    }

    /// Remove `job` from the process table, its service and any container.
    ///
    /// Returns the supervisor that was attached, if the job was known.
    pub fn remove_job(&self, job: JobKey) -> Option<SharedSupervisor> {
        let mut tables = self.tables.lock();
        let entry = tables.jobs.remove(&job)?;
        if let Some(service) = tables.services.get_mut(&entry.service) {
            service.jobs.retain(|candidate| *candidate != job);
        }
        for container in tables.containers.values_mut() {
            container.jobs.retain(|candidate| *candidate != job);
        }
        tables.forget_service_if_done(entry.service);
        Some(entry.process)
    }

    /// Owning service of `job`, found by scanning each service's job list
    pub fn service_for_job(&self, job: JobKey) -> JobResult<ServiceKey> {
        self.tables
            .lock()
            .services
            .iter()
            .find(|(_, entry)| entry.jobs.contains(&job))
            .map(|(key, _)| *key)
            .ok_or_else(|| JobError::no_success(format!("{} is not owned by any service", job)))
    }

    pub fn process_for_job(&self, job: JobKey) -> JobResult<SharedSupervisor> {
        self.tables
            .lock()
            .jobs
            .get(&job)
            .map(|entry| Arc::clone(&entry.process))
            .ok_or_else(|| JobError::no_success(format!("{} has no process record", job)))
    }

    /// Job of `service` whose process currently has OS id `pid`
    pub fn job_for_native_id(&self, service: ServiceKey, pid: u32) -> JobResult<JobKey> {
        let tables = self.tables.lock();
        let entry = tables
            .services
            .get(&service)
            .ok_or_else(|| JobError::no_success(format!("{} is not registered", service)))?;
        entry
            .jobs
            .iter()
            .find(|job| {
                tables
                    .jobs
                    .get(job)
                    .map(|record| record.process.lock().pid() == Some(pid))
                    .unwrap_or(false)
            })
            .copied()
            .ok_or_else(|| {
                JobError::no_success(format!("no job of {} has native id {}", service, pid))
            })
    }

    pub fn jobs_for_service(&self, service: ServiceKey) -> JobResult<Vec<JobKey>> {
        self.tables
            .lock()
            .services
            .get(&service)
            .map(|entry| entry.jobs.clone())
            .ok_or_else(|| JobError::no_success(format!("{} is not registered", service)))
    }

    pub fn add_container(&self, container: ContainerKey, service: ServiceKey) -> JobResult<()> {
        let mut tables = self.tables.lock();
        if tables.containers.contains_key(&container) {
            return Err(JobError::no_success(format!("{} is already registered", container)));
        }
        match tables.services.get_mut(&service) {
            Some(entry) if !entry.retired => entry.containers.push(container),
            _ => {
                return Err(JobError::no_success(format!(
                    "{} is not an active registered service",
                    service
                )))
            }
        }
        tables.containers.insert(
            container,
            ContainerEntry {
                service,
                jobs: Vec::new(),
            },
        );
        Ok(())
    }

    pub fn remove_container(&self, container: ContainerKey) -> bool {
        let mut tables = self.tables.lock();
        let Some(entry) = tables.containers.remove(&container) else {
            return false;
        };
        if let Some(service) = tables.services.get_mut(&entry.service) {
            service.containers.retain(|candidate| *candidate != container);
        }
        tables.forget_service_if_done(entry.service);
        true
    }

    /// Add `job` to `container`; adding a member twice is a no-op
    pub fn container_insert(&self, container: ContainerKey, job: JobKey) -> JobResult<()> {
        let mut tables = self.tables.lock();
        let job_service = tables
            .jobs
            .get(&job)
            .map(|entry| entry.service)
            .ok_or_else(|| JobError::does_not_exist(format!("{} is not registered", job)))?;
        let entry = tables
            .containers
            .get_mut(&container)
            .ok_or_else(|| JobError::no_success(format!("{} is not registered", container)))?;
        if entry.service != job_service {
            return Err(JobError::bad_parameter(format!(
                "{} belongs to a different service than {}",
                job, container
            )));
        }
        if !entry.jobs.contains(&job) {
            entry.jobs.push(job);
        }
        Ok(())
    }

    pub fn container_remove(&self, container: ContainerKey, job: JobKey) -> JobResult<()> {
        let mut tables = self.tables.lock();
        let entry = tables
            .containers
            .get_mut(&container)
            .ok_or_else(|| JobError::no_success(format!("{} is not registered", container)))?;
        let before = entry.jobs.len();
        entry.jobs.retain(|candidate| *candidate != job);
        if entry.jobs.len() == before {
            return Err(JobError::does_not_exist(format!(
                "{} is not a member of {}",
                job, container
            )));
        }
        Ok(())
    }

    pub fn container_jobs(&self, container: ContainerKey) -> JobResult<Vec<JobKey>> {
        self.tables
            .lock()
            .containers
            .get(&container)
            .map(|entry| entry.jobs.clone())
            .ok_or_else(|| JobError::no_success(format!("{} is not registered", container)))
    }

    pub fn snapshot(&self) -> BookkeeperSnapshot {
        let tables = self.tables.lock();
        let mut services: Vec<ServiceSnapshot> = tables
            .services
            .iter()
            .map(|(key, entry)| ServiceSnapshot {
                key: *key,
                locator: entry.locator.to_string(),
                retired: entry.retired,
                jobs: entry.jobs.clone(),
            })
            .collect();
        let mut jobs: Vec<JobSnapshot> = tables
            .jobs
            .iter()
            .map(|(key, entry)| {
                let process = entry.process.lock();
                JobSnapshot {
                    key: *key,
                    service: entry.service,
                    state: process.state(),
                    pid: process.pid(),
                }
            })
            .collect();
        let mut containers: Vec<ContainerSnapshot> = tables
            .containers
            .iter()
            .map(|(key, entry)| ContainerSnapshot {
                key: *key,
                service: entry.service,
                jobs: entry.jobs.clone(),
            })
            .collect();
        services.sort_by_key(|entry| entry.key);
        jobs.sort_by_key(|entry| entry.key);
        containers.sort_by_key(|entry| entry.key);
        BookkeeperSnapshot {
            services,
            jobs,
            containers,
        }
    }
}
