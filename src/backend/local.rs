//! Local process backend
//!
//! Runs jobs as child processes of the host. Accepts only services whose
//! locator host is exactly `localhost`.

use super::{format_job_id, parse_job_id, Backend, BackendFactory, JobTimes, WaitMode};
use crate::bookkeeper::Bookkeeper;
use crate::config::{RuntimeConfig, LOCALHOST, LOCAL_SCHEMES};
use crate::description::JobDescription;
use crate::error::{JobError, JobResult};
use crate::job_state::JobState;
use crate::keys::{ContainerKey, JobKey, ServiceKey};
use crate::locator::ResourceLocator;
use crate::logging::{debug, warn};
use crate::supervisor::{wait_shared, SharedSupervisor};
use crate::wait::{poll_until, PollSettings, SystemClock, WaitTimeout};
use std::sync::Arc;

#[derive(Debug, Default, Clone, Copy)]
pub struct LocalBackendFactory;

impl BackendFactory for LocalBackendFactory {
    fn name(&self) -> &'static str {
        "local"
    }

    fn declared_schemes(&self) -> &'static [&'static str] {
        LOCAL_SCHEMES
    }

    fn sanity_check(&self) -> bool {
        cfg!(unix)
    }

    fn create(&self, config: &RuntimeConfig) -> Arc<dyn Backend> {
        Arc::new(LocalBackend::with_config(config))
    }
}

#[derive(Debug)]
pub struct LocalBackend {
    bookkeeper: Bookkeeper,
    poll: PollSettings,
}

impl LocalBackend {
    pub fn new(poll: PollSettings) -> Self {
        Self {
            bookkeeper: Bookkeeper::new(),
            poll,
        }
    }

    pub fn with_config(config: &RuntimeConfig) -> Self {
        Self::new(PollSettings::new(config.poll_interval(), Arc::new(SystemClock)))
    }

    pub fn bookkeeper(&self) -> &Bookkeeper {
        &self.bookkeeper
    }

    fn process(&self, job: JobKey) -> JobResult<SharedSupervisor> {
        self.bookkeeper
            .process_for_job(job)
            .map_err(|err| err.into_no_success(format!("{} is not known to the local backend", job)))
    }

    fn container_members(&self, container: ContainerKey) -> JobResult<Vec<(JobKey, SharedSupervisor)>> {
        // members unregistered since the listing are skipped
        Ok(self
            .bookkeeper
            .container_jobs(container)?
            .into_iter()
            .filter_map(|job| {
                self.bookkeeper
                    .process_for_job(job)
                    .ok()
                    .map(|process| (job, process))
            })
            .collect())
    }
}

impl Backend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn register_service(&self, service: ServiceKey, locator: &ResourceLocator) -> JobResult<()> {
        if locator.host() != LOCALHOST {
            return Err(JobError::bad_parameter(format!(
                "the local backend only accepts '{}' as host, got '{}' in {}",
                LOCALHOST,
                locator.host(),
                locator
            )));
        }
        self.bookkeeper.add_service(service, locator.clone())?;
        debug(format!("{} registered for {}", service, locator));
        Ok(())
    }

    fn unregister_service(&self, service: ServiceKey) {
        if !self.bookkeeper.remove_service(service) {
            debug(format!("{} was not registered; nothing to release", service));
        }
    }

    fn register_job(
        &self,
        job: JobKey,
        service: ServiceKey,
        description: &JobDescription,
    ) -> JobResult<()> {
        self.bookkeeper.add_job(job, service, description)?;
        debug(format!("{} registered under {} for '{}'", job, service, description.executable));
        Ok(())
    }

    fn unregister_job(&self, job: JobKey) {
        match self.bookkeeper.remove_job(job) {
            Some(process) => {
                let process = process.lock();
                if process.state() == JobState::Running {
                    warn(format!(
                        "{} released while pid={:?} may still be running",
                        job,
                        process.pid()
                    ));
                }
            }
            None => debug(format!("{} was not registered; nothing to release", job)),
        }
    }

    fn register_container(&self, container: ContainerKey, service: ServiceKey) -> JobResult<()> {
        self.bookkeeper.add_container(container, service)
    }

    fn unregister_container(&self, container: ContainerKey) {
        if !self.bookkeeper.remove_container(container) {
            debug(format!("{} was not registered; nothing to release", container));
        }
    }

    fn run(&self, job: JobKey) -> JobResult<()> {
        let process = self.process(job)?;
        let pid = process.lock().start()?;
        debug(format!("{} running as pid={}", job, pid));
        Ok(())
    }

    /// The timeout is advisory: the signal is sent and the state flips at once.
    fn cancel(&self, job: JobKey, timeout: WaitTimeout) -> JobResult<()> {
        let process = self.process(job)?;
        process.lock().terminate()?;
        debug(format!("{} canceled (advisory timeout {})", job, timeout));
        Ok(())
    }

    fn wait(&self, job: JobKey, timeout: WaitTimeout) -> JobResult<JobState> {
        let process = self.process(job)?;
        wait_shared(&process, &self.poll, timeout)
    }

    fn get_state(&self, job: JobKey) -> JobResult<JobState> {
        let process = self.process(job)?;
        let state = process.lock().poll()?;
        Ok(state)
    }

    fn get_job_id(&self, job: JobKey) -> JobResult<String> {
        let pid = self.get_native_id(job)?;
        let service = self.bookkeeper.service_for_job(job)?;
        let locator = self.bookkeeper.locator_for_service(service)?;
        Ok(format_job_id(&locator, pid))
    }

    fn get_native_id(&self, job: JobKey) -> JobResult<u32> {
        let process = self.process(job)?;
        let pid = process.lock().pid();
        pid.ok_or_else(|| JobError::no_success(format!("{} has not been run yet", job)))
    }

    fn get_exit_code(&self, job: JobKey) -> JobResult<Option<i32>> {
        let process = self.process(job)?;
        let mut process = process.lock();
        let state = process.poll()?;
        if !state.is_terminal() {
            return Err(JobError::incorrect_state(format!(
                "{} has no exit code in state {}",
                job, state
            )));
        }
        Ok(process.exit_code())
    }

    fn get_times(&self, job: JobKey) -> JobResult<JobTimes> {
        let process = self.process(job)?;
        let process = process.lock();
        Ok(JobTimes {
            started_at: process.started_at(),
            finished_at: process.finished_at(),
        })
    }

    fn list_jobs(&self, service: ServiceKey) -> JobResult<Vec<String>> {
        let locator = self.bookkeeper.locator_for_service(service)?;
        let mut ids = Vec::new();
        for job in self.bookkeeper.jobs_for_service(service)? {
            let Ok(process) = self.bookkeeper.process_for_job(job) else {
                continue;
            };
            if let Some(pid) = process.lock().pid() {
                ids.push(format_job_id(&locator, pid));
            };
        }
        Ok(ids)
    }

    fn find_job(&self, service: ServiceKey, job_id: &str) -> JobResult<JobKey> {
        let (url, native) = parse_job_id(job_id)?;
        let locator = self.bookkeeper.locator_for_service(service)?;
        if url != locator.as_str() {
            return Err(JobError::does_not_exist(format!(
                "job {} does not belong to {}",
                job_id, locator
            )));
        }
        let pid: u32 = native.parse().map_err(|_| {
            JobError::does_not_exist(format!("job {} has no local process id", job_id))
        })?;
        self.bookkeeper
            .job_for_native_id(service, pid)
            .map_err(|_| JobError::does_not_exist(format!("no job with id {}", job_id)))
    }

    fn container_add(&self, container: ContainerKey, job: JobKey) -> JobResult<()> {
        self.bookkeeper.container_insert(container, job)
    }

    fn container_remove(&self, container: ContainerKey, job: JobKey) -> JobResult<()> {
        self.bookkeeper.container_remove(container, job)
    }

    fn container_list(&self, container: ContainerKey) -> JobResult<Vec<JobKey>> {
        self.bookkeeper.container_jobs(container)
    }

    /// Starts every member; the first failure is returned after all were tried
    fn container_run(&self, container: ContainerKey) -> JobResult<()> {
        let mut first_error = None;
        for (job, process) in self.container_members(container)? {
            if let Err(err) = process.lock().start() {
                warn(format!("{} in {} failed to start: {}", job, container, err));
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Cancels the members that are running; others are left alone
    fn container_cancel(&self, container: ContainerKey, timeout: WaitTimeout) -> JobResult<()> {
        let mut first_error = None;
        for (job, process) in self.container_members(container)? {
            let mut process = process.lock();
            if process.poll()? != JobState::Running {
                continue;
            }
            if let Err(err) = process.terminate() {
                warn(format!("{} in {} failed to cancel: {}", job, container, err));
                first_error.get_or_insert(err);
            }
        }
        debug(format!("{} canceled (advisory timeout {})", container, timeout));
        first_error.map_or(Ok(()), Err)
    }

    /// A member with no live child counts as settled, as in a single-job
    /// wait, so a never-run member ends an `All` wait instead of blocking it.
    /// Only members in a terminal state are returned.
    fn container_wait(
        &self,
        container: ContainerKey,
        timeout: WaitTimeout,
        mode: WaitMode,
    ) -> JobResult<Vec<JobKey>> {
        let members = self.container_members(container)?;
        let settle = |members: &[(JobKey, SharedSupervisor)]| -> JobResult<(usize, Vec<JobKey>)> {
            let mut settled = 0;
            let mut terminal = Vec::new();
            for (job, process) in members {
                let mut process = process.lock();
                if process.reap()? {
                    settled += 1;
                    if process.state().is_terminal() {
                        terminal.push(*job);
                    }
                }
            }
            Ok((settled, terminal))
        };

        poll_until(&self.poll, timeout, || {
            let (settled, terminal) = settle(members.as_slice())?;
            Ok(match mode {
                WaitMode::All => settled == members.len(),
                WaitMode::Any => !terminal.is_empty() || settled == members.len(),
            })
        })?;
        settle(members.as_slice()).map(|(_, terminal)| terminal)
    }

    fn container_states(&self, container: ContainerKey) -> JobResult<Vec<(JobKey, JobState)>> {
        self.container_members(container)?
            .into_iter()
            .map(|(job, process)| {
                let state = process.lock().poll()?;
                Ok((job, state))
            })
            .collect()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::time::Duration;

    fn backend() -> LocalBackend {
        LocalBackend::new(PollSettings::new(Duration::from_millis(10), Arc::new(SystemClock)))
    }

    fn registered(backend: &LocalBackend, description: JobDescription) -> (ServiceKey, JobKey) {
        let service = ServiceKey::new();
        backend
            .register_service(service, &ResourceLocator::parse("fork://localhost").unwrap())
            .unwrap();
        let job = JobKey::new();
        backend.register_job(job, service, &description).unwrap();
        (service, job)
    }

    #[test]
    fn test_rejects_remote_host_without_entry() {
        let backend = backend();
        let service = ServiceKey::new();
        let err = backend
            .register_service(service, &ResourceLocator::parse("fork://remotehost").unwrap())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadParameter);
        assert!(!backend.bookkeeper().has_service(service));
    }

    #[test]
    fn test_unknown_job_is_no_success() {
        let backend = backend();
        let job = JobKey::new();
        assert_eq!(backend.run(job).unwrap_err().kind(), ErrorKind::NoSuccess);
        assert_eq!(backend.get_state(job).unwrap_err().kind(), ErrorKind::NoSuccess);
        assert_eq!(
            backend.wait(job, WaitTimeout::POLL).unwrap_err().kind(),
            ErrorKind::NoSuccess
        );
    }

    #[test]
    fn test_job_id_requires_run() {
        let backend = backend();
        let (_, job) = registered(&backend, JobDescription::new("/bin/true"));
        assert_eq!(backend.get_job_id(job).unwrap_err().kind(), ErrorKind::NoSuccess);

        backend.run(job).unwrap();
        let pid = backend.get_native_id(job).unwrap();
        assert_eq!(backend.get_job_id(job).unwrap(), format!("[fork://localhost]-[{}]", pid));
        backend.wait(job, WaitTimeout::Forever).unwrap();
    }

    #[test]
    fn test_exit_code_before_terminal_is_incorrect_state() {
        let backend = backend();
        let (_, job) = registered(&backend, JobDescription::new("/bin/true"));
        assert_eq!(
            backend.get_exit_code(job).unwrap_err().kind(),
            ErrorKind::IncorrectState
        );
    }

    #[test]
    fn test_find_job_round_trip_and_unknown() {
        let backend = backend();
        let (service, job) = registered(&backend, JobDescription::new("/bin/true"));
        backend.run(job).unwrap();
        let id = backend.get_job_id(job).unwrap();

        assert_eq!(backend.find_job(service, &id).unwrap(), job);
        assert_eq!(backend.list_jobs(service).unwrap(), vec![id]);
        assert_eq!(
            backend
                .find_job(service, "[fork://localhost]-[999999999]")
                .unwrap_err()
                .kind(),
            ErrorKind::DoesNotExist
        );
        assert_eq!(
            backend
                .find_job(service, "[fork://elsewhere]-[1]")
                .unwrap_err()
                .kind(),
            ErrorKind::DoesNotExist
        );
        backend.wait(job, WaitTimeout::Forever).unwrap();
    }

    #[test]
    fn test_container_fan_out() {
        let backend = backend();
        let (service, ok) = registered(&backend, JobDescription::new("/bin/true"));
        let failing = JobKey::new();
        backend
            .register_job(failing, service, &JobDescription::new("/bin/false"))
            .unwrap();
        let container = ContainerKey::new();
        backend.register_container(container, service).unwrap();
        backend.container_add(container, ok).unwrap();
        backend.container_add(container, failing).unwrap();

        backend.container_run(container).unwrap();
        let done = backend
            .container_wait(container, WaitTimeout::Forever, WaitMode::All)
            .unwrap();
        assert_eq!(done.len(), 2);

        let states = backend.container_states(container).unwrap();
        assert!(states.contains(&(ok, JobState::Done)));
        assert!(states.contains(&(failing, JobState::Failed)));
    }

    #[test]
    fn test_container_wait_any_returns_first_finisher() {
        let backend = backend();
        let (service, quick) = registered(&backend, JobDescription::new("/bin/true"));
        let slow = JobKey::new();
        backend
            .register_job(slow, service, &JobDescription::new("/bin/sleep").arg("30"))
            .unwrap();
        let container = ContainerKey::new();
        backend.register_container(container, service).unwrap();
        backend.container_add(container, quick).unwrap();
        backend.container_add(container, slow).unwrap();

        backend.container_run(container).unwrap();
        let done = backend
            .container_wait(container, WaitTimeout::After(Duration::from_secs(10)), WaitMode::Any)
            .unwrap();
        assert_eq!(done, vec![quick]);

        backend.container_cancel(container, WaitTimeout::POLL).unwrap();
        assert_eq!(backend.get_state(slow).unwrap(), JobState::Canceled);
        backend.wait(slow, WaitTimeout::Forever).unwrap();
    }

    #[test]
    fn test_container_wait_all_settles_with_never_run_member() {
        let backend = backend();
        let (service, ran) = registered(&backend, JobDescription::new("/bin/true"));
        let never = JobKey::new();
        backend
            .register_job(never, service, &JobDescription::new("/bin/true"))
            .unwrap();
        let container = ContainerKey::new();
        backend.register_container(container, service).unwrap();
        backend.container_add(container, ran).unwrap();
        backend.container_add(container, never).unwrap();

        backend.run(ran).unwrap();
        let started = std::time::Instant::now();
        let done = backend
            .container_wait(container, WaitTimeout::Forever, WaitMode::All)
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(done, vec![ran]);
        assert_eq!(backend.get_state(never).unwrap(), JobState::New);
    }

    #[test]
    fn test_concurrent_registration_and_verbs_stay_consistent() {
        let backend = backend();
        let shared = ServiceKey::new();
        backend
            .register_service(shared, &ResourceLocator::parse("fork://localhost").unwrap())
            .unwrap();

        let snapshot_is_consistent = |backend: &LocalBackend| {
            let snapshot = backend.bookkeeper().snapshot();
            for service in &snapshot.services {
                let mut listed = service.jobs.clone();
                listed.sort();
                let mut recorded: Vec<JobKey> = snapshot
                    .jobs
                    .iter()
                    .filter(|job| job.service == service.key)
                    .map(|job| job.key)
                    .collect();
                recorded.sort();
                assert_eq!(listed, recorded);
            }
        };

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    let own = ServiceKey::new();
                    backend
                        .register_service(own, &ResourceLocator::parse("local://localhost").unwrap())
                        .unwrap();
                    for round in 0..4 {
                        let service = if round % 2 == 0 { shared } else { own };
                        let job = JobKey::new();
                        backend
                            .register_job(job, service, &JobDescription::new("/bin/true"))
                            .unwrap();
                        backend.run(job).unwrap();
                        backend.get_state(job).unwrap();
                        assert_eq!(backend.wait(job, WaitTimeout::Forever).unwrap(), JobState::Done);
                        backend.unregister_job(job);
                        assert_eq!(backend.get_state(job).unwrap_err().kind(), ErrorKind::NoSuccess);
                    }
                    backend.unregister_service(own);
                });
            }
            scope.spawn(|| {
                for _ in 0..50 {
                    snapshot_is_consistent(&backend);
                    backend.list_jobs(shared).unwrap();
                    std::thread::sleep(Duration::from_millis(2));
                }
            });
        });

        snapshot_is_consistent(&backend);
        let snapshot = backend.bookkeeper().snapshot();
        assert!(snapshot.jobs.is_empty());
        assert_eq!(snapshot.services.len(), 1);
        assert!(snapshot.services[0].jobs.is_empty());
    }
}
