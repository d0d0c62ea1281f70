#![cfg(unix)]

use jobwarden::backend::LocalBackendFactory;
use jobwarden::{JobDescription, JobState, Runtime, RuntimeConfig, Service, WaitTimeout};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const INTERVAL: Duration = Duration::from_millis(20);

fn runtime() -> Runtime {
    Runtime::builder()
        .config(RuntimeConfig::default().with_poll_interval(INTERVAL))
        .factory(LocalBackendFactory)
        .build()
}

#[test]
fn poll_returns_without_blocking() {
    let runtime = runtime();
    let service = Service::new(&runtime, "fork://localhost").unwrap();
    let job = service
        .create_job(JobDescription::new("/bin/sleep").arg("30"))
        .unwrap();
    job.run().unwrap();

    let started = Instant::now();
    assert_eq!(job.wait(WaitTimeout::POLL).unwrap(), JobState::Running);
    assert!(started.elapsed() < Duration::from_secs(1));

    job.cancel(WaitTimeout::POLL).unwrap();
    job.wait(WaitTimeout::Forever).unwrap();
}

#[test]
fn bounded_wait_gives_up_after_timeout() {
    let runtime = runtime();
    let service = Service::new(&runtime, "fork://localhost").unwrap();
    let job = service
        .create_job(JobDescription::new("/bin/sleep").arg("30"))
        .unwrap();
    job.run().unwrap();

    let timeout = Duration::from_millis(200);
    let started = Instant::now();
    let state = job.wait(WaitTimeout::After(timeout)).unwrap();
    let elapsed = started.elapsed();

    assert_eq!(state, JobState::Running);
    assert!(elapsed >= timeout);
    assert!(elapsed < timeout + Duration::from_secs(2));

    job.cancel(WaitTimeout::POLL).unwrap();
    job.wait(WaitTimeout::Forever).unwrap();
}

#[test]
fn bounded_wait_returns_early_when_job_exits() {
    let runtime = runtime();
    let service = Service::new(&runtime, "fork://localhost").unwrap();
    let job = service.create_job(JobDescription::new("/bin/true")).unwrap();
    job.run().unwrap();

    let started = Instant::now();
    let state = job.wait(WaitTimeout::After(Duration::from_secs(20))).unwrap();
    assert_eq!(state, JobState::Done);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn wait_on_never_run_job_returns_new() {
    let runtime = runtime();
    let service = Service::new(&runtime, "fork://localhost").unwrap();
    let job = service.create_job(JobDescription::new("/bin/true")).unwrap();
    assert_eq!(job.wait(WaitTimeout::Forever).unwrap(), JobState::New);
}

#[test]
fn cancel_from_another_thread_ends_forever_wait() {
    let runtime = runtime();
    let service = Service::new(&runtime, "fork://localhost").unwrap();
    let job = Arc::new(
        service
            .create_job(JobDescription::new("/bin/sleep").arg("30"))
            .unwrap(),
    );
    job.run().unwrap();

    let canceler = {
        let job = Arc::clone(&job);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            job.cancel(WaitTimeout::POLL).unwrap();
        })
    };

    let started = Instant::now();
    assert_eq!(job.wait(WaitTimeout::Forever).unwrap(), JobState::Canceled);
    assert!(started.elapsed() < Duration::from_secs(10));
    canceler.join().unwrap();
}
