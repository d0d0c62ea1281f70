//! Handlers for the `run` and `backends` commands

use super::parser::{parse_env_pairs, parse_timeout};
use crate::description::JobDescription;
use crate::error::{JobError, JobResult};
use crate::job_state::JobState;
use crate::runtime::Runtime;
use crate::service::Service;
use crate::wait::WaitTimeout;
use serde::Serialize;

/// Process exit code used when the wait ran out and the job was canceled
pub const TIMED_OUT_EXIT_CODE: u8 = 124;

/// What the `run` command observed about its job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub job_id: String,
    pub state: JobState,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

impl RunReport {
    /// Exit code for the `jobwarden` process itself
    pub fn process_exit_code(&self) -> u8 {
        if self.timed_out {
            return TIMED_OUT_EXIT_CODE;
        }
        match (self.state, self.exit_code) {
            (JobState::Done, _) => 0,
            (_, Some(code)) if (1..=255).contains(&code) => code as u8,
            _ => 1,
        }
    }

    pub fn print(&self) {
        println!("job_id: {}", self.job_id);
        println!("state: {}", self.state);
        match self.exit_code {
            Some(code) => println!("exit_code: {}", code),
            None => println!("exit_code: unknown"),
        }
        if self.timed_out {
            println!("timed out; job was canceled");
        }
    }
}

/// Submit `command` through the service at `url` and wait for it.
///
/// When a bounded wait runs out the job is canceled and reaped before returning.
pub fn run_job(
    runtime: &Runtime,
    url: &str,
    env_vars: &[String],
    timeout: f64,
    command: &[String],
) -> JobResult<RunReport> {
    let timeout = parse_timeout(timeout)?;
    let (executable, arguments) = command
        .split_first()
        .ok_or_else(|| JobError::bad_parameter("no command given"))?;

    let mut description = JobDescription::new(executable.as_str()).args(arguments.iter().cloned());
    for (key, value) in parse_env_pairs(env_vars)? {
        description = description.env(key, value);
    }
    description.ensure_runnable()?;

    let service = Service::new(runtime, url)?;
    let job = service.create_job(description)?;
    job.run()?;
    let job_id = job.job_id()?;

    let mut state = job.wait(timeout)?;
    let timed_out = !state.is_terminal();
    if timed_out {
        job.cancel(WaitTimeout::POLL)?;
        state = job.wait(WaitTimeout::Forever)?;
    }

    Ok(RunReport {
        job_id,
        state,
        exit_code: job.exit_code()?,
        timed_out,
    })
}

/// Print loaded backends and the diagnostics recorded while loading them
pub fn list_backends(runtime: &Runtime, json: bool) -> anyhow::Result<()> {
    if json {
        let report = serde_json::json!({
            "backends": runtime.backend_infos(),
            "diagnostics": runtime.diagnostics(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for info in runtime.backend_infos() {
        println!("{}: {}", info.name, info.schemes.join(", "));
    }
    for diagnostic in runtime.diagnostics() {
        println!("warning: {}", diagnostic);
    }
    Ok(())
}
