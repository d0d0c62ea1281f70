//! Platform process helpers

#[cfg(unix)]
mod unix;

#[cfg(unix)]
pub use unix::{current_pid, prepare_command, process_alive, terminate_group};

#[cfg(not(unix))]
mod fallback {
    use crate::error::{JobError, JobResult};
    use std::process::Command;

    pub fn prepare_command(_cmd: &mut Command) {}

    pub fn process_alive(_pid: u32) -> bool {
        false
    }

    pub fn terminate_group(pid: u32) -> JobResult<()> {
        Err(JobError::no_success(format!(
            "cannot signal pid {} on this platform",
            pid
        )))
    }

    pub fn current_pid() -> u32 {
        std::process::id()
    }
}

#[cfg(not(unix))]
pub use fallback::{current_pid, prepare_command, process_alive, terminate_group};
