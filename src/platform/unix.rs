use crate::error::JobResult;
use crate::logging::debug;
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::io;
use std::process::Command;

/// Prepare the execution environment for a child process
///
/// The child leads its own process group so a cancel reaches everything it
/// forks. Its lifetime is otherwise independent of the spawning thread.
pub fn prepare_command(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;

    unsafe {
        cmd.pre_exec(|| {
            if set_process_group() != 0 {
                return Err(io::Error::last_os_error());
            }

            Ok(())
        });
    }
}

/// Check if process is alive
///
/// An unreaped zombie still counts as alive.
pub fn process_alive(pid: u32) -> bool {
    match signal::kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        Err(errno) => errno == Errno::EPERM,
    }
}

/// Send SIGTERM to the process group led by `pid`
///
/// A group that is already gone is not an error.
pub fn terminate_group(pid: u32) -> JobResult<()> {
    match signal::killpg(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        Ok(()) => {
            debug(format!("pid={} sent SIGTERM to process group", pid));
            Ok(())
        }
        Err(Errno::ESRCH) => {
            debug(format!("pid={} process group already gone", pid));
            Ok(())
        }
        Err(errno) => Err(errno.into()),
    }
}

pub fn current_pid() -> u32 {
    std::process::id()
}

fn set_process_group() -> libc::c_int {
    unsafe { libc::setpgid(0, 0) }
}
