//! Wait timeouts and the clock used by polling waits
//!
//! Bounded waits are a busy-poll: check the process, sleep one interval,
//! repeat until it exits or the deadline passes. The clock is injectable so
//! tests can drive time without sleeping.

use crate::error::{JobError, JobResult};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long a `wait` may block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitTimeout {
    /// Block until the process terminates (`-1`)
    Forever,
    /// Poll until the process terminates or this much time has elapsed; zero is a single poll
    After(Duration),
}

impl WaitTimeout {
    pub const POLL: WaitTimeout = WaitTimeout::After(Duration::ZERO);

    /// Convert seconds in the classic convention: `-1` blocks forever, `>= 0` bounds the wait
    pub fn from_secs_f64(seconds: f64) -> JobResult<Self> {
        if seconds == -1.0 {
            return Ok(WaitTimeout::Forever);
        }
        if seconds.is_nan() || seconds < 0.0 || !seconds.is_finite() {
            return Err(JobError::bad_parameter(format!(
                "invalid timeout {}: use -1 to wait forever or a non-negative number of seconds",
                seconds
            )));
        }
        Duration::try_from_secs_f64(seconds)
            .map(WaitTimeout::After)
            .map_err(|err| {
                JobError::bad_parameter(format!("invalid timeout {}: {}", seconds, err))
            })
    }

    pub fn as_secs_f64(&self) -> f64 {
        match self {
            WaitTimeout::Forever => -1.0,
            WaitTimeout::After(duration) => duration.as_secs_f64(),
        }
    }
}

impl fmt::Display for WaitTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitTimeout::Forever => f.write_str("forever"),
            WaitTimeout::After(duration) => write!(f, "{:?}", duration),
        }
    }
}

/// Monotonic time source for polling waits
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// A clock that only advances when slept on; sleeping is instantaneous.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
    sleeps: Arc<Mutex<u32>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
            sleeps: Arc::new(Mutex::new(0)),
        }
    }

    pub fn advance(&self, duration: Duration) {
        *self.now.lock() += duration;
    }

    /// Number of `sleep` calls seen so far
    pub fn sleeps(&self) -> u32 {
        *self.sleeps.lock()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }

    fn sleep(&self, duration: Duration) {
        *self.sleeps.lock() += 1;
        self.advance(duration);
    }
}

/// Poll interval plus the clock that measures it
#[derive(Debug, Clone)]
pub struct PollSettings {
    pub interval: Duration,
    pub clock: Arc<dyn Clock>,
}

impl PollSettings {
    pub fn new(interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { interval, clock }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: crate::config::DEFAULT_POLL_INTERVAL,
            clock: Arc::new(SystemClock),
        }
    }
}

/// Poll `check` until it reports completion or `timeout` elapses.
///
/// Returns whether `check` completed. `check` runs at least once, and the
/// sleep before each retry never overshoots the deadline by more than one
/// interval.
pub fn poll_until<F>(settings: &PollSettings, timeout: WaitTimeout, mut check: F) -> JobResult<bool>
where
    F: FnMut() -> JobResult<bool>,
{
    let started = settings.clock.now();
    loop {
        if check()? {
            return Ok(true);
        }
        if let WaitTimeout::After(limit) = timeout {
            if settings.clock.now().duration_since(started) >= limit {
                return Ok(false);
            }
        }
        settings.clock.sleep(settings.interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn manual(interval_ms: u64) -> (ManualClock, PollSettings) {
        let clock = ManualClock::new();
        let settings = PollSettings::new(Duration::from_millis(interval_ms), Arc::new(clock.clone()));
        (clock, settings)
    }

    #[test]
    fn test_from_secs_conventions() {
        assert_eq!(WaitTimeout::from_secs_f64(-1.0).unwrap(), WaitTimeout::Forever);
        assert_eq!(WaitTimeout::from_secs_f64(0.0).unwrap(), WaitTimeout::POLL);
        assert_eq!(
            WaitTimeout::from_secs_f64(1.5).unwrap(),
            WaitTimeout::After(Duration::from_millis(1500))
        );
        assert_eq!(
            WaitTimeout::from_secs_f64(-2.0).unwrap_err().kind(),
            ErrorKind::BadParameter
        );
        assert_eq!(
            WaitTimeout::from_secs_f64(f64::NAN).unwrap_err().kind(),
            ErrorKind::BadParameter
        );
        assert_eq!(
            WaitTimeout::from_secs_f64(1e30).unwrap_err().kind(),
            ErrorKind::BadParameter
        );
    }

    #[test]
    fn test_zero_timeout_polls_once() {
        let (clock, settings) = manual(100);
        let mut calls = 0;
        let done = poll_until(&settings, WaitTimeout::POLL, || {
            calls += 1;
            Ok(false)
        })
        .unwrap();

        assert!(!done);
        assert_eq!(calls, 1);
        assert_eq!(clock.sleeps(), 0);
    }

    #[test]
    fn test_bounded_wait_gives_up_after_deadline() {
        let (clock, settings) = manual(100);
        let done = poll_until(&settings, WaitTimeout::After(Duration::from_millis(350)), || Ok(false))
            .unwrap();

        assert!(!done);
        // 0, 100, 200, 300 are below the limit; 400 is past it
        assert_eq!(clock.sleeps(), 4);
    }

    #[test]
    fn test_forever_stops_when_check_completes() {
        let (clock, settings) = manual(100);
        let mut remaining = 5;
        let done = poll_until(&settings, WaitTimeout::Forever, || {
            remaining -= 1;
            Ok(remaining == 0)
        })
        .unwrap();

        assert!(done);
        assert_eq!(clock.sleeps(), 4);
    }

    #[test]
    fn test_check_error_propagates() {
        let (_clock, settings) = manual(100);
        let err = poll_until(&settings, WaitTimeout::Forever, || {
            Err(JobError::no_success("poll failed"))
        })
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoSuccess);
    }
}
