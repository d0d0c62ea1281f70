use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a job.
///
/// `New → Running → {Done, Failed, Canceled}`. `Unknown` is a fallback for
/// backends that cannot tell; no normal transition leads to it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    New,
    Running,
    Done,
    Failed,
    Canceled,
    Unknown,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed | JobState::Canceled)
    }

    /// Terminal state for a process that exited with `exit_code`
    pub fn from_exit_code(exit_code: Option<i32>) -> Self {
        match exit_code {
            Some(0) => JobState::Done,
            _ => JobState::Failed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::New => "new",
            JobState::Running => "running",
            JobState::Done => "done",
            JobState::Failed => "failed",
            JobState::Canceled => "canceled",
            JobState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!JobState::New.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(!JobState::Unknown.is_terminal());
        assert!(JobState::Done.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::Canceled.is_terminal());
    }

    #[test]
    fn test_exit_code_mapping() {
        assert_eq!(JobState::from_exit_code(Some(0)), JobState::Done);
        assert_eq!(JobState::from_exit_code(Some(1)), JobState::Failed);
        // killed by a signal: no exit code
        assert_eq!(JobState::from_exit_code(None), JobState::Failed);
    }

    #[test]
    fn test_serde_uses_snake_case() {
        assert_eq!(serde_json::to_string(&JobState::Canceled).unwrap(), "\"canceled\"");
        let state: JobState = serde_json::from_str("\"running\"").unwrap();
        assert_eq!(state, JobState::Running);
    }
}
