use crate::error::{JobError, JobResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What to run: executable, ordered arguments and extra environment.
///
/// A pure value. Backends copy what they need at registration time, so
/// later edits to a description never reach an already registered job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescription {
    pub executable: String,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

impl JobDescription {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, argument: impl Into<String>) -> Self {
        self.arguments.push(argument.into());
        self
    }

    pub fn args<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(arguments.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(name.into(), value.into());
        self
    }

    /// A description can be registered at any time but only run with an executable
    pub fn ensure_runnable(&self) -> JobResult<()> {
        if self.executable.trim().is_empty() {
            return Err(JobError::bad_parameter("job description has an empty executable"));
        }
        Ok(())
    }
}
