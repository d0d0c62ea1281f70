//! Unified error handling for jobwarden
//!
//! Every fallible operation reports one of a small set of error kinds.
//! Callers distinguish failures by [`ErrorKind`], never by message text.

use std::fmt;
use std::io;
use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for the job API
#[derive(Error, Debug)]
pub enum JobError {
    /// Malformed or unsupported input (non-localhost URL, empty executable)
    #[error("Bad parameter: {message}")]
    BadParameter {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Unresolvable scheme or unknown job identifier
    #[error("Does not exist: {message}")]
    DoesNotExist {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Operation invalid for the current lifecycle state
    #[error("Incorrect state: {message}")]
    IncorrectState { message: String },

    /// Internal-consistency failures and wrapped lower-level failures
    #[error("No success: {message}")]
    NoSuccess {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Capability not offered by a backend
    #[error("Not implemented: {verb} is not supported by the {backend} backend")]
    NotImplemented { verb: String, backend: String },

    /// Reserved for blocking operations that must report a timeout as failure
    #[error("Timeout: {message} (timeout: {timeout_ms}ms)")]
    Timeout { message: String, timeout_ms: u64 },
}

/// Error taxonomy, independent of message text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadParameter,
    DoesNotExist,
    IncorrectState,
    NoSuccess,
    NotImplemented,
    Timeout,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BadParameter => "bad_parameter",
            ErrorKind::DoesNotExist => "does_not_exist",
            ErrorKind::IncorrectState => "incorrect_state",
            ErrorKind::NoSuccess => "no_success",
            ErrorKind::NotImplemented => "not_implemented",
            ErrorKind::Timeout => "timeout",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type JobResult<T> = Result<T, JobError>;

impl JobError {
    /// Get error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            JobError::BadParameter { .. } => ErrorKind::BadParameter,
            JobError::DoesNotExist { .. } => ErrorKind::DoesNotExist,
            JobError::IncorrectState { .. } => ErrorKind::IncorrectState,
            JobError::NoSuccess { .. } => ErrorKind::NoSuccess,
            JobError::NotImplemented { .. } => ErrorKind::NotImplemented,
            JobError::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    pub fn bad_parameter(message: impl Into<String>) -> Self {
        JobError::BadParameter {
            message: message.into(),
            source: None,
        }
    }

    pub fn does_not_exist(message: impl Into<String>) -> Self {
        JobError::DoesNotExist {
            message: message.into(),
            source: None,
        }
    }

    pub fn incorrect_state(message: impl Into<String>) -> Self {
        JobError::IncorrectState {
            message: message.into(),
        }
    }

    pub fn no_success(message: impl Into<String>) -> Self {
        JobError::NoSuccess {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap a lower-level failure as `NoSuccess`, keeping it as the source
    pub fn no_success_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        JobError::NoSuccess {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn not_implemented(verb: impl Into<String>, backend: impl Into<String>) -> Self {
        JobError::NotImplemented {
            verb: verb.into(),
            backend: backend.into(),
        }
    }

    /// The uniform guard for façades that lost (or never had) their backend
    pub fn not_bound() -> Self {
        JobError::no_success("not bound to a plugin")
    }

    /// Re-wrap any error as `NoSuccess`, keeping the original as the source.
    ///
    /// Used when a job is unknown to the backend it was dispatched to: the
    /// lookup failure is a registration bug, not a caller mistake.
    pub fn into_no_success(self, context: impl Into<String>) -> Self {
        match self {
            err @ JobError::NoSuccess { .. } => err,
            other => JobError::NoSuccess {
                message: context.into(),
                source: Some(Box::new(other)),
            },
        }
    }
}

impl From<io::Error> for JobError {
    fn from(err: io::Error) -> Self {
        JobError::no_success_with_source(format!("I/O failure: {}", err), err)
    }
}

impl From<url::ParseError> for JobError {
    fn from(err: url::ParseError) -> Self {
        JobError::BadParameter {
            message: format!("invalid resource URL: {}", err),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(unix)]
impl From<nix::Error> for JobError {
    fn from(err: nix::Error) -> Self {
        JobError::no_success_with_source(format!("system call failed: {}", err), err)
    }
}
