//! Jobwarden Library
//!
//! Pluggable job execution: a process-wide runtime routes each service URL
//! to a backend plugin by scheme, and services create jobs and containers
//! that forward every verb to that backend.

pub mod backend;
pub mod bookkeeper;
pub mod commands;
pub mod config;
pub mod container;
pub mod description;
pub mod error;
pub mod job;
pub mod job_state;
pub mod keys;
pub mod locator;
pub mod logging;
pub mod platform;
pub mod runtime;
pub mod service;
pub mod supervisor;
pub mod utils;
pub mod wait;

// Re-export commonly used types for convenience
pub use backend::{Backend, BackendFactory, JobTimes, WaitMode};
pub use config::RuntimeConfig;
pub use container::Container;
pub use description::JobDescription;
pub use error::{ErrorKind, JobError, JobResult};
pub use job::Job;
pub use job_state::JobState;
pub use keys::{ContainerKey, JobKey, ServiceKey};
pub use locator::ResourceLocator;
pub use runtime::{BackendInfo, Diagnostic, Runtime};
pub use service::Service;
pub use wait::WaitTimeout;
