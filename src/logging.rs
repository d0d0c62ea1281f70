//! Thin logging helpers over `tracing`
//!
//! Modules log through these so teardown paths can report without
//! formatting boilerplate at every call site.

use std::fmt::Display;

pub fn debug(message: impl Display) {
    tracing::debug!(target: "jobwarden", "{}", message);
}

pub fn info(message: impl Display) {
    tracing::info!(target: "jobwarden", "{}", message);
}

pub fn warn(message: impl Display) {
    tracing::warn!(target: "jobwarden", "{}", message);
}
