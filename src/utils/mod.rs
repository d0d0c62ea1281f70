//! Utilities shared by the binary and tests

pub mod logger;
