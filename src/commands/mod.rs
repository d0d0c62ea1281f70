//! Command-line interface parsing and command handlers

pub mod parser;
pub mod run;

pub use parser::*;
