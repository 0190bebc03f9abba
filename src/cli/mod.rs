//! Command-line interface
//!
//! Argument parsing and command handlers for the `cachetx` binary.

pub mod args;
pub mod commands;
