//! Paradigms CLI library
//!
//! Argument parsing, configuration loading and command dispatch for the
//! `paradigms` binary.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use cli::{Cli, Commands};
pub use commands::CommandDispatcher;
pub use config::load_configuration;
pub use error::{CliError, Result};
