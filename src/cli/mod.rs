//! CLI module for gridstore
//!
//! Provides command-line interface for:
//! - query: boot a grid from config, load data, run one query
//! - explain: show the plan for a predicate
//! - check-config: validate a configuration file

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{boot, check_config, explain, load_data, query, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};
