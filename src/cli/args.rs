//! CLI argument definitions using clap
//!
//! Commands:
//! - gridstore query --config <path> --collection <name> --predicate <sql>
//! - gridstore explain --config <path> --collection <name> --predicate <sql>
//! - gridstore check-config --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::query::Projection;

/// gridstore - query a partitioned in-memory key/value grid
#[derive(Parser, Debug)]
#[command(name = "gridstore")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Boot a grid, load data and run one query
    Query {
        /// Path to configuration file
        #[arg(long, default_value = "./gridstore.json")]
        config: PathBuf,

        /// JSON file of `{ "<collection>": { "<key>": <value> } }` to load first
        #[arg(long)]
        data: Option<PathBuf>,

        #[arg(long)]
        collection: String,

        /// SQL-like predicate, e.g. "name = 'a' AND age >= 25"
        #[arg(long)]
        predicate: String,

        /// keys, values or entries
        #[arg(long, default_value = "entries")]
        projection: Projection,
    },

    /// Print the plan a store of the collection would run
    Explain {
        /// Path to configuration file
        #[arg(long, default_value = "./gridstore.json")]
        config: PathBuf,

        #[arg(long)]
        collection: String,

        #[arg(long)]
        predicate: String,
    },

    /// Validate a configuration file and exit
    CheckConfig {
        /// Path to configuration file
        #[arg(long, default_value = "./gridstore.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
