//! CLI command implementations
//!
//! Each command boots what it needs, prints one JSON response and exits.
//! Nothing is persisted between invocations.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde_json::{json, Value};

use crate::cluster::LocalCluster;
use crate::config::GridConfig;
use crate::observability::Logger;
use crate::planner::{ExplainPlan, PlannerError};
use crate::predicate::Predicate;
use crate::query::Projection;
use crate::store::MemoryLoader;

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{write_error, write_response};

/// Main CLI entry point
///
/// Parses arguments, runs the command and prints its response. Failures
/// are printed as an error response and returned.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    match run_command(cli.command) {
        Ok(data) => write_response(data),
        Err(e) => {
            write_error(e.code_str(), e.message())?;
            Err(e)
        }
    }
}

/// Run a command, returning the `data` of its response
pub fn run_command(cmd: Command) -> CliResult<Value> {
    match cmd {
        Command::Query {
            config,
            data,
            collection,
            predicate,
            projection,
        } => query(&config, data.as_deref(), &collection, &predicate, projection),
        Command::Explain {
            config,
            collection,
            predicate,
        } => explain(&config, &collection, &predicate),
        Command::CheckConfig { config } => check_config(&config),
    }
}

/// Load the config, apply its log level and start a cluster with every collection
pub fn boot(config_path: &Path) -> CliResult<(GridConfig, LocalCluster)> {
    let config = GridConfig::load(config_path)?;
    Logger::set_min_severity(config.severity()?);

    let cluster = LocalCluster::start(config.members, config.partition_count);
    for definition in config.to_definitions() {
        cluster.create_collection(definition)?;
    }
    Ok((config, cluster))
}

/// Warm up collections from a data file
///
/// Returns the number of entries loaded per collection.
pub fn load_data(cluster: &LocalCluster, data_path: &Path) -> CliResult<BTreeMap<String, usize>> {
    let content = fs::read_to_string(data_path).map_err(|e| {
        CliError::io_error(format!("Failed to read data '{}': {}", data_path.display(), e))
    })?;
    let document: Value = serde_json::from_str(&content)
        .map_err(|e| CliError::invalid_data(format!("Invalid data JSON: {}", e)))?;
    let collections = document
        .as_object()
        .ok_or_else(|| CliError::invalid_data("data file must be a JSON object of collections"))?;

    let mut loaded = BTreeMap::new();
    for (name, entries) in collections {
        let entries = entries.as_object().ok_or_else(|| {
            CliError::invalid_data(format!("collection '{}' must map keys to values", name))
        })?;
        let count = cluster.warm_up(name, &MemoryLoader::from_json_object(entries))?;
        loaded.insert(name.clone(), count);
    }
    Ok(loaded)
}

/// Boot, load data and run one scatter-gather query
pub fn query(
    config_path: &Path,
    data_path: Option<&Path>,
    collection: &str,
    predicate: &str,
    projection: Projection,
) -> CliResult<Value> {
    let (config, cluster) = boot(config_path)?;
    if let Some(data_path) = data_path {
        load_data(&cluster, data_path)?;
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::runtime_failed(e.to_string()))?;
    let coordinator = cluster.coordinator(config.coordinator_config());
    let result = runtime.block_on(coordinator.query_sql(collection, predicate, projection))?;
    Ok(result.to_json())
}

/// Plan a predicate without running it
///
/// Malformed predicates produce a rejected plan rather than an error.
pub fn explain(config_path: &Path, collection: &str, predicate: &str) -> CliResult<Value> {
    let (_, cluster) = boot(config_path)?;
    let plan = match Predicate::parse(predicate) {
        Ok(predicate) => cluster.explain(collection, &predicate)?,
        Err(err) => {
            cluster.collection_definition(collection)?;
            ExplainPlan::from_error(&PlannerError::from(err))
        }
    };
    Ok(plan.to_json())
}

/// Validate a configuration file
pub fn check_config(config_path: &Path) -> CliResult<Value> {
    let config = GridConfig::load(config_path)?;
    let collections: Vec<Value> = config
        .collections
        .iter()
        .map(|c| {
            json!({
                "name": c.name,
                "kind": c.kind.as_str(),
                "indexes": c.indexes.len(),
            })
        })
        .collect();
    Ok(json!({
        "valid": true,
        "members": config.members,
        "partition_count": config.partition_count,
        "collections": collections,
    }))
}
