//! GridConfig file format

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cluster::{CollectionDefinition, DEFAULT_PARTITION_COUNT};
use crate::index::IndexDefinition;
use crate::observability::{log_event, Event, Severity};
use crate::query::{CollectionKind, CoordinatorConfig};
use crate::value::AttributeType;

use super::errors::{ConfigError, ConfigResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexConfig {
    pub attribute: String,
    /// Ordered indexes answer range predicates as well as equality
    #[serde(default)]
    pub ordered: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionConfig {
    pub name: String,
    #[serde(default = "default_kind")]
    pub kind: CollectionKind,
    #[serde(default)]
    pub ttl_seconds: Option<u64>,
    #[serde(default)]
    pub max_idle_seconds: Option<u64>,
    #[serde(default)]
    pub indexes: Vec<IndexConfig>,
    /// Declared attribute types; values are read as free-form JSON without one
    #[serde(default)]
    pub attributes: Option<BTreeMap<String, AttributeType>>,
}

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridConfig {
    #[serde(default = "default_members")]
    pub members: usize,

    #[serde(default = "default_partition_count")]
    pub partition_count: u32,

    /// Whole-query deadline
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,

    /// Deadline of one sub-query attempt
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    #[serde(default = "default_true")]
    pub retry_failed_stores: bool,

    /// trace, info, warn, error or fatal
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub collections: Vec<CollectionConfig>,
}

fn default_kind() -> CollectionKind {
    CollectionKind::Partitioned
}
fn default_members() -> usize {
    1
}
fn default_partition_count() -> u32 {
    DEFAULT_PARTITION_COUNT
}
fn default_query_timeout_ms() -> u64 {
    5000
}
fn default_store_timeout_ms() -> u64 {
    1000
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            members: default_members(),
            partition_count: default_partition_count(),
            query_timeout_ms: default_query_timeout_ms(),
            store_timeout_ms: default_store_timeout_ms(),
            retry_failed_stores: true,
            log_level: default_log_level(),
            collections: Vec::new(),
        }
    }
}

impl GridConfig {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let display = path.display().to_string();
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::read_failed(&display, e))?;
        let config = Self::from_json(&content)?;

        let collections = config.collections.len().to_string();
        log_event(
            Event::ConfigLoaded,
            &[("collections", collections.as_str()), ("path", display.as_str())],
        );
        Ok(config)
    }

    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: GridConfig =
            serde_json::from_str(content).map_err(ConfigError::invalid_json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.members == 0 {
            return Err(ConfigError::invalid_value("members must be >= 1"));
        }
        if self.partition_count == 0 {
            return Err(ConfigError::invalid_value("partition_count must be >= 1"));
        }
        if self.query_timeout_ms == 0 || self.store_timeout_ms == 0 {
            return Err(ConfigError::invalid_value("timeouts must be > 0"));
        }
        if self.store_timeout_ms > self.query_timeout_ms {
            return Err(ConfigError::invalid_value(format!(
                "store_timeout_ms ({}) must not exceed query_timeout_ms ({})",
                self.store_timeout_ms, self.query_timeout_ms
            )));
        }
        self.severity()?;

        let mut names = BTreeMap::new();
        for collection in &self.collections {
            if names.insert(collection.name.as_str(), ()).is_some() {
                return Err(ConfigError::invalid_value(format!(
                    "collection '{}' declared twice",
                    collection.name
                )));
            }
            if collection.ttl_seconds == Some(0) || collection.max_idle_seconds == Some(0) {
                return Err(ConfigError::invalid_value(format!(
                    "collection '{}': expiry seconds must be > 0",
                    collection.name
                )));
            }
            collection
                .to_definition()
                .validate()
                .map_err(|e| ConfigError::invalid_value(e.message()))?;
        }
        Ok(())
    }

    /// Minimum log severity
    pub fn severity(&self) -> ConfigResult<Severity> {
        Severity::parse(&self.log_level).ok_or_else(|| {
            ConfigError::invalid_value(format!("Invalid log_level: '{}'", self.log_level))
        })
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            query_timeout: Duration::from_millis(self.query_timeout_ms),
            store_timeout: Duration::from_millis(self.store_timeout_ms),
            retry_failed_stores: self.retry_failed_stores,
        }
    }

    pub fn to_definitions(&self) -> Vec<CollectionDefinition> {
        self.collections.iter().map(CollectionConfig::to_definition).collect()
    }

    pub fn collection(&self, name: &str) -> Option<&CollectionConfig> {
        self.collections.iter().find(|c| c.name == name)
    }
}

impl CollectionConfig {
    pub fn to_definition(&self) -> CollectionDefinition {
        let mut definition = CollectionDefinition::new(self.name.clone(), self.kind);
        if let Some(ttl) = self.ttl_seconds {
            definition = definition.with_ttl(Duration::from_secs(ttl));
        }
        if let Some(idle) = self.max_idle_seconds {
            definition = definition.with_max_idle(Duration::from_secs(idle));
        }
        definition.indexes = self
            .indexes
            .iter()
            .map(|i| IndexDefinition::new(i.attribute.clone(), i.ordered))
            .collect();
        definition.schema = self.attributes.clone();
        definition
    }
}
