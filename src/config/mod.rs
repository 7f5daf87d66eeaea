//! Grid configuration
//!
//! A single JSON file describes the cluster shape, the coordinator
//! timeouts, the log level and every collection with its indexes. Unknown
//! fields are rejected. Validation happens on load so a config that loads
//! always boots.

mod errors;
mod grid;

pub use errors::{ConfigError, ConfigErrorCode, ConfigResult};
pub use grid::{CollectionConfig, GridConfig, IndexConfig};
