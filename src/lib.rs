//! gridstore - query and indexing core of a partitioned in-memory key/value grid
//!
//! Records live in per-partition [`store::RecordStore`]s with optional
//! expiry and secondary indexes. Predicates are parsed, planned against the
//! indexes each store carries and scattered by a [`query::QueryCoordinator`]
//! to every partition owner or replica, then merged by key.

pub mod cli;
pub mod cluster;
pub mod config;
pub mod executor;
pub mod index;
pub mod observability;
pub mod planner;
pub mod predicate;
pub mod query;
pub mod store;
pub mod value;

pub use cluster::{CollectionDefinition, LocalCluster};
pub use predicate::Predicate;
pub use query::{Projection, QueryCoordinator, QueryResultSet};
