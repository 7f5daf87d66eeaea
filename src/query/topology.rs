//! Cluster boundaries consumed by the coordinator

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::errors::DispatchError;
use super::operation::{QueryOperation, StoreResponse};

/// Identity of a cluster member
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(String);

impl MemberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a collection is distributed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    /// Key space split across partitions, one owner each
    Partitioned,
    /// Every member holds the whole key space
    Replicated,
}

impl CollectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKind::Partitioned => "partitioned",
            CollectionKind::Replicated => "replicated",
        }
    }
}

/// Membership and ownership, as seen at query start
pub trait ClusterView: Send + Sync {
    fn collection_kind(&self, collection: &str) -> Option<CollectionKind>;

    /// Every partition with its owner; `None` while a partition has no owner
    fn partition_owners(&self) -> Vec<(u32, Option<MemberId>)>;

    /// Members holding a replica of `collection`
    fn replica_holders(&self, collection: &str) -> Vec<MemberId>;
}

/// Runs one sub-query on the member it is addressed to
///
/// Timeouts and retries are the caller's job.
#[async_trait]
pub trait OperationDispatcher: Send + Sync {
    async fn dispatch(&self, operation: QueryOperation) -> Result<StoreResponse, DispatchError>;
}
