//! Sub-query payloads exchanged with the dispatch boundary

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::executor::LocalResult;
use crate::planner::ScanType;
use crate::predicate::Predicate;

use super::topology::MemberId;

/// Shape of the rows a query returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    KeysOnly,
    Values,
    #[default]
    Entries,
}

impl Projection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Projection::KeysOnly => "keys_only",
            Projection::Values => "values",
            Projection::Entries => "entries",
        }
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Projection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "keys" | "keys_only" | "keys-only" => Ok(Projection::KeysOnly),
            "values" => Ok(Projection::Values),
            "entries" => Ok(Projection::Entries),
            other => Err(format!("unknown projection '{}'", other)),
        }
    }
}

/// Store a sub-query is addressed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchTarget {
    /// The store of one partition on its owner
    Partition { partition: u32, member: MemberId },
    /// A member's replica of a replicated collection
    Replica { member: MemberId },
}

impl DispatchTarget {
    pub fn member(&self) -> &MemberId {
        match self {
            DispatchTarget::Partition { member, .. } | DispatchTarget::Replica { member } => member,
        }
    }

    pub fn partition(&self) -> Option<u32> {
        match self {
            DispatchTarget::Partition { partition, .. } => Some(*partition),
            DispatchTarget::Replica { .. } => None,
        }
    }
}

impl fmt::Display for DispatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchTarget::Partition { partition, member } => {
                write!(f, "partition {} on {}", partition, member)
            }
            DispatchTarget::Replica { member } => write!(f, "replica on {}", member),
        }
    }
}

/// One sub-query
#[derive(Debug, Clone)]
pub struct QueryOperation {
    pub query_id: Uuid,
    pub collection: String,
    pub predicate: Predicate,
    pub target: DispatchTarget,
}

/// What one store answered
#[derive(Debug, Clone, Default)]
pub struct StoreResponse {
    /// Matches ordered by key
    pub entries: Vec<(String, Value)>,
    pub scanned: usize,
    pub index_assisted: bool,
}

impl From<LocalResult> for StoreResponse {
    fn from(result: LocalResult) -> Self {
        Self {
            entries: result.entries,
            scanned: result.scanned,
            index_assisted: result.scan_type == ScanType::IndexLookup,
        }
    }
}
