//! Merged query results

use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::operation::Projection;
use super::topology::MemberId;

/// Counters describing how a query was answered
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryStats {
    /// Sub-queries dispatched (one per partition or replica)
    pub targets: usize,
    /// Sub-queries that answered
    pub responses: usize,
    /// Extra attempts after a failed first try
    pub retries: usize,
    /// Answering stores that used an index
    pub index_assisted: usize,
    /// Live records the residual was evaluated against, summed over stores
    pub scanned: usize,
}

/// Rows shaped by a projection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryRows {
    Keys(Vec<String>),
    Values(Vec<Value>),
    Entries(Vec<QueryEntry>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryEntry {
    pub key: String,
    pub value: Value,
}

/// Final answer of one query
///
/// Rows are key-deduplicated and ordered by key.
#[derive(Debug, Clone)]
pub struct QueryResultSet {
    query_id: Uuid,
    collection: String,
    projection: Projection,
    entries: Vec<(String, Value)>,
    stats: QueryStats,
    unavailable_replicas: Vec<MemberId>,
}

impl QueryResultSet {
    pub fn new(
        query_id: Uuid,
        collection: impl Into<String>,
        projection: Projection,
        entries: Vec<(String, Value)>,
        stats: QueryStats,
        unavailable_replicas: Vec<MemberId>,
    ) -> Self {
        Self {
            query_id,
            collection: collection.into(),
            projection,
            entries,
            stats,
            unavailable_replicas,
        }
    }

    pub fn query_id(&self) -> Uuid {
        self.query_id
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Matching keys in order, whatever the projection
    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|(k, _)| k.as_str()).collect()
    }

    pub fn stats(&self) -> &QueryStats {
        &self.stats
    }

    /// Replicas that did not answer; empty for partitioned collections
    pub fn unavailable_replicas(&self) -> &[MemberId] {
        &self.unavailable_replicas
    }

    /// Rows in the shape the projection asks for
    pub fn rows(&self) -> QueryRows {
        match self.projection {
            Projection::KeysOnly => QueryRows::Keys(self.entries.iter().map(|(k, _)| k.clone()).collect()),
            Projection::Values => QueryRows::Values(self.entries.iter().map(|(_, v)| v.clone()).collect()),
            Projection::Entries => QueryRows::Entries(
                self.entries
                    .iter()
                    .map(|(k, v)| QueryEntry {
                        key: k.clone(),
                        value: v.clone(),
                    })
                    .collect(),
            ),
        }
    }

    pub fn into_entries(self) -> Vec<(String, Value)> {
        self.entries
    }

    pub fn to_json(&self) -> Value {
        json!({
            "query_id": self.query_id.to_string(),
            "collection": self.collection,
            "projection": self.projection.as_str(),
            "count": self.entries.len(),
            "rows": self.rows(),
            "stats": self.stats,
            "unavailable_replicas": self.unavailable_replicas,
        })
    }
}
