//! Query coordinator error types
//!
//! Error codes:
//! - GRID_QUERY_MALFORMED_PREDICATE (REJECT)
//! - GRID_QUERY_UNKNOWN_COLLECTION (REJECT)
//! - GRID_QUERY_PARTIAL_TOPOLOGY (ERROR)
//! - GRID_QUERY_NO_REPLICA_AVAILABLE (ERROR)

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::planner::PlannerError;

use super::topology::MemberId;

/// Severity levels for query errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Request rejected before any store was touched
    Reject,
    /// Query dispatched but could not produce a complete answer
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// Query-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorCode {
    /// Predicate failed validation
    GridQueryMalformedPredicate,
    /// No collection with that name
    GridQueryUnknownCollection,
    /// One or more partitions gave no answer
    GridQueryPartialTopology,
    /// No replica of a replicated collection answered
    GridQueryNoReplicaAvailable,
}

impl QueryErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            QueryErrorCode::GridQueryMalformedPredicate => "GRID_QUERY_MALFORMED_PREDICATE",
            QueryErrorCode::GridQueryUnknownCollection => "GRID_QUERY_UNKNOWN_COLLECTION",
            QueryErrorCode::GridQueryPartialTopology => "GRID_QUERY_PARTIAL_TOPOLOGY",
            QueryErrorCode::GridQueryNoReplicaAvailable => "GRID_QUERY_NO_REPLICA_AVAILABLE",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            QueryErrorCode::GridQueryMalformedPredicate
            | QueryErrorCode::GridQueryUnknownCollection => Severity::Reject,
            QueryErrorCode::GridQueryPartialTopology
            | QueryErrorCode::GridQueryNoReplicaAvailable => Severity::Error,
        }
    }
}

impl fmt::Display for QueryErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Query error type with full context
#[derive(Debug, Clone)]
pub struct QueryError {
    code: QueryErrorCode,
    message: String,
    missing_partitions: Vec<u32>,
    cause: Option<PlannerError>,
}

impl QueryError {
    /// Predicate rejected at plan time
    pub fn malformed_predicate(cause: PlannerError) -> Self {
        Self {
            code: QueryErrorCode::GridQueryMalformedPredicate,
            message: cause.message().to_string(),
            missing_partitions: Vec::new(),
            cause: Some(cause),
        }
    }

    pub fn unknown_collection(collection: &str) -> Self {
        Self {
            code: QueryErrorCode::GridQueryUnknownCollection,
            message: format!("Unknown collection '{}'", collection),
            missing_partitions: Vec::new(),
            cause: None,
        }
    }

    /// Partitions of a partitioned collection that could not be reached
    pub fn partial_topology(collection: &str, mut missing: Vec<u32>) -> Self {
        missing.sort_unstable();
        missing.dedup();
        Self {
            code: QueryErrorCode::GridQueryPartialTopology,
            message: format!(
                "Collection '{}': partitions {:?} unreachable; refusing a partial result",
                collection, missing
            ),
            missing_partitions: missing,
            cause: None,
        }
    }

    pub fn no_replica_available(collection: &str, tried: &[MemberId]) -> Self {
        let tried: Vec<String> = tried.iter().map(ToString::to_string).collect();
        Self {
            code: QueryErrorCode::GridQueryNoReplicaAvailable,
            message: format!(
                "Collection '{}': no replica answered (tried [{}])",
                collection,
                tried.join(", ")
            ),
            missing_partitions: Vec::new(),
            cause: None,
        }
    }

    /// Returns the error code
    pub fn code(&self) -> QueryErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Partitions that did not answer (partial topology only)
    pub fn missing_partitions(&self) -> &[u32] {
        &self.missing_partitions
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.severity(), self.code.code(), self.message)
    }
}

impl std::error::Error for QueryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<PlannerError> for QueryError {
    fn from(err: PlannerError) -> Self {
        QueryError::malformed_predicate(err)
    }
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Failure of one sub-query at the dispatch boundary
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("member {0} is unreachable")]
    Unreachable(MemberId),

    #[error("member {member} does not own partition {partition}")]
    NotOwner { partition: u32, member: MemberId },

    #[error("member {member} holds no store for collection '{collection}'")]
    NoStore { member: MemberId, collection: String },

    #[error("store rejected the operation: {0}")]
    Rejected(String),

    #[error("no answer within {0:?}")]
    Timeout(Duration),

    #[error("sub-query task failed: {0}")]
    Aborted(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::PredicateError;

    #[test]
    fn test_error_display() {
        let err = QueryError::partial_topology("people", vec![3, 1, 3]);
        let display = format!("{}", err);
        assert!(display.contains("[ERROR]"));
        assert!(display.contains("GRID_QUERY_PARTIAL_TOPOLOGY"));
        assert_eq!(err.missing_partitions(), &[1, 3]);
    }

    #[test]
    fn test_malformed_is_reject_with_source() {
        let err: QueryError = PlannerError::malformed_predicate(PredicateError::EmptyAttribute).into();
        assert_eq!(err.code(), QueryErrorCode::GridQueryMalformedPredicate);
        assert_eq!(err.severity(), Severity::Reject);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_no_replica_lists_members() {
        let err = QueryError::no_replica_available(
            "cities",
            &[MemberId::new("member-1"), MemberId::new("member-2")],
        );
        assert!(err.message().contains("member-1, member-2"));
    }

    #[test]
    fn test_dispatch_error_display() {
        let err = DispatchError::NotOwner {
            partition: 7,
            member: MemberId::new("member-2"),
        };
        assert_eq!(err.to_string(), "member member-2 does not own partition 7");
    }
}
