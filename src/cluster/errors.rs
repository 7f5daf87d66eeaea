//! Cluster error types
//!
//! Error codes:
//! - GRID_CLUSTER_UNKNOWN_COLLECTION (REJECT)
//! - GRID_CLUSTER_COLLECTION_EXISTS (REJECT)
//! - GRID_CLUSTER_INVALID_COLLECTION (REJECT)
//! - GRID_CLUSTER_UNKNOWN_MEMBER (REJECT)
//! - GRID_CLUSTER_LAST_MEMBER (REJECT)
//! - GRID_CLUSTER_INDEX_FAILED (REJECT)

use std::fmt;

use crate::index::IndexError;
use crate::query::MemberId;

/// Cluster-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterErrorCode {
    GridClusterUnknownCollection,
    GridClusterCollectionExists,
    GridClusterInvalidCollection,
    GridClusterUnknownMember,
    /// The only member cannot leave; its data would be lost
    GridClusterLastMember,
    GridClusterIndexFailed,
}

impl ClusterErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            ClusterErrorCode::GridClusterUnknownCollection => "GRID_CLUSTER_UNKNOWN_COLLECTION",
            ClusterErrorCode::GridClusterCollectionExists => "GRID_CLUSTER_COLLECTION_EXISTS",
            ClusterErrorCode::GridClusterInvalidCollection => "GRID_CLUSTER_INVALID_COLLECTION",
            ClusterErrorCode::GridClusterUnknownMember => "GRID_CLUSTER_UNKNOWN_MEMBER",
            ClusterErrorCode::GridClusterLastMember => "GRID_CLUSTER_LAST_MEMBER",
            ClusterErrorCode::GridClusterIndexFailed => "GRID_CLUSTER_INDEX_FAILED",
        }
    }

    /// Every cluster error rejects the request without side effects
    pub fn severity(&self) -> &'static str {
        "REJECT"
    }
}

impl fmt::Display for ClusterErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Cluster error with context
#[derive(Debug, Clone)]
pub struct ClusterError {
    code: ClusterErrorCode,
    message: String,
    index: Option<IndexError>,
}

impl ClusterError {
    fn new(code: ClusterErrorCode, message: String) -> Self {
        Self {
            code,
            message,
            index: None,
        }
    }

    pub fn unknown_collection(name: &str) -> Self {
        Self::new(
            ClusterErrorCode::GridClusterUnknownCollection,
            format!("Unknown collection '{}'", name),
        )
    }

    pub fn collection_exists(name: &str) -> Self {
        Self::new(
            ClusterErrorCode::GridClusterCollectionExists,
            format!("Collection '{}' already exists", name),
        )
    }

    pub fn invalid_collection(name: &str, reason: impl Into<String>) -> Self {
        Self::new(
            ClusterErrorCode::GridClusterInvalidCollection,
            format!("Collection '{}': {}", name, reason.into()),
        )
    }

    pub fn unknown_member(member: &MemberId) -> Self {
        Self::new(
            ClusterErrorCode::GridClusterUnknownMember,
            format!("Unknown member '{}'", member),
        )
    }

    pub fn last_member(member: &MemberId) -> Self {
        Self::new(
            ClusterErrorCode::GridClusterLastMember,
            format!("Member '{}' is the last member and cannot leave", member),
        )
    }

    pub fn index_failed(collection: &str, err: IndexError) -> Self {
        Self {
            code: ClusterErrorCode::GridClusterIndexFailed,
            message: format!("Collection '{}': {}", collection, err.message()),
            index: Some(err),
        }
    }

    /// Returns the error code
    pub fn code(&self) -> ClusterErrorCode {
        self.code
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ClusterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.severity(), self.code.code(), self.message)
    }
}

impl std::error::Error for ClusterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.index
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for cluster operations
pub type ClusterResult<T> = Result<T, ClusterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClusterError::unknown_collection("people");
        let display = format!("{}", err);
        assert!(display.contains("REJECT"));
        assert!(display.contains("GRID_CLUSTER_UNKNOWN_COLLECTION"));
        assert!(display.contains("people"));
    }

    #[test]
    fn test_index_failure_keeps_source() {
        let err = ClusterError::index_failed("people", IndexError::conflict("age", true));
        assert_eq!(err.code(), ClusterErrorCode::GridClusterIndexFailed);
        assert!(std::error::Error::source(&err).is_some());
    }
}
