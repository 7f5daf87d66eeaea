//! Index error types
//!
//! Error codes:
//! - GRID_INDEX_CONFLICT (ERROR)
//! - GRID_INDEX_INVALID_ATTRIBUTE (ERROR)

use std::fmt;

/// Severity levels for index errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Request rejected, store unchanged
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// Index-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexErrorCode {
    /// Attribute already indexed with a different kind
    GridIndexConflict,
    /// Attribute name cannot be indexed
    GridIndexInvalidAttribute,
}

impl IndexErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            IndexErrorCode::GridIndexConflict => "GRID_INDEX_CONFLICT",
            IndexErrorCode::GridIndexInvalidAttribute => "GRID_INDEX_INVALID_ATTRIBUTE",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        Severity::Error
    }
}

impl fmt::Display for IndexErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Index error type with full context
#[derive(Debug, Clone)]
pub struct IndexError {
    code: IndexErrorCode,
    message: String,
    attribute: String,
}

impl IndexError {
    /// Attribute already indexed with the other kind
    pub fn conflict(attribute: impl Into<String>, existing_ordered: bool) -> Self {
        let attribute = attribute.into();
        let (existing, requested) = if existing_ordered {
            ("ordered", "unordered")
        } else {
            ("unordered", "ordered")
        };
        Self {
            code: IndexErrorCode::GridIndexConflict,
            message: format!(
                "Attribute '{}' already has an {} index, cannot add an {} one",
                attribute, existing, requested
            ),
            attribute,
        }
    }

    /// Attribute name rejected
    pub fn invalid_attribute(attribute: impl Into<String>) -> Self {
        let attribute = attribute.into();
        Self {
            code: IndexErrorCode::GridIndexInvalidAttribute,
            message: format!("Cannot index attribute '{}'", attribute),
            attribute,
        }
    }

    /// Returns the error code
    pub fn code(&self) -> IndexErrorCode {
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

    /// Returns the attribute the request was about
    pub fn attribute(&self) -> &str {
        &self.attribute
    }
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.severity(), self.code.code(), self.message)
    }
}

impl std::error::Error for IndexError {}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;
