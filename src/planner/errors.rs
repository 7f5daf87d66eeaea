//! Planner error types
//!
//! Error codes:
//! - GRID_PLAN_MALFORMED_PREDICATE (REJECT)

use std::fmt;

use crate::predicate::PredicateError;

/// Severity levels for planner errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Client request rejected
    Reject,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
        }
    }
}

/// Planner-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerErrorCode {
    /// Predicate cannot be evaluated
    GridPlanMalformedPredicate,
}

impl PlannerErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            PlannerErrorCode::GridPlanMalformedPredicate => "GRID_PLAN_MALFORMED_PREDICATE",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        Severity::Reject
    }
}

impl fmt::Display for PlannerErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Planner error type with full context
#[derive(Debug, Clone)]
pub struct PlannerError {
    code: PlannerErrorCode,
    message: String,
    cause: PredicateError,
}

impl PlannerError {
    /// Predicate rejected by validation
    pub fn malformed_predicate(cause: PredicateError) -> Self {
        Self {
            code: PlannerErrorCode::GridPlanMalformedPredicate,
            message: format!("Malformed predicate: {}", cause),
            cause,
        }
    }

    /// Returns the error code
    pub fn code(&self) -> PlannerErrorCode {
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

    /// Returns the predicate error behind this rejection
    pub fn cause(&self) -> &PredicateError {
        &self.cause
    }
}

impl fmt::Display for PlannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.severity(), self.code.code(), self.message)
    }
}

impl std::error::Error for PlannerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

impl From<PredicateError> for PlannerError {
    fn from(cause: PredicateError) -> Self {
        PlannerError::malformed_predicate(cause)
    }
}

/// Result type for planner operations
pub type PlannerResult<T> = Result<T, PlannerError>;
