//! # Predicate Errors
//!
//! Every variant surfaces to callers as a malformed predicate.

use thiserror::Error;

/// Result type for predicate construction, parsing and validation
pub type PredicateResult<T> = Result<T, PredicateError>;

/// Predicate errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredicateError {
    /// Attribute name is empty
    #[error("Empty attribute name")]
    EmptyAttribute,

    /// AND / OR without operands
    #[error("Empty {0} clause")]
    EmptyClause(&'static str),

    /// Range operator against a literal whose family has no order
    #[error("Operator '{op}' cannot order attribute '{attribute}' against a {family} literal")]
    UnorderedLiteral {
        attribute: String,
        op: &'static str,
        family: &'static str,
    },

    /// NaN literal
    #[error("NaN literal compared with attribute '{0}'")]
    NanLiteral(String),

    /// LIKE pattern could not be compiled
    #[error("Invalid LIKE pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// NOT / AND / OR / parentheses nested past [`MAX_NESTING`]
    ///
    /// [`MAX_NESTING`]: super::MAX_NESTING
    #[error("Predicate nests deeper than {0} levels")]
    TooDeep(usize),

    /// Predicate text could not be parsed
    #[error("Syntax error at position {position}: {message}")]
    Syntax { position: usize, message: String },
}

impl PredicateError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        PredicateError::Syntax {
            position,
            message: message.into(),
        }
    }
}
