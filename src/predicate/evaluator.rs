//! Predicate evaluation
//!
//! Pure function of `(predicate, attributes)`. Absent attributes make every
//! leaf false, so `NOT (age > 0)` holds for an entry without `age`.

use crate::value::{AttributeAccessor, AttributeValue};

use super::ast::Predicate;

/// Evaluates predicates against an attribute source.
pub struct PredicateEvaluator;

impl PredicateEvaluator {
    pub fn matches<A: AttributeAccessor + ?Sized>(predicate: &Predicate, entry: &A) -> bool {
        match predicate {
            Predicate::True => true,
            Predicate::Compare {
                attribute,
                op,
                value,
            } => match entry.attribute(attribute) {
                Some(actual) => op.holds(&actual, value),
                None => false,
            },
            Predicate::Like { attribute, pattern } => match entry.attribute(attribute) {
                Some(AttributeValue::Text(text)) => pattern.matches(&text),
                _ => false,
            },
            Predicate::BooleanAttribute(attribute) => {
                matches!(entry.attribute(attribute), Some(AttributeValue::Bool(true)))
            }
            Predicate::And(operands) => operands.iter().all(|p| Self::matches(p, entry)),
            Predicate::Or(operands) => operands.iter().any(|p| Self::matches(p, entry)),
            Predicate::Not(operand) => !Self::matches(operand, entry),
        }
    }
}
