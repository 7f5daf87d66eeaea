//! Predicate tree

use std::cmp::Ordering;
use std::fmt;

use crate::value::{AttributeValue, ValueFamily};

use super::errors::{PredicateError, PredicateResult};
use super::like::LikePattern;

/// Deepest NOT / AND / OR / parenthesis nesting a predicate may have
pub const MAX_NESTING: usize = 128;

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
}

impl ComparisonOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOp::Equal => "=",
            ComparisonOp::NotEqual => "<>",
            ComparisonOp::GreaterThan => ">",
            ComparisonOp::GreaterOrEqual => ">=",
            ComparisonOp::LessThan => "<",
            ComparisonOp::LessOrEqual => "<=",
        }
    }

    /// True for `<`, `<=`, `>`, `>=`
    pub fn is_range(&self) -> bool {
        !matches!(self, ComparisonOp::Equal | ComparisonOp::NotEqual)
    }

    /// Does `actual <op> literal` hold for an attribute that is present.
    ///
    /// Values of different families are unequal and unordered.
    pub fn holds(&self, actual: &AttributeValue, literal: &AttributeValue) -> bool {
        match self {
            ComparisonOp::Equal => actual == literal,
            ComparisonOp::NotEqual => actual != literal,
            range => actual
                .compare(literal)
                .map(|ordering| range.accepts(ordering))
                .unwrap_or(false),
        }
    }

    /// Whether an ordering of `actual` relative to the literal satisfies this operator
    pub fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            ComparisonOp::Equal => ordering == Ordering::Equal,
            ComparisonOp::NotEqual => ordering != Ordering::Equal,
            ComparisonOp::GreaterThan => ordering == Ordering::Greater,
            ComparisonOp::GreaterOrEqual => ordering != Ordering::Less,
            ComparisonOp::LessThan => ordering == Ordering::Less,
            ComparisonOp::LessOrEqual => ordering != Ordering::Greater,
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A boolean condition over entry attributes.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches every entry
    True,
    /// `attribute <op> literal`
    Compare {
        attribute: String,
        op: ComparisonOp,
        value: AttributeValue,
    },
    /// `attribute LIKE pattern` or `attribute ILIKE pattern`
    Like {
        attribute: String,
        pattern: LikePattern,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    /// Attribute is the boolean `true`
    BooleanAttribute(String),
}

impl Predicate {
    fn compare(attribute: impl Into<String>, op: ComparisonOp, value: impl Into<AttributeValue>) -> Self {
        Predicate::Compare {
            attribute: attribute.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self::compare(attribute, ComparisonOp::Equal, value)
    }

    pub fn ne(attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self::compare(attribute, ComparisonOp::NotEqual, value)
    }

    pub fn gt(attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self::compare(attribute, ComparisonOp::GreaterThan, value)
    }

    pub fn gte(attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self::compare(attribute, ComparisonOp::GreaterOrEqual, value)
    }

    pub fn lt(attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self::compare(attribute, ComparisonOp::LessThan, value)
    }

    pub fn lte(attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self::compare(attribute, ComparisonOp::LessOrEqual, value)
    }

    /// Case-sensitive pattern match
    pub fn like(attribute: impl Into<String>, pattern: &str) -> PredicateResult<Self> {
        Ok(Predicate::Like {
            attribute: attribute.into(),
            pattern: LikePattern::new(pattern, false)?,
        })
    }

    /// Case-insensitive pattern match
    pub fn ilike(attribute: impl Into<String>, pattern: &str) -> PredicateResult<Self> {
        Ok(Predicate::Like {
            attribute: attribute.into(),
            pattern: LikePattern::new(pattern, true)?,
        })
    }

    pub fn and(operands: Vec<Predicate>) -> Self {
        Predicate::And(operands)
    }

    pub fn or(operands: Vec<Predicate>) -> Self {
        Predicate::Or(operands)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(operand: Predicate) -> Self {
        Predicate::Not(Box::new(operand))
    }

    pub fn boolean(attribute: impl Into<String>) -> Self {
        Predicate::BooleanAttribute(attribute.into())
    }

    /// Parse the SQL-like text form (`name = 'a' AND age >= 25`).
    pub fn parse(text: &str) -> PredicateResult<Self> {
        super::parser::parse(text)
    }

    /// Rejects trees no evaluator can give a meaning to.
    pub fn validate(&self) -> PredicateResult<()> {
        self.validate_at(0)
    }

    fn validate_at(&self, depth: usize) -> PredicateResult<()> {
        if depth > MAX_NESTING {
            return Err(PredicateError::TooDeep(MAX_NESTING));
        }
        match self {
            Predicate::True => Ok(()),
            Predicate::Compare {
                attribute,
                op,
                value,
            } => {
                check_attribute(attribute)?;
                if let AttributeValue::Number(n) = value {
                    if n.is_nan() {
                        return Err(PredicateError::NanLiteral(attribute.clone()));
                    }
                }
                if op.is_range() && value.family() == ValueFamily::Bool {
                    return Err(PredicateError::UnorderedLiteral {
                        attribute: attribute.clone(),
                        op: op.symbol(),
                        family: ValueFamily::Bool.as_str(),
                    });
                }
                Ok(())
            }
            Predicate::Like { attribute, .. } => check_attribute(attribute),
            Predicate::BooleanAttribute(attribute) => check_attribute(attribute),
            Predicate::And(operands) => validate_all(operands, "AND", depth + 1),
            Predicate::Or(operands) => validate_all(operands, "OR", depth + 1),
            Predicate::Not(operand) => operand.validate_at(depth + 1),
        }
    }

    /// Top-level conjuncts with nested ANDs flattened.
    pub fn conjuncts(&self) -> Vec<&Predicate> {
        let mut out = Vec::new();
        collect_conjuncts(self, &mut out);
        out
    }

    /// Rebuild a predicate from conjuncts; `None` when nothing remains.
    pub fn from_conjuncts(mut conjuncts: Vec<Predicate>) -> Option<Predicate> {
        match conjuncts.len() {
            0 => None,
            1 => conjuncts.pop(),
            _ => Some(Predicate::And(conjuncts)),
        }
    }
}

fn check_attribute(attribute: &str) -> PredicateResult<()> {
    if attribute.trim().is_empty() {
        Err(PredicateError::EmptyAttribute)
    } else {
        Ok(())
    }
}

fn validate_all(operands: &[Predicate], clause: &'static str, depth: usize) -> PredicateResult<()> {
    if operands.is_empty() {
        return Err(PredicateError::EmptyClause(clause));
    }
    operands.iter().try_for_each(|operand| operand.validate_at(depth))
}

fn collect_conjuncts<'a>(predicate: &'a Predicate, out: &mut Vec<&'a Predicate>) {
    match predicate {
        Predicate::And(operands) => {
            for operand in operands {
                collect_conjuncts(operand, out);
            }
        }
        other => out.push(other),
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, operands: &[Predicate], keyword: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, operand) in operands.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", keyword)?;
        }
        write!(f, "{}", operand)?;
    }
    f.write_str(")")
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::True => f.write_str("TRUE"),
            Predicate::Compare {
                attribute,
                op,
                value,
            } => write!(f, "{} {} {}", attribute, op, value),
            Predicate::Like { attribute, pattern } => {
                let keyword = if pattern.is_case_insensitive() {
                    "ILIKE"
                } else {
                    "LIKE"
                };
                write!(
                    f,
                    "{} {} '{}'",
                    attribute,
                    keyword,
                    pattern.pattern().replace('\'', "''")
                )
            }
            Predicate::And(operands) => write_joined(f, operands, "AND"),
            Predicate::Or(operands) => write_joined(f, operands, "OR"),
            Predicate::Not(operand) => write!(f, "NOT ({})", operand),
            Predicate::BooleanAttribute(attribute) => f.write_str(attribute),
        }
    }
}
