//! # Predicates
//!
//! Boolean conditions over entry attributes, their text form, and the
//! evaluator shared by scans and residual filtering.
//!
//! # Invariants
//!
//! - Evaluation is a pure function of `(predicate, attributes)`
//! - Any leaf over an absent attribute is false; `NOT` then makes it true
//! - No type coercion: `"30"` never equals `30`
//! - A predicate that fails [`Predicate::validate`] is never executed
//! - Nesting is bounded by [`MAX_NESTING`] for parsed and built trees

mod ast;
mod errors;
mod evaluator;
mod like;
mod parser;

pub use ast::{ComparisonOp, Predicate, MAX_NESTING};
pub use errors::{PredicateError, PredicateResult};
pub use evaluator::PredicateEvaluator;
pub use like::LikePattern;
