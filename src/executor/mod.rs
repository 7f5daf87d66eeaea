//! Local plan execution for gridstore
//!
//! Consumes a plan and one store's records and indexes, and produces the
//! store's matches.
//!
//! # Invariants
//!
//! - Index-narrowed results equal a full scan of the same predicate
//! - An index answering `Unknown` at run time never drops results
//! - Expired records never match; they are reported for eviction

mod executor;
mod result;

pub use executor::{CandidateSource, PlanExecutor, RecordSource, Visit};
pub use result::LocalResult;
