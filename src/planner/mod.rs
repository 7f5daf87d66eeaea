//! Query Planner subsystem for gridstore
//!
//! Decides, per store, which indexes narrow a predicate and what must still
//! be evaluated by scanning the narrowed candidates.
//!
//! # Design Principles
//!
//! - Deterministic: Same predicate and catalog → same plan
//! - Correctness-first: a plan never changes the result of a full scan
//! - Explicit: Malformed predicates are rejected before any store is touched
//!
//! # Index Use
//!
//! Only top-level conjuncts are index-assisted. A top-level `OR` or `NOT`
//! falls back to a full scan with the whole predicate as residual.

mod errors;
mod explain;
mod planner;

pub use errors::{PlannerError, PlannerErrorCode, PlannerResult};
pub use explain::{ExplainLookup, ExplainPlan};
pub use planner::{IndexLookup, LookupOp, QueryPlan, QueryPlanner, ScanType};
