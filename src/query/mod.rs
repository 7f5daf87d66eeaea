//! Scatter-gather query coordination for gridstore
//!
//! Sends a predicate to every store that must participate in a query and
//! merges the per-store answers into one result set.
//!
//! # Design Principles
//!
//! - Exhaustive: a partitioned query covers every partition exactly once,
//!   or fails with `GRID_QUERY_PARTIAL_TOPOLOGY`
//! - Degradable: a replicated query answers from whichever replicas respond
//! - Bounded: every sub-query and the whole gather run under a deadline
//!
//! # Boundaries
//!
//! Ownership comes from a [`ClusterView`]; sub-queries travel through an
//! [`OperationDispatcher`]. Both are snapshotted at query start and never
//! revalidated mid-query.

mod coordinator;
mod errors;
mod operation;
mod result;
mod topology;

pub use coordinator::{CoordinatorConfig, QueryCoordinator};
pub use errors::{DispatchError, QueryError, QueryErrorCode, QueryResult, Severity};
pub use operation::{DispatchTarget, Projection, QueryOperation, StoreResponse};
pub use result::{QueryEntry, QueryResultSet, QueryRows, QueryStats};
pub use topology::{ClusterView, CollectionKind, MemberId, OperationDispatcher};
