//! Index Manager subsystem for gridstore
//!
//! Indexes are derived, in-memory-only state owned by one record store.
//!
//! # Design Principles
//!
//! - Derived state: Indexes mirror storage, never the source of truth
//! - In-memory only: No persistence
//! - Deterministic: BTreeMap iteration order, sorted key sets
//!
//! # Invariants
//!
//! - Every key in an index is a live entry of the store, and every entry
//!   exposing the indexed attribute is in the index under its current value
//! - Entries without the attribute are left out, never an error
//! - A missing index answers `Unknown`, never an empty set

mod btree;
mod errors;
mod hash;
mod manager;

pub use btree::OrderedIndex;
pub use errors::{IndexError, IndexErrorCode, IndexResult};
pub use hash::UnorderedIndex;
pub use manager::{Candidates, IndexCatalog, IndexDefinition, IndexKind, IndexManager};
