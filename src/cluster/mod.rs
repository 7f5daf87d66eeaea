//! Cluster membership and partition ownership
//!
//! A [`LocalCluster`] hosts every member in-process:
//! - keys map to partitions by CRC32 and partitions to members round-robin
//!   in member id order
//! - partitioned collections keep one store per partition on its owner
//! - replicated collections keep a full replica on every member
//! - joins and graceful shutdowns migrate partition stores with their
//!   records and indexes
//!
//! The cluster implements [`ClusterView`](crate::query::ClusterView) and
//! [`OperationDispatcher`](crate::query::OperationDispatcher), so a
//! [`QueryCoordinator`](crate::query::QueryCoordinator) can scatter queries
//! over it. Reachability and latency are simulated per member and only
//! affect sub-query dispatch.

mod collection;
mod errors;
mod local;
mod member;
mod partition;

pub use collection::CollectionDefinition;
pub use errors::{ClusterError, ClusterErrorCode, ClusterResult};
pub use local::{LocalCluster, DEFAULT_PARTITION_COUNT};
pub use member::Member;
pub use partition::{Migration, PartitionTable};

pub use crate::query::{CollectionKind, MemberId};
