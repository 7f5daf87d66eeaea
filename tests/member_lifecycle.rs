//! Member Lifecycle Tests
//!
//! Joins and graceful shutdowns move partitions with their records,
//! metadata and indexes; queries before and after agree.

use std::sync::Arc;
use std::time::Duration;

use gridstore::cluster::{ClusterErrorCode, CollectionDefinition, LocalCluster, MemberId};
use gridstore::predicate::Predicate;
use gridstore::query::{
    CoordinatorConfig, DispatchError, DispatchTarget, OperationDispatcher, Projection, QueryOperation,
};
use gridstore::store::ManualClock;
use serde_json::json;
use uuid::Uuid;

// =============================================================================
// Helper Functions
// =============================================================================

fn grid(members: usize) -> LocalCluster {
    let cluster = LocalCluster::start(members, 16);
    cluster
        .create_collection(
            CollectionDefinition::partitioned("orders")
                .with_index("status", false)
                .with_index("total", true),
        )
        .unwrap();
    cluster
        .create_collection(CollectionDefinition::replicated("currencies"))
        .unwrap();
    for i in 0..100 {
        let status = if i % 3 == 0 { "open" } else { "closed" };
        cluster
            .put("orders", &format!("o{:03}", i), json!({"status": status, "total": i * 10}))
            .unwrap();
    }
    cluster.put("currencies", "EUR", json!({"rate": 1.0})).unwrap();
    cluster.put("currencies", "USD", json!({"rate": 1.1})).unwrap();
    cluster
}

async fn open_orders(cluster: &LocalCluster) -> Vec<String> {
    let result = cluster
        .coordinator(CoordinatorConfig::default())
        .query_sql("orders", "status = 'open' AND total >= 500", Projection::KeysOnly)
        .await
        .unwrap();
    assert_eq!(result.stats().index_assisted, result.stats().responses);
    result.keys().into_iter().map(str::to_string).collect()
}

fn assert_every_partition_owned_once(cluster: &LocalCluster) {
    let mut owned: Vec<u32> = cluster
        .members()
        .iter()
        .flat_map(|m| cluster.partitions_of(m))
        .collect();
    owned.sort();
    assert_eq!(owned, (0..16).collect::<Vec<_>>());
}

// =============================================================================
// Joins
// =============================================================================

/// A join rebalances without changing query answers.
#[tokio::test]
async fn test_join_preserves_results() {
    let cluster = grid(2);
    let before = open_orders(&cluster).await;
    assert_eq!(before.len(), 17);

    let joined = cluster.add_member().unwrap();
    assert_eq!(cluster.members().len(), 3);
    assert!(!cluster.partitions_of(&joined).is_empty());
    assert_every_partition_owned_once(&cluster);

    assert_eq!(open_orders(&cluster).await, before);
    assert_eq!(cluster.size("orders").unwrap(), 100);
}

/// A joining member receives a full replica of replicated collections.
#[tokio::test]
async fn test_join_seeds_replicas() {
    let cluster = grid(2);
    let joined = cluster.add_member().unwrap();
    let replica = cluster.store(&joined, "currencies", None).unwrap();
    assert_eq!(replica.size(), 2);

    // The new replica alone can answer.
    for member in cluster.members() {
        if member != joined {
            cluster.set_reachable(&member, false).unwrap();
        }
    }
    let result = cluster
        .coordinator(CoordinatorConfig::default())
        .query("currencies", &Predicate::gt("rate", 1.05), Projection::KeysOnly)
        .await
        .unwrap();
    assert_eq!(result.keys(), vec!["USD"]);
}

// =============================================================================
// Shutdowns
// =============================================================================

/// Graceful shutdown hands partitions over before leaving.
#[tokio::test]
async fn test_shutdown_preserves_results() {
    let cluster = grid(3);
    let before = open_orders(&cluster).await;
    let leaving = cluster.members()[0].clone();

    cluster.shutdown_member(&leaving).unwrap();
    assert!(!cluster.members().contains(&leaving));
    assert_every_partition_owned_once(&cluster);
    assert_eq!(open_orders(&cluster).await, before);
    assert!(cluster.metrics().snapshot().partitions_migrated > 0);
}

/// Record metadata survives migration, so TTLs keep counting.
#[test]
fn test_migration_keeps_expiry_metadata() {
    let clock = Arc::new(ManualClock::starting_now());
    let cluster = LocalCluster::with_clock(1, 8, clock.clone());
    cluster
        .create_collection(CollectionDefinition::partitioned("tokens"))
        .unwrap();
    for i in 0..20 {
        cluster
            .put_with_ttl("tokens", &i.to_string(), json!(i), Duration::from_secs(30))
            .unwrap();
    }
    clock.advance(Duration::from_secs(20));
    cluster.add_member().unwrap();
    cluster.add_member().unwrap();

    assert_eq!(cluster.size("tokens").unwrap(), 20);
    clock.advance(Duration::from_secs(10));
    assert_eq!(cluster.size("tokens").unwrap(), 0);
}

/// The last member and unknown members cannot be shut down.
#[test]
fn test_invalid_shutdowns_rejected() {
    let cluster = grid(1);
    let only = cluster.members()[0].clone();
    assert_eq!(
        cluster.shutdown_member(&only).unwrap_err().code(),
        ClusterErrorCode::GridClusterLastMember
    );
    assert_eq!(
        cluster.shutdown_member(&MemberId::new("member-99")).unwrap_err().code(),
        ClusterErrorCode::GridClusterUnknownMember
    );
    assert_eq!(cluster.size("orders").unwrap(), 100);
}

// =============================================================================
// Stale Ownership
// =============================================================================

/// A sub-query addressed with a stale owner snapshot is refused.
#[tokio::test]
async fn test_stale_owner_refused() {
    let cluster = grid(2);
    // Two members: partition 2 sits on the first; a third member takes it.
    let old_owner = cluster.members()[0].clone();
    assert!(cluster.partitions_of(&old_owner).contains(&2));
    let operation = QueryOperation {
        query_id: Uuid::new_v4(),
        collection: "orders".to_string(),
        predicate: Predicate::True,
        target: DispatchTarget::Partition {
            partition: 2,
            member: old_owner.clone(),
        },
    };
    assert!(cluster.dispatch(operation.clone()).await.is_ok());

    let joined = cluster.add_member().unwrap();
    assert!(cluster.partitions_of(&joined).contains(&2));
    let err = cluster.dispatch(operation).await.unwrap_err();
    assert!(matches!(err, DispatchError::NotOwner { partition: 2, .. }));
}

/// A departed member is unreachable for dispatch.
#[tokio::test]
async fn test_departed_member_unreachable() {
    let cluster = grid(2);
    let leaving = cluster.members()[1].clone();
    cluster.shutdown_member(&leaving).unwrap();

    let err = cluster
        .dispatch(QueryOperation {
            query_id: Uuid::new_v4(),
            collection: "currencies".to_string(),
            predicate: Predicate::True,
            target: DispatchTarget::Replica { member: leaving },
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Unreachable(_)));
}
