//! Scatter-Gather Tests
//!
//! Partitioned collections need every partition to answer; replicated
//! collections degrade to whatever replicas answered.

use std::time::Duration;

use gridstore::cluster::{CollectionDefinition, LocalCluster, MemberId};
use gridstore::predicate::Predicate;
use gridstore::query::{CoordinatorConfig, Projection, QueryErrorCode};
use gridstore::store::MemoryLoader;
use serde_json::json;

// =============================================================================
// Helper Functions
// =============================================================================

fn fast_config() -> CoordinatorConfig {
    CoordinatorConfig {
        query_timeout: Duration::from_millis(500),
        store_timeout: Duration::from_millis(100),
        retry_failed_stores: true,
    }
}

fn people_grid(members: usize, partitions: u32) -> LocalCluster {
    let cluster = LocalCluster::start(members, partitions);
    cluster
        .create_collection(
            CollectionDefinition::partitioned("people")
                .with_index("name", false)
                .with_index("age", true),
        )
        .unwrap();
    for i in 0..40 {
        let name = if i % 2 == 0 { "a" } else { "b" };
        cluster
            .put("people", &i.to_string(), json!({"name": name, "age": i}))
            .unwrap();
    }
    cluster
}

fn cities_grid(members: usize) -> LocalCluster {
    let cluster = LocalCluster::start(members, 4);
    cluster
        .create_collection(CollectionDefinition::replicated("cities").with_index("country", false))
        .unwrap();
    cluster.put("cities", "osl", json!({"country": "NO", "population": 700})).unwrap();
    cluster.put("cities", "ber", json!({"country": "DE", "population": 3600})).unwrap();
    cluster.put("cities", "trd", json!({"country": "NO", "population": 200})).unwrap();
    cluster
}

fn owner_of_partition(cluster: &LocalCluster, partition: u32) -> MemberId {
    cluster
        .members()
        .into_iter()
        .find(|m| cluster.partitions_of(m).contains(&partition))
        .unwrap()
}

// =============================================================================
// Partitioned Collections
// =============================================================================

/// All partitions reachable: the union over every partition.
#[tokio::test]
async fn test_partitioned_query_covers_every_partition() {
    let cluster = people_grid(4, 4);
    let result = cluster
        .coordinator(fast_config())
        .query_sql("people", "name = 'a' AND age >= 30", Projection::KeysOnly)
        .await
        .unwrap();

    let mut keys: Vec<u32> = result.keys().iter().map(|k| k.parse().unwrap()).collect();
    keys.sort();
    assert_eq!(keys, vec![30, 32, 34, 36, 38]);
    assert_eq!(result.stats().targets, 4);
    assert_eq!(result.stats().responses, 4);
}

/// One owner unreachable: the query fails instead of returning 3/4.
#[tokio::test]
async fn test_unreachable_partition_fails_query() {
    let cluster = people_grid(4, 4);
    let owner = owner_of_partition(&cluster, 2);
    cluster.set_reachable(&owner, false).unwrap();

    let err = cluster
        .coordinator(fast_config())
        .query("people", &Predicate::True, Projection::Entries)
        .await
        .unwrap_err();
    assert_eq!(err.code(), QueryErrorCode::GridQueryPartialTopology);
    assert_eq!(err.missing_partitions(), &[2]);
    assert!(cluster.metrics().snapshot().queries_failed >= 1);
}

/// A partition owner slower than the per-store timeout counts as unreachable.
#[tokio::test]
async fn test_slow_partition_times_out() {
    let cluster = people_grid(2, 4);
    let slow = cluster.members()[1].clone();
    cluster
        .set_latency(&slow, Some(Duration::from_millis(300)))
        .unwrap();

    let err = cluster
        .coordinator(fast_config())
        .query("people", &Predicate::gt("age", 5), Projection::KeysOnly)
        .await
        .unwrap_err();
    assert_eq!(err.code(), QueryErrorCode::GridQueryPartialTopology);
    let mut missing = err.missing_partitions().to_vec();
    missing.sort();
    assert_eq!(missing, cluster.partitions_of(&slow));
}

/// A store still scanning when its sub-query times out fails the query.
#[tokio::test]
async fn test_long_scan_hits_store_timeout() {
    let cluster = LocalCluster::start(1, 1);
    cluster
        .create_collection(CollectionDefinition::partitioned("people"))
        .unwrap();
    let entries = (0..200_000).map(|i| (i.to_string(), json!({"name": format!("n{}", i)})));
    cluster.warm_up("people", &MemoryLoader::new(entries)).unwrap();

    let config = CoordinatorConfig {
        query_timeout: Duration::from_millis(20),
        store_timeout: Duration::from_millis(5),
        retry_failed_stores: false,
    };
    let err = cluster
        .coordinator(config)
        .query_sql("people", "name LIKE '%9999%'", Projection::KeysOnly)
        .await
        .unwrap_err();
    assert_eq!(err.code(), QueryErrorCode::GridQueryPartialTopology);
    assert_eq!(err.missing_partitions(), &[0]);
}

/// Writes concurrent with queries never surface an inconsistent store.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_queries_during_writes() {
    let cluster = people_grid(3, 8);
    let writer = {
        let cluster = cluster.clone();
        tokio::task::spawn_blocking(move || {
            for i in 40..400 {
                cluster
                    .put("people", &i.to_string(), json!({"name": "a", "age": i}))
                    .unwrap();
            }
        })
    };

    let coordinator = cluster.coordinator(fast_config());
    for _ in 0..10 {
        let result = coordinator
            .query_sql("people", "name = 'a'", Projection::Values)
            .await
            .unwrap();
        for (_, value) in result.into_entries() {
            assert_eq!(value["name"], json!("a"));
        }
    }
    writer.await.unwrap();

    let result = coordinator
        .query_sql("people", "name = 'a'", Projection::KeysOnly)
        .await
        .unwrap();
    assert_eq!(result.len(), 20 + 360);
}

// =============================================================================
// Replicated Collections
// =============================================================================

/// Three replicas answer; each key counts once.
#[tokio::test]
async fn test_replicated_query_deduplicates() {
    let cluster = cities_grid(3);
    let result = cluster
        .coordinator(fast_config())
        .query_sql("cities", "country = 'NO'", Projection::Entries)
        .await
        .unwrap();
    assert_eq!(result.keys(), vec!["osl", "trd"]);
    assert_eq!(result.stats().responses, 3);
    assert!(result.unavailable_replicas().is_empty());
}

/// One of three replicas down: the other two still answer.
#[tokio::test]
async fn test_replicated_query_degrades() {
    let cluster = cities_grid(3);
    let down = cluster.members()[0].clone();
    cluster.set_reachable(&down, false).unwrap();

    let result = cluster
        .coordinator(fast_config())
        .query_sql("cities", "population > 100", Projection::KeysOnly)
        .await
        .unwrap();
    assert_eq!(result.keys(), vec!["ber", "osl", "trd"]);
    assert_eq!(result.unavailable_replicas(), &[down]);
    assert_eq!(cluster.metrics().snapshot().replica_failures, 1);
}

/// Every replica down: the query fails.
#[tokio::test]
async fn test_no_replica_available() {
    let cluster = cities_grid(2);
    for member in cluster.members() {
        cluster.set_reachable(&member, false).unwrap();
    }
    let err = cluster
        .coordinator(fast_config())
        .query("cities", &Predicate::True, Projection::KeysOnly)
        .await
        .unwrap_err();
    assert_eq!(err.code(), QueryErrorCode::GridQueryNoReplicaAvailable);
}

// =============================================================================
// Rejections
// =============================================================================

/// Malformed predicates are rejected before any store is touched.
#[tokio::test]
async fn test_malformed_predicate_rejected_at_plan_time() {
    let cluster = people_grid(2, 4);
    let before = cluster.metrics().snapshot();
    let err = cluster
        .coordinator(fast_config())
        .query_sql("people", "age >", Projection::KeysOnly)
        .await
        .unwrap_err();
    assert_eq!(err.code(), QueryErrorCode::GridQueryMalformedPredicate);

    let after = cluster.metrics().snapshot();
    assert_eq!(after.queries_malformed, before.queries_malformed + 1);
    assert_eq!(after.index_lookups + after.full_scans, before.index_lookups + before.full_scans);
}

/// Deeply nested predicate text is rejected instead of exhausting the stack.
#[tokio::test]
async fn test_deeply_nested_predicate_rejected() {
    let cluster = people_grid(2, 4);
    let text = format!("{}age > 3", "NOT ".repeat(200_000));
    let err = cluster
        .coordinator(fast_config())
        .query_sql("people", &text, Projection::KeysOnly)
        .await
        .unwrap_err();
    assert_eq!(err.code(), QueryErrorCode::GridQueryMalformedPredicate);
}
