//! Scatter-gather query coordinator
//!
//! Query flow (strict order):
//! 1. Validate the predicate; reject before any store is touched
//! 2. Resolve the collection kind and snapshot the targets
//! 3. Dispatch one sub-query per target concurrently
//! 4. Bound every attempt by the store timeout, retry once
//! 5. Bound the whole gather by the query timeout
//! 6. Classify failures: fail-fast (partitioned) or degrade (replicated)
//! 7. Merge by key and apply the projection

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use tokio::time::Instant;
use uuid::Uuid;

use crate::observability::{log_event, Event, MetricsRegistry, ObservationScope};
use crate::planner::PlannerError;
use crate::predicate::Predicate;

use super::errors::{DispatchError, QueryError, QueryErrorCode, QueryResult};
use super::operation::{DispatchTarget, Projection, QueryOperation, StoreResponse};
use super::result::{QueryResultSet, QueryStats};
use super::topology::{ClusterView, CollectionKind, MemberId, OperationDispatcher};

/// Deadlines and retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Bound on the whole gather
    pub query_timeout: Duration,
    /// Bound on each sub-query attempt
    pub store_timeout: Duration,
    /// Retry a failed sub-query once against the same store
    pub retry_failed_stores: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_millis(5000),
            store_timeout: Duration::from_millis(1000),
            retry_failed_stores: true,
        }
    }
}

/// Final state of one target after all attempts
struct TargetOutcome {
    target: DispatchTarget,
    retries: usize,
    result: Result<StoreResponse, DispatchError>,
}

/// Targets split by how they ended
struct Gathered {
    answered: Vec<(DispatchTarget, StoreResponse)>,
    failed: Vec<(DispatchTarget, String)>,
    stats: QueryStats,
}

/// Fans queries out to every store of a collection and merges the answers
pub struct QueryCoordinator {
    view: Arc<dyn ClusterView>,
    dispatcher: Arc<dyn OperationDispatcher>,
    config: CoordinatorConfig,
    metrics: Arc<MetricsRegistry>,
}

impl QueryCoordinator {
    pub fn new(
        view: Arc<dyn ClusterView>,
        dispatcher: Arc<dyn OperationDispatcher>,
        config: CoordinatorConfig,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            view,
            dispatcher,
            config,
            metrics,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Parse `text` and run it
    pub async fn query_sql(
        &self,
        collection: &str,
        text: &str,
        projection: Projection,
    ) -> QueryResult<QueryResultSet> {
        match Predicate::parse(text) {
            Ok(predicate) => self.run(collection, Ok(&predicate), projection).await,
            Err(err) => {
                let err = QueryError::malformed_predicate(PlannerError::from(err));
                self.run(collection, Err(err), projection).await
            }
        }
    }

    /// Run `predicate` against every store of `collection`
    pub async fn query(
        &self,
        collection: &str,
        predicate: &Predicate,
        projection: Projection,
    ) -> QueryResult<QueryResultSet> {
        let checked = predicate
            .validate()
            .map(|()| predicate)
            .map_err(|err| QueryError::malformed_predicate(PlannerError::from(err)));
        self.run(collection, checked, projection).await
    }

    async fn run(
        &self,
        collection: &str,
        predicate: QueryResult<&Predicate>,
        projection: Projection,
    ) -> QueryResult<QueryResultSet> {
        let query_id = Uuid::new_v4();
        let id = query_id.to_string();
        let scope = ObservationScope::with_fields(
            "QUERY",
            &[("collection", collection), ("query_id", id.as_str())],
        );

        let outcome = match predicate {
            Err(err) => Err(err),
            Ok(predicate) => match self.view.collection_kind(collection) {
                None => Err(QueryError::unknown_collection(collection)),
                Some(CollectionKind::Partitioned) => {
                    self.query_partitioned(query_id, collection, predicate).await
                }
                Some(CollectionKind::Replicated) => {
                    self.query_replicated(query_id, collection, predicate).await
                }
            },
        };

        match outcome {
            Ok((entries, stats, unavailable)) => {
                self.metrics.increment_queries_executed();
                let rows = entries.len().to_string();
                let responses = stats.responses.to_string();
                scope.complete_with_fields(&[("responses", responses.as_str()), ("rows", rows.as_str())]);
                Ok(QueryResultSet::new(
                    query_id,
                    collection,
                    projection,
                    entries.into_iter().collect(),
                    stats,
                    unavailable,
                ))
            }
            Err(err) => {
                if err.code() == QueryErrorCode::GridQueryMalformedPredicate {
                    self.metrics.increment_queries_malformed();
                } else {
                    self.metrics.increment_queries_failed();
                }
                scope.fail_with_fields(err.message(), &[("code", err.code().code())]);
                Err(err)
            }
        }
    }

    async fn query_partitioned(
        &self,
        query_id: Uuid,
        collection: &str,
        predicate: &Predicate,
    ) -> QueryResult<(BTreeMap<String, Value>, QueryStats, Vec<MemberId>)> {
        let owners = self.view.partition_owners();
        let unowned: Vec<u32> = owners
            .iter()
            .filter(|(_, owner)| owner.is_none())
            .map(|(partition, _)| *partition)
            .collect();
        if !unowned.is_empty() {
            for partition in &unowned {
                self.report_unreachable_partition(collection, *partition, "no owner");
            }
            return Err(QueryError::partial_topology(collection, unowned));
        }

        let targets: Vec<DispatchTarget> = owners
            .into_iter()
            .filter_map(|(partition, owner)| {
                owner.map(|member| DispatchTarget::Partition { partition, member })
            })
            .collect();
        let gathered = self.gather(query_id, collection, predicate, targets).await;

        if !gathered.failed.is_empty() {
            let mut missing = Vec::with_capacity(gathered.failed.len());
            for (target, reason) in &gathered.failed {
                if let Some(partition) = target.partition() {
                    self.report_unreachable_partition(collection, partition, reason);
                    missing.push(partition);
                }
            }
            return Err(QueryError::partial_topology(collection, missing));
        }

        Ok((merge(gathered.answered), gathered.stats, Vec::new()))
    }

    async fn query_replicated(
        &self,
        query_id: Uuid,
        collection: &str,
        predicate: &Predicate,
    ) -> QueryResult<(BTreeMap<String, Value>, QueryStats, Vec<MemberId>)> {
        let holders = self.view.replica_holders(collection);
        if holders.is_empty() {
            return Err(QueryError::no_replica_available(collection, &[]));
        }

        let targets: Vec<DispatchTarget> = holders
            .iter()
            .cloned()
            .map(|member| DispatchTarget::Replica { member })
            .collect();
        let gathered = self.gather(query_id, collection, predicate, targets).await;

        let mut unavailable = Vec::with_capacity(gathered.failed.len());
        for (target, reason) in &gathered.failed {
            self.metrics.increment_replica_failures();
            log_event(
                Event::ReplicaUnavailable,
                &[
                    ("collection", collection),
                    ("member", target.member().as_str()),
                    ("reason", reason.as_str()),
                ],
            );
            unavailable.push(target.member().clone());
        }
        unavailable.sort();

        if gathered.answered.is_empty() {
            return Err(QueryError::no_replica_available(collection, &holders));
        }

        Ok((merge(gathered.answered), gathered.stats, unavailable))
    }

    fn report_unreachable_partition(&self, collection: &str, partition: u32, reason: &str) {
        let partition = partition.to_string();
        log_event(
            Event::PartitionUnreachable,
            &[
                ("collection", collection),
                ("partition", partition.as_str()),
                ("reason", reason),
            ],
        );
    }

    /// Dispatch to every target concurrently until all answered or the
    /// query deadline passed
    async fn gather(
        &self,
        query_id: Uuid,
        collection: &str,
        predicate: &Predicate,
        targets: Vec<DispatchTarget>,
    ) -> Gathered {
        let deadline = Instant::now() + self.config.query_timeout;
        let mut pending: FuturesUnordered<_> = targets
            .iter()
            .cloned()
            .map(|target| {
                self.dispatch_with_retry(QueryOperation {
                    query_id,
                    collection: collection.to_string(),
                    predicate: predicate.clone(),
                    target,
                })
            })
            .collect();

        let mut finished = Vec::with_capacity(targets.len());
        while let Ok(Some(outcome)) = tokio::time::timeout_at(deadline, pending.next()).await {
            finished.push(outcome);
        }
        drop(pending);

        let mut gathered = Gathered {
            answered: Vec::with_capacity(finished.len()),
            failed: Vec::new(),
            stats: QueryStats {
                targets: targets.len(),
                ..QueryStats::default()
            },
        };

        for target in &targets {
            if !finished.iter().any(|outcome| &outcome.target == target) {
                gathered
                    .failed
                    .push((target.clone(), "query deadline passed".to_string()));
            }
        }

        for outcome in finished {
            gathered.stats.retries += outcome.retries;
            match outcome.result {
                Ok(response) => {
                    gathered.stats.responses += 1;
                    gathered.stats.scanned += response.scanned;
                    if response.index_assisted {
                        gathered.stats.index_assisted += 1;
                    }
                    gathered.answered.push((outcome.target, response));
                }
                Err(err) => gathered.failed.push((outcome.target, err.to_string())),
            }
        }

        gathered
    }

    async fn dispatch_with_retry(&self, operation: QueryOperation) -> TargetOutcome {
        let attempts = if self.config.retry_failed_stores { 2 } else { 1 };
        let mut retries = 0;
        loop {
            let result = match tokio::time::timeout(
                self.config.store_timeout,
                self.dispatcher.dispatch(operation.clone()),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(DispatchError::Timeout(self.config.store_timeout)),
            };

            match result {
                Err(err) if retries + 1 < attempts => {
                    retries += 1;
                    self.metrics.increment_subquery_retries();
                    let reason = err.to_string();
                    let target = operation.target.to_string();
                    log_event(
                        Event::SubQueryRetry,
                        &[
                            ("collection", operation.collection.as_str()),
                            ("reason", reason.as_str()),
                            ("target", target.as_str()),
                        ],
                    );
                }
                result => {
                    return TargetOutcome {
                        target: operation.target.clone(),
                        retries,
                        result,
                    }
                }
            }
        }
    }
}

/// Key-deduplicated union; the first answer for a key wins
fn merge(answered: Vec<(DispatchTarget, StoreResponse)>) -> BTreeMap<String, Value> {
    let mut merged = BTreeMap::new();
    for (_, response) in answered {
        for (key, value) in response.entries {
            merged.entry(key).or_insert(value);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fixed topology; per-member behaviour scripted by the test
    struct ScriptedCluster {
        kinds: HashMap<String, CollectionKind>,
        owners: Vec<(u32, Option<MemberId>)>,
        holders: Vec<MemberId>,
        data: HashMap<String, Vec<(String, Value)>>,
        down: HashSet<MemberId>,
        flaky_once: HashSet<MemberId>,
        slow: HashSet<MemberId>,
        calls: AtomicUsize,
    }

    impl ScriptedCluster {
        fn new() -> Self {
            Self {
                kinds: HashMap::new(),
                owners: Vec::new(),
                holders: Vec::new(),
                data: HashMap::new(),
                down: HashSet::new(),
                flaky_once: HashSet::new(),
                slow: HashSet::new(),
                calls: AtomicUsize::new(0),
            }
        }

        fn data_key(target: &DispatchTarget) -> String {
            match target {
                DispatchTarget::Partition { partition, .. } => format!("p{}", partition),
                DispatchTarget::Replica { member } => member.to_string(),
            }
        }
    }

    impl ClusterView for ScriptedCluster {
        fn collection_kind(&self, collection: &str) -> Option<CollectionKind> {
            self.kinds.get(collection).copied()
        }

        fn partition_owners(&self) -> Vec<(u32, Option<MemberId>)> {
            self.owners.clone()
        }

        fn replica_holders(&self, _collection: &str) -> Vec<MemberId> {
            self.holders.clone()
        }
    }

    #[async_trait]
    impl OperationDispatcher for ScriptedCluster {
        async fn dispatch(&self, operation: QueryOperation) -> Result<StoreResponse, DispatchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let member = operation.target.member().clone();
            if self.down.contains(&member) {
                return Err(DispatchError::Unreachable(member));
            }
            if self.flaky_once.contains(&member) && call == 0 {
                return Err(DispatchError::Unreachable(member));
            }
            if self.slow.contains(&member) {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            let entries = self
                .data
                .get(&Self::data_key(&operation.target))
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .filter(|(_, v)| crate::predicate::PredicateEvaluator::matches(&operation.predicate, v))
                .collect();
            Ok(StoreResponse {
                entries,
                scanned: 0,
                index_assisted: false,
            })
        }
    }

    fn member(n: u32) -> MemberId {
        MemberId::new(format!("member-{}", n))
    }

    fn partitioned(partitions: u32) -> ScriptedCluster {
        let mut cluster = ScriptedCluster::new();
        cluster.kinds.insert("people".into(), CollectionKind::Partitioned);
        for p in 0..partitions {
            cluster.owners.push((p, Some(member(p))));
            cluster
                .data
                .insert(format!("p{}", p), vec![(format!("k{}", p), json!({"n": p}))]);
        }
        cluster
    }

    fn replicated(holders: u32) -> ScriptedCluster {
        let mut cluster = ScriptedCluster::new();
        cluster.kinds.insert("cities".into(), CollectionKind::Replicated);
        for m in 0..holders {
            cluster.holders.push(member(m));
            cluster.data.insert(
                member(m).to_string(),
                vec![
                    ("a".to_string(), json!({"n": 1})),
                    ("b".to_string(), json!({"n": 2})),
                ],
            );
        }
        cluster
    }

    fn coordinator(cluster: ScriptedCluster, config: CoordinatorConfig) -> QueryCoordinator {
        let cluster = Arc::new(cluster);
        QueryCoordinator::new(
            cluster.clone(),
            cluster,
            config,
            Arc::new(MetricsRegistry::new()),
        )
    }

    fn fast_config() -> CoordinatorConfig {
        CoordinatorConfig {
            query_timeout: Duration::from_millis(300),
            store_timeout: Duration::from_millis(100),
            retry_failed_stores: true,
        }
    }

    #[tokio::test]
    async fn test_partitioned_merges_all_partitions() {
        let coordinator = coordinator(partitioned(4), fast_config());
        let result = coordinator
            .query("people", &Predicate::True, Projection::KeysOnly)
            .await
            .unwrap();
        assert_eq!(result.keys(), vec!["k0", "k1", "k2", "k3"]);
        assert_eq!(result.stats().targets, 4);
        assert_eq!(result.stats().responses, 4);
    }

    #[tokio::test]
    async fn test_partitioned_fails_when_owner_unreachable() {
        let mut cluster = partitioned(4);
        cluster.down.insert(member(2));
        let coordinator = coordinator(cluster, fast_config());
        let err = coordinator
            .query("people", &Predicate::True, Projection::Entries)
            .await
            .unwrap_err();
        assert_eq!(err.code(), QueryErrorCode::GridQueryPartialTopology);
        assert_eq!(err.missing_partitions(), &[2]);
        assert_eq!(coordinator.metrics().snapshot().queries_failed, 1);
        assert_eq!(coordinator.metrics().snapshot().subquery_retries, 1);
    }

    #[tokio::test]
    async fn test_partitioned_fails_on_unowned_partition() {
        let mut cluster = partitioned(3);
        cluster.owners[1].1 = None;
        let err = coordinator(cluster, fast_config())
            .query("people", &Predicate::True, Projection::Entries)
            .await
            .unwrap_err();
        assert_eq!(err.missing_partitions(), &[1]);
    }

    #[tokio::test]
    async fn test_retry_recovers_transient_failure() {
        let mut cluster = partitioned(1);
        cluster.flaky_once.insert(member(0));
        let result = coordinator(cluster, fast_config())
            .query("people", &Predicate::True, Projection::KeysOnly)
            .await
            .unwrap();
        assert_eq!(result.keys(), vec!["k0"]);
        assert_eq!(result.stats().retries, 1);
    }

    #[tokio::test]
    async fn test_no_retry_when_disabled() {
        let mut cluster = partitioned(1);
        cluster.flaky_once.insert(member(0));
        let config = CoordinatorConfig {
            retry_failed_stores: false,
            ..fast_config()
        };
        let err = coordinator(cluster, config)
            .query("people", &Predicate::True, Projection::KeysOnly)
            .await
            .unwrap_err();
        assert_eq!(err.code(), QueryErrorCode::GridQueryPartialTopology);
    }

    #[tokio::test]
    async fn test_slow_partition_times_out() {
        let mut cluster = partitioned(2);
        cluster.slow.insert(member(1));
        let err = coordinator(cluster, fast_config())
            .query("people", &Predicate::True, Projection::KeysOnly)
            .await
            .unwrap_err();
        assert_eq!(err.missing_partitions(), &[1]);
    }

    #[tokio::test]
    async fn test_replicated_degrades_and_deduplicates() {
        let mut cluster = replicated(3);
        cluster.down.insert(member(1));
        let coordinator = coordinator(cluster, fast_config());
        let result = coordinator
            .query("cities", &Predicate::True, Projection::Entries)
            .await
            .unwrap();
        assert_eq!(result.keys(), vec!["a", "b"]);
        assert_eq!(result.unavailable_replicas(), &[member(1)]);
        assert_eq!(result.stats().responses, 2);
        assert_eq!(coordinator.metrics().snapshot().replica_failures, 1);
    }

    #[tokio::test]
    async fn test_replicated_fails_without_any_replica() {
        let mut cluster = replicated(2);
        cluster.down.insert(member(0));
        cluster.down.insert(member(1));
        let err = coordinator(cluster, fast_config())
            .query("cities", &Predicate::True, Projection::Entries)
            .await
            .unwrap_err();
        assert_eq!(err.code(), QueryErrorCode::GridQueryNoReplicaAvailable);
    }

    #[tokio::test]
    async fn test_malformed_rejected_before_dispatch() {
        let cluster = partitioned(2);
        let cluster = Arc::new(cluster);
        let coordinator = QueryCoordinator::new(
            cluster.clone(),
            cluster.clone(),
            fast_config(),
            Arc::new(MetricsRegistry::new()),
        );
        let err = coordinator
            .query("people", &Predicate::Or(vec![]), Projection::Entries)
            .await
            .unwrap_err();
        assert_eq!(err.code(), QueryErrorCode::GridQueryMalformedPredicate);
        assert_eq!(cluster.calls.load(Ordering::SeqCst), 0);

        let err = coordinator
            .query_sql("people", "age >", Projection::Entries)
            .await
            .unwrap_err();
        assert_eq!(err.code(), QueryErrorCode::GridQueryMalformedPredicate);
        assert_eq!(coordinator.metrics().snapshot().queries_malformed, 2);
    }

    #[tokio::test]
    async fn test_unknown_collection() {
        let err = coordinator(partitioned(1), fast_config())
            .query("nope", &Predicate::True, Projection::Entries)
            .await
            .unwrap_err();
        assert_eq!(err.code(), QueryErrorCode::GridQueryUnknownCollection);
    }

    #[tokio::test]
    async fn test_query_sql_filters() {
        let result = coordinator(partitioned(4), fast_config())
            .query_sql("people", "n >= 2", Projection::Values)
            .await
            .unwrap();
        assert_eq!(result.keys(), vec!["k2", "k3"]);
    }
}
