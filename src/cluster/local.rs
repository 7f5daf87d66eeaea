//! In-process cluster
//!
//! Hosts every member in one process and implements the membership and
//! dispatch boundaries the coordinator consumes. Network faults are
//! simulated per member (reachability, added latency); map operations
//! ignore them and only sub-query dispatch observes them.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::index::IndexDefinition;
use crate::observability::{log_event, Event, MetricsRegistry, ObservationScope};
use crate::planner::ExplainPlan;
use crate::predicate::Predicate;
use crate::query::{
    ClusterView, CollectionKind, CoordinatorConfig, DispatchError, MemberId, OperationDispatcher,
    QueryCoordinator, QueryOperation, StoreResponse,
};
use crate::store::{Clock, EntryLoader, ExpiryListener, RecordStore, SystemClock};

use super::collection::{Collection, CollectionDefinition};
use super::errors::{ClusterError, ClusterResult};
use super::member::Member;
use super::partition::{Migration, PartitionTable};

/// Default number of partitions
pub const DEFAULT_PARTITION_COUNT: u32 = 271;

struct ClusterState {
    table: PartitionTable,
    members: BTreeMap<MemberId, Arc<Member>>,
    collections: BTreeMap<String, Collection>,
}

impl ClusterState {
    fn collection(&self, name: &str) -> ClusterResult<&Collection> {
        self.collections
            .get(name)
            .ok_or_else(|| ClusterError::unknown_collection(name))
    }

    fn member(&self, id: &MemberId) -> ClusterResult<&Arc<Member>> {
        self.members.get(id).ok_or_else(|| ClusterError::unknown_member(id))
    }

    fn member_ids(&self) -> Vec<MemberId> {
        self.members.keys().cloned().collect()
    }

    /// Store holding `key` of a collection
    ///
    /// Partitioned: the owner's partition store. Replicated: the replica on
    /// the first member in id order.
    fn store_for(&self, collection: &Collection, key: &str) -> Option<Arc<RecordStore>> {
        match collection.kind() {
            CollectionKind::Partitioned => {
                let partition = self.table.partition_of(key);
                let owner = self.table.owner(partition)?;
                self.members.get(owner)?.store(collection.name(), Some(partition))
            }
            CollectionKind::Replicated => self
                .members
                .values()
                .find_map(|member| member.store(collection.name(), None)),
        }
    }

    /// Every store of a collection: one per partition, or one per replica
    fn stores_of(&self, collection: &str) -> Vec<Arc<RecordStore>> {
        self.members
            .values()
            .flat_map(|member| member.stores_of(collection))
            .collect()
    }

    /// Replicas that receive every write of a replicated collection
    fn replicas_of(&self, collection: &str) -> Vec<Arc<RecordStore>> {
        self.members
            .values()
            .filter_map(|member| member.store(collection, None))
            .collect()
    }

    /// Move partition stores according to `migrations`
    ///
    /// Source members must still be present in `members`.
    fn migrate(&self, migrations: &[Migration], metrics: &MetricsRegistry) -> ClusterResult<()> {
        for migration in migrations {
            let target = self.member(&migration.to)?;
            for collection in self.collections.values() {
                if collection.kind() != CollectionKind::Partitioned {
                    continue;
                }
                let records = migration
                    .from
                    .as_ref()
                    .and_then(|from| self.members.get(from))
                    .and_then(|from| from.remove_store(collection.name(), Some(migration.partition)))
                    .map(|store| store.export_records())
                    .unwrap_or_default();
                let store = collection.new_store(Some(migration.partition))?;
                store.import_records(records);
                target.insert_store(store);
            }
            if migration.from.is_some() {
                metrics.increment_partitions_migrated();
                let partition = migration.partition.to_string();
                let from = migration.from.as_ref().map(MemberId::to_string).unwrap_or_default();
                log_event(
                    Event::PartitionMigrated,
                    &[
                        ("from", from.as_str()),
                        ("partition", partition.as_str()),
                        ("to", migration.to.as_str()),
                    ],
                );
            }
        }
        Ok(())
    }
}

struct ClusterInner {
    state: RwLock<ClusterState>,
    clock: Arc<dyn Clock>,
    metrics: Arc<MetricsRegistry>,
    next_member: AtomicU32,
}

/// A cluster whose members all live in this process
///
/// Cheap to clone; clones share the same members and data.
#[derive(Clone)]
pub struct LocalCluster {
    inner: Arc<ClusterInner>,
}

impl LocalCluster {
    /// Start `members` members over `partition_count` partitions on the wall clock
    pub fn start(members: usize, partition_count: u32) -> Self {
        Self::with_clock(members, partition_count, Arc::new(SystemClock))
    }

    /// Start with an explicit clock for expiry decisions
    pub fn with_clock(members: usize, partition_count: u32, clock: Arc<dyn Clock>) -> Self {
        let count = members.max(1) as u32;
        let mut state = ClusterState {
            table: PartitionTable::new(partition_count),
            members: BTreeMap::new(),
            collections: BTreeMap::new(),
        };
        for n in 1..=count {
            let id = MemberId::new(format!("member-{}", n));
            state.members.insert(id.clone(), Arc::new(Member::new(id)));
        }
        // No collections exist yet, so the first assignment moves no records.
        let ids = state.member_ids();
        state.table.assign(&ids);

        let cluster = Self {
            inner: Arc::new(ClusterInner {
                state: RwLock::new(state),
                clock,
                metrics: Arc::new(MetricsRegistry::new()),
                next_member: AtomicU32::new(count + 1),
            }),
        };
        for id in ids {
            let partitions = cluster.partitions_of(&id).len().to_string();
            log_event(
                Event::MemberJoined,
                &[("member", id.as_str()), ("partitions", partitions.as_str())],
            );
        }
        cluster
    }

    /// Every store mutation keeps cluster state consistent, so a poisoned
    /// lock still guards usable data.
    fn read(&self) -> RwLockReadGuard<'_, ClusterState> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ClusterState> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.inner.metrics
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }

    /// Coordinator that queries this cluster
    pub fn coordinator(&self, config: CoordinatorConfig) -> QueryCoordinator {
        let this = Arc::new(self.clone());
        QueryCoordinator::new(this.clone(), this, config, Arc::clone(&self.inner.metrics))
    }

    // Membership

    pub fn members(&self) -> Vec<MemberId> {
        self.read().member_ids()
    }

    pub fn partition_count(&self) -> u32 {
        self.read().table.partition_count()
    }

    pub fn partition_of(&self, key: &str) -> u32 {
        self.read().table.partition_of(key)
    }

    pub fn owner_of(&self, key: &str) -> Option<MemberId> {
        self.read().table.owner_of(key).cloned()
    }

    /// Partitions owned by `member`
    pub fn partitions_of(&self, member: &MemberId) -> Vec<u32> {
        self.read().table.partitions_of(member)
    }

    /// Join a new member: rebalance partitions and seed its replicas
    pub fn add_member(&self) -> ClusterResult<MemberId> {
        let n = self.inner.next_member.fetch_add(1, Ordering::SeqCst);
        let id = MemberId::new(format!("member-{}", n));
        let member = Arc::new(Member::new(id.clone()));

        let mut state = self.write();
        for collection in state.collections.values() {
            if collection.kind() != CollectionKind::Replicated {
                continue;
            }
            let seed = state
                .replicas_of(collection.name())
                .first()
                .map(|replica| replica.export_records())
                .unwrap_or_default();
            let store = collection.new_store(None)?;
            store.import_records(seed);
            member.insert_store(store);
        }
        state.members.insert(id.clone(), member);

        let members = state.member_ids();
        let migrations = state.table.assign(&members);
        state.migrate(&migrations, &self.inner.metrics)?;
        drop(state);

        let partitions = self.partitions_of(&id).len().to_string();
        log_event(
            Event::MemberJoined,
            &[("member", id.as_str()), ("partitions", partitions.as_str())],
        );
        Ok(id)
    }

    /// Gracefully remove a member, migrating its partitions first
    pub fn shutdown_member(&self, id: &MemberId) -> ClusterResult<()> {
        let mut state = self.write();
        state.member(id)?;
        if state.members.len() == 1 {
            return Err(ClusterError::last_member(id));
        }

        let remaining: Vec<MemberId> = state.members.keys().filter(|m| *m != id).cloned().collect();
        let migrations = state.table.assign(&remaining);
        state.migrate(&migrations, &self.inner.metrics)?;
        state.members.remove(id);
        drop(state);

        log_event(Event::MemberLeft, &[("member", id.as_str())]);
        Ok(())
    }

    /// Simulate a network partition towards `id`
    pub fn set_reachable(&self, id: &MemberId, reachable: bool) -> ClusterResult<()> {
        self.read().member(id)?.set_reachable(reachable);
        Ok(())
    }

    /// Delay every sub-query answered by `id`
    pub fn set_latency(&self, id: &MemberId, latency: Option<Duration>) -> ClusterResult<()> {
        self.read().member(id)?.set_latency(latency);
        Ok(())
    }

    // Collections

    pub fn create_collection(&self, definition: CollectionDefinition) -> ClusterResult<()> {
        definition.validate()?;
        let mut state = self.write();
        if state.collections.contains_key(&definition.name) {
            return Err(ClusterError::collection_exists(&definition.name));
        }

        let collection = Collection::new(
            definition,
            Arc::clone(&self.inner.clock),
            Arc::clone(&self.inner.metrics),
        );
        match collection.kind() {
            CollectionKind::Partitioned => {
                for (partition, owner) in state.table.owners() {
                    if let Some(owner) = owner.and_then(|o| state.members.get(&o).cloned()) {
                        owner.insert_store(collection.new_store(Some(partition))?);
                    }
                }
            }
            CollectionKind::Replicated => {
                for member in state.members.values() {
                    member.insert_store(collection.new_store(None)?);
                }
            }
        }
        state.collections.insert(collection.name().to_string(), collection);
        Ok(())
    }

    pub fn collection_names(&self) -> Vec<String> {
        self.read().collections.keys().cloned().collect()
    }

    pub fn collection_definition(&self, collection: &str) -> ClusterResult<CollectionDefinition> {
        Ok(self.read().collection(collection)?.definition.clone())
    }

    // Map operations

    /// Put with the collection's default expiry. Returns the previous value.
    pub fn put(&self, collection: &str, key: &str, value: Value) -> ClusterResult<Option<Value>> {
        self.write_through(collection, key, |store| store.put(key, value.clone()))
    }

    /// Put with a TTL overriding the collection default
    pub fn put_with_ttl(
        &self,
        collection: &str,
        key: &str,
        value: Value,
        ttl: Duration,
    ) -> ClusterResult<Option<Value>> {
        self.write_through(collection, key, |store| store.put_with_ttl(key, value.clone(), ttl))
    }

    pub fn remove(&self, collection: &str, key: &str) -> ClusterResult<Option<Value>> {
        self.write_through(collection, key, |store| store.remove(key))
    }

    /// Apply a write to the key's owner, or to every replica
    ///
    /// Runs under the cluster read lock, so no migration interleaves.
    fn write_through(
        &self,
        collection: &str,
        key: &str,
        write: impl Fn(&RecordStore) -> Option<Value>,
    ) -> ClusterResult<Option<Value>> {
        let state = self.read();
        let coll = state.collection(collection)?;
        match coll.kind() {
            CollectionKind::Partitioned => Ok(state
                .store_for(coll, key)
                .and_then(|store| write(&store))),
            CollectionKind::Replicated => {
                let mut previous = None;
                for (i, replica) in state.replicas_of(collection).iter().enumerate() {
                    let old = write(replica);
                    if i == 0 {
                        previous = old;
                    }
                }
                Ok(previous)
            }
        }
    }

    /// Live value of `key`; refreshes its idle timer
    pub fn get(&self, collection: &str, key: &str) -> ClusterResult<Option<Value>> {
        let state = self.read();
        let coll = state.collection(collection)?;
        Ok(state.store_for(coll, key).and_then(|store| store.get(key)))
    }

    /// Number of live entries
    pub fn size(&self, collection: &str) -> ClusterResult<usize> {
        let state = self.read();
        let coll = state.collection(collection)?;
        Ok(match coll.kind() {
            CollectionKind::Partitioned => state.stores_of(collection).iter().map(|s| s.size()).sum(),
            CollectionKind::Replicated => state
                .replicas_of(collection)
                .first()
                .map(|s| s.size())
                .unwrap_or(0),
        })
    }

    /// Add an index to every current and future store of `collection`
    ///
    /// Returns `false` if the same index already exists.
    pub fn add_index(&self, collection: &str, definition: IndexDefinition) -> ClusterResult<bool> {
        let mut state = self.write();
        let stores = state.stores_of(collection);
        let coll = state
            .collections
            .get_mut(collection)
            .ok_or_else(|| ClusterError::unknown_collection(collection))?;

        if let Some(existing) = coll
            .definition
            .indexes
            .iter()
            .find(|d| d.attribute == definition.attribute)
        {
            if existing.ordered == definition.ordered {
                return Ok(false);
            }
            return Err(ClusterError::index_failed(
                collection,
                crate::index::IndexError::conflict(&definition.attribute, existing.ordered),
            ));
        }

        for store in &stores {
            store
                .create_index(&definition)
                .map_err(|err| ClusterError::index_failed(collection, err))?;
        }
        let ordered = if definition.ordered { "true" } else { "false" };
        log_event(
            Event::IndexCreated,
            &[
                ("attribute", definition.attribute.as_str()),
                ("collection", collection),
                ("ordered", ordered),
            ],
        );
        coll.definition.indexes.push(definition);
        Ok(true)
    }

    /// Drop an index from every store. Returns `false` if there was none.
    pub fn drop_index(&self, collection: &str, attribute: &str) -> ClusterResult<bool> {
        let mut state = self.write();
        let stores = state.stores_of(collection);
        let coll = state
            .collections
            .get_mut(collection)
            .ok_or_else(|| ClusterError::unknown_collection(collection))?;

        let before = coll.definition.indexes.len();
        coll.definition.indexes.retain(|d| d.attribute != attribute);
        if coll.definition.indexes.len() == before {
            return Ok(false);
        }
        for store in &stores {
            store.drop_index(attribute);
        }
        log_event(
            Event::IndexDropped,
            &[("attribute", attribute), ("collection", collection)],
        );
        Ok(true)
    }

    /// Load every entry `loader` holds into `collection`
    ///
    /// Each partition store loads its own keys; each replica loads all of
    /// them. Returns the number of distinct entries loaded.
    pub fn warm_up(&self, collection: &str, loader: &dyn EntryLoader) -> ClusterResult<usize> {
        let scope = ObservationScope::with_fields("WARM_UP", &[("collection", collection)]);
        let state = self.read();
        let coll = match state.collection(collection) {
            Ok(coll) => coll,
            Err(err) => {
                scope.fail(err.message());
                return Err(err);
            }
        };
        let keys = loader.load_all_keys();

        let loaded = match coll.kind() {
            CollectionKind::Partitioned => {
                let mut by_partition: BTreeMap<u32, Vec<String>> = BTreeMap::new();
                for key in keys {
                    by_partition
                        .entry(state.table.partition_of(&key))
                        .or_default()
                        .push(key);
                }
                let mut loaded = 0;
                for (partition, keys) in by_partition {
                    let store = state
                        .table
                        .owner(partition)
                        .and_then(|owner| state.members.get(owner))
                        .and_then(|member| member.store(collection, Some(partition)));
                    if let Some(store) = store {
                        loaded += store.load_entries(loader, &keys);
                    }
                }
                loaded
            }
            CollectionKind::Replicated => state
                .replicas_of(collection)
                .iter()
                .map(|replica| replica.load_entries(loader, &keys))
                .max()
                .unwrap_or(0),
        };
        drop(state);

        let count = loaded.to_string();
        log_event(
            Event::WarmUpComplete,
            &[("collection", collection), ("entries", count.as_str())],
        );
        scope.complete_with_fields(&[("entries", count.as_str())]);
        Ok(loaded)
    }

    /// Register a listener for expiry events of every store of `collection`
    pub fn add_expiry_listener(
        &self,
        collection: &str,
        listener: Arc<dyn ExpiryListener>,
    ) -> ClusterResult<()> {
        self.read().collection(collection)?.listeners.add(listener);
        Ok(())
    }

    /// Evict expired entries from every store. Returns how many were evicted.
    pub fn sweep_expired(&self) -> usize {
        let stores: Vec<Arc<RecordStore>> = {
            let state = self.read();
            state.members.values().flat_map(|m| m.all_stores()).collect()
        };
        stores.iter().map(|store| store.sweep_expired()).sum()
    }

    /// Run [`LocalCluster::sweep_expired`] every `period` until aborted
    pub fn spawn_expiry_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let cluster = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                cluster.sweep_expired();
            }
        })
    }

    /// The plan a store of `collection` would run for `predicate`
    pub fn explain(&self, collection: &str, predicate: &Predicate) -> ClusterResult<ExplainPlan> {
        let state = self.read();
        state.collection(collection)?;
        let plan = match state.stores_of(collection).first() {
            Some(store) => store.explain(predicate),
            None => {
                let catalog = crate::index::IndexCatalog::from_definitions(
                    &state.collection(collection)?.definition.indexes,
                );
                match crate::planner::QueryPlanner::new(&catalog).plan(predicate) {
                    Ok(plan) => ExplainPlan::from_plan(&plan),
                    Err(err) => ExplainPlan::from_error(&err),
                }
            }
        };
        Ok(plan)
    }

    /// Store of `collection` on `member`; `partition` is `None` for replicas
    pub fn store(
        &self,
        member: &MemberId,
        collection: &str,
        partition: Option<u32>,
    ) -> Option<Arc<RecordStore>> {
        self.read().members.get(member)?.store(collection, partition)
    }

    /// Every store of `collection` across all members
    pub fn stores(&self, collection: &str) -> Vec<Arc<RecordStore>> {
        self.read().stores_of(collection)
    }
}

impl ClusterView for LocalCluster {
    fn collection_kind(&self, collection: &str) -> Option<CollectionKind> {
        self.read().collections.get(collection).map(Collection::kind)
    }

    fn partition_owners(&self) -> Vec<(u32, Option<MemberId>)> {
        self.read().table.owners()
    }

    fn replica_holders(&self, collection: &str) -> Vec<MemberId> {
        self.read()
            .members
            .values()
            .filter(|member| member.store(collection, None).is_some())
            .map(|member| member.id().clone())
            .collect()
    }
}

#[async_trait]
impl OperationDispatcher for LocalCluster {
    async fn dispatch(&self, operation: QueryOperation) -> Result<StoreResponse, DispatchError> {
        let target_member = operation.target.member().clone();
        let member = self
            .read()
            .members
            .get(&target_member)
            .cloned()
            .ok_or_else(|| DispatchError::Unreachable(target_member.clone()))?;
        if !member.is_reachable() {
            return Err(DispatchError::Unreachable(target_member));
        }
        if let Some(latency) = member.latency() {
            tokio::time::sleep(latency).await;
        }

        let partition = operation.target.partition();
        let store = member
            .store(&operation.collection, partition)
            .ok_or_else(|| match partition {
                Some(partition) => DispatchError::NotOwner {
                    partition,
                    member: target_member.clone(),
                },
                None => DispatchError::NoStore {
                    member: target_member.clone(),
                    collection: operation.collection.clone(),
                },
            })?;

        // Scans run on the blocking pool, never on an async worker.
        let predicate = operation.predicate;
        tokio::task::spawn_blocking(move || {
            store
                .query(&predicate)
                .map(StoreResponse::from)
                .map_err(|err| DispatchError::Rejected(err.to_string()))
        })
        .await
        .map_err(|err| DispatchError::Aborted(err.to_string()))?
    }
}

impl std::fmt::Debug for LocalCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read();
        f.debug_struct("LocalCluster")
            .field("members", &state.members.keys().collect::<Vec<_>>())
            .field("partitions", &state.table.partition_count())
            .field("collections", &state.collections.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterErrorCode;
    use crate::query::Projection;
    use crate::store::{ChannelListener, ManualClock, MemoryLoader};
    use serde_json::json;

    fn people_cluster(members: usize, partitions: u32) -> LocalCluster {
        let cluster = LocalCluster::start(members, partitions);
        cluster
            .create_collection(
                CollectionDefinition::partitioned("people")
                    .with_index("name", false)
                    .with_index("age", true),
            )
            .unwrap();
        cluster
    }

    #[test]
    fn test_start_names_members_in_order() {
        let cluster = LocalCluster::start(0, 4);
        assert_eq!(cluster.members(), vec![MemberId::new("member-1")]);
        assert_eq!(cluster.partitions_of(&MemberId::new("member-1")), vec![0, 1, 2, 3]);

        let cluster = LocalCluster::start(2, 4);
        assert_eq!(cluster.add_member().unwrap(), MemberId::new("member-3"));
        assert_eq!(cluster.members().len(), 3);
    }

    #[test]
    fn test_start_assigns_every_partition() {
        let cluster = LocalCluster::start(3, 10);
        assert_eq!(cluster.members().len(), 3);
        let owners = cluster.partition_owners();
        assert_eq!(owners.len(), 10);
        assert!(owners.iter().all(|(_, owner)| owner.is_some()));
    }

    #[test]
    fn test_partitioned_put_lands_on_owner() {
        let cluster = people_cluster(2, 8);
        cluster.put("people", "k1", json!({"name": "a", "age": 1})).unwrap();
        let owner = cluster.owner_of("k1").unwrap();
        let partition = cluster.partition_of("k1");
        let store = cluster.store(&owner, "people", Some(partition)).unwrap();
        assert_eq!(store.get("k1"), Some(json!({"name": "a", "age": 1})));
        assert_eq!(cluster.size("people").unwrap(), 1);
        assert_eq!(cluster.stores("people").len(), 8);
    }

    #[test]
    fn test_replicated_put_reaches_every_replica() {
        let cluster = LocalCluster::start(3, 4);
        cluster.create_collection(CollectionDefinition::replicated("cities")).unwrap();
        cluster.put("cities", "x", json!({"name": "Oslo"})).unwrap();
        assert_eq!(cluster.replica_holders("cities").len(), 3);
        for member in cluster.members() {
            let replica = cluster.store(&member, "cities", None).unwrap();
            assert_eq!(replica.get("x"), Some(json!({"name": "Oslo"})));
        }
        assert_eq!(cluster.size("cities").unwrap(), 1);
    }

    #[test]
    fn test_create_collection_twice_fails() {
        let cluster = people_cluster(1, 2);
        let err = cluster
            .create_collection(CollectionDefinition::partitioned("people"))
            .unwrap_err();
        assert_eq!(err.code(), ClusterErrorCode::GridClusterCollectionExists);
    }

    #[test]
    fn test_add_index_applies_to_all_stores() {
        let cluster = people_cluster(2, 4);
        cluster.put("people", "1", json!({"city": "Rome"})).unwrap();
        assert!(cluster.add_index("people", IndexDefinition::new("city", false)).unwrap());
        assert!(!cluster.add_index("people", IndexDefinition::new("city", false)).unwrap());
        assert!(cluster.add_index("people", IndexDefinition::new("city", true)).is_err());
        for store in cluster.stores("people") {
            assert!(store.catalog().kind("city").is_some());
        }
        assert!(cluster.drop_index("people", "city").unwrap());
        assert!(!cluster.drop_index("people", "city").unwrap());
    }

    #[test]
    fn test_member_join_migrates_and_keeps_indexes() {
        let cluster = people_cluster(1, 6);
        for i in 0..30 {
            cluster
                .put("people", &format!("k{}", i), json!({"name": "n", "age": i}))
                .unwrap();
        }
        let joined = cluster.add_member().unwrap();
        assert!(!cluster.partitions_of(&joined).is_empty());
        assert_eq!(cluster.size("people").unwrap(), 30);
        for partition in cluster.partitions_of(&joined) {
            let store = cluster.store(&joined, "people", Some(partition)).unwrap();
            assert!(store.catalog().kind("age").is_some());
        }
        assert!(cluster.metrics().snapshot().partitions_migrated > 0);
    }

    #[test]
    fn test_shutdown_member_migrates_data() {
        let cluster = people_cluster(3, 6);
        for i in 0..20 {
            cluster.put("people", &format!("k{}", i), json!({"age": i})).unwrap();
        }
        let leaving = cluster.members()[1].clone();
        cluster.shutdown_member(&leaving).unwrap();
        assert_eq!(cluster.members().len(), 2);
        assert_eq!(cluster.size("people").unwrap(), 20);
        assert_eq!(cluster.get("people", "k7").unwrap(), Some(json!({"age": 7})));
    }

    #[test]
    fn test_last_member_cannot_leave() {
        let cluster = LocalCluster::start(1, 2);
        let only = cluster.members()[0].clone();
        assert!(cluster.shutdown_member(&only).is_err());
        assert!(cluster.shutdown_member(&MemberId::new("ghost")).is_err());
    }

    #[test]
    fn test_expiry_listener_and_sweep() {
        let clock = Arc::new(ManualClock::starting_now());
        let cluster = LocalCluster::with_clock(2, 4, clock.clone());
        cluster
            .create_collection(CollectionDefinition::partitioned("sessions").with_ttl(Duration::from_secs(30)))
            .unwrap();
        let (listener, mut events) = ChannelListener::new();
        cluster.add_expiry_listener("sessions", Arc::new(listener)).unwrap();

        cluster.put("sessions", "s1", json!({"user": 1})).unwrap();
        cluster.put("sessions", "s2", json!({"user": 2})).unwrap();
        clock.advance(Duration::from_secs(31));

        assert_eq!(cluster.sweep_expired(), 2);
        assert_eq!(cluster.sweep_expired(), 0);
        let mut keys = vec![events.try_recv().unwrap().key, events.try_recv().unwrap().key];
        keys.sort();
        assert_eq!(keys, vec!["s1", "s2"]);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_warm_up_routes_by_partition() {
        let cluster = people_cluster(2, 8);
        let loader = MemoryLoader::new((0..12).map(|i| (format!("k{}", i), json!({"age": i}))));
        assert_eq!(cluster.warm_up("people", &loader).unwrap(), 12);
        assert_eq!(cluster.size("people").unwrap(), 12);
        assert_eq!(cluster.metrics().snapshot().entries_loaded, 12);
        assert!(cluster.warm_up("nope", &loader).is_err());
    }

    #[test]
    fn test_explain_uses_collection_indexes() {
        let cluster = people_cluster(1, 2);
        let plan = cluster
            .explain("people", &Predicate::and(vec![Predicate::eq("name", "a"), Predicate::gte("age", 25)]))
            .unwrap();
        assert!(plan.accepted);
        assert_eq!(plan.lookups.len(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_rejects_unreachable_member() {
        let cluster = people_cluster(2, 4);
        let member = cluster.members()[0].clone();
        cluster.set_reachable(&member, false).unwrap();
        let result = cluster
            .coordinator(CoordinatorConfig::default())
            .query("people", &Predicate::True, Projection::KeysOnly)
            .await;
        assert!(result.is_err());

        cluster.set_reachable(&member, true).unwrap();
        let result = cluster
            .coordinator(CoordinatorConfig::default())
            .query("people", &Predicate::True, Projection::KeysOnly)
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_sweeper_task_evicts() {
        let clock = Arc::new(ManualClock::starting_now());
        let cluster = LocalCluster::with_clock(1, 2, clock.clone());
        cluster
            .create_collection(CollectionDefinition::replicated("cache").with_ttl(Duration::from_secs(1)))
            .unwrap();
        cluster.put("cache", "a", json!(1)).unwrap();
        clock.advance(Duration::from_secs(2));

        let sweeper = cluster.spawn_expiry_sweeper(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        sweeper.abort();
        assert_eq!(cluster.store(&cluster.members()[0], "cache", None).unwrap().stored_len(), 0);
    }
}
