//! Per-collection, per-partition record store
//!
//! Storage and secondary indexes live behind one mutex, so every mutation
//! updates both as a unit and a query sees them consistent with each other.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::executor::{LocalResult, PlanExecutor, RecordSource, Visit};
use crate::index::{IndexCatalog, IndexDefinition, IndexManager, IndexResult};
use crate::observability::{log_event, Event, MetricsRegistry};
use crate::planner::{ExplainPlan, PlannerResult, QueryPlan, QueryPlanner, ScanType};
use crate::predicate::Predicate;
use crate::value::AttributeExtractor;

use super::clock::Clock;
use super::listener::{EntryLoader, ExpiryEvent, ExpiryListener};
use super::record::{ExpiryPolicy, ExpiryReason, Record};

/// Collaborators shared by every store of one collection
#[derive(Clone)]
pub struct StoreContext {
    pub extractor: Arc<dyn AttributeExtractor>,
    pub clock: Arc<dyn Clock>,
    pub listener: Arc<dyn ExpiryListener>,
    pub default_expiry: ExpiryPolicy,
    pub metrics: Arc<MetricsRegistry>,
}

impl fmt::Debug for StoreContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreContext")
            .field("extractor", &self.extractor)
            .field("clock", &self.clock)
            .field("default_expiry", &self.default_expiry)
            .finish()
    }
}

struct StoreState {
    records: BTreeMap<String, Record>,
    indexes: IndexManager,
}

/// Read-only view of the records at one instant
struct RecordsAt<'a> {
    records: &'a BTreeMap<String, Record>,
    now: DateTime<Utc>,
}

impl RecordSource for RecordsAt<'_> {
    fn visit(&self, key: &str) -> Visit<'_> {
        match self.records.get(key) {
            Some(record) if record.is_expired(self.now) => Visit::Expired,
            Some(record) => Visit::Live(&record.value),
            None => Visit::Missing,
        }
    }

    fn all_keys(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }
}

impl StoreState {
    /// Removes `key` if it is expired at `now`
    fn evict_if_expired(
        &mut self,
        collection: &str,
        partition: Option<u32>,
        key: &str,
        now: DateTime<Utc>,
    ) -> Option<ExpiryEvent> {
        let reason = self.records.get(key)?.expiry_reason(now);
        if !reason.is_expired() {
            return None;
        }
        let record = self.remove(key)?;
        Some(ExpiryEvent {
            collection: collection.to_string(),
            partition,
            key: key.to_string(),
            value: record.value,
            reason,
            expired_at: now,
        })
    }

    fn remove(&mut self, key: &str) -> Option<Record> {
        let record = self.records.remove(key)?;
        self.indexes.on_remove(key, &record.value);
        Some(record)
    }
}

/// Holds the entries of one collection for one partition (or one replica)
pub struct RecordStore {
    collection: String,
    partition: Option<u32>,
    state: Mutex<StoreState>,
    context: StoreContext,
}

impl RecordStore {
    /// Empty store; `partition` is `None` for a replicated collection
    pub fn new(collection: impl Into<String>, partition: Option<u32>, context: StoreContext) -> Self {
        let indexes = IndexManager::new(Arc::clone(&context.extractor));
        Self {
            collection: collection.into(),
            partition,
            state: Mutex::new(StoreState {
                records: BTreeMap::new(),
                indexes,
            }),
            context,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn partition(&self) -> Option<u32> {
        self.partition
    }

    /// Every mutation leaves the state consistent before it can panic, so a
    /// poisoned lock still guards usable data.
    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn now(&self) -> DateTime<Utc> {
        self.context.clock.now()
    }

    /// Notify once per eviction. Runs after the lock is released.
    fn publish(&self, events: Vec<ExpiryEvent>) {
        if events.is_empty() {
            return;
        }
        self.context.metrics.add_entries_expired(events.len() as u64);
        let partition = self.partition.map(|p| p.to_string()).unwrap_or_default();
        for event in &events {
            log_event(
                Event::EntryExpired,
                &[
                    ("collection", self.collection.as_str()),
                    ("key", event.key.as_str()),
                    ("partition", partition.as_str()),
                    ("reason", event.reason.as_str()),
                ],
            );
            self.context.listener.on_expired(event);
        }
    }

    fn evict_keys(&self, state: &mut StoreState, keys: &[String], now: DateTime<Utc>) -> Vec<ExpiryEvent> {
        keys.iter()
            .filter_map(|key| state.evict_if_expired(&self.collection, self.partition, key, now))
            .collect()
    }

    /// Put with the collection's default expiry. Returns the previous live value.
    pub fn put(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.put_with_expiry(key, value, self.context.default_expiry)
    }

    /// Put with a TTL overriding the collection default
    pub fn put_with_ttl(&self, key: impl Into<String>, value: Value, ttl: Duration) -> Option<Value> {
        self.put_with_expiry(key, value, self.context.default_expiry.with_ttl(ttl))
    }

    /// Put with an explicit policy. Returns the previous live value.
    pub fn put_with_expiry(&self, key: impl Into<String>, value: Value, expiry: ExpiryPolicy) -> Option<Value> {
        let key = key.into();
        let now = self.now();
        let (previous, expired) = {
            let mut state = self.lock();
            let expired = state.evict_if_expired(&self.collection, self.partition, &key, now);
            let state = &mut *state;
            let previous = match state.records.get_mut(&key) {
                Some(record) => {
                    let old = record.overwrite(value, expiry, now);
                    state.indexes.on_put(&key, Some(&old), &record.value);
                    Some(old)
                }
                None => {
                    state.indexes.on_put(&key, None, &value);
                    state.records.insert(key, Record::new(value, expiry, now));
                    None
                }
            };
            (previous, expired)
        };
        self.publish(expired.into_iter().collect());
        previous
    }

    /// Live value for `key`; refreshes its idle timer
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = self.now();
        let (value, expired) = {
            let mut state = self.lock();
            match state.evict_if_expired(&self.collection, self.partition, key, now) {
                Some(event) => (None, Some(event)),
                None => {
                    let value = state.records.get_mut(key).map(|record| {
                        record.touch(now);
                        record.value.clone()
                    });
                    (value, None)
                }
            }
        };
        self.publish(expired.into_iter().collect());
        value
    }

    /// Record with metadata, without touching it
    pub fn get_record(&self, key: &str) -> Option<Record> {
        let now = self.now();
        let state = self.lock();
        state.records.get(key).filter(|r| !r.is_expired(now)).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get_record(key).is_some()
    }

    /// Remove `key`. Returns its live value; an expired entry is evicted instead.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let now = self.now();
        let (value, expired) = {
            let mut state = self.lock();
            match state.evict_if_expired(&self.collection, self.partition, key, now) {
                Some(event) => (None, Some(event)),
                None => (state.remove(key).map(|r| r.value), None),
            }
        };
        self.publish(expired.into_iter().collect());
        value
    }

    /// Stored keys in key order
    ///
    /// With `include_expired == false` expired entries are evicted first.
    pub fn keys(&self, include_expired: bool) -> Vec<String> {
        if include_expired {
            return self.lock().records.keys().cloned().collect();
        }
        self.entries().into_iter().map(|(k, _)| k).collect()
    }

    /// Live entries in key order; evicts the expired ones
    pub fn entries(&self) -> Vec<(String, Value)> {
        let now = self.now();
        let (entries, expired) = {
            let mut state = self.lock();
            let keys: Vec<String> = state.records.keys().cloned().collect();
            let expired = self.evict_keys(&mut state, &keys, now);
            let entries = state
                .records
                .iter()
                .map(|(k, r)| (k.clone(), r.value.clone()))
                .collect::<Vec<_>>();
            (entries, expired)
        };
        self.publish(expired);
        entries
    }

    /// Number of live entries
    pub fn size(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Plan `predicate` against this store's indexes and run it
    pub fn query(&self, predicate: &Predicate) -> PlannerResult<LocalResult> {
        let plan = QueryPlanner::new(&self.catalog()).plan(predicate)?;
        Ok(self.execute(&plan))
    }

    /// Run an already planned query
    ///
    /// Expired entries met on the way are evicted and never returned.
    pub fn execute(&self, plan: &QueryPlan) -> LocalResult {
        let now = self.now();
        let (result, expired) = {
            let mut state = self.lock();
            let result = {
                let records = RecordsAt {
                    records: &state.records,
                    now,
                };
                PlanExecutor::new(&records, &state.indexes, self.context.extractor.as_ref()).execute(plan)
            };
            let expired = self.evict_keys(&mut state, &result.expired, now);
            (result, expired)
        };
        self.context
            .metrics
            .record_store_execution(result.scan_type == ScanType::IndexLookup);
        self.publish(expired);
        result
    }

    /// The plan this store would run for `predicate`
    pub fn explain(&self, predicate: &Predicate) -> ExplainPlan {
        match QueryPlanner::new(&self.catalog()).plan(predicate) {
            Ok(plan) => ExplainPlan::from_plan(&plan),
            Err(err) => ExplainPlan::from_error(&err),
        }
    }

    /// Index existing and future entries under `definition`
    ///
    /// Returns `false` if an identical index already exists.
    pub fn create_index(&self, definition: &IndexDefinition) -> IndexResult<bool> {
        let mut state = self.lock();
        let state = &mut *state;
        let entries = state.records.iter().map(|(k, r)| (k.as_str(), &r.value));
        state
            .indexes
            .create_index(&definition.attribute, definition.ordered, entries)
    }

    pub fn drop_index(&self, attribute: &str) -> bool {
        self.lock().indexes.drop_index(attribute)
    }

    pub fn catalog(&self) -> IndexCatalog {
        self.lock().indexes.catalog()
    }

    pub fn index_definitions(&self) -> Vec<IndexDefinition> {
        self.lock().indexes.definitions()
    }

    /// Keys currently held by the index on `attribute`
    pub fn indexed_keys(&self, attribute: &str) -> Option<BTreeSet<String>> {
        self.lock().indexes.indexed_keys(attribute)
    }

    /// Evict every expired entry. Returns how many were evicted.
    pub fn sweep_expired(&self) -> usize {
        let now = self.now();
        let expired = {
            let mut state = self.lock();
            let keys: Vec<String> = state
                .records
                .iter()
                .filter(|(_, r)| r.is_expired(now))
                .map(|(k, _)| k.clone())
                .collect();
            self.evict_keys(&mut state, &keys, now)
        };
        let count = expired.len();
        self.publish(expired);
        count
    }

    /// Whether any stored record has an expiry bound
    pub fn has_expirable_entries(&self) -> bool {
        self.lock().records.values().any(|r| r.expiry.is_expirable())
    }

    /// Load `keys` from `loader` through the ordinary put path
    ///
    /// Keys the loader no longer has are skipped. Returns the number loaded.
    pub fn load_entries(&self, loader: &dyn EntryLoader, keys: &[String]) -> usize {
        let mut loaded = 0;
        for (key, value) in loader.load_all(keys) {
            self.put(key, value);
            loaded += 1;
        }
        self.context.metrics.add_entries_loaded(loaded as u64);
        loaded
    }

    /// Copies of every record with metadata, for migration
    pub fn export_records(&self) -> Vec<(String, Record)> {
        self.lock()
            .records
            .iter()
            .map(|(k, r)| (k.clone(), r.clone()))
            .collect()
    }

    /// Take over migrated records and rebuild the indexes
    pub fn import_records(&self, records: impl IntoIterator<Item = (String, Record)>) {
        let mut state = self.lock();
        state.records.extend(records);
        let state = &mut *state;
        state.indexes.rebuild(state.records.iter().map(|(k, r)| (k.as_str(), &r.value)));
    }

    /// Drop every entry, keeping index definitions
    pub fn clear(&self) {
        let mut state = self.lock();
        state.records.clear();
        state.indexes.clear();
    }

    /// Why `key` is (or is not) expired right now; `None` if absent
    pub fn expiry_reason(&self, key: &str) -> Option<ExpiryReason> {
        let now = self.now();
        self.lock().records.get(key).map(|r| r.expiry_reason(now))
    }

    /// Number of stored records, expired ones included
    pub fn stored_len(&self) -> usize {
        self.lock().records.len()
    }

    #[cfg(test)]
    fn stored_entries(&self) -> Vec<(String, Value)> {
        let state = self.lock();
        state.records.iter().map(|(k, r)| (k.clone(), r.value.clone())).collect()
    }
}

impl fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStore")
            .field("collection", &self.collection)
            .field("partition", &self.partition)
            .field("stored", &self.stored_len())
            .finish()
    }
}
