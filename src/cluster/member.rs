//! One in-process cluster member and the stores it holds

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::query::MemberId;
use crate::store::RecordStore;

/// Store address on a member: collection plus partition (`None` for a replica)
type StoreKey = (String, Option<u32>);

/// A member with simulated network conditions
#[derive(Debug)]
pub struct Member {
    id: MemberId,
    reachable: AtomicBool,
    latency: RwLock<Option<Duration>>,
    stores: RwLock<BTreeMap<StoreKey, Arc<RecordStore>>>,
}

impl Member {
    pub fn new(id: MemberId) -> Self {
        Self {
            id,
            reachable: AtomicBool::new(true),
            latency: RwLock::new(None),
            stores: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn id(&self) -> &MemberId {
        &self.id
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Delay added before every sub-query this member answers
    pub fn latency(&self) -> Option<Duration> {
        *self.latency.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    pub fn store(&self, collection: &str, partition: Option<u32>) -> Option<Arc<RecordStore>> {
        self.stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(collection.to_string(), partition))
            .cloned()
    }

    pub fn insert_store(&self, store: Arc<RecordStore>) {
        let key = (store.collection().to_string(), store.partition());
        self.stores
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, store);
    }

    pub fn remove_store(&self, collection: &str, partition: Option<u32>) -> Option<Arc<RecordStore>> {
        self.stores
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(collection.to_string(), partition))
    }

    /// Every store of `collection` on this member
    pub fn stores_of(&self, collection: &str) -> Vec<Arc<RecordStore>> {
        self.stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|((name, _), _)| name == collection)
            .map(|(_, store)| Arc::clone(store))
            .collect()
    }

    /// Every store on this member
    pub fn all_stores(&self) -> Vec<Arc<RecordStore>> {
        self.stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}
