//! Expiry notifications and warm-up loading

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use super::record::ExpiryReason;

/// One eviction caused by expiry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpiryEvent {
    pub collection: String,
    /// Partition of the evicting store; `None` for replicated stores
    pub partition: Option<u32>,
    pub key: String,
    pub value: Value,
    pub reason: ExpiryReason,
    pub expired_at: DateTime<Utc>,
}

/// Receives expiry events
///
/// Called after the store lock is released; a listener may call back into
/// the store.
pub trait ExpiryListener: Send + Sync {
    fn on_expired(&self, event: &ExpiryEvent);
}

/// Listener that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl ExpiryListener for NoopListener {
    fn on_expired(&self, _event: &ExpiryEvent) {}
}

/// Listener forwarding events into a tokio channel
#[derive(Debug, Clone)]
pub struct ChannelListener {
    sender: mpsc::UnboundedSender<ExpiryEvent>,
}

impl ChannelListener {
    /// Listener plus the receiving half
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ExpiryEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ExpiryListener for ChannelListener {
    fn on_expired(&self, event: &ExpiryEvent) {
        // Receiver gone means nobody is listening any more.
        let _ = self.sender.send(event.clone());
    }
}

/// Growable fan-out shared by every store of one collection
#[derive(Clone, Default)]
pub struct ListenerSet {
    listeners: Arc<RwLock<Vec<Arc<dyn ExpiryListener>>>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn ExpiryListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ExpiryListener for ListenerSet {
    fn on_expired(&self, event: &ExpiryEvent) {
        let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner).clone();
        for listener in listeners {
            listener.on_expired(event);
        }
    }
}

impl fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSet").field("listeners", &self.len()).finish()
    }
}

/// External source of initial entries
pub trait EntryLoader: Send + Sync {
    /// Every key the source holds
    fn load_all_keys(&self) -> Vec<String>;

    /// Values for `keys`; keys the source no longer has are skipped
    fn load_all(&self, keys: &[String]) -> Vec<(String, Value)>;
}

/// Loader over an in-memory map
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    entries: BTreeMap<String, Value>,
}

impl MemoryLoader {
    pub fn new(entries: impl IntoIterator<Item = (impl Into<String>, Value)>) -> Self {
        Self {
            entries: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Loader over the members of a JSON object
    pub fn from_json_object(object: &serde_json::Map<String, Value>) -> Self {
        Self::new(object.iter().map(|(k, v)| (k.clone(), v.clone())))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl EntryLoader for MemoryLoader {
    fn load_all_keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    fn load_all(&self, keys: &[String]) -> Vec<(String, Value)> {
        keys.iter()
            .filter_map(|k| self.entries.get(k).map(|v| (k.clone(), v.clone())))
            .collect()
    }
}
