//! Record stores for gridstore
//!
//! A [`RecordStore`] holds the entries of one collection for one partition
//! (or one replica of a replicated collection), together with the secondary
//! indexes declared for that collection.
//!
//! # Invariants
//!
//! - An index never disagrees with the entries it covers, even under
//!   concurrent writers
//! - Expired entries are never returned by `get`, `keys(false)`, `entries`
//!   or a query
//! - Every eviction caused by expiry produces exactly one [`ExpiryEvent`]
//!
//! # Expiry
//!
//! A record expires when its TTL (counted from the last put) or its max idle
//! time (counted from the last `get` or put) has elapsed on the store's
//! [`Clock`]. Queries do not refresh the idle timer.

mod clock;
mod listener;
mod record;
mod record_store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use listener::{
    ChannelListener, EntryLoader, ExpiryEvent, ExpiryListener, ListenerSet, MemoryLoader,
    NoopListener,
};
pub use record::{ExpiryPolicy, ExpiryReason, Record};
pub use record_store::{RecordStore, StoreContext};
