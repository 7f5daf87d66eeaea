//! Stored records and their expiry metadata

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Expiry configuration for a record
///
/// Either bound may be absent. [`ExpiryPolicy::NONE`] never expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ExpiryPolicy {
    /// Time-to-live counted from the last put
    pub ttl: Option<Duration>,
    /// Maximum time since the last read or put
    pub max_idle: Option<Duration>,
}

impl ExpiryPolicy {
    /// No expiration
    pub const NONE: Self = Self {
        ttl: None,
        max_idle: None,
    };

    pub fn new(ttl: Option<Duration>, max_idle: Option<Duration>) -> Self {
        Self { ttl, max_idle }
    }

    /// Same policy with the TTL replaced
    pub fn with_ttl(self, ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            ..self
        }
    }

    /// Whether any bound is set
    pub fn is_expirable(&self) -> bool {
        self.ttl.is_some() || self.max_idle.is_some()
    }
}

/// Reason a record expired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpiryReason {
    /// The record has not expired
    NotExpired,
    /// Time-to-live elapsed
    Ttl,
    /// Maximum idle time elapsed
    MaxIdle,
}

impl ExpiryReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpiryReason::NotExpired => "NOT_EXPIRED",
            ExpiryReason::Ttl => "TTL",
            ExpiryReason::MaxIdle => "MAX_IDLE",
        }
    }

    pub fn is_expired(&self) -> bool {
        !matches!(self, ExpiryReason::NotExpired)
    }
}

/// A value plus the metadata the store tracks for it
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub value: Value,
    pub created_at: DateTime<Utc>,
    pub last_access_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Starts at 1, incremented by every overwrite
    pub version: u64,
    pub expiry: ExpiryPolicy,
}

impl Record {
    /// Fresh record written at `now`
    pub fn new(value: Value, expiry: ExpiryPolicy, now: DateTime<Utc>) -> Self {
        Self {
            value,
            created_at: now,
            last_access_at: now,
            updated_at: now,
            version: 1,
            expiry,
        }
    }

    /// Overwrite in place, keeping creation time and bumping the version
    pub fn overwrite(&mut self, value: Value, expiry: ExpiryPolicy, now: DateTime<Utc>) -> Value {
        self.updated_at = now;
        self.last_access_at = now;
        self.version += 1;
        self.expiry = expiry;
        std::mem::replace(&mut self.value, value)
    }

    /// Record a read
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_access_at = now;
    }

    /// Whether the record is expired at `now`, and why
    ///
    /// TTL wins when both bounds have passed.
    pub fn expiry_reason(&self, now: DateTime<Utc>) -> ExpiryReason {
        if let Some(ttl) = self.expiry.ttl {
            if elapsed_at_least(self.updated_at, now, ttl) {
                return ExpiryReason::Ttl;
            }
        }
        if let Some(max_idle) = self.expiry.max_idle {
            if elapsed_at_least(self.last_access_at, now, max_idle) {
                return ExpiryReason::MaxIdle;
            }
        }
        ExpiryReason::NotExpired
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry_reason(now).is_expired()
    }
}

fn elapsed_at_least(since: DateTime<Utc>, now: DateTime<Utc>, bound: Duration) -> bool {
    let elapsed = now.timestamp_millis().saturating_sub(since.timestamp_millis());
    let bound = i64::try_from(bound.as_millis()).unwrap_or(i64::MAX);
    elapsed >= bound
}
