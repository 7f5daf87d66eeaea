//! Observability events for gridstore
//!
//! Events are explicit and typed. Query begin/complete/failed lines come
//! from the coordinator's `ObservationScope` named `QUERY`.

use std::fmt;

use super::logger::Severity;

/// Observable events in gridstore
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Configuration loaded
    ConfigLoaded,

    // Query fan-out
    /// Sub-query attempt failed and will be retried
    SubQueryRetry,
    /// Replica gave no answer; query continues without it
    ReplicaUnavailable,
    /// Partition gave no answer; query fails
    PartitionUnreachable,

    // Store lifecycle
    /// Entry evicted past its TTL or max idle
    EntryExpired,
    /// Secondary index created
    IndexCreated,
    /// Secondary index dropped
    IndexDropped,
    /// Store warm-up from an entry loader finished
    WarmUpComplete,

    // Membership
    /// Member joined the cluster
    MemberJoined,
    /// Member left the cluster
    MemberLeft,
    /// Partition records moved to a new owner
    PartitionMigrated,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::SubQueryRetry => "SUBQUERY_RETRY",
            Event::ReplicaUnavailable => "REPLICA_UNAVAILABLE",
            Event::PartitionUnreachable => "PARTITION_UNREACHABLE",

            Event::EntryExpired => "ENTRY_EXPIRED",
            Event::IndexCreated => "INDEX_CREATED",
            Event::IndexDropped => "INDEX_DROPPED",
            Event::WarmUpComplete => "WARM_UP_COMPLETE",

            Event::MemberJoined => "MEMBER_JOINED",
            Event::MemberLeft => "MEMBER_LEFT",
            Event::PartitionMigrated => "PARTITION_MIGRATED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::EntryExpired => Severity::Trace,
            Event::SubQueryRetry | Event::ReplicaUnavailable | Event::PartitionUnreachable => {
                Severity::Warn
            }
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_string_representation() {
        let events = [
            Event::ConfigLoaded,
            Event::SubQueryRetry,
            Event::ReplicaUnavailable,
            Event::PartitionUnreachable,
            Event::EntryExpired,
            Event::IndexCreated,
            Event::IndexDropped,
            Event::WarmUpComplete,
            Event::MemberJoined,
            Event::MemberLeft,
            Event::PartitionMigrated,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert_eq!(s, s.to_uppercase());
        }
    }

    #[test]
    fn test_event_severity() {
        assert_eq!(Event::ReplicaUnavailable.severity(), Severity::Warn);
        assert_eq!(Event::MemberJoined.severity(), Severity::Info);
        assert_eq!(Event::EntryExpired.severity(), Severity::Trace);
    }

    #[test]
    fn test_event_display() {
        assert_eq!(format!("{}", Event::PartitionMigrated), "PARTITION_MIGRATED");
    }
}
