//! Observability subsystem for gridstore
//!
//! This module provides:
//! - Structured logging (JSON lines on stderr)
//! - Counter metrics
//! - Lifecycle event tracing
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on query results
//! 3. Deterministic output
//!
//! # Usage
//!
//! ```ignore
//! use gridstore::observability::{log_event, Event, MetricsRegistry, ObservationScope};
//!
//! log_event(Event::MemberJoined, &[("member", "node-2")]);
//!
//! let metrics = MetricsRegistry::new();
//! metrics.increment_queries_executed();
//!
//! let scope = ObservationScope::new("WARM_UP");
//! // ... do work ...
//! scope.complete();
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::{ObservationScope, Timer};

/// Log a lifecycle event at its own severity
pub fn log_event(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event() {
        // This just verifies no panic
        log_event(Event::ConfigLoaded, &[("path", "/tmp/grid.json")]);
        log_event(Event::ReplicaUnavailable, &[]);
    }
}
