//! ObservationScope for automatic begin/complete logging
//!
//! - Logs BEGIN event on creation
//! - Logs COMPLETE or FAILED when closed
//! - Logs INCOMPLETE if dropped open (e.g. a cancelled query future)

use std::time::Instant;

use super::logger::{Logger, Severity};

/// A scope that logs begin and end events around one operation
///
/// # Usage
///
/// ```ignore
/// let scope = ObservationScope::with_fields("QUERY", &[("collection", "people")]);
/// // ... do work ...
/// scope.complete_with_fields(&[("rows", "3")]);
/// ```
///
/// Holds only owned data, so it can live across `.await` points.
pub struct ObservationScope {
    name: &'static str,
    completed: bool,
    fields: Vec<(&'static str, String)>,
    timer: Timer,
}

impl ObservationScope {
    /// Create a new observation scope
    ///
    /// Logs `{name}_BEGIN` immediately.
    pub fn new(name: &'static str) -> Self {
        Self::with_fields(name, &[])
    }

    /// Create a new observation scope with fields repeated on every line
    pub fn with_fields(name: &'static str, fields: &[(&'static str, &str)]) -> Self {
        let scope = Self {
            name,
            completed: false,
            fields: fields.iter().map(|(k, v)| (*k, v.to_string())).collect(),
            timer: Timer::new(),
        };
        scope.emit(Severity::Info, "BEGIN", &[]);
        scope
    }

    fn emit(&self, severity: Severity, suffix: &str, extra: &[(&str, &str)]) {
        let event = format!("{}_{}", self.name, suffix);
        let mut all_fields: Vec<(&str, &str)> =
            self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
        all_fields.extend(extra.iter().copied());
        Logger::log(severity, &event, &all_fields);
    }

    /// Mark the scope as successfully completed
    ///
    /// Logs `{name}_COMPLETE` at INFO level.
    pub fn complete(self) {
        self.complete_with_fields(&[]);
    }

    /// Mark the scope as successfully completed with additional fields
    pub fn complete_with_fields(mut self, extra_fields: &[(&str, &str)]) {
        self.completed = true;
        let elapsed = self.timer.elapsed_ms();
        let mut extra = vec![("elapsed_ms", elapsed.as_str())];
        extra.extend(extra_fields.iter().copied());
        self.emit(Severity::Info, "COMPLETE", &extra);
    }

    /// Mark the scope as failed with a reason
    ///
    /// Logs `{name}_FAILED` at ERROR level.
    pub fn fail(self, reason: &str) {
        self.fail_with_fields(reason, &[]);
    }

    /// Mark the scope as failed with a reason and additional fields
    pub fn fail_with_fields(mut self, reason: &str, extra_fields: &[(&str, &str)]) {
        self.completed = true;
        let mut extra = vec![("reason", reason)];
        extra.extend(extra_fields.iter().copied());
        self.emit(Severity::Error, "FAILED", &extra);
    }

    /// Check if the scope has been completed
    pub fn is_completed(&self) -> bool {
        self.completed
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.completed {
            self.emit(
                Severity::Warn,
                "INCOMPLETE",
                &[("reason", "scope dropped without completion")],
            );
        }
    }
}

/// A simple duration timer for logging elapsed time
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Create a new timer
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed milliseconds as a string
    pub fn elapsed_ms(&self) -> String {
        self.start.elapsed().as_millis().to_string()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
