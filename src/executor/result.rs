//! Result types for local plan execution

use serde_json::Value;

use crate::planner::ScanType;

/// Result of executing a plan against one store
#[derive(Debug, Clone)]
pub struct LocalResult {
    /// Matching entries ordered by key
    pub entries: Vec<(String, Value)>,
    /// Keys observed past their expiry; the store evicts them
    pub expired: Vec<String>,
    /// Number of live records the residual was evaluated against
    pub scanned: usize,
    /// Whether an index narrowed the candidates
    pub scan_type: ScanType,
}

impl LocalResult {
    pub fn new(scan_type: ScanType) -> Self {
        Self {
            entries: Vec::new(),
            expired: Vec::new(),
            scanned: 0,
            scan_type,
        }
    }

    /// Returns true if no entries matched
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of matches
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}
