//! Hash-based unordered index
//!
//! Equality only. Range and pattern lookups are not answered here; the
//! manager reports them as unknown so the planner falls back to a scan.

use std::collections::{BTreeSet, HashMap};

use crate::value::AttributeValue;

/// Unordered secondary index: value -> keys.
#[derive(Debug, Default)]
pub struct UnorderedIndex {
    value_to_keys: HashMap<AttributeValue, BTreeSet<String>>,
    /// Total (value, key) pairs
    entry_count: usize,
}

impl UnorderedIndex {
    pub fn new() -> Self {
        Self {
            value_to_keys: HashMap::new(),
            entry_count: 0,
        }
    }

    /// Insert a key under a value.
    pub fn insert(&mut self, value: AttributeValue, key: &str) {
        if self
            .value_to_keys
            .entry(value)
            .or_default()
            .insert(key.to_string())
        {
            self.entry_count += 1;
        }
    }

    /// Remove a key from a value.
    pub fn remove(&mut self, value: &AttributeValue, key: &str) -> bool {
        if let Some(keys) = self.value_to_keys.get_mut(value) {
            let removed = keys.remove(key);
            if removed {
                self.entry_count = self.entry_count.saturating_sub(1);
            }
            if keys.is_empty() {
                self.value_to_keys.remove(value);
            }
            removed
        } else {
            false
        }
    }

    /// Keys whose value equals `literal`.
    pub fn find_exact(&self, literal: &AttributeValue) -> BTreeSet<String> {
        self.value_to_keys.get(literal).cloned().unwrap_or_default()
    }

    /// Keys whose value differs from `literal`.
    pub fn find_other(&self, literal: &AttributeValue) -> BTreeSet<String> {
        self.value_to_keys
            .iter()
            .filter(|(value, _)| *value != literal)
            .flat_map(|(_, keys)| keys.iter().cloned())
            .collect()
    }

    /// Every indexed key
    pub fn keys(&self) -> BTreeSet<String> {
        self.value_to_keys
            .values()
            .flat_map(|keys| keys.iter().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }

    pub fn value_count(&self) -> usize {
        self.value_to_keys.len()
    }

    pub fn clear(&mut self) {
        self.value_to_keys.clear();
        self.entry_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_find_remove() {
        let mut index = UnorderedIndex::new();
        index.insert(AttributeValue::text("a"), "1");
        index.insert(AttributeValue::text("b"), "2");
        index.insert(AttributeValue::text("a"), "3");
        index.insert(AttributeValue::text("a"), "3");

        assert_eq!(index.len(), 3);
        assert_eq!(index.find_exact(&AttributeValue::text("a")).len(), 2);
        assert_eq!(index.find_other(&AttributeValue::text("a")).len(), 1);

        assert!(index.remove(&AttributeValue::text("a"), "1"));
        assert!(!index.remove(&AttributeValue::text("a"), "1"));
        assert!(index.remove(&AttributeValue::text("b"), "2"));
        assert_eq!(index.value_count(), 1);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_numeric_keys_normalized() {
        let mut index = UnorderedIndex::new();
        index.insert(AttributeValue::float(7.0), "k");
        assert!(index.find_exact(&AttributeValue::int(7)).contains("k"));
    }
}
