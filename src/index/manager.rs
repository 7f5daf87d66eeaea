//! Index Manager for gridstore
//!
//! Owns the secondary indexes of one record store.
//!
//! # API
//!
//! - `create_index(attribute, ordered, entries)` - Add an index and fill it
//! - `drop_index(attribute)` - Remove an index
//! - `on_put(key, old, new)` - Update indexes after a put
//! - `on_remove(key, old)` - Update indexes after a remove
//! - `candidates(attribute, op, literal)` - Keys an index says can match

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::predicate::ComparisonOp;
use crate::value::{AttributeAccessor, AttributeExtractor, AttributeValue, EntryView};

use super::btree::OrderedIndex;
use super::errors::{IndexError, IndexResult};
use super::hash::UnorderedIndex;

/// Index definition shared by every store of a collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    /// Attribute path
    pub attribute: String,
    /// Ordered (range capable) or unordered (equality only)
    #[serde(default)]
    pub ordered: bool,
}

impl IndexDefinition {
    pub fn new(attribute: impl Into<String>, ordered: bool) -> Self {
        Self {
            attribute: attribute.into(),
            ordered,
        }
    }
}

/// Index kind as seen by the planner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Ordered,
    Unordered,
}

impl IndexKind {
    pub fn from_ordered(ordered: bool) -> Self {
        if ordered {
            IndexKind::Ordered
        } else {
            IndexKind::Unordered
        }
    }

    /// Whether this kind can answer `op` exactly
    pub fn supports(&self, op: ComparisonOp) -> bool {
        match self {
            IndexKind::Ordered => true,
            IndexKind::Unordered => !op.is_range(),
        }
    }

    /// Whether this kind can narrow a LIKE prefix
    pub fn supports_prefix(&self) -> bool {
        matches!(self, IndexKind::Ordered)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKind::Ordered => "ordered",
            IndexKind::Unordered => "unordered",
        }
    }
}

/// Result of asking an index for candidate keys.
///
/// `Unknown` means "no index can answer", never "no match".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidates {
    /// Exactly the keys satisfying the clause
    Exact(BTreeSet<String>),
    /// Every matching key is in here; non-matching keys may be too
    Superset(BTreeSet<String>),
    /// No index can answer
    Unknown,
}

impl Candidates {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Candidates::Unknown)
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, Candidates::Exact(_))
    }

    pub fn keys(&self) -> Option<&BTreeSet<String>> {
        match self {
            Candidates::Exact(keys) | Candidates::Superset(keys) => Some(keys),
            Candidates::Unknown => None,
        }
    }

    pub fn into_keys(self) -> Option<BTreeSet<String>> {
        match self {
            Candidates::Exact(keys) | Candidates::Superset(keys) => Some(keys),
            Candidates::Unknown => None,
        }
    }
}

/// Snapshot of which attributes are indexed and how
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexCatalog {
    kinds: BTreeMap<String, IndexKind>,
}

impl IndexCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog from explicit definitions
    pub fn from_definitions<'a>(definitions: impl IntoIterator<Item = &'a IndexDefinition>) -> Self {
        Self {
            kinds: definitions
                .into_iter()
                .map(|d| (d.attribute.clone(), IndexKind::from_ordered(d.ordered)))
                .collect(),
        }
    }

    pub fn kind(&self, attribute: &str) -> Option<IndexKind> {
        self.kinds.get(attribute).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, IndexKind)> {
        self.kinds.iter().map(|(a, k)| (a.as_str(), *k))
    }
}

#[derive(Debug)]
enum SecondaryIndex {
    Ordered(OrderedIndex),
    Unordered(UnorderedIndex),
}

impl SecondaryIndex {
    fn new(ordered: bool) -> Self {
        if ordered {
            SecondaryIndex::Ordered(OrderedIndex::new())
        } else {
            SecondaryIndex::Unordered(UnorderedIndex::new())
        }
    }

    fn kind(&self) -> IndexKind {
        match self {
            SecondaryIndex::Ordered(_) => IndexKind::Ordered,
            SecondaryIndex::Unordered(_) => IndexKind::Unordered,
        }
    }

    fn insert(&mut self, value: AttributeValue, key: &str) {
        match self {
            SecondaryIndex::Ordered(index) => index.insert(value, key),
            SecondaryIndex::Unordered(index) => index.insert(value, key),
        }
    }

    fn remove(&mut self, value: &AttributeValue, key: &str) {
        match self {
            SecondaryIndex::Ordered(index) => index.remove(value, key),
            SecondaryIndex::Unordered(index) => {
                index.remove(value, key);
            }
        }
    }

    fn keys(&self) -> BTreeSet<String> {
        match self {
            SecondaryIndex::Ordered(index) => index.keys(),
            SecondaryIndex::Unordered(index) => index.keys(),
        }
    }

    fn entry_count(&self) -> usize {
        match self {
            SecondaryIndex::Ordered(index) => index.entry_count(),
            SecondaryIndex::Unordered(index) => index.len(),
        }
    }

    fn clear(&mut self) {
        match self {
            SecondaryIndex::Ordered(index) => index.clear(),
            SecondaryIndex::Unordered(index) => index.clear(),
        }
    }
}

/// Secondary indexes of one record store.
///
/// Callers hold the store lock around every call, so storage and indexes
/// change together.
#[derive(Debug)]
pub struct IndexManager {
    extractor: Arc<dyn AttributeExtractor>,
    indexes: BTreeMap<String, SecondaryIndex>,
}

impl IndexManager {
    /// Creates a manager with no indexes
    pub fn new(extractor: Arc<dyn AttributeExtractor>) -> Self {
        Self {
            extractor,
            indexes: BTreeMap::new(),
        }
    }

    fn extract(&self, key: &str, value: &Value, attribute: &str) -> Option<AttributeValue> {
        EntryView::new(key, value, self.extractor.as_ref()).attribute(attribute)
    }

    /// Add an index and fill it from `entries`.
    ///
    /// Returns `false` if an index of the same kind already exists.
    pub fn create_index<'a>(
        &mut self,
        attribute: &str,
        ordered: bool,
        entries: impl IntoIterator<Item = (&'a str, &'a Value)>,
    ) -> IndexResult<bool> {
        if attribute.trim().is_empty() {
            return Err(IndexError::invalid_attribute(attribute));
        }
        if let Some(existing) = self.indexes.get(attribute) {
            if existing.kind() == IndexKind::from_ordered(ordered) {
                return Ok(false);
            }
            return Err(IndexError::conflict(
                attribute,
                existing.kind() == IndexKind::Ordered,
            ));
        }

        let mut index = SecondaryIndex::new(ordered);
        for (key, value) in entries {
            if let Some(extracted) = self.extract(key, value, attribute) {
                index.insert(extracted, key);
            }
        }
        self.indexes.insert(attribute.to_string(), index);
        Ok(true)
    }

    /// Remove an index. Returns `false` if there was none.
    pub fn drop_index(&mut self, attribute: &str) -> bool {
        self.indexes.remove(attribute).is_some()
    }

    /// Update every index after `key` was set to `new` (replacing `old`).
    pub fn on_put(&mut self, key: &str, old: Option<&Value>, new: &Value) {
        let extractor = Arc::clone(&self.extractor);
        for (attribute, index) in self.indexes.iter_mut() {
            let before = old.and_then(|v| EntryView::new(key, v, extractor.as_ref()).attribute(attribute));
            let after = EntryView::new(key, new, extractor.as_ref()).attribute(attribute);
            if before == after {
                continue;
            }
            if let Some(before) = before {
                index.remove(&before, key);
            }
            if let Some(after) = after {
                index.insert(after, key);
            }
        }
    }

    /// Update every index after `key` (holding `old`) was removed.
    pub fn on_remove(&mut self, key: &str, old: &Value) {
        let extractor = Arc::clone(&self.extractor);
        for (attribute, index) in self.indexes.iter_mut() {
            if let Some(before) = EntryView::new(key, old, extractor.as_ref()).attribute(attribute) {
                index.remove(&before, key);
            }
        }
    }

    /// Keys an index says can satisfy `attribute <op> literal`.
    pub fn candidates(&self, attribute: &str, op: ComparisonOp, literal: &AttributeValue) -> Candidates {
        match self.indexes.get(attribute) {
            Some(SecondaryIndex::Ordered(index)) => Candidates::Exact(index.lookup_cmp(op, literal)),
            Some(SecondaryIndex::Unordered(index)) => match op {
                ComparisonOp::Equal => Candidates::Exact(index.find_exact(literal)),
                ComparisonOp::NotEqual => Candidates::Exact(index.find_other(literal)),
                _ => Candidates::Unknown,
            },
            None => Candidates::Unknown,
        }
    }

    /// Keys whose text value may match a LIKE pattern starting with `prefix`.
    pub fn prefix_candidates(&self, attribute: &str, prefix: &str) -> Candidates {
        match self.indexes.get(attribute) {
            Some(SecondaryIndex::Ordered(index)) => Candidates::Superset(index.lookup_prefix(prefix)),
            _ => Candidates::Unknown,
        }
    }

    /// Every key indexed under `attribute`, i.e. every entry exposing it
    pub fn indexed_keys(&self, attribute: &str) -> Option<BTreeSet<String>> {
        self.indexes.get(attribute).map(SecondaryIndex::keys)
    }

    /// Rebuild every index from scratch.
    pub fn rebuild<'a>(&mut self, entries: impl IntoIterator<Item = (&'a str, &'a Value)>) {
        for index in self.indexes.values_mut() {
            index.clear();
        }
        let extractor = Arc::clone(&self.extractor);
        for (key, value) in entries {
            let view = EntryView::new(key, value, extractor.as_ref());
            for (attribute, index) in self.indexes.iter_mut() {
                if let Some(extracted) = view.attribute(attribute) {
                    index.insert(extracted, key);
                }
            }
        }
    }

    pub fn clear(&mut self) {
        for index in self.indexes.values_mut() {
            index.clear();
        }
    }

    pub fn catalog(&self) -> IndexCatalog {
        IndexCatalog {
            kinds: self
                .indexes
                .iter()
                .map(|(attribute, index)| (attribute.clone(), index.kind()))
                .collect(),
        }
    }

    pub fn definitions(&self) -> Vec<IndexDefinition> {
        self.indexes
            .iter()
            .map(|(attribute, index)| IndexDefinition::new(attribute.clone(), index.kind() == IndexKind::Ordered))
            .collect()
    }

    /// Number of (value, key) pairs held by an index
    pub fn entry_count(&self, attribute: &str) -> Option<usize> {
        self.indexes.get(attribute).map(SecondaryIndex::entry_count)
    }

    pub fn extractor(&self) -> &Arc<dyn AttributeExtractor> {
        &self.extractor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::JsonExtractor;
    use serde_json::json;

    fn keys(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn make_manager() -> IndexManager {
        IndexManager::new(Arc::new(JsonExtractor))
    }

    fn sample_entries() -> Vec<(String, Value)> {
        vec![
            ("1".to_string(), json!({"name": "a", "age": 30})),
            ("2".to_string(), json!({"name": "b", "age": 20})),
            ("3".to_string(), json!({"name": "a", "age": 20})),
            ("4".to_string(), json!({"name": "c"})),
        ]
    }

    fn populated() -> IndexManager {
        let entries = sample_entries();
        let view = || entries.iter().map(|(k, v)| (k.as_str(), v));
        let mut manager = make_manager();
        manager.create_index("name", false, view()).unwrap();
        manager.create_index("age", true, view()).unwrap();
        manager
    }

    #[test]
    fn test_create_index_fills_from_existing_entries() {
        let manager = populated();
        assert_eq!(
            manager.candidates("name", ComparisonOp::Equal, &AttributeValue::text("a")),
            Candidates::Exact(keys(&["1", "3"]))
        );
        assert_eq!(
            manager.candidates("age", ComparisonOp::GreaterOrEqual, &AttributeValue::int(25)),
            Candidates::Exact(keys(&["1"]))
        );
        // entry 4 has no age and is simply not indexed
        assert_eq!(manager.entry_count("age"), Some(3));
    }

    #[test]
    fn test_missing_index_is_unknown_not_empty() {
        let manager = populated();
        assert_eq!(
            manager.candidates("city", ComparisonOp::Equal, &AttributeValue::text("x")),
            Candidates::Unknown
        );
        assert_eq!(
            manager.candidates("name", ComparisonOp::Equal, &AttributeValue::text("zzz")),
            Candidates::Exact(BTreeSet::new())
        );
    }

    #[test]
    fn test_unordered_index_rejects_ranges() {
        let manager = populated();
        assert!(manager
            .candidates("name", ComparisonOp::GreaterThan, &AttributeValue::text("a"))
            .is_unknown());
        assert!(manager.prefix_candidates("name", "a").is_unknown());
        assert_eq!(
            manager.candidates("name", ComparisonOp::NotEqual, &AttributeValue::text("a")),
            Candidates::Exact(keys(&["2", "4"]))
        );
    }

    #[test]
    fn test_on_put_moves_key_between_values() {
        let mut manager = populated();
        let old = json!({"name": "a", "age": 30});
        let new = json!({"name": "z", "age": 30});
        manager.on_put("1", Some(&old), &new);

        assert_eq!(
            manager.candidates("name", ComparisonOp::Equal, &AttributeValue::text("a")),
            Candidates::Exact(keys(&["3"]))
        );
        assert_eq!(
            manager.candidates("name", ComparisonOp::Equal, &AttributeValue::text("z")),
            Candidates::Exact(keys(&["1"]))
        );
    }

    #[test]
    fn test_on_put_attribute_disappears() {
        let mut manager = populated();
        manager.on_put("2", Some(&json!({"name": "b", "age": 20})), &json!({"name": "b"}));
        assert_eq!(
            manager.candidates("age", ComparisonOp::Equal, &AttributeValue::int(20)),
            Candidates::Exact(keys(&["3"]))
        );
    }

    #[test]
    fn test_on_remove() {
        let mut manager = populated();
        manager.on_remove("3", &json!({"name": "a", "age": 20}));
        assert_eq!(
            manager.candidates("name", ComparisonOp::Equal, &AttributeValue::text("a")),
            Candidates::Exact(keys(&["1"]))
        );
        assert_eq!(
            manager.candidates("age", ComparisonOp::LessOrEqual, &AttributeValue::int(20)),
            Candidates::Exact(keys(&["2"]))
        );
    }

    #[test]
    fn test_create_same_index_twice() {
        let mut manager = populated();
        assert!(!manager.create_index("age", true, std::iter::empty()).unwrap());
        let err = manager.create_index("age", false, std::iter::empty()).unwrap_err();
        assert_eq!(err.code(), crate::index::IndexErrorCode::GridIndexConflict);
        assert!(manager.create_index(" ", false, std::iter::empty()).is_err());
    }

    #[test]
    fn test_drop_index() {
        let mut manager = populated();
        assert!(manager.drop_index("age"));
        assert!(!manager.drop_index("age"));
        assert!(manager
            .candidates("age", ComparisonOp::Equal, &AttributeValue::int(20))
            .is_unknown());
        assert_eq!(manager.catalog().len(), 1);
    }

    #[test]
    fn test_key_attribute_index() {
        let entries = sample_entries();
        let mut manager = make_manager();
        manager
            .create_index("__key", true, entries.iter().map(|(k, v)| (k.as_str(), v)))
            .unwrap();
        assert_eq!(
            manager.candidates("__key", ComparisonOp::GreaterThan, &AttributeValue::text("2")),
            Candidates::Exact(keys(&["3", "4"]))
        );
    }

    #[test]
    fn test_rebuild() {
        let mut manager = populated();
        manager.clear();
        assert_eq!(manager.entry_count("name"), Some(0));
        let entries = sample_entries();
        manager.rebuild(entries.iter().map(|(k, v)| (k.as_str(), v)));
        assert_eq!(manager.entry_count("name"), Some(4));
        assert_eq!(manager.catalog().kind("age"), Some(IndexKind::Ordered));
    }
}
