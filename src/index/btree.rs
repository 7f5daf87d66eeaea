//! BTreeMap-based ordered index
//!
//! Maps attribute values to the sorted set of entry keys holding them.
//! Values of different families sort apart (Bool < Number < Text), so a range
//! lookup walks the tree from the literal and stops at the family boundary.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use crate::predicate::ComparisonOp;
use crate::value::{AttributeValue, ValueFamily};

/// Ordered secondary index supporting equality, ranges and prefix narrowing.
#[derive(Debug, Default)]
pub struct OrderedIndex {
    tree: BTreeMap<AttributeValue, BTreeSet<String>>,
}

impl OrderedIndex {
    pub fn new() -> Self {
        Self {
            tree: BTreeMap::new(),
        }
    }

    /// Insert a key under a value. Idempotent.
    pub fn insert(&mut self, value: AttributeValue, key: &str) {
        self.tree.entry(value).or_default().insert(key.to_string());
    }

    /// Remove a key from a value.
    ///
    /// If the value has no more keys, removes the value entirely.
    pub fn remove(&mut self, value: &AttributeValue, key: &str) {
        if let Some(keys) = self.tree.get_mut(value) {
            keys.remove(key);
            if keys.is_empty() {
                self.tree.remove(value);
            }
        }
    }

    /// Keys whose value equals `literal`.
    pub fn lookup_eq(&self, literal: &AttributeValue) -> BTreeSet<String> {
        self.tree.get(literal).cloned().unwrap_or_default()
    }

    /// Keys whose value differs from `literal`, any family.
    pub fn lookup_ne(&self, literal: &AttributeValue) -> BTreeSet<String> {
        self.tree
            .iter()
            .filter(|(value, _)| *value != literal)
            .flat_map(|(_, keys)| keys.iter().cloned())
            .collect()
    }

    /// Keys whose value satisfies `value <op> literal`.
    ///
    /// Only values of the literal's family are visited.
    pub fn lookup_cmp(&self, op: ComparisonOp, literal: &AttributeValue) -> BTreeSet<String> {
        let family = literal.family();
        match op {
            ComparisonOp::Equal => self.lookup_eq(literal),
            ComparisonOp::NotEqual => self.lookup_ne(literal),
            ComparisonOp::GreaterThan => collect_family(
                self.tree
                    .range::<AttributeValue, _>((Bound::Excluded(literal), Bound::Unbounded)),
                family,
            ),
            ComparisonOp::GreaterOrEqual => collect_family(
                self.tree
                    .range::<AttributeValue, _>((Bound::Included(literal), Bound::Unbounded)),
                family,
            ),
            ComparisonOp::LessThan => collect_family(
                self.tree
                    .range::<AttributeValue, _>((Bound::Unbounded, Bound::Excluded(literal)))
                    .rev(),
                family,
            ),
            ComparisonOp::LessOrEqual => collect_family(
                self.tree
                    .range::<AttributeValue, _>((Bound::Unbounded, Bound::Included(literal)))
                    .rev(),
                family,
            ),
        }
    }

    /// Keys whose text value starts with `prefix`.
    pub fn lookup_prefix(&self, prefix: &str) -> BTreeSet<String> {
        let start = AttributeValue::text(prefix);
        self.tree
            .range::<AttributeValue, _>((Bound::Included(&start), Bound::Unbounded))
            .take_while(|(value, _)| matches!(value, AttributeValue::Text(s) if s.starts_with(prefix)))
            .flat_map(|(_, keys)| keys.iter().cloned())
            .collect()
    }

    /// Every indexed key
    pub fn keys(&self) -> BTreeSet<String> {
        self.tree.values().flat_map(|keys| keys.iter().cloned()).collect()
    }

    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Returns the number of distinct values
    pub fn value_count(&self) -> usize {
        self.tree.len()
    }

    /// Returns the total number of (value, key) pairs
    pub fn entry_count(&self) -> usize {
        self.tree.values().map(|keys| keys.len()).sum()
    }
}

/// Collects keys until the walk leaves `family`.
fn collect_family<'a>(
    walk: impl Iterator<Item = (&'a AttributeValue, &'a BTreeSet<String>)>,
    family: ValueFamily,
) -> BTreeSet<String> {
    walk.take_while(|(value, _)| value.family() == family)
        .flat_map(|(_, keys)| keys.iter().cloned())
        .collect()
}
