//! Query Equivalence Tests
//!
//! Index-assisted execution must return exactly what a brute-force scan
//! returns, for every predicate shape:
//! - compound AND/OR/NOT
//! - LIKE/ILIKE
//! - absent and mistyped attributes

use std::collections::BTreeSet;
use std::sync::Arc;

use gridstore::index::IndexDefinition;
use gridstore::observability::MetricsRegistry;
use gridstore::planner::ScanType;
use gridstore::predicate::{Predicate, PredicateEvaluator};
use gridstore::store::{ExpiryPolicy, ManualClock, NoopListener, RecordStore, StoreContext};
use gridstore::value::JsonExtractor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn make_store(indexes: &[(&str, bool)]) -> RecordStore {
    let store = RecordStore::new(
        "people",
        Some(0),
        StoreContext {
            extractor: Arc::new(JsonExtractor),
            clock: Arc::new(ManualClock::starting_now()),
            listener: Arc::new(NoopListener),
            default_expiry: ExpiryPolicy::NONE,
            metrics: Arc::new(MetricsRegistry::new()),
        },
    );
    for (attribute, ordered) in indexes {
        store
            .create_index(&IndexDefinition::new(*attribute, *ordered))
            .unwrap();
    }
    store
}

const NAMES: [&str; 6] = ["alice", "Alan", "bob", "bianca", "carol", "al_x"];

fn random_person(rng: &mut StdRng) -> Value {
    let name = NAMES[rng.gen_range(0..NAMES.len())];
    match rng.gen_range(0..6) {
        // Different schema: no age, no active flag
        0 => json!({ "name": name, "city": "Oslo" }),
        1 => json!({ "name": name, "age": "unknown", "active": true }),
        2 => json!({ "name": name, "age": rng.gen_range(0..60) as f64 + 0.5 }),
        _ => json!({
            "name": name,
            "age": rng.gen_range(0..60),
            "active": rng.gen_bool(0.5),
        }),
    }
}

const PREDICATES: [&str; 16] = [
    "age > 30",
    "age >= 25 AND age < 40",
    "name = 'alice' AND age >= 25",
    "name = 'bob' OR age < 10",
    "NOT (age > 30)",
    "age != 20",
    "name LIKE 'al%'",
    "name ILIKE 'AL%'",
    "name LIKE 'al\\_%'",
    "name LIKE '_ob'",
    "name NOT LIKE 'b%' AND age <= 50",
    "active",
    "active AND age > 10",
    "NOT active",
    "city = 'Oslo' OR (name = 'carol' AND NOT age < 30)",
    "TRUE",
];

fn brute_force(entries: &[(String, Value)], predicate: &Predicate) -> BTreeSet<String> {
    entries
        .iter()
        .filter(|(_, v)| PredicateEvaluator::matches(predicate, v))
        .map(|(k, _)| k.clone())
        .collect()
}

fn queried(store: &RecordStore, predicate: &Predicate) -> BTreeSet<String> {
    store
        .query(predicate)
        .unwrap()
        .keys()
        .map(str::to_string)
        .collect()
}

// =============================================================================
// Equivalence
// =============================================================================

/// Indexed, unindexed and brute-force evaluation agree.
#[test]
fn test_indexed_equals_scan_for_random_data() {
    let mut rng = StdRng::seed_from_u64(42);
    let indexed = make_store(&[("name", false), ("age", true), ("active", false)]);
    let plain = make_store(&[]);

    for i in 0..300 {
        let value = random_person(&mut rng);
        indexed.put(i.to_string(), value.clone());
        plain.put(i.to_string(), value);
    }
    let entries = plain.entries();

    for text in PREDICATES {
        let predicate = Predicate::parse(text).unwrap();
        let expected = brute_force(&entries, &predicate);
        assert_eq!(queried(&indexed, &predicate), expected, "indexed: {}", text);
        assert_eq!(queried(&plain, &predicate), expected, "scan: {}", text);
    }
}

/// Same query against an unmodified store yields the same result.
#[test]
fn test_repeated_query_is_idempotent() {
    let mut rng = StdRng::seed_from_u64(7);
    let store = make_store(&[("age", true)]);
    for i in 0..50 {
        store.put(i.to_string(), random_person(&mut rng));
    }
    let predicate = Predicate::parse("age >= 25 AND name LIKE 'b%'").unwrap();
    let first = store.query(&predicate).unwrap();
    let second = store.query(&predicate).unwrap();
    assert_eq!(first.entries, second.entries);
}

// =============================================================================
// Documented Scenarios
// =============================================================================

/// `name='a' AND age>=25` over three people returns exactly key 1.
#[test]
fn test_equality_and_range_scenario() {
    let store = make_store(&[("name", false), ("age", true)]);
    store.put("1", json!({"name": "a", "age": 30}));
    store.put("2", json!({"name": "b", "age": 20}));
    store.put("3", json!({"name": "a", "age": 20}));

    let result = store
        .query(&Predicate::parse("name='a' AND age>=25").unwrap())
        .unwrap();
    assert_eq!(result.keys().collect::<Vec<_>>(), vec!["1"]);
    assert_eq!(result.scan_type, ScanType::IndexLookup);
}

/// An entry without `age` matches neither `age > 0` nor `age <= 0`, but
/// does match `NOT (age > 0)`.
#[test]
fn test_absent_attribute_edge_case() {
    for indexes in [vec![], vec![("age", true)]] {
        let store = make_store(&indexes);
        store.put("no-age", json!({"name": "x"}));

        assert!(queried(&store, &Predicate::gt("age", 0)).is_empty());
        assert!(queried(&store, &Predicate::lte("age", 0)).is_empty());
        assert_eq!(
            queried(&store, &Predicate::not(Predicate::gt("age", 0))),
            BTreeSet::from(["no-age".to_string()])
        );
    }
}

/// Range operators on an unordered index are answered by scanning.
#[test]
fn test_range_on_unordered_index_still_correct() {
    let store = make_store(&[("age", false)]);
    store.put("1", json!({"age": 10}));
    store.put("2", json!({"age": 50}));

    let result = store.query(&Predicate::gt("age", 20)).unwrap();
    assert_eq!(result.keys().collect::<Vec<_>>(), vec!["2"]);
    assert_eq!(result.scan_type, ScanType::FullScan);
}

/// Integers past `i64::MAX` compare exactly, indexed or not.
#[test]
fn test_u64_values_compare_exactly() {
    for indexes in [vec![], vec![("n", true)], vec![("n", false)]] {
        let store = make_store(&indexes);
        store.put("max", json!({"n": u64::MAX}));
        store.put("max_minus_1", json!({"n": u64::MAX - 1}));

        let predicate = Predicate::parse("n = 18446744073709551615").unwrap();
        assert_eq!(queried(&store, &predicate), BTreeSet::from(["max".to_string()]));
        let predicate = Predicate::parse("n < 18446744073709551615").unwrap();
        assert_eq!(
            queried(&store, &predicate),
            BTreeSet::from(["max_minus_1".to_string()])
        );
    }
}
