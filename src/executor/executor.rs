//! Local plan executor for gridstore
//!
//! Executes a plan against one store's records and indexes.
//!
//! Execution flow (strict order):
//! 1. Ask every index lookup for candidates, intersecting concrete sets
//! 2. Move lookups that answered `Unknown` back into the residual
//! 3. Visit candidates (or every key when nothing narrowed)
//! 4. Skip and report expired records
//! 5. Evaluate the residual against live records
//! 6. Return matches ordered by key

use std::collections::BTreeSet;

use serde_json::Value;

use crate::index::{Candidates, IndexManager};
use crate::planner::{IndexLookup, LookupOp, QueryPlan, ScanType};
use crate::predicate::{Predicate, PredicateEvaluator};
use crate::value::{AttributeExtractor, EntryView};

use super::result::LocalResult;

/// State of a key as seen by a query
#[derive(Debug, Clone, Copy)]
pub enum Visit<'a> {
    Live(&'a Value),
    /// Present but past its expiry
    Expired,
    Missing,
}

/// Storage side of a store
pub trait RecordSource {
    fn visit(&self, key: &str) -> Visit<'_>;

    /// Every stored key, expired or not
    fn all_keys(&self) -> Vec<String>;
}

/// Index side of a store
pub trait CandidateSource {
    fn lookup(&self, lookup: &IndexLookup) -> Candidates;
}

impl CandidateSource for IndexManager {
    fn lookup(&self, lookup: &IndexLookup) -> Candidates {
        match &lookup.op {
            LookupOp::Compare { op, value } => self.candidates(&lookup.attribute, *op, value),
            LookupOp::Prefix(prefix) => self.prefix_candidates(&lookup.attribute, prefix),
        }
    }
}

/// Plan executor over one store
pub struct PlanExecutor<'a, R: RecordSource, C: CandidateSource> {
    records: &'a R,
    indexes: &'a C,
    extractor: &'a dyn AttributeExtractor,
}

impl<'a, R: RecordSource, C: CandidateSource> PlanExecutor<'a, R, C> {
    pub fn new(records: &'a R, indexes: &'a C, extractor: &'a dyn AttributeExtractor) -> Self {
        Self {
            records,
            indexes,
            extractor,
        }
    }

    /// Executes a plan.
    ///
    /// Deterministic: same plan + same data = same result.
    pub fn execute(&self, plan: &QueryPlan) -> LocalResult {
        let mut candidates: Option<BTreeSet<String>> = None;
        let mut fallback = Vec::new();
        let mut lookups_used = 0;

        for lookup in &plan.lookups {
            match self.indexes.lookup(lookup) {
                Candidates::Unknown => {
                    if lookup.exact {
                        fallback.push(lookup.clause.clone());
                    }
                }
                answered => {
                    lookups_used += 1;
                    let keys = answered.into_keys().unwrap_or_default();
                    candidates = Some(match candidates {
                        None => keys,
                        Some(acc) => acc.intersection(&keys).cloned().collect(),
                    });
                }
            }
        }

        let residual = merge_residual(plan.residual.clone(), fallback);
        let scan_type = if lookups_used > 0 {
            ScanType::IndexLookup
        } else {
            ScanType::FullScan
        };

        let keys: Vec<String> = match candidates {
            Some(keys) => keys.into_iter().collect(),
            None => {
                let mut all = self.records.all_keys();
                all.sort();
                all
            }
        };

        let mut result = LocalResult::new(scan_type);
        for key in keys {
            match self.records.visit(&key) {
                Visit::Live(value) => {
                    result.scanned += 1;
                    let matched = match &residual {
                        Some(predicate) => PredicateEvaluator::matches(
                            predicate,
                            &EntryView::new(&key, value, self.extractor),
                        ),
                        None => true,
                    };
                    if matched {
                        result.entries.push((key, value.clone()));
                    }
                }
                Visit::Expired => result.expired.push(key),
                Visit::Missing => {}
            }
        }

        result
    }
}

fn merge_residual(residual: Option<Predicate>, mut fallback: Vec<Predicate>) -> Option<Predicate> {
    if fallback.is_empty() {
        return residual;
    }
    if let Some(residual) = residual {
        match residual {
            Predicate::And(operands) => fallback.extend(operands),
            other => fallback.push(other),
        }
    }
    Predicate::from_conjuncts(fallback)
}
