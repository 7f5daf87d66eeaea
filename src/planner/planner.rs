//! Query planner
//!
//! Produces deterministic plans for one store.
//!
//! Lookup order (strict):
//! 1. Equality
//! 2. Not-equal
//! 3. Range
//! 4. Prefix narrowing
//!
//! Ties broken lexicographically by attribute name.

use crate::index::{IndexCatalog, IndexKind};
use crate::predicate::{ComparisonOp, Predicate};
use crate::value::AttributeValue;

use super::errors::PlannerResult;

/// Scan type used by query plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanType {
    /// At least one index lookup narrows the candidates
    IndexLookup,
    /// Every entry of the store is evaluated
    FullScan,
}

impl ScanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanType::IndexLookup => "INDEX_LOOKUP",
            ScanType::FullScan => "FULL_SCAN",
        }
    }
}

/// What an index is asked
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOp {
    /// `attribute <op> value`
    Compare {
        op: ComparisonOp,
        value: AttributeValue,
    },
    /// Text values starting with a LIKE pattern's literal prefix
    Prefix(String),
}

impl LookupOp {
    fn rank(&self) -> u8 {
        match self {
            LookupOp::Compare {
                op: ComparisonOp::Equal,
                ..
            } => 0,
            LookupOp::Compare {
                op: ComparisonOp::NotEqual,
                ..
            } => 1,
            LookupOp::Compare { .. } => 2,
            LookupOp::Prefix(_) => 3,
        }
    }
}

/// One index consultation in a plan
#[derive(Debug, Clone, PartialEq)]
pub struct IndexLookup {
    pub attribute: String,
    pub kind: IndexKind,
    pub op: LookupOp,
    /// Lookup decides `clause` on its own; otherwise `clause` is also in the residual
    pub exact: bool,
    /// The conjunct this lookup came from
    pub clause: Predicate,
}

/// Immutable query plan (no runtime state)
#[derive(Debug, Clone)]
pub struct QueryPlan {
    /// The validated predicate as given
    pub predicate: Predicate,
    pub scan_type: ScanType,
    /// Lookups whose candidate sets are intersected, in execution order
    pub lookups: Vec<IndexLookup>,
    /// Evaluated on every candidate; `None` accepts all candidates
    pub residual: Option<Predicate>,
}

impl QueryPlan {
    /// A plan that evaluates the whole predicate against every entry
    pub fn full_scan(predicate: Predicate) -> Self {
        let residual = match predicate {
            Predicate::True => None,
            ref other => Some(other.clone()),
        };
        Self {
            predicate,
            scan_type: ScanType::FullScan,
            lookups: Vec::new(),
            residual,
        }
    }

    pub fn is_full_scan(&self) -> bool {
        self.scan_type == ScanType::FullScan
    }
}

/// Query planner over one store's index catalog
pub struct QueryPlanner<'a> {
    catalog: &'a IndexCatalog,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(catalog: &'a IndexCatalog) -> Self {
        Self { catalog }
    }

    /// Plans a predicate, returning an immutable plan or a rejection.
    ///
    /// Deterministic: same predicate and catalog give the same plan.
    pub fn plan(&self, predicate: &Predicate) -> PlannerResult<QueryPlan> {
        predicate.validate()?;

        if matches!(predicate, Predicate::Or(_) | Predicate::Not(_)) || self.catalog.is_empty() {
            return Ok(QueryPlan::full_scan(predicate.clone()));
        }

        let mut lookups = Vec::new();
        let mut residual = Vec::new();

        for clause in predicate.conjuncts() {
            match self.lookup_for(clause) {
                Some(lookup) => {
                    if !lookup.exact {
                        residual.push(clause.clone());
                    }
                    lookups.push(lookup);
                }
                None => {
                    if *clause != Predicate::True {
                        residual.push(clause.clone());
                    }
                }
            }
        }

        if lookups.is_empty() {
            return Ok(QueryPlan::full_scan(predicate.clone()));
        }

        lookups.sort_by(|a, b| {
            a.op.rank()
                .cmp(&b.op.rank())
                .then_with(|| a.attribute.cmp(&b.attribute))
        });

        Ok(QueryPlan {
            predicate: predicate.clone(),
            scan_type: ScanType::IndexLookup,
            lookups,
            residual: Predicate::from_conjuncts(residual),
        })
    }

    fn lookup_for(&self, clause: &Predicate) -> Option<IndexLookup> {
        let (attribute, op, exact) = match clause {
            Predicate::Compare {
                attribute,
                op,
                value,
            } => (
                attribute,
                LookupOp::Compare {
                    op: *op,
                    value: value.clone(),
                },
                true,
            ),
            Predicate::BooleanAttribute(attribute) => (
                attribute,
                LookupOp::Compare {
                    op: ComparisonOp::Equal,
                    value: AttributeValue::Bool(true),
                },
                true,
            ),
            Predicate::Like { attribute, pattern } => {
                (attribute, LookupOp::Prefix(pattern.literal_prefix()?), false)
            }
            _ => return None,
        };

        let kind = self.catalog.kind(attribute)?;
        let supported = match &op {
            LookupOp::Compare { op, .. } => kind.supports(*op),
            LookupOp::Prefix(_) => kind.supports_prefix(),
        };
        if !supported {
            return None;
        }

        Some(IndexLookup {
            attribute: attribute.clone(),
            kind,
            op,
            exact,
            clause: clause.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexDefinition;

    fn catalog() -> IndexCatalog {
        IndexCatalog::from_definitions(&[
            IndexDefinition::new("name", false),
            IndexDefinition::new("age", true),
            IndexDefinition::new("active", false),
        ])
    }

    #[test]
    fn test_conjunction_uses_both_indexes() {
        let catalog = catalog();
        let predicate = Predicate::and(vec![Predicate::gte("age", 25), Predicate::eq("name", "a")]);
        let plan = QueryPlanner::new(&catalog).plan(&predicate).unwrap();

        assert_eq!(plan.scan_type, ScanType::IndexLookup);
        assert_eq!(plan.lookups.len(), 2);
        // equality first
        assert_eq!(plan.lookups[0].attribute, "name");
        assert_eq!(plan.lookups[1].attribute, "age");
        assert!(plan.residual.is_none());
    }

    #[test]
    fn test_unindexed_clause_stays_in_residual() {
        let catalog = catalog();
        let predicate = Predicate::and(vec![Predicate::eq("name", "a"), Predicate::eq("city", "x")]);
        let plan = QueryPlanner::new(&catalog).plan(&predicate).unwrap();

        assert_eq!(plan.lookups.len(), 1);
        assert_eq!(plan.residual, Some(Predicate::eq("city", "x")));
    }

    #[test]
    fn test_range_on_unordered_index_is_residual() {
        let catalog = catalog();
        let predicate = Predicate::gt("name", "a");
        let plan = QueryPlanner::new(&catalog).plan(&predicate).unwrap();
        assert!(plan.is_full_scan());
        assert_eq!(plan.residual, Some(predicate));
    }

    #[test]
    fn test_top_level_or_and_not_fall_back_to_scan() {
        let catalog = catalog();
        for predicate in [
            Predicate::or(vec![Predicate::eq("name", "a"), Predicate::eq("name", "b")]),
            Predicate::not(Predicate::eq("name", "a")),
        ] {
            let plan = QueryPlanner::new(&catalog).plan(&predicate).unwrap();
            assert!(plan.is_full_scan());
            assert_eq!(plan.residual, Some(predicate));
        }
    }

    #[test]
    fn test_nested_or_under_and() {
        let catalog = catalog();
        let or = Predicate::or(vec![Predicate::eq("name", "a"), Predicate::eq("name", "b")]);
        let predicate = Predicate::and(vec![Predicate::lt("age", 40), or.clone()]);
        let plan = QueryPlanner::new(&catalog).plan(&predicate).unwrap();

        assert_eq!(plan.lookups.len(), 1);
        assert_eq!(plan.lookups[0].attribute, "age");
        assert_eq!(plan.residual, Some(or));
    }

    #[test]
    fn test_like_prefix_narrows_but_stays_in_residual() {
        let catalog = IndexCatalog::from_definitions(&[IndexDefinition::new("name", true)]);
        let like = Predicate::like("name", "name3%").unwrap();
        let plan = QueryPlanner::new(&catalog).plan(&like).unwrap();

        assert_eq!(plan.lookups[0].op, LookupOp::Prefix("name3".to_string()));
        assert!(!plan.lookups[0].exact);
        assert_eq!(plan.residual, Some(like));

        let suffix = Predicate::like("name", "%name3").unwrap();
        assert!(QueryPlanner::new(&catalog).plan(&suffix).unwrap().is_full_scan());
    }

    #[test]
    fn test_boolean_attribute_uses_index() {
        let catalog = catalog();
        let plan = QueryPlanner::new(&catalog)
            .plan(&Predicate::boolean("active"))
            .unwrap();
        assert_eq!(
            plan.lookups[0].op,
            LookupOp::Compare {
                op: ComparisonOp::Equal,
                value: AttributeValue::Bool(true)
            }
        );
        assert!(plan.residual.is_none());
    }

    #[test]
    fn test_malformed_predicate_rejected() {
        let catalog = catalog();
        let err = QueryPlanner::new(&catalog)
            .plan(&Predicate::gt("active", true))
            .unwrap_err();
        assert_eq!(err.code(), crate::planner::PlannerErrorCode::GridPlanMalformedPredicate);
    }

    #[test]
    fn test_deterministic_planning() {
        let catalog = catalog();
        let predicate = Predicate::and(vec![
            Predicate::gt("age", 1),
            Predicate::eq("name", "x"),
            Predicate::ne("active", true),
        ]);
        let planner = QueryPlanner::new(&catalog);
        let first = planner.plan(&predicate).unwrap();
        for _ in 0..10 {
            assert_eq!(planner.plan(&predicate).unwrap().lookups, first.lookups);
        }
        let order: Vec<&str> = first.lookups.iter().map(|l| l.attribute.as_str()).collect();
        assert_eq!(order, vec!["name", "active", "age"]);
    }

    #[test]
    fn test_true_matches_everything() {
        let catalog = catalog();
        let plan = QueryPlanner::new(&catalog).plan(&Predicate::True).unwrap();
        assert!(plan.is_full_scan());
        assert!(plan.residual.is_none());
    }
}
