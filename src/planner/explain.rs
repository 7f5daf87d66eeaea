//! Explain plan output
//!
//! Deterministic rendering of a plan, as text or JSON.

use std::fmt;

use serde::Serialize;

use super::errors::PlannerError;
use super::planner::{IndexLookup, LookupOp, QueryPlan};

/// One lookup as shown by explain
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExplainLookup {
    pub attribute: String,
    pub index: &'static str,
    pub operation: String,
    pub exact: bool,
}

impl ExplainLookup {
    fn from_lookup(lookup: &IndexLookup) -> Self {
        let operation = match &lookup.op {
            LookupOp::Compare { op, value } => format!("{} {}", op, value),
            LookupOp::Prefix(prefix) => format!("PREFIX '{}'", prefix.replace('\'', "''")),
        };
        Self {
            attribute: lookup.attribute.clone(),
            index: lookup.kind.as_str(),
            operation,
            exact: lookup.exact,
        }
    }
}

/// Explain plan output
#[derive(Debug, Clone, Serialize)]
pub struct ExplainPlan {
    /// Whether planning succeeded
    pub accepted: bool,
    /// Predicate as planned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,
    /// Scan type description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan: Option<&'static str>,
    /// Index lookups in execution order
    pub lookups: Vec<ExplainLookup>,
    /// Residual predicate evaluated per candidate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub residual: Option<String>,
    /// Rejection reason (if rejected)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    /// Rejection error code (if rejected)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_code: Option<&'static str>,
}

impl ExplainPlan {
    /// Creates an explain plan from a successful query plan
    pub fn from_plan(plan: &QueryPlan) -> Self {
        Self {
            accepted: true,
            predicate: Some(plan.predicate.to_string()),
            scan: Some(plan.scan_type.as_str()),
            lookups: plan.lookups.iter().map(ExplainLookup::from_lookup).collect(),
            residual: plan.residual.as_ref().map(ToString::to_string),
            rejection_reason: None,
            rejection_code: None,
        }
    }

    /// Creates an explain plan from a planning error
    pub fn from_error(err: &PlannerError) -> Self {
        Self {
            accepted: false,
            predicate: None,
            scan: None,
            lookups: Vec::new(),
            residual: None,
            rejection_reason: Some(err.message().to_string()),
            rejection_code: Some(err.code().code()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for ExplainPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== EXPLAIN PLAN ===")?;

        if self.accepted {
            writeln!(f, "Status: ACCEPTED")?;
            if let Some(predicate) = &self.predicate {
                writeln!(f, "Predicate: {}", predicate)?;
            }
            if let Some(scan) = self.scan {
                writeln!(f, "Scan Type: {}", scan)?;
            }
            if !self.lookups.is_empty() {
                writeln!(f, "Lookups:")?;
                for lookup in &self.lookups {
                    writeln!(
                        f,
                        "  - {} [{}] {}{}",
                        lookup.attribute,
                        lookup.index,
                        lookup.operation,
                        if lookup.exact { "" } else { " (narrowing)" }
                    )?;
                }
            }
            if let Some(residual) = &self.residual {
                writeln!(f, "Residual: {}", residual)?;
            }
        } else {
            writeln!(f, "Status: REJECTED")?;
            if let Some(code) = self.rejection_code {
                writeln!(f, "Error Code: {}", code)?;
            }
            if let Some(reason) = &self.rejection_reason {
                writeln!(f, "Reason: {}", reason)?;
            }
        }

        Ok(())
    }
}
