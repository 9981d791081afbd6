//! Fund allocation weights.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::error::NavsimError;

/// Allowed gap between the weight sum and 100.
pub const ALLOCATION_TOLERANCE: f64 = 0.01;

/// Share of each contribution directed to one fund, in percent (0-100).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundAllocation {
    pub fund_id: String,
    pub weight: f64,
}

impl FundAllocation {
    pub fn new(fund_id: impl Into<String>, weight: f64) -> Self {
        Self {
            fund_id: fund_id.into(),
            weight,
        }
    }
}

/// Validated allocation with weights as fractions summing to exactly 1.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedAllocation {
    pub fund_id: String,
    pub fraction: f64,
}

/// Check the allocation invariants and convert weights to fractions.
///
/// Rejects an empty list, blank or duplicate fund ids, negative or
/// non-finite weights, and weight sums further than
/// [`ALLOCATION_TOLERANCE`] from 100.
pub fn normalize(allocations: &[FundAllocation]) -> Result<Vec<NormalizedAllocation>, NavsimError> {
    if allocations.is_empty() {
        return Err(NavsimError::InvalidAllocation {
            reason: "at least one fund allocation is required".into(),
        });
    }

    let mut seen = HashSet::new();
    for alloc in allocations {
        if alloc.fund_id.trim().is_empty() {
            return Err(NavsimError::InvalidAllocation {
                reason: "fund id must not be empty".into(),
            });
        }
        if !seen.insert(alloc.fund_id.as_str()) {
            return Err(NavsimError::InvalidAllocation {
                reason: format!("duplicate fund {}", alloc.fund_id),
            });
        }
        if !alloc.weight.is_finite() || alloc.weight < 0.0 {
            return Err(NavsimError::InvalidAllocation {
                reason: format!("weight for {} must be non-negative", alloc.fund_id),
            });
        }
    }

    let total: f64 = allocations.iter().map(|a| a.weight).sum();
    if (total - 100.0).abs() > ALLOCATION_TOLERANCE {
        return Err(NavsimError::InvalidAllocation {
            reason: format!("weights sum to {total}, expected 100"),
        });
    }

    Ok(allocations
        .iter()
        .map(|a| NormalizedAllocation {
            fund_id: a.fund_id.clone(),
            fraction: a.weight / total,
        })
        .collect())
}
