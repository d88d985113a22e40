//! Coverage threshold resolution.
//!
//! The aggregate `minCoverage` and the per-metric minimums are mutually
//! exclusive inputs. Resolution fails before any file collection when both
//! are configured.

use crate::error::AggregationError;
use crate::models::ThresholdSet;
use serde::{Deserialize, Serialize};

/// Default for `minCoverage`; any other value counts as configured.
pub const MIN_COVERAGE_DEFAULT: f64 = 0.0;

/// Per-metric minimums as configured. Zero means "no minimum".
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricThresholds {
    pub lines: f64,
    pub branches: f64,
    pub instructions: f64,
}

impl MetricThresholds {
    /// Configured (strictly positive) values, in lines/branches/instructions order.
    fn configured(&self) -> Vec<(&'static str, f64)> {
        self.named()
            .into_iter()
            .filter(|(_, value)| *value > 0.0)
            .collect()
    }

    fn named(&self) -> [(&'static str, f64); 3] {
        [
            ("minLines", self.lines),
            ("minBranches", self.branches),
            ("minInstructions", self.instructions),
        ]
    }
}

/// Resolve the configured thresholds into a single rule set.
///
/// A conflict between `minCoverage` and the per-metric minimums is reported
/// before any range check, so out-of-range values in a conflicting
/// configuration still yield `ConfigurationConflict`.
pub fn resolve(
    min_coverage: f64,
    per_metric: MetricThresholds,
    fail_on_violation: bool,
) -> Result<ThresholdSet, AggregationError> {
    let aggregate_is_set = min_coverage != MIN_COVERAGE_DEFAULT;
    let conflicts = per_metric.configured();

    if aggregate_is_set && !conflicts.is_empty() {
        return Err(AggregationError::ConfigurationConflict {
            min_coverage,
            conflicts,
        });
    }

    validate_fraction("minCoverage", min_coverage)?;
    for (key, value) in per_metric.named() {
        validate_fraction(key, value)?;
    }

    let thresholds = if aggregate_is_set {
        ThresholdSet {
            min_lines: min_coverage,
            min_branches: min_coverage,
            min_instructions: min_coverage,
            fail_on_violation,
        }
    } else {
        ThresholdSet {
            min_lines: per_metric.lines,
            min_branches: per_metric.branches,
            min_instructions: per_metric.instructions,
            fail_on_violation,
        }
    };

    Ok(thresholds)
}

fn validate_fraction(key: &'static str, value: f64) -> Result<(), AggregationError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(AggregationError::InvalidThreshold { key, value })
    }
}
