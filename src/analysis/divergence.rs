//! Divergence comparison between two runs of the same experiment
//!
//! A two-sided stochastic-fidelity check: under identical deterministic
//! configuration a repeated run must reproduce identical per-unit spike
//! counts, and an explicitly injected distortion must break that identity.
//! Expecting the wrong side fails as a verdict; comparing mappings that do
//! not even cover the same units is a configuration error, not a scientific
//! result.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analysis::{Verdict, Violation};
use crate::recording::UnitId;
use crate::{Error, Result};

/// Expected relation between baseline and perturbed spike counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expectation {
    /// Counts must be pointwise identical (deterministic reproduction)
    Equal,
    /// At least one unit's count must differ (distortion took effect)
    Different,
}

/// Compare per-unit spike counts of two runs against an expectation.
///
/// # Errors
///
/// Returns [`Error::KeySetMismatch`] if the mappings cover different units.
pub fn compare_runs(
    baseline: &BTreeMap<UnitId, usize>,
    perturbed: &BTreeMap<UnitId, usize>,
    expect: Expectation,
) -> Result<Verdict> {
    let only_baseline: Vec<UnitId> = baseline
        .keys()
        .filter(|unit| !perturbed.contains_key(unit))
        .copied()
        .collect();
    let only_perturbed: Vec<UnitId> = perturbed
        .keys()
        .filter(|unit| !baseline.contains_key(unit))
        .copied()
        .collect();
    if !only_baseline.is_empty() || !only_perturbed.is_empty() {
        return Err(Error::KeySetMismatch {
            only_baseline,
            only_perturbed,
        });
    }

    let first_divergence = baseline.iter().find_map(|(&unit, &count)| {
        let other = perturbed[&unit];
        (count != other).then_some((unit, count, other))
    });

    Ok(match (expect, first_divergence) {
        (Expectation::Equal, Some((unit, count, other))) => Verdict::Fail(Violation::CountsDiffer {
            unit,
            baseline: count,
            perturbed: other,
        }),
        (Expectation::Different, None) => Verdict::Fail(Violation::CountsIdentical),
        _ => Verdict::Pass,
    })
}
