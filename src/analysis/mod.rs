//! Invariant checkers over recorded spike trains and voltage traces
//!
//! Checkers are pure functions over immutable recordings. Each returns a
//! `Result<Verdict>`: an `Err` means the data never had the shape the check
//! needs (infrastructure failure), while `Ok(Verdict::Fail(..))` means the
//! experiment ran correctly and the observed behaviour violated the expected
//! invariant (scientific failure). The two never mix.

mod decay;
mod delay;
mod divergence;
pub mod window;

pub use decay::{check_monotonic_decay, windowed_stats};
pub use delay::{DelayOrderCheck, OrderConstraint, Relation};
pub use divergence::{compare_runs, Expectation};
pub use window::{extract, WindowStat};

use std::fmt;

use crate::recording::UnitId;

/// Result of a checker: pass, or fail with a structured explanation.
///
/// No partial or soft states exist; a check that cannot even be evaluated
/// surfaces as [`crate::Error`] instead of a verdict.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// The observed behaviour satisfied the invariant.
    Pass,
    /// The run completed but violated the invariant.
    Fail(Violation),
}

impl Verdict {
    /// Whether the invariant held.
    #[must_use]
    pub const fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    /// Whether the invariant was violated.
    #[must_use]
    pub const fn is_fail(&self) -> bool {
        matches!(self, Self::Fail(_))
    }

    /// The violation, if the check failed.
    #[must_use]
    pub const fn violation(&self) -> Option<&Violation> {
        match self {
            Self::Pass => None,
            Self::Fail(violation) => Some(violation),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "pass"),
            Self::Fail(violation) => write!(f, "fail: {violation}"),
        }
    }
}

/// A scientific invariant violation, naming the offending indices or units.
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    /// A windowed-statistic sequence failed to decrease strictly.
    NonMonotonic {
        /// First index `i` with `stat[i] <= stat[i + 1]`
        index: usize,
        /// Statistic at `index`
        left: f64,
        /// Statistic at `index + 1`
        right: f64,
    },
    /// A declared pairwise delay relation did not hold.
    DelayOrder {
        /// Index of the pair on the left of the relation
        pair_a: usize,
        /// Index of the pair on the right of the relation
        pair_b: usize,
        /// First-spike delay of pair `pair_a` in milliseconds
        delay_a: f64,
        /// First-spike delay of pair `pair_b` in milliseconds
        delay_b: f64,
        /// The relation that was declared
        relation: Relation,
    },
    /// Spike counts differed where two runs were expected to be identical.
    CountsDiffer {
        /// First unit whose counts disagree
        unit: UnitId,
        /// Count in the baseline run
        baseline: usize,
        /// Count in the perturbed run
        perturbed: usize,
    },
    /// Spike counts were identical where the runs were expected to diverge.
    CountsIdentical,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonMonotonic { index, left, right } => write!(
                f,
                "response is not strictly decreasing at index {index}: {left} followed by {right}"
            ),
            Self::DelayOrder {
                pair_a,
                pair_b,
                delay_a,
                delay_b,
                relation,
            } => write!(
                f,
                "delay of pair {pair_a} ({delay_a} ms) is not {relation} delay of pair {pair_b} ({delay_b} ms)"
            ),
            Self::CountsDiffer {
                unit,
                baseline,
                perturbed,
            } => write!(
                f,
                "spike counts diverge at unit {unit}: baseline {baseline}, perturbed {perturbed}"
            ),
            Self::CountsIdentical => {
                write!(f, "spike counts are identical although runs were expected to diverge")
            }
        }
    }
}
