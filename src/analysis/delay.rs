//! First-spike delay extraction and explicit pairwise ordering
//!
//! Models the merger-tree timing checks: the propagation delay between an
//! input stage and a downstream stage depends on the path length through the
//! relay/merge structure, and a test declares every pairwise relation it
//! relies on. The checker never infers transitivity; what is not declared is
//! not checked.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::analysis::{Verdict, Violation};
use crate::recording::{SpikeTrainSet, UnitId};
use crate::{Error, Result};

/// Declared relation between the delays of two pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relation {
    /// Strictly greater (`>`)
    Above,
    /// Exactly equal (`==`)
    Equal,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Above => write!(f, "above"),
            Self::Equal => write!(f, "equal to"),
        }
    }
}

/// One declared pairwise relation between delay indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConstraint {
    /// Index of the pair on the left of the relation
    pub a: usize,
    /// Index of the pair on the right of the relation
    pub b: usize,
    /// Required relation between `delay[a]` and `delay[b]`
    pub relation: Relation,
}

impl OrderConstraint {
    /// Require `delay[a] > delay[b]`.
    #[must_use]
    pub const fn above(a: usize, b: usize) -> Self {
        Self {
            a,
            b,
            relation: Relation::Above,
        }
    }

    /// Require `delay[a] == delay[b]`.
    #[must_use]
    pub const fn equal(a: usize, b: usize) -> Self {
        Self {
            a,
            b,
            relation: Relation::Equal,
        }
    }
}

/// Delay/order invariant check over corresponding units of two stages.
///
/// Each declared pair `(upstream unit, downstream unit)` yields one delay:
/// the downstream first-spike time minus the upstream first-spike time.
/// Constraints then relate delays by pair index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DelayOrderCheck {
    pairs: Vec<(UnitId, UnitId)>,
    constraints: Vec<OrderConstraint>,
    expected_count: Option<usize>,
}

impl DelayOrderCheck {
    /// Declare the unit pairs whose delays are compared.
    #[must_use]
    pub fn new(pairs: Vec<(UnitId, UnitId)>) -> Self {
        Self {
            pairs,
            constraints: Vec::new(),
            expected_count: None,
        }
    }

    /// Add one pairwise relation.
    #[must_use]
    pub fn constrain(mut self, constraint: OrderConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Add a batch of pairwise relations.
    #[must_use]
    pub fn constrain_all(mut self, constraints: impl IntoIterator<Item = OrderConstraint>) -> Self {
        self.constraints.extend(constraints);
        self
    }

    /// Require every declared unit to have produced exactly `count` spikes,
    /// checked before any delay is extracted.
    #[must_use]
    pub const fn expect_count(mut self, count: usize) -> Self {
        self.expected_count = Some(count);
        self
    }

    /// Evaluate the check against the recordings of both stages.
    ///
    /// # Errors
    ///
    /// - [`Error::Configuration`] if a constraint references an undeclared
    ///   pair index
    /// - [`Error::CountMismatch`] if a declared unit misses the expected
    ///   spike count
    /// - [`Error::MissingSpike`] if either train of a pair is empty
    /// - [`Error::UnknownUnit`] if a declared unit was never recorded
    pub fn check(&self, upstream: &SpikeTrainSet, downstream: &SpikeTrainSet) -> Result<Verdict> {
        for constraint in &self.constraints {
            let out_of_range = constraint.a.max(constraint.b);
            if out_of_range >= self.pairs.len() {
                return Err(Error::Configuration(format!(
                    "constraint references pair {out_of_range} but only {} pairs are declared",
                    self.pairs.len()
                )));
            }
        }

        if let Some(expected) = self.expected_count {
            for &(up, down) in &self.pairs {
                check_count(upstream, up, expected)?;
                check_count(downstream, down, expected)?;
            }
        }

        let delays = self.delays(upstream, downstream)?;
        for constraint in &self.constraints {
            let (delay_a, delay_b) = (delays[constraint.a], delays[constraint.b]);
            let holds = match constraint.relation {
                Relation::Above => delay_a > delay_b,
                Relation::Equal => delay_a == delay_b,
            };
            if !holds {
                return Ok(Verdict::Fail(Violation::DelayOrder {
                    pair_a: constraint.a,
                    pair_b: constraint.b,
                    delay_a,
                    delay_b,
                    relation: constraint.relation,
                }));
            }
        }
        Ok(Verdict::Pass)
    }

    /// First-spike delay of every declared pair, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingSpike`] for a pair with an empty train and
    /// [`Error::UnknownUnit`] for an unrecorded unit.
    pub fn delays(&self, upstream: &SpikeTrainSet, downstream: &SpikeTrainSet) -> Result<Vec<f64>> {
        self.pairs
            .iter()
            .map(|&(up, down)| {
                let first_up = upstream
                    .spikes_of(up)?
                    .first_spike()
                    .ok_or(Error::MissingSpike {
                        unit: up,
                        stage: "upstream",
                    })?;
                let first_down =
                    downstream
                        .spikes_of(down)?
                        .first_spike()
                        .ok_or(Error::MissingSpike {
                            unit: down,
                            stage: "downstream",
                        })?;
                Ok(first_down - first_up)
            })
            .collect()
    }
}

fn check_count(set: &SpikeTrainSet, unit: UnitId, expected: usize) -> Result<()> {
    let actual = set.spikes_of(unit)?.len();
    if actual == expected {
        Ok(())
    } else {
        Err(Error::CountMismatch {
            unit,
            expected,
            actual,
        })
    }
}
