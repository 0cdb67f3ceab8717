//! Error types for spikecheck
//!
//! Every variant here is a data-shape or configuration violation: the harness
//! or the engine contract was broken before any scientific question could be
//! answered. Invariant violations observed in a run that completed correctly
//! are reported through [`crate::Verdict`] instead.

use crate::recording::UnitId;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// spikecheck error types
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or contradictory engine configuration; fatal to the run
    #[error("invalid engine configuration: {0}")]
    Configuration(String),

    /// The external simulation engine signalled a failure
    #[error("simulation engine error: {0}")]
    Engine(String),

    /// A unit id was requested that was never registered for recording
    #[error("unit {0} was never registered for recording")]
    UnknownUnit(UnitId),

    /// A time window resolved to zero samples of the trace
    #[error("time window [{start} ms, {stop} ms) contains no samples")]
    EmptyWindow {
        /// Window start in milliseconds
        start: f64,
        /// Resolved window stop in milliseconds (trace end for unbounded windows)
        stop: f64,
    },

    /// Extracted statistic sequence does not match the event-time list
    #[error("expected one windowed statistic per event: {expected} events, {actual} statistics")]
    WindowCountMismatch {
        /// Number of stimulus events
        expected: usize,
        /// Number of extracted statistics
        actual: usize,
    },

    /// A delay comparison needs a first spike on both sides of a pair
    #[error("no spike recorded for {stage} unit {unit}; first-spike delay is undefined")]
    MissingSpike {
        /// The spikeless unit
        unit: UnitId,
        /// Which stage of the pair was empty (`upstream` or `downstream`)
        stage: &'static str,
    },

    /// A spike train did not contain the declared number of events
    #[error("unit {unit} produced {actual} spikes, expected {expected}")]
    CountMismatch {
        /// The offending unit
        unit: UnitId,
        /// Declared spike count
        expected: usize,
        /// Observed spike count
        actual: usize,
    },

    /// Two count mappings being compared do not cover the same units
    #[error("count mappings cover different units: {only_baseline:?} only in baseline, {only_perturbed:?} only in perturbed")]
    KeySetMismatch {
        /// Units present in the baseline mapping only
        only_baseline: Vec<UnitId>,
        /// Units present in the perturbed mapping only
        only_perturbed: Vec<UnitId>,
    },
}
