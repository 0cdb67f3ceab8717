//! Recording model: typed containers for engine output
//!
//! One engine invocation produces a [`SpikeTrainSet`] covering every unit
//! registered for spike recording (silent units keep an empty train) and zero
//! or more [`VoltageTrace`]s for units registered for voltage recording.
//! All containers are immutable after retrieval; checkers only ever borrow
//! them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::EngineConfig;
use crate::{Error, Result};

/// Logical unit identifier, stable within one run.
///
/// The engine assigns ids sequentially in population build order, so a test
/// that declares its populations knows the id of every unit it records.
pub type UnitId = u32;

/// Ordered spike event times for one logical unit.
///
/// Timestamps are in milliseconds and non-decreasing; the constructor sorts,
/// so equality is structural regardless of the order events arrived in.
/// Empty trains are valid (a silent unit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeTrain {
    unit: UnitId,
    times: Vec<f64>,
}

impl SpikeTrain {
    /// Create a spike train, sorting the event times.
    #[must_use]
    pub fn new(unit: UnitId, mut times: Vec<f64>) -> Self {
        times.sort_by(f64::total_cmp);
        Self { unit, times }
    }

    /// Create an empty train for a silent unit.
    #[must_use]
    pub const fn empty(unit: UnitId) -> Self {
        Self {
            unit,
            times: Vec::new(),
        }
    }

    /// The unit this train belongs to.
    #[must_use]
    pub const fn unit(&self) -> UnitId {
        self.unit
    }

    /// Sorted event timestamps in milliseconds.
    #[must_use]
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Number of spikes in the train.
    #[must_use]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Whether the unit stayed silent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Timestamp of the first spike, if any.
    #[must_use]
    pub fn first_spike(&self) -> Option<f64> {
        self.times.first().copied()
    }
}

/// Mapping from unit id to spike train, covering all spike-recorded units of
/// one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpikeTrainSet {
    trains: BTreeMap<UnitId, SpikeTrain>,
}

impl SpikeTrainSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a train, replacing any previous train for the same unit.
    pub fn insert(&mut self, train: SpikeTrain) {
        self.trains.insert(train.unit(), train);
    }

    /// Absorb every train of `other` into this set.
    pub fn merge(&mut self, other: Self) {
        for (unit, train) in other.trains {
            self.trains.insert(unit, train);
        }
    }

    /// Look up the train of one unit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownUnit`] if the unit was never registered for
    /// recording.
    pub fn spikes_of(&self, unit: UnitId) -> Result<&SpikeTrain> {
        self.trains.get(&unit).ok_or(Error::UnknownUnit(unit))
    }

    /// Per-unit spike counts, for divergence comparison between runs.
    #[must_use]
    pub fn counts(&self) -> BTreeMap<UnitId, usize> {
        self.trains
            .iter()
            .map(|(&unit, train)| (unit, train.len()))
            .collect()
    }

    /// Iterate over all trains in unit order.
    pub fn iter(&self) -> impl Iterator<Item = &SpikeTrain> {
        self.trains.values()
    }

    /// Number of recorded units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.trains.len()
    }

    /// Whether no unit was recorded at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trains.is_empty()
    }
}

impl FromIterator<SpikeTrain> for SpikeTrainSet {
    fn from_iter<I: IntoIterator<Item = SpikeTrain>>(iter: I) -> Self {
        let mut set = Self::new();
        for train in iter {
            set.insert(train);
        }
        set
    }
}

/// Fixed-timestep membrane voltage samples for one logical unit.
///
/// Samples are equally spaced starting at `start_ms`; the run's configured
/// timestep is baked into the trace so window arithmetic never needs the
/// engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoltageTrace {
    unit: UnitId,
    start_ms: f64,
    timestep_ms: f64,
    samples: Vec<f64>,
}

impl VoltageTrace {
    /// Create a trace from raw samples.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the timestep is not positive.
    pub fn new(unit: UnitId, start_ms: f64, timestep_ms: f64, samples: Vec<f64>) -> Result<Self> {
        if !(timestep_ms > 0.0) {
            return Err(Error::Configuration(format!(
                "voltage trace timestep must be positive, got {timestep_ms} ms"
            )));
        }
        Ok(Self {
            unit,
            start_ms,
            timestep_ms,
            samples,
        })
    }

    /// The unit this trace belongs to.
    #[must_use]
    pub const fn unit(&self) -> UnitId {
        self.unit
    }

    /// Time of the first sample in milliseconds.
    #[must_use]
    pub const fn start_ms(&self) -> f64 {
        self.start_ms
    }

    /// Sampling interval in milliseconds.
    #[must_use]
    pub const fn timestep_ms(&self) -> f64 {
        self.timestep_ms
    }

    /// Raw voltage samples.
    #[must_use]
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the trace holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Time one past the last sample, in milliseconds.
    #[must_use]
    pub fn end_ms(&self) -> f64 {
        self.timestep_ms.mul_add(self.len() as f64, self.start_ms)
    }
}

/// Half-open time interval `[start, stop)` in milliseconds.
///
/// An absent stop means "to the end of the trace".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    start_ms: f64,
    stop_ms: Option<f64>,
}

impl TimeWindow {
    /// Window with both bounds.
    #[must_use]
    pub const fn bounded(start_ms: f64, stop_ms: f64) -> Self {
        Self {
            start_ms,
            stop_ms: Some(stop_ms),
        }
    }

    /// Window from `start_ms` to the end of the trace.
    #[must_use]
    pub const fn open_ended(start_ms: f64) -> Self {
        Self {
            start_ms,
            stop_ms: None,
        }
    }

    /// Window start in milliseconds.
    #[must_use]
    pub const fn start_ms(&self) -> f64 {
        self.start_ms
    }

    /// Window stop in milliseconds, if bounded.
    #[must_use]
    pub const fn stop_ms(&self) -> Option<f64> {
        self.stop_ms
    }
}

/// The aggregate result of one engine invocation.
///
/// Owned exclusively by the orchestrator for the duration of one test and
/// immutable afterwards; checkers consume borrowed views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentRun {
    config: EngineConfig,
    spikes: SpikeTrainSet,
    voltages: BTreeMap<UnitId, VoltageTrace>,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
}

impl ExperimentRun {
    /// Assemble a run record from collected recordings.
    #[must_use]
    pub const fn new(
        config: EngineConfig,
        spikes: SpikeTrainSet,
        voltages: BTreeMap<UnitId, VoltageTrace>,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    ) -> Self {
        Self {
            config,
            spikes,
            voltages,
            started_at,
            ended_at,
        }
    }

    /// The configuration the engine ran under.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// All spike trains recorded in this run.
    #[must_use]
    pub const fn spikes(&self) -> &SpikeTrainSet {
        &self.spikes
    }

    /// Spike train of one unit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownUnit`] if the unit was not spike-recorded.
    pub fn spikes_of(&self, unit: UnitId) -> Result<&SpikeTrain> {
        self.spikes.spikes_of(unit)
    }

    /// Voltage trace of one unit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownUnit`] if the unit was not voltage-recorded.
    pub fn voltage_of(&self, unit: UnitId) -> Result<&VoltageTrace> {
        self.voltages.get(&unit).ok_or(Error::UnknownUnit(unit))
    }

    /// Per-unit spike counts of this run.
    #[must_use]
    pub fn spike_counts(&self) -> BTreeMap<UnitId, usize> {
        self.spikes.counts()
    }

    /// Wall-clock start of the engine invocation.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Wall-clock end of the engine invocation.
    #[must_use]
    pub const fn ended_at(&self) -> DateTime<Utc> {
        self.ended_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spike_train_sorts_on_construction() {
        let train = SpikeTrain::new(3, vec![42.0, 7.5, 19.0]);
        assert_eq!(train.times(), &[7.5, 19.0, 42.0]);
        assert_eq!(train.first_spike(), Some(7.5));
    }

    #[test]
    fn spike_train_sort_is_idempotent() {
        let once = SpikeTrain::new(0, vec![5.0, 1.0, 3.0]);
        let twice = SpikeTrain::new(0, once.times().to_vec());
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_train_is_valid() {
        let train = SpikeTrain::empty(9);
        assert!(train.is_empty());
        assert_eq!(train.first_spike(), None);
    }

    #[test]
    fn structural_equality_ignores_arrival_order() {
        let a = SpikeTrain::new(1, vec![1.0, 2.0, 3.0]);
        let b = SpikeTrain::new(1, vec![3.0, 1.0, 2.0]);
        assert_eq!(a, b);
    }

    #[test]
    fn spikes_of_unknown_unit_fails() {
        let set: SpikeTrainSet = [SpikeTrain::new(0, vec![1.0])].into_iter().collect();
        assert!(set.spikes_of(0).is_ok());
        assert!(matches!(set.spikes_of(5), Err(Error::UnknownUnit(5))));
    }

    #[test]
    fn counts_include_silent_units() {
        let set: SpikeTrainSet = [SpikeTrain::new(0, vec![1.0, 2.0]), SpikeTrain::empty(1)]
            .into_iter()
            .collect();
        let counts = set.counts();
        assert_eq!(counts[&0], 2);
        assert_eq!(counts[&1], 0);
    }

    #[test]
    fn voltage_trace_rejects_bad_timestep() {
        assert!(VoltageTrace::new(0, 0.0, 0.0, vec![1.0]).is_err());
        assert!(VoltageTrace::new(0, 0.0, -0.1, vec![1.0]).is_err());
    }

    #[test]
    fn voltage_trace_end_time() {
        let trace = VoltageTrace::new(0, 0.0, 0.1, vec![0.0; 1000]).unwrap();
        assert!((trace.end_ms() - 100.0).abs() < 1e-9);
    }
}
