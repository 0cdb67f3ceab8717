//! Scripted replay backend
//!
//! A deterministic in-tree [`SimulationEngine`] used by the test suite. It
//! replays canned spike trains and voltage traces instead of simulating, but
//! honours the full engine lifecycle (configure / build / record / run /
//! teardown) and reproduces the distortion contract: with no distortion two
//! runs under the same seed are bit-identical, with weight distortion the
//! replayed trains are perturbed as a pure function of seed and unit.

use std::collections::BTreeMap;

use tracing::debug;

use super::{
    Connector, EngineConfig, NeuronModel, ParameterBag, PopulationId, RecordingKind,
    SimulationEngine, SynapseDynamics,
};
use crate::recording::{SpikeTrain, SpikeTrainSet, UnitId, VoltageTrace};
use crate::{Error, Result};

/// Canned recordings for one population, indexed by build order.
#[derive(Debug, Clone, Default)]
pub struct PopulationScript {
    spikes: Vec<Vec<f64>>,
    voltages: Vec<Vec<f64>>,
}

impl PopulationScript {
    /// Empty script: every unit stays silent.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-unit spike times replayed when the population is spike-recorded.
    #[must_use]
    pub fn with_spikes(mut self, spikes: Vec<Vec<f64>>) -> Self {
        self.spikes = spikes;
        self
    }

    /// Per-unit voltage samples (at the configured timestep, starting at the
    /// run start) replayed when the population is voltage-recorded.
    #[must_use]
    pub fn with_voltages(mut self, voltages: Vec<Vec<f64>>) -> Self {
        self.voltages = voltages;
        self
    }
}

#[derive(Debug)]
struct Population {
    base: UnitId,
    size: usize,
    record_spikes: bool,
    record_voltage: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Lifecycle {
    #[default]
    Idle,
    Configured,
    Ran,
}

/// Deterministic replay backend for tests.
///
/// Scripts are fixture data of the backend and survive teardown, so the same
/// engine instance can serve several sequential runs (the determinism /
/// distortion comparison pattern).
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    scripts: BTreeMap<PopulationId, PopulationScript>,
    state: Lifecycle,
    config: Option<EngineConfig>,
    populations: Vec<Population>,
    duration_ms: f64,
}

impl ScriptedEngine {
    /// Engine with no scripts; every population replays silence.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a script to the population built `index`-th.
    #[must_use]
    pub fn with_script(mut self, index: PopulationId, script: PopulationScript) -> Self {
        self.scripts.insert(index, script);
        self
    }

    fn configured(&self) -> Result<&EngineConfig> {
        self.config
            .as_ref()
            .ok_or_else(|| Error::Engine("engine is not configured".to_string()))
    }

    fn population(&self, id: PopulationId) -> Result<&Population> {
        self.populations
            .get(id)
            .ok_or_else(|| Error::Engine(format!("unknown population handle {id}")))
    }

    fn require_ran(&self) -> Result<()> {
        if self.state == Lifecycle::Ran {
            Ok(())
        } else {
            Err(Error::Engine(
                "recordings are only available after run()".to_string(),
            ))
        }
    }

    /// Replayed spike times of one unit, after distortion and clipping to the
    /// run duration.
    fn unit_spikes(&self, config: &EngineConfig, population: PopulationId, local: usize) -> Vec<f64> {
        let scripted = self
            .scripts
            .get(&population)
            .and_then(|script| script.spikes.get(local))
            .map_or(&[][..], Vec::as_slice);

        let times = if config.distortions.is_active() {
            let weight = config.distortions.weight_distortion.unwrap_or_default();
            distort(scripted, config.rng_seeds[0], local, weight)
        } else {
            scripted.to_vec()
        };
        times
            .into_iter()
            .filter(|&t| t < self.duration_ms)
            .collect()
    }
}

impl SimulationEngine for ScriptedEngine {
    fn configure(&mut self, config: &EngineConfig) -> Result<()> {
        if self.state != Lifecycle::Idle {
            return Err(Error::Engine(
                "engine is already configured; teardown is required before reconfiguring"
                    .to_string(),
            ));
        }
        config.validate()?;
        debug!(timestep_ms = config.timestep_ms, seeds = ?config.rng_seeds, "scripted engine configured");
        self.config = Some(config.clone());
        self.state = Lifecycle::Configured;
        Ok(())
    }

    fn build_population(
        &mut self,
        size: usize,
        model: NeuronModel,
        _params: &ParameterBag,
    ) -> Result<PopulationId> {
        self.configured()?;
        if self.state == Lifecycle::Ran {
            return Err(Error::Engine(
                "cannot build populations after run()".to_string(),
            ));
        }
        let base = self
            .populations
            .iter()
            .map(|p| p.size as UnitId)
            .sum::<UnitId>();
        let id = self.populations.len();
        debug!(id, size, ?model, base, "scripted engine built population");
        self.populations.push(Population {
            base,
            size,
            record_spikes: false,
            record_voltage: false,
        });
        Ok(id)
    }

    fn connect(
        &mut self,
        source: PopulationId,
        target: PopulationId,
        _connector: &Connector,
        _dynamics: Option<&SynapseDynamics>,
    ) -> Result<()> {
        self.configured()?;
        self.population(source)?;
        self.population(target)?;
        Ok(())
    }

    fn enable_recording(&mut self, population: PopulationId, kind: RecordingKind) -> Result<()> {
        self.configured()?;
        self.population(population)?;
        let entry = &mut self.populations[population];
        match kind {
            RecordingKind::Spikes => entry.record_spikes = true,
            RecordingKind::Voltage => entry.record_voltage = true,
        }
        Ok(())
    }

    fn run(&mut self, duration_ms: f64) -> Result<()> {
        self.configured()?;
        if !(duration_ms > 0.0) {
            return Err(Error::Configuration(format!(
                "run duration must be positive, got {duration_ms} ms"
            )));
        }
        self.duration_ms = duration_ms;
        self.state = Lifecycle::Ran;
        debug!(duration_ms, "scripted engine run complete");
        Ok(())
    }

    fn get_spikes(&self, population: PopulationId) -> Result<SpikeTrainSet> {
        self.require_ran()?;
        let config = self.configured()?;
        let entry = self.population(population)?;
        if !entry.record_spikes {
            return Err(Error::Engine(format!(
                "population {population} was not spike-recorded"
            )));
        }
        let mut set = SpikeTrainSet::new();
        for local in 0..entry.size {
            #[allow(clippy::cast_possible_truncation)]
            let unit = entry.base + local as UnitId;
            set.insert(SpikeTrain::new(
                unit,
                self.unit_spikes(config, population, local),
            ));
        }
        Ok(set)
    }

    fn get_voltage(&self, population: PopulationId) -> Result<Vec<VoltageTrace>> {
        self.require_ran()?;
        let entry = self.population(population)?;
        if !entry.record_voltage {
            return Err(Error::Engine(format!(
                "population {population} was not voltage-recorded"
            )));
        }
        let timestep_ms = self.configured()?.timestep_ms;
        let script = self.scripts.get(&population);
        (0..entry.size)
            .map(|local| {
                #[allow(clippy::cast_possible_truncation)]
                let unit = entry.base + local as UnitId;
                let samples = script
                    .and_then(|s| s.voltages.get(local))
                    .cloned()
                    .unwrap_or_default();
                VoltageTrace::new(unit, 0.0, timestep_ms, samples)
            })
            .collect()
    }

    fn teardown(&mut self) -> Result<()> {
        self.state = Lifecycle::Idle;
        self.config = None;
        self.populations.clear();
        self.duration_ms = 0.0;
        Ok(())
    }
}

/// Seeded perturbation of a scripted train: drops a seed-dependent number of
/// trailing events. Adjacent units never lose the same number of events, so a
/// two-unit population is guaranteed to break count identity under distortion
/// while remaining bit-identical between runs with the same seed.
fn distort(times: &[f64], seed: u64, local: usize, weight_distortion: f64) -> Vec<f64> {
    if times.is_empty() {
        return Vec::new();
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::cast_sign_loss)]
    let span = ((times.len() as f64 * weight_distortion).ceil() as usize)
        .max(2)
        .min(times.len().max(2));
    let dropped = (splitmix64(seed) as usize).wrapping_add(local) % span;
    let kept = times.len().saturating_sub(dropped);
    times[..kept].to_vec()
}

fn splitmix64(state: u64) -> u64 {
    let mut z = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
