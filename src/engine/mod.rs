//! Abstract contract of the external simulation engine
//!
//! The engine owns membrane dynamics, plasticity and spike routing; this
//! crate only drives it. Engine-global configuration state has an explicit
//! lifecycle: [`SimulationEngine::configure`] creates it,
//! [`SimulationEngine::teardown`] destroys it (idempotently), and the
//! orchestrator enforces exactly one live instance at a time. Backends are
//! concrete types behind the [`SimulationEngine`] trait; callers select a
//! variant statically instead of looking backends up by name.

mod scripted;

pub use scripted::{PopulationScript, ScriptedEngine};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::recording::{SpikeTrainSet, VoltageTrace};
use crate::{Error, Result};

/// Engine-assigned handle for one built population.
pub type PopulationId = usize;

/// Free-form parameter bag forwarded to the engine (neuron parameters,
/// source spike times, backend-specific knobs). The engine's parameter
/// surface is a black box to this crate.
pub type ParameterBag = BTreeMap<String, serde_json::Value>;

/// Neuron model of a population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NeuronModel {
    /// Conductance-based integrate-and-fire
    IfCondExp,
    /// Adaptive exponential integrate-and-fire
    EifCondExp,
    /// Spike source replaying a fixed event list
    SpikeSourceArray,
}

/// What to record from a population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordingKind {
    /// Spike event times
    Spikes,
    /// Membrane voltage at the run timestep
    Voltage,
}

/// Hardware / topology selection for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HardwareSetup {
    /// A single chip, the default for small networks
    SingleChip,
    /// A wafer module with an explicit set of chip indices
    Wafer {
        /// Wafer module id
        wafer_id: u32,
        /// Chips participating in the run
        chip_indices: Vec<u32>,
    },
}

impl Default for HardwareSetup {
    fn default() -> Self {
        Self::SingleChip
    }
}

/// Injected stochastic perturbations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistortionParams {
    /// Relative synaptic weight distortion in `[0, 1]`; `None` disables it
    pub weight_distortion: Option<f64>,
}

impl DistortionParams {
    /// Whether any distortion is switched on.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.weight_distortion.is_some_and(|w| w > 0.0)
    }
}

/// Configuration of one engine invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Simulation timestep in milliseconds
    pub timestep_ms: f64,
    /// Acceleration factor of the emulated hardware relative to biology
    pub speedup_factor: f64,
    /// Random seeds; identical seeds must reproduce identical runs
    pub rng_seeds: Vec<u64>,
    /// Hardware / topology selection
    pub hardware: HardwareSetup,
    /// Injected distortions, empty by default
    pub distortions: DistortionParams,
    /// Backend-specific overrides forwarded verbatim
    pub overrides: ParameterBag,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timestep_ms: 0.1,
            speedup_factor: 10_000.0,
            rng_seeds: vec![123_567],
            hardware: HardwareSetup::default(),
            distortions: DistortionParams::default(),
            overrides: ParameterBag::new(),
        }
    }
}

impl EngineConfig {
    /// Validate the configuration before it reaches the engine.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for a non-positive timestep or
    /// speedup factor, an empty seed list, or a weight distortion outside
    /// `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if !(self.timestep_ms > 0.0) {
            return Err(Error::Configuration(format!(
                "timestep must be positive, got {} ms",
                self.timestep_ms
            )));
        }
        if !(self.speedup_factor > 0.0) {
            return Err(Error::Configuration(format!(
                "speedup factor must be positive, got {}",
                self.speedup_factor
            )));
        }
        if self.rng_seeds.is_empty() {
            return Err(Error::Configuration(
                "at least one random seed is required".to_string(),
            ));
        }
        if let Some(w) = self.distortions.weight_distortion {
            if !(0.0..=1.0).contains(&w) {
                return Err(Error::Configuration(format!(
                    "weight distortion must lie in [0, 1], got {w}"
                )));
            }
        }
        Ok(())
    }
}

/// Connection pattern of a projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectorKind {
    /// Unit `i` of the source connects to unit `i` of the target
    OneToOne,
    /// Every source unit connects to every target unit
    AllToAll,
}

/// Projection description: pattern plus synaptic weight and optional delay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Connector {
    /// Connection pattern
    pub kind: ConnectorKind,
    /// Synaptic weight in microsiemens
    pub weight: f64,
    /// Explicit axonal delay in milliseconds, engine default if absent
    pub delay_ms: Option<f64>,
}

impl Connector {
    /// One-to-one connector with the given weight.
    #[must_use]
    pub const fn one_to_one(weight: f64) -> Self {
        Self {
            kind: ConnectorKind::OneToOne,
            weight,
            delay_ms: None,
        }
    }

    /// All-to-all connector with the given weight.
    #[must_use]
    pub const fn all_to_all(weight: f64) -> Self {
        Self {
            kind: ConnectorKind::AllToAll,
            weight,
            delay_ms: None,
        }
    }

    /// Set an explicit axonal delay.
    #[must_use]
    pub const fn with_delay(mut self, delay_ms: f64) -> Self {
        self.delay_ms = Some(delay_ms);
        self
    }
}

/// Tsodyks-Markram short-term plasticity parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SynapseDynamics {
    /// Utilisation of synaptic efficacy per spike
    pub u: f64,
    /// Recovery time constant in milliseconds
    pub tau_rec_ms: f64,
    /// Facilitation time constant in milliseconds
    pub tau_facil_ms: f64,
}

impl SynapseDynamics {
    /// Purely depressing mechanism (no facilitation).
    #[must_use]
    pub const fn depressing(u: f64, tau_rec_ms: f64) -> Self {
        Self {
            u,
            tau_rec_ms,
            tau_facil_ms: 0.0,
        }
    }
}

/// Contract of an external simulation engine backend.
///
/// All calls are blocking; there is no overlap between two runs in the same
/// process. `teardown` must be idempotent and must release all engine-global
/// state, so a prior run's seed or placement can never leak into the next.
pub trait SimulationEngine {
    /// Acquire the engine-global state for one run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for invalid option combinations and
    /// [`Error::Engine`] if the engine is already configured.
    fn configure(&mut self, config: &EngineConfig) -> Result<()>;

    /// Build one population of `size` units.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Engine`] if called outside a configured lifecycle.
    fn build_population(
        &mut self,
        size: usize,
        model: NeuronModel,
        params: &ParameterBag,
    ) -> Result<PopulationId>;

    /// Connect two populations.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Engine`] for unknown population handles or misuse of
    /// the lifecycle.
    fn connect(
        &mut self,
        source: PopulationId,
        target: PopulationId,
        connector: &Connector,
        dynamics: Option<&SynapseDynamics>,
    ) -> Result<()>;

    /// Opt a population into recording.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Engine`] for unknown population handles or misuse of
    /// the lifecycle.
    fn enable_recording(&mut self, population: PopulationId, kind: RecordingKind) -> Result<()>;

    /// Advance simulated time by `duration_ms`, blocking until done.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Engine`] if the engine is not configured or the run
    /// fails.
    fn run(&mut self, duration_ms: f64) -> Result<()>;

    /// Retrieve the spike trains of a spike-recorded population.
    ///
    /// Every unit of the population appears in the set, silent units with an
    /// empty train.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Engine`] before `run` or for populations that were
    /// not spike-recorded.
    fn get_spikes(&self, population: PopulationId) -> Result<SpikeTrainSet>;

    /// Retrieve the voltage traces of a voltage-recorded population, one per
    /// unit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Engine`] before `run` or for populations that were
    /// not voltage-recorded.
    fn get_voltage(&self, population: PopulationId) -> Result<Vec<VoltageTrace>>;

    /// Release all engine-global state. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Engine`] only if the release itself fails.
    fn teardown(&mut self) -> Result<()>;
}
