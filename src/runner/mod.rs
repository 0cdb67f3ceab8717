//! Run orchestration
//!
//! Sequences one experiment against an engine backend: configure, build the
//! declared network, opt into recordings, run, collect recordings, teardown.
//! Teardown executes on every exit path, and recordings are extracted before
//! any checker sees the run, so a failing assertion can never leave the
//! engine half-configured for the next test. Runs are strictly sequential
//! and never retried.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::engine::{
    Connector, EngineConfig, NeuronModel, ParameterBag, RecordingKind, SimulationEngine,
    SynapseDynamics,
};
use crate::recording::{ExperimentRun, SpikeTrainSet, UnitId, VoltageTrace};
use crate::{Error, Result};

/// One population of the declared network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationSpec {
    /// Number of units
    pub size: usize,
    /// Neuron model
    pub model: NeuronModel,
    /// Model parameters forwarded to the engine
    pub params: ParameterBag,
}

impl PopulationSpec {
    /// Population with engine-default parameters.
    #[must_use]
    pub const fn new(size: usize, model: NeuronModel) -> Self {
        Self {
            size,
            model,
            params: ParameterBag::new(),
        }
    }

    /// Attach one model parameter.
    #[must_use]
    pub fn with_param(mut self, key: &str, value: serde_json::Value) -> Self {
        self.params.insert(key.to_string(), value);
        self
    }
}

/// One projection between two declared populations, by declaration index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionSpec {
    /// Index of the source population in declaration order
    pub source: usize,
    /// Index of the target population in declaration order
    pub target: usize,
    /// Connection pattern, weight and delay
    pub connector: Connector,
    /// Optional short-term plasticity mechanism
    pub dynamics: Option<SynapseDynamics>,
}

/// One recording request, by population declaration index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingRequest {
    /// Index of the population in declaration order
    pub population: usize,
    /// What to record
    pub kind: RecordingKind,
}

/// Declarative description of one experiment.
///
/// Populations are addressed by declaration order, which also fixes the
/// global unit ids the engine assigns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    /// Engine configuration for this run
    pub config: EngineConfig,
    /// Populations in declaration order
    pub populations: Vec<PopulationSpec>,
    /// Projections between declared populations
    pub projections: Vec<ProjectionSpec>,
    /// Recordings to opt into
    pub recordings: Vec<RecordingRequest>,
    /// Run duration in milliseconds
    pub duration_ms: f64,
}

impl Experiment {
    /// Experiment with no network yet.
    #[must_use]
    pub const fn new(config: EngineConfig, duration_ms: f64) -> Self {
        Self {
            config,
            populations: Vec::new(),
            projections: Vec::new(),
            recordings: Vec::new(),
            duration_ms,
        }
    }

    /// Declare the next population.
    #[must_use]
    pub fn with_population(mut self, spec: PopulationSpec) -> Self {
        self.populations.push(spec);
        self
    }

    /// Declare a projection between two declared populations.
    #[must_use]
    pub fn with_projection(
        mut self,
        source: usize,
        target: usize,
        connector: Connector,
        dynamics: Option<SynapseDynamics>,
    ) -> Self {
        self.projections.push(ProjectionSpec {
            source,
            target,
            connector,
            dynamics,
        });
        self
    }

    /// Opt a declared population into recording.
    #[must_use]
    pub fn record(mut self, population: usize, kind: RecordingKind) -> Self {
        self.recordings.push(RecordingRequest { population, kind });
        self
    }
}

/// Execute one experiment against the engine.
///
/// The engine handle is acquired with `configure` and released with
/// `teardown` on success and on every failure path. A teardown failure while
/// handling a run failure is logged and swallowed in favour of the original
/// error.
///
/// # Errors
///
/// Propagates configuration, engine and recording errors; never retries.
pub fn run_experiment<E: SimulationEngine>(
    engine: &mut E,
    experiment: &Experiment,
) -> Result<ExperimentRun> {
    let started_at = Utc::now();
    info!(
        duration_ms = experiment.duration_ms,
        populations = experiment.populations.len(),
        projections = experiment.projections.len(),
        "starting experiment run"
    );

    let outcome = drive(engine, experiment);
    match outcome {
        Ok((spikes, voltages)) => {
            engine.teardown()?;
            let ended_at = Utc::now();
            info!(units = spikes.len(), "experiment run complete");
            Ok(ExperimentRun::new(
                experiment.config.clone(),
                spikes,
                voltages,
                started_at,
                ended_at,
            ))
        }
        Err(err) => {
            if let Err(teardown_err) = engine.teardown() {
                warn!(error = %teardown_err, "engine teardown failed while handling a run failure");
            }
            Err(err)
        }
    }
}

/// Execute two experiments strictly sequentially, each in its own scoped
/// engine acquisition. This is the determinism / distortion comparison
/// pattern: the first teardown completes before the second configure, so no
/// seed or placement state can leak between the runs.
///
/// # Errors
///
/// Propagates the first failing run's error.
pub fn run_twice<E: SimulationEngine>(
    engine: &mut E,
    first: &Experiment,
    second: &Experiment,
) -> Result<(ExperimentRun, ExperimentRun)> {
    let baseline = run_experiment(engine, first)?;
    let perturbed = run_experiment(engine, second)?;
    Ok((baseline, perturbed))
}

type Recordings = (SpikeTrainSet, BTreeMap<UnitId, VoltageTrace>);

fn drive<E: SimulationEngine>(engine: &mut E, experiment: &Experiment) -> Result<Recordings> {
    engine.configure(&experiment.config)?;

    let mut handles = Vec::with_capacity(experiment.populations.len());
    for spec in &experiment.populations {
        handles.push(engine.build_population(spec.size, spec.model, &spec.params)?);
    }

    let resolve = |index: usize| {
        handles.get(index).copied().ok_or_else(|| {
            Error::Configuration(format!(
                "experiment references population {index} but only {} are declared",
                handles.len()
            ))
        })
    };

    for projection in &experiment.projections {
        engine.connect(
            resolve(projection.source)?,
            resolve(projection.target)?,
            &projection.connector,
            projection.dynamics.as_ref(),
        )?;
    }
    for request in &experiment.recordings {
        engine.enable_recording(resolve(request.population)?, request.kind)?;
    }

    engine.run(experiment.duration_ms)?;

    // Everything is pulled off the engine here, before any checker runs.
    let mut spikes = SpikeTrainSet::new();
    let mut voltages = BTreeMap::new();
    for request in &experiment.recordings {
        let handle = resolve(request.population)?;
        match request.kind {
            RecordingKind::Spikes => spikes.merge(engine.get_spikes(handle)?),
            RecordingKind::Voltage => {
                for trace in engine.get_voltage(handle)? {
                    voltages.insert(trace.unit(), trace);
                }
            }
        }
    }
    Ok((spikes, voltages))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{PopulationScript, ScriptedEngine};
    use crate::recording::VoltageTrace;

    fn source_and_target() -> Experiment {
        Experiment::new(EngineConfig::default(), 100.0)
            .with_population(PopulationSpec::new(2, NeuronModel::SpikeSourceArray))
            .with_population(PopulationSpec::new(2, NeuronModel::IfCondExp))
            .with_projection(0, 1, Connector::one_to_one(0.05), None)
            .record(1, RecordingKind::Spikes)
    }

    #[test]
    fn collects_recordings_and_releases_the_engine() {
        let mut engine = ScriptedEngine::new()
            .with_script(1, PopulationScript::new().with_spikes(vec![vec![15.0], vec![25.0]]));
        let run = run_experiment(&mut engine, &source_and_target()).unwrap();

        // Units of the second population start after the first one's ids.
        assert_eq!(run.spikes_of(2).unwrap().first_spike(), Some(15.0));
        assert_eq!(run.spikes_of(3).unwrap().first_spike(), Some(25.0));
        assert!(run.ended_at() >= run.started_at());

        // Teardown already happened, so the engine accepts a fresh configure.
        assert!(engine.configure(&EngineConfig::default()).is_ok());
    }

    #[test]
    fn undeclared_population_reference_is_a_configuration_error() {
        let experiment = Experiment::new(EngineConfig::default(), 100.0)
            .with_population(PopulationSpec::new(1, NeuronModel::IfCondExp))
            .record(7, RecordingKind::Spikes);
        let mut engine = ScriptedEngine::new();
        assert!(matches!(
            run_experiment(&mut engine, &experiment),
            Err(Error::Configuration(_))
        ));
        // The failure path still released the engine handle.
        assert!(engine.configure(&EngineConfig::default()).is_ok());
    }

    #[test]
    fn invalid_config_never_reaches_a_run() {
        let mut experiment = source_and_target();
        experiment.config.timestep_ms = -1.0;
        let mut engine = ScriptedEngine::new();
        assert!(matches!(
            run_experiment(&mut engine, &experiment),
            Err(Error::Configuration(_))
        ));
    }

    /// Engine double whose run always fails and which counts teardowns.
    struct FailingEngine {
        inner: ScriptedEngine,
        teardowns: usize,
    }

    impl SimulationEngine for FailingEngine {
        fn configure(&mut self, config: &EngineConfig) -> Result<()> {
            self.inner.configure(config)
        }
        fn build_population(
            &mut self,
            size: usize,
            model: NeuronModel,
            params: &ParameterBag,
        ) -> Result<crate::engine::PopulationId> {
            self.inner.build_population(size, model, params)
        }
        fn connect(
            &mut self,
            source: crate::engine::PopulationId,
            target: crate::engine::PopulationId,
            connector: &Connector,
            dynamics: Option<&SynapseDynamics>,
        ) -> Result<()> {
            self.inner.connect(source, target, connector, dynamics)
        }
        fn enable_recording(
            &mut self,
            population: crate::engine::PopulationId,
            kind: RecordingKind,
        ) -> Result<()> {
            self.inner.enable_recording(population, kind)
        }
        fn run(&mut self, _duration_ms: f64) -> Result<()> {
            Err(Error::Engine("hardware dropped the run".to_string()))
        }
        fn get_spikes(&self, population: crate::engine::PopulationId) -> Result<SpikeTrainSet> {
            self.inner.get_spikes(population)
        }
        fn get_voltage(&self, population: crate::engine::PopulationId) -> Result<Vec<VoltageTrace>> {
            self.inner.get_voltage(population)
        }
        fn teardown(&mut self) -> Result<()> {
            self.teardowns += 1;
            self.inner.teardown()
        }
    }

    #[test]
    fn teardown_happens_even_when_the_run_fails() {
        let mut engine = FailingEngine {
            inner: ScriptedEngine::new(),
            teardowns: 0,
        };
        let err = run_experiment(&mut engine, &source_and_target());
        assert!(matches!(err, Err(Error::Engine(_))));
        assert_eq!(engine.teardowns, 1);
    }

    #[test]
    fn run_twice_keeps_the_runs_isolated() {
        let mut engine = ScriptedEngine::new()
            .with_script(1, PopulationScript::new().with_spikes(vec![vec![15.0], vec![25.0]]));
        let experiment = source_and_target();
        let (baseline, repeat) = run_twice(&mut engine, &experiment, &experiment).unwrap();
        assert_eq!(baseline.spike_counts(), repeat.spike_counts());
    }
}
