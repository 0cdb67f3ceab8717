//! Merger-tree propagation delay scenario
//!
//! Eight stimulus/relay/readout chains share a merger tree; the propagation
//! delay between the relay stage and the readout stage depends on the path
//! taken through the tree, with the central merger chain taking longest.
//! The test declares every pairwise ordering it relies on explicitly, plus
//! the one-spike-per-unit count invariant that makes first-spike delays
//! meaningful.

use spikecheck::analysis::{DelayOrderCheck, OrderConstraint};
use spikecheck::engine::{
    Connector, EngineConfig, HardwareSetup, NeuronModel, PopulationScript, RecordingKind,
    ScriptedEngine,
};
use spikecheck::recording::UnitId;
use spikecheck::runner::{run_experiment, Experiment, PopulationSpec};

const NUM_CHAINS: usize = 8;

/// Path delays through the merger tree, per chain. Chain 3 takes the full
/// central chain, chains 5 and 6 most of it, chain 1 one merger stage.
const PATH_DELAYS: [f64; NUM_CHAINS] = [5.0, 12.0, 6.0, 20.0, 5.0, 19.0, 18.0, 4.0];

fn stimulus_time(chain: usize) -> f64 {
    (chain as f64).mul_add(10.0, 10.0)
}

fn merger_tree_engine() -> ScriptedEngine {
    let relay: Vec<Vec<f64>> = (0..NUM_CHAINS)
        .map(|chain| vec![stimulus_time(chain) + 2.0])
        .collect();
    let readout: Vec<Vec<f64>> = (0..NUM_CHAINS)
        .map(|chain| vec![stimulus_time(chain) + 2.0 + PATH_DELAYS[chain]])
        .collect();
    ScriptedEngine::new()
        .with_script(1, PopulationScript::new().with_spikes(relay))
        .with_script(2, PopulationScript::new().with_spikes(readout))
}

fn merger_tree_experiment() -> Experiment {
    let config = EngineConfig {
        hardware: HardwareSetup::Wafer {
            wafer_id: 0,
            chip_indices: vec![279, 280],
        },
        ..EngineConfig::default()
    };
    Experiment::new(config, 100.0)
        .with_population(PopulationSpec::new(NUM_CHAINS, NeuronModel::SpikeSourceArray))
        .with_population(PopulationSpec::new(NUM_CHAINS, NeuronModel::IfCondExp))
        .with_population(PopulationSpec::new(NUM_CHAINS, NeuronModel::IfCondExp))
        .with_projection(0, 1, Connector::one_to_one(0.05).with_delay(0.1), None)
        .with_projection(1, 2, Connector::one_to_one(0.05).with_delay(0.1), None)
        .record(1, RecordingKind::Spikes)
        .record(2, RecordingKind::Spikes)
}

/// Pairs relay unit `i` with readout unit `i`; relay ids start after the
/// eight source units, readout ids after the relay units.
fn chain_pairs() -> Vec<(UnitId, UnitId)> {
    (0..NUM_CHAINS as UnitId)
        .map(|chain| (8 + chain, 16 + chain))
        .collect()
}

#[test]
fn path_length_orders_the_delays() {
    let mut engine = merger_tree_engine();
    let run = run_experiment(&mut engine, &merger_tree_experiment()).unwrap();

    let check = DelayOrderCheck::new(chain_pairs())
        .expect_count(1)
        .constrain_all([
            // chain 1 passes one merger stage more than the direct chains
            OrderConstraint::above(1, 0),
            OrderConstraint::above(1, 2),
            OrderConstraint::above(1, 4),
            OrderConstraint::above(1, 7),
            // so does chain 6
            OrderConstraint::above(6, 0),
            OrderConstraint::above(6, 2),
            OrderConstraint::above(6, 4),
            OrderConstraint::above(6, 7),
            // chain 5 is longer than everything except the central chain
            OrderConstraint::above(5, 0),
            OrderConstraint::above(5, 1),
            OrderConstraint::above(5, 2),
            OrderConstraint::above(5, 4),
            OrderConstraint::above(5, 6),
            OrderConstraint::above(5, 7),
            // chain 3 takes the full central merger chain
            OrderConstraint::above(3, 0),
            OrderConstraint::above(3, 1),
            OrderConstraint::above(3, 2),
            OrderConstraint::above(3, 4),
            OrderConstraint::above(3, 5),
            OrderConstraint::above(3, 6),
            OrderConstraint::above(3, 7),
        ]);

    let verdict = check.check(run.spikes(), run.spikes()).unwrap();
    assert!(verdict.is_pass(), "unexpected verdict: {verdict}");
}

#[test]
fn extracted_delays_match_the_path_delays() {
    let mut engine = merger_tree_engine();
    let run = run_experiment(&mut engine, &merger_tree_experiment()).unwrap();

    let delays = DelayOrderCheck::new(chain_pairs())
        .delays(run.spikes(), run.spikes())
        .unwrap();
    for (chain, (&measured, &expected)) in delays.iter().zip(&PATH_DELAYS).enumerate() {
        assert!(
            (measured - expected).abs() < 1e-9,
            "chain {chain}: measured {measured} ms, expected {expected} ms"
        );
    }
}

#[test]
fn an_undeclared_inversion_is_reported_with_both_pairs() {
    let mut engine = merger_tree_engine();
    let run = run_experiment(&mut engine, &merger_tree_experiment()).unwrap();

    // Deliberately wrong: the direct chain 0 is not slower than chain 3.
    let check = DelayOrderCheck::new(chain_pairs()).constrain(OrderConstraint::above(0, 3));
    let verdict = check.check(run.spikes(), run.spikes()).unwrap();
    let text = verdict.to_string();
    assert!(verdict.is_fail());
    assert!(text.contains("pair 0"), "verdict text: {text}");
    assert!(text.contains("pair 3"), "verdict text: {text}");
}
