//! # spikecheck: invariant checking for neuromorphic simulator tests
//!
//! `spikecheck` is the assertion and signal-analysis layer shared by the
//! regression and system tests of a simulated neuromorphic hardware backend.
//! The tests configure a spiking network, drive a run through an external
//! simulation engine, and inspect the resulting spike trains and membrane
//! voltage traces. This crate owns the reusable part of that pipeline:
//!
//! - typed recording containers ([`recording`]),
//! - windowed statistics over fixed-timestep traces ([`analysis::window`]),
//! - timing, plasticity and stochastic-fidelity checkers ([`analysis`]),
//! - a run orchestrator with guaranteed engine teardown ([`runner`]).
//!
//! Infrastructure problems (a missing unit, an empty window, mismatched key
//! sets) surface as [`Error`]; a run that completed but violated the expected
//! invariant surfaces as [`Verdict::Fail`]. Reports can therefore separate
//! "the harness broke" from "the system under test is wrong".
//!
//! ## Example
//!
//! ```rust
//! use spikecheck::analysis::{check_monotonic_decay, WindowStat};
//! use spikecheck::recording::VoltageTrace;
//!
//! # fn main() -> spikecheck::Result<()> {
//! // A membrane trace sampled at 0.1 ms with EPSP peaks of decreasing height.
//! let mut samples = vec![-70.6; 2000];
//! for (i, peak) in [-64.6, -66.4, -67.5, -68.1, -68.6].iter().enumerate() {
//!     samples[150 + i * 400] = *peak;
//! }
//! let trace = VoltageTrace::new(0, 0.0, 0.1, samples)?;
//!
//! let events = [10.0, 50.0, 90.0, 130.0, 170.0];
//! let verdict = check_monotonic_decay(&trace, &events, WindowStat::Max)?;
//! assert!(verdict.is_pass());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod analysis;
pub mod engine;
pub mod error;
pub mod recording;
pub mod runner;

pub use analysis::{Verdict, Violation};
pub use error::{Error, Result};
