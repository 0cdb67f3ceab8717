//! Windowed statistic extraction over fixed-timestep voltage traces
//!
//! Window bounds resolve to sample indices via `floor(time / timestep)`, the
//! way fixed-timestep sampled data must be read: exact reductions over an
//! index range, no smoothing, interpolation or resampling. IEEE float
//! semantics apply to the reductions themselves.

use serde::{Deserialize, Serialize};

use crate::recording::{TimeWindow, VoltageTrace};
use crate::{Error, Result};

/// Reduction applied to the samples inside a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowStat {
    /// Maximum sample value
    Max,
    /// Arithmetic mean of the samples
    Mean,
}

/// Reduce the samples of `trace` inside `window` with `stat`.
///
/// An unbounded window stop maps to the trace length. Bounds before the start
/// of the trace clamp to its first sample.
///
/// # Errors
///
/// Returns [`Error::EmptyWindow`] if the resolved index range contains zero
/// samples (start at or past stop, or the window lies entirely outside the
/// trace).
pub fn extract(trace: &VoltageTrace, window: TimeWindow, stat: WindowStat) -> Result<f64> {
    let (lo, hi) = resolve(trace, window)?;
    let samples = &trace.samples()[lo..hi];
    Ok(match stat {
        WindowStat::Max => samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        #[allow(clippy::cast_precision_loss)]
        WindowStat::Mean => samples.iter().sum::<f64>() / samples.len() as f64,
    })
}

/// Resolve a time window to a non-empty sample index range.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn resolve(trace: &VoltageTrace, window: TimeWindow) -> Result<(usize, usize)> {
    let len = trace.len();
    let to_index = |t: f64| -> i64 { ((t - trace.start_ms()) / trace.timestep_ms()).floor() as i64 };

    let lo = to_index(window.start_ms()).clamp(0, len as i64) as usize;
    let hi = window
        .stop_ms()
        .map_or(len as i64, to_index)
        .clamp(0, len as i64) as usize;

    if lo >= hi {
        return Err(Error::EmptyWindow {
            start: window.start_ms(),
            stop: window.stop_ms().unwrap_or_else(|| trace.end_ms()),
        });
    }
    Ok((lo, hi))
}
