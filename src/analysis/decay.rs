//! Monotonic-response check for short-term synaptic depression
//!
//! Under repeated presynaptic stimulation a depressing synapse produces
//! post-synaptic responses of strictly decreasing amplitude. The check slices
//! the membrane trace into one window per stimulus event, reduces each window
//! to a statistic, and requires the sequence to fall strictly.

use crate::analysis::window::{extract, WindowStat};
use crate::analysis::{Verdict, Violation};
use crate::recording::{TimeWindow, VoltageTrace};
use crate::{Error, Result};

/// Extract one statistic per stimulus event.
///
/// Windows are `[event_times[i], event_times[i + 1])` for all but the last
/// event and `[event_times[last], ∞)` for the last, so every response up to
/// the end of the trace is attributed to its stimulus.
///
/// # Errors
///
/// Propagates [`Error::EmptyWindow`] from window resolution, e.g. for
/// duplicate or descending event times.
pub fn windowed_stats(
    trace: &VoltageTrace,
    event_times: &[f64],
    stat: WindowStat,
) -> Result<Vec<f64>> {
    let mut stats = Vec::with_capacity(event_times.len());
    for (i, &start) in event_times.iter().enumerate() {
        let window = match event_times.get(i + 1) {
            Some(&stop) => TimeWindow::bounded(start, stop),
            None => TimeWindow::open_ended(start),
        };
        stats.push(extract(trace, window, stat)?);
    }
    Ok(stats)
}

/// Check that the per-event statistic decreases strictly across stimuli.
///
/// # Errors
///
/// - [`Error::WindowCountMismatch`] if the extracted sequence does not have
///   one entry per event (a malformed event-time list upstream)
/// - [`Error::EmptyWindow`] propagated from extraction
pub fn check_monotonic_decay(
    trace: &VoltageTrace,
    event_times: &[f64],
    stat: WindowStat,
) -> Result<Verdict> {
    let stats = windowed_stats(trace, event_times, stat)?;
    if stats.len() != event_times.len() {
        return Err(Error::WindowCountMismatch {
            expected: event_times.len(),
            actual: stats.len(),
        });
    }

    for (index, pair) in stats.windows(2).enumerate() {
        if pair[0] <= pair[1] {
            return Ok(Verdict::Fail(Violation::NonMonotonic {
                index,
                left: pair[0],
                right: pair[1],
            }));
        }
    }
    Ok(Verdict::Pass)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Baseline trace with one peak per event, a few ms after the stimulus.
    fn trace_with_peaks(events: &[f64], peaks: &[f64]) -> VoltageTrace {
        let dt = 0.1;
        let mut samples = vec![-70.6; 2100];
        for (&event, &peak) in events.iter().zip(peaks) {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let idx = ((event + 5.0) / dt) as usize;
            samples[idx] = peak;
        }
        VoltageTrace::new(0, 0.0, dt, samples).unwrap()
    }

    const EVENTS: [f64; 5] = [10.0, 50.0, 90.0, 130.0, 170.0];

    #[test]
    fn strictly_decreasing_peaks_pass() {
        let trace = trace_with_peaks(&EVENTS, &[6.0, 4.2, 3.1, 2.5, 2.0]);
        let verdict = check_monotonic_decay(&trace, &EVENTS, WindowStat::Max).unwrap();
        assert!(verdict.is_pass());
    }

    #[test]
    fn rebound_fails_at_first_violation() {
        let trace = trace_with_peaks(&EVENTS, &[6.0, 4.2, 4.5, 2.5, 2.0]);
        let verdict = check_monotonic_decay(&trace, &EVENTS, WindowStat::Max).unwrap();
        match verdict.violation() {
            Some(Violation::NonMonotonic { index: 1, left, right }) => {
                assert_eq!(*left, 4.2);
                assert_eq!(*right, 4.5);
            }
            other => panic!("unexpected verdict: {other:?}"),
        }
    }

    #[test]
    fn plateau_counts_as_violation() {
        let trace = trace_with_peaks(&EVENTS, &[6.0, 4.2, 4.2, 2.5, 2.0]);
        let verdict = check_monotonic_decay(&trace, &EVENTS, WindowStat::Max).unwrap();
        assert!(matches!(
            verdict.violation(),
            Some(Violation::NonMonotonic { index: 1, .. })
        ));
    }

    #[test]
    fn one_stat_per_event() {
        let trace = trace_with_peaks(&EVENTS, &[6.0, 4.2, 3.1, 2.5, 2.0]);
        let stats = windowed_stats(&trace, &EVENTS, WindowStat::Max).unwrap();
        assert_eq!(stats.len(), EVENTS.len());
        assert_eq!(stats, vec![6.0, 4.2, 3.1, 2.5, 2.0]);
    }

    #[test]
    fn no_events_passes_trivially() {
        let trace = trace_with_peaks(&EVENTS, &[6.0, 4.2, 3.1, 2.5, 2.0]);
        let verdict = check_monotonic_decay(&trace, &[], WindowStat::Max).unwrap();
        assert!(verdict.is_pass());
    }

    #[test]
    fn descending_event_times_surface_as_empty_window() {
        let trace = trace_with_peaks(&EVENTS, &[6.0, 4.2, 3.1, 2.5, 2.0]);
        let err = check_monotonic_decay(&trace, &[50.0, 10.0], WindowStat::Max);
        assert!(matches!(err, Err(Error::EmptyWindow { .. })));
    }
}
