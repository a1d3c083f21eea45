//! Deterministic synthetic pupil traces.
//!
//! [`plr_trace`] generates the canonical zero-noise response used in tests
//! and demos: a flat baseline, an unchanged latency gap after light onset, a
//! linear constriction ramp down to peak constriction, a flat sustained
//! segment up to light offset and an exponential redilation towards the
//! plateau. Sizes are relative to the baseline diameter.

use crate::data::{LightStimulus, PupilTimeSeries};

/// Relative pupil size before the stimulus.
pub const BASELINE_LEVEL: f64 = 1.0;
/// Light onset time of the generated stimulus.
pub const STIMULUS_ONSET: f64 = 0.0;
/// Light offset time of the generated stimulus.
pub const STIMULUS_OFFSET: f64 = 10.0;
/// Delay between light onset and the start of constriction.
pub const LATENCY: f64 = 0.3;
/// Time of maximum constriction.
pub const PEAK_TIME: f64 = 3.3;
/// Relative pupil size at maximum constriction.
pub const PEAK_LEVEL: f64 = 0.55;
/// Scale `s` of the redilation exponential.
pub const REDILATION_SCALE: f64 = 0.45;
/// Rate `k` of the redilation exponential.
pub const REDILATION_RATE: f64 = -0.4;
/// Plateau `p` the redilation relaxes towards.
pub const PLATEAU_LEVEL: f64 = 1.0;

/// First sample time of the generated trace.
pub const TRACE_START: f64 = -10.0;
/// Last sample time of the generated trace.
pub const TRACE_END: f64 = 40.0;

/// Piecewise response value at time `t`.
pub fn response_at(t: f64) -> f64 {
    let constriction_start = STIMULUS_ONSET + LATENCY;
    if t < constriction_start {
        BASELINE_LEVEL
    } else if t < PEAK_TIME {
        BASELINE_LEVEL
            + (PEAK_LEVEL - BASELINE_LEVEL) * (t - constriction_start)
                / (PEAK_TIME - constriction_start)
    } else if t < STIMULUS_OFFSET {
        PEAK_LEVEL
    } else {
        -REDILATION_SCALE * f64::exp(REDILATION_RATE * (t - STIMULUS_OFFSET)) + PLATEAU_LEVEL
    }
}

/// Generate the canonical trace sampled every `sample_period` seconds, with
/// the light stimulus attached.
pub fn plr_trace(sample_period: f64) -> PupilTimeSeries {
    assert!(
        sample_period > 0.0 && sample_period.is_finite(),
        "sample_period must be positive and finite"
    );
    let n = ((TRACE_END - TRACE_START) / sample_period).floor() as usize + 1;
    let t: Vec<f64> = (0..n).map(|i| TRACE_START + i as f64 * sample_period).collect();
    let size: Vec<f64> = t.iter().map(|&ti| response_at(ti)).collect();
    PupilTimeSeries::new(t, size)
        .expect("generated time grid is strictly increasing")
        .with_stimulus(
            LightStimulus::new(STIMULUS_ONSET, STIMULUS_OFFSET)
                .expect("generated stimulus interval is ordered"),
        )
}
