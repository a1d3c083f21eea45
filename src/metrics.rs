//! Scalar summaries of a pupil response.
//!
//! Metrics follow Adhikari et al. (2015), table 2. They are thin reductions
//! over the read interface of [`PupilTimeSeries`] and
//! [`CompositeFit`](crate::CompositeFit); none of them mutates its input.
//! Several table entries are deliberately unimplemented and fail with
//! [`Error::NotImplemented`] instead of returning a misleading number.
//!
//! | Metric               | Description                                      |
//! |----------------------|--------------------------------------------------|
//! | baseline             | average diameter over the prestimulus period     |
//! | peak constriction    | minimum size during light presentation           |
//! | time to peak         | time from onset to peak constriction             |
//! | PIPR window / 6 s    | mean size in a window after light offset         |
//! | transient PLR        | unimplemented                                    |
//! | PLR latency          | unimplemented                                    |
//! | constriction velocity| unimplemented                                    |
//! | pupil escape         | unimplemented                                    |
//! | redilation velocity  | unimplemented                                    |
//! | plateau              | unimplemented                                    |
//! | AUC early / late     | unimplemented                                    |
//! | PIPR duration        | unimplemented                                    |
//! | net PIPR             | unimplemented                                    |

use crate::array_stats::{nanargmin, nanmean, nanmin};
use crate::composite::CompositeFit;
use crate::data::PupilTimeSeries;
use crate::error::Error;

use itertools::izip;

/// Conventional prestimulus period used for the baseline average.
pub const DEFAULT_BASELINE_DURATION: f64 = 10.0;

/// Average size over `start <= t <= end`, skipping NaN samples.
///
/// Warns when the window reaches beyond the sampled span; fails when the
/// window contains no sample at all.
pub fn average_size(series: &PupilTimeSeries, start: f64, end: f64) -> Result<f64, Error> {
    let t = series.time();
    if let (Some(&first), Some(&last)) = (t.first(), t.last()) {
        if first > start {
            log::warn!("start time {start} is before the first data point {first}");
        }
        if last < end {
            log::warn!("end time {end} is after the last data point {last}");
        }
    }
    let selected: Vec<f64> = izip!(t.iter(), series.size().iter())
        .filter(|&(&ti, _)| ti >= start && ti <= end)
        .map(|(_, &si)| si)
        .collect();
    if selected.is_empty() {
        return Err(Error::EmptyWindow { start, end });
    }
    Ok(nanmean(&selected).unwrap_or(f64::NAN))
}

/// Baseline pupil diameter: average over `duration` seconds before light
/// onset. Requires the stimulus.
pub fn baseline(series: &PupilTimeSeries, duration: f64) -> Result<f64, Error> {
    let onset = series.require_stimulus()?.start();
    average_size(series, onset - duration, onset)
}

/// Peak constriction amplitude: minimum size during light presentation.
///
/// The sizes are assumed to be already relative to the baseline diameter.
pub fn peak_constriction(series: &PupilTimeSeries) -> Result<f64, Error> {
    log::warn!("peak constriction assumes the sizes are already relative to the baseline");
    let (onset, offset) = series.require_stimulus()?.interval();
    let during = series.trimmed(onset, offset);
    if during.is_empty() {
        return Err(Error::EmptyWindow {
            start: onset,
            end: offset,
        });
    }
    Ok(nanmin(during.size()).unwrap_or(f64::NAN))
}

/// Time from light onset to peak constriction.
pub fn time_to_peak(series: &PupilTimeSeries) -> Result<f64, Error> {
    let (onset, offset) = series.require_stimulus()?.interval();
    let during = series.trimmed(onset, offset);
    let peak_index = nanargmin(during.size()).ok_or(Error::EmptyWindow {
        start: onset,
        end: offset,
    })?;
    log::warn!("time to peak does not account for the pupil escape");
    Ok(during.time()[peak_index] - onset)
}

/// Mean size over `[offset + start, offset + end]` seconds after light
/// offset.
pub fn pipr_window(series: &PupilTimeSeries, start: f64, end: f64) -> Result<f64, Error> {
    let offset = series.require_stimulus()?.end();
    average_size(series, offset + start, offset + end)
}

/// The 6 s PIPR amplitude: mean size 5.5–6.5 s after light offset.
pub fn pipr_6s(series: &PupilTimeSeries) -> Result<f64, Error> {
    pipr_window(series, 5.5, 6.5)
}

/// Transient PLR: peak change 180–500 ms after light onset.
pub fn transient_plr(_series: &PupilTimeSeries) -> Result<f64, Error> {
    Err(Error::NotImplemented("the transient PLR metric"))
}

/// PLR latency: time to 1 % constriction.
pub fn plr_latency(_series: &PupilTimeSeries) -> Result<f64, Error> {
    Err(Error::NotImplemented("the PLR latency metric"))
}

/// Constriction velocity: gradient of the linear model at light onset.
pub fn constriction_velocity(_fit: &CompositeFit) -> Result<f64, Error> {
    Err(Error::NotImplemented("the constriction velocity metric"))
}

/// Pupil escape: gradient of the linear model during light stimulation.
pub fn pupil_escape(_fit: &CompositeFit) -> Result<f64, Error> {
    Err(Error::NotImplemented("the pupil escape metric"))
}

/// Redilation velocity: rate constant of the exponential model.
pub fn redilation_velocity(_fit: &CompositeFit) -> Result<f64, Error> {
    Err(Error::NotImplemented("the redilation velocity metric"))
}

/// Plateau PIPR: plateau of the exponential model.
pub fn plateau(_fit: &CompositeFit) -> Result<f64, Error> {
    Err(Error::NotImplemented("the plateau PIPR metric"))
}

/// AUC over 0–10 s after light offset.
pub fn auc_early(_series: &PupilTimeSeries) -> Result<f64, Error> {
    Err(Error::NotImplemented("the early AUC metric"))
}

/// AUC over 10–30 s after light offset.
pub fn auc_late(_series: &PupilTimeSeries) -> Result<f64, Error> {
    Err(Error::NotImplemented("the late AUC metric"))
}

/// PIPR duration: time to return to baseline after light offset.
pub fn pipr_duration(_series: &PupilTimeSeries) -> Result<f64, Error> {
    Err(Error::NotImplemented("the PIPR duration metric"))
}

/// Net PIPR: difference between two wavelengths in a corresponding metric.
pub fn net_pipr(
    _series_465nm: &PupilTimeSeries,
    _series_637nm: &PupilTimeSeries,
) -> Result<f64, Error> {
    Err(Error::NotImplemented("the net PIPR metric"))
}
