//! Rolling filters and rate-of-change guards applied before fitting.
//!
//! All functions are free functions over [`PupilTimeSeries`] and return a
//! new series; the input is never mutated. Masked (rejected) samples become
//! NaN sizes so the time grid stays intact.

use crate::array_stats::{diff, diff_n, nanmean, nanmedian};
use crate::data::PupilTimeSeries;
use crate::error::Error;

use ndarray::Array1;

/// Apply `reducer` over a centered rolling window.
///
/// The window covers `time_window / mean(dt)` samples rounded down; an even
/// count is bumped to the next odd one (with a warning) so the window stays
/// centered. Windows are truncated at the edges of the series.
pub fn rolling_filter(
    series: &PupilTimeSeries,
    reducer: impl Fn(&[f64]) -> f64,
    time_window: f64,
) -> Result<PupilTimeSeries, Error> {
    let size = series.size();
    let dt = diff(series.time());
    let mean_dt = nanmean(&dt).unwrap_or(f64::NAN);
    let mut window_size = if mean_dt.is_finite() && mean_dt > 0.0 {
        (time_window / mean_dt) as usize
    } else {
        0
    };
    if window_size < 1 {
        return Err(Error::FilterWindowTooShort { samples: window_size });
    }
    if window_size % 2 == 0 {
        window_size += 1;
        log::warn!(
            "rolling window covers an even number of samples, widened to {} samples ({} s) to keep it centered",
            window_size,
            window_size as f64 * mean_dt
        );
    }

    let half = window_size / 2;
    let slice = size.as_slice().expect("size array is contiguous");
    let filtered: Array1<f64> = (0..slice.len())
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = usize::min(slice.len(), i + half + 1);
            reducer(&slice[start..end])
        })
        .collect();

    let mut out = PupilTimeSeries::new(series.time().to_owned(), filtered)?;
    if let Some(&stimulus) = series.stimulus() {
        out = out.with_stimulus(stimulus);
    }
    if let Ok(blinks) = series.blinks() {
        out = out.with_blinks(blinks.iter().copied());
    }
    Ok(out)
}

/// Rolling NaN-aware mean over `time_window` seconds.
pub fn rolling_mean(series: &PupilTimeSeries, time_window: f64) -> Result<PupilTimeSeries, Error> {
    rolling_filter(series, |window| nanmean(window).unwrap_or(f64::NAN), time_window)
}

/// Rolling NaN-aware median over `time_window` seconds.
pub fn rolling_median(
    series: &PupilTimeSeries,
    time_window: f64,
) -> Result<PupilTimeSeries, Error> {
    rolling_filter(series, |window| nanmedian(window).unwrap_or(f64::NAN), time_window)
}

/// Rate of change of the size trace using `n_back`-th iterated differences.
///
/// The first `n_back` entries are NaN, the rest are `Δⁿsize / Δⁿtime`.
pub fn rate_of_change(series: &PupilTimeSeries, n_back: usize) -> Array1<f64> {
    let dt = diff_n(series.time(), n_back);
    let ds = diff_n(series.size(), n_back);
    let mut out = Array1::from_elem(series.len(), f64::NAN);
    for (i, (ds, dt)) in ds.iter().zip(dt.iter()).enumerate() {
        out[i + n_back] = ds / dt;
    }
    out
}

/// Mask samples whose absolute rate of change exceeds `max_rate`.
///
/// Rates of every order `1..=n_back` are checked; a NaN rate keeps the
/// sample. When a `[start_time, end_time]` range is given, samples outside
/// it are masked as well.
pub fn limit_rate_of_change(
    series: &PupilTimeSeries,
    max_rate: f64,
    n_back: usize,
    start_time: Option<f64>,
    end_time: Option<f64>,
) -> PupilTimeSeries {
    let start_time = start_time.unwrap_or(f64::NEG_INFINITY);
    let end_time = end_time.unwrap_or(f64::INFINITY);

    let mut keep = vec![true; series.len()];
    for order in 1..=n_back {
        let rate = rate_of_change(series, order);
        for (keep, &rate) in keep.iter_mut().zip(rate.iter()) {
            if !rate.is_nan() && rate.abs() > max_rate {
                *keep = false;
            }
        }
    }

    let size: Array1<f64> = series
        .time()
        .iter()
        .zip(series.size().iter())
        .zip(keep.iter())
        .map(|((&t, &s), &keep)| {
            if keep && t >= start_time && t <= end_time {
                s
            } else {
                f64::NAN
            }
        })
        .collect();

    let mut out = PupilTimeSeries::new(series.time().to_owned(), size)
        .expect("time grid is unchanged and already validated");
    if let Some(&stimulus) = series.stimulus() {
        out = out.with_stimulus(stimulus);
    }
    if let Ok(blinks) = series.blinks() {
        out = out.with_blinks(blinks.iter().copied());
    }
    out
}
