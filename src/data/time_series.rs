use crate::data::blinks::Blink;
use crate::data::light_stimulus::LightStimulus;
use crate::error::Error;

use itertools::izip;
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

/// A single pupil-diameter trace: ordered `(time, size)` samples with an
/// optional light stimulus and an optional blink list.
///
/// Time must be finite and strictly increasing; sizes may contain NaN, which
/// every consumer treats as a missing sample. All transformations
/// ([`trimmed`](Self::trimmed), [`interpolated`](Self::interpolated), ...)
/// return a new owned series and leave `self` untouched.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PupilTimeSeries {
    t: Array1<f64>,
    size: Array1<f64>,
    stimulus: Option<LightStimulus>,
    blinks: Option<Vec<Blink>>,
}

/// Time must be finite, sorted and free of duplicates.
pub(crate) fn check_time(t: ArrayView1<f64>) -> Result<(), Error> {
    if t.iter().any(|x| !x.is_finite()) {
        return Err(Error::NonFiniteTime);
    }
    for (&a, &b) in t.iter().zip(t.iter().skip(1)) {
        if b < a {
            return Err(Error::UnsortedTime);
        }
        if b == a {
            return Err(Error::DuplicateTime);
        }
    }
    Ok(())
}

impl PupilTimeSeries {
    /// Construct from time and size arrays of equal length.
    pub fn new(t: impl Into<Array1<f64>>, size: impl Into<Array1<f64>>) -> Result<Self, Error> {
        let t = t.into();
        let size = size.into();
        if t.len() != size.len() {
            return Err(Error::MismatchedLengths {
                time: t.len(),
                size: size.len(),
            });
        }
        check_time(t.view())?;
        Ok(Self {
            t,
            size,
            stimulus: None,
            blinks: None,
        })
    }

    /// The same series with the light stimulus attached.
    pub fn with_stimulus(mut self, stimulus: LightStimulus) -> Self {
        self.stimulus = Some(stimulus);
        self
    }

    /// The same series with the blink list attached.
    pub fn with_blinks(mut self, blinks: impl IntoIterator<Item = Blink>) -> Self {
        self.blinks = Some(blinks.into_iter().collect());
        self
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    pub fn time(&self) -> ArrayView1<'_, f64> {
        self.t.view()
    }

    pub fn size(&self) -> ArrayView1<'_, f64> {
        self.size.view()
    }

    pub fn stimulus(&self) -> Option<&LightStimulus> {
        self.stimulus.as_ref()
    }

    /// The stimulus, or [`Error::MissingStimulus`] when none is attached.
    /// Every phase-dependent operation goes through this accessor.
    pub fn require_stimulus(&self) -> Result<&LightStimulus, Error> {
        self.stimulus.as_ref().ok_or(Error::MissingStimulus)
    }

    /// The blink list, or [`Error::MissingBlinks`] when none was set.
    pub fn blinks(&self) -> Result<&[Blink], Error> {
        self.blinks.as_deref().ok_or(Error::MissingBlinks)
    }

    /// Blink detection from the size trace alone.
    ///
    /// Deliberately unimplemented: size-trace blink detection is unreliable
    /// compared to video analysis, so this placeholder fails loudly instead
    /// of returning questionable intervals.
    pub fn find_blinks(&self) -> Result<Vec<Blink>, Error> {
        log::warn!(
            "finding blinks from the pupil size trace is not recommended, \
             use a more reliable source such as video analysis"
        );
        Err(Error::NotImplemented("blink detection"))
    }

    /// A copy with the sizes inside every blink interval masked to NaN.
    pub fn blinks_removed(&self) -> Result<Self, Error> {
        let blinks = self.blinks()?;
        let size = izip!(self.t.iter(), self.size.iter())
            .map(|(&t, &s)| {
                if blinks.iter().any(|b| b.contains(t)) {
                    f64::NAN
                } else {
                    s
                }
            })
            .collect();
        Ok(Self {
            t: self.t.clone(),
            size,
            stimulus: self.stimulus,
            blinks: self.blinks.clone(),
        })
    }

    /// A copy restricted to samples with `start <= t <= end`.
    pub fn trimmed(&self, start: f64, end: f64) -> Self {
        let (t, size): (Vec<f64>, Vec<f64>) = izip!(self.t.iter(), self.size.iter())
            .filter(|&(&t, _)| t >= start && t <= end)
            .map(|(&t, &s)| (t, s))
            .unzip();
        Self {
            t: t.into(),
            size: size.into(),
            stimulus: self.stimulus,
            blinks: self.blinks.clone(),
        }
    }

    /// A copy with all times (stimulus and blinks included) shifted by `offset`.
    pub fn with_time_offset(&self, offset: f64) -> Self {
        Self {
            t: &self.t + offset,
            size: self.size.clone(),
            stimulus: self.stimulus.map(|s| s.shifted(offset)),
            blinks: self
                .blinks
                .as_ref()
                .map(|blinks| blinks.iter().map(|b| b.shifted(offset)).collect()),
        }
    }

    /// A copy with NaN-size samples dropped.
    pub fn dropped_nan(&self) -> Self {
        let (t, size): (Vec<f64>, Vec<f64>) = izip!(self.t.iter(), self.size.iter())
            .filter(|&(_, &s)| !s.is_nan())
            .map(|(&t, &s)| (t, s))
            .unzip();
        Self {
            t: t.into(),
            size: size.into(),
            stimulus: self.stimulus,
            blinks: self.blinks.clone(),
        }
    }

    /// Linear interpolation onto `new_t`; queries outside the sampled span
    /// evaluate to NaN. NaN sizes propagate into the segments touching them.
    pub fn interpolated(&self, new_t: ArrayView1<f64>) -> Result<Self, Error> {
        check_time(new_t)?;
        let size = new_t.iter().map(|&x| self.interp_one(x)).collect();
        Ok(Self {
            t: new_t.to_owned(),
            size,
            stimulus: self.stimulus,
            blinks: self.blinks.clone(),
        })
    }

    fn interp_one(&self, x: f64) -> f64 {
        let n = self.t.len();
        if n == 0 || x < self.t[0] || x > self.t[n - 1] {
            return f64::NAN;
        }
        // t is strictly increasing, find the first sample at or past x
        let i = self.t.iter().position(|&ti| ti >= x).expect("x is within the sampled span");
        if self.t[i] == x {
            return self.size[i];
        }
        let (t0, t1) = (self.t[i - 1], self.t[i]);
        let (s0, s1) = (self.size[i - 1], self.size[i]);
        s0 + (s1 - s0) * (x - t0) / (t1 - t0)
    }
}
