use serde::{Deserialize, Serialize};

/// A blink interval; samples inside it are unreliable and get masked to NaN
/// by [`PupilTimeSeries::blinks_removed`](crate::PupilTimeSeries::blinks_removed).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Blink {
    pub start: f64,
    pub end: f64,
}

impl Blink {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Closed-interval membership, both endpoints are masked.
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t <= self.end
    }

    pub fn shifted(self, offset: f64) -> Self {
        Self {
            start: self.start + offset,
            end: self.end + offset,
        }
    }
}

impl From<(f64, f64)> for Blink {
    fn from((start, end): (f64, f64)) -> Self {
        Self::new(start, end)
    }
}
