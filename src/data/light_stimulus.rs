use crate::error::Error;

use serde::{Deserialize, Serialize};

/// A light stimulus presented to the eye, the `[start, end]` interval during
/// which the light was on.
///
/// The interval partitions the phase windows of a
/// [`CompositeFit`](crate::CompositeFit): everything before `start` is
/// baseline, everything after `end` is redilation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LightStimulus {
    start: f64,
    end: f64,
}

impl LightStimulus {
    /// New stimulus from onset and offset times, `start <= end` required.
    pub fn new(start: f64, end: f64) -> Result<Self, Error> {
        if !(start <= end) {
            return Err(Error::InvalidStimulus { start, end });
        }
        Ok(Self { start, end })
    }

    /// New stimulus from onset time and duration.
    pub fn with_duration(start: f64, duration: f64) -> Result<Self, Error> {
        Self::new(start, start + duration)
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    /// Onset and offset as a pair.
    pub fn interval(&self) -> (f64, f64) {
        (self.start, self.end)
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// The same stimulus shifted in time by `offset`.
    pub fn shifted(self, offset: f64) -> Self {
        Self {
            start: self.start + offset,
            end: self.end + offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn ctor_validates_order() {
        assert!(LightStimulus::new(1.0, 0.0).is_err());
        let stim = LightStimulus::new(0.0, 10.0).unwrap();
        assert_relative_eq!(stim.duration(), 10.0);
    }

    #[test]
    fn from_duration_and_shift() {
        let stim = LightStimulus::with_duration(5.0, 10.0).unwrap();
        assert_eq!(stim.interval(), (5.0, 15.0));
        let shifted = stim.shifted(-5.0);
        assert_eq!(shifted.interval(), (0.0, 10.0));
    }
}
