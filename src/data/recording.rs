use crate::data::light_stimulus::LightStimulus;
use crate::data::time_series::{PupilTimeSeries, check_time};
use crate::error::Error;

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

/// A whole-session recording containing several light stimuli.
///
/// The analysis entry point is [`split`](Self::split), which cuts the
/// recording into one [`PupilTimeSeries`] per stimulus; each piece carries
/// its own stimulus and is ready for a [`CompositeFit`](crate::CompositeFit).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PupilRecording {
    t: Array1<f64>,
    size: Array1<f64>,
    stimuli: Vec<LightStimulus>,
}

impl PupilRecording {
    pub fn new(
        t: impl Into<Array1<f64>>,
        size: impl Into<Array1<f64>>,
        stimuli: Vec<LightStimulus>,
    ) -> Result<Self, Error> {
        let t = t.into();
        let size = size.into();
        if t.len() != size.len() {
            return Err(Error::MismatchedLengths {
                time: t.len(),
                size: size.len(),
            });
        }
        check_time(t.view())?;
        Ok(Self { t, size, stimuli })
    }

    pub fn time(&self) -> ArrayView1<'_, f64> {
        self.t.view()
    }

    pub fn size(&self) -> ArrayView1<'_, f64> {
        self.size.view()
    }

    pub fn stimuli(&self) -> &[LightStimulus] {
        &self.stimuli
    }

    /// A copy with all times (stimuli included) shifted by `offset`.
    pub fn with_time_offset(&self, offset: f64) -> Self {
        Self {
            t: &self.t + offset,
            size: self.size.clone(),
            stimuli: self.stimuli.iter().map(|s| s.shifted(offset)).collect(),
        }
    }

    /// Cut the recording into one series per stimulus, each trimmed to
    /// `[start - prepulse, end + postpulse]` around its stimulus.
    pub fn split(&self, prepulse: f64, postpulse: f64) -> Vec<PupilTimeSeries> {
        if prepulse < 0.0 {
            log::warn!(
                "prepulse duration should be positive to include time before the pulse, got {prepulse}"
            );
        }
        if postpulse < 0.0 {
            log::warn!(
                "postpulse duration should be positive to include time after the pulse, got {postpulse}"
            );
        }
        self.stimuli
            .iter()
            .map(|&stimulus| {
                let whole = PupilTimeSeries::new(self.t.clone(), self.size.clone())
                    .expect("recording arrays are already validated");
                whole
                    .trimmed(stimulus.start() - prepulse, stimulus.end() + postpulse)
                    .with_stimulus(stimulus)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_trims_around_each_stimulus() {
        let t: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let size = vec![1.0; 100];
        let recording = PupilRecording::new(
            t,
            size,
            vec![
                LightStimulus::new(20.0, 30.0).unwrap(),
                LightStimulus::new(60.0, 70.0).unwrap(),
            ],
        )
        .unwrap();

        let pieces = recording.split(10.0, 15.0);
        assert_eq!(pieces.len(), 2);

        assert_eq!(pieces[0].time()[0], 10.0);
        assert_eq!(pieces[0].time()[pieces[0].len() - 1], 45.0);
        assert_eq!(pieces[0].require_stimulus().unwrap().interval(), (20.0, 30.0));

        assert_eq!(pieces[1].time()[0], 50.0);
        assert_eq!(pieces[1].time()[pieces[1].len() - 1], 85.0);
        assert_eq!(pieces[1].require_stimulus().unwrap().interval(), (60.0, 70.0));
    }

    #[test]
    fn offset_shifts_stimuli() {
        let recording = PupilRecording::new(
            vec![0.0, 1.0, 2.0],
            vec![1.0, 2.0, 3.0],
            vec![LightStimulus::new(1.0, 2.0).unwrap()],
        )
        .unwrap()
        .with_time_offset(5.0);
        assert_eq!(recording.time()[0], 5.0);
        assert_eq!(recording.stimuli()[0].interval(), (6.0, 7.0));
    }
}
