mod blinks;
pub use blinks::Blink;

mod light_stimulus;
pub use light_stimulus::LightStimulus;

mod recording;
pub use recording::PupilRecording;

mod time_series;
pub use time_series::PupilTimeSeries;
pub(crate) use time_series::check_time;
