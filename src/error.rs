/// Error returned from validation and lookup paths of the crate.
///
/// Data-quality problems inside a single phase window (too few valid samples,
/// a diverging optimizer) are deliberately *not* errors: they degrade the
/// affected phase to all-NaN parameters and emit a [`log::warn!`], so sibling
/// phases keep fitting.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    #[error("time and size must have the same length, got {time} and {size}")]
    MismatchedLengths { time: usize, size: usize },

    #[error("time array contains non-finite values")]
    NonFiniteTime,

    #[error("time array is not sorted in ascending order")]
    UnsortedTime,

    #[error("time array contains duplicate values")]
    DuplicateTime,

    #[error("light stimulus must have start <= end, got [{start}, {end}]")]
    InvalidStimulus { start: f64, end: f64 },

    #[error("light stimulus not set")]
    MissingStimulus,

    #[error("blink list not set")]
    MissingBlinks,

    #[error("phase '{phase}' not found, available phases: {available:?}")]
    UnknownPhase {
        phase: String,
        available: &'static [&'static str],
    },

    #[error(
        "parameter '{param}' not found in phase '{phase}', available parameters: {available:?}"
    )]
    UnknownParameter {
        phase: String,
        param: String,
        available: &'static [&'static str],
    },

    #[error("unsupported goodness-of-fit method '{method}', supported methods: {supported:?}")]
    UnsupportedGoodnessOfFit {
        method: String,
        supported: &'static [&'static str],
    },

    #[error("initial guess for the {phase} phase must have {expected} parameters, got {actual}")]
    BadInitialGuess {
        phase: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error(
        "parameter bounds for the {phase} phase must have {expected} entries, got {lower} and {upper}"
    )]
    BadParamBounds {
        phase: &'static str,
        expected: usize,
        lower: usize,
        upper: usize,
    },

    #[error("no data points in the time range [{start}, {end}]")]
    EmptyWindow { start: f64, end: f64 },

    #[error("filter time window covers {samples} samples, must cover at least one")]
    FilterWindowTooShort { samples: usize },

    #[error("boundary search bounds must be finite with lower < upper, got [{lower}, {upper}]")]
    InvalidSearchBounds { lower: f64, upper: f64 },

    #[error("initial window [{start}, {end}] lies outside the search bounds")]
    InitialWindowOutOfBounds { start: f64, end: f64 },

    #[error("{0} is not implemented")]
    NotImplemented(&'static str),
}
