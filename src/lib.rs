#![doc = include_str!("../README.md")]

mod array_stats;

mod composite;
pub use composite::{CompositeFit, PHASE_NAMES};

mod data;
pub use data::{Blink, LightStimulus, PupilRecording, PupilTimeSeries};

mod error;
pub use error::Error;

pub mod metrics;

mod nl_fit;
pub use nl_fit::{BoundaryFit, BoundaryOptimizer, CurveFitResult, LmCurveFit};

mod phase;
pub use phase::{
    Baseline, Constrict, Latency, Phase, PhaseFormula, PhaseModel, PhaseWindow, Redilation,
    Sustain,
};

pub mod preprocessing;

pub mod synthetic;

pub use ndarray;
