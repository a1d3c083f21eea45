use crate::data::check_time;
use crate::error::Error;
use crate::phase::{Phase, PhaseFormula, PhaseModel, PhaseWindow};

use argmin::core::{CostFunction, Executor, Gradient, State};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use itertools::izip;
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// Score assigned to infeasible trial windows (too few samples, NaN fit,
/// parameters escaping their bounds) so the outer search steers away from
/// them without aborting.
const PENALTY: f64 = 1e6;

/// Joint search over a phase's window boundaries and parameters.
///
/// The outer loop is a bounded quasi-Newton (L-BFGS behind a logistic bound
/// transform) over `(start, end)`; for every trial window a fresh
/// [`PhaseModel`] is constructed and fitted the ordinary way, and the
/// objective is that fit's mean absolute error. The inner fit optimizes the
/// formula parameters on its own, which makes the whole thing a bilevel
/// optimization. Convergence and tie-break behavior are the optimizer's
/// defaults.
///
/// This is an escape hatch for hand-tuning phase boundaries;
/// [`CompositeFit`](crate::CompositeFit) never calls it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundaryOptimizer {
    /// Maximum number of outer iterations.
    pub max_iters: u64,
    /// L-BFGS history size.
    pub memory: usize,
    /// Relative step of the forward-difference gradient.
    pub fd_step: f64,
}

impl BoundaryOptimizer {
    pub fn new(max_iters: u64, memory: usize, fd_step: f64) -> Self {
        assert!(max_iters > 0, "max_iters must be positive");
        assert!(memory > 0, "memory must be positive");
        assert!(
            fd_step > 0.0 && fd_step.is_finite(),
            "fd_step must be positive and finite"
        );
        Self {
            max_iters,
            memory,
            fd_step,
        }
    }

    #[inline]
    pub fn default_max_iters() -> u64 {
        50
    }

    #[inline]
    pub fn default_memory() -> usize {
        7
    }

    #[inline]
    pub fn default_fd_step() -> f64 {
        1e-6
    }

    /// Search for the window minimizing the phase's own goodness of fit.
    ///
    /// `start_bounds` and `end_bounds` must be finite `(lower, upper)` pairs
    /// enclosing the corresponding component of `initial_window`.
    /// `initial_params` seeds every inner fit (the phase default when
    /// `None`); a trial whose fitted parameters escape `param_bounds` is
    /// treated as infeasible. When the outer solver fails outright the
    /// initial window is kept and refit, with a warning.
    #[allow(clippy::too_many_arguments)]
    pub fn optimize<'a>(
        &self,
        phase: Phase,
        t: ArrayView1<'a, f64>,
        size: ArrayView1<'a, f64>,
        initial_window: PhaseWindow,
        start_bounds: (f64, f64),
        end_bounds: (f64, f64),
        initial_params: Option<&[f64]>,
        param_bounds: Option<(&[f64], &[f64])>,
    ) -> Result<BoundaryFit, Error> {
        if matches!(phase, Phase::Latency(_)) {
            return Err(Error::NotImplemented("latency fitting"));
        }
        if t.len() != size.len() {
            return Err(Error::MismatchedLengths {
                time: t.len(),
                size: size.len(),
            });
        }
        check_time(t)?;
        for &(lower, upper) in &[start_bounds, end_bounds] {
            if !(lower.is_finite() && upper.is_finite() && lower < upper) {
                return Err(Error::InvalidSearchBounds { lower, upper });
            }
        }
        let inside = |x: f64, (lower, upper): (f64, f64)| x >= lower && x <= upper;
        if !inside(initial_window.start, start_bounds) || !inside(initial_window.end, end_bounds) {
            return Err(Error::InitialWindowOutOfBounds {
                start: initial_window.start,
                end: initial_window.end,
            });
        }
        let initial_params = match initial_params {
            Some(params) => {
                if params.len() != phase.param_count() {
                    return Err(Error::BadInitialGuess {
                        phase: phase.name(),
                        expected: phase.param_count(),
                        actual: params.len(),
                    });
                }
                params.to_vec()
            }
            None => phase.default_guess().to_vec(),
        };
        let param_bounds = match param_bounds {
            Some((lower, upper)) => {
                if lower.len() != phase.param_count() || upper.len() != phase.param_count() {
                    return Err(Error::BadParamBounds {
                        phase: phase.name(),
                        expected: phase.param_count(),
                        lower: lower.len(),
                        upper: upper.len(),
                    });
                }
                Some((lower.to_vec(), upper.to_vec()))
            }
            None => None,
        };

        let problem = BoundaryProblem {
            phase,
            t,
            size,
            lower: [start_bounds.0, end_bounds.0],
            upper: [start_bounds.1, end_bounds.1],
            initial_params,
            param_bounds,
            fd_step: self.fd_step,
        };
        let theta0 = vec![
            to_unbounded(initial_window.start, start_bounds.0, start_bounds.1),
            to_unbounded(initial_window.end, end_bounds.0, end_bounds.1),
        ];

        let linesearch = MoreThuenteLineSearch::new();
        let solver = LBFGS::new(linesearch, self.memory);
        let best_theta = match Executor::new(problem.clone(), solver)
            .configure(|state| state.param(theta0.clone()).max_iters(self.max_iters))
            .run()
        {
            Ok(result) => result
                .state()
                .get_best_param()
                .cloned()
                .unwrap_or(theta0),
            Err(error) => {
                log::warn!("boundary search failed ({error}), keeping the initial window");
                theta0
            }
        };

        let window = problem.window_of(&best_theta);
        let mut model = PhaseModel::new(phase, t, size, window)?;
        model.fit(Some(&problem.initial_params), None)?;
        let score = model.goodness_of_fit("MAE")?;
        Ok(BoundaryFit {
            window,
            params: model.params().to_vec(),
            score,
        })
    }
}

impl Default for BoundaryOptimizer {
    fn default() -> Self {
        Self::new(
            Self::default_max_iters(),
            Self::default_memory(),
            Self::default_fd_step(),
        )
    }
}

/// Best window found by [`BoundaryOptimizer::optimize`] together with the
/// parameters and score of its fit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundaryFit {
    pub window: PhaseWindow,
    pub params: Vec<f64>,
    pub score: f64,
}

#[derive(Clone)]
struct BoundaryProblem<'a> {
    phase: Phase,
    t: ArrayView1<'a, f64>,
    size: ArrayView1<'a, f64>,
    lower: [f64; 2],
    upper: [f64; 2],
    initial_params: Vec<f64>,
    param_bounds: Option<(Vec<f64>, Vec<f64>)>,
    fd_step: f64,
}

impl BoundaryProblem<'_> {
    fn window_of(&self, theta: &[f64]) -> PhaseWindow {
        PhaseWindow::new(
            to_bounded(theta[0], self.lower[0], self.upper[0]),
            to_bounded(theta[1], self.lower[1], self.upper[1]),
        )
    }

    fn objective(&self, window: PhaseWindow) -> f64 {
        let mut model = match PhaseModel::new(self.phase, self.t, self.size, window) {
            Ok(model) => model,
            Err(_) => return PENALTY,
        };
        if model.fit(Some(&self.initial_params), None).is_err() {
            return PENALTY;
        }
        if model.params().iter().any(|p| !p.is_finite()) {
            return PENALTY;
        }
        if let Some((lower, upper)) = &self.param_bounds {
            let model_params = model.params();
            let feasible = izip!(model_params.iter(), lower.iter(), upper.iter())
                .all(|(&p, &lo, &hi)| p >= lo && p <= hi);
            if !feasible {
                return PENALTY;
            }
        }
        match model.goodness_of_fit("MAE") {
            Ok(mae) if mae.is_finite() => mae,
            _ => PENALTY,
        }
    }
}

impl CostFunction for BoundaryProblem<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, theta: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        Ok(self.objective(self.window_of(theta)))
    }
}

impl Gradient for BoundaryProblem<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    /// Forward-difference gradient of the cost; the objective has no
    /// analytic derivative because it runs a whole inner fit per evaluation.
    fn gradient(&self, theta: &Self::Param) -> Result<Self::Gradient, argmin::core::Error> {
        let f0 = self.cost(theta)?;
        let mut grad = vec![0.0; theta.len()];
        for i in 0..theta.len() {
            let h = self.fd_step * (1.0 + theta[i].abs());
            let mut shifted = theta.clone();
            shifted[i] += h;
            grad[i] = (self.cost(&shifted)? - f0) / h;
        }
        Ok(grad)
    }
}

/// Map a bounded coordinate into the optimizer's unbounded space.
fn to_unbounded(x: f64, lower: f64, upper: f64) -> f64 {
    let frac = ((x - lower) / (upper - lower)).clamp(1e-9, 1.0 - 1e-9);
    (frac / (1.0 - frac)).ln()
}

/// Inverse of [`to_unbounded`], always lands strictly inside the bounds.
fn to_bounded(theta: f64, lower: f64, upper: f64) -> f64 {
    lower + (upper - lower) / (1.0 + (-theta).exp())
}
