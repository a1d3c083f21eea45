use crate::phase::{Phase, PhaseFormula};

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use nalgebra::{DMatrix, DVector, Dyn, Owned};
use serde::{Deserialize, Serialize};

/// Outcome of a single curve fit.
///
/// `success` is false when the solver gave up before converging; the caller
/// decides how to degrade (phase models fall back to all-NaN parameters).
#[derive(Clone, Debug, PartialEq)]
pub struct CurveFitResult {
    pub params: Vec<f64>,
    pub success: bool,
}

/// Levenberg–Marquardt nonlinear least-squares wrapper.
///
/// Minimizes the sum of squared residuals between the observed sizes and a
/// phase's closed-form model, using the phase's analytic Jacobian. The data
/// handed to [`curve_fit`](Self::curve_fit) must already be NaN-free and
/// expressed in seconds since the phase start.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LmCurveFit {
    /// Maximum number of residual evaluations before the solver gives up.
    pub patience: usize,
    /// Relative tolerance on the residual sum of squares.
    pub ftol: f64,
    /// Relative tolerance on the parameter step.
    pub xtol: f64,
}

impl LmCurveFit {
    pub fn new(patience: usize, ftol: f64, xtol: f64) -> Self {
        assert!(patience > 0, "patience must be positive");
        assert!(ftol > 0.0 && ftol.is_finite(), "ftol must be positive and finite");
        assert!(xtol > 0.0 && xtol.is_finite(), "xtol must be positive and finite");
        Self { patience, ftol, xtol }
    }

    #[inline]
    pub fn default_patience() -> usize {
        100
    }

    #[inline]
    pub fn default_ftol() -> f64 {
        1e-14
    }

    #[inline]
    pub fn default_xtol() -> f64 {
        1e-14
    }

    /// Fit `phase`'s model to `(x, y)` starting from `x0`.
    ///
    /// `x` and `y` must have the same length and contain no NaN; `x0` must
    /// have the phase's parameter count. Zero-parameter phases succeed
    /// trivially with an empty vector.
    pub fn curve_fit(&self, phase: &Phase, x: &[f64], y: &[f64], x0: &[f64]) -> CurveFitResult {
        if phase.param_count() == 0 {
            return CurveFitResult {
                params: vec![],
                success: true,
            };
        }
        let problem = PhaseCurveProblem {
            phase: *phase,
            x,
            y,
            params: DVector::from_column_slice(x0),
        };
        let (problem, report) = LevenbergMarquardt::new()
            .with_patience(self.patience)
            .with_ftol(self.ftol)
            .with_xtol(self.xtol)
            .minimize(problem);
        let params: Vec<f64> = problem.params.iter().copied().collect();
        let success =
            report.termination.was_successful() && params.iter().all(|p| p.is_finite());
        CurveFitResult { params, success }
    }
}

impl Default for LmCurveFit {
    fn default() -> Self {
        Self::new(
            Self::default_patience(),
            Self::default_ftol(),
            Self::default_xtol(),
        )
    }
}

struct PhaseCurveProblem<'a> {
    phase: Phase,
    x: &'a [f64],
    y: &'a [f64],
    params: DVector<f64>,
}

impl LeastSquaresProblem<f64, Dyn, Dyn> for PhaseCurveProblem<'_> {
    type ParameterStorage = Owned<f64, Dyn>;
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;

    fn set_params(&mut self, params: &DVector<f64>) {
        self.params.copy_from(params);
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        let params = self.params.as_slice();
        Some(DVector::from_iterator(
            self.x.len(),
            self.x
                .iter()
                .zip(self.y.iter())
                .map(|(&x, &y)| self.phase.value(x, params) - y),
        ))
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        let params = self.params.as_slice();
        let n = self.params.len();
        let mut jac = DMatrix::zeros(self.x.len(), n);
        let mut row = vec![0.0; n];
        for (i, &x) in self.x.iter().enumerate() {
            self.phase.derivatives(x, params, &mut row);
            for (j, &value) in row.iter().enumerate() {
                jac[(i, j)] = value;
            }
        }
        Some(jac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::{Redilation, Sustain};

    use approx::assert_abs_diff_eq;
    use rand::prelude::*;
    use rand_distr::StandardNormal;

    #[test]
    fn linear_model_exact() {
        let x: Vec<f64> = (0..11).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|&x| 0.5 * x + 2.0).collect();
        let result =
            LmCurveFit::default().curve_fit(&Sustain.into(), &x, &y, &[0.0, 0.0]);
        assert!(result.success);
        assert_abs_diff_eq!(result.params[0], 0.5, epsilon = 1e-10);
        assert_abs_diff_eq!(result.params[1], 2.0, epsilon = 1e-10);
    }

    #[test]
    fn exponential_model_with_noise() {
        const N: usize = 200;
        const NOISE: f64 = 0.005;
        let param_true = [0.45, -0.4, 1.0];

        let mut rng = StdRng::seed_from_u64(0);
        let x: Vec<f64> = (0..N).map(|i| 20.0 * i as f64 / (N - 1) as f64).collect();
        let phase: Phase = Redilation.into();
        let y: Vec<f64> = x
            .iter()
            .map(|&x| {
                let eps: f64 = rng.sample(StandardNormal);
                phase.value(x, &param_true) + NOISE * eps
            })
            .collect();

        let result = LmCurveFit::default().curve_fit(&phase, &x, &y, &[0.6, -0.2, 0.8]);
        assert!(result.success);
        assert_abs_diff_eq!(&result.params[..], &param_true[..], epsilon = 1e-2);
    }

    #[test]
    fn zero_parameter_phase_is_trivial() {
        let result = LmCurveFit::default().curve_fit(
            &crate::phase::Latency.into(),
            &[0.0, 1.0, 2.0],
            &[1.0, 1.0, 1.0],
            &[],
        );
        assert!(result.success);
        assert!(result.params.is_empty());
    }
}
