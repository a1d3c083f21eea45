//! The closed set of response phases and their closed-form models.
//!
//! Following Feigl et al., the pupillary light response decomposes into
//! linear and exponential segments:
//!
//! | Phase      | Model (x = time since phase start) | Parameters |
//! |------------|------------------------------------|------------|
//! | Baseline   | y = c                              | c          |
//! | Latency    | undefined                          | —          |
//! | Constrict  | y = m (x + t) + c                  | m, t, c    |
//! | Sustain    | y = m x + c                        | m, c       |
//! | Redilation | y = −s exp(k x) + p                | s, k, p    |
//!
//! Every variant knows its formula, its analytic partial derivatives, its
//! parameter names and a heuristic initial guess for the optimizer.

use crate::phase::PhaseWindow;

use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};

/// Behavior shared by all phase variants; dispatched through [`Phase`].
#[enum_dispatch]
pub trait PhaseFormula {
    /// Lower-case phase name used in parameter lookups and log messages.
    fn name(&self) -> &'static str;

    /// Parameter names, in the order they appear in the parameter vector.
    fn param_names(&self) -> &'static [&'static str];

    /// Heuristic starting point for the optimizer, one value per parameter.
    fn default_guess(&self) -> &'static [f64];

    /// Model value at `x` seconds after the phase start.
    fn value(&self, x: f64, params: &[f64]) -> f64;

    /// Partial derivatives of the model w.r.t. each parameter, written
    /// into `jac` (same order as [`param_names`](Self::param_names)).
    fn derivatives(&self, x: f64, params: &[f64], jac: &mut [f64]);

    /// Human-readable fitted formula with the numeric parameters substituted,
    /// `x` denotes time since the phase start.
    fn render_formula(&self, params: &[f64], window: PhaseWindow) -> String;

    fn param_count(&self) -> usize {
        self.param_names().len()
    }
}

/// Pre-stimulus reference diameter, a flat model `y = c`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Baseline;

impl PhaseFormula for Baseline {
    fn name(&self) -> &'static str {
        "baseline"
    }

    fn param_names(&self) -> &'static [&'static str] {
        &["c"]
    }

    fn default_guess(&self) -> &'static [f64] {
        &[1.0]
    }

    fn value(&self, _x: f64, params: &[f64]) -> f64 {
        params[0]
    }

    fn derivatives(&self, _x: f64, _params: &[f64], jac: &mut [f64]) {
        jac[0] = 1.0;
    }

    fn render_formula(&self, params: &[f64], window: PhaseWindow) -> String {
        format!(
            "y = {:.4} from {:.4} to {:.4}",
            params[0], window.start, window.end
        )
    }
}

/// The gap between light onset and the start of constriction.
///
/// No model is defined for this period; predictions inside it are NaN.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Latency;

impl PhaseFormula for Latency {
    fn name(&self) -> &'static str {
        "latency"
    }

    fn param_names(&self) -> &'static [&'static str] {
        &[]
    }

    fn default_guess(&self) -> &'static [f64] {
        &[]
    }

    fn value(&self, _x: f64, _params: &[f64]) -> f64 {
        f64::NAN
    }

    fn derivatives(&self, _x: f64, _params: &[f64], _jac: &mut [f64]) {}

    fn render_formula(&self, _params: &[f64], _window: PhaseWindow) -> String {
        "The response between light onset and the end of the latency period is not modelled."
            .to_owned()
    }
}

/// Constriction after light onset, a shifted linear model `y = m (x + t) + c`.
///
/// `m` is the constriction velocity, `t` shifts the ramp onto the latency
/// boundary and `c` is the diameter at light onset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Constrict;

impl PhaseFormula for Constrict {
    fn name(&self) -> &'static str {
        "constriction"
    }

    fn param_names(&self) -> &'static [&'static str] {
        &["m", "t", "c"]
    }

    fn default_guess(&self) -> &'static [f64] {
        &[0.5, 0.2, 1.0]
    }

    fn value(&self, x: f64, params: &[f64]) -> f64 {
        params[0] * (x + params[1]) + params[2]
    }

    fn derivatives(&self, x: f64, params: &[f64], jac: &mut [f64]) {
        jac[0] = x + params[1];
        jac[1] = params[0];
        jac[2] = 1.0;
    }

    fn render_formula(&self, params: &[f64], window: PhaseWindow) -> String {
        format!(
            "y = {:.4} * (x + {:.4}) + {:.4} from {:.4} to {:.4}",
            params[0], params[1], params[2], window.start, window.end
        )
    }
}

/// Sustained constriction up to light offset, a linear model `y = m x + c`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sustain;

impl PhaseFormula for Sustain {
    fn name(&self) -> &'static str {
        "sustained"
    }

    fn param_names(&self) -> &'static [&'static str] {
        &["m", "c"]
    }

    fn default_guess(&self) -> &'static [f64] {
        &[0.025, 55.0]
    }

    fn value(&self, x: f64, params: &[f64]) -> f64 {
        params[0] * x + params[1]
    }

    fn derivatives(&self, x: f64, _params: &[f64], jac: &mut [f64]) {
        jac[0] = x;
        jac[1] = 1.0;
    }

    fn render_formula(&self, params: &[f64], window: PhaseWindow) -> String {
        format!(
            "y = {:.4} * x + {:.4} from {:.4} to {:.4}",
            params[0], params[1], window.start, window.end
        )
    }
}

/// Redilation (PIPR) after light offset, `y = −s exp(k x) + p`.
///
/// `s` scales the recovery, `k` (negative) is the redilation rate and `p`
/// is the plateau diameter the pupil relaxes towards as `x → ∞`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Redilation;

impl PhaseFormula for Redilation {
    fn name(&self) -> &'static str {
        "redilation"
    }

    fn param_names(&self) -> &'static [&'static str] {
        &["s", "k", "p"]
    }

    fn default_guess(&self) -> &'static [f64] {
        &[0.45, -0.4, 1.0]
    }

    fn value(&self, x: f64, params: &[f64]) -> f64 {
        -params[0] * f64::exp(params[1] * x) + params[2]
    }

    fn derivatives(&self, x: f64, params: &[f64], jac: &mut [f64]) {
        let exp_kx = f64::exp(params[1] * x);
        jac[0] = -exp_kx;
        jac[1] = -params[0] * x * exp_kx;
        jac[2] = 1.0;
    }

    fn render_formula(&self, params: &[f64], window: PhaseWindow) -> String {
        format!(
            "y = -{:.4} * exp({:.4} * x) + {:.4} from {:.4} to {:.4}",
            params[0], params[1], params[2], window.start, window.end
        )
    }
}

/// All phases are available as variants of this enum.
#[enum_dispatch(PhaseFormula)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Baseline,
    Latency,
    Constrict,
    Sustain,
    Redilation,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn param_counts_match_names() {
        let phases: [Phase; 5] = [
            Baseline.into(),
            Latency.into(),
            Constrict.into(),
            Sustain.into(),
            Redilation.into(),
        ];
        for phase in phases {
            assert_eq!(phase.param_count(), phase.param_names().len());
            assert_eq!(phase.param_count(), phase.default_guess().len());
        }
    }

    #[test]
    fn latency_is_nan_everywhere() {
        let phase: Phase = Latency.into();
        assert!(phase.value(0.0, &[]).is_nan());
        assert!(phase.value(1e9, &[]).is_nan());
    }

    #[test]
    fn redilation_asymptotics() {
        let phase: Phase = Redilation.into();
        let params = [0.45, -0.4, 1.0];
        assert_relative_eq!(phase.value(0.0, &params), 0.55);
        assert_relative_eq!(phase.value(f64::INFINITY, &params), 1.0);
        assert_eq!(phase.value(f64::NEG_INFINITY, &params), f64::NEG_INFINITY);
    }

    /// Forward-difference check of every analytic Jacobian.
    #[test]
    fn derivatives_match_finite_differences() {
        const H: f64 = 1e-7;
        let cases: [(Phase, Vec<f64>); 4] = [
            (Baseline.into(), vec![0.7]),
            (Constrict.into(), vec![-0.3, 0.2, 1.1]),
            (Sustain.into(), vec![0.025, 0.55]),
            (Redilation.into(), vec![0.45, -0.4, 1.0]),
        ];
        for (phase, params) in cases {
            for &x in &[0.0, 0.5, 2.0, 7.5] {
                let mut jac = vec![0.0; phase.param_count()];
                phase.derivatives(x, &params, &mut jac);
                for i in 0..params.len() {
                    let mut shifted = params.clone();
                    shifted[i] += H;
                    let numeric = (phase.value(x, &shifted) - phase.value(x, &params)) / H;
                    assert_relative_eq!(jac[i], numeric, epsilon = 1e-5, max_relative = 1e-5);
                }
            }
        }
    }

    #[test]
    fn formula_strings_substitute_parameters() {
        let window = PhaseWindow::new(0.0, 10.0);
        let rendered = Redilation.render_formula(&[0.45, -0.4, 1.0], window);
        assert_eq!(
            rendered,
            "y = -0.4500 * exp(-0.4000 * x) + 1.0000 from 0.0000 to 10.0000"
        );
        let rendered = Baseline.render_formula(&[0.9], PhaseWindow::new(f64::NEG_INFINITY, 0.0));
        assert!(rendered.starts_with("y = 0.9000 from -inf"));
    }
}
