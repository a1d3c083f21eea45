use crate::data::{LightStimulus, PupilTimeSeries};
use crate::error::Error;
use crate::phase::{Baseline, Constrict, PhaseModel, PhaseWindow, Redilation, Sustain};

use ndarray::{Array1, ArrayView1, Zip};
use std::collections::BTreeMap;

/// Lookup names of the four fitted phases, in dispatch order.
pub const PHASE_NAMES: &[&str] = &["baseline", "constriction", "sustained", "redilation"];

/// Piecewise fit of a whole pupil response around one light stimulus.
///
/// Owns one [`PhaseModel`] per phase and derives the phase windows from the
/// stimulus interval `[a, b]`:
///
/// - baseline: `(-inf, a)`
/// - constriction: `[a, b)`
/// - sustained: `[a, b)`
/// - redilation: `[b, +inf)`
///
/// The constriction and sustained models are bound to the *same* window (the
/// sustained window arguably should start at peak constriction instead);
/// because dispatch lets later phases overwrite earlier ones, the sustained
/// model silently wins for every in-stimulus query. The latency gap carries
/// no model at all, so queries falling only there evaluate to NaN.
///
/// Construction takes a defensive copy of the input and fits all four phases
/// immediately: a `CompositeFit` is never observed half-fit and never changes
/// afterwards. A different fit requires constructing a new value.
#[derive(Clone, Debug)]
pub struct CompositeFit {
    stimulus: LightStimulus,
    time: Array1<f64>,
    baseline: PhaseModel,
    constrict: PhaseModel,
    sustain: PhaseModel,
    redilation: PhaseModel,
}

impl CompositeFit {
    /// Fit all phases of `series`; fails when no light stimulus is attached.
    pub fn new(series: &PupilTimeSeries) -> Result<Self, Error> {
        let stimulus = *series.require_stimulus()?;
        let (onset, offset) = stimulus.interval();
        let t = series.time();
        let size = series.size();

        let mut baseline = PhaseModel::new(
            Baseline.into(),
            t,
            size,
            PhaseWindow::new(f64::NEG_INFINITY, onset),
        )?;
        let mut constrict =
            PhaseModel::new(Constrict.into(), t, size, PhaseWindow::new(onset, offset))?;
        let mut sustain =
            PhaseModel::new(Sustain.into(), t, size, PhaseWindow::new(onset, offset))?;
        let mut redilation = PhaseModel::new(
            Redilation.into(),
            t,
            size,
            PhaseWindow::new(offset, f64::INFINITY),
        )?;

        baseline.fit(None, None)?;
        constrict.fit(None, None)?;
        sustain.fit(None, None)?;
        redilation.fit(None, None)?;

        Ok(Self {
            stimulus,
            time: t.to_owned(),
            baseline,
            constrict,
            sustain,
            redilation,
        })
    }

    pub fn stimulus(&self) -> LightStimulus {
        self.stimulus
    }

    /// Times of the source series the fit was built from.
    pub fn time(&self) -> ArrayView1<'_, f64> {
        self.time.view()
    }

    /// The four phase models with their lookup names, in dispatch order.
    pub fn phases(&self) -> [(&'static str, &PhaseModel); 4] {
        [
            ("baseline", &self.baseline),
            ("constriction", &self.constrict),
            ("sustained", &self.sustain),
            ("redilation", &self.redilation),
        ]
    }

    /// Phase model by name; the error lists the available names.
    pub fn phase(&self, name: &str) -> Result<&PhaseModel, Error> {
        self.phases()
            .into_iter()
            .find(|(phase_name, _)| *phase_name == name)
            .map(|(_, model)| model)
            .ok_or_else(|| Error::UnknownPhase {
                phase: name.to_owned(),
                available: PHASE_NAMES,
            })
    }

    /// Piecewise prediction over arbitrary query times.
    ///
    /// Every query is dispatched to the phase whose half-open window contains
    /// it, later phases overwriting earlier ones where windows overlap.
    /// Queries in the latency gap or outside every window evaluate to NaN.
    pub fn predict(&self, t: ArrayView1<f64>) -> Array1<f64> {
        let mut out = Array1::from_elem(t.len(), f64::NAN);
        for (_, model) in self.phases() {
            let window = model.window();
            let predicted = model.predict(t);
            Zip::from(&mut out)
                .and(t)
                .and(&predicted)
                .for_each(|out, &ti, &yi| {
                    if window.contains(ti) {
                        *out = yi;
                    }
                });
        }
        out
    }

    /// One fitted parameter; the errors list the available phases/parameters.
    pub fn get_param(&self, phase: &str, param: &str) -> Result<f64, Error> {
        let model = self.phase(phase)?;
        let names = model.param_names();
        let index = names
            .iter()
            .position(|&name| name == param)
            .ok_or_else(|| Error::UnknownParameter {
                phase: phase.to_owned(),
                param: param.to_owned(),
                available: names,
            })?;
        Ok(model.params()[index])
    }

    /// All fitted parameters organized as phase → (parameter → value).
    pub fn get_all_params(&self) -> BTreeMap<&'static str, BTreeMap<&'static str, f64>> {
        self.phases()
            .into_iter()
            .map(|(name, model)| {
                let params = model
                    .param_names()
                    .iter()
                    .copied()
                    .zip(model.params().iter().copied())
                    .collect();
                (name, params)
            })
            .collect()
    }

    /// Multi-line report of all four fitted formulas.
    pub fn get_formula_strings(&self) -> String {
        format!(
            "Formula:\n\tBaseline: {}\n\tConstriction: {}\n\tSustained: {}\n\tRedilation: {}\n",
            self.baseline.formula_string(),
            self.constrict.formula_string(),
            self.sustain.formula_string(),
            self.redilation.formula_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic;

    use approx::assert_relative_eq;
    use ndarray::Array1;

    fn fitted_trace() -> CompositeFit {
        CompositeFit::new(&synthetic::plr_trace(0.1)).unwrap()
    }

    #[test]
    fn missing_stimulus_is_fatal() {
        let series = PupilTimeSeries::new(vec![0.0, 1.0, 2.0], vec![1.0, 1.0, 1.0]).unwrap();
        assert_eq!(CompositeFit::new(&series).unwrap_err(), Error::MissingStimulus);
    }

    #[test]
    fn windows_follow_the_stimulus() {
        let fit = fitted_trace();
        let (onset, offset) = fit.stimulus().interval();
        let phases = fit.phases();
        assert_eq!(phases[0].1.window(), PhaseWindow::new(f64::NEG_INFINITY, onset));
        assert_eq!(phases[1].1.window(), PhaseWindow::new(onset, offset));
        // the sustained window duplicates the constriction one
        assert_eq!(phases[2].1.window(), PhaseWindow::new(onset, offset));
        assert_eq!(phases[3].1.window(), PhaseWindow::new(offset, f64::INFINITY));
    }

    #[test]
    fn end_to_end_parameter_recovery() {
        let fit = fitted_trace();

        // baseline and redilation recover the generating constants
        assert_relative_eq!(
            fit.get_param("baseline", "c").unwrap(),
            synthetic::BASELINE_LEVEL,
            epsilon = 1e-6
        );
        assert_relative_eq!(
            fit.get_param("redilation", "s").unwrap(),
            synthetic::REDILATION_SCALE,
            epsilon = 1e-4
        );
        assert_relative_eq!(
            fit.get_param("redilation", "k").unwrap(),
            synthetic::REDILATION_RATE,
            epsilon = 1e-4
        );
        assert_relative_eq!(
            fit.get_param("redilation", "p").unwrap(),
            synthetic::PLATEAU_LEVEL,
            epsilon = 1e-4
        );

        // constriction and sustained stay NaN by design
        for phase in ["constriction", "sustained"] {
            let fit_params = fit.get_all_params()[phase].clone();
            assert!(!fit_params.is_empty());
            assert!(fit_params.values().all(|p| p.is_nan()), "{phase} must be NaN");
        }
    }

    #[test]
    fn predict_dispatches_by_window() {
        let fit = fitted_trace();
        let (onset, offset) = fit.stimulus().interval();

        let queries = Array1::from(vec![
            onset - 5.0,
            onset - 1e-9,
            onset,
            0.5 * (onset + offset),
            offset - 1e-9,
            offset,
            offset + 6.0,
        ]);
        let predicted = fit.predict(queries.view());

        // before the onset: baseline constant
        assert_relative_eq!(predicted[0], synthetic::BASELINE_LEVEL, epsilon = 1e-6);
        assert_relative_eq!(predicted[1], synthetic::BASELINE_LEVEL, epsilon = 1e-6);
        // inside the stimulus the sustained model wins, and it is NaN by design
        assert!(predicted[2].is_nan());
        assert!(predicted[3].is_nan());
        assert!(predicted[4].is_nan());
        // at and after the offset: redilation exponential
        let expected_at_offset = synthetic::PLATEAU_LEVEL - synthetic::REDILATION_SCALE;
        assert_relative_eq!(predicted[5], expected_at_offset, epsilon = 1e-4);
        let expected_6s = -synthetic::REDILATION_SCALE * f64::exp(synthetic::REDILATION_RATE * 6.0)
            + synthetic::PLATEAU_LEVEL;
        assert_relative_eq!(predicted[6], expected_6s, epsilon = 1e-4);
    }

    #[test]
    fn far_queries_hit_the_infinite_windows() {
        let fit = fitted_trace();
        let queries = Array1::from(vec![-1e6, 1e6]);
        let predicted = fit.predict(queries.view());
        assert_relative_eq!(predicted[0], synthetic::BASELINE_LEVEL, epsilon = 1e-6);
        assert_relative_eq!(predicted[1], synthetic::PLATEAU_LEVEL, epsilon = 1e-4);
    }

    #[test]
    fn unknown_keys_are_reported_with_alternatives() {
        let fit = fitted_trace();
        assert_eq!(
            fit.get_param("latency", "c").unwrap_err(),
            Error::UnknownPhase {
                phase: "latency".to_owned(),
                available: PHASE_NAMES,
            }
        );
        assert_eq!(
            fit.get_param("redilation", "q").unwrap_err(),
            Error::UnknownParameter {
                phase: "redilation".to_owned(),
                param: "q".to_owned(),
                available: &["s", "k", "p"],
            }
        );
    }

    #[test]
    fn formula_report_lists_all_phases() {
        let report = fitted_trace().get_formula_strings();
        assert!(report.starts_with("Formula:\n"));
        for line in ["Baseline:", "Constriction:", "Sustained:", "Redilation:"] {
            assert!(report.contains(line), "missing {line} in {report}");
        }
        // NaN parameters render as NaN rather than crashing
        assert!(report.contains("NaN"));
    }

    #[test]
    fn construction_copies_the_input() {
        let series = synthetic::plr_trace(0.1);
        let fit = CompositeFit::new(&series).unwrap();
        drop(series);
        assert!(fit.time().len() > 0);
    }
}
