//! Nonlinear curve fitting infrastructure.
//!
//! Two optimizers live here:
//!
//! - [`LmCurveFit`]: Levenberg–Marquardt least squares with the analytic
//!   per-phase Jacobians, the workhorse behind
//!   [`PhaseModel::fit`](crate::PhaseModel::fit). NaN samples are removed
//!   before the solver ever sees a residual.
//! - [`BoundaryOptimizer`]: a bilevel search that treats a phase's
//!   `(start, end)` window as free variables. The outer quasi-Newton loop
//!   proposes windows, the inner loop is an ordinary [`LmCurveFit`] parameter
//!   fit of a freshly constructed model, and the objective is the inner fit's
//!   mean absolute error.
//!
//! Both optimizers run to their own convergence policy; there is no
//! cancellation or timeout.

mod lm;
pub use lm::{CurveFitResult, LmCurveFit};

mod boundary;
pub use boundary::{BoundaryFit, BoundaryOptimizer};
