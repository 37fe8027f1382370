//! Line searches along the quasi-Newton direction.
//!
//! Every line search here steps *against* the direction: the trial point for
//! step length `λ` is `x − λ·y`.
use crate::{
    LineSearchKind,
    problem::{EvalFault, Evaluator, Problem},
    vector::{Communicator, waxpy},
};

mod backtracking;
mod basic;
mod secant;

pub use backtracking::Backtracking;
pub use basic::Basic;
pub use secant::Secant;

/// The current point and search direction.
#[derive(Debug, Clone, Copy)]
pub struct LineSearchInput<'a> {
    /// Current iterate.
    pub x: &'a [f64],
    /// `F(x) − b`
    pub f: &'a [f64],
    /// Search direction. The line search steps to `x − λ·y`.
    pub y: &'a [f64],
    /// `‖f‖`
    pub fnorm: f64,
}

/// Where the line search ended up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    /// The chosen step length.
    pub lambda: f64,
    /// `λ·‖y‖`
    pub ynorm: f64,
    /// `‖F(w) − b‖` at the new point.
    pub gnorm: f64,
    /// False if no acceptable step was found. The returned point is still usable.
    pub succeeded: bool,
}

/// Picks a step length along a search direction.
pub trait LineSearch<P: ?Sized, C> {
    /// Write the new point into `w` and its residual into `g`.
    ///
    /// Residual evaluation faults are passed straight back to the caller.
    fn apply(
        &mut self,
        eval: &mut Evaluator<'_, P, C>,
        input: LineSearchInput<'_>,
        w: &mut [f64],
        g: &mut [f64],
    ) -> Result<StepReport, EvalFault>;
}

/// Build the line search named by `kind`, with default parameters.
pub fn from_kind<P, C>(kind: LineSearchKind) -> Box<dyn LineSearch<P, C>>
where
    P: Problem + ?Sized,
    C: Communicator,
{
    match kind {
        LineSearchKind::Basic => Box::new(Basic::default()),
        LineSearchKind::Backtracking => Box::new(Backtracking::default()),
        LineSearchKind::Secant => Box::new(Secant::default()),
    }
}

/// `w ← x − λ·y`, then `g ← F(w) − b`. Returns `‖g‖`.
fn trial<P, C>(
    eval: &mut Evaluator<'_, P, C>,
    input: &LineSearchInput<'_>,
    lambda: f64,
    w: &mut [f64],
    g: &mut [f64],
) -> Result<f64, EvalFault>
where
    P: Problem + ?Sized,
    C: Communicator,
{
    waxpy(w, -lambda, input.y, input.x);
    eval.residual_norm(w, g)
}
