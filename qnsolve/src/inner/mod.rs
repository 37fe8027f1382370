//! Nonlinear solvers that can precondition the quasi-Newton iteration.
use crate::{QnError, Reason, vector::Space};

mod newton;
mod richardson;

pub use newton::Newton;
pub use richardson::Richardson;

/// A nonlinear solver run from inside another one.
///
/// After [`InnerSolver::solve`] returns, [`InnerSolver::residual`] must hold
/// `F(x) − b` at the returned iterate.
pub trait InnerSolver<P: ?Sized, C> {
    /// Improve `x` in place, returning why the solve stopped.
    ///
    /// Divergence is reported through the returned [`Reason`], not as an error.
    fn solve(
        &mut self,
        problem: &P,
        space: &Space<C>,
        rhs: Option<&[f64]>,
        x: &mut [f64],
    ) -> Result<Reason, QnError>;

    /// `F(x) − b` at the iterate the last solve returned.
    fn residual(&self) -> &[f64];

    /// `‖F(x) − b‖` at the iterate the last solve returned.
    fn residual_norm(&self) -> f64;
}

/// Stopping rules shared by the built-in inner solvers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InnerTolerances {
    /// Iteration limit. Hitting it is not a failure.
    pub max_iterations: usize,
    /// Stop once `‖F‖` drops below this.
    pub atol: f64,
    /// Stop once `‖F‖` drops below this times the starting norm.
    pub rtol: f64,
    /// Residual evaluation limit.
    pub max_function_evaluations: usize,
}

impl Default for InnerTolerances {
    fn default() -> Self {
        Self {
            max_iterations: 1,
            atol: 1e-50,
            rtol: 1e-8,
            max_function_evaluations: 10_000,
        }
    }
}

impl InnerTolerances {
    fn check(&self, iteration: usize, fnorm: f64, fnorm0: f64) -> Reason {
        if fnorm.is_nan() {
            Reason::FnormNan
        } else if fnorm < self.atol {
            Reason::FnormAbsolute
        } else if iteration > 0 && fnorm <= self.rtol * fnorm0 {
            Reason::FnormRelative
        } else if iteration >= self.max_iterations {
            Reason::MaxIterations
        } else {
            Reason::Iterating
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tolerances_check_in_order() {
        let t = InnerTolerances {
            max_iterations: 3,
            atol: 1e-10,
            rtol: 1e-3,
            ..Default::default()
        };
        assert_eq!(t.check(0, 1.0, 1.0), Reason::Iterating);
        assert_eq!(t.check(0, 1e-11, 1.0), Reason::FnormAbsolute);
        assert_eq!(t.check(2, 1e-4, 1.0), Reason::FnormRelative);
        assert_eq!(t.check(3, 0.5, 1.0), Reason::MaxIterations);
        assert_eq!(t.check(1, f64::NAN, 1.0), Reason::FnormNan);
    }
}
