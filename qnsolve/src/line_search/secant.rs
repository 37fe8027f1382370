use super::{LineSearch, LineSearchInput, StepReport, trial};
use crate::{
    problem::{EvalFault, Evaluator, Problem},
    vector::Communicator,
};

/// Minimise `E(λ) = ‖F(x − λy)‖²` with Newton or secant steps on `λ`.
///
/// Each iteration samples `E` at the current `λ`, the previous `λold` and
/// their midpoint, estimates `E'` at both ends and `E''` in the middle, and
/// takes a Newton step on `λ` if `E''` is positive or a secant step otherwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Secant {
    /// Initial step length.
    pub damping: f64,
    /// How many updates of `λ` to make.
    pub max_iterations: usize,
    /// Stop once `|λ − λold| / λ` drops below this.
    pub rtol: f64,
    /// Updates smaller than this are replaced by the midpoint of `λ` and `λold`.
    pub min_lambda: f64,
    /// Stop instead of stepping past this.
    pub max_lambda: f64,
}

impl Default for Secant {
    fn default() -> Self {
        Self {
            damping: 1.0,
            max_iterations: 1,
            rtol: 1e-8,
            min_lambda: 1e-12,
            max_lambda: 1e8,
        }
    }
}

impl<P, C> LineSearch<P, C> for Secant
where
    P: Problem + ?Sized,
    C: Communicator,
{
    fn apply(
        &mut self,
        eval: &mut Evaluator<'_, P, C>,
        input: LineSearchInput<'_>,
        w: &mut [f64],
        g: &mut [f64],
    ) -> Result<StepReport, EvalFault> {
        let ynorm = eval.space().norm(input.y);
        let mut lambda = self.damping;
        let mut lambda_old = 0.0;
        let mut e_old = input.fnorm * input.fnorm;

        for _ in 0..self.max_iterations {
            let mid = trial(eval, &input, 0.5 * (lambda + lambda_old), w, g)?;
            let e_mid = mid * mid;
            let end = trial(eval, &input, lambda, w, g)?;
            let e = end * end;

            let delta = lambda - lambda_old;
            let de = (3.0 * e - 4.0 * e_mid + e_old) / delta;
            let de_old = (e - 4.0 * e_mid + 3.0 * e_old) / delta;
            let d2e = 4.0 / (delta * delta) * (e - 2.0 * e_mid + e_old);

            let mut update = if d2e > 0.0 {
                lambda - de / d2e
            } else {
                lambda - de * delta / (de - de_old)
            };
            if update < self.min_lambda {
                update = 0.5 * (lambda + lambda_old);
            }
            if !update.is_finite() || update > self.max_lambda {
                break;
            }

            e_old = e;
            lambda_old = lambda;
            lambda = update;
            if (lambda - lambda_old).abs() / lambda < self.rtol {
                break;
            }
        }

        let gnorm = trial(eval, &input, lambda, w, g)?;
        log::trace!("secant line search: lambda = {lambda:e}, gnorm = {gnorm:e}");
        Ok(StepReport {
            lambda,
            ynorm: lambda * ynorm,
            gnorm,
            succeeded: true,
        })
    }
}
