use super::{LineSearch, LineSearchInput, StepReport, trial};
use crate::{
    problem::{EvalFault, Evaluator, Problem},
    vector::Communicator,
};

/// Backtrack from the full step until `½‖F‖²` decreases enough.
///
/// The slope of `½‖F(x − λy)‖²` at `λ = 0` is taken to be `−‖F(x)‖²`, which
/// is exact when `y` is the Newton direction. Each rejected step is replaced
/// by the minimiser of the quadratic through the two ends, kept within
/// `[0.1λ, 0.5λ]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backtracking {
    /// First step length tried.
    pub damping: f64,
    /// Sufficient decrease constant.
    pub alpha: f64,
    /// Give up once the step length falls below this.
    pub min_lambda: f64,
    /// Give up after this many trials.
    pub max_steps: usize,
}

impl Default for Backtracking {
    fn default() -> Self {
        Self {
            damping: 1.0,
            alpha: 1e-4,
            min_lambda: 1e-12,
            max_steps: 40,
        }
    }
}

impl<P, C> LineSearch<P, C> for Backtracking
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
        let phi0 = 0.5 * input.fnorm * input.fnorm;
        let slope = -input.fnorm * input.fnorm;

        let mut lambda = self.damping;
        let mut gnorm = trial(eval, &input, lambda, w, g)?;
        for _ in 1..self.max_steps {
            let phi = 0.5 * gnorm * gnorm;
            if phi.is_finite() && phi <= phi0 + self.alpha * lambda * slope {
                return Ok(StepReport {
                    lambda,
                    ynorm: lambda * ynorm,
                    gnorm,
                    succeeded: true,
                });
            }
            let next = if phi.is_finite() {
                -slope * lambda * lambda / (2.0 * (phi - phi0 - slope * lambda))
            } else {
                0.5 * lambda
            };
            let next = next.clamp(0.1 * lambda, 0.5 * lambda);
            if next < self.min_lambda {
                break;
            }
            lambda = next;
            gnorm = trial(eval, &input, lambda, w, g)?;
        }
        let phi = 0.5 * gnorm * gnorm;
        let succeeded = phi.is_finite() && phi <= phi0 + self.alpha * lambda * slope;
        if !succeeded {
            log::debug!("backtracking line search failed, lambda = {lambda:e}");
        }
        Ok(StepReport {
            lambda,
            ynorm: lambda * ynorm,
            gnorm,
            succeeded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ResidualFn,
        vector::{SelfComm, Space},
    };

    #[test]
    fn backtracks_from_an_overshooting_step() {
        // F(x) = atan(x): the Newton step from x = 2 overshoots badly.
        let p = ResidualFn::new(1, |x: &[f64], f: &mut [f64]| {
            f[0] = libm::atan(x[0]);
            Ok(())
        });
        let space = Space::new(SelfComm);
        let mut eval = Evaluator::new(&p, &space, None, 100).unwrap();
        let x = [2.0];
        let f = [libm::atan(2.0)];
        // J = 1/(1 + x²) = 0.2
        let y = [f[0] / 0.2];
        let (mut w, mut g) = ([0.0], [0.0]);
        let report = Backtracking::default()
            .apply(
                &mut eval,
                LineSearchInput {
                    x: &x,
                    f: &f,
                    y: &y,
                    fnorm: f[0],
                },
                &mut w,
                &mut g,
            )
            .unwrap();
        assert!(report.succeeded);
        assert!(report.lambda < 1.0);
        assert!(report.gnorm < f[0]);
        assert!(eval.evaluations() > 1);
    }

    #[test]
    fn fails_uphill_and_returns_last_trial() {
        // Stepping along -F makes things worse in every direction.
        let p = ResidualFn::new(1, |x: &[f64], f: &mut [f64]| {
            f[0] = x[0];
            Ok(())
        });
        let space = Space::new(SelfComm);
        let mut eval = Evaluator::new(&p, &space, None, 100).unwrap();
        let (mut w, mut g) = ([0.0], [0.0]);
        let mut search = Backtracking {
            max_steps: 5,
            ..Default::default()
        };
        let report = search
            .apply(
                &mut eval,
                LineSearchInput {
                    x: &[1.0],
                    f: &[1.0],
                    y: &[-1.0],
                    fnorm: 1.0,
                },
                &mut w,
                &mut g,
            )
            .unwrap();
        assert!(!report.succeeded);
        assert_eq!(eval.evaluations(), 5);
        assert_eq!(w[0], 1.0 + report.lambda);
    }
}
