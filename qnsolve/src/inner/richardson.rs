use super::{InnerSolver, InnerTolerances};
use crate::{
    QnError, Reason,
    problem::{Evaluator, Problem, check_len},
    vector::{Communicator, Space, axpy},
};

/// Nonlinear Richardson iteration, `x ← x − λ·F(x)`.
#[derive(Debug, Clone)]
pub struct Richardson {
    /// Step length `λ`.
    pub damping: f64,
    /// When to stop.
    pub tolerances: InnerTolerances,
    f: Vec<f64>,
    fnorm: f64,
}

impl Default for Richardson {
    fn default() -> Self {
        Self::new(1.0, 1)
    }
}

impl Richardson {
    /// Take up to `max_iterations` steps of length `damping`.
    pub fn new(damping: f64, max_iterations: usize) -> Self {
        Self {
            damping,
            tolerances: InnerTolerances {
                max_iterations,
                ..Default::default()
            },
            f: Vec::new(),
            fnorm: 0.0,
        }
    }

    /// Replace the stopping rules.
    pub fn with_tolerances(mut self, tolerances: InnerTolerances) -> Self {
        self.tolerances = tolerances;
        self
    }

    /// `F(x) − b` where the last solve stopped.
    pub fn residual(&self) -> &[f64] {
        &self.f
    }

    /// `‖F(x) − b‖` where the last solve stopped.
    pub fn residual_norm(&self) -> f64 {
        self.fnorm
    }
}

impl<P, C> InnerSolver<P, C> for Richardson
where
    P: Problem + ?Sized,
    C: Communicator,
{
    fn solve(
        &mut self,
        problem: &P,
        space: &Space<C>,
        rhs: Option<&[f64]>,
        x: &mut [f64],
    ) -> Result<Reason, QnError> {
        check_len(problem.len(), x.len())?;
        self.f.resize(x.len(), 0.0);
        let mut eval = Evaluator::new(problem, space, rhs, self.tolerances.max_function_evaluations)?;

        let mut fnorm0 = 0.0;
        let mut iteration = 0;
        loop {
            self.fnorm = match eval.residual_norm(x, &mut self.f) {
                Ok(norm) => norm,
                Err(fault) => return Ok(fault.into()),
            };
            if iteration == 0 {
                fnorm0 = self.fnorm;
            }
            let reason = self.tolerances.check(iteration, self.fnorm, fnorm0);
            if reason.is_terminal() {
                return Ok(reason);
            }
            axpy(x, -self.damping, &self.f);
            iteration += 1;
        }
    }

    fn residual(&self) -> &[f64] {
        Richardson::residual(self)
    }

    fn residual_norm(&self) -> f64 {
        Richardson::residual_norm(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ResidualFn, tests::assert_nearly_eq, vector::SelfComm};

    #[test]
    fn contracts_towards_the_root() {
        // F(x) = x/2 − 1 has its root at 2. Richardson with λ = 1 halves the error.
        let p = ResidualFn::new(1, |x: &[f64], f: &mut [f64]| {
            f[0] = 0.5 * x[0] - 1.0;
            Ok(())
        });
        let mut r = Richardson::new(1.0, 3);
        let mut x = [0.0];
        let reason = r.solve(&p, &Space::new(SelfComm), None, &mut x).unwrap();
        assert_eq!(reason, Reason::MaxIterations);
        assert_nearly_eq(x[0], 1.75);
        assert_nearly_eq(r.residual_norm(), 0.125);
    }

    #[test]
    fn zero_iterations_leave_the_iterate_alone() {
        let p = ResidualFn::new(2, |x: &[f64], f: &mut [f64]| {
            f[0] = x[0] - 1.0;
            f[1] = x[1] + 1.0;
            Ok(())
        });
        let mut r = Richardson::new(1.0, 0);
        let mut x = [3.0, 3.0];
        let reason = r
            .solve(&p, &Space::new(SelfComm), Some(&[1.0, 0.0]), &mut x)
            .unwrap();
        assert_eq!(reason, Reason::MaxIterations);
        assert_eq!(x, [3.0, 3.0]);
        assert_eq!(r.residual(), &[1.0, 4.0]);
    }

    #[test]
    fn domain_faults_are_reasons() {
        let p = ResidualFn::new(1, |_: &[f64], _: &mut [f64]| Err(crate::DomainError));
        let mut r = Richardson::new(1.0, 5);
        let reason = r.solve(&p, &Space::new(SelfComm), None, &mut [0.0]).unwrap();
        assert_eq!(reason, Reason::FunctionDomain);
        assert!(reason.is_diverged());
    }
}
