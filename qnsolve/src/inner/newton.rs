use faer::Mat;

use super::{InnerSolver, InnerTolerances};
use crate::{
    QnError, Reason,
    linalg::{DenseLu, square_zeros},
    problem::{Evaluator, Jacobian, check_len},
    vector::{Communicator, Space, axpy},
};

/// Newton's method with a dense Jacobian, `x ← x − J(x)⁻¹·F(x)`.
///
/// Only runs on a single process: the Jacobian must cover the whole system.
pub struct Newton {
    /// When to stop.
    pub tolerances: InnerTolerances,
    jac: Mat<f64>,
    lu: DenseLu,
    f: Vec<f64>,
    step: Vec<f64>,
    fnorm: f64,
}

impl std::fmt::Debug for Newton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Newton")
            .field("tolerances", &self.tolerances)
            .field("fnorm", &self.fnorm)
            .finish_non_exhaustive()
    }
}

impl Default for Newton {
    fn default() -> Self {
        Self::new(InnerTolerances::default().max_iterations)
    }
}

impl Newton {
    /// Take up to `max_iterations` Newton steps.
    pub fn new(max_iterations: usize) -> Self {
        Self {
            tolerances: InnerTolerances {
                max_iterations,
                ..Default::default()
            },
            jac: square_zeros(0),
            lu: DenseLu::default(),
            f: Vec::new(),
            step: Vec::new(),
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

impl<P, C> InnerSolver<P, C> for Newton
where
    P: Jacobian + ?Sized,
    C: Communicator,
{
    fn solve(
        &mut self,
        problem: &P,
        space: &Space<C>,
        rhs: Option<&[f64]>,
        x: &mut [f64],
    ) -> Result<Reason, QnError> {
        if space.comm().size() != 1 {
            return Err(QnError::InvalidConfig {
                option: "inner",
                value: format!("newton on {} processes", space.comm().size()),
                reason: "dense Newton only runs on a single process",
            });
        }
        let n = problem.len();
        check_len(n, x.len())?;
        if self.jac.nrows() != n {
            self.jac = square_zeros(n);
        }
        self.f.resize(n, 0.0);
        self.step.resize(n, 0.0);
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

            for j in 0..n {
                for i in 0..n {
                    self.jac[(i, j)] = 0.0;
                }
            }
            if problem.jacobian(x, self.jac.as_mut()).is_err() {
                return Ok(Reason::FunctionDomain);
            }
            self.lu.factor(self.jac.as_ref());
            self.step.copy_from_slice(&self.f);
            if let Err(e) = self.lu.solve_in_place(&mut self.step) {
                log::debug!("inner Newton linear solve failed at iteration {iteration}: {e:?}");
                return Ok(Reason::LinearSolve);
            }
            axpy(x, -1.0, &self.step);
            iteration += 1;
        }
    }

    fn residual(&self) -> &[f64] {
        Newton::residual(self)
    }

    fn residual_norm(&self) -> f64 {
        Newton::residual_norm(self)
    }
}
