//! Residual functions and the evaluation bookkeeping around them.
use faer::MatMut;

use crate::{
    QnError, Reason,
    vector::{Communicator, Space},
};

/// The residual was evaluated at a point outside its domain,
/// e.g. a negative argument to a square root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DomainError;

impl std::fmt::Display for DomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("residual evaluated outside its domain")
    }
}

impl std::error::Error for DomainError {}

/// A system of nonlinear equations `F(x) = b`.
///
/// Under a multi-member [`Communicator`], each member only sees the shard of
/// `x` and `F(x)` it owns, and [`Problem::len`] is the local length.
pub trait Problem {
    /// Local number of unknowns, which is also the local number of equations.
    fn len(&self) -> usize;

    /// True if there are no local unknowns.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write `F(x)` into `f`.
    fn residual(&self, x: &[f64], f: &mut [f64]) -> Result<(), DomainError>;
}

/// A [`Problem`] that can also write its (dense, single-process) Jacobian.
pub trait Jacobian: Problem {
    /// Write `∂F_i/∂x_j` into row `i`, column `j` of `jac`, which starts out zeroed.
    fn jacobian(&self, x: &[f64], jac: MatMut<'_, f64>) -> Result<(), DomainError>;
}

impl<P: Problem + ?Sized> Problem for &P {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn residual(&self, x: &[f64], f: &mut [f64]) -> Result<(), DomainError> {
        (**self).residual(x, f)
    }
}

impl<P: Jacobian + ?Sized> Jacobian for &P {
    fn jacobian(&self, x: &[f64], jac: MatMut<'_, f64>) -> Result<(), DomainError> {
        (**self).jacobian(x, jac)
    }
}

/// Adapts a closure into a [`Problem`].
///
/// ```
/// use qnsolve::ResidualFn;
/// // F(x) = x - 3
/// let problem = ResidualFn::new(1, |x: &[f64], f: &mut [f64]| {
///     f[0] = x[0] - 3.0;
///     Ok(())
/// });
/// # let _ = problem;
/// ```
#[derive(Clone)]
pub struct ResidualFn<F> {
    len: usize,
    f: F,
}

impl<F> ResidualFn<F>
where
    F: Fn(&[f64], &mut [f64]) -> Result<(), DomainError>,
{
    /// Wrap `f`, which takes `len` local unknowns.
    pub fn new(len: usize, f: F) -> Self {
        Self { len, f }
    }
}

impl<F> std::fmt::Debug for ResidualFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResidualFn").field("len", &self.len).finish()
    }
}

impl<F> Problem for ResidualFn<F>
where
    F: Fn(&[f64], &mut [f64]) -> Result<(), DomainError>,
{
    fn len(&self) -> usize {
        self.len
    }

    fn residual(&self, x: &[f64], f: &mut [f64]) -> Result<(), DomainError> {
        (self.f)(x, f)
    }
}

/// Why an evaluation didn't produce a residual.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalFault {
    /// Some member of the group evaluated outside the domain.
    Domain,
    /// The evaluation budget ran out before this evaluation.
    Budget,
}

impl From<EvalFault> for Reason {
    fn from(fault: EvalFault) -> Self {
        match fault {
            EvalFault::Domain => Reason::FunctionDomain,
            EvalFault::Budget => Reason::FunctionCount,
        }
    }
}

/// Evaluates `F(x) − b` for a problem, counting evaluations against a budget.
///
/// Every member of the group must evaluate at the same points in the same order,
/// since domain faults are agreed on collectively.
pub struct Evaluator<'a, P: ?Sized, C> {
    problem: &'a P,
    space: &'a Space<C>,
    rhs: Option<&'a [f64]>,
    evaluations: usize,
    max_evaluations: usize,
}

impl<'a, P, C> Evaluator<'a, P, C>
where
    P: Problem + ?Sized,
    C: Communicator,
{
    /// Evaluate `problem` minus `rhs` (if given), at most `max_evaluations` times.
    pub fn new(
        problem: &'a P,
        space: &'a Space<C>,
        rhs: Option<&'a [f64]>,
        max_evaluations: usize,
    ) -> Result<Self, QnError> {
        if let Some(rhs) = rhs {
            check_len(problem.len(), rhs.len())?;
        }
        Ok(Self {
            problem,
            space,
            rhs,
            evaluations: 0,
            max_evaluations,
        })
    }

    /// Write `F(x) − b` into `f`.
    pub fn residual(&mut self, x: &[f64], f: &mut [f64]) -> Result<(), EvalFault> {
        if self.evaluations >= self.max_evaluations {
            return Err(EvalFault::Budget);
        }
        self.evaluations += 1;
        let local_fault = self.problem.residual(x, f).is_err();
        if self.space.any(local_fault) {
            return Err(EvalFault::Domain);
        }
        if let Some(rhs) = self.rhs {
            crate::vector::axpy(f, -1.0, rhs);
        }
        Ok(())
    }

    /// Write `F(x) − b` into `f` and return its norm.
    pub fn residual_norm(&mut self, x: &[f64], f: &mut [f64]) -> Result<f64, EvalFault> {
        self.residual(x, f)?;
        Ok(self.space.norm(f))
    }

    /// The problem being evaluated.
    pub fn problem(&self) -> &'a P {
        self.problem
    }

    /// Collective operations for this problem's vectors.
    pub fn space(&self) -> &'a Space<C> {
        self.space
    }

    /// The right-hand side `b`, if any.
    pub fn rhs(&self) -> Option<&'a [f64]> {
        self.rhs
    }

    /// How many evaluations have been spent.
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }
}

pub(crate) fn check_len(expected: usize, actual: usize) -> Result<(), QnError> {
    if expected == actual {
        Ok(())
    } else {
        Err(QnError::DimensionMismatch { expected, actual })
    }
}
