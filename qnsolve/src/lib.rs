//! Limited-memory quasi-Newton solver for systems of nonlinear equations.
//!
//! Finds `x` with `F(x) = b` using the L-BFGS approximation to the inverse
//! Jacobian, with Powell restarts and Shanno scaling. Vectors may be sharded
//! across a group of cooperating processes, see [`Communicator`].
//!
//! ```
//! use qnsolve::{Config, ResidualFn};
//!
//! // x0 = 1, x1³ + x1 = 2
//! let problem = ResidualFn::new(2, |x: &[f64], f: &mut [f64]| {
//!     f[0] = x[0] - 1.0;
//!     f[1] = x[1] * x[1] * x[1] + x[1] - 2.0;
//!     Ok(())
//! });
//! let mut x = vec![0.0, 0.5];
//! let outcome = qnsolve::solve(&problem, &mut x, Config::default()).unwrap();
//! assert!(outcome.is_converged());
//! assert!((x[1] - 1.0).abs() < 1e-6);
//! ```

/// Dense matrices, as used by [`Jacobian`].
pub use faer;

pub use crate::config::{Composition, Config, CurvatureGuard, LineSearchKind};
pub use crate::convergence::{ConvergenceContext, ConvergenceTest, DefaultConvergence};
pub use crate::error::QnError;
pub use crate::history::History;
pub use crate::hooks::{Hooks, NoHooks};
pub use crate::inner::{InnerSolver, InnerTolerances, Newton, Richardson};
pub use crate::line_search::LineSearch;
pub use crate::monitor::{LogMonitor, Monitor, MonitorEvent, Recorder};
pub use crate::problem::{DomainError, EvalFault, Evaluator, Jacobian, Problem, ResidualFn};
pub use crate::solve_outcome::{Reason, SolveOutcome};
pub use crate::solver::{QuasiNewton, powell_restart};
pub use crate::two_loop::apply_inverse_jacobian;
pub use crate::vector::{Communicator, SelfComm, Space, ThreadComm, ThreadGroup};

/// Solver options and their textual form.
mod config;
/// When to stop iterating.
pub mod convergence;
mod error;
/// Circular store of past updates.
pub mod history;
/// User callbacks run inside the iteration.
pub mod hooks;
/// Solvers that can precondition the quasi-Newton iteration.
pub mod inner;
/// Step length selection.
pub mod line_search;
/// Dense LU factorization.
mod linalg;
/// Progress events.
pub mod monitor;
/// Parser for `-name value` option strings.
mod options;
/// Residual functions and evaluation bookkeeping.
pub mod problem;
mod solve_outcome;
/// The quasi-Newton outer iteration.
mod solver;
/// Applying the inverse Jacobian approximation.
mod two_loop;
/// Vector kernels and collective reductions.
pub mod vector;

/// Solve `problem(x) = 0` on a single process, starting from and overwriting `x`.
pub fn solve<P: Problem + ?Sized>(
    problem: &P,
    x: &mut [f64],
    config: Config,
) -> Result<SolveOutcome, QnError> {
    let mut solver = QuasiNewton::<P>::new(config)?;
    solver.solve(problem, &Space::new(SelfComm), None, x)
}
