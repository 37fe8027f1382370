use crate::{
    Composition, Config, QnError, Reason, SolveOutcome,
    convergence::{ConvergenceContext, ConvergenceTest, DefaultConvergence},
    history::History,
    hooks::{Hooks, NoHooks},
    inner::InnerSolver,
    line_search::{self, LineSearch, LineSearchInput},
    monitor::{LogMonitor, Monitor, MonitorEvent},
    problem::{Evaluator, Problem, check_len},
    vector::{Communicator, SelfComm, Space, aypx},
};

pub use policy::powell_restart;
use policy::{Update, UpdatePolicy};

mod policy;

/// Limited-memory quasi-Newton (L-BFGS) solver for `F(x) = b`.
///
/// One instance drives one solve at a time. Between solves it keeps the
/// residual and its norm at the last iterate, so it can also serve as an
/// [`InnerSolver`] for another solver.
pub struct QuasiNewton<P: ?Sized, C = SelfComm> {
    config: Config,
    history: History,
    work: Work,
    fnorm: f64,
    line_search: Box<dyn LineSearch<P, C>>,
    inner: Option<Box<dyn InnerSolver<P, C>>>,
    convergence: Box<dyn ConvergenceTest>,
    monitor: Option<Box<dyn Monitor>>,
    hooks: Box<dyn Hooks>,
}

/// Vectors owned by the solver, all of local length `n`.
#[derive(Debug, Default)]
struct Work {
    /// Residual `F(X) − b`.
    f: Vec<f64>,
    /// Search direction.
    y: Vec<f64>,
    xold: Vec<f64>,
    /// Line search output: new iterate.
    w: Vec<f64>,
    /// Line search output: new residual.
    g: Vec<f64>,
    /// Current correction.
    d: Vec<f64>,
    dold: Vec<f64>,
}

impl Work {
    fn resize(&mut self, n: usize) {
        for v in [
            &mut self.f,
            &mut self.y,
            &mut self.xold,
            &mut self.w,
            &mut self.g,
            &mut self.d,
            &mut self.dold,
        ] {
            v.resize(n, 0.0);
        }
    }
}

impl<P, C> QuasiNewton<P, C>
where
    P: Problem + ?Sized,
    C: Communicator,
{
    /// A solver using `config`. Fails if the configuration is invalid.
    pub fn new(config: Config) -> Result<Self, QnError> {
        config.validate()?;
        Ok(Self {
            config,
            history: History::default(),
            work: Work::default(),
            fnorm: 0.0,
            line_search: line_search::from_kind(config.line_search),
            inner: None,
            convergence: Box::new(DefaultConvergence::new(&config)),
            monitor: config.monitor.then(|| Box::new(LogMonitor) as Box<dyn Monitor>),
            hooks: Box::new(NoHooks),
        })
    }

    /// Use this line search instead of the configured one.
    pub fn with_line_search(mut self, line_search: Box<dyn LineSearch<P, C>>) -> Self {
        self.line_search = line_search;
        self
    }

    /// Precondition every iteration with `inner`, composed as the configuration says.
    pub fn with_inner(mut self, inner: Box<dyn InnerSolver<P, C>>) -> Self {
        self.inner = Some(inner);
        self
    }

    /// Decide convergence with `test` instead of the configured tolerances.
    pub fn with_convergence_test(mut self, test: Box<dyn ConvergenceTest>) -> Self {
        self.convergence = test;
        self
    }

    /// Send monitor events to `monitor`. This turns monitoring on.
    pub fn with_monitor(mut self, monitor: Box<dyn Monitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Run `hooks` before each line search and after each update.
    pub fn with_hooks(mut self, hooks: Box<dyn Hooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// The configuration this solver was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// `F(x) − b` where the last solve stopped.
    pub fn residual(&self) -> &[f64] {
        &self.work.f
    }

    /// `‖F(x) − b‖` where the last solve stopped.
    pub fn residual_norm(&self) -> f64 {
        self.fnorm
    }

    /// Free the history and work vectors. The next solve allocates them again.
    pub fn reset(&mut self) {
        self.history.release();
        self.work = Work::default();
        self.fnorm = 0.0;
    }

    fn setup(&mut self, n: usize) {
        if self.history.capacity() != self.config.history_size || self.history.vector_len() != n {
            self.history = History::new(self.config.history_size, n);
        }
        self.work.resize(n);
    }

    /// Solve `problem(x) = rhs` (or `= 0` without `rhs`), starting from and overwriting `x`.
    ///
    /// Every member of `space`'s group must call this together, each with its own shard.
    /// Running out of iterations, and every kind of divergence, is reported through
    /// [`SolveOutcome::reason`]. Errors are reserved for bad inputs and numeric faults.
    pub fn solve(
        &mut self,
        problem: &P,
        space: &Space<C>,
        rhs: Option<&[f64]>,
        x: &mut [f64],
    ) -> Result<SolveOutcome, QnError> {
        let n = problem.len();
        check_len(n, x.len())?;
        self.setup(n);
        let mut eval = Evaluator::new(problem, space, rhs, self.config.max_function_evaluations)?;

        let Self {
            config,
            history,
            work,
            fnorm,
            line_search,
            inner,
            convergence,
            monitor,
            hooks,
        } = self;
        let mut policy = UpdatePolicy::new(config);
        let mut run = Run::default();

        // Init
        *fnorm = match eval.residual_norm(x, &mut work.f) {
            Ok(norm) => norm,
            Err(fault) => return Ok(run.finish(fault.into(), &policy, &eval, *fnorm)),
        };
        if !fnorm.is_finite() {
            return Err(QnError::NonFiniteNorm { iteration: 0 });
        }
        run.record(0, *fnorm, monitor.as_deref_mut());
        let reason = convergence.check(&ConvergenceContext {
            iteration: 0,
            xnorm: 0.0,
            step_norm: 0.0,
            fnorm: *fnorm,
            evaluations: eval.evaluations(),
        });
        if reason.is_terminal() {
            return Ok(run.finish(reason, &policy, &eval, *fnorm));
        }

        let mut inner = inner.as_deref_mut();
        if let Some(reason) =
            correction(config.composition, inner.as_deref_mut(), &eval, x, work, fnorm)?
        {
            return Ok(run.finish(reason, &policy, &eval, *fnorm));
        }
        work.y.copy_from_slice(&work.d);

        for i in 0..config.max_iterations {
            work.dold.copy_from_slice(&work.d);
            work.xold.copy_from_slice(x);
            hooks.pre_check(x, &mut work.y);

            let step = line_search.apply(
                &mut eval,
                LineSearchInput {
                    x,
                    f: &work.f,
                    y: &work.y,
                    fnorm: *fnorm,
                },
                &mut work.w,
                &mut work.g,
            );
            let step = match step {
                Ok(step) => step,
                Err(fault) => return Ok(run.finish(fault.into(), &policy, &eval, *fnorm)),
            };
            if !step.succeeded {
                run.line_search_failures += 1;
                log::debug!(
                    "line search failed at iteration {} ({} of {} allowed)",
                    i + 1,
                    run.line_search_failures,
                    config.max_line_search_failures
                );
                if run.line_search_failures >= config.max_line_search_failures {
                    return Ok(run.finish(Reason::LineSearch, &policy, &eval, *fnorm));
                }
            }
            if step.gnorm.is_infinite() {
                return Err(QnError::NonFiniteNorm { iteration: i + 1 });
            }

            x.copy_from_slice(&work.w);
            work.f.copy_from_slice(&work.g);
            *fnorm = step.gnorm;
            let iteration = i + 1;
            run.iterations = iteration;
            log::debug!(
                "iteration {iteration}: fnorm = {:e}, ynorm = {:e}, lambda = {:e}, succeeded = {}",
                step.gnorm,
                step.ynorm,
                step.lambda,
                step.succeeded
            );
            run.record(iteration, *fnorm, monitor.as_deref_mut());
            let reason = convergence.check(&ConvergenceContext {
                iteration,
                xnorm: space.norm(x),
                step_norm: step.ynorm,
                fnorm: *fnorm,
                evaluations: eval.evaluations(),
            });
            if reason.is_terminal() {
                return Ok(run.finish(reason, &policy, &eval, *fnorm));
            }

            if let Some(reason) =
                correction(config.composition, inner.as_deref_mut(), &eval, x, work, fnorm)?
            {
                return Ok(run.finish(reason, &policy, &eval, *fnorm));
            }

            policy.update(
                history,
                space,
                iteration,
                Update {
                    x,
                    xold: &work.xold,
                    d: &work.d,
                    dold: &work.dold,
                },
                &mut work.y,
                monitor.as_deref_mut().map(|m| m as &mut dyn Monitor),
            )?;
            hooks.update(iteration);
        }

        log::info!("maximum number of iterations reached: {}", config.max_iterations);
        Ok(run.finish(Reason::MaxIterations, &policy, &eval, *fnorm))
    }
}

/// Compute the correction `D` at the current iterate.
///
/// Without an inner solver `D = F`. In sequential composition the inner solver
/// moves `x` first, and its residual becomes both `F` and `D`. In composed mode
/// `D` is the change the inner solver would make to `x`.
///
/// Returns the terminal reason if the inner solver diverged.
fn correction<P, C>(
    composition: Composition,
    inner: Option<&mut (dyn InnerSolver<P, C> + 'static)>,
    eval: &Evaluator<'_, P, C>,
    x: &mut [f64],
    work: &mut Work,
    fnorm: &mut f64,
) -> Result<Option<Reason>, QnError>
where
    P: Problem + ?Sized,
    C: Communicator,
{
    let Some(inner) = inner else {
        work.d.copy_from_slice(&work.f);
        return Ok(None);
    };
    let reason = match composition {
        Composition::Sequential => {
            let reason = inner.solve(eval.problem(), eval.space(), eval.rhs(), x)?;
            work.f.copy_from_slice(inner.residual());
            *fnorm = inner.residual_norm();
            work.d.copy_from_slice(&work.f);
            reason
        }
        Composition::Composed => {
            work.d.copy_from_slice(x);
            let reason = inner.solve(eval.problem(), eval.space(), eval.rhs(), &mut work.d)?;
            aypx(&mut work.d, -1.0, x);
            reason
        }
    };
    if reason.is_diverged() {
        log::info!("inner solver diverged: {reason}");
        return Ok(Some(Reason::Inner));
    }
    Ok(None)
}

/// Counters for one solve.
#[derive(Debug, Default)]
struct Run {
    iterations: usize,
    residual_history: Vec<f64>,
    line_search_failures: usize,
}

impl Run {
    fn record(&mut self, iteration: usize, fnorm: f64, monitor: Option<&mut (dyn Monitor + 'static)>) {
        self.residual_history.push(fnorm);
        if let Some(m) = monitor {
            m.event(&MonitorEvent::Residual {
                iteration,
                norm: fnorm,
            });
        }
    }

    fn finish<P, C>(
        self,
        reason: Reason,
        policy: &UpdatePolicy,
        eval: &Evaluator<'_, P, C>,
        fnorm: f64,
    ) -> SolveOutcome
    where
        P: Problem + ?Sized,
        C: Communicator,
    {
        log::info!(
            "QN solve stopped after {} iterations, fnorm = {fnorm:e}: {reason}",
            self.iterations
        );
        SolveOutcome {
            reason,
            iterations: self.iterations,
            residual_norm: fnorm,
            residual_history: self.residual_history,
            function_evaluations: eval.evaluations(),
            line_search_failures: self.line_search_failures,
            restarts: policy.restarts,
        }
    }
}

impl<P, C> InnerSolver<P, C> for QuasiNewton<P, C>
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
        QuasiNewton::solve(self, problem, space, rhs, x).map(|outcome| outcome.reason())
    }

    fn residual(&self) -> &[f64] {
        QuasiNewton::residual(self)
    }

    fn residual_norm(&self) -> f64 {
        QuasiNewton::residual_norm(self)
    }
}
