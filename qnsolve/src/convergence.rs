use crate::{Config, Reason};

/// What the convergence test gets to look at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceContext {
    /// Outer iteration, 0 before the first step.
    pub iteration: usize,
    /// `‖x‖`, or 0 if the line search didn't compute it.
    pub xnorm: f64,
    /// `‖Δx‖` of the last step, 0 at iteration 0.
    pub step_norm: f64,
    /// `‖F(x) − b‖`
    pub fnorm: f64,
    /// Residual evaluations so far.
    pub evaluations: usize,
}

/// Decides when a solve is done.
pub trait ConvergenceTest {
    /// Return [`Reason::Iterating`] to keep going, anything else to stop.
    fn check(&mut self, ctx: &ConvergenceContext) -> Reason;
}

impl<F: FnMut(&ConvergenceContext) -> Reason> ConvergenceTest for F {
    fn check(&mut self, ctx: &ConvergenceContext) -> Reason {
        self(ctx)
    }
}

/// Absolute, relative and step tolerances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefaultConvergence {
    atol: f64,
    rtol: f64,
    stol: f64,
    /// `rtol·‖F(x0)‖`, set at iteration 0.
    ttol: f64,
}

impl DefaultConvergence {
    /// Use the tolerances from `config`.
    pub fn new(config: &Config) -> Self {
        Self {
            atol: config.atol,
            rtol: config.rtol,
            stol: config.stol,
            ttol: 0.0,
        }
    }
}

impl ConvergenceTest for DefaultConvergence {
    fn check(&mut self, ctx: &ConvergenceContext) -> Reason {
        if ctx.iteration == 0 {
            self.ttol = ctx.fnorm * self.rtol;
        }
        if ctx.fnorm.is_nan() {
            return Reason::FnormNan;
        }
        if ctx.fnorm < self.atol {
            return Reason::FnormAbsolute;
        }
        if ctx.iteration > 0 {
            if ctx.fnorm <= self.ttol {
                return Reason::FnormRelative;
            }
            if ctx.step_norm < self.stol * ctx.xnorm {
                return Reason::StepRelative;
            }
        }
        Reason::Iterating
    }
}
