use serde::Serialize;

/// Why a solve stopped, or [`Reason::Iterating`] if it hasn't yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[cfg_attr(not(feature = "unstable-exhaustive"), non_exhaustive)]
pub enum Reason {
    /// Still going.
    Iterating,
    /// Residual norm dropped below the absolute tolerance.
    FnormAbsolute,
    /// Residual norm dropped below the relative tolerance times the initial norm.
    FnormRelative,
    /// Step became small relative to the iterate.
    StepRelative,
    /// Ran out of iterations. Not converged, but not diverged either.
    MaxIterations,
    /// The residual was evaluated outside its domain.
    FunctionDomain,
    /// Ran out of residual evaluations.
    FunctionCount,
    /// The line search failed too many times.
    LineSearch,
    /// The inner (preconditioning) solver diverged.
    Inner,
    /// The residual norm became NaN.
    FnormNan,
    /// A linear solve inside an inner solver failed.
    LinearSolve,
}

impl Reason {
    /// Did the solve reach a solution?
    pub fn is_converged(self) -> bool {
        matches!(
            self,
            Self::FnormAbsolute | Self::FnormRelative | Self::StepRelative
        )
    }

    /// Did the solve fail outright?
    /// Running out of iterations is not divergence.
    pub fn is_diverged(self) -> bool {
        matches!(
            self,
            Self::FunctionDomain
                | Self::FunctionCount
                | Self::LineSearch
                | Self::Inner
                | Self::FnormNan
                | Self::LinearSolve
        )
    }

    /// Has the solve stopped?
    pub fn is_terminal(self) -> bool {
        self != Self::Iterating
    }
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Reason::Iterating => "still iterating",
            Reason::FnormAbsolute => "converged: residual norm below absolute tolerance",
            Reason::FnormRelative => "converged: residual norm below relative tolerance",
            Reason::StepRelative => "converged: step small relative to solution",
            Reason::MaxIterations => "did not converge: reached the maximum number of iterations",
            Reason::FunctionDomain => "diverged: residual evaluated outside its domain",
            Reason::FunctionCount => "diverged: reached the maximum number of residual evaluations",
            Reason::LineSearch => "diverged: line search failed",
            Reason::Inner => "diverged: inner solver failed",
            Reason::FnormNan => "diverged: residual norm is NaN",
            Reason::LinearSolve => "diverged: linear solve failed",
        };
        f.write_str(s)
    }
}

/// Data from a finished solve, whether or not it converged.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(not(feature = "unstable-exhaustive"), non_exhaustive)]
pub struct SolveOutcome {
    /// Why the solve stopped.
    pub(crate) reason: Reason,
    /// How many outer iterations ran.
    pub(crate) iterations: usize,
    /// Norm of the final residual.
    pub(crate) residual_norm: f64,
    /// Residual norm after each iteration, starting with the initial guess.
    pub(crate) residual_history: Vec<f64>,
    /// How many times the residual was evaluated.
    pub(crate) function_evaluations: usize,
    /// How many line searches failed but were accepted anyway.
    pub(crate) line_search_failures: usize,
    /// How many times curvature history was discarded.
    pub(crate) restarts: usize,
}

impl SolveOutcome {
    /// Why the solve stopped.
    pub fn reason(&self) -> Reason {
        self.reason
    }

    /// How many outer iterations ran.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Norm of the final residual.
    pub fn residual_norm(&self) -> f64 {
        self.residual_norm
    }

    /// Residual norm after each iteration, starting with the initial guess.
    pub fn residual_history(&self) -> &[f64] {
        &self.residual_history
    }

    /// How many times the residual was evaluated.
    pub fn function_evaluations(&self) -> usize {
        self.function_evaluations
    }

    /// How many line searches failed but were accepted anyway.
    pub fn line_search_failures(&self) -> usize {
        self.line_search_failures
    }

    /// How many times curvature history was discarded.
    pub fn restarts(&self) -> usize {
        self.restarts
    }

    /// Did the solve converge?
    pub fn is_converged(&self) -> bool {
        self.reason.is_converged()
    }
}
