/// Hard faults that stop a solve.
///
/// Ordinary terminal states (converged, diverged, out of iterations) are not
/// errors, they're reported through [`crate::Reason`] on a successful
/// [`crate::SolveOutcome`].
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[cfg_attr(not(feature = "unstable-exhaustive"), non_exhaustive)]
pub enum QnError {
    /// A residual norm was infinite or NaN.
    #[error("Infinite or not-a-number generated in norm at iteration {iteration}")]
    NonFiniteNorm {
        /// Outer iteration where the norm was computed.
        iteration: usize,
    },
    /// The step and residual differences of an update were (nearly) orthogonal,
    /// so their curvature scalar can't be inverted.
    #[error(
        "Ill-conditioned quasi-Newton update in history slot {slot}: dX·dF = {curvature:e}"
    )]
    IllConditionedUpdate {
        /// Which history slot the update was written into.
        slot: usize,
        /// The offending value of `dX·dF`.
        curvature: f64,
    },
    /// A vector had the wrong length for this problem.
    #[error("Expected a vector of local length {expected}, but got {actual}")]
    DimensionMismatch {
        /// Local length the problem declared.
        expected: usize,
        /// Length actually passed in.
        actual: usize,
    },
    /// A configuration value is out of range.
    #[error("Invalid value {value} for {option}: {reason}")]
    InvalidConfig {
        /// Name of the offending option.
        option: &'static str,
        /// The rejected value, formatted.
        value: String,
        /// What the valid range is.
        reason: &'static str,
    },
    /// An options string couldn't be parsed.
    #[error("Could not parse options: {0}")]
    InvalidOptions(String),
}
