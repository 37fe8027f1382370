use super::{LineSearch, LineSearchInput, StepReport, trial};
use crate::{
    problem::{EvalFault, Evaluator, Problem},
    vector::Communicator,
};

/// Always take the step `x − damping·y`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Basic {
    /// Fixed step length.
    pub damping: f64,
}

impl Default for Basic {
    fn default() -> Self {
        Self { damping: 1.0 }
    }
}

impl<P, C> LineSearch<P, C> for Basic
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
        let gnorm = trial(eval, &input, self.damping, w, g)?;
        Ok(StepReport {
            lambda: self.damping,
            ynorm: self.damping * eval.space().norm(input.y),
            gnorm,
            succeeded: true,
        })
    }
}
