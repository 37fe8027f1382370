/// Caller code run at fixed points of each outer iteration.
///
/// Both hooks run on every member of the group, so anything they do to
/// the direction must be agreed on collectively.
pub trait Hooks {
    /// Called just before the line search. May adjust the search direction `y`.
    /// Return true if `y` was changed.
    fn pre_check(&mut self, _x: &[f64], _y: &mut [f64]) -> bool {
        false
    }

    /// Called once per iteration after the quasi-Newton update (or restart),
    /// with the current outer iteration number.
    fn update(&mut self, _iteration: usize) {}
}

/// Does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl Hooks for NoHooks {}
