//! Observing a solve while it runs.
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

/// Something the solver reports while it runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(not(feature = "unstable-exhaustive"), non_exhaustive)]
pub enum MonitorEvent {
    /// Residual norm at the start of the solve (iteration 0) or after an iteration.
    Residual {
        /// Outer iteration.
        iteration: usize,
        /// `‖F(x) − b‖`
        norm: f64,
    },
    /// Backward sweep coefficient of the two-loop recursion.
    Alpha {
        /// Number of usable updates the recursion ran with.
        it: usize,
        /// History slot.
        slot: usize,
        /// `rho[slot]·(dX[slot]·Y)`
        alpha: f64,
    },
    /// Forward sweep correction of the two-loop recursion.
    AlphaMinusBeta {
        /// Number of usable updates the recursion ran with.
        it: usize,
        /// History slot.
        slot: usize,
        /// `alpha[slot] − beta[slot]`
        value: f64,
    },
    /// Powell's angle test discarded the history.
    Restart {
        /// Outer iteration.
        iteration: usize,
        /// `Dold·D`
        dold_dot_d: f64,
        /// Angle threshold.
        gamma: f64,
        /// `Dold·Dold`
        dold_dot_dold: f64,
    },
    /// An update had unusable curvature, so the history was discarded.
    IllConditioned {
        /// Outer iteration.
        iteration: usize,
        /// History slot.
        slot: usize,
        /// `dX·dF`
        curvature: f64,
    },
}

impl std::fmt::Display for MonitorEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorEvent::Residual { iteration, norm } => {
                write!(f, "{iteration:3} QN Function norm {norm:14.12e}")
            }
            MonitorEvent::Alpha { it, slot, alpha } => {
                write!(f, "  it: {it} k: {slot} alpha:        {alpha:14.12e}")
            }
            MonitorEvent::AlphaMinusBeta { it, slot, value } => {
                write!(f, "  it: {it} k: {slot} alpha - beta: {value:14.12e}")
            }
            MonitorEvent::Restart {
                iteration,
                dold_dot_d,
                gamma,
                dold_dot_dold,
            } => write!(
                f,
                "  restart at {iteration}! |{dold_dot_d:14.12e}| > {gamma:4.2}*|{dold_dot_dold:14.12e}|"
            ),
            MonitorEvent::IllConditioned {
                iteration,
                slot,
                curvature,
            } => write!(
                f,
                "  restart at {iteration}! slot {slot} has curvature {curvature:e}"
            ),
        }
    }
}

/// Receives [`MonitorEvent`]s.
pub trait Monitor {
    /// Handle one event.
    fn event(&mut self, event: &MonitorEvent);
}

impl<F: FnMut(&MonitorEvent)> Monitor for F {
    fn event(&mut self, event: &MonitorEvent) {
        self(event);
    }
}

/// Writes every event to the `log` facade at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMonitor;

impl Monitor for LogMonitor {
    fn event(&mut self, event: &MonitorEvent) {
        log::debug!(target: "qnsolve::monitor", "{event}");
    }
}

/// Keeps every event. Clones share the same buffer, so keep one to read back
/// after handing the other to the solver.
#[derive(Debug, Default, Clone)]
pub struct Recorder {
    events: Arc<Mutex<Vec<MonitorEvent>>>,
}

impl Recorder {
    /// Everything recorded so far.
    pub fn events(&self) -> Vec<MonitorEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Monitor for Recorder {
    fn event(&mut self, event: &MonitorEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
