use crate::{
    Config, CurvatureGuard, QnError,
    history::{History, PushError},
    monitor::{Monitor, MonitorEvent},
    two_loop::apply_inverse_jacobian,
    vector::{Communicator, Space},
};

/// Powell's angle test: has the correction turned too far from the last one?
///
/// True iff `|Dold·D| > gamma·|Dold·Dold|`. Equality does not restart.
pub fn powell_restart(dold_dot_d: f64, dold_dot_dold: f64, gamma: f64) -> bool {
    dold_dot_d.abs() > gamma * dold_dot_dold.abs()
}

/// What the policy did with the latest update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Decision {
    /// The update was stored in this slot and the direction came from the recursion.
    Accepted { slot: usize },
    /// Nothing was stored, the direction is just `H0·D`.
    Unstored,
    /// Powell's test discarded the history; the direction is `D`.
    Restarted,
    /// The update had unusable curvature; the history was discarded and the direction is `D`.
    IllConditioned,
}

/// Vectors the policy reads.
pub(crate) struct Update<'a> {
    pub x: &'a [f64],
    pub xold: &'a [f64],
    pub d: &'a [f64],
    pub dold: &'a [f64],
}

/// Decides, after each outer iteration, whether to extend the history or restart,
/// and produces the next search direction.
#[derive(Debug, Clone, Copy)]
pub(crate) struct UpdatePolicy {
    gamma: f64,
    guard: CurvatureGuard,
    /// `H0`
    pub scaling: f64,
    /// Updates accepted since the last restart. The next one goes in slot `accepted mod m`.
    pub accepted: usize,
    /// Restarts so far, for either reason.
    pub restarts: usize,
}

impl UpdatePolicy {
    pub fn new(config: &Config) -> Self {
        Self {
            gamma: config.powell_gamma,
            guard: config.curvature_guard,
            scaling: config.scaling,
            accepted: 0,
            restarts: 0,
        }
    }

    /// Write the next search direction into `y`.
    pub fn update<C: Communicator>(
        &mut self,
        history: &mut History,
        space: &Space<C>,
        iteration: usize,
        v: Update<'_>,
        y: &mut [f64],
        mut monitor: Option<&mut dyn Monitor>,
    ) -> Result<Decision, QnError> {
        let dold_dot_dold = space.dot(v.dold, v.dold);
        let dold_dot_d = space.dot(v.dold, v.d);
        if powell_restart(dold_dot_d, dold_dot_dold, self.gamma) {
            log::debug!(
                "restart at iteration {iteration}: |{dold_dot_d:e}| > {}·|{dold_dot_dold:e}|",
                self.gamma
            );
            if let Some(m) = monitor.as_deref_mut() {
                m.event(&MonitorEvent::Restart {
                    iteration,
                    dold_dot_d,
                    gamma: self.gamma,
                    dold_dot_dold,
                });
            }
            self.restart(v.d, y);
            return Ok(Decision::Restarted);
        }

        match history.push_differences(space, self.accepted, (v.x, v.xold), (v.d, v.dold)) {
            Ok(dots) => {
                self.scaling = dots.shanno_scaling();
                self.accepted += 1;
                apply_inverse_jacobian(history, space, self.accepted, self.scaling, v.d, y, monitor);
                Ok(Decision::Accepted { slot: dots.slot })
            }
            Err(PushError::NoCapacity) => {
                apply_inverse_jacobian(history, space, 0, self.scaling, v.d, y, monitor);
                Ok(Decision::Unstored)
            }
            Err(PushError::IllConditioned { slot, curvature }) => match self.guard {
                CurvatureGuard::Fail => Err(QnError::IllConditionedUpdate { slot, curvature }),
                CurvatureGuard::Restart => {
                    log::warn!(
                        "ill-conditioned update at iteration {iteration} (dX·dF = {curvature:e}), restarting"
                    );
                    if let Some(m) = monitor.as_deref_mut() {
                        m.event(&MonitorEvent::IllConditioned {
                            iteration,
                            slot,
                            curvature,
                        });
                    }
                    self.restart(v.d, y);
                    Ok(Decision::IllConditioned)
                }
            },
        }
    }

    fn restart(&mut self, d: &[f64], y: &mut [f64]) {
        self.accepted = 0;
        self.restarts += 1;
        y.copy_from_slice(d);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{monitor::Recorder, vector::SelfComm};

    #[test]
    fn powell_test_is_strict() {
        assert!(!powell_restart(0.9, 1.0, 0.9));
        assert!(powell_restart(0.900_000_1, 1.0, 0.9));
        assert!(powell_restart(-0.95, 1.0, 0.9));
        assert!(!powell_restart(0.0, 0.0, 0.9));
    }

    fn update(
        policy: &mut UpdatePolicy,
        history: &mut History,
        (x, xold, d, dold): ([f64; 2], [f64; 2], [f64; 2], [f64; 2]),
    ) -> Result<(Decision, [f64; 2]), QnError> {
        let mut y = [0.0; 2];
        let decision = policy.update(
            history,
            &Space::new(SelfComm),
            1,
            Update {
                x: &x,
                xold: &xold,
                d: &d,
                dold: &dold,
            },
            &mut y,
            None,
        )?;
        Ok((decision, y))
    }

    #[test]
    fn accepted_updates_rescale_and_advance() {
        let mut policy = UpdatePolicy::new(&Config::default());
        let mut history = History::new(2, 2);
        // dX = (1, 0), dF = (−2, 0): D turned back on itself, so no restart.
        let (decision, y) = update(
            &mut policy,
            &mut history,
            ([1.0, 0.0], [0.0, 0.0], [0.0, 0.5], [2.0, 0.5]),
        )
        .unwrap();
        assert_eq!(decision, Decision::Accepted { slot: 0 });
        assert_eq!(policy.accepted, 1);
        assert_eq!(policy.scaling, -0.5);
        assert_eq!(history.rho(0), -0.5);
        // The new pair has nothing to say about the second component.
        assert_eq!(y, [0.0, -0.25]);
    }

    #[test]
    fn aligned_corrections_restart_and_next_update_lands_in_slot_zero() {
        let mut policy = UpdatePolicy::new(&Config::default());
        let mut history = History::new(3, 2);
        policy.accepted = 2;
        let recorder = Recorder::default();
        let mut sink = recorder.clone();
        let mut y = [0.0; 2];
        let decision = policy
            .update(
                &mut history,
                &Space::new(SelfComm),
                7,
                Update {
                    x: &[1.0, 1.0],
                    xold: &[0.0, 0.0],
                    d: &[1.0, 0.0],
                    dold: &[1.0, 0.0],
                },
                &mut y,
                Some(&mut sink as &mut dyn Monitor),
            )
            .unwrap();
        assert_eq!(decision, Decision::Restarted);
        assert_eq!(y, [1.0, 0.0]);
        assert_eq!(policy.accepted, 0);
        assert_eq!(policy.restarts, 1);
        assert!(matches!(
            recorder.events()[..],
            [MonitorEvent::Restart { iteration: 7, .. }]
        ));

        let (decision, _) = update(
            &mut policy,
            &mut history,
            ([1.0, 0.0], [0.0, 0.0], [0.0, 0.5], [2.0, 0.5]),
        )
        .unwrap();
        assert_eq!(decision, Decision::Accepted { slot: 0 });
    }

    #[test]
    fn first_update_after_restart_ignores_older_pairs() {
        let space = Space::new(SelfComm);
        let mut policy = UpdatePolicy::new(&Config::default());
        let mut history = History::new(3, 2);
        history.push(&space, 0, &[1.0, 2.0], &[3.0, 1.0]).unwrap();
        history.push(&space, 1, &[-1.0, 0.5], &[-2.0, 4.0]).unwrap();
        history.push(&space, 2, &[0.3, 0.3], &[1.0, 5.0]).unwrap();
        policy.accepted = 3;

        let (decision, _) = update(
            &mut policy,
            &mut history,
            ([1.0, 1.0], [0.0, 0.0], [1.0, 0.0], [1.0, 0.0]),
        )
        .unwrap();
        assert_eq!(decision, Decision::Restarted);

        let vectors = ([1.0, 0.0], [0.0, 0.0], [0.0, 0.5], [2.0, 0.5]);
        let (decision, y) = update(&mut policy, &mut history, vectors).unwrap();
        assert_eq!(decision, Decision::Accepted { slot: 0 });
        assert_eq!(history.rho(1), 1.0 / (2.0 + 2.0));

        let mut clean_policy = UpdatePolicy::new(&Config::default());
        let mut clean_history = History::new(3, 2);
        let (_, expected) = update(&mut clean_policy, &mut clean_history, vectors).unwrap();
        assert_eq!(y, expected);
    }

    #[test]
    fn zero_history_uses_scaled_correction() {
        let mut policy = UpdatePolicy::new(&Config::default().with_scaling(3.0));
        let mut history = History::new(0, 2);
        let (decision, y) = update(
            &mut policy,
            &mut history,
            ([1.0, 0.0], [0.0, 0.0], [0.0, 0.5], [2.0, 0.5]),
        )
        .unwrap();
        assert_eq!(decision, Decision::Unstored);
        assert_eq!(y, [0.0, 1.5]);
    }

    #[test]
    fn ill_conditioned_updates_follow_the_guard() {
        // dX = (0, 1) is orthogonal to dF = (−2, 0).
        let vectors = ([0.0, 1.0], [0.0, 0.0], [0.0, 0.5], [2.0, 0.5]);

        let mut policy = UpdatePolicy::new(&Config::default());
        let mut history = History::new(2, 2);
        let (decision, y) = update(&mut policy, &mut history, vectors).unwrap();
        assert_eq!(decision, Decision::IllConditioned);
        assert_eq!(y, [0.0, 0.5]);
        assert_eq!(policy.restarts, 1);

        let mut policy =
            UpdatePolicy::new(&Config::default().with_curvature_guard(CurvatureGuard::Fail));
        let err = update(&mut policy, &mut history, vectors).unwrap_err();
        assert_eq!(
            err,
            QnError::IllConditionedUpdate {
                slot: 0,
                curvature: 0.0
            }
        );
    }
}
