//! The L-BFGS two-loop recursion.
use crate::{
    history::History,
    monitor::{Monitor, MonitorEvent},
    vector::{Communicator, Space, axpy, scale},
};

/// Write `y ≈ H⁻¹·d`, the inverse-Jacobian approximation built from the
/// newest `min(it, m)` updates in `history`, scaled initially by `h0`.
///
/// With `it` updates accepted since the last restart, the newest one is in
/// slot `(it − 1) mod m`. The backward sweep walks from newest to oldest, the
/// forward sweep from oldest to newest. Only the `alpha`/`beta` scratch of
/// `history` is written.
pub fn apply_inverse_jacobian<C: Communicator>(
    history: &mut History,
    space: &Space<C>,
    it: usize,
    h0: f64,
    d: &[f64],
    y: &mut [f64],
    mut monitor: Option<&mut dyn Monitor>,
) {
    y.copy_from_slice(d);
    let l = history.logical_length(it);

    for i in 0..l {
        let k = (it - i - 1) % l;
        let t = space.dot(history.dx(k), y);
        let alpha = t * history.rho(k);
        history.alpha[k] = alpha;
        if let Some(m) = monitor.as_deref_mut() {
            m.event(&MonitorEvent::Alpha { it, slot: k, alpha });
        }
        axpy(y, -alpha, history.df(k));
    }

    scale(y, h0);

    for i in 0..l {
        let k = (it + i - l) % l;
        let t = space.dot(history.df(k), y);
        let beta = history.rho(k) * t;
        history.beta[k] = beta;
        let value = history.alpha[k] - beta;
        axpy(y, value, history.dx(k));
        if let Some(m) = monitor.as_deref_mut() {
            m.event(&MonitorEvent::AlphaMinusBeta { it, slot: k, value });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{monitor::Recorder, tests::assert_nearly_eq, vector::SelfComm};

    fn outer(a: &[f64], b: &[f64]) -> Vec<Vec<f64>> {
        a.iter().map(|ai| b.iter().map(|bj| ai * bj).collect()).collect()
    }

    fn matmul(a: &[Vec<f64>], b: &[Vec<f64>]) -> Vec<Vec<f64>> {
        let n = a.len();
        (0..n)
            .map(|i| {
                (0..n)
                    .map(|j| (0..n).map(|k| a[i][k] * b[k][j]).sum())
                    .collect()
            })
            .collect()
    }

    fn matvec(a: &[Vec<f64>], x: &[f64]) -> Vec<f64> {
        a.iter()
            .map(|row| row.iter().zip(x).map(|(a, x)| a * x).sum())
            .collect()
    }

    /// `H ← (I − ρ s yᵀ) H (I − ρ y sᵀ) + ρ s sᵀ`
    fn dense_bfgs_update(h: &[Vec<f64>], s: &[f64], y: &[f64]) -> Vec<Vec<f64>> {
        let n = s.len();
        let rho = 1.0 / s.iter().zip(y).map(|(a, b)| a * b).sum::<f64>();
        let sy = outer(s, y);
        let ys = outer(y, s);
        let ss = outer(s, s);
        let left: Vec<Vec<f64>> = (0..n)
            .map(|i| {
                (0..n)
                    .map(|j| f64::from(u8::from(i == j)) - rho * sy[i][j])
                    .collect()
            })
            .collect();
        let right: Vec<Vec<f64>> = (0..n)
            .map(|i| {
                (0..n)
                    .map(|j| f64::from(u8::from(i == j)) - rho * ys[i][j])
                    .collect()
            })
            .collect();
        let mut out = matmul(&matmul(&left, h), &right);
        for i in 0..n {
            for j in 0..n {
                out[i][j] += rho * ss[i][j];
            }
        }
        out
    }

    #[test]
    fn empty_history_just_scales() {
        let space = Space::new(SelfComm);
        let mut h = History::new(0, 3);
        let mut y = vec![0.0; 3];
        apply_inverse_jacobian(&mut h, &space, 5, 2.5, &[1.0, -2.0, 4.0], &mut y, None);
        assert_eq!(y, vec![2.5, -5.0, 10.0]);

        let mut h = History::new(4, 3);
        apply_inverse_jacobian(&mut h, &space, 0, 0.5, &[1.0, -2.0, 4.0], &mut y, None);
        assert_eq!(y, vec![0.5, -1.0, 2.0]);
    }

    #[test]
    fn hand_computed_two_pair_example() {
        // s0 = (1, 0), y0 = (2, 0), s1 = (0, 1), y1 = (0, 4): the history
        // describes the Jacobian diag(2, 4), so H⁻¹·(2, 4) = (1, 1).
        let space = Space::new(SelfComm);
        let mut h = History::new(2, 2);
        h.push(&space, 0, &[1.0, 0.0], &[2.0, 0.0]).unwrap();
        h.push(&space, 1, &[0.0, 1.0], &[0.0, 4.0]).unwrap();
        let mut y = vec![0.0; 2];
        apply_inverse_jacobian(&mut h, &space, 2, 1.0, &[2.0, 4.0], &mut y, None);
        assert_nearly_eq(y[0], 1.0);
        assert_nearly_eq(y[1], 1.0);
        assert_nearly_eq(h.alpha[1], 1.0);
        assert_nearly_eq(h.alpha[0], 1.0);
    }

    #[test]
    fn matches_dense_bfgs_update() {
        let space = Space::new(SelfComm);
        let s = [[1.0, 0.5, -0.25], [0.2, -1.0, 0.4]];
        let yv = [[2.0, 0.3, 0.1], [0.5, -3.0, 1.0]];
        let mut h = History::new(2, 3);
        for (j, (s, y)) in s.iter().zip(&yv).enumerate() {
            h.push(&space, j, s, y).unwrap();
        }

        let identity: Vec<Vec<f64>> = (0..3)
            .map(|i| (0..3).map(|j| f64::from(u8::from(i == j))).collect())
            .collect();
        let mut dense = identity;
        for (s, y) in s.iter().zip(&yv) {
            dense = dense_bfgs_update(&dense, s, y);
        }

        let d = [0.7, -1.3, 2.1];
        let mut y = vec![0.0; 3];
        apply_inverse_jacobian(&mut h, &space, 2, 1.0, &d, &mut y, None);
        let expected = matvec(&dense, &d);
        for (got, want) in y.iter().zip(&expected) {
            assert_nearly_eq(*got, *want);
        }
    }

    #[test]
    fn only_newest_m_updates_are_reachable() {
        let space = Space::new(SelfComm);
        // Three pushes into two slots: the first is overwritten.
        let mut wrapped = History::new(2, 2);
        wrapped.push(&space, 0, &[5.0, 1.0], &[1.0, 7.0]).unwrap();
        wrapped.push(&space, 1, &[1.0, 0.0], &[3.0, 0.0]).unwrap();
        wrapped.push(&space, 2, &[0.0, 1.0], &[0.0, 2.0]).unwrap();

        let mut fresh = History::new(2, 2);
        fresh.push(&space, 1, &[1.0, 0.0], &[3.0, 0.0]).unwrap();
        fresh.push(&space, 2, &[0.0, 1.0], &[0.0, 2.0]).unwrap();

        let d = [1.0, 1.0];
        let (mut a, mut b) = (vec![0.0; 2], vec![0.0; 2]);
        apply_inverse_jacobian(&mut wrapped, &space, 3, 1.0, &d, &mut a, None);
        apply_inverse_jacobian(&mut fresh, &space, 3, 1.0, &d, &mut b, None);
        assert_eq!(a, b);
        assert_nearly_eq(a[0], 1.0 / 3.0);
        assert_nearly_eq(a[1], 0.5);
    }

    #[test]
    fn restart_hides_stale_slots() {
        let space = Space::new(SelfComm);
        let mut reused = History::new(3, 2);
        for (j, (dx, df)) in [
            ([1.0, 2.0], [3.0, 1.0]),
            ([-1.0, 0.5], [-2.0, 4.0]),
            ([0.3, 0.3], [1.0, 5.0]),
        ]
        .iter()
        .enumerate()
        {
            reused.push(&space, j, dx, df).unwrap();
        }
        // After a restart the next update is number 0 again.
        reused.push(&space, 0, &[2.0, -1.0], &[4.0, 1.0]).unwrap();
        assert_eq!(reused.dx(1), &[-1.0, 0.5]);
        assert_eq!(reused.dx(2), &[0.3, 0.3]);

        let mut fresh = History::new(3, 2);
        fresh.push(&space, 0, &[2.0, -1.0], &[4.0, 1.0]).unwrap();

        let d = [0.7, -1.3];
        let (mut a, mut b) = (vec![0.0; 2], vec![0.0; 2]);
        apply_inverse_jacobian(&mut reused, &space, 1, 0.5, &d, &mut a, None);
        apply_inverse_jacobian(&mut fresh, &space, 1, 0.5, &d, &mut b, None);
        assert_eq!(a, b);
    }

    #[test]
    fn reports_coefficients_to_monitor() {
        let space = Space::new(SelfComm);
        let mut h = History::new(3, 1);
        h.push(&space, 0, &[1.0], &[2.0]).unwrap();
        let recorder = Recorder::default();
        let mut sink = recorder.clone();
        let mut y = vec![0.0];
        apply_inverse_jacobian(&mut h, &space, 1, 1.0, &[4.0], &mut y, Some(&mut sink as &mut dyn Monitor));
        assert_nearly_eq(y[0], 2.0);
        let events = recorder.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], MonitorEvent::Alpha { it: 1, slot: 0, .. }));
        assert!(matches!(
            events[1],
            MonitorEvent::AlphaMinusBeta { it: 1, slot: 0, .. }
        ));
    }
}
