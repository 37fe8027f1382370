//! Circular store of past quasi-Newton updates.
use crate::vector::{Communicator, Space, diff};

/// Pairs whose curvature `dX·dF` is smaller than this times `‖dX‖‖dF‖`
/// are treated as orthogonal.
pub const CURVATURE_EPSILON: f64 = f64::EPSILON;

/// Why an update was not accepted into the store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PushError {
    /// The store has capacity zero.
    NoCapacity,
    /// `dX·dF` is zero, non-finite or negligible, so `rho` can't be formed.
    IllConditioned {
        /// Slot the pair was written into.
        slot: usize,
        /// The offending `dX·dF`.
        curvature: f64,
    },
}

/// Dot products of an accepted pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairDots {
    /// Slot the pair went into.
    pub slot: usize,
    /// `dX·dF`
    pub curvature: f64,
    /// `dF·dF`
    pub df_norm_sq: f64,
}

impl PairDots {
    /// Shanno's choice of initial inverse-Hessian scaling, `(dX·dF)/(dF·dF)`.
    pub fn shanno_scaling(&self) -> f64 {
        self.curvature / self.df_norm_sq
    }
}

/// Up to `m` (step change, residual change, `1/curvature`) triples.
///
/// The `j`-th update goes into slot `j mod m`, overwriting whatever was there.
/// Nothing is ever removed: callers track how many recent updates are valid
/// and ask for [`History::logical_length`].
#[derive(Debug, Clone, Default)]
pub struct History {
    capacity: usize,
    len: usize,
    /// `capacity` step differences of `len` each, back to back.
    dx: Vec<f64>,
    /// `capacity` residual differences of `len` each, back to back.
    df: Vec<f64>,
    rho: Vec<f64>,
    pub(crate) alpha: Vec<f64>,
    pub(crate) beta: Vec<f64>,
}

impl History {
    /// Allocate room for `capacity` updates of vectors with local length `len`.
    pub fn new(capacity: usize, len: usize) -> Self {
        Self {
            capacity,
            len,
            dx: vec![0.0; capacity * len],
            df: vec![0.0; capacity * len],
            rho: vec![0.0; capacity],
            alpha: vec![0.0; capacity],
            beta: vec![0.0; capacity],
        }
    }

    /// Maximum number of updates kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Local length of the stored vectors.
    pub fn vector_len(&self) -> usize {
        self.len
    }

    /// How many stored updates are usable after `accepted` pushes since the last restart.
    pub fn logical_length(&self, accepted: usize) -> usize {
        accepted.min(self.capacity)
    }

    /// Free the storage. The store has capacity zero afterwards.
    pub fn release(&mut self) {
        *self = Self::default();
    }

    /// Store `dx`, `df` as update number `index` (zero-based since the last restart).
    pub fn push<C: Communicator>(
        &mut self,
        space: &Space<C>,
        index: usize,
        dx: &[f64],
        df: &[f64],
    ) -> Result<PairDots, PushError> {
        let slot = self.slot(index)?;
        self.dx_mut(slot).copy_from_slice(dx);
        self.df_mut(slot).copy_from_slice(df);
        self.finish_push(space, slot)
    }

    /// Store `x − xold`, `d − dold` as update number `index`,
    /// forming the differences in place.
    pub fn push_differences<C: Communicator>(
        &mut self,
        space: &Space<C>,
        index: usize,
        (x, xold): (&[f64], &[f64]),
        (d, dold): (&[f64], &[f64]),
    ) -> Result<PairDots, PushError> {
        let slot = self.slot(index)?;
        diff(self.dx_mut(slot), x, xold);
        diff(self.df_mut(slot), d, dold);
        self.finish_push(space, slot)
    }

    fn slot(&self, index: usize) -> Result<usize, PushError> {
        if self.capacity == 0 {
            return Err(PushError::NoCapacity);
        }
        Ok(index % self.capacity)
    }

    fn finish_push<C: Communicator>(
        &mut self,
        space: &Space<C>,
        slot: usize,
    ) -> Result<PairDots, PushError> {
        let curvature = space.dot(self.dx(slot), self.df(slot));
        let df_norm_sq = space.dot(self.df(slot), self.df(slot));
        let dx_norm_sq = space.dot(self.dx(slot), self.dx(slot));
        let floor = CURVATURE_EPSILON * libm::sqrt(dx_norm_sq * df_norm_sq);
        if !curvature.is_finite() || curvature == 0.0 || curvature.abs() < floor {
            return Err(PushError::IllConditioned { slot, curvature });
        }
        self.rho[slot] = 1.0 / curvature;
        Ok(PairDots {
            slot,
            curvature,
            df_norm_sq,
        })
    }

    /// Step difference in `slot`.
    pub fn dx(&self, slot: usize) -> &[f64] {
        &self.dx[slot * self.len..(slot + 1) * self.len]
    }

    /// Residual difference in `slot`.
    pub fn df(&self, slot: usize) -> &[f64] {
        &self.df[slot * self.len..(slot + 1) * self.len]
    }

    /// `1/(dX·dF)` for `slot`.
    pub fn rho(&self, slot: usize) -> f64 {
        self.rho[slot]
    }

    fn dx_mut(&mut self, slot: usize) -> &mut [f64] {
        &mut self.dx[slot * self.len..(slot + 1) * self.len]
    }

    fn df_mut(&mut self, slot: usize) -> &mut [f64] {
        &mut self.df[slot * self.len..(slot + 1) * self.len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::SelfComm;

    #[test]
    fn push_sets_rho_and_wraps() {
        let space = Space::new(SelfComm);
        let mut h = History::new(2, 2);
        let dots = h.push(&space, 0, &[1.0, 0.0], &[2.0, 0.0]).unwrap();
        assert_eq!(dots.slot, 0);
        assert_eq!(dots.curvature, 2.0);
        assert_eq!(dots.df_norm_sq, 4.0);
        assert_eq!(dots.shanno_scaling(), 0.5);
        assert_eq!(h.rho(0), 0.5);

        h.push(&space, 1, &[0.0, 1.0], &[0.0, 4.0]).unwrap();
        assert_eq!(h.rho(1), 0.25);

        // The third update overwrites the first.
        let dots = h.push(&space, 2, &[1.0, 1.0], &[1.0, 0.0]).unwrap();
        assert_eq!(dots.slot, 0);
        assert_eq!(h.dx(0), &[1.0, 1.0]);
        assert_eq!(h.rho(0), 1.0);
        assert_eq!(h.logical_length(3), 2);
        assert_eq!(h.logical_length(1), 1);
    }

    #[test]
    fn differences_are_formed_in_place() {
        let space = Space::new(SelfComm);
        let mut h = History::new(3, 2);
        h.push_differences(&space, 4, (&[3.0, 1.0], &[1.0, 1.0]), (&[0.5, 2.0], &[0.0, 0.0]))
            .unwrap();
        assert_eq!(h.dx(1), &[2.0, 0.0]);
        assert_eq!(h.df(1), &[0.5, 2.0]);
        assert_eq!(h.rho(1), 1.0);
    }

    #[test]
    fn orthogonal_pairs_are_rejected() {
        let space = Space::new(SelfComm);
        let mut h = History::new(1, 2);
        h.push(&space, 0, &[1.0, 0.0], &[1.0, 0.0]).unwrap();
        let err = h.push(&space, 1, &[1.0, 0.0], &[0.0, 1.0]).unwrap_err();
        assert_eq!(
            err,
            PushError::IllConditioned {
                slot: 0,
                curvature: 0.0
            }
        );
        // rho keeps the last good value.
        assert_eq!(h.rho(0), 1.0);
        assert_eq!(
            History::new(0, 2).push(&space, 0, &[1.0, 0.0], &[1.0, 0.0]),
            Err(PushError::NoCapacity)
        );
    }

    #[test]
    fn release_frees_everything() {
        let mut h = History::new(4, 8);
        h.release();
        assert_eq!(h.capacity(), 0);
        assert_eq!(h.vector_len(), 0);
    }
}
