//! Vector primitives.
//!
//! Local kernels operate on the slice of a vector owned by this process.
//! Reductions (dot products and norms) go through a [`Communicator`] so that
//! every process holding a shard of the same vector sees the same value.
//! All processes must call the reductions in the same order.
use std::sync::{Arc, Barrier, Mutex, PoisonError};

/// A fixed group of cooperating processes that can sum a scalar across the group.
pub trait Communicator {
    /// Sum `local` over every member of the group.
    /// Blocks until every member has contributed.
    fn all_reduce_sum(&self, local: f64) -> f64;

    /// This member's index in the group.
    fn rank(&self) -> usize {
        0
    }

    /// Number of members in the group.
    fn size(&self) -> usize {
        1
    }
}

/// The trivial group containing only the calling process.
#[derive(Debug, Default, Clone, Copy)]
pub struct SelfComm;

impl Communicator for SelfComm {
    #[inline(always)]
    fn all_reduce_sum(&self, local: f64) -> f64 {
        local
    }
}

/// A group of threads acting as cooperating processes.
///
/// Contributions are summed in rank order, so every member gets a
/// bitwise-identical result regardless of thread scheduling.
#[derive(Debug)]
pub struct ThreadGroup {
    barrier: Barrier,
    slots: Mutex<Vec<f64>>,
}

impl ThreadGroup {
    /// Make communicators for `size` threads. Hand one to each thread.
    pub fn split(size: usize) -> Vec<ThreadComm> {
        let group = Arc::new(Self {
            barrier: Barrier::new(size),
            slots: Mutex::new(vec![0.0; size]),
        });
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                size,
                group: Arc::clone(&group),
            })
            .collect()
    }
}

/// One member's handle on a [`ThreadGroup`].
#[derive(Debug, Clone)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    group: Arc<ThreadGroup>,
}

impl Communicator for ThreadComm {
    fn all_reduce_sum(&self, local: f64) -> f64 {
        // A poisoned lock means another member panicked mid-reduction;
        // the slots are still plain floats so keep going.
        self.group
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)[self.rank] = local;
        self.group.barrier.wait();
        let total = self
            .group
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .sum();
        // Nobody may overwrite a slot until everyone has read the total.
        self.group.barrier.wait();
        total
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }
}

/// Collective operations over vectors distributed across a [`Communicator`].
#[derive(Debug, Clone, Default)]
pub struct Space<C> {
    comm: C,
}

impl<C: Communicator> Space<C> {
    /// Wrap a communicator.
    pub fn new(comm: C) -> Self {
        Self { comm }
    }

    /// The underlying communicator.
    pub fn comm(&self) -> &C {
        &self.comm
    }

    /// Global dot product `a·b`.
    pub fn dot(&self, a: &[f64], b: &[f64]) -> f64 {
        debug_assert_eq!(a.len(), b.len(), "dot of vectors with different lengths");
        let local = a.iter().zip(b).map(|(x, y)| x * y).sum();
        self.comm.all_reduce_sum(local)
    }

    /// Global Euclidean norm `‖a‖`.
    pub fn norm(&self, a: &[f64]) -> f64 {
        libm::sqrt(self.dot(a, a))
    }

    /// True if `flag` is set on any member.
    pub fn any(&self, flag: bool) -> bool {
        self.comm.all_reduce_sum(if flag { 1.0 } else { 0.0 }) > 0.0
    }
}

/// `y ← y + alpha·x`
#[inline(always)]
pub fn axpy(y: &mut [f64], alpha: f64, x: &[f64]) {
    for (y, x) in y.iter_mut().zip(x) {
        *y += alpha * x;
    }
}

/// `y ← x + beta·y`
#[inline(always)]
pub fn aypx(y: &mut [f64], beta: f64, x: &[f64]) {
    for (y, x) in y.iter_mut().zip(x) {
        *y = x + beta * *y;
    }
}

/// `w ← alpha·x + y`
#[inline(always)]
pub fn waxpy(w: &mut [f64], alpha: f64, x: &[f64], y: &[f64]) {
    for ((w, x), y) in w.iter_mut().zip(x).zip(y) {
        *w = alpha * x + y;
    }
}

/// `y ← alpha·y`
#[inline(always)]
pub fn scale(y: &mut [f64], alpha: f64) {
    for y in y.iter_mut() {
        *y *= alpha;
    }
}

/// `z ← x − y`
#[inline(always)]
pub fn diff(z: &mut [f64], x: &[f64], y: &[f64]) {
    for ((z, x), y) in z.iter_mut().zip(x).zip(y) {
        *z = x - y;
    }
}
