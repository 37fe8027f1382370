use faer::{
    ColRef, Mat, MatRef,
    linalg::solvers::{FullPivLu, Solve},
};

/// Why a dense solve didn't produce a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinearSolveError {
    /// `solve_in_place` was called before `factor`.
    NotFactored,
    /// The solution had infinite or NaN entries, i.e. the matrix was singular.
    Singular,
}

/// Dense LU with full pivoting.
#[derive(Default)]
pub(crate) struct DenseLu {
    lu: Option<FullPivLu<f64>>,
}

impl DenseLu {
    pub fn factor(&mut self, a: MatRef<'_, f64>) {
        self.lu = Some(a.full_piv_lu());
    }

    /// Overwrite `rhs` with `A⁻¹·rhs`.
    pub fn solve_in_place(&self, rhs: &mut [f64]) -> Result<(), LinearSolveError> {
        let lu = self.lu.as_ref().ok_or(LinearSolveError::NotFactored)?;
        // FullPivLu returns a new column; copy it back to keep this in-place.
        let solution = lu.solve(ColRef::from_slice(rhs));
        for (i, r) in rhs.iter_mut().enumerate() {
            *r = solution[i];
        }
        if rhs.iter().any(|v| !v.is_finite()) {
            return Err(LinearSolveError::Singular);
        }
        Ok(())
    }
}

/// A square zero matrix, for Jacobians.
pub(crate) fn square_zeros(n: usize) -> Mat<f64> {
    Mat::zeros(n, n)
}
