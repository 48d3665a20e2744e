//! Linear solver for general square matrices, using sparse LU with threshold partial pivoting.
//!
use log::debug;
use nalgebra::{Dim, Matrix, Storage, StorageMut, U1};
use sparse::{lu_factor, CscMatrix, LuFactor, Ordering};

use crate::{store, Error, LSolver};

#[derive(Clone, Debug)]
pub struct SparseLu {
    tol: f64,
    ordering: Ordering,
    factor: Option<LuFactor>,
}

impl Default for SparseLu {
    /// Plain partial pivoting in the natural column order.
    fn default() -> Self {
        Self::new(1.0, Ordering::default())
    }
}

impl SparseLu {
    /// Creates a new sparse LU solver.
    ///
    /// `tol` in `(0, 1]` is the pivot threshold; it is checked at setup.
    pub fn new(tol: f64, ordering: Ordering) -> Self {
        SparseLu {
            tol,
            ordering,
            factor: None,
        }
    }

    pub fn factor(&self) -> Option<&LuFactor> {
        self.factor.as_ref()
    }
}

impl<D> LSolver<f64, D> for SparseLu
where
    D: Dim,
{
    fn setup<S>(&mut self, mat_a: &Matrix<f64, D, D, S>) -> Result<(), Error>
    where
        S: Storage<f64, D, D>,
    {
        self.factor = None;
        let a = CscMatrix::from_dense(mat_a);
        let factor = lu_factor(&a, self.tol, self.ordering)?;
        debug!(
            "SparseLu setup: n={}, nnz(A)={}, nnz(L+U)={}",
            a.ncols(),
            a.nnz(),
            factor.l().nnz() + factor.u().nnz()
        );
        self.factor = Some(factor);
        Ok(())
    }

    fn solve<SB, SC>(
        &self,
        x: &mut Matrix<f64, D, U1, SB>,
        b: &Matrix<f64, D, U1, SC>,
    ) -> Result<(), Error>
    where
        SB: StorageMut<f64, D>,
        SC: Storage<f64, D>,
    {
        let factor = self.factor.as_ref().ok_or(Error::NotSetUp)?;
        let rhs: Vec<f64> = b.iter().copied().collect();
        store(x, &factor.solve(&rhs)?)
    }
}
