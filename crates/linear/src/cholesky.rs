//! Linear solver for symmetric positive-definite matrices, using sparse Cholesky.
//!
//! The symbolic analysis depends only on the nonzero pattern, so it is kept across setups and
//! redone only when the pattern of the matrix changes.
use log::{debug, trace};
use nalgebra::{Dim, Matrix, Storage, StorageMut, U1};
use sparse::{
    cholesky_factor, cholesky_symbolic, CholeskyFactor, CholeskySymbolic, CscMatrix, Ordering,
};

use crate::{store, Error, LSolver};

#[derive(Clone, Debug, Default)]
pub struct SparseCholesky {
    ordering: Ordering,
    /// pattern of the last analyzed matrix, with its analysis
    symbolic: Option<(Vec<usize>, Vec<usize>, CholeskySymbolic)>,
    factor: Option<CholeskyFactor>,
}

impl SparseCholesky {
    /// Creates a new sparse Cholesky solver. Only the upper triangle of the matrices passed to
    /// `setup` is read.
    pub fn new(ordering: Ordering) -> Self {
        SparseCholesky {
            ordering,
            symbolic: None,
            factor: None,
        }
    }

    pub fn symbolic(&self) -> Option<&CholeskySymbolic> {
        self.symbolic.as_ref().map(|(_, _, s)| s)
    }

    pub fn factor(&self) -> Option<&CholeskyFactor> {
        self.factor.as_ref()
    }
}

impl<D> LSolver<f64, D> for SparseCholesky
where
    D: Dim,
{
    fn setup<S>(&mut self, mat_a: &Matrix<f64, D, D, S>) -> Result<(), Error>
    where
        S: Storage<f64, D, D>,
    {
        self.factor = None;
        let a = CscMatrix::from_dense(mat_a).upper_triangle();

        let reuse = matches!(
            &self.symbolic,
            Some((col_ptr, row_idx, _)) if col_ptr == a.col_ptr() && row_idx == a.row_idx()
        );
        if reuse {
            trace!("SparseCholesky setup: pattern unchanged, reusing the analysis");
        } else {
            self.symbolic = None;
            let symbolic = cholesky_symbolic(&a, self.ordering)?;
            self.symbolic = Some((a.col_ptr().to_vec(), a.row_idx().to_vec(), symbolic));
        }
        let Some((_, _, symbolic)) = &self.symbolic else {
            return Err(Error::NotSetUp);
        };

        let factor = cholesky_factor(&a, symbolic)?;
        debug!(
            "SparseCholesky setup: n={}, nnz(A)={}, nnz(L)={}",
            a.ncols(),
            a.nnz(),
            factor.l().nnz()
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
