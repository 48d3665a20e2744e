//! Direct linear solvers for `nalgebra` systems, backed by the sparse factorizations of the
//! [`sparse`] crate.
//!
//! A solver is set up once per matrix and can then solve against any number of right-hand sides.

mod cholesky;
mod lu;
mod traits;

pub use cholesky::SparseCholesky;
pub use lu::SparseLu;
pub use traits::LSolver;

use nalgebra::{Dim, Matrix, StorageMut, U1};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Sparse(#[from] sparse::Error),

    #[error("The linear solver was used before a successful setup")]
    NotSetUp,
}

/// Copies `sol` into the column vector `x`.
fn store<D, S>(x: &mut Matrix<f64, D, U1, S>, sol: &[f64]) -> Result<(), Error>
where
    D: Dim,
    S: StorageMut<f64, D>,
{
    if x.nrows() != sol.len() {
        return Err(sparse::Error::DimensionMismatch {
            expected: (sol.len(), 1),
            found: (x.nrows(), 1),
        }
        .into());
    }
    for (xi, &v) in x.iter_mut().zip(sol) {
        *xi = v;
    }
    Ok(())
}
