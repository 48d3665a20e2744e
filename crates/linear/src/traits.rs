use nalgebra::{Dim, Matrix, Scalar, Storage, StorageMut, U1};

use crate::Error;

pub trait LSolver<T, D>
where
    T: Scalar,
    D: Dim,
{
    /// Performs any linear solver setup needed, based on an updated system matrix A. For a direct
    /// solver this is the factorization; the matrix itself is not retained.
    ///
    /// A failed setup leaves the solver without a factorization, so a later `solve` fails with
    /// [`Error::NotSetUp`] instead of using a stale one.
    fn setup<S>(&mut self, mat_a: &Matrix<T, D, D, S>) -> Result<(), Error>
    where
        S: Storage<T, D, D>;

    /// Solves the linear system A x = b with the matrix passed to the last `setup`.
    ///
    /// ## Arguments
    /// * `x` receives the solution of the linear system.
    /// * `b` the linear system right-hand side.
    fn solve<SB, SC>(
        &self,
        x: &mut Matrix<T, D, U1, SB>,
        b: &Matrix<T, D, U1, SC>,
    ) -> Result<(), Error>
    where
        SB: StorageMut<T, D>,
        SC: Storage<T, D>;
}
