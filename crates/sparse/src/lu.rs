//! Left-looking sparse LU factorization with threshold partial pivoting, `P·A·Q = L·U`.
//!
//! Row interchanges are decided numerically as the factorization proceeds, so no elimination tree
//! is computed up front. Instead each column is obtained by a sparse triangular solve with the
//! columns of `L` built so far, whose pattern comes from a depth-first search (Gilbert & Peierls).
use log::{debug, trace, warn};
#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

use crate::{
    csc::CscRef,
    permutation::{check_rhs, inverse_permute_vec},
    traversal::Traversal,
    triangular::{lower_solve, solve_with, upper_solve},
    CscMatrix, Error, Ordering, Result,
};

#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Clone, Debug)]
pub struct LuFactor {
    l: CscMatrix,
    u: CscMatrix,
    pinv: Vec<usize>,
    q: Option<Vec<usize>>,
}

impl LuFactor {
    /// Unit lower-triangular factor, its diagonal stored as the first entry of each column.
    pub fn l(&self) -> &CscMatrix {
        &self.l
    }

    /// Upper-triangular factor, its diagonal stored as the last entry of each column.
    pub fn u(&self) -> &CscMatrix {
        &self.u
    }

    /// Row permutation: row `i` of `A` is row `pinv[i]` of `L·U`.
    pub fn pinv(&self) -> &[usize] {
        &self.pinv
    }

    /// Column permutation: column `k` of `L·U` is column `q[k]` of `A`.
    pub fn q(&self) -> Option<&[usize]> {
        self.q.as_deref()
    }

    /// Solves `A·x = b`.
    pub fn solve(&self, b: &[f64]) -> Result<Vec<f64>> {
        check_rhs(self.pinv.len(), b)?;
        let mut x = inverse_permute_vec(Some(&self.pinv), b);
        lower_solve(&self.l, &mut x)?;
        upper_solve(&self.u, &mut x)?;
        Ok(inverse_permute_vec(self.q(), &x))
    }
}

/// Factors the square matrix `a`.
///
/// `tol` in `(0, 1]` sets the pivoting threshold: any row not yet pivoted whose entry is at least
/// `tol` times the largest candidate magnitude in the column is acceptable, and the acceptable row
/// with the smallest index wins. `tol = 1` is plain partial pivoting. `ordering` picks a column
/// permutation from the pattern of `A + Aᵗ`.
///
/// Fails with [`Error::SingularMatrix`] at the first column without a nonzero candidate pivot.
pub fn lu_factor(a: &CscMatrix, tol: f64, ordering: Ordering) -> Result<LuFactor> {
    if !(tol > 0.0 && tol <= 1.0) {
        return Err(Error::ToleranceOutOfRange { tol });
    }
    let q = ordering.permutation(a)?;
    let n = a.ncols();

    let mut l_col_ptr = Vec::with_capacity(n + 1);
    let mut l_rows = Vec::with_capacity(4 * a.nnz() + n);
    let mut l_vals = Vec::with_capacity(4 * a.nnz() + n);
    let mut u_col_ptr = Vec::with_capacity(n + 1);
    let mut u_rows = Vec::with_capacity(4 * a.nnz() + n);
    let mut u_vals = Vec::with_capacity(4 * a.nnz() + n);

    // pivot position of each row of A, once chosen
    let mut pinv: Vec<Option<usize>> = vec![None; n];
    let mut traversal = Traversal::new(n);
    let mut xi = vec![0; n];
    let mut x = vec![0.0; n];

    for k in 0..n {
        l_col_ptr.push(l_rows.len());
        u_col_ptr.push(u_rows.len());
        let col = q.as_ref().map_or(k, |q| q[k]);

        // x = L \ A(:,col), leaving rows not yet pivoted unexpanded
        let top = solve_with(
            &mut traversal,
            CscRef::new(&l_col_ptr, &l_rows, &l_vals),
            a,
            col,
            |i| pinv[i],
            &mut xi,
            &mut x,
        )?;
        let pattern = &xi[top..];

        let max = pattern
            .iter()
            .filter(|&&i| pinv[i].is_none())
            .map(|&i| x[i].abs())
            .fold(0.0, f64::max);
        if !(max > 0.0) {
            warn!("lu: no nonzero pivot candidate in column {k}");
            return Err(Error::SingularMatrix { col: k });
        }
        let Some(ipiv) = pattern
            .iter()
            .copied()
            .filter(|&i| pinv[i].is_none() && x[i].abs() >= tol * max)
            .min()
        else {
            warn!("lu: no acceptable pivot in column {k}");
            return Err(Error::SingularMatrix { col: k });
        };
        let pivot = x[ipiv];
        trace!("lu: column {k} pivots on row {ipiv} ({pivot:e}, max {max:e})");

        for &i in pattern {
            if let Some(r) = pinv[i] {
                u_rows.push(r);
                u_vals.push(x[i]);
            }
        }
        u_rows.push(k);
        u_vals.push(pivot);

        pinv[ipiv] = Some(k);
        l_rows.push(ipiv);
        l_vals.push(1.0);
        for &i in pattern {
            if pinv[i].is_none() {
                l_rows.push(i);
                l_vals.push(x[i] / pivot);
            }
        }
    }
    l_col_ptr.push(l_rows.len());
    u_col_ptr.push(u_rows.len());

    let pinv = pinv
        .into_iter()
        .collect::<Option<Vec<usize>>>()
        .ok_or_else(|| Error::structural("row permutation is incomplete"))?;
    // L was built in the row numbering of A
    for i in &mut l_rows {
        *i = pinv[*i];
    }

    debug!(
        "lu: factored n={n}, nnz(A)={}, nnz(L)={}, nnz(U)={}, tol={tol}, ordering={ordering:?}",
        a.nnz(),
        l_rows.len(),
        u_rows.len()
    );
    Ok(LuFactor {
        l: CscMatrix::from_parts(n, n, l_col_ptr, l_rows, l_vals),
        u: CscMatrix::from_parts(n, n, u_col_ptr, u_rows, u_vals),
        pinv,
        q,
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::dmatrix;

    use super::*;

    fn sample() -> CscMatrix {
        CscMatrix::from_dense(&dmatrix![
            5.0, 0.0, 0.0, 1.0;
            2.0, 2.0, 2.0, 1.0;
            4.0, 5.0, 5.0, 5.0;
            1.0, 6.0, 4.0, 5.0
        ])
    }

    #[test_log::test]
    fn test_identity() {
        let factor = lu_factor(&CscMatrix::identity(5), 1.0, Ordering::Natural).unwrap();
        assert_eq!(factor.l(), &CscMatrix::identity(5));
        assert_eq!(factor.u(), &CscMatrix::identity(5));
        assert_eq!(factor.pinv(), &[0, 1, 2, 3, 4]);
        assert_eq!(factor.q(), None);
    }

    #[test]
    fn test_singular() {
        let a = CscMatrix::from_dense(&dmatrix![0.0, 1.0; 0.0, 1.0]);
        let err = lu_factor(&a, 1.0, Ordering::Natural).unwrap_err();
        assert_eq!(err, Error::SingularMatrix { col: 0 });
        assert_eq!(err.status_code(), -1);

        // dependent columns fail at the second one
        let a = CscMatrix::from_dense(&dmatrix![1.0, 2.0; 2.0, 4.0]);
        assert_eq!(
            lu_factor(&a, 1.0, Ordering::Natural).unwrap_err(),
            Error::SingularMatrix { col: 1 }
        );
    }

    #[test]
    fn test_tolerance_range() {
        let a = CscMatrix::identity(2);
        for tol in [0.0, -0.5, 1.5, f64::NAN] {
            assert!(matches!(
                lu_factor(&a, tol, Ordering::Natural),
                Err(Error::ToleranceOutOfRange { .. })
            ));
        }
    }

    #[test]
    fn test_partial_pivoting() {
        let a = sample();
        let factor = lu_factor(&a, 1.0, Ordering::Natural).unwrap();
        // largest entry of the first column is row 0
        assert_eq!(factor.pinv()[0], 0);
        let pa = a.permute(Some(factor.pinv()), None).to_dense();
        let lu = factor.l().to_dense() * factor.u().to_dense();
        assert_relative_eq!(lu, pa, epsilon = 1e-12);

        // every multiplier is bounded by one
        for &v in factor.l().values() {
            assert!(v.abs() <= 1.0 + 1e-15);
        }
    }

    #[test]
    fn test_threshold_prefers_low_rows() {
        let a = CscMatrix::from_dense(&dmatrix![
            1.0, 1.0;
            2.0, 1.0
        ]);
        let strict = lu_factor(&a, 1.0, Ordering::Natural).unwrap();
        assert_eq!(strict.pinv(), &[1, 0]);
        let relaxed = lu_factor(&a, 0.4, Ordering::Natural).unwrap();
        assert_eq!(relaxed.pinv(), &[0, 1]);
    }

    #[test]
    fn test_ordered_round_trip_and_solve() {
        let a = sample();
        let expected = [1.0, 2.0, 3.0, 4.0];
        let b = a.mul_vec(&expected).unwrap();
        for ordering in [
            Ordering::Natural,
            Ordering::MinimumDegree,
            Ordering::ReverseCuthillMcKee,
        ] {
            let factor = lu_factor(&a, 0.1, ordering).unwrap();
            let paq = a.permute(Some(factor.pinv()), factor.q()).to_dense();
            let lu = factor.l().to_dense() * factor.u().to_dense();
            assert_relative_eq!(lu, paq, epsilon = 1e-12);

            let x = factor.solve(&b).unwrap();
            for (xi, ei) in x.iter().zip(expected) {
                assert_relative_eq!(*xi, ei, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_rectangular_is_rejected() {
        let a = CscMatrix::zeros(3, 2);
        assert!(matches!(
            lu_factor(&a, 1.0, Ordering::Natural),
            Err(Error::DimensionMismatch { .. })
        ));
    }
}
