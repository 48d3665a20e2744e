//! Sparse QR factorization `A·Q_c = Q·R` by Householder reflections.
//!
//! `Q` is never formed. It is kept as the product `H_0·H_1···H_{n-1}` of reflections
//! `H_k = I - beta_k·v_k·v_kᵗ`, whose vectors are stored as the columns of a sparse matrix `V`.
use log::{debug, trace};
#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

use crate::{
    csc::CscRef, permutation::inverse_permute_vec, triangular::upper_solve, CscMatrix, Error,
    Ordering, Result,
};

#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Clone, Debug)]
pub struct QrFactor {
    v: CscMatrix,
    beta: Vec<f64>,
    r: CscMatrix,
    q: Option<Vec<usize>>,
}

impl QrFactor {
    /// Householder vectors, one per column. Column `k` starts with its unit entry at row `k` and
    /// has no entries above it.
    pub fn v(&self) -> &CscMatrix {
        &self.v
    }

    pub fn beta(&self) -> &[f64] {
        &self.beta
    }

    /// Square upper-triangular factor. The diagonal is always stored, as the last entry of each
    /// column, even when it is zero.
    pub fn r(&self) -> &CscMatrix {
        &self.r
    }

    /// Column permutation: column `k` of `Q·R` is column `q[k]` of `A`.
    pub fn q(&self) -> Option<&[usize]> {
        self.q.as_deref()
    }

    fn reflect(&self, k: usize, x: &mut [f64]) {
        reflect(self.v.view(), self.beta[k], k, x);
    }

    /// Overwrites `x` with `Q·x`, or with `Qᵗ·x` when `transpose` is set.
    pub fn apply_q(&self, x: &mut [f64], transpose: bool) -> Result<()> {
        if x.len() != self.v.nrows() {
            return Err(Error::DimensionMismatch {
                expected: (self.v.nrows(), 1),
                found: (x.len(), 1),
            });
        }
        if transpose {
            for k in 0..self.beta.len() {
                self.reflect(k, x);
            }
        } else {
            for k in (0..self.beta.len()).rev() {
                self.reflect(k, x);
            }
        }
        Ok(())
    }

    /// Least-squares solution of `A·x = b`, exact when `A` is square and nonsingular.
    ///
    /// Fails with [`Error::SingularMatrix`] if `A` does not have full column rank.
    pub fn solve(&self, b: &[f64]) -> Result<Vec<f64>> {
        let n = self.r.ncols();
        if let Some(col) = (0..n).find(|&k| self.r.get(k, k) == 0.0) {
            return Err(Error::SingularMatrix { col });
        }
        let mut y = b.to_vec();
        self.apply_q(&mut y, true)?;
        y.truncate(n);
        upper_solve(&self.r, &mut y)?;
        Ok(inverse_permute_vec(self.q(), &y))
    }
}

/// `x = (I - beta·v·vᵗ)·x` for column `k` of `v`.
fn reflect(v: CscRef<'_>, beta: f64, k: usize, x: &mut [f64]) {
    if beta == 0.0 {
        return;
    }
    let tau = beta * v.col(k).map(|(i, vi)| vi * x[i]).sum::<f64>();
    for (i, vi) in v.col(k) {
        x[i] -= tau * vi;
    }
}

/// Factors the `m x n` matrix `a`, `m >= n`.
///
/// `ordering` picks a column permutation from the pattern of `AᵗA`. A column that is already zero
/// below the diagonal gets no reflection (`beta = 0`), and a column dependent on the ones before
/// it leaves a zero on the diagonal of `R`; the factorization itself never fails on rank.
///
/// The diagonal of `R` is not made non-negative. A reflection maps its column onto
/// `-sign(x_k)·‖x‖`, and a column that needs none keeps `x_k` as it is, negative or not.
pub fn qr_factor(a: &CscMatrix, ordering: Ordering) -> Result<QrFactor> {
    let (m, n) = a.shape();
    if m < n {
        return Err(Error::structural(format!(
            "QR needs at least as many rows as columns, got {m}x{n}"
        )));
    }
    let q = match ordering {
        Ordering::Natural => None,
        _ => ordering.permutation(&a.transpose().multiply(a)?)?,
    };

    let mut v_col_ptr = Vec::with_capacity(n + 1);
    let mut v_rows = Vec::with_capacity(a.nnz());
    let mut v_vals = Vec::with_capacity(a.nnz());
    let mut r_col_ptr = Vec::with_capacity(n + 1);
    let mut r_rows = Vec::with_capacity(a.nnz());
    let mut r_vals = Vec::with_capacity(a.nnz());
    let mut beta = Vec::with_capacity(n);
    v_col_ptr.push(0);
    r_col_ptr.push(0);

    let mut x = vec![0.0; m];
    for k in 0..n {
        let col = q.as_ref().map_or(k, |q| q[k]);
        x.fill(0.0);
        for (i, aik) in a.col(col) {
            x[i] += aik;
        }
        let v = CscRef::new(&v_col_ptr, &v_rows, &v_vals);
        for (j, &bj) in beta.iter().enumerate() {
            reflect(v, bj, j, &mut x);
        }

        for i in 0..k {
            if x[i] != 0.0 {
                r_rows.push(i);
                r_vals.push(x[i]);
            }
        }

        let sigma: f64 = x[k + 1..].iter().map(|xi| xi * xi).sum();
        let x0 = x[k];
        let (diag, b) = if sigma == 0.0 {
            (x0, 0.0)
        } else {
            let norm = (x0 * x0 + sigma).sqrt();
            let alpha = if x0 > 0.0 { -norm } else { norm };
            let v0 = x0 - alpha;
            (alpha, 2.0 * v0 * v0 / (v0 * v0 + sigma))
        };
        trace!("qr: column {k} reflection beta={b:e}, r_kk={diag:e}");

        v_rows.push(k);
        v_vals.push(1.0);
        if b != 0.0 {
            let v0 = x0 - diag;
            for (i, &xi) in x.iter().enumerate().skip(k + 1) {
                if xi != 0.0 {
                    v_rows.push(i);
                    v_vals.push(xi / v0);
                }
            }
        }
        v_col_ptr.push(v_rows.len());
        beta.push(b);

        r_rows.push(k);
        r_vals.push(diag);
        r_col_ptr.push(r_rows.len());
    }

    debug!(
        "qr: factored {m}x{n}, nnz(A)={}, nnz(V)={}, nnz(R)={}, ordering={ordering:?}",
        a.nnz(),
        v_rows.len(),
        r_rows.len()
    );
    Ok(QrFactor {
        v: CscMatrix::from_parts(m, n, v_col_ptr, v_rows, v_vals),
        beta,
        r: CscMatrix::from_parts(n, n, r_col_ptr, r_rows, r_vals),
        q,
    })
}
