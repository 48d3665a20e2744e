//! Sparse Cholesky factorization `P·A·Pᵗ = L·Lᵗ` of a symmetric positive-definite matrix.
//!
//! The factorization is split in two phases. [`cholesky_symbolic`] looks only at the pattern: it
//! picks the fill-reducing permutation and computes the elimination tree and the exact number of
//! nonzeros of every column of `L`. [`cholesky_factor`] then fills in the values, and can be
//! repeated for any matrix sharing that pattern.
//!
//! Only the upper triangle of `A` (entries with row <= column) is read.
use log::{debug, warn};
#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

use crate::{
    csc::cumsum,
    permutation::{check_rhs, inverse_permute_vec, invert_permutation, permute_vec},
    symbolic::{column_counts, elimination_tree, postorder},
    traversal::Traversal,
    triangular::{lower_solve, lower_transpose_solve},
    CscMatrix, Error, Ordering, Result,
};

/// Result of the symbolic analysis, shared by every numeric factorization of the same pattern.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Clone, Debug)]
pub struct CholeskySymbolic {
    /// fill-reducing permutation, `None` for the natural order
    perm: Option<Vec<usize>>,
    /// elimination tree of the permuted matrix
    parent: Vec<Option<usize>>,
    /// nonzeros per column of `L`, diagonal included
    col_counts: Vec<usize>,
    /// column pointers of `L`
    col_ptr: Vec<usize>,
}

impl CholeskySymbolic {
    pub fn perm(&self) -> Option<&[usize]> {
        self.perm.as_deref()
    }

    pub fn parent(&self) -> &[Option<usize>] {
        &self.parent
    }

    pub fn col_counts(&self) -> &[usize] {
        &self.col_counts
    }

    /// Number of nonzeros `L` will hold.
    pub fn nnz(&self) -> usize {
        self.col_ptr[self.col_counts.len()]
    }

    pub fn n(&self) -> usize {
        self.col_counts.len()
    }
}

/// Symbolic analysis of the symmetric matrix `a` under the given ordering.
pub fn cholesky_symbolic(a: &CscMatrix, ordering: Ordering) -> Result<CholeskySymbolic> {
    let perm = ordering.permutation(a)?;
    let pinv = perm.as_deref().map(invert_permutation);
    let c = a.symmetric_permute(pinv.as_deref())?;

    let parent = elimination_tree(&c)?;
    let post = postorder(&parent);
    let col_counts = column_counts(&c, &parent, &post)?;
    let col_ptr = cumsum(&col_counts);

    debug!(
        "cholesky_symbolic: n={}, nnz(A)={}, nnz(L)={}, ordering={:?}",
        a.ncols(),
        a.nnz(),
        col_ptr[a.ncols()],
        ordering
    );
    Ok(CholeskySymbolic {
        perm,
        parent,
        col_counts,
        col_ptr,
    })
}

/// Numeric factor `L` with `P·A·Pᵗ = L·Lᵗ`.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Clone, Debug)]
pub struct CholeskyFactor {
    l: CscMatrix,
    perm: Option<Vec<usize>>,
}

impl CholeskyFactor {
    /// The lower-triangular factor. Each column has ascending row indices, diagonal first.
    pub fn l(&self) -> &CscMatrix {
        &self.l
    }

    pub fn perm(&self) -> Option<&[usize]> {
        self.perm.as_deref()
    }

    /// Solves `A·x = b`.
    pub fn solve(&self, b: &[f64]) -> Result<Vec<f64>> {
        check_rhs(self.l.ncols(), b)?;
        let mut x = permute_vec(self.perm(), b);
        lower_solve(&self.l, &mut x)?;
        lower_transpose_solve(&self.l, &mut x)?;
        Ok(inverse_permute_vec(self.perm(), &x))
    }
}

/// Computes the Cholesky factor of `a` using the structure found by [`cholesky_symbolic`].
///
/// The factor is computed a row at a time. Row `k` of `L` is the solution of a triangular system
/// with the rows above it, whose pattern is the path set [`Traversal::ereach`] finds in the
/// elimination tree; each solved entry is appended to its column, so no column storage ever
/// moves. Fails with [`Error::NotPositiveDefinite`] at the first non-positive pivot, and with
/// [`Error::Structural`] when the pattern of `a` is not the one `symbolic` was computed for.
pub fn cholesky_factor(a: &CscMatrix, symbolic: &CholeskySymbolic) -> Result<CholeskyFactor> {
    let n = symbolic.n();
    if a.shape() != (n, n) {
        return Err(Error::DimensionMismatch {
            expected: (n, n),
            found: a.shape(),
        });
    }
    let pinv = symbolic.perm().map(invert_permutation);
    let c = a.symmetric_permute(pinv.as_deref())?;

    let col_ptr = symbolic.col_ptr.clone();
    let mut row_idx = vec![0; symbolic.nnz()];
    let mut values = vec![0.0; symbolic.nnz()];
    // next free slot in each column of L
    let mut next = col_ptr[..n].to_vec();

    let mut traversal = Traversal::new(n);
    let mut pattern = vec![0; n];
    let mut x = vec![0.0; n];

    for k in 0..n {
        let top = traversal.ereach(&c, k, &symbolic.parent, &mut pattern);

        x[k] = 0.0;
        for (i, cik) in c.col(k).filter(|&(i, _)| i <= k) {
            x[i] = cik;
        }
        let mut d = x[k];
        x[k] = 0.0;

        for &i in &pattern[top..] {
            // L(k,i) = x(i) / L(i,i)
            let lki = x[i] / values[col_ptr[i]];
            x[i] = 0.0;
            for p in col_ptr[i] + 1..next[i] {
                x[row_idx[p]] -= values[p] * lki;
            }
            d -= lki * lki;

            if next[i] >= col_ptr[i + 1] {
                return Err(pattern_mismatch());
            }
            let p = next[i];
            next[i] += 1;
            row_idx[p] = k;
            values[p] = lki;
        }

        if !(d > 0.0) {
            warn!("cholesky: non-positive pivot {d:e} at column {k}");
            return Err(Error::NotPositiveDefinite { col: k });
        }
        if next[k] >= col_ptr[k + 1] {
            return Err(pattern_mismatch());
        }
        let p = next[k];
        next[k] += 1;
        row_idx[p] = k;
        values[p] = d.sqrt();
    }
    // unfilled slots mean `a` has fewer entries than the analysed pattern
    if (0..n).any(|k| next[k] != col_ptr[k + 1]) {
        return Err(pattern_mismatch());
    }

    debug!("cholesky: factored n={n}, nnz(L)={}", symbolic.nnz());
    Ok(CholeskyFactor {
        l: CscMatrix::from_parts(n, n, col_ptr, row_idx, values),
        perm: symbolic.perm.clone(),
    })
}

fn pattern_mismatch() -> Error {
    warn!("cholesky: matrix pattern differs from the symbolic analysis");
    Error::structural("matrix pattern does not match the symbolic analysis")
}
