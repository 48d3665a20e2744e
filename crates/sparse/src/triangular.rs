//! Triangular solves against sparse factors.
//!
//! The dense-vector solves expect the layout the factorizations produce: the diagonal is the first
//! entry of each column of a lower-triangular factor and the last entry of each column of an
//! upper-triangular one. The sparse right-hand-side solve makes no such assumption and finds the
//! diagonal by scanning the column.
use crate::{
    csc::CscRef,
    traversal::{check_reach, Traversal},
    CscMatrix, Error, Result,
};

fn check_system(g: &CscMatrix, len: usize) -> Result<()> {
    if !g.is_square() || g.ncols() != len {
        return Err(Error::DimensionMismatch {
            expected: (len, len),
            found: g.shape(),
        });
    }
    Ok(())
}

/// Position of the diagonal of column `j`, which must be its first (`lower`) or last entry.
fn diagonal_position(g: &CscMatrix, j: usize, lower: bool) -> Result<usize> {
    let range = g.col_range(j);
    let p = if lower {
        range.start
    } else {
        range.end.wrapping_sub(1)
    };
    if range.is_empty() || g.row_idx()[p] != j {
        return Err(Error::structural(format!(
            "column {j} does not hold its diagonal in {} position",
            if lower { "first" } else { "last" }
        )));
    }
    Ok(p)
}

/// Solves `L·x = b` in place.
pub fn lower_solve(l: &CscMatrix, x: &mut [f64]) -> Result<()> {
    check_system(l, x.len())?;
    for j in 0..x.len() {
        let d = diagonal_position(l, j, true)?;
        x[j] /= l.values()[d];
        let xj = x[j];
        for p in d + 1..l.col_range(j).end {
            x[l.row_idx()[p]] -= l.values()[p] * xj;
        }
    }
    Ok(())
}

/// Solves `Lᵗ·x = b` in place.
pub fn lower_transpose_solve(l: &CscMatrix, x: &mut [f64]) -> Result<()> {
    check_system(l, x.len())?;
    for j in (0..x.len()).rev() {
        let d = diagonal_position(l, j, true)?;
        for p in d + 1..l.col_range(j).end {
            x[j] -= l.values()[p] * x[l.row_idx()[p]];
        }
        x[j] /= l.values()[d];
    }
    Ok(())
}

/// Solves `U·x = b` in place.
pub fn upper_solve(u: &CscMatrix, x: &mut [f64]) -> Result<()> {
    check_system(u, x.len())?;
    for j in (0..x.len()).rev() {
        let d = diagonal_position(u, j, false)?;
        x[j] /= u.values()[d];
        let xj = x[j];
        for p in u.col_range(j).start..d {
            x[u.row_idx()[p]] -= u.values()[p] * xj;
        }
    }
    Ok(())
}

/// Solves `Uᵗ·x = b` in place.
pub fn upper_transpose_solve(u: &CscMatrix, x: &mut [f64]) -> Result<()> {
    check_system(u, x.len())?;
    for j in 0..x.len() {
        let d = diagonal_position(u, j, false)?;
        for p in u.col_range(j).start..d {
            x[j] -= u.values()[p] * x[u.row_idx()[p]];
        }
        x[j] /= u.values()[d];
    }
    Ok(())
}

/// Solution of a triangular system with a sparse right-hand side.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseSolution {
    /// Nonzero pattern of the solution, in the order the substitution visited it.
    pub pattern: Vec<usize>,
    /// Dense solution vector; entries outside `pattern` are zero.
    pub x: Vec<f64>,
}

/// Substitution over the pattern reachable from column `k` of `b`. The pattern is left in
/// `xi[top..]` and the solution in `x` at those positions; returns `top`.
///
/// Nodes without a column (`col_of(j) == None`) are carried through unexpanded: their entry of `x`
/// keeps the right-hand-side value. The LU column update relies on this for rows not yet pivoted.
pub(crate) fn solve_with<F>(
    traversal: &mut Traversal,
    g: CscRef<'_>,
    b: &CscMatrix,
    k: usize,
    col_of: F,
    xi: &mut [usize],
    x: &mut [f64],
) -> Result<usize>
where
    F: Fn(usize) -> Option<usize>,
{
    let top = traversal.reach_with(g, b.col(k).map(|(i, _)| i), &col_of, xi);
    for &i in &xi[top..] {
        x[i] = 0.0;
    }
    for (i, bik) in b.col(k) {
        x[i] = bik;
    }

    for &j in &xi[top..] {
        let Some(col) = col_of(j) else {
            continue;
        };
        let diag = g
            .col(col)
            .find(|&(i, _)| i == j)
            .map(|(_, d)| d)
            .ok_or_else(|| Error::structural(format!("column {col} has no diagonal entry")))?;
        if diag == 0.0 {
            return Err(Error::SingularMatrix { col });
        }
        x[j] /= diag;
        let xj = x[j];
        for (i, gij) in g.col(col) {
            if i != j {
                x[i] -= gij * xj;
            }
        }
    }
    Ok(top)
}

/// Solves `G·x = b[:, k]` for a sparse triangular `G`, touching only the rows reachable from the
/// nonzeros of the right-hand side.
///
/// With `pinv`, node `j` is held by column `pinv[j]` of `G`. `lower` states which triangle `G`
/// occupies; the pattern returned by [`reach`](crate::reach) is topological for either, so the
/// substitution walks it front to back.
pub fn solve(
    g: &CscMatrix,
    b: &CscMatrix,
    k: usize,
    pinv: Option<&[usize]>,
    lower: bool,
) -> Result<SparseSolution> {
    check_reach(g, b, k, pinv)?;
    let n = g.ncols();

    let mut xi = vec![0; n];
    let mut traversal = Traversal::new(n);
    let mut x = vec![0.0; n];
    let top = solve_with(
        &mut traversal,
        g.view(),
        b,
        k,
        |j| Some(pinv.map_or(j, |pinv| pinv[j])),
        &mut xi,
        &mut x,
    )?;
    log::trace!(
        "{} triangular solve touched {} of {n} rows",
        if lower { "lower" } else { "upper" },
        n - top
    );
    Ok(SparseSolution {
        pattern: xi[top..].to_vec(),
        x,
    })
}
