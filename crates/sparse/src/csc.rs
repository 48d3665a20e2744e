//! Compressed sparse column storage and the structural transforms every factorization builds on.
//!
//! A [`CscMatrix`] stores an `m x n` real matrix as three arrays: `values` and `row_idx` hold the
//! nonzeros column by column, and `col_ptr` (length `n+1`) delimits column `j` as the half-open
//! range `col_ptr[j]..col_ptr[j+1]`.
//!
//! Apart from the constructors, none of the operations here validate the structure of their
//! inputs. Duplicate row indices within a column and out-of-range indices are caller errors.
use std::ops::Range;

use nalgebra::{DMatrix, Dim, Matrix, Storage};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct CscMatrix {
    nrows: usize,
    ncols: usize,
    col_ptr: Vec<usize>,
    row_idx: Vec<usize>,
    values: Vec<f64>,
}

/// Borrowed compressed-column arrays, possibly of a factor still under construction.
///
/// Only the columns delimited by `col_ptr` are visible; a factorization can traverse its finished
/// columns while appending to the underlying vectors between traversals.
#[derive(Clone, Copy, Debug)]
pub(crate) struct CscRef<'a> {
    col_ptr: &'a [usize],
    row_idx: &'a [usize],
    values: &'a [f64],
}

impl<'a> CscRef<'a> {
    pub(crate) fn new(col_ptr: &'a [usize], row_idx: &'a [usize], values: &'a [f64]) -> Self {
        CscRef {
            col_ptr,
            row_idx,
            values,
        }
    }

    pub(crate) fn row_idx(&self) -> &'a [usize] {
        self.row_idx
    }

    pub(crate) fn col_range(&self, j: usize) -> Range<usize> {
        self.col_ptr[j]..self.col_ptr[j + 1]
    }

    pub(crate) fn col(&self, j: usize) -> impl Iterator<Item = (usize, f64)> + 'a {
        let range = self.col_range(j);
        self.row_idx[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }
}

/// Prefix sum of `counts`, returning a pointer array of length `counts.len() + 1`.
pub(crate) fn cumsum(counts: &[usize]) -> Vec<usize> {
    let mut ptr = Vec::with_capacity(counts.len() + 1);
    let mut nz = 0;
    ptr.push(0);
    for &c in counts {
        nz += c;
        ptr.push(nz);
    }
    ptr
}

impl CscMatrix {
    /// Creates a matrix from its compressed-column arrays.
    ///
    /// The array lengths, the monotonicity of `col_ptr` and the range of every row index are
    /// checked. Duplicate row indices within a column are not.
    pub fn new(
        nrows: usize,
        ncols: usize,
        col_ptr: Vec<usize>,
        row_idx: Vec<usize>,
        values: Vec<f64>,
    ) -> Result<Self> {
        if col_ptr.len() != ncols + 1 {
            return Err(Error::structural(format!(
                "col_ptr has length {}, expected {}",
                col_ptr.len(),
                ncols + 1
            )));
        }
        if col_ptr[0] != 0 {
            return Err(Error::structural("col_ptr[0] must be zero"));
        }
        if let Some(j) = col_ptr.windows(2).position(|w| w[0] > w[1]) {
            return Err(Error::structural(format!(
                "col_ptr decreases at column {j}"
            )));
        }
        let nnz = col_ptr[ncols];
        if row_idx.len() != nnz || values.len() != nnz {
            return Err(Error::structural(format!(
                "expected {nnz} entries, found {} row indices and {} values",
                row_idx.len(),
                values.len()
            )));
        }
        if let Some(&i) = row_idx.iter().find(|&&i| i >= nrows) {
            return Err(Error::structural(format!(
                "row index {i} out of range for {nrows} rows"
            )));
        }
        Ok(Self::from_parts(nrows, ncols, col_ptr, row_idx, values))
    }

    /// Creates a matrix from arrays already known to be well formed.
    pub(crate) fn from_parts(
        nrows: usize,
        ncols: usize,
        col_ptr: Vec<usize>,
        row_idx: Vec<usize>,
        values: Vec<f64>,
    ) -> Self {
        debug_assert_eq!(col_ptr.len(), ncols + 1);
        debug_assert_eq!(row_idx.len(), values.len());
        CscMatrix {
            nrows,
            ncols,
            col_ptr,
            row_idx,
            values,
        }
    }

    /// Creates a matrix from the plain `(values, rowIndex, colPtr, rows, cols)` exchange triple.
    pub fn from_raw_parts(
        values: Vec<f64>,
        row_index: &[i32],
        col_ptr: &[i32],
        rows: i32,
        cols: i32,
    ) -> Result<Self> {
        let to_usize = |v: i32, what: &str| {
            usize::try_from(v).map_err(|_| Error::structural(format!("negative {what}: {v}")))
        };
        let nrows = to_usize(rows, "row count")?;
        let ncols = to_usize(cols, "column count")?;
        let col_ptr = col_ptr
            .iter()
            .map(|&p| to_usize(p, "column pointer"))
            .collect::<Result<Vec<_>>>()?;
        let row_idx = row_index
            .iter()
            .map(|&i| to_usize(i, "row index"))
            .collect::<Result<Vec<_>>>()?;
        Self::new(nrows, ncols, col_ptr, row_idx, values)
    }

    /// Splits the matrix back into the `(values, rowIndex, colPtr, rows, cols)` exchange triple.
    pub fn into_raw_parts(self) -> Result<(Vec<f64>, Vec<i32>, Vec<i32>, i32, i32)> {
        let to_i32 = |v: usize| {
            i32::try_from(v).map_err(|_| Error::structural(format!("{v} does not fit in an i32")))
        };
        let rows = to_i32(self.nrows)?;
        let cols = to_i32(self.ncols)?;
        let col_ptr = self
            .col_ptr
            .iter()
            .map(|&p| to_i32(p))
            .collect::<Result<Vec<_>>>()?;
        let row_index = self
            .row_idx
            .iter()
            .map(|&i| to_i32(i))
            .collect::<Result<Vec<_>>>()?;
        Ok((self.values, row_index, col_ptr, rows, cols))
    }

    /// An `nrows x ncols` matrix with no stored entries.
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self::from_parts(nrows, ncols, vec![0; ncols + 1], Vec::new(), Vec::new())
    }

    pub fn identity(n: usize) -> Self {
        Self::from_parts(n, n, (0..=n).collect(), (0..n).collect(), vec![1.0; n])
    }

    /// Compresses a list of `(row, col, value)` triplets. Duplicate entries are summed.
    pub fn from_triplets(nrows: usize, ncols: usize, triplets: &[(usize, usize, f64)]) -> Result<Self> {
        let mut counts = vec![0; ncols];
        for &(i, j, _) in triplets {
            if i >= nrows || j >= ncols {
                return Err(Error::structural(format!(
                    "triplet ({i}, {j}) out of range for a {nrows}x{ncols} matrix"
                )));
            }
            counts[j] += 1;
        }
        let mut col_ptr = cumsum(&counts);
        let mut next = col_ptr[..ncols].to_vec();
        let mut row_idx = vec![0; triplets.len()];
        let mut values = vec![0.0; triplets.len()];
        for &(i, j, x) in triplets {
            let q = next[j];
            next[j] += 1;
            row_idx[q] = i;
            values[q] = x;
        }

        // sum up duplicates, compacting in place
        let mut seen: Vec<Option<usize>> = vec![None; nrows];
        let mut nz = 0;
        for j in 0..ncols {
            let (lo, hi) = (col_ptr[j], col_ptr[j + 1]);
            col_ptr[j] = nz;
            for p in lo..hi {
                let i = row_idx[p];
                match seen[i] {
                    Some(q) if q >= col_ptr[j] => values[q] += values[p],
                    _ => {
                        seen[i] = Some(nz);
                        row_idx[nz] = i;
                        values[nz] = values[p];
                        nz += 1;
                    }
                }
            }
        }
        col_ptr[ncols] = nz;
        row_idx.truncate(nz);
        values.truncate(nz);

        Ok(Self::from_parts(nrows, ncols, col_ptr, row_idx, values))
    }

    /// Converts a dense `nalgebra` matrix of any shape or storage, storing only the nonzero
    /// entries.
    pub fn from_dense<R, C, S>(dense: &Matrix<f64, R, C, S>) -> Self
    where
        R: Dim,
        C: Dim,
        S: Storage<f64, R, C>,
    {
        let (nrows, ncols) = dense.shape();
        let mut col_ptr = Vec::with_capacity(ncols + 1);
        let mut row_idx = Vec::new();
        let mut values = Vec::new();
        col_ptr.push(0);
        for column in dense.column_iter() {
            for (i, &x) in column.iter().enumerate() {
                if x != 0.0 {
                    row_idx.push(i);
                    values.push(x);
                }
            }
            col_ptr.push(row_idx.len());
        }
        Self::from_parts(nrows, ncols, col_ptr, row_idx, values)
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.nrows, self.ncols);
        for j in 0..self.ncols {
            for (i, x) in self.col(j) {
                dense[(i, j)] += x;
            }
        }
        dense
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.col_ptr[self.ncols]
    }

    pub fn is_square(&self) -> bool {
        self.nrows == self.ncols
    }

    pub fn col_ptr(&self) -> &[usize] {
        &self.col_ptr
    }

    pub fn row_idx(&self) -> &[usize] {
        &self.row_idx
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub(crate) fn view(&self) -> CscRef<'_> {
        CscRef::new(&self.col_ptr, &self.row_idx, &self.values)
    }

    /// Positions in `row_idx`/`values` occupied by column `j`.
    pub fn col_range(&self, j: usize) -> Range<usize> {
        self.col_ptr[j]..self.col_ptr[j + 1]
    }

    /// Iterates over the `(row, value)` pairs of column `j` in storage order.
    pub fn col(&self, j: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.col_range(j);
        self.row_idx[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    /// Value at `(i, j)`, or zero if no entry is stored there.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.col(j)
            .filter(|&(row, _)| row == i)
            .map(|(_, x)| x)
            .sum()
    }

    /// Computes `Aᵗ` in `O(nnz + m)`. Row indices of the result are ascending within each column.
    pub fn transpose(&self) -> CscMatrix {
        let mut counts = vec![0; self.nrows];
        for &i in &self.row_idx {
            counts[i] += 1;
        }
        let col_ptr = cumsum(&counts);
        let mut next = col_ptr[..self.nrows].to_vec();
        let mut row_idx = vec![0; self.nnz()];
        let mut values = vec![0.0; self.nnz()];
        for j in 0..self.ncols {
            for (i, x) in self.col(j) {
                let q = next[i];
                next[i] += 1;
                row_idx[q] = j;
                values[q] = x;
            }
        }
        Self::from_parts(self.ncols, self.nrows, col_ptr, row_idx, values)
    }

    /// Computes `C = P·A·Qᵗ`.
    ///
    /// Column `k` of `C` is column `q[k]` of `A`, and row `i` of `A` becomes row `pinv[i]` of `C`.
    /// Either permutation may be absent, standing for the identity. Entries keep the order they
    /// have in their source column; nothing is sorted.
    pub fn permute(&self, pinv: Option<&[usize]>, q: Option<&[usize]>) -> CscMatrix {
        let mut col_ptr = Vec::with_capacity(self.ncols + 1);
        let mut row_idx = Vec::with_capacity(self.nnz());
        let mut values = Vec::with_capacity(self.nnz());
        for k in 0..self.ncols {
            col_ptr.push(row_idx.len());
            let j = q.map_or(k, |q| q[k]);
            for (i, x) in self.col(j) {
                row_idx.push(pinv.map_or(i, |pinv| pinv[i]));
                values.push(x);
            }
        }
        col_ptr.push(row_idx.len());
        Self::from_parts(self.nrows, self.ncols, col_ptr, row_idx, values)
    }

    /// Computes `C = P·A·Pᵗ` for a symmetric `A` of which only the upper triangle is used. The
    /// result holds the upper triangle of `C`.
    pub fn symmetric_permute(&self, pinv: Option<&[usize]>) -> Result<CscMatrix> {
        if !self.is_square() {
            return Err(Error::DimensionMismatch {
                expected: (self.ncols, self.ncols),
                found: self.shape(),
            });
        }
        let n = self.ncols;
        let map = |i: usize| pinv.map_or(i, |pinv| pinv[i]);

        let mut counts = vec![0; n];
        for j in 0..n {
            let j2 = map(j);
            for (i, _) in self.col(j).filter(|&(i, _)| i <= j) {
                counts[map(i).max(j2)] += 1;
            }
        }
        let col_ptr = cumsum(&counts);
        let mut next = col_ptr[..n].to_vec();
        let mut row_idx = vec![0; col_ptr[n]];
        let mut values = vec![0.0; col_ptr[n]];
        for j in 0..n {
            let j2 = map(j);
            for (i, x) in self.col(j).filter(|&(i, _)| i <= j) {
                let i2 = map(i);
                let q = next[i2.max(j2)];
                next[i2.max(j2)] += 1;
                row_idx[q] = i2.min(j2);
                values[q] = x;
            }
        }
        Ok(Self::from_parts(n, n, col_ptr, row_idx, values))
    }

    /// Computes `C = A·B`.
    ///
    /// Each column of `C` is accumulated in a dense vector; the rows of a column appear in the
    /// order they were first touched.
    pub fn multiply(&self, b: &CscMatrix) -> Result<CscMatrix> {
        if self.ncols != b.nrows {
            return Err(Error::DimensionMismatch {
                expected: (self.ncols, b.ncols),
                found: b.shape(),
            });
        }
        let m = self.nrows;
        let n = b.ncols;
        // last column that touched each row
        let mut mark: Vec<Option<usize>> = vec![None; m];
        let mut x = vec![0.0; m];
        let mut col_ptr = Vec::with_capacity(n + 1);
        let mut row_idx = Vec::new();
        let mut values = Vec::new();
        for j in 0..n {
            let start = row_idx.len();
            col_ptr.push(start);
            for (k, bkj) in b.col(j) {
                for (i, aik) in self.col(k) {
                    if mark[i] != Some(j) {
                        mark[i] = Some(j);
                        row_idx.push(i);
                        x[i] = bkj * aik;
                    } else {
                        x[i] += bkj * aik;
                    }
                }
            }
            values.extend(row_idx[start..].iter().map(|&i| x[i]));
        }
        col_ptr.push(row_idx.len());
        Ok(Self::from_parts(m, n, col_ptr, row_idx, values))
    }

    /// Computes `C = alpha·A + beta·B`.
    pub fn add(&self, b: &CscMatrix, alpha: f64, beta: f64) -> Result<CscMatrix> {
        if self.shape() != b.shape() {
            return Err(Error::DimensionMismatch {
                expected: self.shape(),
                found: b.shape(),
            });
        }
        let (m, n) = self.shape();
        let mut mark: Vec<Option<usize>> = vec![None; m];
        let mut x = vec![0.0; m];
        let mut col_ptr = Vec::with_capacity(n + 1);
        let mut row_idx = Vec::with_capacity(self.nnz() + b.nnz());
        let mut values = Vec::with_capacity(self.nnz() + b.nnz());
        for j in 0..n {
            let start = row_idx.len();
            col_ptr.push(start);
            for (scale, mat) in [(alpha, self), (beta, b)] {
                for (i, v) in mat.col(j) {
                    if mark[i] != Some(j) {
                        mark[i] = Some(j);
                        row_idx.push(i);
                        x[i] = scale * v;
                    } else {
                        x[i] += scale * v;
                    }
                }
            }
            values.extend(row_idx[start..].iter().map(|&i| x[i]));
        }
        col_ptr.push(row_idx.len());
        Ok(Self::from_parts(m, n, col_ptr, row_idx, values))
    }

    /// Computes `y = A·x`.
    pub fn mul_vec(&self, x: &[f64]) -> Result<Vec<f64>> {
        if x.len() != self.ncols {
            return Err(Error::DimensionMismatch {
                expected: (self.ncols, 1),
                found: (x.len(), 1),
            });
        }
        let mut y = vec![0.0; self.nrows];
        for (j, &xj) in x.iter().enumerate() {
            for (i, aij) in self.col(j) {
                y[i] += aij * xj;
            }
        }
        Ok(y)
    }

    /// The 1-norm: largest absolute column sum.
    pub fn norm1(&self) -> f64 {
        (0..self.ncols)
            .map(|j| self.col(j).map(|(_, x)| x.abs()).sum::<f64>())
            .fold(0.0, f64::max)
    }

    /// Removes explicitly stored zeros.
    pub fn drop_zeros(self) -> CscMatrix {
        self.filter(|_, _, x| x != 0.0)
    }

    /// Keeps the entries on or above the diagonal.
    pub fn upper_triangle(&self) -> CscMatrix {
        self.clone().filter(|i, j, _| i <= j)
    }

    /// Keeps the entries for which `keep(row, col, value)` holds, compacting in place.
    fn filter(mut self, keep: impl Fn(usize, usize, f64) -> bool) -> CscMatrix {
        let mut nz = 0;
        for j in 0..self.ncols {
            let (lo, hi) = (self.col_ptr[j], self.col_ptr[j + 1]);
            self.col_ptr[j] = nz;
            for p in lo..hi {
                if keep(self.row_idx[p], j, self.values[p]) {
                    self.row_idx[nz] = self.row_idx[p];
                    self.values[nz] = self.values[p];
                    nz += 1;
                }
            }
        }
        self.col_ptr[self.ncols] = nz;
        self.row_idx.truncate(nz);
        self.values.truncate(nz);
        self
    }

    /// Returns the same matrix with ascending row indices in every column.
    pub fn sort_indices(&self) -> CscMatrix {
        self.transpose().transpose()
    }

    /// Largest `|i - j|` over the stored entries.
    pub fn bandwidth(&self) -> usize {
        (0..self.ncols)
            .flat_map(|j| self.col(j).map(move |(i, _)| i.abs_diff(j)))
            .max()
            .unwrap_or(0)
    }
}
