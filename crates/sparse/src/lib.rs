//! The `sparse` crate provides compressed sparse column matrices and the direct solvers built on
//! them.
//!
//! The pipeline runs from the pattern to the numbers:
//!
//! 1. [`CscMatrix`] storage with transpose, permutation and multiplication.
//! 2. Depth-first reachability ([`reach`]), which predicts the pattern of a sparse triangular solve.
//! 3. Symbolic analysis: [`elimination_tree`], [`postorder`] and [`column_counts`].
//! 4. Fill-reducing and bandwidth-reducing orderings ([`Ordering`]).
//! 5. Numeric factorizations: Cholesky ([`cholesky_symbolic`], [`cholesky_factor`]), LU with
//!    threshold partial pivoting ([`lu_factor`]) and Householder QR ([`qr_factor`]).
//! 6. Triangular solves against the factors ([`solve`] and the dense-vector solves in
//!    [`triangular`]).
//!
//! All routines operate on `f64` values, allocate their own workspace and hold no global state.
//!
//! ```
//! use sparse::{cholesky_factor, cholesky_symbolic, CscMatrix, Ordering};
//!
//! let a = CscMatrix::from_triplets(
//!     3,
//!     3,
//!     &[(0, 0, 4.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 3.0), (2, 2, 2.0)],
//! )
//! .unwrap();
//! let symbolic = cholesky_symbolic(&a, Ordering::MinimumDegree).unwrap();
//! let factor = cholesky_factor(&a, &symbolic).unwrap();
//! let x = factor.solve(&[5.0, 4.0, 2.0]).unwrap();
//! assert!((x[0] - 1.0).abs() < 1e-12);
//! ```

mod cholesky;
mod csc;
mod error;
mod lu;
pub mod ordering;
pub mod permutation;
mod qr;
pub mod symbolic;
mod traversal;
pub mod triangular;

pub use cholesky::{cholesky_factor, cholesky_symbolic, CholeskyFactor, CholeskySymbolic};
pub use csc::CscMatrix;
pub use error::{Error, Result};
pub use lu::{lu_factor, LuFactor};
pub use ordering::{approximate_minimum_degree, reverse_cuthill_mckee, Ordering};
pub use permutation::invert_permutation;
pub use qr::{qr_factor, QrFactor};
pub use symbolic::{column_counts, elimination_tree, postorder};
pub use traversal::reach;
pub use triangular::{solve, SparseSolution};
