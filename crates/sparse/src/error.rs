use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The input violates a structural precondition of the routine.
    #[error("Malformed sparse structure: {msg}")]
    Structural { msg: String },

    /// Operand shapes don't agree.
    #[error("Dimension mismatch: expected {expected:?}, found {found:?}")]
    DimensionMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// LU found no acceptable pivot at column `col`.
    #[error("A singular matrix was encountered during a LU factorization (col {col})")]
    SingularMatrix { col: usize },

    /// The running diagonal of a Cholesky factorization became non-positive at column `col`.
    #[error("The matrix is not positive definite (col {col})")]
    NotPositiveDefinite { col: usize },

    #[error("Pivot tolerance {tol} is outside of (0, 1]")]
    ToleranceOutOfRange { tol: f64 },
}

impl Error {
    pub(crate) fn structural(msg: impl Into<String>) -> Self {
        Error::Structural { msg: msg.into() }
    }

    /// Signed status code of this failure.
    ///
    /// Numeric failures at column `k` are reported as `-(k+1)` so that the failing column can be
    /// recovered from the code alone; every other failure is `-1`. Zero is reserved for success
    /// and never returned here.
    pub fn status_code(&self) -> i32 {
        match *self {
            Error::SingularMatrix { col } | Error::NotPositiveDefinite { col } => {
                -(i32::try_from(col).unwrap_or(i32::MAX - 1) + 1)
            }
            _ => -1,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
