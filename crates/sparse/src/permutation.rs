//! Permutations stored as plain index arrays.
//!
//! A forward permutation `p` places original index `p[k]` at position `k`; its inverse `pinv`
//! maps original index `i` to position `pinv[i]`. Routines taking an `Option<&[usize]>` treat
//! `None` as the identity.
use crate::{Error, Result};

/// Returns `pinv` with `pinv[perm[k]] = k`.
pub fn invert_permutation(perm: &[usize]) -> Vec<usize> {
    let mut pinv = vec![0; perm.len()];
    for (k, &i) in perm.iter().enumerate() {
        pinv[i] = k;
    }
    pinv
}

/// True if `perm` is a bijection on `0..perm.len()`.
pub fn is_permutation(perm: &[usize]) -> bool {
    let mut seen = vec![false; perm.len()];
    perm.iter().all(|&i| {
        if i >= seen.len() || seen[i] {
            false
        } else {
            seen[i] = true;
            true
        }
    })
}

pub(crate) fn check_permutation(perm: &[usize], n: usize) -> Result<()> {
    if perm.len() != n || !is_permutation(perm) {
        return Err(Error::structural(format!(
            "not a permutation of 0..{n}"
        )));
    }
    Ok(())
}

pub(crate) fn check_rhs(n: usize, b: &[f64]) -> Result<()> {
    if b.len() != n {
        return Err(Error::DimensionMismatch {
            expected: (n, 1),
            found: (b.len(), 1),
        });
    }
    Ok(())
}

/// Computes `x = P·b`, i.e. `x[k] = b[p[k]]`.
pub fn permute_vec(p: Option<&[usize]>, b: &[f64]) -> Vec<f64> {
    match p {
        Some(p) => p.iter().map(|&i| b[i]).collect(),
        None => b.to_vec(),
    }
}

/// Computes `x = Pᵗ·b`, i.e. `x[p[k]] = b[k]`.
pub fn inverse_permute_vec(p: Option<&[usize]>, b: &[f64]) -> Vec<f64> {
    match p {
        Some(p) => {
            let mut x = vec![0.0; b.len()];
            for (k, &i) in p.iter().enumerate() {
                x[i] = b[k];
            }
            x
        }
        None => b.to_vec(),
    }
}
