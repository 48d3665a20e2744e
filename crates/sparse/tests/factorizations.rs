//! Model problems run through the whole pipeline: ordering, symbolic analysis, factorization and
//! solve.
//!
//! The 2-D Poisson matrix on a `k x k` grid (five-point stencil) is symmetric positive definite and
//! banded, so every factorization applies to it. A convection term breaks the symmetry for LU.

use approx::assert_relative_eq;
use nalgebra::{DMatrix, DVector};
use sparse::{
    approximate_minimum_degree, cholesky_factor, cholesky_symbolic, column_counts,
    elimination_tree, invert_permutation, lu_factor, permutation::is_permutation, postorder,
    qr_factor, reach, reverse_cuthill_mckee, solve, CscMatrix, Error, Ordering,
};

const ORDERINGS: [Ordering; 3] = [
    Ordering::Natural,
    Ordering::MinimumDegree,
    Ordering::ReverseCuthillMcKee,
];

/// Five-point Laplacian plus `convection` times a forward difference in x.
fn grid(k: usize, convection: f64) -> CscMatrix {
    let idx = |x: usize, y: usize| x + k * y;
    let mut triplets = Vec::new();
    for y in 0..k {
        for x in 0..k {
            let i = idx(x, y);
            triplets.push((i, i, 4.0));
            if x > 0 {
                triplets.push((i, idx(x - 1, y), -1.0 - convection));
            }
            if x + 1 < k {
                triplets.push((i, idx(x + 1, y), -1.0 + convection));
            }
            if y > 0 {
                triplets.push((i, idx(x, y - 1), -1.0));
            }
            if y + 1 < k {
                triplets.push((i, idx(x, y + 1), -1.0));
            }
        }
    }
    CscMatrix::from_triplets(k * k, k * k, &triplets).unwrap()
}

fn rhs(n: usize) -> Vec<f64> {
    (0..n).map(|i| (i as f64 * 0.7).sin() + 1.0).collect()
}

fn assert_solves(a: &CscMatrix, x: &[f64], b: &[f64]) {
    let ax = a.mul_vec(x).unwrap();
    assert_relative_eq!(
        DVector::from_column_slice(&ax),
        DVector::from_column_slice(b),
        epsilon = 1e-10
    );
}

#[test_log::test]
fn cholesky_round_trip() {
    let a = grid(5, 0.0);
    for ordering in ORDERINGS {
        let symbolic = cholesky_symbolic(&a, ordering).unwrap();
        let factor = cholesky_factor(&a, &symbolic).unwrap();
        let l = factor.l().to_dense();
        let pap = match factor.perm() {
            Some(p) => a.permute(Some(&invert_permutation(p)), Some(p)),
            None => a.clone(),
        };
        assert_relative_eq!(&l * l.transpose(), pap.to_dense(), epsilon = 1e-12);
        assert_eq!(factor.l().nnz(), symbolic.nnz());

        let b = rhs(a.ncols());
        assert_solves(&a, &factor.solve(&b).unwrap(), &b);
    }
}

#[test]
fn cholesky_refactor_same_pattern() {
    let a = grid(4, 0.0);
    let symbolic = cholesky_symbolic(&a, Ordering::MinimumDegree).unwrap();
    let shifted = a.add(&CscMatrix::identity(a.ncols()), 1.0, 2.0).unwrap();
    let factor = cholesky_factor(&shifted, &symbolic).unwrap();
    let b = rhs(a.ncols());
    assert_solves(&shifted, &factor.solve(&b).unwrap(), &b);
}

#[test]
fn cholesky_identity_and_indefinite() {
    for n in [1, 3, 8] {
        let a = CscMatrix::identity(n);
        let symbolic = cholesky_symbolic(&a, Ordering::Natural).unwrap();
        assert_eq!(cholesky_factor(&a, &symbolic).unwrap().l(), &a);
    }

    let a = CscMatrix::from_dense(&DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]));
    let symbolic = cholesky_symbolic(&a, Ordering::Natural).unwrap();
    match cholesky_factor(&a, &symbolic) {
        Err(Error::NotPositiveDefinite { col }) => assert!(col <= 1),
        other => panic!("expected NotPositiveDefinite, got {other:?}"),
    }
}

#[test]
fn lu_round_trip() {
    let a = grid(4, 0.6);
    for ordering in ORDERINGS {
        for tol in [1.0, 0.1] {
            let factor = lu_factor(&a, tol, ordering).unwrap();
            let paq = a.permute(Some(factor.pinv()), factor.q()).to_dense();
            let lu = factor.l().to_dense() * factor.u().to_dense();
            assert_relative_eq!(lu, paq, epsilon = 1e-12);
            assert!(is_permutation(factor.pinv()));

            let b = rhs(a.ncols());
            assert_solves(&a, &factor.solve(&b).unwrap(), &b);
        }
    }
}

#[test]
fn lu_identity_and_singular() {
    let factor = lu_factor(&CscMatrix::identity(4), 1.0, Ordering::Natural).unwrap();
    assert_eq!(factor.l(), &CscMatrix::identity(4));
    assert_eq!(factor.u(), &CscMatrix::identity(4));
    assert_eq!(factor.pinv(), &[0, 1, 2, 3]);

    let a = CscMatrix::from_dense(&DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 0.0, 1.0]));
    assert!(matches!(
        lu_factor(&a, 1.0, Ordering::Natural),
        Err(Error::SingularMatrix { .. })
    ));
}

#[test]
fn qr_round_trip() {
    // stack two grids to get a tall system
    let top = grid(3, 0.3);
    let bottom = CscMatrix::identity(9);
    let mut triplets = Vec::new();
    for j in 0..9 {
        for (i, v) in top.col(j) {
            triplets.push((i, j, v));
        }
        for (i, v) in bottom.col(j) {
            triplets.push((i + 9, j, v));
        }
    }
    let a = CscMatrix::from_triplets(18, 9, &triplets).unwrap();

    for ordering in ORDERINGS {
        let factor = qr_factor(&a, ordering).unwrap();
        let r = factor.r().to_dense();
        let aq = a.permute(None, factor.q()).to_dense();
        for j in 0..9 {
            let mut x = vec![0.0; 18];
            for i in 0..9 {
                x[i] = r[(i, j)];
            }
            factor.apply_q(&mut x, false).unwrap();
            for i in 0..18 {
                assert_relative_eq!(x[i], aq[(i, j)], epsilon = 1e-12);
            }
        }

        // least squares: Aᵗ(b - Ax) = 0
        let b = rhs(18);
        let x = factor.solve(&b).unwrap();
        let ax = a.mul_vec(&x).unwrap();
        let residual: Vec<f64> = b.iter().zip(&ax).map(|(b, ax)| b - ax).collect();
        let normal = a.transpose().mul_vec(&residual).unwrap();
        for g in normal {
            assert!(g.abs() < 1e-10);
        }
    }
}

#[test]
fn permutation_involution() {
    let perms: [&[usize]; 3] = [&[0], &[3, 1, 0, 2], &[4, 0, 3, 1, 2]];
    for perm in perms {
        let pinv = invert_permutation(perm);
        assert_eq!(invert_permutation(&pinv), perm);
        for (i, &p) in perm.iter().enumerate() {
            assert_eq!(pinv[p], i);
        }
    }
}

#[test]
fn transpose_is_idempotent() {
    let a = grid(3, 0.5);
    let att = a.transpose().transpose();
    assert_eq!(att.to_dense(), a.to_dense());
    assert_eq!(att.nnz(), a.nnz());

    let rect = CscMatrix::from_triplets(2, 3, &[(1, 0, 1.0), (0, 2, 2.0), (1, 2, 3.0)]).unwrap();
    assert_eq!(rect.transpose().shape(), (3, 2));
    assert_eq!(rect.transpose().transpose().to_dense(), rect.to_dense());
}

#[test]
fn reach_covers_solve() {
    let symbolic = cholesky_symbolic(&grid(4, 0.0), Ordering::Natural).unwrap();
    let l = cholesky_factor(&grid(4, 0.0), &symbolic).unwrap().l().clone();
    let n = l.ncols();
    let b = CscMatrix::from_triplets(n, 1, &[(2, 0, 1.0), (9, 0, -2.0)]).unwrap();

    let mut xi = vec![0; n];
    let top = reach(&l, &b, 0, None, &mut xi).unwrap();
    let pattern = &xi[top..];
    let mut sorted = pattern.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted.len(), pattern.len());

    let sol = solve(&l, &b, 0, None, true).unwrap();
    assert_eq!(sol.pattern, pattern);
    for i in 0..n {
        if !pattern.contains(&i) {
            assert_eq!(sol.x[i], 0.0);
        }
    }

    let mut dense = b.to_dense().column(0).iter().copied().collect::<Vec<_>>();
    sparse::triangular::lower_solve(&l, &mut dense).unwrap();
    for i in 0..n {
        assert_relative_eq!(sol.x[i], dense[i], epsilon = 1e-12);
    }
}

#[test]
fn symbolic_counts_match_factor() {
    let a = grid(4, 0.0);
    let parent = elimination_tree(&a).unwrap();
    let post = postorder(&parent);
    assert!(is_permutation(&post));
    let counts = column_counts(&a, &parent, &post).unwrap();

    let symbolic = cholesky_symbolic(&a, Ordering::Natural).unwrap();
    let l = cholesky_factor(&a, &symbolic).unwrap().l().clone();
    for j in 0..a.ncols() {
        assert_eq!(l.col_range(j).len(), counts[j]);
    }

    // children come before their parent in the postorder
    let mut position = vec![0; post.len()];
    for (k, &j) in post.iter().enumerate() {
        position[j] = k;
    }
    for (j, p) in parent.iter().enumerate() {
        if let Some(p) = p {
            assert!(position[j] < position[*p]);
        }
    }
}

#[test]
fn minimum_degree_on_diagonal() {
    let a = CscMatrix::identity(7);
    let perm = approximate_minimum_degree(&a).unwrap();
    assert!(is_permutation(&perm));
    assert_eq!(perm.len(), 7);
}

#[test]
fn rcm_does_not_widen_band() {
    // a banded matrix whose natural order is scrambled
    let k = 5;
    let banded = grid(k, 0.0);
    let scramble: Vec<usize> = (0..k * k).map(|i| (i * 7) % (k * k)).collect();
    assert!(is_permutation(&scramble));
    let a = banded.permute(Some(&invert_permutation(&scramble)), Some(&scramble));

    for m in [&banded, &a] {
        let perm = reverse_cuthill_mckee(m).unwrap();
        assert!(is_permutation(&perm));
        let pinv = invert_permutation(&perm);
        let reordered = m.permute(Some(&pinv), Some(&perm));
        assert!(reordered.bandwidth() <= m.bandwidth());
    }
}
