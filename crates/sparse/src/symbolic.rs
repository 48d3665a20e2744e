//! Structural analysis of symmetric matrices: elimination tree, postorder and factor column counts.
//!
//! Only the pattern is read. For a symmetric matrix the strictly upper triangle carries all the
//! information, so lower-triangular entries are ignored throughout.
use crate::{CscMatrix, Error, Result};

fn check_square(a: &CscMatrix) -> Result<()> {
    if !a.is_square() {
        return Err(Error::DimensionMismatch {
            expected: (a.ncols(), a.ncols()),
            found: a.shape(),
        });
    }
    Ok(())
}

/// Computes the elimination tree of the symmetric matrix whose upper triangle is stored in `a`.
///
/// `parent[i]` is the parent of column `i`, or `None` if `i` is a root. Columns are processed left
/// to right; every strictly-upper entry `(i, k)` walks up from `i` to the root of its current
/// subtree, which becomes a child of `k`. The walk compresses the visited path onto `k`, which
/// changes only the cost of later walks, never the tree.
pub fn elimination_tree(a: &CscMatrix) -> Result<Vec<Option<usize>>> {
    check_square(a)?;
    let n = a.ncols();
    let mut parent = vec![None; n];
    let mut ancestor: Vec<Option<usize>> = vec![None; n];
    for k in 0..n {
        for (i, _) in a.col(k) {
            let mut i = Some(i);
            // traverse from i to the root of its subtree, compressing the path onto k
            while let Some(node) = i.filter(|&node| node < k) {
                let next = ancestor[node];
                ancestor[node] = Some(k);
                if next.is_none() {
                    parent[node] = Some(k);
                }
                i = next;
            }
        }
    }
    Ok(parent)
}

/// Computes a postorder of the forest described by `parent`.
///
/// Children are linked into first-child/next-sibling lists in a single backwards scan, so each
/// node's children are visited in increasing order. Roots are visited in increasing order too.
pub fn postorder(parent: &[Option<usize>]) -> Vec<usize> {
    let n = parent.len();
    let mut head: Vec<Option<usize>> = vec![None; n];
    let mut next: Vec<Option<usize>> = vec![None; n];
    for j in (0..n).rev() {
        if let Some(p) = parent[j] {
            next[j] = head[p];
            head[p] = Some(j);
        }
    }

    let mut post = Vec::with_capacity(n);
    let mut stack = Vec::with_capacity(n);
    for root in (0..n).filter(|&j| parent[j].is_none()) {
        stack.push(root);
        while let Some(&p) = stack.last() {
            match head[p] {
                // all children done
                None => {
                    stack.pop();
                    post.push(p);
                }
                Some(child) => {
                    head[p] = next[child];
                    stack.push(child);
                }
            }
        }
    }
    post
}

/// Determines whether `j` is a leaf of the `i`-th row subtree, returning the least common
/// ancestor of `j` and the previous leaf of that subtree when it is not the first.
struct RowSubtrees {
    first: Vec<Option<usize>>,
    maxfirst: Vec<Option<usize>>,
    prevleaf: Vec<Option<usize>>,
    ancestor: Vec<usize>,
}

enum Leaf {
    NotLeaf,
    First,
    Subsequent { lca: usize },
}

impl RowSubtrees {
    fn leaf(&mut self, i: usize, j: usize) -> Leaf {
        if i <= j || self.first[j] <= self.maxfirst[i] {
            return Leaf::NotLeaf;
        }
        self.maxfirst[i] = self.first[j];
        let Some(jprev) = self.prevleaf[i].replace(j) else {
            return Leaf::First;
        };

        let mut q = jprev;
        while q != self.ancestor[q] {
            q = self.ancestor[q];
        }
        let mut s = jprev;
        while s != q {
            let sparent = self.ancestor[s];
            self.ancestor[s] = q;
            s = sparent;
        }
        Leaf::Subsequent { lca: q }
    }
}

/// Computes the number of nonzeros in each column of the Cholesky factor, diagonal included.
///
/// Walking columns in postorder, each row `i` of the factor is the union of tree paths from the
/// leaves of its row subtree up to `i`. A column's count collects +1 for every row subtree it is a
/// leaf of, -1 at the least common ancestor of consecutive leaves and -1 at its parent; summing
/// these over each subtree yields the counts. Least common ancestors come from a disjoint-set
/// forest over already visited columns with path compression.
pub fn column_counts(
    a: &CscMatrix,
    parent: &[Option<usize>],
    post: &[usize],
) -> Result<Vec<usize>> {
    check_square(a)?;
    let n = a.ncols();
    if parent.len() != n || post.len() != n {
        return Err(Error::structural(format!(
            "elimination tree and postorder must both have length {n}"
        )));
    }

    let at = a.transpose();
    let mut delta = vec![0isize; n];
    let mut subtrees = RowSubtrees {
        first: vec![None; n],
        maxfirst: vec![None; n],
        prevleaf: vec![None; n],
        ancestor: (0..n).collect(),
    };

    // first[j] is the postorder index of the first descendant of j
    for (k, &j) in post.iter().enumerate() {
        if subtrees.first[j].is_none() {
            delta[j] = 1;
        }
        let mut j = Some(j);
        while let Some(node) = j.filter(|&node| subtrees.first[node].is_none()) {
            subtrees.first[node] = Some(k);
            j = parent[node];
        }
    }

    for &j in post {
        if let Some(p) = parent[j] {
            delta[p] -= 1;
        }
        for (i, _) in at.col(j) {
            match subtrees.leaf(i, j) {
                Leaf::NotLeaf => {}
                Leaf::First => delta[j] += 1,
                Leaf::Subsequent { lca } => {
                    delta[j] += 1;
                    delta[lca] -= 1;
                }
            }
        }
        if let Some(p) = parent[j] {
            subtrees.ancestor[j] = p;
        }
    }

    // parents always follow their children
    for j in 0..n {
        if let Some(p) = parent[j] {
            delta[p] += delta[j];
        }
    }
    Ok(delta.into_iter().map(|c| c.max(0) as usize).collect())
}

#[cfg(test)]
mod tests {
    use nalgebra::DMatrix;

    use super::*;

    fn upper(n: usize, entries: &[(usize, usize)]) -> CscMatrix {
        let mut triplets: Vec<_> = (0..n).map(|i| (i, i, 1.0)).collect();
        triplets.extend(entries.iter().map(|&(i, j)| (i, j, 1.0)));
        CscMatrix::from_triplets(n, n, &triplets).unwrap()
    }

    /// Column counts by eliminating a dense boolean pattern.
    fn brute_force_counts(a: &CscMatrix) -> Vec<usize> {
        let n = a.ncols();
        let mut pattern = DMatrix::from_element(n, n, false);
        for j in 0..n {
            for (i, _) in a.col(j) {
                pattern[(i, j)] = true;
                pattern[(j, i)] = true;
            }
        }
        let mut counts = vec![0; n];
        for k in 0..n {
            let below: Vec<usize> = (k + 1..n).filter(|&i| pattern[(i, k)]).collect();
            counts[k] = below.len() + 1;
            for &i in &below {
                for &j in &below {
                    pattern[(i, j)] = true;
                }
            }
        }
        counts
    }

    #[test]
    fn test_etree_arrow() {
        let a = upper(4, &[(0, 3), (1, 3), (2, 3)]);
        let parent = elimination_tree(&a).unwrap();
        assert_eq!(parent, vec![Some(3), Some(3), Some(3), None]);
        let post = postorder(&parent);
        assert_eq!(post, vec![0, 1, 2, 3]);
        assert_eq!(column_counts(&a, &parent, &post).unwrap(), vec![2, 2, 2, 1]);
    }

    #[test]
    fn test_etree_fill() {
        let a = upper(3, &[(0, 1), (0, 2)]);
        let parent = elimination_tree(&a).unwrap();
        assert_eq!(parent, vec![Some(1), Some(2), None]);
        let post = postorder(&parent);
        assert_eq!(column_counts(&a, &parent, &post).unwrap(), vec![3, 2, 1]);
    }

    #[test]
    fn test_etree_ignores_lower_triangle() {
        let full = CscMatrix::from_dense(&nalgebra::dmatrix![
            1.0, 0.0, 1.0;
            0.0, 1.0, 1.0;
            1.0, 1.0, 1.0
        ]);
        let parent = elimination_tree(&full).unwrap();
        assert_eq!(parent, elimination_tree(&full.upper_triangle()).unwrap());
        assert_eq!(parent, vec![Some(2), Some(2), None]);
        let post = postorder(&parent);
        assert_eq!(column_counts(&full, &parent, &post).unwrap(), vec![2, 2, 1]);
    }

    #[test]
    fn test_postorder_forest() {
        // two trees: 0 -> 2 <- 1 and 3 -> 4, plus an isolated 5
        let parent = vec![Some(2), Some(2), None, Some(4), None, None];
        assert_eq!(postorder(&parent), vec![0, 1, 2, 3, 4, 5]);

        // children are visited in increasing order regardless of labels
        let parent = vec![None, Some(0), Some(3), Some(0)];
        assert_eq!(postorder(&parent), vec![1, 2, 3, 0]);
    }

    #[test]
    fn test_counts_match_elimination() {
        let a = upper(
            8,
            &[
                (0, 3),
                (0, 5),
                (1, 4),
                (2, 6),
                (3, 6),
                (4, 7),
                (5, 7),
                (1, 6),
                (6, 7),
            ],
        );
        let parent = elimination_tree(&a).unwrap();
        let post = postorder(&parent);
        assert_eq!(
            column_counts(&a, &parent, &post).unwrap(),
            brute_force_counts(&a)
        );
    }

    #[test]
    fn test_rejects_rectangular() {
        let a = CscMatrix::zeros(2, 3);
        assert!(elimination_tree(&a).is_err());
    }
}
