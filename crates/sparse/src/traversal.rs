//! Depth-first reachability over the directed graph of a sparse triangular matrix.
//!
//! Node `j` has an edge to node `i` whenever `i` is a row index in the column of `G` that holds
//! node `j`. The set of nodes reachable from the nonzero rows of a right-hand side is exactly the
//! nonzero pattern of the solution of the corresponding triangular system (Gilbert & Peierls).
//!
//! The search is iterative: each active node lives on an explicit stack as a frame that remembers
//! where to resume scanning its column, so the depth of the graph never touches the call stack.
use crate::{csc::CscRef, CscMatrix, Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Visit {
    Unvisited,
    OnStack,
    Done,
}

#[derive(Clone, Copy, Debug)]
struct Frame {
    node: usize,
    /// next position of the node's column to scan
    next: usize,
    end: usize,
}

/// Workspace for repeated reachability queries on graphs of the same size.
///
/// Every query leaves the visit state as it found it, so one workspace can serve all the columns
/// of a factorization.
#[derive(Debug)]
pub(crate) struct Traversal {
    state: Vec<Visit>,
    stack: Vec<Frame>,
    path: Vec<usize>,
}

impl Traversal {
    pub(crate) fn new(n: usize) -> Self {
        Traversal {
            state: vec![Visit::Unvisited; n],
            stack: Vec::with_capacity(n),
            path: Vec::with_capacity(n),
        }
    }

    /// Writes the nodes of `g` reachable from `seeds` into `xi[top..]` in topological order and
    /// returns `top`.
    ///
    /// `col_of(j)` names the column of `g` holding the edges of node `j`; a node without a column
    /// is a leaf.
    pub(crate) fn reach_with<F>(
        &mut self,
        g: CscRef<'_>,
        seeds: impl IntoIterator<Item = usize>,
        col_of: F,
        xi: &mut [usize],
    ) -> usize
    where
        F: Fn(usize) -> Option<usize>,
    {
        let mut top = xi.len();
        for seed in seeds {
            if self.state[seed] == Visit::Unvisited {
                top = self.dfs(g, seed, &col_of, xi, top);
            }
        }
        for &j in &xi[top..] {
            self.state[j] = Visit::Unvisited;
        }
        top
    }

    fn dfs<F>(
        &mut self,
        g: CscRef<'_>,
        root: usize,
        col_of: &F,
        xi: &mut [usize],
        mut top: usize,
    ) -> usize
    where
        F: Fn(usize) -> Option<usize>,
    {
        let Traversal { state, stack, .. } = self;
        let rows = g.row_idx();
        let frame_for = |node: usize| {
            let range = col_of(node).map_or(0..0, |c| g.col_range(c));
            Frame {
                node,
                next: range.start,
                end: range.end,
            }
        };

        state[root] = Visit::OnStack;
        stack.push(frame_for(root));
        while let Some(frame) = stack.last_mut() {
            let child = loop {
                if frame.next == frame.end {
                    break None;
                }
                let i = rows[frame.next];
                frame.next += 1;
                if state[i] == Visit::Unvisited {
                    break Some(i);
                }
            };
            match child {
                Some(i) => {
                    state[i] = Visit::OnStack;
                    stack.push(frame_for(i));
                }
                None => {
                    // all descendants emitted, so the node can follow them
                    let node = frame.node;
                    stack.pop();
                    state[node] = Visit::Done;
                    top -= 1;
                    xi[top] = node;
                }
            }
        }
        top
    }

    /// Nonzero pattern of row `k` of the Cholesky factor, written to `s[top..]` in topological
    /// order; returns `top`.
    ///
    /// Each upper-triangular entry `(i, k)` of `a` seeds a walk up the elimination tree that stops
    /// at the first node already on the pattern (or at `k` itself).
    pub(crate) fn ereach(
        &mut self,
        a: &CscMatrix,
        k: usize,
        parent: &[Option<usize>],
        s: &mut [usize],
    ) -> usize {
        let Traversal { state, path, .. } = self;
        let mut top = s.len();
        state[k] = Visit::Done;
        for (i, _) in a.col(k) {
            if i > k {
                continue;
            }
            path.clear();
            let mut i = i;
            while state[i] == Visit::Unvisited {
                path.push(i);
                state[i] = Visit::Done;
                match parent[i] {
                    Some(p) => i = p,
                    None => break,
                }
            }
            for &j in path.iter().rev() {
                top -= 1;
                s[top] = j;
            }
        }
        for &j in &s[top..] {
            state[j] = Visit::Unvisited;
        }
        state[k] = Visit::Unvisited;
        top
    }
}

/// Checks that `g` is square, that `b` has a column `k` over the nodes of `g` and that `pinv` is a
/// permutation of them.
pub(crate) fn check_reach(
    g: &CscMatrix,
    b: &CscMatrix,
    k: usize,
    pinv: Option<&[usize]>,
) -> Result<()> {
    let n = g.ncols();
    if !g.is_square() {
        return Err(Error::DimensionMismatch {
            expected: (n, n),
            found: g.shape(),
        });
    }
    if b.nrows() != n || k >= b.ncols() {
        return Err(Error::DimensionMismatch {
            expected: (n, k + 1),
            found: b.shape(),
        });
    }
    if let Some(pinv) = pinv {
        crate::permutation::check_permutation(pinv, n)?;
    }
    Ok(())
}

/// Computes the nodes of the square matrix `g` reachable from the nonzero rows of column `k` of
/// `b`.
///
/// The pattern is written to the end of `xi` (which must have one slot per node of `g`) in an
/// order valid for a single substitution pass, and the returned offset `top` marks its start: the
/// pattern is `xi[top..]`. With `pinv`, node `j` holds its edges in column `pinv[j]` of `g`.
pub fn reach(
    g: &CscMatrix,
    b: &CscMatrix,
    k: usize,
    pinv: Option<&[usize]>,
    xi: &mut [usize],
) -> Result<usize> {
    check_reach(g, b, k, pinv)?;
    let n = g.ncols();
    if xi.len() != n {
        return Err(Error::DimensionMismatch {
            expected: (n, 1),
            found: (xi.len(), 1),
        });
    }

    let mut traversal = Traversal::new(n);
    let top = traversal.reach_with(
        g.view(),
        b.col(k).map(|(i, _)| i),
        |j| Some(pinv.map_or(j, |pinv| pinv[j])),
        xi,
    );
    Ok(top)
}
