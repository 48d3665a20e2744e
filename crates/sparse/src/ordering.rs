//! Fill-reducing and bandwidth-reducing orderings, computed from the pattern of `A + Aᵗ`.
//!
//! All orderings are returned as forward permutations: `perm[k]` is the original index placed at
//! position `k`.
#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

use crate::{CscMatrix, Error, Result};

/// Symmetric permutation applied ahead of a factorization.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Ordering {
    /// Keep the matrix as given.
    #[default]
    Natural,
    /// [`approximate_minimum_degree`]
    MinimumDegree,
    /// [`reverse_cuthill_mckee`]
    ReverseCuthillMcKee,
}

impl Ordering {
    /// Computes the permutation for the square matrix `a`, or `None` for [`Ordering::Natural`].
    pub fn permutation(self, a: &CscMatrix) -> Result<Option<Vec<usize>>> {
        match self {
            Ordering::Natural => {
                if !a.is_square() {
                    return Err(Error::DimensionMismatch {
                        expected: (a.ncols(), a.ncols()),
                        found: a.shape(),
                    });
                }
                Ok(None)
            }
            Ordering::MinimumDegree => approximate_minimum_degree(a).map(Some),
            Ordering::ReverseCuthillMcKee => reverse_cuthill_mckee(a).map(Some),
        }
    }
}

/// Neighbor lists of the undirected graph of `A + Aᵗ`, without self loops, each sorted ascending.
fn adjacency(a: &CscMatrix) -> Result<Vec<Vec<usize>>> {
    if !a.is_square() {
        return Err(Error::DimensionMismatch {
            expected: (a.ncols(), a.ncols()),
            found: a.shape(),
        });
    }
    let n = a.ncols();
    let mut adj = vec![Vec::new(); n];
    for j in 0..n {
        for (i, _) in a.col(j).filter(|&(i, _)| i != j) {
            adj[i].push(j);
            adj[j].push(i);
        }
    }
    for neighbors in &mut adj {
        neighbors.sort_unstable();
        neighbors.dedup();
    }
    Ok(adj)
}

/// Greedy minimum-degree ordering.
///
/// Repeatedly orders the remaining node of smallest current degree (lowest index on ties) and
/// decrements the degree of its unordered neighbors. This is a simplified heuristic: there is no
/// quotient graph, so the fill created by eliminating a node is not tracked and element absorption
/// never happens. The result is a valid and usually good fill-reducing order, but it is not what a
/// full AMD implementation would produce.
///
/// Degrees are taken on the graph of `A + Aᵗ`: the starting degree of a node is its number of
/// distinct off-diagonal neighbors, not the raw entry count of its row or column. Diagonal entries
/// and entries stored on only one side of the diagonal therefore do not change the order.
pub fn approximate_minimum_degree(a: &CscMatrix) -> Result<Vec<usize>> {
    let adj = adjacency(a)?;
    let n = adj.len();
    let mut degree: Vec<usize> = adj.iter().map(Vec::len).collect();
    let mut ordered = vec![false; n];
    let mut perm = Vec::with_capacity(n);
    while perm.len() < n {
        let Some(k) = (0..n).filter(|&i| !ordered[i]).min_by_key(|&i| degree[i]) else {
            break;
        };
        ordered[k] = true;
        perm.push(k);
        for &j in &adj[k] {
            if !ordered[j] {
                degree[j] = degree[j].saturating_sub(1);
            }
        }
    }
    log::debug!("minimum degree ordering of {n} nodes");
    Ok(perm)
}

/// Stable insertion sort of `nodes` by ascending degree.
fn sort_by_degree(nodes: &mut [usize], degree: &[usize]) {
    for k in 1..nodes.len() {
        let v = nodes[k];
        let mut i = k;
        while i > 0 && degree[nodes[i - 1]] > degree[v] {
            nodes[i] = nodes[i - 1];
            i -= 1;
        }
        nodes[i] = v;
    }
}

/// Reverse Cuthill-McKee ordering.
///
/// Connected components are taken in increasing order of their lowest-numbered node. Each is
/// searched breadth first from its node of minimum degree (lowest index on ties), appending the
/// unvisited neighbors of every node in ascending degree order. The complete Cuthill-McKee order
/// is then reversed.
pub fn reverse_cuthill_mckee(a: &CscMatrix) -> Result<Vec<usize>> {
    let adj = adjacency(a)?;
    let n = adj.len();
    let degree: Vec<usize> = adj.iter().map(Vec::len).collect();
    let mut found = vec![false; n];
    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut component = Vec::new();

    for start in 0..n {
        if found[start] {
            continue;
        }

        component.clear();
        component.push(start);
        found[start] = true;
        let mut c = 0;
        while c < component.len() {
            let node = component[c];
            c += 1;
            for &j in &adj[node] {
                if !found[j] {
                    found[j] = true;
                    component.push(j);
                }
            }
        }
        let seed = component
            .iter()
            .copied()
            .min_by_key(|&i| (degree[i], i))
            .unwrap_or(start);

        visited[seed] = true;
        let mut cursor = order.len();
        order.push(seed);
        while cursor < order.len() {
            let node = order[cursor];
            cursor += 1;
            let level = order.len();
            for &j in &adj[node] {
                if !visited[j] {
                    visited[j] = true;
                    order.push(j);
                }
            }
            sort_by_degree(&mut order[level..], &degree);
        }
    }

    order.reverse();
    log::debug!("reverse Cuthill-McKee ordering of {n} nodes");
    Ok(order)
}
