//! # Diff Engine
//!
//! Myers' shortest edit script between two sequences. Paths use it to turn
//! a bulk replacement into the smallest set of inserts and deletes, so
//! screens that survive keep their identity (and whatever the renderer
//! attached to them).
//!
//! ```text
//! old: A B C D        Keep(0,0) Delete(1) Keep(2,1) Insert(E,2) Keep(3,3)
//! new: A C E D
//! ```
//!
//! Scripts are only meaningful for the exact `(old, new)` pair that
//! produced them.

use crate::core::identity::Screen;

#[derive(Debug, Clone, PartialEq)]
pub enum DiffOp<T> {
    Keep { old: usize, new: usize },
    Insert { item: T, new: usize },
    Delete { old: usize },
}

impl<T> DiffOp<T> {
    /// Inserts and deletes change the sequence; keeps do not.
    pub fn is_structural(&self) -> bool {
        !matches!(self, DiffOp::Keep { .. })
    }
}

/// Myers' algorithm with a snapshot of the frontier at every depth.
///
/// When extending from diagonal `k-1` (delete) and `k+1` (insert) reach the
/// same `x`, the insert wins. Identical inputs produce only `Keep` ops.
pub fn diff<T, F>(old: &[T], new: &[T], eq: F) -> Vec<DiffOp<T>>
where
    T: Clone,
    F: Fn(&T, &T) -> bool,
{
    let n = old.len();
    let m = new.len();

    if n == 0 {
        return new
            .iter()
            .enumerate()
            .map(|(i, item)| DiffOp::Insert { item: item.clone(), new: i })
            .collect();
    }
    if m == 0 {
        return (0..n).map(|i| DiffOp::Delete { old: i }).collect();
    }

    let max = n + m;
    let offset = max as isize;
    let idx = |k: isize| (k + offset) as usize;

    // v[k] = furthest x reached on diagonal k = x - y
    let mut v = vec![0isize; 2 * max + 2];
    let mut trace: Vec<Vec<isize>> = Vec::new();
    let (n_i, m_i) = (n as isize, m as isize);

    let mut depth = 0;
    'search: for d in 0..=max as isize {
        trace.push(v.clone());
        let mut k = -d;
        while k <= d {
            let mut x = if k == -d || (k != d && v[idx(k - 1)] < v[idx(k + 1)]) {
                v[idx(k + 1)]
            } else {
                v[idx(k - 1)] + 1
            };
            let mut y = x - k;
            while x < n_i && y < m_i && eq(&old[x as usize], &new[y as usize]) {
                x += 1;
                y += 1;
            }
            v[idx(k)] = x;
            if x >= n_i && y >= m_i {
                depth = d;
                break 'search;
            }
            k += 2;
        }
    }

    backtrack(&trace, depth, old.len(), new, idx)
}

fn backtrack<T: Clone>(
    trace: &[Vec<isize>],
    depth: isize,
    n: usize,
    new: &[T],
    idx: impl Fn(isize) -> usize,
) -> Vec<DiffOp<T>> {
    let mut ops = Vec::new();
    let mut x = n as isize;
    let mut y = new.len() as isize;

    for d in (0..=depth).rev() {
        let v = &trace[d as usize];
        let k = x - y;
        let prev_k = if k == -d || (k != d && v[idx(k - 1)] < v[idx(k + 1)]) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = v[idx(prev_k)];
        let prev_y = prev_x - prev_k;

        while x > prev_x && y > prev_y {
            x -= 1;
            y -= 1;
            ops.push(DiffOp::Keep {
                old: x as usize,
                new: y as usize,
            });
        }

        if d > 0 {
            if x == prev_x {
                ops.push(DiffOp::Insert {
                    item: new[prev_y as usize].clone(),
                    new: prev_y as usize,
                });
            } else {
                ops.push(DiffOp::Delete { old: prev_x as usize });
            }
        }

        x = prev_x;
        y = prev_y;
    }

    ops.reverse();
    ops
}

/// [`diff`] using screen identity.
pub fn diff_screens(old: &[Screen], new: &[Screen]) -> Vec<DiffOp<Screen>> {
    diff(old, new, |a, b| a == b)
}

/// Old indices to delete (highest first) and inserts (lowest target first).
pub fn partition<T>(ops: &[DiffOp<T>]) -> (Vec<usize>, Vec<(usize, &T)>) {
    let mut deletes: Vec<usize> = ops
        .iter()
        .filter_map(|op| match op {
            DiffOp::Delete { old } => Some(*old),
            _ => None,
        })
        .collect();
    deletes.sort_unstable_by(|a, b| b.cmp(a));

    let mut inserts: Vec<(usize, &T)> = ops
        .iter()
        .filter_map(|op| match op {
            DiffOp::Insert { item, new } => Some((*new, item)),
            _ => None,
        })
        .collect();
    inserts.sort_unstable_by_key(|(at, _)| *at);

    (deletes, inserts)
}

/// Applies a script to a copy of `old`.
pub fn apply<T: Clone>(old: &[T], ops: &[DiffOp<T>]) -> Vec<T> {
    let mut out = old.to_vec();
    let (deletes, inserts) = partition(ops);
    for at in deletes {
        out.remove(at);
    }
    for (at, item) in inserts {
        out.insert(at, item.clone());
    }
    out
}
