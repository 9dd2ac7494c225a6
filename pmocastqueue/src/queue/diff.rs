//! Stable diff between two orderings of the same queue.
//!
//! The receiver only ever reports the whole new order. To avoid refreshing
//! the whole list, we compute a longest common subsequence over item ids:
//! entries on the LCS keep their identity, everything else was inserted,
//! removed or moved. The refreshed span covers the rows of the non-LCS
//! entries only.

use crate::model::{AffectedRange, ItemId};

/// Result of comparing the local order with a new remote order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueueDiff {
    /// Number of entries kept in place by the LCS.
    pub kept: usize,
    /// Ids of the new order that are not on the LCS (new or moved).
    pub placed: Vec<ItemId>,
    /// Ids of the old order that are not on the LCS (gone or moved).
    pub displaced: Vec<ItemId>,
    /// Rows that may render differently, `None` if both orders are equal.
    pub span: Option<AffectedRange>,
}

impl QueueDiff {
    pub fn compute(current: &[ItemId], desired: &[ItemId]) -> Self {
        let prefix = current
            .iter()
            .zip(desired)
            .take_while(|(a, b)| a == b)
            .count();
        let suffix = current[prefix..]
            .iter()
            .rev()
            .zip(desired[prefix..].iter().rev())
            .take_while(|(a, b)| a == b)
            .count();

        // only the middle section needs the quadratic table
        let old_mid = &current[prefix..current.len() - suffix];
        let new_mid = &desired[prefix..desired.len() - suffix];
        let pairs = lcs_pairs(old_mid, new_mid);

        let mut old_kept = vec![false; old_mid.len()];
        let mut new_kept = vec![false; new_mid.len()];
        for &(i, j) in &pairs {
            old_kept[i] = true;
            new_kept[j] = true;
        }

        let mut displaced = Vec::new();
        let mut placed = Vec::new();
        let mut touched = Vec::new();
        for (offset, id) in old_mid.iter().enumerate() {
            if !old_kept[offset] {
                displaced.push(*id);
                touched.push(prefix + offset);
            }
        }
        for (offset, id) in new_mid.iter().enumerate() {
            if !new_kept[offset] {
                placed.push(*id);
                touched.push(prefix + offset);
            }
        }

        // a length change shifts every row after the first touched one
        let mut span = AffectedRange::covering(touched);
        if current.len() != desired.len() {
            let last = current.len().max(desired.len()) - 1;
            span = span.map(|range| range.including(last));
        }

        Self {
            kept: prefix + suffix + pairs.len(),
            placed,
            displaced,
            span,
        }
    }

    pub fn is_unchanged(&self) -> bool {
        self.span.is_none()
    }
}

/// Index pairs `(i, j)` of one longest common subsequence of `a` and `b`,
/// in increasing order.
fn lcs_pairs(a: &[ItemId], b: &[ItemId]) -> Vec<(usize, usize)> {
    // suffix[i * width + j] is the LCS length of a[i..] and b[j..]
    let width = b.len() + 1;
    let mut suffix = vec![0u32; (a.len() + 1) * width];
    for i in (0..a.len()).rev() {
        for j in (0..b.len()).rev() {
            suffix[i * width + j] = if a[i] == b[j] {
                suffix[(i + 1) * width + j + 1] + 1
            } else {
                suffix[(i + 1) * width + j].max(suffix[i * width + j + 1])
            };
        }
    }

    let mut pairs = Vec::with_capacity(suffix[0] as usize);
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] == b[j] {
            pairs.push((i, j));
            i += 1;
            j += 1;
        } else if suffix[(i + 1) * width + j] >= suffix[i * width + j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }
    pairs
}
