//! The iitii augment pass: `outside_max_end`, computed once after the
//! base IIT's `inside_max_end` pass has run, plus the O(1) `outside_min_beg` used by
//! the query driver's climb-stopping predicate.

use crate::geometry::{leftmost_leaf, level, rightmost_leaf};
use crate::node::IitiiNode;
use crate::Pos;

/// Fills in `outside_max_end` for every node, given nodes already sorted by
/// `(beg, end)`.
pub(crate) fn fill_outside_max_end<K, V>(nodes: &mut [IitiiNode<K, V>])
where
    K: Pos,
{
    let n = nodes.len();
    if n == 0 {
        return;
    }

    let mut running_max_end = Vec::with_capacity(n);
    let mut running = K::neg_npos();
    for node in nodes.iter() {
        running = running.max(node.item.0.end);
        running_max_end.push(running);
    }

    for r in 0..n {
        let lvl = level(r);
        let l = leftmost_leaf(r, lvl);
        let beg_r = nodes[r].item.0.start;

        let mut strictly_smaller_predecessor = None;
        if l > 0 {
            let mut leq = l - 1;
            loop {
                if nodes[leq].item.0.start != beg_r {
                    strictly_smaller_predecessor = Some(leq);
                    break;
                }
                if leq == 0 {
                    break;
                }
                leq -= 1;
            }
        }

        nodes[r].outside_max_end = match strictly_smaller_predecessor {
            Some(leq) => running_max_end[leq],
            None => K::neg_npos(),
        };
    }
}

/// `outside_min_beg(r, k)`: the minimum begin-position over nodes outside the
/// subtree rooted at `(r, k)` whose begin is `>= beg(r)`, computed in O(1) from
/// sorted-array geometry. Never materialized as a stored field.
pub(crate) fn outside_min_beg<K, V>(nodes: &[IitiiNode<K, V>], r: usize, k: u32) -> K
where
    K: Pos,
{
    let n = nodes.len();
    let beg_r = nodes[r].item.0.start;

    let ll = leftmost_leaf(r, k);
    if ll > 0 && nodes[ll - 1].item.0.start == beg_r {
        return beg_r;
    }

    let rl = rightmost_leaf(r, k);
    if rl + 1 >= n {
        return K::npos();
    }
    nodes[rl + 1].item.0.start
}
