//! Shared bottom-up construction pass for the implicit tree's `inside_max_end`
//! augmentation, used by both [`crate::iit::Iit`] and
//! [`crate::iitii::Iitii`].

use crate::geometry::{self, level, right_border_path};
use crate::node::Augmented;
use crate::Pos;

/// Sorts `nodes` by `(beg, end)` — the only ordering the implicit tree requires.
pub(crate) fn sort_nodes<K, N>(nodes: &mut [N], beg_end: impl Fn(&N) -> (K, K))
where
    K: Ord,
{
    nodes.sort_by(|a, b| beg_end(a).cmp(&beg_end(b)));
}

/// Fills in `inside_max_end` for every real node of `nodes` (already sorted by
/// `(beg, end)`), implementing the bottom-up augmentation pass: skip
/// imaginary right subtrees by substituting a running `right_border_ime` carried
/// from the last border node visited on a lower level.
///
/// Leaves (`level == 0`) start out with `inside_max_end == end`, which callers must
/// have already set when constructing the node (see [`crate::node::IitNode`] /
/// [`crate::node::IitiiNode`] construction in [`crate::builder`]).
pub(crate) fn fill_inside_max_end<K, N>(nodes: &mut [N])
where
    K: Pos,
    N: Augmented<K>,
{
    let n = nodes.len();
    if n == 0 {
        return;
    }
    let (root_level, full_size) = geometry::root_level_and_full_size(n);
    if root_level == 0 {
        return; // single node, already a leaf with inside_max_end == end
    }

    let border = right_border_path(n, root_level);
    // border[k] is the border rank at level k.
    let mut right_border_ime: K = nodes[border[0]].inside_max_end();

    for k in 1..=root_level {
        let step = 1usize << (k + 1);
        let mut r = (1usize << k) - 1;
        while r < full_size {
            if r < n {
                let l = geometry::left(r, k);
                let left_ime = nodes[l].inside_max_end();

                let rc = geometry::right(r, k);
                let right_ime = if rc < n {
                    nodes[rc].inside_max_end()
                } else {
                    right_border_ime
                };

                let ime = (*nodes[r].end()).max(left_ime).max(right_ime);
                nodes[r].set_inside_max_end(ime);

                if r == border[k as usize] {
                    right_border_ime = ime;
                }
            }
            r += step;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::IitNode;

    fn node(beg: i32, end: i32) -> IitNode<i32, ()> {
        IitNode {
            item: (beg..end, ()),
            inside_max_end: end,
        }
    }

    #[test]
    fn inside_max_end_matches_brute_force() {
        let items = [(5, 10), (1, 2), (8, 20), (3, 4), (0, 1), (15, 16)];
        let mut nodes: Vec<_> = items.iter().map(|&(b, e)| node(b, e)).collect();
        sort_nodes(&mut nodes, |n| (n.item.0.start, n.item.0.end));
        fill_inside_max_end(&mut nodes);

        // brute force: for each node, recompute max end over its real subtree by
        // checking every other node's rank relationship via level/leaf-span math.
        let n = nodes.len();
        let (root_level, _) = geometry::root_level_and_full_size(n);
        for r in 0..n {
            let lvl = level(r);
            let lo = geometry::leftmost_leaf(r, lvl);
            let hi = geometry::rightmost_leaf(r, lvl).min(n - 1);
            // subtree of (r, lvl) covers leaves [lo, hi] in the complete tree, but
            // only the *real* descendants among them are part of r's real subtree
            // in the border-adjusted sense; since lo..=hi are contiguous array
            // ranks that are all real whenever hi < n, this is exactly nodes[lo..=hi].
            let expect = nodes[lo..=hi].iter().map(|x| x.item.0.end).max().unwrap();
            assert_eq!(nodes[r].inside_max_end, expect, "rank {r} level {lvl} root_level {root_level}");
        }
    }
}
