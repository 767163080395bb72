//! The query driver of the interpolation-indexed tree (iitii): predict a starting
//! node with the learned model, climb until the stopping predicate holds, then scan.

use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::augment::{fill_outside_max_end, outside_min_beg};
use crate::geometry::{self, left, leftmost_leaf, right, rightmost_leaf};
use crate::model::{self, Model};
use crate::node::{IitiiNode, Item};
use crate::Pos;

/// Climb-weighting factor applied to the number of levels climbed before scanning,
/// reflecting its relative cache-miss cost against a scan-visited node.
const CLIMB_WEIGHT: usize = 3;

/// An immutable interval index augmented with a learned interpolation model: the
/// same implicit tree as [`crate::Iit`], but queries predict an interior starting
/// node instead of always descending from the root.
#[derive(Debug)]
pub struct Iitii<K, V, S = Box<[IitiiNode<K, V>]>> {
    nodes: S,
    model: Model<K>,
    queries: AtomicU64,
    total_climb_cost: AtomicU64,
    _marker: PhantomData<(K, V)>,
}

impl<K, V, S> Deref for Iitii<K, V, S>
where
    S: AsRef<[IitiiNode<K, V>]>,
{
    type Target = [IitiiNode<K, V>];

    fn deref(&self) -> &Self::Target {
        self.nodes.as_ref()
    }
}

impl<K, V, S> AsRef<[IitiiNode<K, V>]> for Iitii<K, V, S>
where
    S: AsRef<[IitiiNode<K, V>]>,
{
    fn as_ref(&self) -> &[IitiiNode<K, V>] {
        self.nodes.as_ref()
    }
}

impl<K: Pos, V> Iitii<K, V> {
    /// Builds an iitii index from nodes already sorted by `(beg, end)` with
    /// `inside_max_end` already filled in. Runs the
    /// `outside_max_end` augmentation pass and trains the interpolation model.
    pub(crate) fn from_sorted_augmented(mut nodes: Vec<IitiiNode<K, V>>, domains: usize) -> Self {
        fill_outside_max_end(&mut nodes);
        let model = model::train(&nodes, domains);
        Self {
            nodes: nodes.into_boxed_slice(),
            model,
            queries: AtomicU64::new(0),
            total_climb_cost: AtomicU64::new(0),
            _marker: PhantomData,
        }
    }
}

impl<K, V, S> Iitii<K, V, S>
where
    S: AsRef<[IitiiNode<K, V>]>,
{
    /// Iterates over every stored item, in sorted `(beg, end)` order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Item<K, V>> {
        self.nodes.as_ref().iter().map(|node| &node.item)
    }

    /// Number of items in the index.
    pub fn len(&self) -> usize {
        self.nodes.as_ref().len()
    }

    /// Whether the index holds no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of `overlap`/`overlap_into` calls made so far. Diagnostic only;
    /// approximate under concurrent queries only in the sense that it is read with
    /// relaxed ordering — each individual increment is still atomic.
    pub fn queries(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    /// Accumulated number of tree levels climbed across every query so far.
    /// Diagnostic only, same caveat as [`Self::queries`].
    pub fn total_climb_cost(&self) -> u64 {
        self.total_climb_cost.load(Ordering::Relaxed)
    }
}

impl<K, V, S> Iitii<K, V, S>
where
    K: Pos,
    S: AsRef<[IitiiNode<K, V>]>,
{
    /// Appends references to every item whose interval overlaps `[qbeg, qend)` to
    /// `out`, and returns the cost metric: scan-visits plus `3 *` the number of
    /// levels climbed. Result order is not guaranteed.
    pub fn overlap_into<'a>(&'a self, qbeg: K, qend: K, out: &mut Vec<&'a Item<K, V>>) -> usize {
        self.queries.fetch_add(1, Ordering::Relaxed);

        let nodes = self.nodes.as_ref();
        let n = nodes.len();
        if n == 0 || qbeg >= qend {
            return 0;
        }

        let (root_level, _) = geometry::root_level_and_full_size(n);
        let root = geometry::root(root_level);

        let domain = self.model.domain(qbeg);
        let (mut r, mut k) = match self.model.predict(domain, qbeg) {
            None => (root, root_level),
            Some(predicted) if predicted >= n => (geometry::rightmost_real_leaf(n), 0),
            Some(predicted) => (predicted, geometry::level(predicted)),
        };
        let k_initial = k;

        while r != root
            && (r >= n
                || qbeg < nodes[r].outside_max_end
                || outside_min_beg(nodes, r, k) < qend)
        {
            r = geometry::parent(r, k);
            k += 1;
        }

        self.total_climb_cost
            .fetch_add((k - k_initial) as u64, Ordering::Relaxed);

        let mut cost = 0usize;
        scan(nodes, r, k, qbeg, qend, &mut |item| out.push(item), &mut cost);
        cost + CLIMB_WEIGHT * (k - k_initial) as usize
    }

    /// Same as [`Self::overlap_into`] but returns a freshly allocated vector along
    /// with the cost metric.
    pub fn overlap<'a>(&'a self, qbeg: K, qend: K) -> (Vec<&'a Item<K, V>>, usize) {
        let mut out = Vec::new();
        let cost = self.overlap_into(qbeg, qend, &mut out);
        (out, cost)
    }

    /// Same query as [`Self::overlap`], but the scan that follows the predict-and-climb
    /// step is split across the thread pool via [`rayon::join`] once a subtree is large
    /// enough to be worth the fork. The predict/climb step itself stays sequential: it
    /// touches O(levels climbed) nodes, far too few to be worth forking.
    #[cfg(feature = "rayon")]
    pub fn par_overlap<'a>(&'a self, qbeg: K, qend: K) -> (Vec<&'a Item<K, V>>, usize)
    where
        K: Send + Sync,
        V: Sync,
    {
        self.queries.fetch_add(1, Ordering::Relaxed);

        let nodes = self.nodes.as_ref();
        let n = nodes.len();
        if n == 0 || qbeg >= qend {
            return (Vec::new(), 0);
        }

        let (root_level, _) = geometry::root_level_and_full_size(n);
        let root = geometry::root(root_level);

        let domain = self.model.domain(qbeg);
        let (mut r, mut k) = match self.model.predict(domain, qbeg) {
            None => (root, root_level),
            Some(predicted) if predicted >= n => (geometry::rightmost_real_leaf(n), 0),
            Some(predicted) => (predicted, geometry::level(predicted)),
        };
        let k_initial = k;

        while r != root
            && (r >= n
                || qbeg < nodes[r].outside_max_end
                || outside_min_beg(nodes, r, k) < qend)
        {
            r = geometry::parent(r, k);
            k += 1;
        }

        self.total_climb_cost
            .fetch_add((k - k_initial) as u64, Ordering::Relaxed);

        let (out, cost) = par_scan(nodes, r, k, qbeg, qend);
        (out, cost + CLIMB_WEIGHT * (k - k_initial) as usize)
    }
}

/// Recursive descent from `(r, k)` against `[qbeg, qend)` — identical algorithm to
/// [`crate::iit`]'s scan, duplicated here over [`IitiiNode`] since the
/// two node types carry different augmentation fields.
fn scan<'a, K: Pos, V>(
    nodes: &'a [IitiiNode<K, V>],
    r: usize,
    k: u32,
    qbeg: K,
    qend: K,
    out: &mut impl FnMut(&'a Item<K, V>),
    cost: &mut usize,
) {
    let n = nodes.len();

    if r >= n {
        if k > 0 {
            scan(nodes, left(r, k), k - 1, qbeg, qend, out, cost);
        }
        return;
    }

    if k <= 2 {
        let lo = leftmost_leaf(r, k);
        let hi = rightmost_leaf(r, k).min(n - 1);
        for leaf in lo..=hi {
            *cost += 1;
            let item = &nodes[leaf].item;
            if item.0.start >= qend {
                break;
            }
            if item.0.end > qbeg {
                out(item);
            }
        }
        return;
    }

    *cost += 1;
    if nodes[r].inside_max_end > qbeg {
        scan(nodes, left(r, k), k - 1, qbeg, qend, out, cost);
    }
    if nodes[r].item.0.start < qend {
        if nodes[r].item.0.end > qbeg {
            out(&nodes[r].item);
        }
        scan(nodes, right(r, k), k - 1, qbeg, qend, out, cost);
    }
}

/// Below this level a subtree is scanned serially rather than forked again, as in
/// [`crate::iit`]'s equivalent constant.
#[cfg(feature = "rayon")]
const PAR_SPLIT_LEVEL: u32 = 10;

/// Parallel counterpart to [`scan`], identical in structure to [`crate::iit`]'s
/// `par_scan` but operating on [`IitiiNode`].
#[cfg(feature = "rayon")]
fn par_scan<'a, K, V>(
    nodes: &'a [IitiiNode<K, V>],
    r: usize,
    k: u32,
    qbeg: K,
    qend: K,
) -> (Vec<&'a Item<K, V>>, usize)
where
    K: Pos + Send + Sync,
    V: Sync,
{
    let n = nodes.len();

    if r >= n {
        return if k > 0 {
            par_scan(nodes, left(r, k), k - 1, qbeg, qend)
        } else {
            (Vec::new(), 0)
        };
    }

    if k <= PAR_SPLIT_LEVEL {
        let mut out = Vec::new();
        let mut cost = 0;
        scan(nodes, r, k, qbeg, qend, &mut |item| out.push(item), &mut cost);
        return (out, cost);
    }

    let go_left = nodes[r].inside_max_end > qbeg;
    let go_right = nodes[r].item.0.start < qend;
    let mid = if go_right && nodes[r].item.0.end > qbeg {
        Some(&nodes[r].item)
    } else {
        None
    };

    let (mut left_out, left_cost, mut right_out, right_cost) = match (go_left, go_right) {
        (true, true) => {
            let (l, r) = rayon::join(
                || par_scan(nodes, left(r, k), k - 1, qbeg, qend),
                || par_scan(nodes, right(r, k), k - 1, qbeg, qend),
            );
            (l.0, l.1, r.0, r.1)
        }
        (true, false) => {
            let l = par_scan(nodes, left(r, k), k - 1, qbeg, qend);
            (l.0, l.1, Vec::new(), 0)
        }
        (false, true) => {
            let rr = par_scan(nodes, right(r, k), k - 1, qbeg, qend);
            (Vec::new(), 0, rr.0, rr.1)
        }
        (false, false) => (Vec::new(), 0, Vec::new(), 0),
    };

    if let Some(item) = mid {
        left_out.push(item);
    }
    left_out.append(&mut right_out);
    (left_out, 1 + left_cost + right_cost)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::iit::Iit;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn build_iitii(items: Vec<(std::ops::Range<i64>, usize)>, domains: usize) -> Iitii<i64, usize> {
        let mut b: Builder<i64, usize> = Builder::new();
        b.add_range(items);
        b.build_iitii(domains)
    }

    fn build_iit(items: Vec<(std::ops::Range<i64>, usize)>) -> Iit<i64, usize> {
        let mut b: Builder<i64, usize> = Builder::new();
        b.add_range(items);
        b.build()
    }

    fn naive(items: &[(std::ops::Range<i64>, usize)], qbeg: i64, qend: i64) -> Vec<usize> {
        let mut v: Vec<_> = items
            .iter()
            .filter(|(r, _)| r.start < qend && r.end > qbeg)
            .map(|(_, v)| *v)
            .collect();
        v.sort_unstable();
        v
    }

    #[test]
    fn scenario_1() {
        let items = vec![(12..34, 0usize), (0..23, 1), (34..56, 2)];
        let tree = build_iitii(items, 4);
        let (mut got, _) = tree.overlap(22, 25);
        let mut got: Vec<usize> = got.drain(..).map(|(_, v)| *v).collect();
        got.sort_unstable();
        assert_eq!(got, vec![0, 1]);
    }

    #[test]
    fn empty_index_returns_empty() {
        let tree: Iitii<i64, ()> = Builder::new().build_iitii(4);
        assert!(tree.overlap(0, 100).0.is_empty());
    }

    #[test]
    fn single_item_boundaries() {
        let tree = build_iitii(vec![(7..9, 0usize)], 2);
        assert!(tree.overlap(8, 8).0.is_empty());
        assert_eq!(tree.overlap(7, 8).0.len(), 1);
        assert!(tree.overlap(9, 10).0.is_empty());
    }

    #[test]
    fn counters_advance_with_every_query() {
        let tree = build_iitii(vec![(0..10, 0usize), (5..15, 1)], 2);
        assert_eq!(tree.queries(), 0);
        tree.overlap(1, 2);
        tree.overlap(1, 2);
        assert_eq!(tree.queries(), 2);
    }

    #[test]
    fn large_random_matches_iit_and_naive() {
        let mut rng = StdRng::seed_from_u64(42);
        let items: Vec<(std::ops::Range<i64>, usize)> = (0..10_000)
            .map(|i| {
                let a = rng.gen_range(0..1_000_000i64);
                let b = a + rng.gen_range(0..1000i64);
                (a..b, i)
            })
            .collect();

        let iit = build_iit(items.clone());
        let iitii = build_iitii(items.clone(), 16);

        for _ in 0..1000 {
            let a = rng.gen_range(0..1_000_000i64);
            let b = a + rng.gen_range(0..1000i64);

            let mut want = naive(&items, a, b);

            let (mut got_iit, _) = iit.overlap(a, b);
            let mut got_iit: Vec<usize> = got_iit.drain(..).map(|(_, v)| *v).collect();
            got_iit.sort_unstable();

            let (mut got_iitii, _) = iitii.overlap(a, b);
            let mut got_iitii: Vec<usize> = got_iitii.drain(..).map(|(_, v)| *v).collect();
            got_iitii.sort_unstable();

            want.sort_unstable();
            assert_eq!(got_iit, want);
            assert_eq!(got_iitii, want);
        }
    }

    #[test]
    fn clustered_domains_exercise_sparse_fallback_and_still_answer_correctly() {
        let mut items: Vec<(std::ops::Range<i64>, usize)> = (0..10_000)
            .map(|i| (i % 100..i % 100 + 1, i as usize))
            .collect();
        for i in 0..10 {
            items.push((1_000_000_000 + i..1_000_000_000 + i + 1, 10_000 + i as usize));
        }

        let iitii = build_iitii(items.clone(), 8);

        for &(qbeg, qend) in &[(0i64, 100), (50, 60), (1_000_000_000, 1_000_000_010), (999_999_999, 1_000_000_005)]
        {
            let want = naive(&items, qbeg, qend);
            let (mut got, _) = iitii.overlap(qbeg, qend);
            let mut got: Vec<usize> = got.drain(..).map(|(_, v)| *v).collect();
            got.sort_unstable();
            assert_eq!(got, want, "qbeg={qbeg} qend={qend}");
        }
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn par_overlap_matches_overlap() {
        let items = vec![(12..34, 0usize), (0..23, 1), (34..56, 2), (40..50, 3)];
        let tree = build_iitii(items, 4);
        let (mut want, _) = tree.overlap(22, 45);
        let mut want: Vec<usize> = want.drain(..).map(|(_, v)| *v).collect();
        let (mut got, _) = tree.par_overlap(22, 45);
        let mut got: Vec<usize> = got.drain(..).map(|(_, v)| *v).collect();
        want.sort_unstable();
        got.sort_unstable();
        assert_eq!(got, want);
    }

    proptest::proptest! {
        #[test]
        fn matches_iit_for_every_query(
            items in proptest::collection::vec((0i64..2000, 0i64..2000), 0..300),
            qbeg in 0i64..2000,
            qend in 0i64..2000,
        ) {
            let items: Vec<(std::ops::Range<i64>, usize)> = items
                .into_iter()
                .filter(|&(a, b)| a <= b)
                .enumerate()
                .map(|(i, (a, b))| (a..b, i))
                .collect();

            let iit = build_iit(items.clone());
            let iitii = build_iitii(items.clone(), 4);

            let (mut got_iit, _) = iit.overlap(qbeg, qend);
            let mut got_iit: Vec<usize> = got_iit.drain(..).map(|(_, v)| *v).collect();
            got_iit.sort_unstable();

            let (mut got_iitii, _) = iitii.overlap(qbeg, qend);
            let mut got_iitii: Vec<usize> = got_iitii.drain(..).map(|(_, v)| *v).collect();
            got_iitii.sort_unstable();

            proptest::prop_assert_eq!(got_iit, got_iitii);
        }
    }
}
