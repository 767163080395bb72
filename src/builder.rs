//! Build-side contract: collect items, then hand them to either
//! index constructor.

use std::cmp::Ordering;
use std::ops::Range;

use crate::iit::Iit;
use crate::iitii::Iitii;
use crate::node::{IitNode, IitiiNode, Item};
use crate::Pos;

type Compare<K, V> = Box<dyn Fn(&Item<K, V>, &Item<K, V>) -> Ordering>;

/// Collects items one at a time (or from an iterator) before handing them to
/// [`Builder::build`] or [`Builder::build_iitii`].
pub struct Builder<K, V> {
    items: Vec<Item<K, V>>,
    compare: Option<Compare<K, V>>,
}

impl<K, V> std::fmt::Debug for Builder<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("items", &self.items.len())
            .finish()
    }
}

impl<K, V> Default for Builder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Builder<K, V> {
    /// A builder with the default stable-effect `(beg, end)` sort.
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            compare: None,
        }
    }

    /// A builder that sorts items with a caller-supplied comparator instead of the
    /// default `(beg, end)` ordering. The implicit
    /// tree only requires that the result be sorted by `beg`; a custom comparator
    /// that breaks ties differently than `end` is accepted, though the textbook
    /// augmentation invariant assumes `beg`-ascending order.
    pub fn with_comparator(compare: impl Fn(&Item<K, V>, &Item<K, V>) -> Ordering + 'static) -> Self {
        Self {
            items: Vec::new(),
            compare: Some(Box::new(compare)),
        }
    }

    /// Adds one item.
    pub fn add(&mut self, interval: Range<K>, value: V) -> &mut Self {
        self.items.push((interval, value));
        self
    }

    /// Adds every item yielded by `iter`.
    pub fn add_range(&mut self, iter: impl IntoIterator<Item = Item<K, V>>) -> &mut Self {
        self.items.extend(iter);
        self
    }

    /// Number of items collected so far.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no items have been collected yet.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<K: Pos, V> Builder<K, V> {
    fn sort_items(&mut self) {
        match &self.compare {
            Some(compare) => self.items.sort_by(|a, b| compare(a, b)),
            None => self
                .items
                .sort_by(|a, b| (a.0.start, a.0.end).cmp(&(b.0.start, b.0.end))),
        }
    }

    /// Builds the plain implicit interval tree (IIT): sorts the collected items and
    /// runs the bottom-up `inside_max_end` augmentation pass.
    pub fn build(mut self) -> Iit<K, V> {
        self.sort_items();
        let mut nodes: Vec<IitNode<K, V>> = self
            .items
            .into_iter()
            .map(|(interval, value)| {
                let end = interval.end;
                IitNode {
                    item: (interval, value),
                    inside_max_end: end,
                }
            })
            .collect();
        crate::build::fill_inside_max_end(&mut nodes);
        Iit::new_unchecked(nodes.into_boxed_slice())
    }

    /// Builds the interpolation-indexed tree (iitii): same augmented tree as
    /// [`Builder::build`], plus the `outside_max_end` pass and a trained
    /// interpolation model partitioned into `domains` equal-width domains.
    /// `domains` is clamped to at least 1.
    pub fn build_iitii(mut self, domains: usize) -> Iitii<K, V> {
        self.sort_items();
        let mut nodes: Vec<IitiiNode<K, V>> = self
            .items
            .into_iter()
            .map(|(interval, value)| {
                let end = interval.end;
                IitiiNode {
                    item: (interval, value),
                    inside_max_end: end,
                    outside_max_end: K::neg_npos(),
                }
            })
            .collect();
        crate::build::fill_inside_max_end(&mut nodes);
        Iitii::from_sorted_augmented(nodes, domains)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_builder_builds_empty_index() {
        let tree: Iit<i32, ()> = Builder::new().build();
        assert!(tree.is_empty());
    }

    #[test]
    fn add_and_add_range_accumulate() {
        let mut b: Builder<i32, &'static str> = Builder::new();
        b.add(0..1, "a");
        b.add_range([(1..2, "b"), (2..3, "c")]);
        assert_eq!(b.len(), 3);
        let tree = b.build();
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn build_iitii_clamps_domains_to_at_least_one() {
        let mut b: Builder<i32, ()> = Builder::new();
        b.add(0..10, ());
        let tree = b.build_iitii(0);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn custom_comparator_is_honored() {
        // sort descending by beg; the tree itself still only promises correct
        // overlap results, not a particular traversal order.
        let mut b: Builder<i32, &'static str> =
            Builder::with_comparator(|a, b| b.0.start.cmp(&a.0.start));
        b.add(0..1, "a");
        b.add(5..6, "b");
        let tree = b.build();
        assert_eq!(tree.iter().next().unwrap().0.start, 5);
    }
}
