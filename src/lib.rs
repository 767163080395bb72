#![forbid(unsafe_code)]
#![deny(missing_docs, missing_debug_implementations)]

//! An in-memory interval index: given a static set of half-open intervals `[beg, end)`
//! each carrying an arbitrary payload, answer overlap queries — every item whose
//! interval overlaps a query interval `[qbeg, qend)` — in worst-case logarithmic work
//! per result and constant memory overhead per item.
//!
//! Two index flavours are provided, built from the same sorted node array:
//!
//! - [`Iit`], a textbook augmented interval tree embedded in a single array: a complete
//!   binary tree whose node positions are derived by arithmetic on array indices rather
//!   than stored pointers (an *implicit tree*).
//! - [`Iitii`], the same implicit tree plus a learned interpolation index: a piecewise
//!   linear model over begin-positions that predicts an interior node at which a
//!   bottom-up climb can begin, skipping the top-down descent from the root for most
//!   queries.
//!
//! Both are built once via [`Builder`] and are immutable and safe to query from any
//! number of threads afterwards; there is no insert/delete/join after `build`.

mod augment;
mod build;
mod builder;
mod geometry;
mod iit;
mod iitii;
mod model;
mod node;

pub use builder::Builder;
pub use iit::Iit;
pub use iitii::Iitii;
pub use node::{IitNode, IitiiNode, Item};

use num_traits::{Bounded, ToPrimitive};
use std::fmt;

/// The totally-ordered position type used as interval endpoints.
///
/// Implemented for all of Rust's built-in integers via a blanket impl over
/// [`num_traits::Bounded`] + [`num_traits::ToPrimitive`]. Floating-point callers must
/// supply a wrapper that restores a total order (e.g. an `OrderedFloat`/`NotNan`
/// newtype elsewhere in the ecosystem), since IEEE floats are only partially ordered
/// and the tree construction requires a real `Ord`.
pub trait Pos: Ord + Copy + Bounded + ToPrimitive + fmt::Debug + Send + Sync + 'static {
    /// `npos`: the maximum representable value, used as a "past everything" sentinel.
    fn npos() -> Self {
        Self::max_value()
    }

    /// Negative-infinity sentinel used by `outside_max_end` when no node outside a
    /// subtree has a smaller begin. The minimum representable value is smaller than
    /// every real `end`, which is all the sentinel's comparisons require.
    fn neg_npos() -> Self {
        Self::min_value()
    }

    /// Cast to `f64` for use in the interpolation model's regression. The model's
    /// correctness never depends on this being exact — only its
    /// performance does.
    fn to_f64_lossy(self) -> f64 {
        self.to_f64().expect("Pos must be representable as f64")
    }
}

impl<T> Pos for T where T: Ord + Copy + Bounded + ToPrimitive + fmt::Debug + Send + Sync + 'static
{}
