//! The learned interpolation model: partition begin-positions into `C`
//! equal-width domains, and per domain regress level-rank on begin at a handful of
//! candidate tree levels, picking whichever minimizes an estimated query cost.

use crate::geometry::{level, rank_of_levelrank};
use crate::node::IitiiNode;
use crate::Pos;

/// Sparse, Fibonacci-like candidate levels tried during training.
const CANDIDATE_LEVELS: &[u32] = &[0, 1, 2, 4, 7, 12, 20, 33, 54];

/// Per-domain regression parameters. `level < 0` means "no prediction": the query
/// driver falls back to a root-start top-down scan for begins in this domain.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DomainParams {
    pub(crate) level: i32,
    pub(crate) w0: f32,
    pub(crate) w1: f32,
}

impl DomainParams {
    const NONE: Self = DomainParams {
        level: -1,
        w0: 0.0,
        w1: 0.0,
    };
}

/// The trained model: domain partition of `[min_beg, max_beg]` plus one
/// [`DomainParams`] per domain.
#[derive(Debug, Clone)]
pub(crate) struct Model<K> {
    min_beg: K,
    domain_width_f64: f64,
    domain_count: usize,
    params: Box<[DomainParams]>,
}

impl<K: Pos> Model<K> {
    /// Index of the domain containing position `p`.
    pub(crate) fn domain(&self, p: K) -> usize {
        let x = (p.to_f64_lossy() - self.min_beg.to_f64_lossy()) / self.domain_width_f64;
        let d = if x < 0.0 { 0 } else { x as usize };
        d.min(self.domain_count - 1)
    }

    /// Predicted rank for a query begin under domain `d`'s chosen level, or `None`
    /// if the domain has no prediction (sentinel level `-1`).
    pub(crate) fn predict(&self, d: usize, qbeg: K) -> Option<usize> {
        let p = self.params[d];
        if p.level < 0 {
            return None;
        }
        Some(interpolate(p.level as u32, p.w0, p.w1, qbeg))
    }
}

/// Materialized rank predicted by a domain's linear model: `round(w0 + w1*qbeg)`
/// clamped at 0, converted from a level-rank to an absolute rank via
/// [`rank_of_levelrank`].
///
/// Evaluated in single precision (`f32`), matching the precision the parameters
/// themselves are stored in: training regresses in `f64` for accuracy, but the
/// materialized `w0`/`w1` are `f32` and every query reuses the same rounded
/// parameters, so evaluating the dot product in `f64` here would just add a second,
/// inconsistent rounding step rather than recover any precision already lost when
/// `w0`/`w1` were narrowed. This bounds the magnitude of addressable ranks for very
/// large `Pos` domains; it does not affect correctness, since the climb-stopping
/// predicate — not the prediction — is what queries rely on for correct results.
fn interpolate<K: Pos>(level: u32, w0: f32, w1: f32, qbeg: K) -> usize {
    let lr = (w0 + w1 * qbeg.to_f64_lossy() as f32).round();
    let lr = if lr < 0.0 { 0 } else { lr as usize };
    rank_of_levelrank(level, lr)
}

/// Trains a [`Model`] with `domain_count` domains (clamped to at least 1) over the
/// sorted nodes of an iitii index.
pub(crate) fn train<K: Pos, V>(nodes: &[IitiiNode<K, V>], domain_count: usize) -> Model<K> {
    let domain_count = domain_count.max(1);
    let n = nodes.len();

    if n == 0 {
        return Model {
            min_beg: K::neg_npos(),
            domain_width_f64: 1.0,
            domain_count,
            params: vec![DomainParams::NONE; domain_count].into_boxed_slice(),
        };
    }

    let min_beg = nodes[0].item.0.start;
    let max_beg = nodes[n - 1].item.0.start;
    let domain_width_f64 = domain_width(min_beg, max_beg, domain_count);

    let root_level = crate::geometry::root_level_and_full_size(n).0;

    // bucket (beg_f64, rank) pairs per domain, then sub-bucket by the node's own
    // tree level for the per-level regression candidates.
    let mut domain_points: Vec<Vec<(f64, usize)>> = vec![Vec::new(); domain_count];
    for (r, node) in nodes.iter().enumerate() {
        let beg = node.item.0.start;
        let x = (beg.to_f64_lossy() - min_beg.to_f64_lossy()) / domain_width_f64;
        let d = if x < 0.0 { 0 } else { x as usize }.min(domain_count - 1);
        domain_points[d].push((beg.to_f64_lossy(), r));
    }

    let params: Vec<DomainParams> = domain_points
        .into_iter()
        .map(|points| train_domain(nodes, &points, root_level))
        .collect();

    Model {
        min_beg,
        domain_width_f64,
        domain_count,
        params: params.into_boxed_slice(),
    }
}

/// `domain_size = 1 + (max_beg - min_beg) / C` for integer `Pos`: computed here in
/// `f64` so it applies uniformly to integer and (wrapped) floating `Pos`, and the `+1`
/// is folded in only when the raw width would otherwise be zero, which is the only
/// case it exists to guard against.
fn domain_width<K: Pos>(min_beg: K, max_beg: K, domain_count: usize) -> f64 {
    let span = (max_beg.to_f64_lossy() - min_beg.to_f64_lossy()).max(0.0);
    let raw = span / domain_count as f64;
    if raw > 0.0 {
        raw
    } else {
        1.0
    }
}

fn train_domain<K: Pos, V>(
    nodes: &[IitiiNode<K, V>],
    points: &[(f64, usize)],
    root_level: u32,
) -> DomainParams {
    if points.is_empty() {
        return DomainParams::NONE;
    }

    // bucket by the node's own tree level, giving (beg, level_rank) pairs.
    let mut by_level: std::collections::BTreeMap<u32, Vec<(f64, f64)>> =
        std::collections::BTreeMap::new();
    for &(beg, r) in points {
        let lvl = level(r);
        by_level
            .entry(lvl)
            .or_default()
            .push((beg, crate::geometry::levelrank(r, lvl) as f64));
    }

    let mut best: Option<(f64, DomainParams)> = None;

    for &k in CANDIDATE_LEVELS {
        if k >= root_level {
            break;
        }
        let Some(bucket) = by_level.get(&k) else {
            // an absent bucket has 0 points, which also satisfies "<= 1 points": stop
            // the search rather than skip ahead to a sparser, higher candidate level.
            break;
        };
        if bucket.len() <= 1 {
            break;
        }

        let Some((w0, w1)) = linreg(bucket) else {
            continue;
        };
        if w1 == 0.0 {
            continue;
        }

        let avg_cost = estimate_cost(nodes, points, root_level, k, w0, w1);

        if (avg_cost as f64) < root_level as f64 {
            if best.map_or(true, |(best_cost, _)| avg_cost < best_cost) {
                best = Some((
                    avg_cost,
                    DomainParams {
                        level: k as i32,
                        w0: w0 as f32,
                        w1: w1 as f32,
                    },
                ));
            }
        }
    }

    best.map(|(_, p)| p).unwrap_or(DomainParams::NONE)
}

/// Ordinary least squares `y = w0 + w1*x`. Returns `None` for a degenerate
/// (zero-variance) bucket.
fn linreg(points: &[(f64, f64)]) -> Option<(f64, f64)> {
    let n = points.len() as f64;
    let sum_x: f64 = points.iter().map(|(x, _)| x).sum();
    let sum_y: f64 = points.iter().map(|(_, y)| y).sum();
    let mean_x = sum_x / n;
    let mean_y = sum_y / n;

    let mut num = 0.0;
    let mut den = 0.0;
    for &(x, y) in points {
        num += (x - mean_x) * (y - mean_y);
        den += (x - mean_x) * (x - mean_x);
    }
    if den == 0.0 {
        return None;
    }
    let w1 = num / den;
    let w0 = mean_y - w1 * mean_x;
    Some((w0, w1))
}

/// Estimated average per-point query cost for candidate level `k` with regression
/// `(w0, w1)`.
fn estimate_cost<K: Pos, V>(
    nodes: &[IitiiNode<K, V>],
    points: &[(f64, usize)],
    root_level: u32,
    k: u32,
    w0: f64,
    w1: f64,
) -> f64 {
    let n = nodes.len();
    let mut total = 0.0;
    for &(x, true_rank) in points {
        let lr = (w0 + w1 * x).round();
        let lr = if lr < 0.0 { 0 } else { lr as usize };
        let predicted_rank = rank_of_levelrank(k, lr);
        let clamped_rank = predicted_rank.min(n - 1);

        let error = (predicted_rank as f64 - true_rank as f64).abs() / (1u64 << k) as f64;
        let error_penalty = if error > 0.0 {
            2.0 * (1.0 + error.log2().floor())
        } else {
            0.0
        };

        let outside = nodes[clamped_rank].outside_max_end.to_f64_lossy();
        let overlap_penalty = if outside > x {
            1.0 + ((root_level - k) / 2) as f64
        } else {
            0.0
        };

        total += k as f64 + error_penalty.max(overlap_penalty);
    }
    total / points.len() as f64
}
