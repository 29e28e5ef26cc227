//! Final correspondence resolution.
//!
//! Inlier triangles overlap heavily, so the same source point is typically
//! claimed many times, occasionally by triangles that disagree on its
//! target. The resolver flattens everything to point pairs and keeps, per
//! source index, the pair with the lowest single-point residual under the
//! final transform.

use std::collections::BTreeMap;

use nalgebra::Point2;
use star_align_core::SimilarityTransform;

use crate::matching::Candidate;

/// Resolved point correspondences plus their coordinates.
#[derive(Clone, Debug, Default)]
pub struct Correspondences {
    /// Unique `(source, target)` index pairs, ascending in source index.
    pub pairs: Vec<(usize, usize)>,
    /// Source coordinates, parallel to `pairs`.
    pub source_points: Vec<Point2<f64>>,
    /// Target coordinates, parallel to `pairs`.
    pub target_points: Vec<Point2<f64>>,
}

/// Flatten inlier candidates into unique point correspondences.
///
/// Exact duplicate pairs collapse; conflicting claims for a source index are
/// settled by residual, earlier claim winning exact ties. The output walks
/// source indices in ascending order.
pub fn resolve_correspondences(
    inliers: &[Candidate],
    source: &[Point2<f64>],
    target: &[Point2<f64>],
    transform: &SimilarityTransform,
) -> Correspondences {
    let mut best: BTreeMap<usize, (usize, f64)> = BTreeMap::new();

    for candidate in inliers {
        for (s, t) in candidate.vertex_pairs() {
            let residual = transform.residual(source[s], target[t]);
            let replace = match best.get(&s) {
                // Exact duplicates and worse claims are dropped; the earlier
                // claim wins exact residual ties.
                Some(&(held, held_residual)) => held != t && residual < held_residual,
                None => true,
            };
            if replace {
                best.insert(s, (t, residual));
            }
        }
    }

    let mut out = Correspondences::default();
    for (s, (t, _)) in best {
        out.pairs.push((s, t));
        out.source_points.push(source[s]);
        out.target_points.push(target[t]);
    }
    out
}
