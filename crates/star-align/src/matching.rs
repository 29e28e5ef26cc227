//! Descriptor cross-matching between two invariant sets.

use kiddo::{KdTree, SquaredEuclidean};

use crate::invariants::InvariantSet;

/// Default matching radius in descriptor space.
///
/// An empirical constant: wide enough that the candidate count scales with
/// input size, tight enough that most pairings are geometrically plausible.
pub const DEFAULT_MATCH_RADIUS: f64 = 0.1;

/// A candidate triangle correspondence: three vertex-position-aligned index
/// pairs asserting that a source triangle and a target triangle are the same
/// asterism.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Candidate {
    /// Canonical vertex indices into the source control points.
    pub source: [usize; 3],
    /// Canonical vertex indices into the target control points.
    pub target: [usize; 3],
}

impl Candidate {
    /// The three `(source, target)` point-index pairs, position for position.
    pub fn vertex_pairs(&self) -> [(usize, usize); 3] {
        [
            (self.source[0], self.target[0]),
            (self.source[1], self.target[1]),
            (self.source[2], self.target[2]),
        ]
    }
}

/// Match source descriptors against target descriptors within `radius`.
///
/// Every target descriptor within the radius of a source descriptor emits
/// one candidate, pairing the canonical vertices position for position.
/// Duplicate candidates are legal here; conflicts are resolved after RANSAC.
pub fn match_invariants(source: &InvariantSet, target: &InvariantSet, radius: f64) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    if source.is_empty() || target.is_empty() {
        return candidates;
    }

    let tree: KdTree<f64, 2> = (&target.descriptors).into();
    let radius_sq = radius * radius;

    for (si, descriptor) in source.descriptors.iter().enumerate() {
        for nn in tree.within_unsorted::<SquaredEuclidean>(descriptor, radius_sq) {
            let ti = nn.item as usize;
            candidates.push(Candidate {
                source: source.triangles[si].vertices,
                target: target.triangles[ti].vertices,
            });
        }
    }

    log::debug!(
        "matched {} candidate correspondences ({} x {} invariants, radius {})",
        candidates.len(),
        source.len(),
        target.len(),
        radius
    );
    candidates
}
