//! Triangle invariant generation.
//!
//! Every control point anchors a neighborhood of its `neighbor_count`
//! nearest points (itself included, at distance zero). Each 3-combination of
//! that neighborhood is a candidate triangle; after canonical vertex
//! ordering, its side-length ratios form a descriptor that is invariant to
//! translation, rotation and uniform scale, so the same asterism produces
//! the same descriptor in both images regardless of pointing.

use std::collections::HashMap;

use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Point2;

/// Default neighborhood size for triangle enumeration.
pub const DEFAULT_NEIGHBOR_COUNT: usize = 5;

/// A canonically ordered triangle: indices into a control point set.
///
/// With the side lengths sorted ascending as `L1 <= L2 <= L3`, vertex 0 is
/// shared by sides L1 and L2, vertex 1 by L2 and L3, and vertex 2 by L3 and
/// L1. Any permutation of the same three indices canonicalizes to the same
/// triple.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Triangle {
    pub vertices: [usize; 3],
}

/// Shape signature of a canonical triangle: `(L3/L2, L2/L1)`.
///
/// Both components are `>= 1` by construction; ties produce exactly 1.
pub type Descriptor = [f64; 2];

/// Parallel descriptor/triangle sequences derived from one control point
/// set, deduplicated on exact descriptor equality.
#[derive(Clone, Debug, Default)]
pub struct InvariantSet {
    pub descriptors: Vec<Descriptor>,
    pub triangles: Vec<Triangle>,
}

impl InvariantSet {
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// One triangle side: squared length plus its endpoint indices, smaller
/// endpoint first.
#[derive(Clone, Copy, Debug)]
struct Side {
    len_sq: f64,
    lo: usize,
    hi: usize,
}

impl Side {
    fn new(points: &[Point2<f64>], u: usize, v: usize) -> Self {
        Self {
            len_sq: (points[u] - points[v]).norm_squared(),
            lo: u.min(v),
            hi: u.max(v),
        }
    }

    fn shares(&self, other: &Side) -> usize {
        if self.lo == other.lo || self.lo == other.hi {
            self.lo
        } else {
            self.hi
        }
    }
}

/// Canonicalize a triangle and compute its descriptor.
///
/// Sides are sorted by squared length; exact length ties are broken by the
/// side's endpoint indices (smaller endpoint wins, then the larger), which
/// keeps the ordering a pure function of the index *set* and therefore
/// permutation-invariant even for isosceles and equilateral triangles.
pub fn arrange_triplet(points: &[Point2<f64>], indices: [usize; 3]) -> (Triangle, Descriptor) {
    let [i, j, k] = indices;
    let mut sides = [
        Side::new(points, i, j),
        Side::new(points, j, k),
        Side::new(points, k, i),
    ];
    sides.sort_by(|s, t| {
        s.len_sq
            .partial_cmp(&t.len_sq)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| s.lo.cmp(&t.lo))
            .then_with(|| s.hi.cmp(&t.hi))
    });

    let triangle = Triangle {
        vertices: [
            sides[0].shares(&sides[1]),
            sides[1].shares(&sides[2]),
            sides[2].shares(&sides[0]),
        ],
    };
    // Square roots only when forming the ratios; the raw squared lengths
    // stay exact for the sort.
    let descriptor = [
        (sides[2].len_sq / sides[1].len_sq).sqrt(),
        (sides[1].len_sq / sides[0].len_sq).sqrt(),
    ];
    (triangle, descriptor)
}

fn descriptor_key(d: Descriptor) -> [u64; 2] {
    [d[0].to_bits(), d[1].to_bits()]
}

/// Generate the deduplicated invariant set for a control point set.
///
/// Fewer than 3 points cannot form a triangle; the result is empty and the
/// "too few points" decision is left to the caller. Triangles with a
/// zero-length side produce a non-finite descriptor and are dropped before
/// they can poison the descriptor index.
pub fn generate_invariants(points: &[Point2<f64>], neighbor_count: usize) -> InvariantSet {
    let mut set = InvariantSet::default();
    if points.len() < 3 {
        return set;
    }

    let coords: Vec<[f64; 2]> = points.iter().map(|p| [p.x, p.y]).collect();
    let tree: KdTree<f64, 2> = (&coords).into();
    let k = points.len().min(neighbor_count);

    // Keyed on the exact descriptor bits; a rediscovered descriptor replaces
    // the earlier triangle in place (keep-last).
    let mut seen: HashMap<[u64; 2], usize> = HashMap::new();

    for coord in &coords {
        let neighbors: Vec<usize> = tree
            .nearest_n::<SquaredEuclidean>(coord, k)
            .into_iter()
            .map(|nn| nn.item as usize)
            .collect();

        for a in 0..neighbors.len() {
            for b in (a + 1)..neighbors.len() {
                for c in (b + 1)..neighbors.len() {
                    let (triangle, descriptor) =
                        arrange_triplet(points, [neighbors[a], neighbors[b], neighbors[c]]);
                    if !descriptor[0].is_finite() || !descriptor[1].is_finite() {
                        continue;
                    }
                    match seen.entry(descriptor_key(descriptor)) {
                        std::collections::hash_map::Entry::Occupied(slot) => {
                            set.triangles[*slot.get()] = triangle;
                        }
                        std::collections::hash_map::Entry::Vacant(slot) => {
                            slot.insert(set.descriptors.len());
                            set.descriptors.push(descriptor);
                            set.triangles.push(triangle);
                        }
                    }
                }
            }
        }
    }

    log::debug!(
        "generated {} invariants from {} control points",
        set.len(),
        points.len()
    );
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERMUTATIONS: [[usize; 3]; 6] = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];

    fn permute(idx: [usize; 3], perm: [usize; 3]) -> [usize; 3] {
        [idx[perm[0]], idx[perm[1]], idx[perm[2]]]
    }

    #[test]
    fn canonicalization_is_permutation_invariant() {
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(1.0, 3.0),
        ];
        let (reference, ref_desc) = arrange_triplet(&points, [0, 1, 2]);
        for perm in PERMUTATIONS {
            let (tri, desc) = arrange_triplet(&points, permute([0, 1, 2], perm));
            assert_eq!(tri, reference);
            assert_eq!(desc, ref_desc);
        }
    }

    #[test]
    fn equilateral_tie_break_is_deterministic() {
        let h = 3.0f64.sqrt() / 2.0;
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.5, h),
        ];
        let (reference, desc) = arrange_triplet(&points, [0, 1, 2]);
        for perm in PERMUTATIONS {
            let (tri, _) = arrange_triplet(&points, permute([0, 1, 2], perm));
            assert_eq!(tri, reference);
        }
        // All sides tie, so both ratios collapse to 1.
        assert!((desc[0] - 1.0).abs() < 1e-12);
        assert!((desc[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn descriptor_components_are_at_least_one() {
        let points = spread_points();
        let set = generate_invariants(&points, DEFAULT_NEIGHBOR_COUNT);
        assert!(!set.is_empty());
        for d in &set.descriptors {
            assert!(d[0] >= 1.0, "L3/L2 = {} < 1", d[0]);
            assert!(d[1] >= 1.0, "L2/L1 = {} < 1", d[1]);
        }
    }

    #[test]
    fn dedup_never_exceeds_candidate_count() {
        let points = spread_points();
        let n = points.len();
        let k = n.min(DEFAULT_NEIGHBOR_COUNT);
        let per_anchor = k * (k - 1) * (k - 2) / 6;
        let set = generate_invariants(&points, DEFAULT_NEIGHBOR_COUNT);
        assert!(set.len() <= n * per_anchor);
        assert_eq!(set.descriptors.len(), set.triangles.len());

        // Every surviving descriptor is numerically distinct.
        let mut keys: Vec<[u64; 2]> = set.descriptors.iter().map(|&d| descriptor_key(d)).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), set.len());
    }

    #[test]
    fn fewer_than_three_points_yield_empty_set() {
        assert!(generate_invariants(&[], DEFAULT_NEIGHBOR_COUNT).is_empty());
        let two = vec![Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)];
        assert!(generate_invariants(&two, DEFAULT_NEIGHBOR_COUNT).is_empty());
    }

    #[test]
    fn coincident_points_do_not_emit_nan_descriptors() {
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(0.0, 0.0),
            Point2::new(5.0, 1.0),
            Point2::new(2.0, 4.0),
        ];
        let set = generate_invariants(&points, DEFAULT_NEIGHBOR_COUNT);
        for d in &set.descriptors {
            assert!(d[0].is_finite() && d[1].is_finite());
        }
    }

    fn spread_points() -> Vec<Point2<f64>> {
        vec![
            Point2::new(12.0, 8.0),
            Point2::new(100.0, 40.0),
            Point2::new(55.0, 90.0),
            Point2::new(20.0, 70.0),
            Point2::new(80.0, 15.0),
            Point2::new(45.0, 33.0),
            Point2::new(66.0, 61.0),
            Point2::new(30.0, 50.0),
        ]
    }
}
