//! Asterism-based star field registration.
//!
//! Given two sets of 2D control points with unknown correspondence — for
//! example star centroids from two exposures with different pointing,
//! rotation and pixel scale — this crate recovers the similarity transform
//! (uniform scale, rotation, translation) mapping one onto the other,
//! together with the verified point correspondences supporting it.
//!
//! ## Pipeline
//! 1. [`generate_invariants`]: per point, enumerate triangles among its
//!    nearest neighbors and hash each into a scale/rotation-invariant
//!    side-ratio descriptor.
//! 2. [`match_invariants`]: join the two descriptor sets with a radius
//!    query in descriptor space, yielding candidate triangle
//!    correspondences.
//! 3. [`robust_fit`]: RANSAC over the candidates, one triangle per minimal
//!    sample, until a consensus transform emerges.
//! 4. [`resolve_correspondences`]: collapse the inlier triangles into
//!    unique per-point correspondences.
//!
//! ## Quickstart
//!
//! ```
//! use nalgebra::Point2;
//! use star_align::{find_transform, AlignInput, AlignParams};
//!
//! let source: Vec<Point2<f64>> = vec![
//!     Point2::new(0.0, 0.0),
//!     Point2::new(10.0, 1.0),
//!     Point2::new(3.0, 8.0),
//!     Point2::new(-5.0, 4.0),
//!     Point2::new(7.0, -6.0),
//!     Point2::new(2.0, 3.0),
//! ];
//! // The same field, translated; order scrambled.
//! let target: Vec<Point2<f64>> = vec![
//!     Point2::new(4.0, 5.0),
//!     Point2::new(9.0, -4.0),
//!     Point2::new(-3.0, 6.0),
//!     Point2::new(2.0, 2.0),
//!     Point2::new(12.0, 3.0),
//!     Point2::new(5.0, 10.0),
//! ];
//!
//! let params = AlignParams {
//!     seed: Some(1),
//!     ..AlignParams::default()
//! };
//! let alignment = find_transform(
//!     AlignInput::Points(&source),
//!     AlignInput::Points(&target),
//!     &params,
//! )?;
//! assert!((alignment.transform.scale - 1.0).abs() < 1e-8);
//! # Ok::<(), star_align::AlignError>(())
//! ```

mod invariants;
mod matching;
mod ransac;
mod resolve;

#[cfg(feature = "image")]
mod extract;

use nalgebra::Point2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

pub use star_align_core::{fit_similarity, init_with_level, FitError, SimilarityTransform};

pub use invariants::{
    arrange_triplet, generate_invariants, Descriptor, InvariantSet, Triangle,
    DEFAULT_NEIGHBOR_COUNT,
};
pub use matching::{match_invariants, Candidate, DEFAULT_MATCH_RADIUS};
pub use ransac::{min_matches_for, robust_fit, TransformModel};
pub use resolve::{resolve_correspondences, Correspondences};

#[cfg(feature = "image")]
pub use extract::{find_sources, DetectedSource, SourceDetectionParams};

/// Errors produced by the alignment pipeline.
#[derive(thiserror::Error, Debug)]
pub enum AlignError {
    #[error("input contains a non-finite coordinate at index {index}")]
    InvalidInput { index: usize },

    #[error("need at least 3 usable control points, got {got}")]
    InsufficientPoints { got: usize },

    #[error("consensus search exhausted all {hypotheses} candidate hypotheses")]
    MatchExhausted { hypotheses: usize },

    #[error(transparent)]
    Fit(#[from] FitError),
}

/// Alignment input, resolved once at the boundary: either ready-made control
/// point coordinates or a grayscale image routed through the source
/// extractor.
#[derive(Debug)]
pub enum AlignInput<'a> {
    /// Control point coordinates, index order preserved.
    Points(&'a [Point2<f64>]),
    /// Grayscale image; sources are extracted brightest-first.
    #[cfg(feature = "image")]
    Image(&'a image::GrayImage),
}

/// Tuning knobs for [`find_transform`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlignParams {
    /// Neighborhood size for triangle enumeration.
    pub neighbor_count: usize,
    /// Radius for descriptor-space matching.
    pub match_radius: f64,
    /// RANSAC inlier threshold in target-plane pixels.
    pub pixel_tolerance: f64,
    /// Keep at most this many control points per set, most significant
    /// first.
    pub max_control_points: usize,
    /// Source extraction: detection threshold in sigmas above background.
    pub detection_sigma: f64,
    /// Source extraction: minimum blob area in pixels.
    pub min_area: usize,
    /// RNG seed for the hypothesis shuffle. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for AlignParams {
    fn default() -> Self {
        Self {
            neighbor_count: DEFAULT_NEIGHBOR_COUNT,
            match_radius: DEFAULT_MATCH_RADIUS,
            pixel_tolerance: 2.0,
            max_control_points: 50,
            detection_sigma: 5.0,
            min_area: 5,
            seed: None,
        }
    }
}

/// A recovered alignment: the similarity transform plus the verified
/// control point correspondences that support it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Alignment {
    /// The fitted source-to-target similarity transform.
    pub transform: SimilarityTransform,
    /// Unique `(source, target)` control point index pairs, ascending in
    /// source index.
    pub pairs: Vec<(usize, usize)>,
    /// Matched source control point coordinates, parallel to `pairs`.
    pub source_points: Vec<Point2<f64>>,
    /// Matched target control point coordinates, parallel to `pairs`.
    pub target_points: Vec<Point2<f64>>,
}

/// Recover the similarity transform between two star fields.
///
/// Seeds the hypothesis shuffle from `params.seed`, or from the OS when no
/// seed is given. See [`find_transform_with_rng`] for the RNG-injected
/// variant.
pub fn find_transform(
    source: AlignInput<'_>,
    target: AlignInput<'_>,
    params: &AlignParams,
) -> Result<Alignment, AlignError> {
    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    find_transform_with_rng(source, target, params, &mut rng)
}

/// [`find_transform`] with an injected random source, for reproducible runs
/// and callers that manage their own RNG.
pub fn find_transform_with_rng<R: Rng + ?Sized>(
    source: AlignInput<'_>,
    target: AlignInput<'_>,
    params: &AlignParams,
    rng: &mut R,
) -> Result<Alignment, AlignError> {
    let source_points = resolve_input(source, params)?;
    let target_points = resolve_input(target, params)?;

    let source_set = generate_invariants(&source_points, params.neighbor_count);
    let target_set = generate_invariants(&target_points, params.neighbor_count);

    let candidates = match_invariants(&source_set, &target_set, params.match_radius);
    let min_matches = min_matches_for(candidates.len());
    log::debug!(
        "{} candidates, consensus requires {}",
        candidates.len(),
        min_matches
    );

    let model = TransformModel::new(&source_points, &target_points);
    let (transform, inlier_indices) = robust_fit(
        &candidates,
        &model,
        params.pixel_tolerance,
        min_matches,
        rng,
    )?;

    let inliers: Vec<Candidate> = inlier_indices.iter().map(|&i| candidates[i]).collect();
    let resolved = resolve_correspondences(&inliers, &source_points, &target_points, &transform);

    log::info!(
        "alignment: scale {:.6}, rotation {:.6} rad, translation ({:.3}, {:.3}), {} correspondences",
        transform.scale,
        transform.rotation,
        transform.translation.x,
        transform.translation.y,
        resolved.pairs.len()
    );

    Ok(Alignment {
        transform,
        pairs: resolved.pairs,
        source_points: resolved.source_points,
        target_points: resolved.target_points,
    })
}

fn resolve_input(
    input: AlignInput<'_>,
    params: &AlignParams,
) -> Result<Vec<Point2<f64>>, AlignError> {
    let mut points = match input {
        AlignInput::Points(points) => {
            for (index, p) in points.iter().enumerate() {
                if !p.x.is_finite() || !p.y.is_finite() {
                    return Err(AlignError::InvalidInput { index });
                }
            }
            points.to_vec()
        }
        #[cfg(feature = "image")]
        AlignInput::Image(image) => {
            let detection = SourceDetectionParams {
                detection_sigma: params.detection_sigma,
                min_area: params.min_area,
                max_sources: params.max_control_points,
            };
            find_sources(image, &detection)
                .into_iter()
                .map(|s| s.centroid)
                .collect()
        }
    };

    if params.max_control_points > 0 {
        points.truncate(params.max_control_points);
    }
    if points.len() < 3 {
        return Err(AlignError::InsufficientPoints { got: points.len() });
    }
    Ok(points)
}
