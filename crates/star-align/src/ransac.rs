//! Robust consensus search over candidate triangle correspondences.
//!
//! The minimal sample is a single candidate: one triangle correspondence
//! already carries three point pairs, enough to pin down a similarity
//! transform. Hypotheses are visited in a shuffled order driven by the
//! injected RNG so runs are reproducible under a fixed seed.

use nalgebra::Point2;
use rand::seq::SliceRandom;
use rand::Rng;
use star_align_core::{fit_similarity, FitError, SimilarityTransform};

use crate::matching::Candidate;
use crate::AlignError;

/// Number of fixed consensus-tightening passes after the accepted
/// hypothesis. Not tunable by data size.
const REFINEMENT_PASSES: usize = 3;

/// Consensus size required for a candidate count: roughly 80% of the
/// candidates, floored at 1 and capped at 10 so huge candidate lists still
/// terminate early.
pub fn min_matches_for(candidate_count: usize) -> usize {
    ((candidate_count as f64 * 0.8).floor() as usize).clamp(1, 10)
}

/// Bridges candidate correspondences to the least-squares similarity
/// estimator over the actual control point coordinates.
pub struct TransformModel<'a> {
    source: &'a [Point2<f64>],
    target: &'a [Point2<f64>],
}

impl<'a> TransformModel<'a> {
    pub fn new(source: &'a [Point2<f64>], target: &'a [Point2<f64>]) -> Self {
        Self { source, target }
    }

    /// Fit a similarity on the union of all point pairs carried by the
    /// candidates. Duplicate pairs add weight, which is fine.
    pub fn fit(&self, candidates: &[Candidate]) -> Result<SimilarityTransform, FitError> {
        let mut src = Vec::with_capacity(candidates.len() * 3);
        let mut dst = Vec::with_capacity(candidates.len() * 3);
        for candidate in candidates {
            for (s, t) in candidate.vertex_pairs() {
                src.push(self.source[s]);
                dst.push(self.target[t]);
            }
        }
        fit_similarity(&src, &dst)
    }

    /// Worst-vertex residual of one candidate under a transform: a triangle
    /// correspondence is only as good as its worst-agreeing vertex.
    pub fn error(&self, candidate: &Candidate, transform: &SimilarityTransform) -> f64 {
        candidate
            .vertex_pairs()
            .into_iter()
            .map(|(s, t)| transform.residual(self.source[s], self.target[t]))
            .fold(0.0, f64::max)
    }
}

/// RANSAC-style robust fit.
///
/// Each shuffled candidate in turn is the minimal sample; all other
/// candidates with worst-vertex error strictly below `pixel_tolerance`
/// support it. Once sample plus supporters reach `min_matches`, the
/// transform is refit on their union and tightened with three fixed
/// full passes over the candidate list. Exhausting
/// the shuffled order without consensus is a hard failure, never a
/// best-effort transform.
pub fn robust_fit<R: Rng + ?Sized>(
    candidates: &[Candidate],
    model: &TransformModel<'_>,
    pixel_tolerance: f64,
    min_matches: usize,
    rng: &mut R,
) -> Result<(SimilarityTransform, Vec<usize>), AlignError> {
    if candidates.is_empty() {
        return Err(AlignError::MatchExhausted { hypotheses: 0 });
    }

    // With exactly one candidate (the 3-point minimum on either side) there
    // is nothing to rank: fit directly and declare it inlying.
    if candidates.len() == 1 {
        let transform = model.fit(candidates)?;
        return Ok((transform, vec![0]));
    }

    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.shuffle(rng);

    let mut accepted: Option<(SimilarityTransform, Vec<usize>)> = None;
    for &sample in &order {
        // A degenerate sample (e.g. collinear-ish vertices collapsing the
        // fit) is skipped, not fatal.
        let Ok(hypothesis) = model.fit(std::slice::from_ref(&candidates[sample])) else {
            continue;
        };

        let mut support = vec![sample];
        for index in 0..candidates.len() {
            if index != sample && model.error(&candidates[index], &hypothesis) < pixel_tolerance {
                support.push(index);
            }
        }

        if support.len() >= min_matches {
            let pool: Vec<Candidate> = support.iter().map(|&i| candidates[i]).collect();
            let transform = model.fit(&pool)?;
            log::debug!(
                "accepted hypothesis with {} / {} supporting candidates",
                support.len(),
                candidates.len()
            );
            accepted = Some((transform, support));
            break;
        }
    }

    let (mut transform, mut inliers) = accepted.ok_or(AlignError::MatchExhausted {
        hypotheses: candidates.len(),
    })?;

    for _ in 0..REFINEMENT_PASSES {
        let tightened: Vec<usize> = (0..candidates.len())
            .filter(|&i| model.error(&candidates[i], &transform) < pixel_tolerance)
            .collect();
        if tightened.is_empty() {
            break;
        }
        let pool: Vec<Candidate> = tightened.iter().map(|&i| candidates[i]).collect();
        transform = model.fit(&pool)?;
        inliers = tightened;
    }

    Ok((transform, inliers))
}
