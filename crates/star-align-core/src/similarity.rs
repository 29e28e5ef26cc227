use nalgebra::{Matrix3, Point2, Vector2};
use serde::{Deserialize, Serialize};

/// Errors produced by the least-squares similarity estimator.
#[derive(thiserror::Error, Debug)]
pub enum FitError {
    #[error("source and target point lists differ in length ({src} vs {dst})")]
    LengthMismatch { src: usize, dst: usize },

    #[error("need at least 2 point pairs to fit a similarity, got {got}")]
    TooFewPairs { got: usize },

    #[error("source points are coincident; similarity is underdetermined")]
    DegenerateSource,
}

/// A 4-parameter similarity transform: uniform scale, rotation and
/// translation (no shear). Maps source-plane points into the target plane as
/// `q = s·R(θ)·p + t`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimilarityTransform {
    /// Uniform scale factor, positive for any fitted transform.
    pub scale: f64,
    /// Rotation angle in radians, counter-clockwise.
    pub rotation: f64,
    /// Translation applied after scale and rotation.
    pub translation: Vector2<f64>,
}

impl SimilarityTransform {
    pub fn new(scale: f64, rotation: f64, translation: Vector2<f64>) -> Self {
        Self {
            scale,
            rotation,
            translation,
        }
    }

    /// The identity transform.
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, Vector2::zeros())
    }

    /// Apply the transform to a point.
    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        let (sin, cos) = self.rotation.sin_cos();
        let a = self.scale * cos;
        let b = self.scale * sin;
        Point2::new(
            a * p.x - b * p.y + self.translation.x,
            b * p.x + a * p.y + self.translation.y,
        )
    }

    /// Euclidean distance between the transformed source point and the
    /// claimed target point.
    #[inline]
    pub fn residual(&self, src: Point2<f64>, dst: Point2<f64>) -> f64 {
        (self.apply(src) - dst).norm()
    }

    /// Homogeneous 3×3 matrix form of the transform.
    pub fn matrix(&self) -> Matrix3<f64> {
        let (sin, cos) = self.rotation.sin_cos();
        let a = self.scale * cos;
        let b = self.scale * sin;
        Matrix3::new(
            a,
            -b,
            self.translation.x,
            b,
            a,
            self.translation.y,
            0.0,
            0.0,
            1.0,
        )
    }

    /// Inverse transform, mapping target-plane points back to the source
    /// plane. `None` if the scale is too close to zero to invert.
    pub fn inverse(&self) -> Option<Self> {
        if self.scale.abs() < f64::EPSILON {
            return None;
        }
        let inv_scale = 1.0 / self.scale;
        let rot = -self.rotation;
        let (sin, cos) = rot.sin_cos();
        let t = -inv_scale
            * Vector2::new(
                cos * self.translation.x - sin * self.translation.y,
                sin * self.translation.x + cos * self.translation.y,
            );
        Some(Self::new(inv_scale, rot, t))
    }
}

/// Fit a similarity transform minimizing the total squared residual over the
/// supplied point pairs.
///
/// The model is linear in `(a, b, tx, ty)` with `x' = a·x − b·y + tx` and
/// `y' = b·x + a·y + ty`, so the normal equations have a closed form:
/// centering both sets at their centroids decouples `(a, b)` from the
/// translation. Duplicate pairs are legal and simply add weight.
pub fn fit_similarity(
    src: &[Point2<f64>],
    dst: &[Point2<f64>],
) -> Result<SimilarityTransform, FitError> {
    if src.len() != dst.len() {
        return Err(FitError::LengthMismatch {
            src: src.len(),
            dst: dst.len(),
        });
    }
    if src.len() < 2 {
        return Err(FitError::TooFewPairs { got: src.len() });
    }

    let n = src.len() as f64;
    let mut src_c = Vector2::zeros();
    let mut dst_c = Vector2::zeros();
    for (p, q) in src.iter().zip(dst) {
        src_c += p.coords;
        dst_c += q.coords;
    }
    src_c /= n;
    dst_c /= n;

    // Centered cross terms: c1 = Σ(x̄x̄' + ȳȳ'), c2 = Σ(x̄ȳ' − ȳx̄'),
    // s = Σ(x̄² + ȳ²).
    let mut c1 = 0.0;
    let mut c2 = 0.0;
    let mut s = 0.0;
    for (p, q) in src.iter().zip(dst) {
        let u = p.coords - src_c;
        let v = q.coords - dst_c;
        c1 += u.x * v.x + u.y * v.y;
        c2 += u.x * v.y - u.y * v.x;
        s += u.norm_squared();
    }

    if s < f64::EPSILON {
        return Err(FitError::DegenerateSource);
    }

    let a = c1 / s;
    let b = c2 / s;
    let translation = Vector2::new(
        dst_c.x - (a * src_c.x - b * src_c.y),
        dst_c.y - (b * src_c.x + a * src_c.y),
    );

    Ok(SimilarityTransform::new(
        (a * a + b * b).sqrt(),
        b.atan2(a),
        translation,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_points() -> Vec<Point2<f64>> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(3.0, 7.0),
            Point2::new(-4.0, 2.5),
            Point2::new(6.0, -8.0),
        ]
    }

    #[test]
    fn recovers_exact_similarity() {
        let truth = SimilarityTransform::new(1.7, 0.35, Vector2::new(12.0, -3.0));
        let src = sample_points();
        let dst: Vec<_> = src.iter().map(|&p| truth.apply(p)).collect();

        let fitted = fit_similarity(&src, &dst).expect("fit");
        assert_relative_eq!(fitted.scale, truth.scale, epsilon = 1e-12);
        assert_relative_eq!(fitted.rotation, truth.rotation, epsilon = 1e-12);
        assert_relative_eq!(fitted.translation.x, truth.translation.x, epsilon = 1e-10);
        assert_relative_eq!(fitted.translation.y, truth.translation.y, epsilon = 1e-10);
    }

    #[test]
    fn duplicate_pairs_do_not_change_the_fit() {
        let truth = SimilarityTransform::new(0.8, -1.2, Vector2::new(-5.0, 4.0));
        let mut src = sample_points();
        let mut dst: Vec<_> = src.iter().map(|&p| truth.apply(p)).collect();
        src.push(src[0]);
        dst.push(dst[0]);
        src.push(src[2]);
        dst.push(dst[2]);

        let fitted = fit_similarity(&src, &dst).expect("fit");
        assert_relative_eq!(fitted.scale, truth.scale, epsilon = 1e-12);
        assert_relative_eq!(fitted.rotation, truth.rotation, epsilon = 1e-12);
    }

    #[test]
    fn coincident_sources_are_degenerate() {
        let src = vec![Point2::new(1.0, 1.0); 4];
        let dst = sample_points()[..4].to_vec();
        assert!(matches!(
            fit_similarity(&src, &dst),
            Err(FitError::DegenerateSource)
        ));
    }

    #[test]
    fn inverse_round_trips() {
        let t = SimilarityTransform::new(2.5, 0.9, Vector2::new(3.0, -1.0));
        let inv = t.inverse().expect("invertible");
        let p = Point2::new(4.2, -7.7);
        let back = inv.apply(t.apply(p));
        assert_relative_eq!(back.x, p.x, epsilon = 1e-12);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-12);
    }

    #[test]
    fn matrix_matches_apply() {
        let t = SimilarityTransform::new(1.3, -0.4, Vector2::new(1.0, 2.0));
        let m = t.matrix();
        let p = Point2::new(5.0, -3.0);
        let v = m * nalgebra::Vector3::new(p.x, p.y, 1.0);
        let q = t.apply(p);
        assert_relative_eq!(v.x, q.x, epsilon = 1e-12);
        assert_relative_eq!(v.y, q.y, epsilon = 1e-12);
    }
}
