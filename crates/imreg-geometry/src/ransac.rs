use rand::Rng;

use crate::model::{check_correspondences, TransformModel};
use crate::GeometryError;

/// Parameters for RANSAC model estimation.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RansacParams {
    /// Maximum number of RANSAC iterations.
    pub max_iterations: usize,
    /// Inlier threshold, euclidean reprojection error in pixels.
    pub threshold: f64,
    /// Probability of drawing at least one outlier free sample, used to stop early.
    pub confidence: f64,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            threshold: 1.0,
            confidence: 0.995,
        }
    }
}

impl RansacParams {
    /// Set the inlier threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Check that every value is in its valid range.
    pub fn validate(&self) -> Result<(), GeometryError> {
        if self.max_iterations == 0 {
            return Err(GeometryError::InvalidConfig(
                "max_iterations must be positive".to_string(),
            ));
        }
        if !(self.threshold.is_finite() && self.threshold > 0.0) {
            return Err(GeometryError::InvalidConfig(format!(
                "threshold must be positive and finite, got {}",
                self.threshold
            )));
        }
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(GeometryError::InvalidConfig(format!(
                "confidence must be in (0, 1), got {}",
                self.confidence
            )));
        }
        Ok(())
    }
}

/// Result of a RANSAC model fit.
#[derive(Debug, Clone, PartialEq)]
pub struct RansacResult<M> {
    /// Model fitted to the minimal sample with the largest consensus.
    pub model: M,
    /// Indices of the inlier correspondences, ascending.
    pub inliers: Vec<usize>,
    /// Indices of the minimal sample the model was fitted to.
    pub sample: Vec<usize>,
    /// Number of iterations performed.
    pub iterations: usize,
}

impl<M: TransformModel> RansacResult<M> {
    /// Fit the model in the least squares sense to all the inliers.
    ///
    /// `src` and `dst` are the same correspondences given to [`ransac`].
    pub fn refine(&self, src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<M, GeometryError> {
        let (src_in, dst_in): (Vec<_>, Vec<_>) =
            self.inliers.iter().map(|&i| (src[i], dst[i])).unzip();
        M::fit_least_squares(&src_in, &dst_in)
    }
}

/// Number of iterations needed to draw an outlier free sample with the given confidence.
fn adaptive_iterations(inlier_ratio: f64, sample_size: usize, confidence: f64) -> Option<usize> {
    let outlier_free = inlier_ratio.powi(sample_size as i32);
    if outlier_free >= 1.0 {
        return Some(1);
    }
    let denom = (1.0 - outlier_free).ln();
    if denom >= 0.0 || !denom.is_finite() {
        return None;
    }
    let n = ((1.0 - confidence).ln() / denom).ceil();
    n.is_finite().then_some(n.max(1.0) as usize)
}

/// Estimate a transform with RANSAC.
///
/// Repeatedly fits the model to a random minimal sample of correspondences and keeps the
/// candidate whose consensus set, the correspondences reprojected within `threshold` pixels,
/// is the largest. A later candidate replaces the best only with a strictly larger consensus.
/// The iteration budget shrinks as better candidates are found, according to `confidence`.
///
/// # Arguments
///
/// * `src` - The points mapped by the model, the slave keypoints.
/// * `dst` - The target points, the master keypoints.
/// * `params` - The RANSAC parameters.
/// * `rng` - The random generator drawing the samples. The same seed gives the same result.
///
/// # Errors
///
/// * [`GeometryError::InvalidConfig`] if the parameters are invalid.
/// * [`GeometryError::InsufficientCorrespondences`] with fewer than `M::SAMPLE_SIZE`
///   correspondences or lengths that differ.
/// * [`GeometryError::RansacFailure`] when no candidate gathers more than `M::SAMPLE_SIZE`
///   inliers.
///
/// # Example
///
/// ```
/// use imreg_geometry::{ransac, Affine2, RansacParams};
/// use rand::{rngs::StdRng, SeedableRng};
///
/// let src: Vec<[f64; 2]> = (0..20).map(|i| [i as f64, (i * i % 7) as f64]).collect();
/// let dst: Vec<[f64; 2]> = src.iter().map(|p| [p[0] + 5.0, p[1] - 2.0]).collect();
///
/// let mut rng = StdRng::seed_from_u64(0);
/// let result = ransac::<Affine2, _>(&src, &dst, &RansacParams::default(), &mut rng).unwrap();
/// assert_eq!(result.inliers.len(), 20);
/// ```
pub fn ransac<M, R>(
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
    params: &RansacParams,
    rng: &mut R,
) -> Result<RansacResult<M>, GeometryError>
where
    M: TransformModel,
    R: Rng + ?Sized,
{
    params.validate()?;
    check_correspondences(src, dst, M::SAMPLE_SIZE)?;

    let n = src.len();
    let k = M::SAMPLE_SIZE;

    let mut best: Option<RansacResult<M>> = None;
    let mut budget = params.max_iterations;
    let mut iterations = 0;

    let mut s1 = Vec::with_capacity(k);
    let mut s2 = Vec::with_capacity(k);

    while iterations < budget {
        iterations += 1;

        let sample = rand::seq::index::sample(rng, n, k).into_vec();
        s1.clear();
        s2.clear();
        for &idx in sample.iter() {
            s1.push(src[idx]);
            s2.push(dst[idx]);
        }

        let model = match M::fit_minimal(&s1, &s2) {
            Ok(model) => model,
            Err(_) => continue,
        };

        let inliers: Vec<usize> = src
            .iter()
            .zip(dst.iter())
            .enumerate()
            .filter_map(|(i, (p1, p2))| {
                let p = model.transform_point(p1);
                let d = ((p[0] - p2[0]).powi(2) + (p[1] - p2[1]).powi(2)).sqrt();
                (d <= params.threshold).then_some(i)
            })
            .collect();

        let best_count = best.as_ref().map_or(0, |b| b.inliers.len());
        if inliers.len() <= best_count {
            continue;
        }

        log::trace!(
            "ransac iteration {}: {} inliers out of {}",
            iterations,
            inliers.len(),
            n
        );

        if let Some(needed) =
            adaptive_iterations(inliers.len() as f64 / n as f64, k, params.confidence)
        {
            budget = budget.min(needed.max(iterations));
        }

        best = Some(RansacResult {
            model,
            inliers,
            sample,
            iterations: 0,
        });
    }

    match best {
        Some(mut result) if result.inliers.len() > k => {
            result.iterations = iterations;
            log::debug!(
                "ransac kept {} inliers out of {} after {} iterations",
                result.inliers.len(),
                n,
                iterations
            );
            Ok(result)
        }
        best => {
            let best_inliers = best.map_or(0, |b| b.inliers.len());
            log::warn!(
                "ransac found no consensus: best {} inliers after {} iterations",
                best_inliers,
                iterations
            );
            Err(GeometryError::RansacFailure {
                best_inliers,
                iterations,
            })
        }
    }
}
