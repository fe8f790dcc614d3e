use rand::Rng;

use imreg_geometry::{ransac, Affine2, Homography, RansacParams, TransformMatrix, TransformModel};
use imreg_image::Image;
use imreg_imgproc::features::{
    ensure_min_matches, match_cross_check, match_ratio_test, Correspondence, FeatureError,
    FeatureExtractor, OrbDescriptor, OrbExtractor, SiftDescriptor, SiftExtractor,
};

use crate::{AffineRegistration, ImageRole, PerspectiveRegistration, RegistrationError};

/// The transform estimated between two images and how it was obtained.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Estimate {
    /// Transform mapping slave image coordinates to master image coordinates.
    pub transform: TransformMatrix,
    /// Indices into the correspondences of the inliers the transform was refined on.
    pub inliers: Vec<usize>,
    /// Number of correspondences after matching.
    pub num_correspondences: usize,
    /// Number of keypoints detected in the master image.
    pub master_keypoints: usize,
    /// Number of keypoints detected in the slave image.
    pub slave_keypoints: usize,
    /// Number of RANSAC iterations performed.
    pub ransac_iterations: usize,
}

/// One way of estimating a transform between two grayscale images.
///
/// A strategy fixes the feature extractor, the matching policy and the transform model, the
/// shared pipeline is implemented once in [`run_strategy`].
pub trait RegistrationStrategy {
    /// Descriptor computed by the extractor.
    type Descriptor: Clone + Send + Sync;

    /// Feature extractor of the strategy.
    type Extractor: FeatureExtractor<Descriptor = Self::Descriptor>;

    /// Transform model estimated by the strategy.
    type Model: TransformModel;

    /// Build the feature extractor.
    fn extractor(&self) -> Result<Self::Extractor, FeatureError>;

    /// Match the master descriptors against the slave descriptors.
    fn match_descriptors(
        &self,
        master: &[Self::Descriptor],
        slave: &[Self::Descriptor],
    ) -> Result<Vec<Correspondence>, FeatureError>;

    /// RANSAC parameters of the strategy.
    fn ransac_params(&self) -> &RansacParams;
}

impl RegistrationStrategy for AffineRegistration {
    type Descriptor = SiftDescriptor;
    type Extractor = SiftExtractor;
    type Model = Affine2;

    fn extractor(&self) -> Result<SiftExtractor, FeatureError> {
        SiftExtractor::new(self.sift)
    }

    fn match_descriptors(
        &self,
        master: &[SiftDescriptor],
        slave: &[SiftDescriptor],
    ) -> Result<Vec<Correspondence>, FeatureError> {
        match_ratio_test(master, slave, self.ratio_test.ratio)
    }

    fn ransac_params(&self) -> &RansacParams {
        &self.ransac
    }
}

impl RegistrationStrategy for PerspectiveRegistration {
    type Descriptor = OrbDescriptor;
    type Extractor = OrbExtractor;
    type Model = Homography;

    fn extractor(&self) -> Result<OrbExtractor, FeatureError> {
        OrbExtractor::new(self.orb)
    }

    fn match_descriptors(
        &self,
        master: &[OrbDescriptor],
        slave: &[OrbDescriptor],
    ) -> Result<Vec<Correspondence>, FeatureError> {
        match_cross_check(master, slave, self.cross_check.keep_fraction)
    }

    fn ransac_params(&self) -> &RansacParams {
        &self.ransac
    }
}

/// Estimate the transform mapping `slave` onto `master` with the given strategy.
///
/// Extracts the features of both images concurrently, matches them, runs RANSAC over the
/// correspondences and refines the best candidate on its inliers.
///
/// # Arguments
///
/// * `strategy` - The pipeline configuration.
/// * `master` - The normalized master image.
/// * `slave` - The normalized slave image.
/// * `rng` - The generator drawing the RANSAC samples.
pub fn run_strategy<S, R>(
    strategy: &S,
    master: &Image<u8, 1>,
    slave: &Image<u8, 1>,
    rng: &mut R,
) -> Result<Estimate, RegistrationError>
where
    S: RegistrationStrategy,
    R: Rng + ?Sized,
{
    let extractor = strategy.extractor()?;

    let (master_features, slave_features) = rayon::join(
        || extractor.detect_and_compute(master),
        || extractor.detect_and_compute(slave),
    );
    let master_features =
        master_features.map_err(|e| RegistrationError::from_features(e, ImageRole::Master))?;
    let slave_features =
        slave_features.map_err(|e| RegistrationError::from_features(e, ImageRole::Slave))?;

    log::debug!(
        "detected {} master and {} slave keypoints",
        master_features.len(),
        slave_features.len()
    );

    let matches =
        strategy.match_descriptors(&master_features.descriptors, &slave_features.descriptors)?;
    log::debug!("{} correspondences after filtering", matches.len());

    ensure_min_matches(&matches, S::Model::SAMPLE_SIZE)?;

    let master_points = master_features.positions();
    let slave_points = slave_features.positions();
    let (src, dst): (Vec<[f64; 2]>, Vec<[f64; 2]>) = matches
        .iter()
        .map(|m| (slave_points[m.slave_idx], master_points[m.master_idx]))
        .unzip();

    let result = ransac::<S::Model, R>(&src, &dst, strategy.ransac_params(), rng)?;
    log::debug!(
        "ransac: {} inliers out of {} correspondences in {} iterations",
        result.inliers.len(),
        src.len(),
        result.iterations
    );

    let model = result.refine(&src, &dst)?;
    log::debug!("refined transform: {:?}", model);

    Ok(Estimate {
        transform: model.into_matrix(),
        inliers: result.inliers,
        num_correspondences: matches.len(),
        master_keypoints: master_features.len(),
        slave_keypoints: slave_features.len(),
        ransac_iterations: result.iterations,
    })
}
