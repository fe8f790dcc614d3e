use imreg_image::Image;

use super::FeatureError;

/// A detected keypoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    /// Position `[x, y]` in pixels of the full resolution image.
    pub position: [f32; 2],
    /// Scale of the keypoint relative to the full resolution image.
    pub scale: f32,
    /// Orientation in radians.
    pub orientation: f32,
    /// Detector response, larger is stronger.
    pub response: f32,
    /// Index of the pyramid level or octave the keypoint was detected on.
    pub octave: usize,
}

/// Keypoints of an image with one descriptor per keypoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Features<D> {
    /// The detected keypoints.
    pub keypoints: Vec<Keypoint>,
    /// The descriptors, `descriptors[i]` describes `keypoints[i]`.
    pub descriptors: Vec<D>,
}

impl<D> Features<D> {
    /// Number of keypoints.
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    /// Whether no keypoint was found.
    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    /// Keypoint positions in double precision, as consumed by the transform solvers.
    pub fn positions(&self) -> Vec<[f64; 2]> {
        self.keypoints
            .iter()
            .map(|kp| [kp.position[0] as f64, kp.position[1] as f64])
            .collect()
    }
}

/// A tentative pairing between a master and a slave keypoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    /// Index into the master features.
    pub master_idx: usize,
    /// Index into the slave features.
    pub slave_idx: usize,
    /// Descriptor distance of the pair.
    pub distance: f32,
}

/// Detects keypoints in a grayscale image and describes them.
///
/// Implementations hold no mutable state, so a single extractor can process several images
/// concurrently.
pub trait FeatureExtractor: Sync {
    /// The descriptor computed for every keypoint.
    type Descriptor: Clone + Send + Sync;

    /// Detect the keypoints of `image` and compute their descriptors.
    ///
    /// # Errors
    ///
    /// Fails with [`FeatureError::NoFeaturesFound`] when no keypoint is detected.
    fn detect_and_compute(
        &self,
        image: &Image<u8, 1>,
    ) -> Result<Features<Self::Descriptor>, FeatureError>;
}
