use imreg_image::{Image, ImageSize};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;

use super::{
    fast_feature_detector, FeatureError, FeatureExtractor, Features, HarrisResponse, Keypoint,
};
use crate::{filter::gaussian_blur, interpolation::InterpolationMode, resize::resize_native};

/// A 256 bit binary descriptor.
pub type OrbDescriptor = [u8; 32];

/// Seed of the sampling pattern. The pattern must be identical for every image that is
/// going to be matched, so it is fixed.
const PATTERN_SEED: u64 = 0x6f72_625f_7061_7474;

/// Number of FAST circle pixels that must be consecutively brighter or darker.
const FAST_ARC_LENGTH: u8 = 9;

/// Sigma of the smoothing applied before the binary tests.
const DESCRIPTOR_BLUR_SIGMA: f32 = 2.0;

/// Configuration of the [`OrbExtractor`].
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct OrbConfig {
    /// Maximum number of keypoints retained over all pyramid levels.
    pub max_keypoints: usize,
    /// Number of pyramid levels.
    pub n_levels: usize,
    /// Downscale factor between two consecutive pyramid levels.
    pub scale_factor: f32,
    /// FAST intensity threshold.
    pub fast_threshold: u8,
    /// Keypoints closer than this to the level border are discarded.
    pub edge_threshold: usize,
    /// Harris sensitivity factor used to rank the keypoints.
    pub harris_k: f32,
    /// Diameter of the patch used for the orientation and the descriptor.
    pub patch_size: usize,
}

impl Default for OrbConfig {
    fn default() -> Self {
        Self {
            max_keypoints: 9000,
            n_levels: 8,
            scale_factor: 1.2,
            fast_threshold: 20,
            edge_threshold: 31,
            harris_k: 0.04,
            patch_size: 31,
        }
    }
}

impl OrbConfig {
    /// Check that every value is in its valid range.
    pub fn validate(&self) -> Result<(), FeatureError> {
        if self.max_keypoints == 0 {
            return Err(FeatureError::InvalidConfig(
                "max_keypoints must be positive".into(),
            ));
        }
        if self.n_levels == 0 {
            return Err(FeatureError::InvalidConfig("n_levels must be positive".into()));
        }
        if !(self.scale_factor.is_finite() && self.scale_factor > 1.0) {
            return Err(FeatureError::InvalidConfig(format!(
                "scale_factor must be greater than 1, got {}",
                self.scale_factor
            )));
        }
        if self.patch_size < 5 {
            return Err(FeatureError::InvalidConfig(format!(
                "patch_size must be at least 5, got {}",
                self.patch_size
            )));
        }
        if self.edge_threshold < self.patch_size / 2 + 1 {
            return Err(FeatureError::InvalidConfig(format!(
                "edge_threshold {} does not contain the patch of size {}",
                self.edge_threshold, self.patch_size
            )));
        }
        if !self.harris_k.is_finite() {
            return Err(FeatureError::InvalidConfig("harris_k must be finite".into()));
        }
        Ok(())
    }
}

/// A keypoint on a pyramid level, before it is mapped to the full resolution image.
#[derive(Clone, Copy)]
struct LevelKeypoint {
    level: usize,
    x: usize,
    y: usize,
    response: f32,
    angle: f32,
}

/// Oriented FAST and rotated BRIEF extractor.
///
/// FAST corners are detected on every level of an image pyramid, ranked by their Harris
/// response, oriented by the intensity centroid of their patch and described by 256
/// intensity comparisons rotated to the keypoint orientation.
#[derive(Debug, Clone)]
pub struct OrbExtractor {
    config: OrbConfig,
    // (x0, y0, x1, y1) offsets of every binary test
    pattern: Vec<[i32; 4]>,
    // half width of every row of the circular patch
    umax: Vec<i32>,
}

impl Default for OrbExtractor {
    fn default() -> Self {
        Self::build(OrbConfig::default())
    }
}

impl OrbExtractor {
    /// Create an extractor after validating the configuration.
    pub fn new(config: OrbConfig) -> Result<Self, FeatureError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// The configuration of the extractor.
    pub fn config(&self) -> &OrbConfig {
        &self.config
    }

    fn build(config: OrbConfig) -> Self {
        let half = (config.patch_size / 2) as i32;

        // keep the rotated tests inside the circular patch
        let reach = ((half as f32) / std::f32::consts::SQRT_2).floor() as i32;
        let mut rng = StdRng::seed_from_u64(PATTERN_SEED);
        let mut pattern = Vec::with_capacity(256);
        while pattern.len() < 256 {
            let test = [
                rng.random_range(-reach..=reach),
                rng.random_range(-reach..=reach),
                rng.random_range(-reach..=reach),
                rng.random_range(-reach..=reach),
            ];
            if test[0] != test[2] || test[1] != test[3] {
                pattern.push(test);
            }
        }

        let umax = (0..=half)
            .map(|dy| (((half * half - dy * dy) as f32).sqrt()).floor() as i32)
            .collect();

        Self {
            config,
            pattern,
            umax,
        }
    }

    /// Downscaled copies of the image, level `i` is scaled by `1 / scale_factor^i`.
    ///
    /// Levels too small to hold a keypoint away from the border are not built.
    fn build_pyramid(&self, image: &Image<u8, 1>) -> Result<Vec<Image<u8, 1>>, FeatureError> {
        let min_side = 2 * self.config.edge_threshold + 1;
        let mut pyramid = vec![image.clone()];

        for level in 1..self.config.n_levels {
            let scale = self.config.scale_factor.powi(level as i32);
            let size = ImageSize {
                width: (image.width() as f32 / scale).round() as usize,
                height: (image.height() as f32 / scale).round() as usize,
            };
            if size.width < min_side || size.height < min_side {
                break;
            }

            let mut resized = Image::<u8, 1>::from_size_val(size, 0)?;
            resize_native(image, &mut resized, InterpolationMode::Bilinear)?;
            pyramid.push(resized);
        }

        Ok(pyramid)
    }

    /// FAST corners of one level with their Harris response and orientation.
    fn detect_level(
        &self,
        level: usize,
        image: &Image<u8, 1>,
    ) -> Result<Vec<LevelKeypoint>, FeatureError> {
        let edge = self.config.edge_threshold;
        let (cols, rows) = (image.cols(), image.rows());
        if cols <= 2 * edge || rows <= 2 * edge {
            return Ok(vec![]);
        }

        let corners =
            fast_feature_detector(image, self.config.fast_threshold, FAST_ARC_LENGTH, true)?;

        let mut response = Image::<f32, 1>::from_size_val(image.size(), 0.0)?;
        HarrisResponse::new(image.size())
            .with_k(self.config.harris_k)
            .compute(image, &mut response)?;

        let keypoints = corners
            .into_iter()
            .filter(|c| c.x >= edge && c.x < cols - edge && c.y >= edge && c.y < rows - edge)
            .map(|c| LevelKeypoint {
                level,
                x: c.x,
                y: c.y,
                response: response.as_slice()[image.size().index(c.y, c.x)],
                angle: self.intensity_centroid_angle(image, c.x, c.y),
            })
            .collect();

        Ok(keypoints)
    }

    /// Orientation of the vector from the patch center to its intensity centroid.
    fn intensity_centroid_angle(&self, image: &Image<u8, 1>, x: usize, y: usize) -> f32 {
        let data = image.as_slice();
        let cols = image.cols();
        let center = y * cols + x;

        let mut m01 = 0i64;
        let mut m10 = 0i64;

        // the center row
        for u in -self.umax[0]..=self.umax[0] {
            m10 += u as i64 * data[(center as i64 + u as i64) as usize] as i64;
        }

        // the rows above and below at once
        for (v, &d) in self.umax.iter().enumerate().skip(1) {
            let v = v as i64;
            let mut v_sum = 0i64;
            for u in -d..=d {
                let u = u as i64;
                let below = data[(center as i64 + v * cols as i64 + u) as usize] as i64;
                let above = data[(center as i64 - v * cols as i64 + u) as usize] as i64;
                v_sum += below - above;
                m10 += u * (below + above);
            }
            m01 += v * v_sum;
        }

        (m01 as f32).atan2(m10 as f32)
    }

    /// Rotated BRIEF descriptor of a keypoint on its smoothed level image.
    fn describe(&self, smoothed: &Image<u8, 1>, x: usize, y: usize, angle: f32) -> OrbDescriptor {
        let (sin_a, cos_a) = angle.sin_cos();
        let (cols, rows) = (smoothed.cols() as i32, smoothed.rows() as i32);
        let data = smoothed.as_slice();

        let sample = |dx: i32, dy: i32| {
            let rx = (cos_a * dx as f32 - sin_a * dy as f32).round() as i32;
            let ry = (sin_a * dx as f32 + cos_a * dy as f32).round() as i32;
            let px = (x as i32 + rx).clamp(0, cols - 1);
            let py = (y as i32 + ry).clamp(0, rows - 1);
            data[(py * cols + px) as usize]
        };

        let mut descriptor = [0u8; 32];
        for (i, test) in self.pattern.iter().enumerate() {
            if sample(test[0], test[1]) < sample(test[2], test[3]) {
                descriptor[i / 8] |= 1 << (i % 8);
            }
        }

        descriptor
    }
}

impl FeatureExtractor for OrbExtractor {
    type Descriptor = OrbDescriptor;

    fn detect_and_compute(
        &self,
        image: &Image<u8, 1>,
    ) -> Result<Features<OrbDescriptor>, FeatureError> {
        let pyramid = self.build_pyramid(image)?;

        let per_level = pyramid
            .par_iter()
            .enumerate()
            .map(|(level, level_image)| self.detect_level(level, level_image))
            .collect::<Result<Vec<_>, _>>()?;

        let mut keypoints: Vec<LevelKeypoint> = per_level.into_iter().flatten().collect();

        // stable sort, equal responses keep level and raster order
        keypoints.sort_by(|a, b| b.response.total_cmp(&a.response));
        keypoints.truncate(self.config.max_keypoints);

        log::debug!(
            "orb: {} keypoints over {} pyramid levels",
            keypoints.len(),
            pyramid.len()
        );

        if keypoints.is_empty() {
            return Err(FeatureError::NoFeaturesFound);
        }

        let smoothed = pyramid
            .par_iter()
            .map(|level_image| -> Result<Image<u8, 1>, FeatureError> {
                let mut blurred = Image::<u8, 1>::from_size_val(level_image.size(), 0)?;
                gaussian_blur(level_image, &mut blurred, DESCRIPTOR_BLUR_SIGMA)?;
                Ok(blurred)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let descriptors = keypoints
            .par_iter()
            .map(|kp| self.describe(&smoothed[kp.level], kp.x, kp.y, kp.angle))
            .collect();

        let keypoints = keypoints
            .iter()
            .map(|kp| {
                let scale = self.config.scale_factor.powi(kp.level as i32);
                Keypoint {
                    // pixel centers are aligned between the levels
                    position: [
                        (kp.x as f32 + 0.5) * scale - 0.5,
                        (kp.y as f32 + 0.5) * scale - 0.5,
                    ],
                    scale,
                    orientation: kp.angle,
                    response: kp.response,
                    octave: kp.level,
                }
            })
            .collect();

        Ok(Features {
            keypoints,
            descriptors,
        })
    }
}
