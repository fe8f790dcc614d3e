use imreg_geometry::RansacParams;
use imreg_imgproc::{
    features::{CrossCheckConfig, OrbConfig, RatioTestConfig, SiftConfig},
    interpolation::InterpolationMode,
};

use crate::RegistrationError;

/// Registration with an affine transform: SIFT features, ratio test matching and affine
/// RANSAC.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AffineRegistration {
    /// Feature extractor configuration.
    pub sift: SiftConfig,
    /// Matching configuration.
    pub ratio_test: RatioTestConfig,
    /// Robust estimation configuration, fields left out keep the affine defaults.
    #[serde(deserialize_with = "affine_ransac")]
    pub ransac: RansacParams,
}

impl Default for AffineRegistration {
    fn default() -> Self {
        Self {
            sift: SiftConfig::default(),
            ratio_test: RatioTestConfig::default(),
            ransac: RansacParams::default().with_threshold(1.0),
        }
    }
}

/// Registration with a projective transform: ORB features, cross-check matching and
/// homography RANSAC.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PerspectiveRegistration {
    /// Feature extractor configuration.
    pub orb: OrbConfig,
    /// Matching configuration.
    pub cross_check: CrossCheckConfig,
    /// Robust estimation configuration, fields left out keep the homography defaults.
    #[serde(deserialize_with = "perspective_ransac")]
    pub ransac: RansacParams,
}

impl Default for PerspectiveRegistration {
    fn default() -> Self {
        Self {
            orb: OrbConfig::default(),
            cross_check: CrossCheckConfig::default(),
            ransac: RansacParams::default().with_threshold(3.0),
        }
    }
}

/// RANSAC parameters as written in a configuration, missing fields are `None`.
#[derive(serde::Deserialize)]
struct RansacOverrides {
    max_iterations: Option<usize>,
    threshold: Option<f64>,
    confidence: Option<f64>,
}

impl RansacOverrides {
    fn apply(self, base: RansacParams) -> RansacParams {
        RansacParams {
            max_iterations: self.max_iterations.unwrap_or(base.max_iterations),
            threshold: self.threshold.unwrap_or(base.threshold),
            confidence: self.confidence.unwrap_or(base.confidence),
        }
    }
}

fn affine_ransac<'de, D>(deserializer: D) -> Result<RansacParams, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let overrides = <RansacOverrides as serde::Deserialize>::deserialize(deserializer)?;
    Ok(overrides.apply(AffineRegistration::default().ransac))
}

fn perspective_ransac<'de, D>(deserializer: D) -> Result<RansacParams, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let overrides = <RansacOverrides as serde::Deserialize>::deserialize(deserializer)?;
    Ok(overrides.apply(PerspectiveRegistration::default().ransac))
}

/// The kind of transform estimated between the two images, with its pipeline configuration.
///
/// Parses from and displays as `"warp_affine"` / `"warp_perspective"`, in which case the
/// default configuration of the variant is used.
///
/// # Example
///
/// ```
/// use imreg::RegistrationType;
///
/// let registration_type: RegistrationType = "warp_perspective".parse().unwrap();
/// assert_eq!(registration_type.to_string(), "warp_perspective");
/// assert!("warp_rigid".parse::<RegistrationType>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum RegistrationType {
    /// Affine transform, the slave is resampled with an affine warp.
    WarpAffine(AffineRegistration),
    /// Projective transform, the slave is resampled with a perspective warp.
    WarpPerspective(PerspectiveRegistration),
}

impl Default for RegistrationType {
    fn default() -> Self {
        RegistrationType::WarpAffine(AffineRegistration::default())
    }
}

impl RegistrationType {
    /// The name of the registration type.
    pub fn name(&self) -> &'static str {
        match self {
            RegistrationType::WarpAffine(_) => "warp_affine",
            RegistrationType::WarpPerspective(_) => "warp_perspective",
        }
    }

    /// Check every nested configuration.
    pub fn validate(&self) -> Result<(), RegistrationError> {
        match self {
            RegistrationType::WarpAffine(config) => {
                config.sift.validate()?;
                config.ratio_test.validate()?;
                config.ransac.validate()?;
            }
            RegistrationType::WarpPerspective(config) => {
                config.orb.validate()?;
                config.cross_check.validate()?;
                config.ransac.validate()?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for RegistrationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for RegistrationType {
    type Err = RegistrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "warp_affine" => Ok(RegistrationType::WarpAffine(Default::default())),
            "warp_perspective" => Ok(RegistrationType::WarpPerspective(Default::default())),
            _ => Err(RegistrationError::UnknownRegistrationType(s.to_string())),
        }
    }
}

impl From<AffineRegistration> for RegistrationType {
    fn from(config: AffineRegistration) -> Self {
        RegistrationType::WarpAffine(config)
    }
}

impl From<PerspectiveRegistration> for RegistrationType {
    fn from(config: PerspectiveRegistration) -> Self {
        RegistrationType::WarpPerspective(config)
    }
}

/// Configuration of a registration.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Transform kind and pipeline configuration.
    pub registration_type: RegistrationType,
    /// Interpolation used to resample the slave image.
    pub interpolation: InterpolationMode,
    /// Seed of the generator drawing the RANSAC samples.
    pub random_seed: u64,
}

impl RegistrationConfig {
    /// Create a configuration with default values for the given registration type.
    pub fn new(registration_type: RegistrationType) -> Self {
        Self {
            registration_type,
            ..Default::default()
        }
    }

    /// Set the interpolation mode.
    pub fn with_interpolation(mut self, interpolation: InterpolationMode) -> Self {
        self.interpolation = interpolation;
        self
    }

    /// Set the RANSAC seed.
    pub fn with_random_seed(mut self, random_seed: u64) -> Self {
        self.random_seed = random_seed;
        self
    }

    /// Check the configuration.
    pub fn validate(&self) -> Result<(), RegistrationError> {
        self.registration_type.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_affine() {
        let config = RegistrationConfig::default();
        assert_eq!(config.registration_type.name(), "warp_affine");
        assert_eq!(config.interpolation, InterpolationMode::Bilinear);
        assert_eq!(config.random_seed, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_str() -> Result<(), RegistrationError> {
        assert_eq!(
            "warp_affine".parse::<RegistrationType>()?,
            RegistrationType::WarpAffine(AffineRegistration::default())
        );
        assert_eq!(
            "warp_perspective".parse::<RegistrationType>()?,
            RegistrationType::WarpPerspective(PerspectiveRegistration::default())
        );
        assert_eq!(
            "Warp_Affine".parse::<RegistrationType>(),
            Err(RegistrationError::UnknownRegistrationType(
                "Warp_Affine".to_string()
            ))
        );
        Ok(())
    }

    #[test]
    fn test_default_thresholds() {
        assert_eq!(AffineRegistration::default().ransac.threshold, 1.0);
        assert_eq!(PerspectiveRegistration::default().ransac.threshold, 3.0);
        assert_eq!(PerspectiveRegistration::default().orb.max_keypoints, 9000);
        assert_eq!(PerspectiveRegistration::default().cross_check.keep_fraction, 0.9);
    }

    #[test]
    fn test_partial_ransac_keeps_pipeline_defaults() -> Result<(), serde_json::Error> {
        let config: RegistrationConfig = serde_json::from_str(
            r#"{"registration_type":{"method":"warp_perspective","ransac":{"max_iterations":500}}}"#,
        )?;
        let RegistrationType::WarpPerspective(perspective) = config.registration_type else {
            panic!("expected a perspective registration");
        };
        assert_eq!(perspective.ransac.max_iterations, 500);
        assert_eq!(perspective.ransac.threshold, 3.0);
        assert_eq!(perspective.ransac.confidence, 0.995);

        let affine: AffineRegistration = serde_json::from_str(r#"{"ransac":{"confidence":0.99}}"#)?;
        assert_eq!(affine.ransac.threshold, 1.0);
        assert_eq!(affine.ransac.max_iterations, 2000);
        assert_eq!(affine.ransac.confidence, 0.99);

        let perspective: PerspectiveRegistration = serde_json::from_str("{}")?;
        assert_eq!(perspective, PerspectiveRegistration::default());

        Ok(())
    }

    #[test]
    fn test_validate_nested() {
        let mut config = PerspectiveRegistration::default();
        config.cross_check.keep_fraction = 90.0;
        assert!(matches!(
            RegistrationType::from(config).validate(),
            Err(RegistrationError::InvalidConfig(_))
        ));

        let mut config = AffineRegistration::default();
        config.ransac.confidence = 0.0;
        assert!(matches!(
            RegistrationType::from(config).validate(),
            Err(RegistrationError::InvalidConfig(_))
        ));
    }
}
