use imreg_geometry::GeometryError;
use imreg_image::ImageError;
use imreg_imgproc::{features::FeatureError, normalize::NormalizeError};

/// Which of the two input images a failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageRole {
    /// The reference image.
    Master,
    /// The image aligned onto the master.
    Slave,
}

impl std::fmt::Display for ImageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageRole::Master => write!(f, "master"),
            ImageRole::Slave => write!(f, "slave"),
        }
    }
}

/// An error type for the registration pipeline.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum RegistrationError {
    /// An input image cannot be normalized for feature extraction.
    #[error("The {image} image is degenerate: {reason}")]
    DegenerateInput {
        /// The offending image.
        image: ImageRole,
        /// Why the image was rejected.
        reason: String,
    },

    /// The extractor found no keypoint in an image.
    #[error("No features found in the {image} image")]
    NoFeaturesFound {
        /// The featureless image.
        image: ImageRole,
    },

    /// Fewer correspondences than the transform needs.
    #[error("Insufficient matches: {actual} found, {required} required")]
    InsufficientMatches {
        /// Minimal sample size of the transform.
        required: usize,
        /// Number of correspondences available.
        actual: usize,
    },

    /// RANSAC did not find a consensus set.
    #[error("RANSAC failed: best inlier count {best_inliers} after {iterations} iterations")]
    RansacFailure {
        /// Size of the largest consensus set found.
        best_inliers: usize,
        /// Number of iterations performed.
        iterations: usize,
    },

    /// The transform cannot be solved or applied.
    #[error("Singular system: {0}")]
    SingularSystem(String),

    /// A configuration value is out of its valid range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The registration type name is not known.
    #[error("Unknown registration type {0:?}, expected \"warp_affine\" or \"warp_perspective\"")]
    UnknownRegistrationType(String),

    /// Error from the image container.
    #[error(transparent)]
    Image(ImageError),
}

impl RegistrationError {
    pub(crate) fn from_normalize(err: NormalizeError, image: ImageRole) -> Self {
        match err {
            NormalizeError::DegenerateInput { value } => RegistrationError::DegenerateInput {
                image,
                reason: format!("constant intensity {value}"),
            },
            NormalizeError::NonFiniteSample => RegistrationError::DegenerateInput {
                image,
                reason: "non-finite sample".to_string(),
            },
            NormalizeError::Image(err) => err.into(),
        }
    }

    pub(crate) fn from_features(err: FeatureError, image: ImageRole) -> Self {
        match err {
            FeatureError::NoFeaturesFound => RegistrationError::NoFeaturesFound { image },
            err => err.into(),
        }
    }
}

impl From<ImageError> for RegistrationError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::NonInvertibleTransform(det) => RegistrationError::SingularSystem(
                format!("the estimated transform is not invertible (det = {det:e})"),
            ),
            err => RegistrationError::Image(err),
        }
    }
}

impl From<FeatureError> for RegistrationError {
    fn from(err: FeatureError) -> Self {
        match err {
            FeatureError::InsufficientMatches { required, actual } => {
                RegistrationError::InsufficientMatches { required, actual }
            }
            FeatureError::InvalidConfig(msg) => RegistrationError::InvalidConfig(msg),
            // only raised by extraction, which goes through `from_features`
            FeatureError::NoFeaturesFound => RegistrationError::NoFeaturesFound {
                image: ImageRole::Master,
            },
            FeatureError::Image(err) => err.into(),
        }
    }
}

impl From<GeometryError> for RegistrationError {
    fn from(err: GeometryError) -> Self {
        match err {
            GeometryError::InsufficientCorrespondences { required, actual } => {
                RegistrationError::InsufficientMatches { required, actual }
            }
            GeometryError::RansacFailure {
                best_inliers,
                iterations,
            } => RegistrationError::RansacFailure {
                best_inliers,
                iterations,
            },
            GeometryError::SingularSystem(msg) => RegistrationError::SingularSystem(msg),
            GeometryError::InvalidConfig(msg) => RegistrationError::InvalidConfig(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_errors_keep_role() {
        let err = RegistrationError::from_normalize(
            NormalizeError::DegenerateInput { value: 3.0 },
            ImageRole::Slave,
        );
        assert_eq!(
            err,
            RegistrationError::DegenerateInput {
                image: ImageRole::Slave,
                reason: "constant intensity 3".to_string()
            }
        );
    }

    #[test]
    fn test_geometry_errors() {
        assert_eq!(
            RegistrationError::from(GeometryError::RansacFailure {
                best_inliers: 3,
                iterations: 2000
            }),
            RegistrationError::RansacFailure {
                best_inliers: 3,
                iterations: 2000
            }
        );
        assert_eq!(
            RegistrationError::from(GeometryError::InsufficientCorrespondences {
                required: 4,
                actual: 1
            }),
            RegistrationError::InsufficientMatches {
                required: 4,
                actual: 1
            }
        );
    }

    #[test]
    fn test_non_invertible_is_singular() {
        let err = RegistrationError::from(ImageError::NonInvertibleTransform(0.0));
        assert!(matches!(err, RegistrationError::SingularSystem(_)));
    }

    #[test]
    fn test_feature_errors() {
        assert_eq!(
            RegistrationError::from_features(FeatureError::NoFeaturesFound, ImageRole::Slave),
            RegistrationError::NoFeaturesFound {
                image: ImageRole::Slave
            }
        );
    }
}
