use imreg_image::ImageError;

/// An error type for the feature extraction and matching stages.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum FeatureError {
    /// The detector found no keypoint in the image.
    #[error("No features found in the image")]
    NoFeaturesFound,

    /// Fewer correspondences survived the filters than the model needs.
    #[error("Insufficient matches: {actual} found, at least {required} required")]
    InsufficientMatches {
        /// Minimum number of matches needed.
        required: usize,
        /// Number of matches available.
        actual: usize,
    },

    /// A configuration value is out of its valid range.
    #[error("Invalid feature configuration: {0}")]
    InvalidConfig(String),

    /// Error from the image container.
    #[error(transparent)]
    Image(#[from] ImageError),
}
