/// An error type for the geometry module.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// Not enough point correspondences to fit the model.
    #[error("Need at least {required} correspondences and equal lengths, got {actual}")]
    InsufficientCorrespondences {
        /// Minimum number of correspondences of the model.
        required: usize,
        /// Number of correspondences provided.
        actual: usize,
    },

    /// RANSAC did not find a consensus set larger than the minimal sample.
    #[error("RANSAC failed to find a consensus: best inlier count {best_inliers} after {iterations} iterations")]
    RansacFailure {
        /// Size of the largest consensus set found.
        best_inliers: usize,
        /// Number of iterations performed.
        iterations: usize,
    },

    /// The linear system of the solver is singular or ill conditioned.
    #[error("Singular system: {0}")]
    SingularSystem(String),

    /// A parameter is out of its valid range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
