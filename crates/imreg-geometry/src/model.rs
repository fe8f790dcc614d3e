use crate::{Affine2, GeometryError, Homography};

/// A 2d transform that can be estimated from point correspondences.
///
/// Every model maps `src` points onto `dst` points. In the registration pipeline `src` holds
/// the slave keypoints and `dst` the master keypoints.
pub trait TransformModel: Sized + Clone + std::fmt::Debug {
    /// Number of correspondences of a minimal sample.
    const SAMPLE_SIZE: usize;

    /// Fit the model exactly to a minimal sample of `SAMPLE_SIZE` correspondences.
    ///
    /// # Errors
    ///
    /// Fails with [`GeometryError::SingularSystem`] on degenerate samples.
    fn fit_minimal(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<Self, GeometryError>;

    /// Fit the model in the least squares sense to all the given correspondences.
    ///
    /// # Errors
    ///
    /// Fails with [`GeometryError::InsufficientCorrespondences`] with fewer than
    /// `SAMPLE_SIZE` points and with [`GeometryError::SingularSystem`] when the points do
    /// not constrain the model.
    fn fit_least_squares(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<Self, GeometryError>;

    /// Map a `src` point into the `dst` frame.
    fn transform_point(&self, point: &[f64; 2]) -> [f64; 2];

    /// Convert the model into the common matrix representation.
    fn into_matrix(self) -> TransformMatrix;
}

/// Check the shape of a set of correspondences.
pub(crate) fn check_correspondences(
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
    required: usize,
) -> Result<(), GeometryError> {
    if src.len() != dst.len() || src.len() < required {
        return Err(GeometryError::InsufficientCorrespondences {
            required,
            actual: src.len().min(dst.len()),
        });
    }
    Ok(())
}

/// An estimated transform, mapping slave image coordinates to master image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformMatrix {
    /// A 2x3 affine transform.
    Affine(Affine2),
    /// A 3x3 projective transform.
    Homography(Homography),
}

impl TransformMatrix {
    /// The transform as a 3x3 matrix acting on homogeneous coordinates.
    pub fn to_homogeneous(&self) -> [[f64; 3]; 3] {
        match self {
            TransformMatrix::Affine(affine) => affine.to_homogeneous(),
            TransformMatrix::Homography(homography) => *homography.matrix(),
        }
    }

    /// Map a point through the transform.
    pub fn transform_point(&self, point: &[f64; 2]) -> [f64; 2] {
        match self {
            TransformMatrix::Affine(affine) => affine.transform_point(point),
            TransformMatrix::Homography(homography) => homography.transform_point(point),
        }
    }
}

impl From<Affine2> for TransformMatrix {
    fn from(affine: Affine2) -> Self {
        TransformMatrix::Affine(affine)
    }
}

impl From<Homography> for TransformMatrix {
    fn from(homography: Homography) -> Self {
        TransformMatrix::Homography(homography)
    }
}
