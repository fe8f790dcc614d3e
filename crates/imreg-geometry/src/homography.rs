use crate::linalg::{self, svd_values_and_vectors};
use crate::model::{check_correspondences, TransformModel};
use crate::{GeometryError, TransformMatrix};

/// Relative tolerance on the singular values of the DLT normal matrix.
const RANK_TOLERANCE: f64 = 1e-12;

/// Minimum triangle area between three normalized points of a minimal sample.
const COLLINEAR_TOLERANCE: f64 = 1e-6;

/// A 2d projective transform stored as a 3x3 matrix normalized so that `h33 = 1`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Homography {
    matrix: [[f64; 3]; 3],
}

impl Homography {
    /// Create a homography from its 3x3 matrix, taken as is.
    pub fn new(matrix: [[f64; 3]; 3]) -> Self {
        Self { matrix }
    }

    /// The identity transform.
    pub fn identity() -> Self {
        Self::new([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]])
    }

    /// The 3x3 matrix.
    pub fn matrix(&self) -> &[[f64; 3]; 3] {
        &self.matrix
    }

    /// The 3x3 matrix flattened in row-major order, as expected by the image warpers.
    pub fn to_row_major(&self) -> [f64; 9] {
        let m = &self.matrix;
        [
            m[0][0], m[0][1], m[0][2], m[1][0], m[1][1], m[1][2], m[2][0], m[2][1], m[2][2],
        ]
    }

    /// Map a point through the transform.
    ///
    /// Points sent to infinity come back as `NaN`.
    pub fn transform_point(&self, point: &[f64; 2]) -> [f64; 2] {
        let m = &self.matrix;
        let w = m[2][0] * point[0] + m[2][1] * point[1] + m[2][2];
        if w.abs() < f64::EPSILON {
            return [f64::NAN, f64::NAN];
        }
        [
            (m[0][0] * point[0] + m[0][1] * point[1] + m[0][2]) / w,
            (m[1][0] * point[0] + m[1][1] * point[1] + m[1][2]) / w,
        ]
    }
}

impl Default for Homography {
    fn default() -> Self {
        Self::identity()
    }
}

/// Compute the homography mapping `x1` onto `x2` with the normalized direct linear transform.
///
/// Each correspondence contributes two rows to the DLT system `A h = 0`. The solution is the
/// right singular vector of the smallest singular value of the 9x9 normal matrix `A^T A`.
///
/// # Arguments
///
/// * `x1` - The source points, at least four.
/// * `x2` - The destination points, same length as `x1`.
///
/// # Returns
///
/// The homography, scaled so that `h33 = 1`.
///
/// # Errors
///
/// * [`GeometryError::InsufficientCorrespondences`] with fewer than four points or lengths
///   that differ.
/// * [`GeometryError::SingularSystem`] when the points are coincident, the system has more
///   than one solution or the result is not invertible.
pub fn homography_dlt(x1: &[[f64; 2]], x2: &[[f64; 2]]) -> Result<Homography, GeometryError> {
    check_correspondences(x1, x2, Homography::SAMPLE_SIZE)?;

    let (x1n, t1) = linalg::normalize_points_2d(x1)?;
    let (x2n, t2) = linalg::normalize_points_2d(x2)?;

    // accumulate A^T A without building the 2N x 9 matrix
    let mut ata = [[0.0f64; 9]; 9];
    for (p1, p2) in x1n.iter().zip(x2n.iter()) {
        let (x, y) = (p1[0], p1[1]);
        let (u, v) = (p2[0], p2[1]);
        let r1 = [x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y, -u];
        let r2 = [0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y, -v];
        for i in 0..9 {
            for j in 0..9 {
                ata[i][j] += r1[i] * r1[j] + r2[i] * r2[j];
            }
        }
    }

    let (s, v) = svd_values_and_vectors(&faer::Mat::<f64>::from_fn(9, 9, |i, j| ata[i][j]));

    let mut order: Vec<usize> = (0..s.len()).collect();
    order.sort_by(|&a, &b| s[a].total_cmp(&s[b]));
    let (smallest, second, largest) = (order[0], order[1], order[s.len() - 1]);

    if s[largest] <= 0.0 || s[second] <= RANK_TOLERANCE * s[largest] {
        return Err(GeometryError::SingularSystem(
            "the DLT system has more than one solution".to_string(),
        ));
    }

    let h = |k: usize| v.read(k, smallest);
    let h_norm = [
        [h(0), h(1), h(2)],
        [h(3), h(4), h(5)],
        [h(6), h(7), h(8)],
    ];

    let mut homo = linalg::denormalize_transform(&h_norm, &t1, &t2);

    let h33 = homo[2][2];
    if h33.abs() < f64::EPSILON {
        return Err(GeometryError::SingularSystem(
            "the homography maps the origin to infinity".to_string(),
        ));
    }
    homo.iter_mut()
        .flat_map(|row| row.iter_mut())
        .for_each(|val| *val /= h33);

    let det = linalg::det_mat33(&homo);
    if det.abs() < 1e-8 {
        return Err(GeometryError::SingularSystem(format!(
            "the homography is not invertible (det = {det:e})"
        )));
    }

    Ok(Homography::new(homo))
}

/// Compute the homography from four 2d point correspondences.
///
/// # Arguments
///
/// * `x1` - The source points.
/// * `x2` - The destination points.
///
/// # Errors
///
/// Fails with [`GeometryError::SingularSystem`] if three of the four points are collinear in
/// either image.
///
/// # Example
///
/// ```
/// use imreg_geometry::homography_4pt2d;
///
/// let x1 = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
/// let x2 = [[1.0, 1.0], [2.0, 1.0], [1.0, 2.0], [2.0, 2.0]];
///
/// let homo = homography_4pt2d(&x1, &x2).unwrap();
/// let p = homo.transform_point(&[0.5, 0.5]);
/// assert!((p[0] - 1.5).abs() < 1e-9 && (p[1] - 1.5).abs() < 1e-9);
/// ```
pub fn homography_4pt2d(
    x1: &[[f64; 2]; 4],
    x2: &[[f64; 2]; 4],
) -> Result<Homography, GeometryError> {
    for points in [x1, x2] {
        let (normalized, _) = linalg::normalize_points_2d(points)?;
        if has_collinear_triplet(&normalized) {
            return Err(GeometryError::SingularSystem(
                "three of the sample points are collinear".to_string(),
            ));
        }
    }

    homography_dlt(x1, x2)
}

fn has_collinear_triplet(p: &[[f64; 2]]) -> bool {
    const TRIPLETS: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];
    TRIPLETS
        .iter()
        .any(|&[a, b, c]| linalg::triangle_area2(&p[a], &p[b], &p[c]).abs() < COLLINEAR_TOLERANCE)
}

impl TransformModel for Homography {
    const SAMPLE_SIZE: usize = 4;

    fn fit_minimal(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<Self, GeometryError> {
        check_correspondences(src, dst, Self::SAMPLE_SIZE)?;
        homography_4pt2d(
            &[src[0], src[1], src[2], src[3]],
            &[dst[0], dst[1], dst[2], dst[3]],
        )
    }

    fn fit_least_squares(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<Self, GeometryError> {
        homography_dlt(src, dst)
    }

    fn transform_point(&self, point: &[f64; 2]) -> [f64; 2] {
        Homography::transform_point(self, point)
    }

    fn into_matrix(self) -> TransformMatrix {
        TransformMatrix::Homography(self)
    }
}
