use faer::prelude::SpSolverLstsq;

use crate::linalg::{self, svd_values_and_vectors};
use crate::model::{check_correspondences, TransformModel};
use crate::{GeometryError, TransformMatrix};

/// Relative tolerance on the triangle area of a minimal sample.
const MIN_RELATIVE_AREA: f64 = 1e-9;

/// Minimum ratio between the smallest and largest eigenvalue of the normal matrix.
const MIN_CONDITIONING: f64 = 1e-10;

/// A 2d affine transform `dst = A * src + t` stored as the 2x3 matrix `[A | t]`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Affine2 {
    matrix: [[f64; 3]; 2],
}

impl Affine2 {
    /// Create an affine transform from its 2x3 matrix.
    pub fn new(matrix: [[f64; 3]; 2]) -> Self {
        Self { matrix }
    }

    /// The identity transform.
    pub fn identity() -> Self {
        Self::new([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]])
    }

    /// The 2x3 matrix `[A | t]`.
    pub fn matrix(&self) -> &[[f64; 3]; 2] {
        &self.matrix
    }

    /// The linear part `A`.
    pub fn linear(&self) -> [[f64; 2]; 2] {
        let m = &self.matrix;
        [[m[0][0], m[0][1]], [m[1][0], m[1][1]]]
    }

    /// The translation `t`.
    pub fn translation(&self) -> [f64; 2] {
        [self.matrix[0][2], self.matrix[1][2]]
    }

    /// The 2x3 matrix flattened in row-major order, as expected by the image warpers.
    pub fn to_row_major(&self) -> [f64; 6] {
        let m = &self.matrix;
        [m[0][0], m[0][1], m[0][2], m[1][0], m[1][1], m[1][2]]
    }

    /// The 3x3 homogeneous form `[[A, t], [0, 0, 1]]`.
    pub fn to_homogeneous(&self) -> [[f64; 3]; 3] {
        [self.matrix[0], self.matrix[1], [0.0, 0.0, 1.0]]
    }

    /// Map a point through the transform.
    pub fn transform_point(&self, point: &[f64; 2]) -> [f64; 2] {
        let m = &self.matrix;
        [
            m[0][0] * point[0] + m[0][1] * point[1] + m[0][2],
            m[1][0] * point[0] + m[1][1] * point[1] + m[1][2],
        ]
    }
}

impl Default for Affine2 {
    fn default() -> Self {
        Self::identity()
    }
}

/// Compute the affine transform mapping three source points exactly onto three destination
/// points.
///
/// # Arguments
///
/// * `x1` - The source points.
/// * `x2` - The destination points.
///
/// # Errors
///
/// Fails with [`GeometryError::SingularSystem`] if the source points are collinear.
///
/// # Example
///
/// ```
/// use imreg_geometry::affine_3pt2d;
///
/// let x1 = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
/// let x2 = [[2.0, 3.0], [3.0, 3.0], [2.0, 4.0]];
///
/// let affine = affine_3pt2d(&x1, &x2).unwrap();
/// assert_eq!(affine.matrix(), &[[1.0, 0.0, 2.0], [0.0, 1.0, 3.0]]);
/// ```
pub fn affine_3pt2d(x1: &[[f64; 2]; 3], x2: &[[f64; 2]; 3]) -> Result<Affine2, GeometryError> {
    let d1 = [x1[1][0] - x1[0][0], x1[1][1] - x1[0][1]];
    let d2 = [x1[2][0] - x1[0][0], x1[2][1] - x1[0][1]];
    let e1 = [x2[1][0] - x2[0][0], x2[1][1] - x2[0][1]];
    let e2 = [x2[2][0] - x2[0][0], x2[2][1] - x2[0][1]];

    let det = linalg::triangle_area2(&x1[0], &x1[1], &x1[2]);
    let extent = d1[0] * d1[0] + d1[1] * d1[1] + d2[0] * d2[0] + d2[1] * d2[1];

    if det.abs() <= MIN_RELATIVE_AREA * extent || extent == 0.0 {
        return Err(GeometryError::SingularSystem(
            "the sample points are collinear".to_string(),
        ));
    }

    // A = [e1 e2] * [d1 d2]^-1
    let a00 = (e1[0] * d2[1] - e2[0] * d1[1]) / det;
    let a01 = (e2[0] * d1[0] - e1[0] * d2[0]) / det;
    let a10 = (e1[1] * d2[1] - e2[1] * d1[1]) / det;
    let a11 = (e2[1] * d1[0] - e1[1] * d2[0]) / det;

    let tx = x2[0][0] - a00 * x1[0][0] - a01 * x1[0][1];
    let ty = x2[0][1] - a10 * x1[0][0] - a11 * x1[0][1];

    Ok(Affine2::new([[a00, a01, tx], [a10, a11, ty]]))
}

/// Compute the least squares affine transform mapping `x1` onto `x2`.
///
/// Both point sets are normalized first. The conditioning of the design matrix is checked
/// through the singular values of its normal matrix and the six parameters are solved with
/// a QR decomposition.
///
/// # Arguments
///
/// * `x1` - The source points, at least three.
/// * `x2` - The destination points, same length as `x1`.
///
/// # Errors
///
/// * [`GeometryError::InsufficientCorrespondences`] with fewer than three points or lengths
///   that differ.
/// * [`GeometryError::SingularSystem`] when the source points are collinear or coincident.
pub fn affine_lstsq(x1: &[[f64; 2]], x2: &[[f64; 2]]) -> Result<Affine2, GeometryError> {
    check_correspondences(x1, x2, Affine2::SAMPLE_SIZE)?;

    let (x1n, t1) = linalg::normalize_points_2d(x1)?;
    let (x2n, t2) = linalg::normalize_points_2d(x2).or_else(|_| {
        // every source point maps onto the same destination, only t can be recovered
        Ok::<_, GeometryError>((vec![[0.0; 2]; x2.len()], translation_normalizer(&x2[0])))
    })?;

    // conditioning of [x y 1] through its 3x3 normal matrix
    let mut ata = [[0.0f64; 3]; 3];
    for p in &x1n {
        let row = [p[0], p[1], 1.0];
        for i in 0..3 {
            for j in 0..3 {
                ata[i][j] += row[i] * row[j];
            }
        }
    }
    let (s, _) = svd_values_and_vectors(&linalg::to_faer_mat3(&ata));
    let s_max = s.iter().cloned().fold(0.0, f64::max);
    let s_min = s.iter().cloned().fold(f64::INFINITY, f64::min);

    if s_max <= 0.0 || s_min / s_max < MIN_CONDITIONING {
        log::warn!("affine least squares is ill conditioned (s_min / s_max = {:e})", s_min / s_max);
        return Err(GeometryError::SingularSystem(
            "the points are collinear".to_string(),
        ));
    }

    // construct matrix A
    let n = x1n.len();
    let mut mat_a = faer::Mat::<f64>::zeros(2 * n, 6);
    let mut mat_b = faer::Mat::<f64>::zeros(2 * n, 1);

    for (i, (p1, p2)) in x1n.iter().zip(x2n.iter()).enumerate() {
        mat_a.write(2 * i, 0, p1[0]);
        mat_a.write(2 * i, 1, p1[1]);
        mat_a.write(2 * i, 2, 1.0);
        mat_a.write(2 * i + 1, 3, p1[0]);
        mat_a.write(2 * i + 1, 4, p1[1]);
        mat_a.write(2 * i + 1, 5, 1.0);
        mat_b.write(2 * i, 0, p2[0]);
        mat_b.write(2 * i + 1, 0, p2[1]);
    }

    let params = mat_a.qr().solve_lstsq(mat_b);
    let aff = params.col(0);

    let m_norm = [
        [aff[0], aff[1], aff[2]],
        [aff[3], aff[4], aff[5]],
        [0.0, 0.0, 1.0],
    ];
    let m = linalg::denormalize_transform(&m_norm, &t1, &t2);

    Ok(Affine2::new([m[0], m[1]]))
}

/// Pure translation moving `p` to the origin, used when the destination points collapse.
fn translation_normalizer(p: &[f64; 2]) -> [[f64; 3]; 3] {
    [[1.0, 0.0, -p[0]], [0.0, 1.0, -p[1]], [0.0, 0.0, 1.0]]
}

impl TransformModel for Affine2 {
    const SAMPLE_SIZE: usize = 3;

    fn fit_minimal(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<Self, GeometryError> {
        check_correspondences(src, dst, Self::SAMPLE_SIZE)?;
        affine_3pt2d(&[src[0], src[1], src[2]], &[dst[0], dst[1], dst[2]])
    }

    fn fit_least_squares(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<Self, GeometryError> {
        affine_lstsq(src, dst)
    }

    fn transform_point(&self, point: &[f64; 2]) -> [f64; 2] {
        Affine2::transform_point(self, point)
    }

    fn into_matrix(self) -> TransformMatrix {
        TransformMatrix::Affine(self)
    }
}
