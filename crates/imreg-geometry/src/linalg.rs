use crate::GeometryError;

/// Mean distance of normalized points to their centroid.
const NORMALIZED_MEAN_DISTANCE: f64 = std::f64::consts::SQRT_2;

/// Compute the determinant of a 3x3 matrix.
pub fn det_mat33(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// Twice the signed area of the triangle `(a, b, c)`.
pub fn triangle_area2(a: &[f64; 2], b: &[f64; 2], c: &[f64; 2]) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

/// Normalize 2d points with a similarity transform (Hartley normalization).
///
/// The points are translated so that their centroid is at the origin and scaled so that
/// their mean distance to the origin is `sqrt(2)`.
///
/// # Arguments
///
/// * `points` - The points to normalize.
///
/// # Returns
///
/// The normalized points and the 3x3 similarity `T` such that `normalized = T * point`.
///
/// # Errors
///
/// Fails with [`GeometryError::SingularSystem`] when all the points are coincident.
pub fn normalize_points_2d(
    points: &[[f64; 2]],
) -> Result<(Vec<[f64; 2]>, [[f64; 3]; 3]), GeometryError> {
    if points.is_empty() {
        return Err(GeometryError::InsufficientCorrespondences {
            required: 1,
            actual: 0,
        });
    }

    let n = points.len() as f64;
    let (mut mx, mut my) = (0.0, 0.0);
    for p in points {
        mx += p[0];
        my += p[1];
    }
    mx /= n;
    my /= n;

    let mean_dist = points
        .iter()
        .map(|p| ((p[0] - mx).powi(2) + (p[1] - my).powi(2)).sqrt())
        .sum::<f64>()
        / n;

    if mean_dist <= f64::EPSILON * (1.0 + mx.abs().max(my.abs())) {
        return Err(GeometryError::SingularSystem(
            "all points are coincident".to_string(),
        ));
    }

    let scale = NORMALIZED_MEAN_DISTANCE / mean_dist;

    let normalized = points
        .iter()
        .map(|p| [(p[0] - mx) * scale, (p[1] - my) * scale])
        .collect();

    let t = [
        [scale, 0.0, -scale * mx],
        [0.0, scale, -scale * my],
        [0.0, 0.0, 1.0],
    ];

    Ok((normalized, t))
}

/// Undo the normalization of a transform estimated on normalized points.
///
/// Given `m_norm` mapping `T_src * src` to `T_dst * dst`, returns `T_dst^-1 * m_norm * T_src`.
pub fn denormalize_transform(
    m_norm: &[[f64; 3]; 3],
    t_src: &[[f64; 3]; 3],
    t_dst: &[[f64; 3]; 3],
) -> [[f64; 3]; 3] {
    // inverse of the similarity [[s, 0, tx], [0, s, ty], [0, 0, 1]]
    let s = t_dst[0][0];
    let t_dst_inv = faer::mat![
        [1.0 / s, 0.0, -t_dst[0][2] / s],
        [0.0, 1.0 / s, -t_dst[1][2] / s],
        [0.0, 0.0, 1.0]
    ];
    let m = t_dst_inv * to_faer_mat3(m_norm) * to_faer_mat3(t_src);
    from_faer_mat3(&m)
}

pub(crate) fn to_faer_mat3(m: &[[f64; 3]; 3]) -> faer::Mat<f64> {
    faer::mat![
        [m[0][0], m[0][1], m[0][2]],
        [m[1][0], m[1][1], m[1][2]],
        [m[2][0], m[2][1], m[2][2]]
    ]
}

pub(crate) fn from_faer_mat3(m: &faer::Mat<f64>) -> [[f64; 3]; 3] {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, val) in row.iter_mut().enumerate() {
            *val = m.read(i, j);
        }
    }
    out
}

/// Singular values of a small dense matrix and its right singular vectors, one per column.
pub(crate) fn svd_values_and_vectors(m: &faer::Mat<f64>) -> (Vec<f64>, faer::Mat<f64>) {
    let svd = m.svd();
    let s = svd.s_diagonal();
    let values = (0..s.nrows()).map(|i| s.read(i)).collect();
    (values, svd.v().to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_det_mat33() {
        let m = [[2.0, 0.0, 1.0], [0.0, 3.0, 0.0], [1.0, 0.0, 1.0]];
        assert_relative_eq!(det_mat33(&m), 3.0);
    }

    #[test]
    fn test_triangle_area2() {
        assert_relative_eq!(triangle_area2(&[0.0, 0.0], &[2.0, 0.0], &[0.0, 2.0]), 4.0);
        assert_relative_eq!(triangle_area2(&[0.0, 0.0], &[1.0, 1.0], &[3.0, 3.0]), 0.0);
    }

    #[test]
    fn test_normalize_points_2d() -> Result<(), GeometryError> {
        let points = [[10.0, 10.0], [14.0, 10.0], [14.0, 14.0], [10.0, 14.0]];
        let (normalized, t) = normalize_points_2d(&points)?;

        let (mx, my) = normalized
            .iter()
            .fold((0.0, 0.0), |acc, p| (acc.0 + p[0], acc.1 + p[1]));
        assert_relative_eq!(mx, 0.0, epsilon = 1e-12);
        assert_relative_eq!(my, 0.0, epsilon = 1e-12);

        for p in &normalized {
            assert_relative_eq!((p[0] * p[0] + p[1] * p[1]).sqrt(), 2f64.sqrt(), epsilon = 1e-12);
        }

        // T maps the original points onto the normalized ones
        let p = points[1];
        assert_relative_eq!(t[0][0] * p[0] + t[0][2], normalized[1][0], epsilon = 1e-12);
        assert_relative_eq!(t[1][1] * p[1] + t[1][2], normalized[1][1], epsilon = 1e-12);

        Ok(())
    }

    #[test]
    fn test_normalize_points_coincident() {
        let points = [[3.0, 4.0]; 5];
        assert!(matches!(
            normalize_points_2d(&points),
            Err(GeometryError::SingularSystem(_))
        ));
    }

    #[test]
    fn test_denormalize_identity() -> Result<(), GeometryError> {
        let points = [[0.0, 0.0], [8.0, 2.0], [4.0, 6.0]];
        let (_, t) = normalize_points_2d(&points)?;
        let identity = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

        let m = denormalize_transform(&identity, &t, &t);
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(m[i][j], identity[i][j], epsilon = 1e-12);
            }
        }

        Ok(())
    }
}
