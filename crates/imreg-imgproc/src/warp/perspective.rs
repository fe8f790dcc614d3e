use crate::interpolation::{grid::meshgrid_from_fn, InterpolationMode};

use imreg_image::{Image, ImageDtype, ImageError};

#[rustfmt::skip]
fn determinant3x3(m: &[f64; 9]) -> f64 {
    m[0] * (m[4] * m[8] - m[5] * m[7]) -
    m[1] * (m[3] * m[8] - m[5] * m[6]) +
    m[2] * (m[3] * m[7] - m[4] * m[6])
}

#[rustfmt::skip]
fn adjugate3x3(m: &[f64; 9]) -> [f64; 9] {
    [
        m[4] * m[8] - m[5] * m[7],  // [0, 0]
        m[2] * m[7] - m[1] * m[8],  // [0, 1]
        m[1] * m[5] - m[2] * m[4],  // [0, 2]
        m[5] * m[6] - m[3] * m[8],  // [1, 0]
        m[0] * m[8] - m[2] * m[6],  // [1, 1]
        m[2] * m[3] - m[0] * m[5],  // [1, 2]
        m[3] * m[7] - m[4] * m[6],  // [2, 0]
        m[1] * m[6] - m[0] * m[7],  // [2, 1]
        m[0] * m[4] - m[1] * m[3],  // [2, 2]
    ]
}

/// Inverts a 3x3 perspective transformation matrix.
///
/// # Errors
///
/// Fails with [`ImageError::NonInvertibleTransform`] when the matrix is singular.
pub fn inverse_perspective_matrix(m: &[f64; 9]) -> Result<[f64; 9], ImageError> {
    let det = determinant3x3(m);

    if !det.is_finite() || det.abs() < super::SINGULAR_EPS {
        return Err(ImageError::NonInvertibleTransform(det));
    }

    let adj = adjugate3x3(m);
    let inv_det = 1.0 / det;

    let mut inv_m = [0.0; 9];
    for (inv, a) in inv_m.iter_mut().zip(adj.iter()) {
        *inv = a * inv_det;
    }

    Ok(inv_m)
}

/// Applies a perspective transformation to a point.
///
/// Points on the line at infinity map to NaN, which is never inside an image.
fn transform_point(x: f64, y: f64, m: &[f64; 9]) -> (f64, f64) {
    let w = m[6] * x + m[7] * y + m[8];
    if w.abs() < f64::EPSILON {
        return (f64::NAN, f64::NAN);
    }
    let u = (m[0] * x + m[1] * y + m[2]) / w;
    let v = (m[3] * x + m[4] * y + m[5]) / w;
    (u, v)
}

/// Applies a perspective transformation to an image.
///
/// * `src` - The input image with shape (height, width, channels).
/// * `dst` - The output image with shape (new_height, new_width, channels).
/// * `m` - The 3x3 perspective transformation matrix src -> dst, row-major.
/// * `interpolation` - The interpolation mode to use.
///
/// # Errors
///
/// Fails with [`ImageError::NonInvertibleTransform`] when `m` is singular.
///
/// # Example
///
/// ```
/// use imreg_image::{Image, ImageSize};
/// use imreg_imgproc::interpolation::InterpolationMode;
/// use imreg_imgproc::warp::warp_perspective;
///
/// let src = Image::<f32, 1>::new(
///   ImageSize {
///     width: 4,
///     height: 5,
///   },
///   vec![0.0f32; 4 * 5]
/// ).unwrap();
///
/// let m = [1.0, 0.0, -1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0];
///
/// let mut dst = Image::<f32, 1>::from_size_val(
///   ImageSize {
///     width: 2,
///     height: 3,
///   },
///   0.0
/// ).unwrap();
///
/// warp_perspective(&src, &mut dst, &m, InterpolationMode::Bilinear).unwrap();
///
/// assert_eq!(dst.size().width, 2);
/// assert_eq!(dst.size().height, 3);
/// ```
pub fn warp_perspective<T: ImageDtype, const C: usize>(
    src: &Image<T, C>,
    dst: &mut Image<T, C>,
    m: &[f64; 9],
    interpolation: InterpolationMode,
) -> Result<(), ImageError> {
    if src.is_empty() {
        return Err(ImageError::EmptyImage(src.width(), src.height()));
    }

    let inv_m = inverse_perspective_matrix(m)?;

    // create meshgrid to find corresponding positions in dst from src
    let (dst_rows, dst_cols) = (dst.rows(), dst.cols());
    let (map_x, map_y) = meshgrid_from_fn(dst_cols, dst_rows, |x, y| {
        let (u_src, v_src) = transform_point(x as f64, y as f64, &inv_m);
        Ok((u_src as f32, v_src as f32))
    })?;

    super::resample(src, dst, &map_x, &map_y, interpolation);

    Ok(())
}
