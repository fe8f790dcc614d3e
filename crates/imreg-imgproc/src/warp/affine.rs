use imreg_image::{Image, ImageDtype, ImageError};

use crate::interpolation::{grid::meshgrid_from_fn, InterpolationMode};

/// Inverts a 2x3 affine transformation matrix.
///
/// Arguments:
///
/// * `m` - The 2x3 affine transformation matrix, row-major.
///
/// Returns:
///
/// The inverted 2x3 affine transformation matrix.
///
/// # Errors
///
/// Fails with [`ImageError::NonInvertibleTransform`] when the linear part is singular.
pub fn invert_affine_transform(m: &[f64; 6]) -> Result<[f64; 6], ImageError> {
    let (a, b, c, d, e, f) = (m[0], m[1], m[2], m[3], m[4], m[5]);

    let determinant = a * e - b * d;
    if !determinant.is_finite() || determinant.abs() < super::SINGULAR_EPS {
        return Err(ImageError::NonInvertibleTransform(determinant));
    }
    let inv_determinant = 1.0 / determinant;

    let new_a = e * inv_determinant;
    let new_b = -b * inv_determinant;
    let new_d = -d * inv_determinant;
    let new_e = a * inv_determinant;
    let new_c = -(new_a * c + new_b * f);
    let new_f = -(new_d * c + new_e * f);

    Ok([new_a, new_b, new_c, new_d, new_e, new_f])
}

/// Returns a 2x3 rotation matrix for a 2D rotation around a center point.
///
/// The rotation matrix is defined as:
///
/// | alpha  beta  tx |
/// | -beta  alpha ty |
///
/// where:
///
/// alpha = scale * cos(angle)
/// beta = scale * sin(angle)
/// tx = (1 - alpha) * center.x - beta * center.y
/// ty = beta * center.x + (1 - alpha) * center.y
///
/// # Arguments
///
/// * `center` - The center point of the rotation.
/// * `angle` - The angle of rotation in degrees.
/// * `scale` - The scale factor.
///
/// # Example
///
/// ```
/// use imreg_imgproc::warp::get_rotation_matrix2d;
///
/// let rotation_matrix = get_rotation_matrix2d((0.0, 0.0), 90.0, 1.0);
/// assert!((rotation_matrix[1] - 1.0).abs() < 1e-12);
/// ```
pub fn get_rotation_matrix2d(center: (f64, f64), angle: f64, scale: f64) -> [f64; 6] {
    let angle = angle.to_radians();
    let alpha = scale * angle.cos();
    let beta = scale * angle.sin();

    let tx = (1.0 - alpha) * center.0 - beta * center.1;
    let ty = beta * center.0 + (1.0 - alpha) * center.1;

    [alpha, beta, tx, -beta, alpha, ty]
}

/// Applies an affine transformation to a point.
fn transform_point(x: f64, y: f64, m: &[f64; 6]) -> (f64, f64) {
    let u = m[0] * x + m[1] * y + m[2];
    let v = m[3] * x + m[4] * y + m[5];
    (u, v)
}

/// Applies an affine transformation to an image.
///
/// # Arguments
///
/// * `src` - The input image with shape (height, width, channels).
/// * `dst` - The output image with shape (new_height, new_width, channels).
/// * `m` - The 2x3 affine transformation matrix src -> dst, row-major.
/// * `interpolation` - The interpolation mode to use.
///
/// # Errors
///
/// Fails with [`ImageError::NonInvertibleTransform`] when `m` cannot be inverted.
///
/// # Example
///
/// ```
/// use imreg_image::{Image, ImageSize};
/// use imreg_imgproc::interpolation::InterpolationMode;
/// use imreg_imgproc::warp::warp_affine;
///
/// let src = Image::<_, 3>::from_size_val(
///     ImageSize {
///         width: 4,
///         height: 5,
///     },
///     1f32,
/// ).unwrap();
///
/// let m = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
/// let new_size = ImageSize {
///     width: 4,
///     height: 5,
/// };
///
/// let mut dst = Image::<_, 3>::from_size_val(new_size, 0.0).unwrap();
///
/// warp_affine(&src, &mut dst, &m, InterpolationMode::Nearest).unwrap();
///
/// assert_eq!(dst.size().width, 4);
/// assert_eq!(dst.size().height, 5);
/// ```
pub fn warp_affine<T: ImageDtype, const C: usize>(
    src: &Image<T, C>,
    dst: &mut Image<T, C>,
    m: &[f64; 6],
    interpolation: InterpolationMode,
) -> Result<(), ImageError> {
    if src.is_empty() {
        return Err(ImageError::EmptyImage(src.width(), src.height()));
    }

    // invert affine transform matrix to find corresponding positions in src from dst
    let m_inv = invert_affine_transform(m)?;

    // create meshgrid to find corresponding positions in dst from src
    let (dst_rows, dst_cols) = (dst.rows(), dst.cols());
    let (map_x, map_y) = meshgrid_from_fn(dst_cols, dst_rows, |x, y| {
        let (u_src, v_src) = transform_point(x as f64, y as f64, &m_inv);
        Ok((u_src as f32, v_src as f32))
    })?;

    super::resample(src, dst, &map_x, &map_y, interpolation);

    Ok(())
}

#[cfg(test)]
mod tests {
    use imreg_image::{Image, ImageError, ImageSize};

    #[test]
    fn warp_affine_smoke_ch3() -> Result<(), ImageError> {
        let image = Image::<_, 3>::new(
            ImageSize {
                width: 4,
                height: 5,
            },
            vec![0f32; 4 * 5 * 3],
        )?;

        let new_size = ImageSize {
            width: 2,
            height: 3,
        };

        let mut image_transformed = Image::<_, 3>::from_size_val(new_size, 0.0)?;

        super::warp_affine(
            &image,
            &mut image_transformed,
            &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            super::InterpolationMode::Bilinear,
        )?;

        assert_eq!(image_transformed.num_channels(), 3);
        assert_eq!(image_transformed.size().width, 2);
        assert_eq!(image_transformed.size().height, 3);

        Ok(())
    }

    #[test]
    fn warp_affine_correctness_identity() -> Result<(), ImageError> {
        let image = Image::<u8, 1>::new(
            ImageSize {
                width: 4,
                height: 5,
            },
            (0..20).collect(),
        )?;

        let mut image_transformed = Image::<u8, 1>::from_size_val(image.size(), 0)?;

        super::warp_affine(
            &image,
            &mut image_transformed,
            &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            super::InterpolationMode::Bilinear,
        )?;

        assert_eq!(image_transformed.as_slice(), image.as_slice());
        assert_eq!(image_transformed.size(), image.size());

        Ok(())
    }

    #[test]
    fn warp_affine_correctness_rot90() -> Result<(), ImageError> {
        let image = Image::<_, 1>::new(
            ImageSize {
                width: 2,
                height: 2,
            },
            vec![0.0f32, 1.0f32, 2.0f32, 3.0f32],
        )?;

        let mut image_transformed = Image::<_, 1>::from_size_val(image.size(), 0.0)?;

        super::warp_affine(
            &image,
            &mut image_transformed,
            &[0.0, 1.0, 0.0, -1.0, 0.0, 1.0],
            super::InterpolationMode::Nearest,
        )?;

        assert_eq!(image_transformed.as_slice(), &[1.0f32, 3.0, 0.0, 2.0]);

        Ok(())
    }

    #[test]
    fn warp_affine_translation_background() -> Result<(), ImageError> {
        let image = Image::<u16, 2>::new(
            ImageSize {
                width: 3,
                height: 1,
            },
            vec![1, 10, 2, 20, 3, 30],
        )?;

        // stale destination content must be overwritten by the background
        let mut image_transformed = Image::<u16, 2>::from_size_val(image.size(), 99)?;

        super::warp_affine(
            &image,
            &mut image_transformed,
            &[1.0, 0.0, -1.0, 0.0, 1.0, 0.0],
            super::InterpolationMode::Bilinear,
        )?;

        assert_eq!(image_transformed.as_slice(), &[2, 20, 3, 30, 0, 0]);

        Ok(())
    }

    #[test]
    fn warp_affine_singular() -> Result<(), ImageError> {
        let image = Image::<u8, 1>::from_size_val(
            ImageSize {
                width: 2,
                height: 2,
            },
            1,
        )?;
        let mut image_transformed = Image::<u8, 1>::from_size_val(image.size(), 0)?;

        let res = super::warp_affine(
            &image,
            &mut image_transformed,
            &[1.0, 2.0, 0.0, 2.0, 4.0, 0.0],
            super::InterpolationMode::Bilinear,
        );
        assert_eq!(res, Err(ImageError::NonInvertibleTransform(0.0)));

        Ok(())
    }

    #[test]
    fn rotation_matrix_rot90() {
        let m = super::get_rotation_matrix2d((0.5, 0.5), 90.0, 1.0);
        let expected = [0.0, 1.0, 0.0, -1.0, 0.0, 1.0];
        for (a, b) in m.iter().zip(expected.iter()) {
            approx::assert_relative_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn invert_affine_transform_roundtrip() -> Result<(), ImageError> {
        let m = [2.0, 0.5, 3.0, -1.0, 1.5, -4.0];
        let m_inv = super::invert_affine_transform(&m)?;

        let (x, y) = super::transform_point(7.0, -2.0, &m);
        let (u, v) = super::transform_point(x, y, &m_inv);
        approx::assert_relative_eq!(u, 7.0, epsilon = 1e-9);
        approx::assert_relative_eq!(v, -2.0, epsilon = 1e-9);

        Ok(())
    }
}
