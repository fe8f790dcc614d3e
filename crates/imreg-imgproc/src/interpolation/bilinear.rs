use imreg_image::{Image, ImageDtype};

/// Kernel for bilinear interpolation
///
/// # Arguments
///
/// * `image` - The input image container.
/// * `u` - The x coordinate of the pixel to interpolate.
/// * `v` - The y coordinate of the pixel to interpolate.
/// * `c` - The channel of the pixel to interpolate.
///
/// # Returns
///
/// The interpolated pixel value.
pub(crate) fn bilinear_interpolation<T: ImageDtype, const C: usize>(
    image: &Image<T, C>,
    u: f32,
    v: f32,
    c: usize,
) -> f32 {
    let (rows, cols) = (image.rows(), image.cols());

    let u = u.clamp(0.0, (cols - 1) as f32);
    let v = v.clamp(0.0, (rows - 1) as f32);

    let iu0 = u.trunc() as usize;
    let iv0 = v.trunc() as usize;

    let frac_u = u - iu0 as f32;
    let frac_v = v - iv0 as f32;

    let iu1 = if iu0 + 1 < cols { iu0 + 1 } else { iu0 };
    let iv1 = if iv0 + 1 < rows { iv0 + 1 } else { iv0 };

    let data = image.as_slice();
    let sample = |iv: usize, iu: usize| data[(iv * cols + iu) * C + c].to_f32();

    let p00 = sample(iv0, iu0);
    let p01 = sample(iv0, iu1);
    let p10 = sample(iv1, iu0);
    let p11 = sample(iv1, iu1);

    p00 * (1.0 - frac_u) * (1.0 - frac_v)
        + p01 * frac_u * (1.0 - frac_v)
        + p10 * (1.0 - frac_u) * frac_v
        + p11 * frac_u * frac_v
}
