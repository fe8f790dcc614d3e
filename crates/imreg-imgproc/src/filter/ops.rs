use imreg_image::{Image, ImageDtype, ImageError};

use super::{kernels, separable_filter};

/// Blur an image using a gaussian blur filter
///
/// The kernel size is derived from `sigma` so that it covers three standard deviations.
///
/// # Arguments
///
/// * `src` - The source image with shape (H, W, C).
/// * `dst` - The destination image with shape (H, W, C).
/// * `sigma` - The sigma of the gaussian kernel.
///
/// PRECONDITION: `src` and `dst` must have the same shape.
///
/// # Example
///
/// ```
/// use imreg_image::{Image, ImageSize};
/// use imreg_imgproc::filter::gaussian_blur;
///
/// let image = Image::<u8, 1>::from_size_val(ImageSize { width: 8, height: 8 }, 7).unwrap();
/// let mut blurred = Image::<f32, 1>::from_size_val(image.size(), 0.0).unwrap();
///
/// gaussian_blur(&image, &mut blurred, 1.5).unwrap();
/// assert!((blurred.as_slice()[0] - 7.0).abs() < 1e-4);
/// ```
pub fn gaussian_blur<T, U, const C: usize>(
    src: &Image<T, C>,
    dst: &mut Image<U, C>,
    sigma: f32,
) -> Result<(), ImageError>
where
    T: ImageDtype,
    U: ImageDtype,
{
    let kernel = kernels::gaussian_kernel_1d(kernels::gaussian_kernel_size(sigma), sigma);
    separable_filter(src, dst, &kernel, &kernel)
}

/// Compute the first order image derivative in both x and y using a Sobel operator.
///
/// # Arguments
///
/// * `src` - The source image with shape (H, W, C).
/// * `dx` - The x derivative with shape (H, W, C).
/// * `dy` - The y derivative with shape (H, W, C).
pub fn sobel<T, const C: usize>(
    src: &Image<T, C>,
    dx: &mut Image<f32, C>,
    dy: &mut Image<f32, C>,
) -> Result<(), ImageError>
where
    T: ImageDtype,
{
    let (derivative, smooth) = kernels::sobel_kernel_1d();
    separable_filter(src, dx, &derivative, &smooth)?;
    separable_filter(src, dy, &smooth, &derivative)?;
    Ok(())
}
