use crate::interpolation::{grid::meshgrid_from_fn, interpolate_pixel, InterpolationMode};
use crate::parallel;
use imreg_image::{Image, ImageDtype, ImageError};

/// Resize an image to a new size.
///
/// The function resizes an image to a new size using the specified interpolation mode.
/// Pixel centers are aligned, i.e. the destination pixel `x` samples the source at
/// `(x + 0.5) * src_width / dst_width - 0.5`. It supports any number of channels and data
/// types.
///
/// # Arguments
///
/// * `src` - The input image container.
/// * `dst` - The output image container.
/// * `interpolation` - The interpolation mode to use.
///
/// # Errors
///
/// Fails if either image is empty.
///
/// # Example
///
/// ```
/// use imreg_image::{Image, ImageSize};
/// use imreg_imgproc::resize::resize_native;
/// use imreg_imgproc::interpolation::InterpolationMode;
///
/// let image = Image::<_, 3>::new(
///     ImageSize {
///         width: 4,
///         height: 5,
///     },
///     vec![0f32; 4 * 5 * 3],
/// )
/// .unwrap();
///
/// let new_size = ImageSize {
///     width: 2,
///     height: 3,
/// };
///
/// let mut image_resized = Image::<_, 3>::from_size_val(new_size, 0.0).unwrap();
///
/// resize_native(
///     &image,
///     &mut image_resized,
///     InterpolationMode::Nearest,
/// )
/// .unwrap();
///
/// assert_eq!(image_resized.num_channels(), 3);
/// assert_eq!(image_resized.size().width, 2);
/// assert_eq!(image_resized.size().height, 3);
/// ```
pub fn resize_native<T, const C: usize>(
    src: &Image<T, C>,
    dst: &mut Image<T, C>,
    interpolation: InterpolationMode,
) -> Result<(), ImageError>
where
    T: ImageDtype,
{
    if src.is_empty() {
        return Err(ImageError::EmptyImage(src.width(), src.height()));
    }
    if dst.is_empty() {
        return Err(ImageError::EmptyImage(dst.width(), dst.height()));
    }

    let scale_x = src.width() as f32 / dst.width() as f32;
    let scale_y = src.height() as f32 / dst.height() as f32;

    // create a grid of x and y coordinates for the output image
    // and interpolate the values from the input image.
    let (map_x, map_y) = meshgrid_from_fn(dst.cols(), dst.rows(), |x, y| {
        let u = (x as f32 + 0.5) * scale_x - 0.5;
        let v = (y as f32 + 0.5) * scale_y - 0.5;
        Ok((u.max(0.0), v.max(0.0)))
    })?;

    parallel::par_iter_rows_resample(dst, &map_x, &map_y, |&x, &y, dst_pixel| {
        dst_pixel.iter_mut().enumerate().for_each(|(k, pixel)| {
            *pixel = T::from_f32(interpolate_pixel(src, x, y, k, interpolation));
        });
    });

    Ok(())
}
