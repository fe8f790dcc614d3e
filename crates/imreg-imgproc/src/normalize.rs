//! Intensity normalization operations.
//!
//! Feature detectors expect a single-channel 8-bit image whose full dynamic range is
//! used, independently of the sensor range of the input. [`normalize_to_gray8`] maps any
//! numeric image into that representation:
//!
//! ```text
//! gray = round(luminance((pixel - min) * 255 / (max - min)))
//! ```
//!
//! where `min` and `max` are taken over the color channels of every pixel, alpha excluded.
//!
//! # Example
//!
//! ```
//! use imreg_image::{Image, ImageSize};
//! use imreg_imgproc::normalize::normalize_to_gray8;
//!
//! let image = Image::<u16, 1>::new(
//!     ImageSize { width: 3, height: 1 },
//!     vec![1000, 1500, 2000],
//! ).unwrap();
//!
//! let mut gray = Image::<u8, 1>::from_size_val(image.size(), 0).unwrap();
//! normalize_to_gray8(&image, &mut gray).unwrap();
//!
//! assert_eq!(gray.as_slice(), &[0, 128, 255]);
//! ```

use imreg_image::{Image, ImageDtype, ImageError};

use crate::{color::luminance, parallel};

/// Errors produced while normalizing an image for feature extraction.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum NormalizeError {
    /// All samples of the image share the same value, the rescale is undefined.
    #[error("Image has constant intensity {value}, cannot rescale its range")]
    DegenerateInput {
        /// The constant sample value.
        value: f64,
    },

    /// The image holds NaN or infinite samples.
    #[error("Image contains a non-finite sample")]
    NonFiniteSample,

    /// Error from the image container.
    #[error(transparent)]
    Image(#[from] ImageError),
}

/// Find the minimum and maximum values over the first `num_channels` channels of an image.
///
/// # Errors
///
/// If the image has no samples or `num_channels` is not in `[1, C]`, an error is returned.
///
/// # Example
///
/// ```
/// use imreg_image::{Image, ImageSize};
/// use imreg_imgproc::normalize::find_min_max;
///
/// let image_data = vec![0u8, 1, 9, 1, 2, 3, 0, 1, 9, 1, 2, 3];
/// let image = Image::<u8, 3>::new(
///     ImageSize {
///         width: 2,
///         height: 2,
///     },
///     image_data,
/// )
/// .unwrap();
///
/// assert_eq!(find_min_max(&image, 3).unwrap(), (0, 9));
/// assert_eq!(find_min_max(&image, 2).unwrap(), (0, 2));
/// ```
pub fn find_min_max<T, const C: usize>(
    image: &Image<T, C>,
    num_channels: usize,
) -> Result<(T, T), ImageError>
where
    T: Copy + PartialOrd,
{
    if num_channels == 0 || num_channels > C {
        return Err(ImageError::ChannelIndexOutOfBounds(num_channels, C));
    }

    let mut samples = image
        .as_slice()
        .chunks_exact(C)
        .flat_map(|pixel| &pixel[..num_channels]);

    let first_element = match samples.next() {
        Some(x) => x,
        None => return Err(ImageError::EmptyImage(image.width(), image.height())),
    };

    let mut min = first_element;
    let mut max = first_element;

    for x in samples {
        if x < min {
            min = x;
        }
        if x > max {
            max = x;
        }
    }

    Ok((*min, *max))
}

/// Number of leading channels carrying intensity, 3 for RGB(A) and 1 for gray(+alpha).
fn intensity_channels<const C: usize>() -> usize {
    if C >= 3 {
        3
    } else {
        1
    }
}

/// Rescale an image of any numeric type and channel count into an 8-bit grayscale image.
///
/// The minimum over the intensity channels maps to 0 and their maximum to 255. Images with
/// three or more channels are treated as RGB(A) and reduced to luminance after the rescale,
/// two-channel images as gray + alpha. Alpha never takes part in the range.
///
/// # Arguments
///
/// * `src` - The input image of shape (height, width, C).
/// * `dst` - The output grayscale image of shape (height, width, 1).
///
/// # Errors
///
/// * [`NormalizeError::DegenerateInput`] when the image is constant.
/// * [`NormalizeError::NonFiniteSample`] when a sample is NaN or infinite.
/// * [`NormalizeError::Image`] when the image is empty or the sizes differ.
pub fn normalize_to_gray8<T, const C: usize>(
    src: &Image<T, C>,
    dst: &mut Image<u8, 1>,
) -> Result<(), NormalizeError>
where
    T: ImageDtype,
{
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        )
        .into());
    }

    if C == 0 {
        return Err(ImageError::EmptyImage(src.width(), src.height()).into());
    }

    let channels = intensity_channels::<C>();
    if src
        .as_slice()
        .chunks_exact(C)
        .flat_map(|pixel| &pixel[..channels])
        .any(|v| !v.to_f64().is_finite())
    {
        return Err(NormalizeError::NonFiniteSample);
    }

    let (min_val, max_val) = find_min_max(src, channels)?;
    let (min_val, max_val) = (min_val.to_f64(), max_val.to_f64());

    if max_val <= min_val {
        log::warn!("cannot normalize a constant image (value {min_val})");
        return Err(NormalizeError::DegenerateInput { value: min_val });
    }

    let scale = 255.0 / (max_val - min_val);
    let rescale = |v: T| (v.to_f64() - min_val) * scale;

    parallel::par_iter_rows(src, dst, |src_pixel, dst_pixel| {
        let gray = if C >= 3 {
            luminance(
                rescale(src_pixel[0]),
                rescale(src_pixel[1]),
                rescale(src_pixel[2]),
            )
        } else {
            rescale(src_pixel[0])
        };
        dst_pixel[0] = gray.round().clamp(0.0, 255.0) as u8;
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::NormalizeError;
    use imreg_image::{Image, ImageError, ImageSize};

    #[test]
    fn find_min_max() -> Result<(), ImageError> {
        let image_data = vec![0u8, 1, 0, 1, 2, 3, 0, 1, 0, 1, 2, 3];
        let image = Image::<u8, 3>::new(
            ImageSize {
                width: 2,
                height: 2,
            },
            image_data,
        )?;

        let (min, max) = super::find_min_max(&image, 3)?;

        assert_eq!(min, 0);
        assert_eq!(max, 3);
        assert_eq!(super::find_min_max(&image, 1)?, (0, 1));
        assert!(super::find_min_max(&image, 4).is_err());

        Ok(())
    }

    #[test]
    fn find_min_max_empty() -> Result<(), ImageError> {
        let image = Image::<u8, 1>::new(
            ImageSize {
                width: 0,
                height: 0,
            },
            vec![],
        )?;
        assert_eq!(
            super::find_min_max(&image, 1),
            Err(ImageError::EmptyImage(0, 0))
        );
        Ok(())
    }

    #[test]
    fn normalize_to_gray8_full_range() -> Result<(), NormalizeError> {
        let image = Image::<f64, 1>::new(
            ImageSize {
                width: 4,
                height: 2,
            },
            vec![-3.5, -1.0, 0.0, 2.25, 7.0, 11.0, 4.5, -2.0],
        )?;

        let mut gray = Image::<u8, 1>::from_size_val(image.size(), 0)?;
        super::normalize_to_gray8(&image, &mut gray)?;

        assert_eq!(gray.num_channels(), 1);
        assert_eq!(gray.as_slice().iter().min(), Some(&0));
        assert_eq!(gray.as_slice().iter().max(), Some(&255));
        // -1.0 -> (2.5 / 14.5) * 255
        assert_eq!(gray.as_slice()[1], 44);

        Ok(())
    }

    #[test]
    fn normalize_to_gray8_rgb() -> Result<(), NormalizeError> {
        let image = Image::<u16, 3>::new(
            ImageSize {
                width: 3,
                height: 1,
            },
            vec![0, 0, 0, 4095, 4095, 4095, 4095, 0, 0],
        )?;

        let mut gray = Image::<u8, 1>::from_size_val(image.size(), 0)?;
        super::normalize_to_gray8(&image, &mut gray)?;

        assert_eq!(gray.as_slice(), &[0, 255, 76]);

        Ok(())
    }

    #[test]
    fn normalize_to_gray8_ignores_alpha() -> Result<(), NormalizeError> {
        let image = Image::<u8, 4>::new(
            ImageSize {
                width: 2,
                height: 1,
            },
            vec![10, 10, 10, 255, 20, 20, 20, 255],
        )?;

        let mut gray = Image::<u8, 1>::from_size_val(image.size(), 0)?;
        super::normalize_to_gray8(&image, &mut gray)?;

        // the opaque alpha does not widen the range
        assert_eq!(gray.as_slice(), &[0, 255]);

        Ok(())
    }

    #[test]
    fn normalize_to_gray8_gray_alpha() -> Result<(), NormalizeError> {
        let size = ImageSize {
            width: 3,
            height: 1,
        };

        let image = Image::<u16, 2>::new(size, vec![100, 0, 300, 65535, 150, 7])?;
        let mut gray = Image::<u8, 1>::from_size_val(size, 0)?;
        super::normalize_to_gray8(&image, &mut gray)?;
        assert_eq!(gray.as_slice(), &[0, 255, 64]);

        // a varying alpha over a constant gray is still a constant image
        let image = Image::<u16, 2>::new(size, vec![100, 0, 100, 65535, 100, 7])?;
        assert_eq!(
            super::normalize_to_gray8(&image, &mut gray),
            Err(NormalizeError::DegenerateInput { value: 100.0 })
        );

        Ok(())
    }

    #[test]
    fn normalize_to_gray8_constant() -> Result<(), ImageError> {
        let image = Image::<f32, 1>::from_size_val(
            ImageSize {
                width: 3,
                height: 3,
            },
            0.5,
        )?;
        let mut gray = Image::<u8, 1>::from_size_val(image.size(), 0)?;

        assert_eq!(
            super::normalize_to_gray8(&image, &mut gray),
            Err(NormalizeError::DegenerateInput { value: 0.5 })
        );

        Ok(())
    }

    #[test]
    fn normalize_to_gray8_non_finite() -> Result<(), ImageError> {
        let image = Image::<f32, 1>::new(
            ImageSize {
                width: 3,
                height: 1,
            },
            vec![0.0, f32::NAN, 1.0],
        )?;
        let mut gray = Image::<u8, 1>::from_size_val(image.size(), 0)?;

        assert_eq!(
            super::normalize_to_gray8(&image, &mut gray),
            Err(NormalizeError::NonFiniteSample)
        );

        Ok(())
    }
}
