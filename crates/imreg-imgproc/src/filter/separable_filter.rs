use imreg_image::{Image, ImageDtype, ImageError};
use rayon::prelude::*;

/// Map an out-of-range index into `[0, n)` mirroring around the border pixel
/// (`gfedcb|abcdefgh|gfedcba`).
#[inline]
pub(crate) fn reflect_101(mut i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let n = n as isize;
    while i < 0 || i >= n {
        if i < 0 {
            i = -i;
        }
        if i >= n {
            i = 2 * (n - 1) - i;
        }
    }
    i as usize
}

/// A separable 2D filter that applies horizontal and vertical 1D convolutions sequentially.
///
/// This struct caches the kernel data and precomputed offsets for efficient filtering.
struct SeparableFilter<'a> {
    kernel_x: &'a [f32],
    kernel_y: &'a [f32],
    offsets_x: Vec<isize>,
    offsets_y: Vec<isize>,
}

impl<'a> SeparableFilter<'a> {
    fn new(kernel_x: &'a [f32], kernel_y: &'a [f32]) -> Self {
        let half_x = (kernel_x.len() / 2) as isize;
        let half_y = (kernel_y.len() / 2) as isize;

        Self {
            kernel_x,
            kernel_y,
            offsets_x: (0..kernel_x.len() as isize).map(|i| i - half_x).collect(),
            offsets_y: (0..kernel_y.len() as isize).map(|i| i - half_y).collect(),
        }
    }

    /// Horizontal pass into a f32 buffer, then vertical pass into `dst`.
    fn apply<T, U, const C: usize>(&self, src: &Image<T, C>, dst: &mut Image<U, C>)
    where
        T: ImageDtype,
        U: ImageDtype,
    {
        let (rows, cols) = (src.rows(), src.cols());
        if rows == 0 || cols == 0 {
            return;
        }

        let src_data = src.as_slice();
        let mut temp = vec![0.0f32; src_data.len()];

        // horizontal
        temp.par_chunks_exact_mut(cols * C)
            .zip(src_data.par_chunks_exact(cols * C))
            .for_each(|(temp_row, src_row)| {
                for c in 0..cols {
                    let mut acc = [0.0f32; C];
                    for (&k, &off) in self.kernel_x.iter().zip(self.offsets_x.iter()) {
                        let x = reflect_101(c as isize + off, cols);
                        for (ch, acc_val) in acc.iter_mut().enumerate() {
                            *acc_val += src_row[x * C + ch].to_f32() * k;
                        }
                    }
                    temp_row[c * C..(c + 1) * C].copy_from_slice(&acc);
                }
            });

        // vertical
        dst.as_slice_mut()
            .par_chunks_exact_mut(cols * C)
            .enumerate()
            .for_each(|(r, dst_row)| {
                for c in 0..cols {
                    let mut acc = [0.0f32; C];
                    for (&k, &off) in self.kernel_y.iter().zip(self.offsets_y.iter()) {
                        let y = reflect_101(r as isize + off, rows);
                        let base = (y * cols + c) * C;
                        for (ch, acc_val) in acc.iter_mut().enumerate() {
                            *acc_val += temp[base + ch] * k;
                        }
                    }
                    for (ch, &acc_val) in acc.iter().enumerate() {
                        dst_row[c * C + ch] = U::from_f32(acc_val);
                    }
                }
            });
    }
}

/// Apply a separable filter to an image.
///
/// Borders are handled by reflection around the edge pixel. Integer outputs are rounded
/// and saturated.
///
/// # Arguments
///
/// * `src` - The input image with shape (height, width, channels).
/// * `dst` - The output image with shape (height, width, channels).
/// * `kernel_x` - The horizontal kernel.
/// * `kernel_y` - The vertical kernel.
pub fn separable_filter<T, U, const C: usize>(
    src: &Image<T, C>,
    dst: &mut Image<U, C>,
    kernel_x: &[f32],
    kernel_y: &[f32],
) -> Result<(), ImageError>
where
    T: ImageDtype,
    U: ImageDtype,
{
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    SeparableFilter::new(kernel_x, kernel_y).apply(src, dst);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use imreg_image::ImageSize;

    #[test]
    fn test_reflect_101() {
        assert_eq!(reflect_101(-1, 5), 1);
        assert_eq!(reflect_101(-2, 5), 2);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(6, 5), 2);
        assert_eq!(reflect_101(2, 5), 2);
        assert_eq!(reflect_101(-3, 1), 0);
        assert_eq!(reflect_101(-4, 2), 0);
    }

    #[test]
    fn test_separable_filter_impulse() -> Result<(), ImageError> {
        let size = ImageSize {
            width: 5,
            height: 5,
        };

        let mut data = vec![0.0f32; 25];
        data[12] = 9.0;
        let src = Image::<f32, 1>::new(size, data)?;
        let mut dst = Image::<f32, 1>::from_size_val(size, 0.0)?;

        let kernel = [1.0 / 3.0; 3];
        separable_filter(&src, &mut dst, &kernel, &kernel)?;

        #[rustfmt::skip]
        let expected = [
            0.0, 0.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 1.0, 1.0, 0.0,
            0.0, 1.0, 1.0, 1.0, 0.0,
            0.0, 1.0, 1.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 0.0, 0.0,
        ];
        for (a, b) in dst.as_slice().iter().zip(expected.iter()) {
            approx::assert_relative_eq!(a, b, epsilon = 1e-6);
        }

        Ok(())
    }

    #[test]
    fn test_separable_filter_preserves_constant() -> Result<(), ImageError> {
        let size = ImageSize {
            width: 4,
            height: 3,
        };
        let src = Image::<u8, 2>::from_size_val(size, 42)?;
        let mut dst = Image::<u8, 2>::from_size_val(size, 0)?;

        let kernel = [0.25, 0.5, 0.25];
        separable_filter(&src, &mut dst, &kernel, &kernel)?;

        assert!(dst.as_slice().iter().all(|&v| v == 42));

        Ok(())
    }
}
