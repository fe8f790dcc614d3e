use imreg_image::{Image, ImageError, ImageSize};
use rayon::prelude::*;

use crate::filter::{gaussian_blur, sobel};

/// Dense Harris corner response.
///
/// The structure tensor is built from Sobel gradients and averaged with a gaussian window,
/// the response is `det(M) - k * trace(M)^2`.
pub struct HarrisResponse {
    image_size: ImageSize,
    k: f32,
    window_sigma: f32,
}

impl HarrisResponse {
    /// Create a response operator for images of the given size, with `k = 0.04`.
    pub fn new(image_size: ImageSize) -> Self {
        Self {
            image_size,
            k: 0.04,
            window_sigma: 1.0,
        }
    }

    /// Set the sensitivity factor `k`.
    pub fn with_k(mut self, k: f32) -> Self {
        self.k = k;
        self
    }

    /// Set the sigma of the gaussian integration window.
    pub fn with_window_sigma(mut self, sigma: f32) -> Self {
        self.window_sigma = sigma;
        self
    }

    /// Compute the response of `src` into `dst`.
    ///
    /// # Errors
    ///
    /// Both images must have the size given at construction.
    pub fn compute(&self, src: &Image<u8, 1>, dst: &mut Image<f32, 1>) -> Result<(), ImageError> {
        for size in [src.size(), dst.size()] {
            if size != self.image_size {
                return Err(ImageError::InvalidImageSize(
                    size.width,
                    size.height,
                    self.image_size.width,
                    self.image_size.height,
                ));
            }
        }

        let mut dx = Image::<f32, 1>::from_size_val(self.image_size, 0.0)?;
        let mut dy = Image::<f32, 1>::from_size_val(self.image_size, 0.0)?;
        sobel(src, &mut dx, &mut dy)?;

        // filter normalization, the sobel kernels sum to 8 in absolute value
        let norm = 1.0 / (8.0 * 255.0);
        let mut tensor = Image::<f32, 3>::from_size_val(self.image_size, 0.0)?;
        tensor
            .as_slice_mut()
            .par_chunks_exact_mut(3)
            .zip(dx.as_slice().par_iter().zip(dy.as_slice().par_iter()))
            .for_each(|(t, (&gx, &gy))| {
                let (gx, gy) = (gx * norm, gy * norm);
                t[0] = gx * gx;
                t[1] = gy * gy;
                t[2] = gx * gy;
            });

        let mut tensor_blurred = Image::<f32, 3>::from_size_val(self.image_size, 0.0)?;
        gaussian_blur(&tensor, &mut tensor_blurred, self.window_sigma)?;

        let k = self.k;
        dst.as_slice_mut()
            .par_iter_mut()
            .zip(tensor_blurred.as_slice().par_chunks_exact(3))
            .for_each(|(r, t)| {
                let det = t[0] * t[1] - t[2] * t[2];
                let trace = t[0] + t[1];
                *r = det - k * trace * trace;
            });

        Ok(())
    }
}
