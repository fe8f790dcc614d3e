//! Geometric image transformations using affine and perspective warps.
//!
//! This module provides functions for applying 2D transformations to images:
//!
//! - Affine transformations (rotation, translation, scaling, shearing)
//! - Perspective transformations (homographies)
//!
//! The matrices passed to the warps map source coordinates to destination coordinates.
//! They are inverted internally, and every destination pixel is sampled from the source.
//! Destination pixels whose preimage falls outside of the source are set to the
//! background value `T::default()`.
//!
//! # Examples
//!
//! Translating an image by 2 pixels to the right:
//!
//! ```
//! use imreg_image::{Image, ImageSize};
//! use imreg_imgproc::interpolation::InterpolationMode;
//! use imreg_imgproc::warp::warp_affine;
//!
//! let src = Image::<u8, 1>::new(ImageSize { width: 4, height: 1 }, vec![1, 2, 3, 4]).unwrap();
//! let mut dst = Image::<u8, 1>::from_size_val(src.size(), 0).unwrap();
//!
//! warp_affine(&src, &mut dst, &[1.0, 0.0, 2.0, 0.0, 1.0, 0.0], InterpolationMode::Nearest)
//!     .unwrap();
//! assert_eq!(dst.as_slice(), &[0, 0, 1, 2]);
//! ```

mod affine;
mod perspective;

pub use affine::{get_rotation_matrix2d, invert_affine_transform, warp_affine};
pub use perspective::{inverse_perspective_matrix, warp_perspective};

use imreg_image::{Image, ImageDtype};

use crate::interpolation::{interpolate_pixel, InterpolationMode};
use crate::parallel;

/// Determinants below this magnitude are treated as singular.
const SINGULAR_EPS: f64 = 1e-12;

/// Fill `dst` by sampling `src` at the precomputed coordinates.
fn resample<T: ImageDtype, const C: usize>(
    src: &Image<T, C>,
    dst: &mut Image<T, C>,
    map_x: &[f32],
    map_y: &[f32],
    interpolation: InterpolationMode,
) {
    let (cols, rows) = (src.cols() as f32, src.rows() as f32);

    parallel::par_iter_rows_resample(dst, map_x, map_y, |&x, &y, dst_pixel| {
        // check if the position is within the bounds of the src image
        if x >= 0.0 && x < cols && y >= 0.0 && y < rows {
            dst_pixel.iter_mut().enumerate().for_each(|(k, pixel)| {
                *pixel = T::from_f32(interpolate_pixel(src, x, y, k, interpolation))
            });
        } else {
            dst_pixel.fill(T::default());
        }
    });
}
