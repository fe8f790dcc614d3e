#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// affine transform estimation module.
pub mod affine;

/// Error types for the geometry module.
pub mod error;

/// homography estimation module.
pub mod homography;

/// small dense linear algebra utilities.
pub mod linalg;

/// transform models and their common representation.
pub mod model;

/// robust estimation with random sample consensus.
pub mod ransac;

pub use affine::{affine_3pt2d, affine_lstsq, Affine2};
pub use error::GeometryError;
pub use homography::{homography_4pt2d, homography_dlt, Homography};
pub use model::{TransformMatrix, TransformModel};
pub use ransac::{ransac, RansacParams, RansacResult};
