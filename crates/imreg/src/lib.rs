#![deny(missing_docs)]
//! Feature-based image registration.
//!
//! Aligns a slave image onto the frame of a master image in five stages:
//!
//! 1. both images are rescaled to 8-bit grayscale,
//! 2. keypoints are detected and described in each image,
//! 3. the descriptors are matched and filtered,
//! 4. RANSAC estimates the slave to master transform and refines it on its inliers,
//! 5. the slave image is resampled through the transform.
//!
//! [`RegistrationType::WarpAffine`] uses SIFT features with the ratio test and an affine
//! transform, [`RegistrationType::WarpPerspective`] uses ORB features with cross-checked
//! matches and a homography.
//!
//! # Example
//!
//! ```no_run
//! use imreg::{register_with_config, RegistrationConfig, RegistrationType};
//! use imreg_image::{Image, ImageSize};
//!
//! let size = ImageSize { width: 512, height: 512 };
//! let master = Image::<f32, 3>::from_size_val(size, 0.0).unwrap();
//! let slave = master.clone();
//!
//! let config = RegistrationConfig::new("warp_perspective".parse().unwrap()).with_random_seed(42);
//! let registration = register_with_config(&master, &slave, &config).unwrap();
//! println!("{:?}", registration.estimate.transform);
//! ```

mod config;
pub use config::*;

mod error;
pub use error::{ImageRole, RegistrationError};

mod register;
pub use register::*;

mod strategy;
pub use strategy::{run_strategy, Estimate, RegistrationStrategy};

#[doc(inline)]
pub use imreg_geometry as geometry;

#[doc(inline)]
pub use imreg_image as image;

#[doc(inline)]
pub use imreg_imgproc as imgproc;
