//! Feature detection, description and matching.
//!
//! This module provides algorithms for detecting distinctive points (keypoints)
//! in images and for pairing them across two images, which is the first half of a
//! feature based registration.
//!
//! # Available Extractors
//!
//! - [`OrbExtractor`]: FAST corners ranked by the Harris response, oriented by the
//!   intensity centroid and described by 256 bit rotated BRIEF strings.
//! - [`SiftExtractor`]: difference of gaussians extrema described by 128 dimensional
//!   gradient histograms.
//!
//! # Matching
//!
//! - [`match_cross_check`]: mutual nearest neighbours under the Hamming distance.
//! - [`match_ratio_test`]: nearest neighbour ratio test under the euclidean distance.
//!
//! # Example
//!
//! ```no_run
//! use imreg_image::{Image, ImageSize};
//! use imreg_imgproc::features::{match_cross_check, FeatureExtractor, OrbExtractor};
//!
//! let master = Image::<u8, 1>::from_size_val(ImageSize { width: 256, height: 256 }, 0).unwrap();
//! let slave = master.clone();
//!
//! let orb = OrbExtractor::default();
//! let master_features = orb.detect_and_compute(&master).unwrap();
//! let slave_features = orb.detect_and_compute(&slave).unwrap();
//!
//! let matches = match_cross_check(
//!     &master_features.descriptors,
//!     &slave_features.descriptors,
//!     0.9,
//! )
//! .unwrap();
//! ```

mod error;
pub use error::FeatureError;

mod types;
pub use types::*;

mod fast;
pub use fast::*;

mod responses;
pub use responses::*;

mod matching;
pub use matching::*;

mod orb;
pub use orb::{OrbConfig, OrbDescriptor, OrbExtractor};

mod sift;
pub use sift::{SiftConfig, SiftDescriptor, SiftExtractor};
