use rayon::prelude::*;

use super::{Correspondence, FeatureError};

/// Hamming distance between two fixed-size byte descriptors.
#[inline]
pub fn hamming_distance(a: &[u8], b: &[u8]) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x ^ y).count_ones())
        .sum()
}

/// Euclidean distance between two float descriptors.
#[inline]
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Index and distance of the nearest candidate, the first one wins on ties.
fn nearest<D>(query: &D, candidates: &[D], distance: impl Fn(&D, &D) -> u32) -> Option<(usize, u32)> {
    candidates
        .iter()
        .enumerate()
        .map(|(j, c)| (j, distance(query, c)))
        .min_by_key(|&(j, d)| (d, j))
}

/// Configuration of the cross-check matcher.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CrossCheckConfig {
    /// Fraction of the mutual matches kept after sorting them by distance, in `[0, 1]`.
    pub keep_fraction: f32,
}

impl Default for CrossCheckConfig {
    fn default() -> Self {
        Self { keep_fraction: 0.9 }
    }
}

impl CrossCheckConfig {
    /// Check that the keep fraction lies in `[0, 1]`.
    pub fn validate(&self) -> Result<(), FeatureError> {
        if !(0.0..=1.0).contains(&self.keep_fraction) {
            return Err(FeatureError::InvalidConfig(format!(
                "keep_fraction must be in [0, 1], got {}",
                self.keep_fraction
            )));
        }
        Ok(())
    }
}

/// Configuration of the ratio test matcher.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RatioTestConfig {
    /// Maximum ratio between the best and the second best distance, in `(0, 1]`.
    pub ratio: f32,
}

impl Default for RatioTestConfig {
    fn default() -> Self {
        Self { ratio: 0.8 }
    }
}

impl RatioTestConfig {
    /// Check that the ratio lies in `(0, 1]`.
    pub fn validate(&self) -> Result<(), FeatureError> {
        if !(self.ratio > 0.0 && self.ratio <= 1.0) {
            return Err(FeatureError::InvalidConfig(format!(
                "ratio must be in (0, 1], got {}",
                self.ratio
            )));
        }
        Ok(())
    }
}

/// Match binary descriptors keeping only mutual nearest neighbours.
///
/// For each master descriptor the nearest slave descriptor under the Hamming distance is
/// found, the pair is kept only if the master descriptor is in turn the nearest one of that
/// slave descriptor. The mutual matches are sorted by increasing distance and the leading
/// `floor(len * keep_fraction)` are returned.
///
/// # Arguments
///
/// * `master` - Descriptors of the master image.
/// * `slave` - Descriptors of the slave image.
/// * `keep_fraction` - Fraction of the sorted matches to keep, in `[0, 1]`.
///
/// # Errors
///
/// Fails with [`FeatureError::InvalidConfig`] if `keep_fraction` is outside `[0, 1]`.
///
/// # Example
///
/// ```
/// use imreg_imgproc::features::match_cross_check;
///
/// let master = [[0u8; 32], [255u8; 32]];
/// let slave = [[255u8; 32], [1u8; 32]];
///
/// let matches = match_cross_check(&master, &slave, 1.0).unwrap();
/// assert_eq!(matches.len(), 2);
/// assert_eq!((matches[0].master_idx, matches[0].slave_idx), (1, 0));
/// assert_eq!((matches[1].master_idx, matches[1].slave_idx), (0, 1));
/// ```
pub fn match_cross_check<const N: usize>(
    master: &[[u8; N]],
    slave: &[[u8; N]],
    keep_fraction: f32,
) -> Result<Vec<Correspondence>, FeatureError> {
    CrossCheckConfig { keep_fraction }.validate()?;

    if master.is_empty() || slave.is_empty() {
        return Ok(vec![]);
    }

    let hamming = |a: &[u8; N], b: &[u8; N]| hamming_distance(a, b);

    // forward pass: for each master descriptor, its nearest slave descriptor
    let forward: Vec<Option<(usize, u32)>> = master
        .par_iter()
        .map(|d| nearest(d, slave, hamming))
        .collect();

    // reverse pass: for each slave descriptor, its nearest master descriptor
    let reverse: Vec<Option<(usize, u32)>> = slave
        .par_iter()
        .map(|d| nearest(d, master, hamming))
        .collect();

    let mut matches: Vec<Correspondence> = forward
        .iter()
        .enumerate()
        .filter_map(|(i, fwd)| {
            let (j, distance) = (*fwd)?;
            match reverse[j] {
                Some((back, _)) if back == i => Some(Correspondence {
                    master_idx: i,
                    slave_idx: j,
                    distance: distance as f32,
                }),
                _ => None,
            }
        })
        .collect();

    // stable, equal distances keep the master order
    matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));

    // the fraction only carries f32 precision, 0.9f32 is slightly below 0.9
    let keep = (matches.len() as f64 * keep_fraction as f64 * (1.0 + f32::EPSILON as f64))
        .floor() as usize;
    matches.truncate(keep.min(matches.len()));

    Ok(matches)
}

/// Match float descriptors with the nearest neighbour distance ratio test.
///
/// For each master descriptor the two nearest slave descriptors are found under the
/// euclidean distance, the nearest one is kept if `best <= ratio * second_best`. With fewer
/// than two slave descriptors the test cannot be evaluated and no match is produced.
///
/// # Arguments
///
/// * `master` - Descriptors of the master image.
/// * `slave` - Descriptors of the slave image.
/// * `ratio` - Maximum distance ratio, in `(0, 1]`.
///
/// # Returns
///
/// The accepted matches in master order.
///
/// # Errors
///
/// Fails with [`FeatureError::InvalidConfig`] if `ratio` is outside `(0, 1]`.
pub fn match_ratio_test<const N: usize>(
    master: &[[f32; N]],
    slave: &[[f32; N]],
    ratio: f32,
) -> Result<Vec<Correspondence>, FeatureError> {
    RatioTestConfig { ratio }.validate()?;

    if slave.len() < 2 {
        return Ok(vec![]);
    }

    let matches = master
        .par_iter()
        .enumerate()
        .filter_map(|(i, d)| {
            let mut best = (0usize, f32::INFINITY);
            let mut second = f32::INFINITY;

            for (j, s) in slave.iter().enumerate() {
                let dist = euclidean_distance(d, s);
                if dist < best.1 {
                    second = best.1;
                    best = (j, dist);
                } else if dist < second {
                    second = dist;
                }
            }

            (best.1 <= ratio * second).then_some(Correspondence {
                master_idx: i,
                slave_idx: best.0,
                distance: best.1,
            })
        })
        .collect();

    Ok(matches)
}

/// Check that at least `required` matches are available.
///
/// # Errors
///
/// Fails with [`FeatureError::InsufficientMatches`] otherwise.
pub fn ensure_min_matches(
    matches: &[Correspondence],
    required: usize,
) -> Result<(), FeatureError> {
    if matches.len() < required {
        log::warn!(
            "only {} matches survived the filters, {} required",
            matches.len(),
            required
        );
        return Err(FeatureError::InsufficientMatches {
            required,
            actual: matches.len(),
        });
    }
    Ok(())
}
