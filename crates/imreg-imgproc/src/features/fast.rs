use imreg_image::Image;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::FeatureError;

/// Offsets (dx, dy) of the 16 pixel Bresenham circle of radius 3, clockwise from the top.
const CIRCLE: [(i32, i32); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

/// A FAST corner with its integer position and score.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FastCorner {
    /// Column of the corner.
    pub x: usize,
    /// Row of the corner.
    pub y: usize,
    /// Sum of absolute differences of the arc pixels beyond the threshold.
    pub score: i32,
}

// Stronger scores first, ties broken by raster order so that the suppression result
// only depends on the image content.
impl Ord for FastCorner {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .cmp(&other.score)
            .then_with(|| other.y.cmp(&self.y))
            .then_with(|| other.x.cmp(&self.x))
    }
}

impl PartialOrd for FastCorner {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Whether the 16 bit circular mask holds a run of at least `arc_length` set bits.
fn has_arc(mask: u16, arc_length: u32) -> bool {
    if mask.count_ones() < arc_length {
        return false;
    }
    // unroll the circle so that runs crossing the start are contiguous
    let doubled = (mask as u32) | ((mask as u32) << 16);
    let mut run = 0;
    for i in 0..32 {
        if doubled & (1 << i) != 0 {
            run += 1;
            if run >= arc_length {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

/// Segment test and score of a single pixel. Returns `None` if it is not a corner.
fn fast_corner_score(
    src: &[u8],
    cols: usize,
    x: usize,
    y: usize,
    threshold: u8,
    arc_length: u32,
) -> Option<i32> {
    let center = src[y * cols + x];
    let lower = center.saturating_sub(threshold);
    let upper = center.saturating_add(threshold);

    let mut bright_mask = 0u16;
    let mut dark_mask = 0u16;
    let mut bright_sum = 0i32;
    let mut dark_sum = 0i32;

    for (i, &(dx, dy)) in CIRCLE.iter().enumerate() {
        let px = (x as i32 + dx) as usize;
        let py = (y as i32 + dy) as usize;
        let p = src[py * cols + px];
        if p > upper {
            bright_mask |= 1 << i;
            bright_sum += (p - center) as i32 - threshold as i32;
        } else if p < lower {
            dark_mask |= 1 << i;
            dark_sum += (center - p) as i32 - threshold as i32;
        }
    }

    let bright = has_arc(bright_mask, arc_length);
    let dark = has_arc(dark_mask, arc_length);

    match (bright, dark) {
        (false, false) => None,
        (true, false) => Some(bright_sum),
        (false, true) => Some(dark_sum),
        (true, true) => Some(bright_sum.max(dark_sum)),
    }
}

/// Fast feature detector with optional Non-Maximum Suppression (NMS)
///
/// # Arguments
///
/// * `src` - The source image as Gray8 image.
/// * `threshold` - The intensity difference to the center pixel for a circle pixel to
///   count as brighter or darker.
/// * `arc_length` - The total number of consecutive pixels in the Bresenham circle that
///   must be brighter or darker than the center pixel.
/// * `nms` - Keep only corners whose score is maximal in their 3x3 neighbourhood.
///
/// # Returns
///
/// The detected corners, strongest first when NMS is enabled, in raster order otherwise.
///
/// # Errors
///
/// Fails if `arc_length` is not in `[1, 16]`.
pub fn fast_feature_detector(
    src: &Image<u8, 1>,
    threshold: u8,
    arc_length: u8,
    nms: bool,
) -> Result<Vec<FastCorner>, FeatureError> {
    if arc_length == 0 || arc_length > 16 {
        return Err(FeatureError::InvalidConfig(format!(
            "FAST arc length must be in [1, 16], got {arc_length}"
        )));
    }

    let (cols, rows) = (src.cols(), src.rows());
    if cols < 7 || rows < 7 {
        return Ok(vec![]);
    }

    let data = src.as_slice();
    let arc_length = arc_length as u32;

    // process rows in parallel
    let corners: Vec<FastCorner> = (3..rows - 3)
        .into_par_iter()
        .flat_map_iter(|y| {
            (3..cols - 3).filter_map(move |x| {
                fast_corner_score(data, cols, x, y, threshold, arc_length)
                    .map(|score| FastCorner { x, y, score })
            })
        })
        .collect();

    if !nms {
        return Ok(corners);
    }

    let mut heap = BinaryHeap::from(corners);
    let mut suppressed = vec![false; rows * cols];
    let mut kept = Vec::new();

    while let Some(corner) = heap.pop() {
        if suppressed[corner.y * cols + corner.x] {
            continue;
        }
        kept.push(corner);

        // corners never lie on the first or last 3 rows and cols
        for ny in corner.y - 1..=corner.y + 1 {
            for nx in corner.x - 1..=corner.x + 1 {
                suppressed[ny * cols + nx] = true;
            }
        }
    }

    Ok(kept)
}
