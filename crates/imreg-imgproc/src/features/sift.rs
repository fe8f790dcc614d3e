use std::f32::consts::PI;

use imreg_image::{ops::cast_and_scale, Image, ImageSize};
use rayon::prelude::*;

use super::{FeatureError, FeatureExtractor, Features, Keypoint};
use crate::filter::gaussian_blur;

/// A 128 dimensional gradient histogram descriptor.
pub type SiftDescriptor = [f32; 128];

/// Blur assumed to be already present in the input image.
const SIFT_INIT_SIGMA: f32 = 0.5;
/// Width of the border in which extrema are ignored.
const SIFT_IMG_BORDER: usize = 5;
/// Maximum number of sub-pixel refinement steps.
const SIFT_MAX_INTERP_STEPS: usize = 5;
/// Number of bins of the orientation histogram.
const SIFT_ORI_HIST_BINS: usize = 36;
/// Gaussian weighting of the orientation window, relative to the keypoint scale.
const SIFT_ORI_SIG_FCTR: f32 = 1.5;
/// Radius of the orientation window, relative to the keypoint scale.
const SIFT_ORI_RADIUS: f32 = 3.0 * SIFT_ORI_SIG_FCTR;
/// Secondary orientation peaks above this ratio of the maximum spawn a keypoint.
const SIFT_ORI_PEAK_RATIO: f32 = 0.8;
/// Number of spatial cells along each side of the descriptor.
const SIFT_DESCR_WIDTH: usize = 4;
/// Number of orientation bins of each descriptor cell.
const SIFT_DESCR_HIST_BINS: usize = 8;
/// Width of a descriptor cell, relative to the keypoint scale.
const SIFT_DESCR_SCL_FCTR: f32 = 3.0;
/// Descriptor entries are clamped to this value before renormalization.
const SIFT_DESCR_MAG_THR: f32 = 0.2;

/// Configuration of the [`SiftExtractor`].
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SiftConfig {
    /// Number of layers per octave in which extrema are searched.
    pub n_octave_layers: usize,
    /// Minimum absolute difference of gaussians value of a keypoint, for intensities in
    /// `[0, 1]`.
    pub contrast_threshold: f32,
    /// Maximum ratio of principal curvatures, larger values keep more edge like points.
    pub edge_threshold: f32,
    /// Sigma of the first scale of every octave.
    pub sigma: f32,
    /// Upper bound on the number of octaves, derived from the image size if unset.
    pub max_octaves: Option<usize>,
}

impl Default for SiftConfig {
    fn default() -> Self {
        Self {
            n_octave_layers: 3,
            contrast_threshold: 0.04,
            edge_threshold: 10.0,
            sigma: 1.6,
            max_octaves: None,
        }
    }
}

impl SiftConfig {
    /// Check that every value is in its valid range.
    pub fn validate(&self) -> Result<(), FeatureError> {
        if self.n_octave_layers == 0 {
            return Err(FeatureError::InvalidConfig(
                "n_octave_layers must be positive".into(),
            ));
        }
        if !(self.contrast_threshold.is_finite() && self.contrast_threshold > 0.0) {
            return Err(FeatureError::InvalidConfig(format!(
                "contrast_threshold must be positive, got {}",
                self.contrast_threshold
            )));
        }
        if !(self.edge_threshold.is_finite() && self.edge_threshold > 0.0) {
            return Err(FeatureError::InvalidConfig(format!(
                "edge_threshold must be positive, got {}",
                self.edge_threshold
            )));
        }
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(FeatureError::InvalidConfig(format!(
                "sigma must be positive, got {}",
                self.sigma
            )));
        }
        if self.max_octaves == Some(0) {
            return Err(FeatureError::InvalidConfig(
                "max_octaves must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Scale invariant feature transform extractor.
///
/// Keypoints are the refined extrema of a difference of gaussians scale space. Each one
/// receives a dominant orientation (or several) from a histogram of gradient directions and
/// a descriptor made of 4x4 histograms of 8 gradient orientations.
#[derive(Debug, Clone, Default)]
pub struct SiftExtractor {
    config: SiftConfig,
}

/// Gaussian and difference of gaussians images of one octave.
struct Octave {
    gauss: Vec<Image<f32, 1>>,
    dog: Vec<Image<f32, 1>>,
}

/// A refined scale space extremum, in the coordinates of its octave.
#[derive(Clone, Copy)]
struct Extremum {
    octave: usize,
    layer: usize,
    row: usize,
    col: usize,
    // sub-pixel position in octave coordinates
    x: f32,
    y: f32,
    // scale in octave coordinates
    scale: f32,
    response: f32,
}

#[inline]
fn at(image: &Image<f32, 1>, row: usize, col: usize) -> f32 {
    image.as_slice()[row * image.cols() + col]
}

/// Keep the even rows and columns.
fn downsample(src: &Image<f32, 1>) -> Result<Image<f32, 1>, FeatureError> {
    let size = ImageSize {
        width: src.width() / 2,
        height: src.height() / 2,
    };
    let data = (0..size.height)
        .flat_map(|r| (0..size.width).map(move |c| at(src, 2 * r, 2 * c)))
        .collect();
    Ok(Image::new(size, data)?)
}

/// Solve the 3x3 system `h * x = b` with Cramer's rule.
fn solve3x3(h: &[[f32; 3]; 3], b: &[f32; 3]) -> Option<[f32; 3]> {
    let det = |m: &[[f32; 3]; 3]| {
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    };

    let d = det(h);
    if !d.is_finite() || d.abs() < f32::EPSILON * 1e-3 {
        return None;
    }

    let mut x = [0.0; 3];
    for (k, xk) in x.iter_mut().enumerate() {
        let mut m = *h;
        for i in 0..3 {
            m[i][k] = b[i];
        }
        *xk = det(&m) / d;
    }
    Some(x)
}

impl SiftExtractor {
    /// Create an extractor after validating the configuration.
    pub fn new(config: SiftConfig) -> Result<Self, FeatureError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The configuration of the extractor.
    pub fn config(&self) -> &SiftConfig {
        &self.config
    }

    fn num_octaves(&self, size: ImageSize) -> usize {
        let min_side = size.width.min(size.height).max(1) as f32;
        let n = (min_side.log2().floor() as i64 - 2).max(1) as usize;
        match self.config.max_octaves {
            Some(max) => n.min(max),
            None => n,
        }
    }

    fn build_scale_space(&self, image: &Image<u8, 1>) -> Result<Vec<Octave>, FeatureError> {
        let s = self.config.n_octave_layers;
        let sigma = self.config.sigma;

        // incremental blur between consecutive layers
        let k = 2f32.powf(1.0 / s as f32);
        let sigmas: Vec<f32> = (0..s + 3)
            .map(|i| {
                if i == 0 {
                    return sigma;
                }
                let prev = k.powi(i as i32 - 1) * sigma;
                let total = prev * k;
                (total * total - prev * prev).sqrt()
            })
            .collect();

        let mut gray = Image::<f32, 1>::from_size_val(image.size(), 0.0)?;
        cast_and_scale(image, &mut gray, 1.0 / 255.0)?;

        let base_sigma = (sigma * sigma - SIFT_INIT_SIGMA * SIFT_INIT_SIGMA)
            .max(0.01)
            .sqrt();
        let mut base = Image::<f32, 1>::from_size_val(image.size(), 0.0)?;
        gaussian_blur(&gray, &mut base, base_sigma)?;

        let n_octaves = self.num_octaves(image.size());
        let mut octaves: Vec<Octave> = Vec::with_capacity(n_octaves);

        for o in 0..n_octaves {
            let first = match octaves.last() {
                None => base.clone(),
                Some(prev) => downsample(&prev.gauss[s])?,
            };
            if first.width() < 2 * SIFT_IMG_BORDER + 3 || first.height() < 2 * SIFT_IMG_BORDER + 3
            {
                break;
            }

            let mut gauss = Vec::with_capacity(s + 3);
            gauss.push(first);
            for &sig in &sigmas[1..] {
                let prev = &gauss[gauss.len() - 1];
                let mut next = Image::<f32, 1>::from_size_val(prev.size(), 0.0)?;
                gaussian_blur(prev, &mut next, sig)?;
                gauss.push(next);
            }

            let dog = gauss
                .windows(2)
                .map(|pair| {
                    let data = pair[1]
                        .as_slice()
                        .iter()
                        .zip(pair[0].as_slice())
                        .map(|(a, b)| a - b)
                        .collect();
                    Image::new(pair[0].size(), data)
                })
                .collect::<Result<Vec<_>, _>>()?;

            log::trace!(
                "sift: octave {o} of size {}x{}",
                gauss[0].width(),
                gauss[0].height()
            );
            octaves.push(Octave { gauss, dog });
        }

        Ok(octaves)
    }

    /// Whether `dog[layer][row, col]` is an extremum of its 26 scale space neighbours.
    fn is_extremum(dog: &[Image<f32, 1>], layer: usize, row: usize, col: usize) -> bool {
        let val = at(&dog[layer], row, col);
        let neighbours = (layer - 1..=layer + 1).flat_map(|l| {
            (row - 1..=row + 1).flat_map(move |r| (col - 1..=col + 1).map(move |c| (l, r, c)))
        });

        if val > 0.0 {
            neighbours.into_iter().all(|(l, r, c)| val >= at(&dog[l], r, c))
        } else {
            neighbours.into_iter().all(|(l, r, c)| val <= at(&dog[l], r, c))
        }
    }

    /// Interpolate the extremum location with a quadratic fit and reject unstable points.
    fn refine(
        &self,
        octave: usize,
        dog: &[Image<f32, 1>],
        layer: usize,
        row: usize,
        col: usize,
    ) -> Option<Extremum> {
        let s = self.config.n_octave_layers;
        let (rows, cols) = (dog[0].rows(), dog[0].cols());
        let (mut layer, mut row, mut col) = (layer, row, col);

        let derivatives = |layer: usize, row: usize, col: usize| {
            let (prev, img, next) = (&dog[layer - 1], &dog[layer], &dog[layer + 1]);
            let v = at(img, row, col);

            let gradient = [
                (at(img, row, col + 1) - at(img, row, col - 1)) * 0.5,
                (at(img, row + 1, col) - at(img, row - 1, col)) * 0.5,
                (at(next, row, col) - at(prev, row, col)) * 0.5,
            ];

            let dxx = at(img, row, col + 1) + at(img, row, col - 1) - 2.0 * v;
            let dyy = at(img, row + 1, col) + at(img, row - 1, col) - 2.0 * v;
            let dss = at(next, row, col) + at(prev, row, col) - 2.0 * v;
            let dxy = (at(img, row + 1, col + 1) - at(img, row + 1, col - 1)
                - at(img, row - 1, col + 1)
                + at(img, row - 1, col - 1))
                * 0.25;
            let dxs = (at(next, row, col + 1) - at(next, row, col - 1) - at(prev, row, col + 1)
                + at(prev, row, col - 1))
                * 0.25;
            let dys = (at(next, row + 1, col) - at(next, row - 1, col) - at(prev, row + 1, col)
                + at(prev, row - 1, col))
                * 0.25;

            let hessian = [[dxx, dxy, dxs], [dxy, dyy, dys], [dxs, dys, dss]];
            (v, gradient, hessian)
        };

        let mut offset = [0.0f32; 3];
        let mut converged = false;

        for _ in 0..SIFT_MAX_INTERP_STEPS {
            let (_, gradient, hessian) = derivatives(layer, row, col);
            let x = solve3x3(&hessian, &gradient)?;
            offset = [-x[0], -x[1], -x[2]];

            if offset.iter().all(|v| v.abs() < 0.5) {
                converged = true;
                break;
            }
            if offset.iter().any(|v| v.abs() > (cols + rows) as f32) {
                return None;
            }

            let new_col = col as i64 + offset[0].round() as i64;
            let new_row = row as i64 + offset[1].round() as i64;
            let new_layer = layer as i64 + offset[2].round() as i64;

            let border = SIFT_IMG_BORDER as i64;
            if new_layer < 1
                || new_layer > s as i64
                || new_col < border
                || new_col >= cols as i64 - border
                || new_row < border
                || new_row >= rows as i64 - border
            {
                return None;
            }

            (layer, row, col) = (new_layer as usize, new_row as usize, new_col as usize);
        }

        if !converged {
            return None;
        }

        let (v, gradient, hessian) = derivatives(layer, row, col);

        let t = gradient[0] * offset[0] + gradient[1] * offset[1] + gradient[2] * offset[2];
        let contrast = v + t * 0.5;
        if contrast.abs() * (s as f32) < self.config.contrast_threshold {
            return None;
        }

        // principal curvature ratio
        let (dxx, dyy, dxy) = (hessian[0][0], hessian[1][1], hessian[0][1]);
        let trace = dxx + dyy;
        let det = dxx * dyy - dxy * dxy;
        let r = self.config.edge_threshold;
        if det <= 0.0 || trace * trace * r >= (r + 1.0) * (r + 1.0) * det {
            return None;
        }

        Some(Extremum {
            octave,
            layer,
            row,
            col,
            x: col as f32 + offset[0],
            y: row as f32 + offset[1],
            scale: self.config.sigma * 2f32.powf((layer as f32 + offset[2]) / s as f32),
            response: contrast.abs(),
        })
    }

    fn detect_extrema(&self, octaves: &[Octave]) -> Vec<Extremum> {
        let s = self.config.n_octave_layers;
        let threshold = 0.5 * self.config.contrast_threshold / s as f32;

        octaves
            .iter()
            .enumerate()
            .flat_map(|(o, octave)| (1..=s).map(move |layer| (o, octave, layer)))
            .flat_map(|(o, octave, layer)| {
                let dog = &octave.dog;
                let (rows, cols) = (dog[layer].rows(), dog[layer].cols());
                (SIFT_IMG_BORDER..rows - SIFT_IMG_BORDER)
                    .into_par_iter()
                    .flat_map_iter(move |r| {
                        (SIFT_IMG_BORDER..cols - SIFT_IMG_BORDER).filter_map(move |c| {
                            let val = at(&dog[layer], r, c);
                            if val.abs() <= threshold || !Self::is_extremum(dog, layer, r, c) {
                                return None;
                            }
                            self.refine(o, dog, layer, r, c)
                        })
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Dominant gradient orientations around an extremum, in radians in `[0, 2 pi)`.
    fn orientations(&self, octaves: &[Octave], e: &Extremum) -> Vec<f32> {
        let n = SIFT_ORI_HIST_BINS;
        let img = &octaves[e.octave].gauss[e.layer];
        let (rows, cols) = (img.rows() as i64, img.cols() as i64);

        let radius = (SIFT_ORI_RADIUS * e.scale).round() as i64;
        let sigma = SIFT_ORI_SIG_FCTR * e.scale;
        let exp_scale = -1.0 / (2.0 * sigma * sigma);

        let mut raw = vec![0.0f32; n];
        for i in -radius..=radius {
            let y = e.row as i64 + i;
            if y <= 0 || y >= rows - 1 {
                continue;
            }
            for j in -radius..=radius {
                let x = e.col as i64 + j;
                if x <= 0 || x >= cols - 1 {
                    continue;
                }
                let (y, x) = (y as usize, x as usize);
                let dx = at(img, y, x + 1) - at(img, y, x - 1);
                let dy = at(img, y + 1, x) - at(img, y - 1, x);

                let weight = (((i * i + j * j) as f32) * exp_scale).exp();
                let angle = dy.atan2(dx).rem_euclid(2.0 * PI);
                let bin = ((angle * n as f32 / (2.0 * PI)).round() as usize) % n;
                raw[bin] += weight * (dx * dx + dy * dy).sqrt();
            }
        }

        // circular smoothing with a [1 4 6 4 1] / 16 kernel
        let hist: Vec<f32> = (0..n)
            .map(|i| {
                let h = |d: i64| raw[(i as i64 + d).rem_euclid(n as i64) as usize];
                (h(-2) + h(2)) * (1.0 / 16.0) + (h(-1) + h(1)) * (4.0 / 16.0) + h(0) * (6.0 / 16.0)
            })
            .collect();

        let max_val = hist.iter().cloned().fold(0.0f32, f32::max);
        if max_val <= 0.0 {
            return vec![0.0];
        }
        let mag_thr = max_val * SIFT_ORI_PEAK_RATIO;

        (0..n)
            .filter_map(|j| {
                let l = hist[(j + n - 1) % n];
                let r = hist[(j + 1) % n];
                let c = hist[j];
                if !(c > l && c > r && c >= mag_thr) {
                    return None;
                }
                let bin = j as f32 + 0.5 * (l - r) / (l - 2.0 * c + r);
                Some((bin * 2.0 * PI / n as f32).rem_euclid(2.0 * PI))
            })
            .collect()
    }

    /// Gradient histogram descriptor of an extremum rotated to `angle`.
    fn describe(&self, octaves: &[Octave], e: &Extremum, angle: f32) -> SiftDescriptor {
        let d = SIFT_DESCR_WIDTH;
        let n = SIFT_DESCR_HIST_BINS;
        let img = &octaves[e.octave].gauss[e.layer];
        let (rows, cols) = (img.rows() as i64, img.cols() as i64);

        let pt_x = e.x.round() as i64;
        let pt_y = e.y.round() as i64;

        let hist_width = SIFT_DESCR_SCL_FCTR * e.scale;
        let radius = (hist_width * std::f32::consts::SQRT_2 * (d as f32 + 1.0) * 0.5).round();
        let radius = radius.min(((rows * rows + cols * cols) as f32).sqrt()) as i64;

        let (sin_t, cos_t) = angle.sin_cos();
        let (sin_t, cos_t) = (sin_t / hist_width, cos_t / hist_width);
        let bins_per_rad = n as f32 / (2.0 * PI);
        let exp_scale = -1.0 / (d as f32 * d as f32 * 0.5);

        // padded with one cell on each side and one wrap around orientation bin
        let mut hist = vec![0.0f32; (d + 2) * (d + 2) * (n + 2)];

        for i in -radius..=radius {
            for j in -radius..=radius {
                // sample position in the rotated, cell scaled frame
                let c_rot = j as f32 * cos_t + i as f32 * sin_t;
                let r_rot = -(j as f32) * sin_t + i as f32 * cos_t;
                let rbin = r_rot + d as f32 / 2.0 - 0.5;
                let cbin = c_rot + d as f32 / 2.0 - 0.5;

                if !(rbin > -1.0 && rbin < d as f32 && cbin > -1.0 && cbin < d as f32) {
                    continue;
                }

                let (y, x) = (pt_y + i, pt_x + j);
                if y <= 0 || y >= rows - 1 || x <= 0 || x >= cols - 1 {
                    continue;
                }
                let (y, x) = (y as usize, x as usize);

                let dx = at(img, y, x + 1) - at(img, y, x - 1);
                let dy = at(img, y + 1, x) - at(img, y - 1, x);

                let weight = ((c_rot * c_rot + r_rot * r_rot) * exp_scale).exp();
                let mag = (dx * dx + dy * dy).sqrt() * weight;
                let obin = (dy.atan2(dx) - angle).rem_euclid(2.0 * PI) * bins_per_rad;

                // trilinear interpolation into the neighbouring bins
                let (r0, c0, o0) = (rbin.floor(), cbin.floor(), obin.floor());
                let (rf, cf, of) = (rbin - r0, cbin - c0, obin - o0);
                let o0 = (o0 as i64).rem_euclid(n as i64) as usize;

                let v_r1 = mag * rf;
                let v_r0 = mag - v_r1;
                let v_rc11 = v_r1 * cf;
                let v_rc10 = v_r1 - v_rc11;
                let v_rc01 = v_r0 * cf;
                let v_rc00 = v_r0 - v_rc01;
                let v_rco111 = v_rc11 * of;
                let v_rco110 = v_rc11 - v_rco111;
                let v_rco101 = v_rc10 * of;
                let v_rco100 = v_rc10 - v_rco101;
                let v_rco011 = v_rc01 * of;
                let v_rco010 = v_rc01 - v_rco011;
                let v_rco001 = v_rc00 * of;
                let v_rco000 = v_rc00 - v_rco001;

                let idx = (((r0 as i64 + 1) as usize) * (d + 2) + (c0 as i64 + 1) as usize)
                    * (n + 2)
                    + o0;
                hist[idx] += v_rco000;
                hist[idx + 1] += v_rco001;
                hist[idx + (n + 2)] += v_rco010;
                hist[idx + (n + 3)] += v_rco011;
                hist[idx + (d + 2) * (n + 2)] += v_rco100;
                hist[idx + (d + 2) * (n + 2) + 1] += v_rco101;
                hist[idx + (d + 3) * (n + 2)] += v_rco110;
                hist[idx + (d + 3) * (n + 2) + 1] += v_rco111;
            }
        }

        let mut descriptor = [0.0f32; 128];
        for i in 0..d {
            for j in 0..d {
                let idx = ((i + 1) * (d + 2) + (j + 1)) * (n + 2);
                hist[idx] += hist[idx + n];
                hist[idx + 1] += hist[idx + n + 1];
                for k in 0..n {
                    descriptor[(i * d + j) * n + k] = hist[idx + k];
                }
            }
        }

        // normalize, clamp the large entries and normalize again
        let norm = descriptor.iter().map(|v| v * v).sum::<f32>().sqrt();
        let thr = norm * SIFT_DESCR_MAG_THR;
        descriptor.iter_mut().for_each(|v| *v = v.min(thr));
        let norm = descriptor
            .iter()
            .map(|v| v * v)
            .sum::<f32>()
            .sqrt()
            .max(f32::EPSILON);
        descriptor.iter_mut().for_each(|v| *v /= norm);

        descriptor
    }
}

impl FeatureExtractor for SiftExtractor {
    type Descriptor = SiftDescriptor;

    fn detect_and_compute(
        &self,
        image: &Image<u8, 1>,
    ) -> Result<Features<SiftDescriptor>, FeatureError> {
        let octaves = self.build_scale_space(image)?;
        let extrema = self.detect_extrema(&octaves);

        let oriented: Vec<(Extremum, f32)> = extrema
            .par_iter()
            .flat_map_iter(|e| {
                self.orientations(&octaves, e)
                    .into_iter()
                    .map(move |angle| (*e, angle))
            })
            .collect();

        log::debug!(
            "sift: {} extrema, {} oriented keypoints over {} octaves",
            extrema.len(),
            oriented.len(),
            octaves.len()
        );

        if oriented.is_empty() {
            return Err(FeatureError::NoFeaturesFound);
        }

        let descriptors = oriented
            .par_iter()
            .map(|(e, angle)| self.describe(&octaves, e, *angle))
            .collect();

        let keypoints = oriented
            .iter()
            .map(|(e, angle)| {
                let factor = (1usize << e.octave) as f32;
                Keypoint {
                    position: [e.x * factor, e.y * factor],
                    scale: e.scale * factor,
                    orientation: *angle,
                    response: e.response,
                    octave: e.octave,
                }
            })
            .collect();

        Ok(Features {
            keypoints,
            descriptors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imreg_image::ImageError;

    /// A bright gaussian blob of the given sigma on a dark background.
    fn blob(size: usize, cx: f32, cy: f32, sigma: f32) -> Result<Image<u8, 1>, ImageError> {
        let data = (0..size * size)
            .map(|i| {
                let (x, y) = ((i % size) as f32, (i / size) as f32);
                let d2 = (x - cx) * (x - cx) + (y - cy) * (y - cy);
                (255.0 * (-d2 / (2.0 * sigma * sigma)).exp()).round() as u8
            })
            .collect();
        Image::new(
            ImageSize {
                width: size,
                height: size,
            },
            data,
        )
    }

    #[test]
    fn sift_config_validate() {
        assert!(SiftConfig::default().validate().is_ok());

        let config = SiftConfig {
            n_octave_layers: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(FeatureError::InvalidConfig(_))
        ));

        let config = SiftConfig {
            contrast_threshold: f32::NAN,
            ..Default::default()
        };
        assert!(SiftExtractor::new(config).is_err());

        let config = SiftConfig {
            max_octaves: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn sift_num_octaves() {
        let sift = SiftExtractor::default();
        assert_eq!(sift.num_octaves([256, 256].into()), 6);
        assert_eq!(sift.num_octaves([64, 100].into()), 4);
        assert_eq!(sift.num_octaves([4, 4].into()), 1);

        let sift = SiftExtractor::new(SiftConfig {
            max_octaves: Some(2),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(sift.num_octaves([256, 256].into()), 2);
    }

    #[test]
    fn sift_solve3x3() {
        let h = [[2.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 1.0]];
        let x = solve3x3(&h, &[2.0, 2.0, -3.0]).unwrap();
        approx::assert_relative_eq!(x[0], 1.0);
        approx::assert_relative_eq!(x[1], 0.5);
        approx::assert_relative_eq!(x[2], -3.0);

        let singular = [[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [0.0, 0.0, 1.0]];
        assert!(solve3x3(&singular, &[1.0; 3]).is_none());
    }

    #[test]
    fn sift_detects_blob() -> Result<(), FeatureError> {
        let image = blob(64, 32.0, 32.0, 2.8)?;
        let features = SiftExtractor::default().detect_and_compute(&image)?;

        assert_eq!(features.keypoints.len(), features.descriptors.len());
        let closest = features
            .keypoints
            .iter()
            .map(|kp| ((kp.position[0] - 32.0).powi(2) + (kp.position[1] - 32.0).powi(2)).sqrt())
            .fold(f32::MAX, f32::min);
        assert!(closest < 1.5, "no keypoint at the blob center, closest {closest}");

        for descriptor in &features.descriptors {
            let norm = descriptor.iter().map(|v| v * v).sum::<f32>().sqrt();
            approx::assert_relative_eq!(norm, 1.0, epsilon = 1e-4);
        }

        Ok(())
    }

    #[test]
    fn sift_translation_equivariance() -> Result<(), FeatureError> {
        let a = blob(96, 40.0, 40.0, 2.8)?;
        let b = blob(96, 48.0, 48.0, 2.8)?;

        let sift = SiftExtractor::default();
        let fa = sift.detect_and_compute(&a)?;
        let fb = sift.detect_and_compute(&b)?;

        let (i, kp) = fa
            .keypoints
            .iter()
            .enumerate()
            .max_by(|x, y| x.1.response.total_cmp(&y.1.response))
            .ok_or(FeatureError::NoFeaturesFound)?;

        // the same keypoint, moved by the translation, exists in the second image
        let j = fb
            .keypoints
            .iter()
            .position(|q| {
                (q.position[0] - kp.position[0] - 8.0).abs() < 1e-3
                    && (q.position[1] - kp.position[1] - 8.0).abs() < 1e-3
                    && (q.orientation - kp.orientation).abs() < 1e-3
            })
            .ok_or(FeatureError::NoFeaturesFound)?;

        for (u, v) in fa.descriptors[i].iter().zip(fb.descriptors[j].iter()) {
            approx::assert_relative_eq!(u, v, epsilon = 1e-4);
        }

        Ok(())
    }

    #[test]
    fn sift_flat_image_has_no_features() -> Result<(), FeatureError> {
        let image = Image::<u8, 1>::from_size_val(
            ImageSize {
                width: 64,
                height: 64,
            },
            90,
        )?;
        let res = SiftExtractor::default().detect_and_compute(&image);
        assert_eq!(res, Err(FeatureError::NoFeaturesFound));
        Ok(())
    }
}
