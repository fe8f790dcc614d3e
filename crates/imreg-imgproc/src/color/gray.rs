/// Red weight of the luminance formula.
pub const RW: f64 = 0.299;
/// Green weight of the luminance formula.
pub const GW: f64 = 0.587;
/// Blue weight of the luminance formula.
pub const BW: f64 = 0.114;

/// Luminance of a single RGB sample.
///
/// Y = 0.299 * R + 0.587 * G + 0.114 * B
#[inline]
pub fn luminance(r: f64, g: f64, b: f64) -> f64 {
    RW * r + GW * g + BW * b
}
