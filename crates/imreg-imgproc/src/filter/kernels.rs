/// Create a gaussian blur kernel.
///
/// # Arguments
///
/// * `kernel_size` - The size of the kernel.
/// * `sigma` - The sigma of the gaussian kernel.
///
/// # Returns
///
/// A vector of the kernel.
pub fn gaussian_kernel_1d(kernel_size: usize, sigma: f32) -> Vec<f32> {
    let mut kernel = Vec::with_capacity(kernel_size);

    let mean = kernel_size.saturating_sub(1) as f32 / 2.0;
    let sigma_sq = sigma * sigma;

    // compute the kernel
    for i in 0..kernel_size {
        let x = i as f32 - mean;
        kernel.push((-(x * x) / (2.0 * sigma_sq)).exp());
    }

    // normalize the kernel
    let norm = kernel.iter().sum::<f32>();
    kernel.iter_mut().for_each(|k| *k /= norm);
    kernel
}

/// Odd kernel size covering +-3 sigma of a gaussian, at least 3 taps.
pub fn gaussian_kernel_size(sigma: f32) -> usize {
    let half = (3.0 * sigma).ceil().max(1.0) as usize;
    2 * half + 1
}

/// Create the two 1d kernels of the 3x3 sobel operator.
///
/// Returns the derivative kernel and the smoothing kernel.
pub fn sobel_kernel_1d() -> (Vec<f32>, Vec<f32>) {
    (vec![-1.0, 0.0, 1.0], vec![1.0, 2.0, 1.0])
}
