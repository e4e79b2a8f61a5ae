//! Local variance normalization.
//!
//! Each selected channel is re-expressed as its deviation from a Gaussian
//! local mean, measured in local standard deviations and scaled by the
//! amplitude. The blur matches OpenCV's `GaussianBlur` with `sigma = 0`:
//! the sigma is derived from the kernel size, sizes up to 7 use the fixed
//! binomial-like kernels, and borders reflect without repeating the edge
//! pixel.

use super::color::to_u8;
use super::config::ProcessorConfig;
use super::frame::Frame;

/// 1-D Gaussian kernel of odd length `size`, normalized to sum to 1.
pub fn gaussian_kernel(size: usize) -> Vec<f32> {
    match size {
        0 | 1 => return vec![1.0],
        3 => return vec![0.25, 0.5, 0.25],
        5 => return vec![0.0625, 0.25, 0.375, 0.25, 0.0625],
        7 => {
            return vec![
                0.03125, 0.109375, 0.21875, 0.28125, 0.21875, 0.109375, 0.03125,
            ]
        }
        _ => {}
    }

    let sigma = 0.3 * ((size as f64 - 1.0) * 0.5 - 1.0) + 0.8;
    let scale = -0.5 / (sigma * sigma);
    let center = (size / 2) as f64;
    let raw: Vec<f64> = (0..size)
        .map(|i| {
            let x = i as f64 - center;
            (scale * x * x).exp()
        })
        .collect();
    let sum: f64 = raw.iter().sum();
    raw.into_iter().map(|v| (v / sum) as f32).collect()
}

/// Index into `0..n` for a possibly out-of-range position, mirroring
/// around the edge pixels (`dcb|abcd|cba`).
fn reflect_101(i: isize, n: usize) -> usize {
    if n <= 1 {
        return 0;
    }
    let period = 2 * (n as isize - 1);
    let i = i.rem_euclid(period);
    let n = n as isize;
    (if i >= n { period - i } else { i }) as usize
}

/// Separable Gaussian blur of a single-channel float plane.
pub fn gaussian_blur(plane: &[f32], width: usize, height: usize, kernel: &[f32]) -> Vec<f32> {
    let radius = (kernel.len() / 2) as isize;
    let xmap: Vec<usize> = (-radius..width as isize + radius)
        .map(|i| reflect_101(i, width))
        .collect();
    let ymap: Vec<usize> = (-radius..height as isize + radius)
        .map(|i| reflect_101(i, height))
        .collect();

    let mut horizontal = vec![0.0f32; plane.len()];
    for y in 0..height {
        let row = &plane[y * width..(y + 1) * width];
        let out = &mut horizontal[y * width..(y + 1) * width];
        for (x, slot) in out.iter_mut().enumerate() {
            *slot = kernel
                .iter()
                .zip(&xmap[x..x + kernel.len()])
                .map(|(k, &sx)| k * row[sx])
                .sum();
        }
    }

    let mut out = vec![0.0f32; plane.len()];
    for y in 0..height {
        let rows = &ymap[y..y + kernel.len()];
        for x in 0..width {
            out[y * width + x] = kernel
                .iter()
                .zip(rows)
                .map(|(k, &sy)| k * horizontal[sy * width + x])
                .sum();
        }
    }
    out
}

/// Run LVN over the selected channels of `frame`.
///
/// Channels are processed in float across all `repeat` passes and rounded
/// back to 8 bits once at the end. Channels that are not selected, and any
/// channel past the third (alpha), are copied unchanged.
pub fn local_variance_normalize(frame: &Frame, config: &ProcessorConfig) -> Frame {
    let mut out = frame.clone();
    if !config.selected_channels.any() {
        return out;
    }

    let (width, height) = (frame.width() as usize, frame.height() as usize);
    let stride = frame.channels();
    let kernel = gaussian_kernel(config.kernel_size());
    let floor = config.variance_floor();
    let amplitude = config.amplitude;

    for channel in config.selected_channels.selected() {
        if channel >= stride.min(3) {
            continue;
        }
        let mut plane: Vec<f32> = frame
            .data()
            .iter()
            .skip(channel)
            .step_by(stride)
            .map(|&v| v as f32)
            .collect();

        for _ in 0..config.repeat {
            let mean = gaussian_blur(&plane, width, height, &kernel);
            let squared: Vec<f32> = plane
                .iter()
                .zip(&mean)
                .map(|(v, m)| (v - m) * (v - m))
                .collect();
            let variance = gaussian_blur(&squared, width, height, &kernel);
            for ((v, m), var) in plane.iter_mut().zip(&mean).zip(&variance) {
                let std_dev = (var.max(0.0) + floor).sqrt();
                *v = (((*v - m) / std_dev) * amplitude + m).clamp(0.0, 255.0);
            }
        }

        for (dst, v) in out
            .data_mut()
            .iter_mut()
            .skip(channel)
            .step_by(stride)
            .zip(plane)
        {
            *dst = to_u8(v);
        }
    }
    out
}
