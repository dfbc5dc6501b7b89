//! Anti-aliased resampling of a volume onto a fixed grid.
//!
//! Each axis that shrinks is first smoothed with a Gaussian of
//! `sigma = (factor - 1) / 2`, then the grid is sampled trilinearly with
//! pixel centers aligned between input and output.

use crate::interpolator::Interpolator;

use ndarray::{Array3, Axis, Zip};

/// Gaussian kernels are truncated at this many standard deviations.
const TRUNCATE: f32 = 4.0;

pub fn resample_anti_aliased(data: &Array3<f32>, target: (usize, usize, usize)) -> Array3<f32> {
    let (depth, height, width) = target;
    if depth == 0 || height == 0 || width == 0 || data.is_empty() {
        return Array3::zeros(target);
    }
    let source = data.dim();

    let mut smoothed = data.to_owned();
    for (axis, (src_len, dst_len)) in [
        (source.0, depth),
        (source.1, height),
        (source.2, width),
    ]
    .into_iter()
    .enumerate()
    {
        let sigma = ((src_len as f32 / dst_len as f32 - 1.0) / 2.0).max(0.0);
        if sigma > 0.0 {
            gaussian_filter_axis(&mut smoothed, Axis(axis), sigma);
        }
    }

    let z_taps = axis_taps(depth, source.0);
    let y_taps = axis_taps(height, source.1);
    let x_taps = axis_taps(width, source.2);

    let mut output = Array3::<f32>::zeros(target);
    Zip::indexed(&mut output).par_for_each(|(z, y, x), value| {
        let (z0, z1, dz) = z_taps[z];
        let (y0, y1, dy) = y_taps[y];
        let (x0, x1, dx) = x_taps[x];
        let lerp = |a: f32, b: f32, t: f32| a.mul_add(1.0 - t, b * t);
        let plane = |zi: usize| {
            let row0 = lerp(smoothed[[zi, y0, x0]], smoothed[[zi, y0, x1]], dx);
            let row1 = lerp(smoothed[[zi, y1, x0]], smoothed[[zi, y1, x1]], dx);
            lerp(row0, row1, dy)
        };
        *value = lerp(plane(z0), plane(z1), dz);
    });
    output
}

/// (lower index, upper index, fraction) for every output sample of an axis.
fn axis_taps(dst_len: usize, src_len: usize) -> Vec<(usize, usize, f32)> {
    (0..dst_len)
        .map(|i| {
            let src = Interpolator::source_coordinate(i, dst_len, src_len);
            let i0 = src.floor() as usize;
            let i1 = (i0 + 1).min(src_len - 1);
            (i0, i1, src - i0 as f32)
        })
        .collect()
}

fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (TRUNCATE * sigma + 0.5) as isize;
    let weights: Vec<f32> = (-radius..=radius)
        .map(|i| (-0.5 * (i as f32 / sigma).powi(2)).exp())
        .collect();
    let total: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// Index into a lane of `len` samples with half-sample symmetric reflection
/// (`d c b a | a b c d | d c b a`).
#[inline]
fn reflect_index(index: isize, len: usize) -> usize {
    let period = 2 * len as isize;
    let m = index.rem_euclid(period) as usize;
    if m < len { m } else { 2 * len - 1 - m }
}

fn gaussian_filter_axis(data: &mut Array3<f32>, axis: Axis, sigma: f32) {
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as isize;

    Zip::from(data.lanes_mut(axis)).par_for_each(|mut lane| {
        let source = lane.to_vec();
        let len = source.len();
        for (i, out) in lane.iter_mut().enumerate() {
            *out = kernel
                .iter()
                .enumerate()
                .map(|(k, w)| {
                    let offset = i as isize + k as isize - radius;
                    w * source[reflect_index(offset, len)]
                })
                .sum();
        }
    });
}
