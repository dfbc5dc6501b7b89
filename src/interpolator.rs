use ndarray::ArrayView2;

pub(crate) struct Interpolator;

impl Interpolator {
    /// Dimensions (depth, height, width) at which every axis has the finest
    /// of the three spacings.
    pub(crate) fn get_isotropic_dimensions(
        spacing: (f32, f32, f32),
        original_dim: (usize, usize, usize),
    ) -> (u32, u32, u32) {
        let (x_spacing, y_spacing, z_spacing) = spacing;
        let min_spacing = x_spacing.min(y_spacing).min(z_spacing);
        if !(min_spacing > 0.0) || !min_spacing.is_finite() {
            return (
                original_dim.0 as u32,
                original_dim.1 as u32,
                original_dim.2 as u32,
            );
        }
        let inv_min_spacing = 1.0 / min_spacing;
        let scaled = |len: usize, spacing: f32| {
            ((len as f32 * spacing * inv_min_spacing) as u32).max(1)
        };

        // original_dim is (depth, height, width) corresponding to (z, y, x)
        (
            scaled(original_dim.0, z_spacing),
            scaled(original_dim.1, y_spacing),
            scaled(original_dim.2, x_spacing),
        )
    }

    #[inline]
    pub(crate) fn bilinear_interpolate(slice: &ArrayView2<f32>, y: f32, x: f32) -> f32 {
        let (height, width) = slice.dim();

        let y0 = (y.floor() as usize).min(height - 1);
        let x0 = (x.floor() as usize).min(width - 1);
        let y1 = (y0 + 1).min(height - 1);
        let x1 = (x0 + 1).min(width - 1);

        let dy = y - y0 as f32;
        let dx = x - x0 as f32;
        let one_minus_dx = 1.0 - dx;
        let one_minus_dy = 1.0 - dy;

        let v00 = slice[[y0, x0]];
        let v01 = slice[[y0, x1]];
        let v10 = slice[[y1, x0]];
        let v11 = slice[[y1, x1]];

        let v0 = v00.mul_add(one_minus_dx, v01 * dx);
        let v1 = v10.mul_add(one_minus_dx, v11 * dx);

        v0.mul_add(one_minus_dy, v1 * dy)
    }

    /// Source coordinate of output sample `index` when resampling an axis of
    /// `src_len` samples to `dst_len`, aligning pixel centers.
    #[inline]
    pub(crate) fn source_coordinate(index: usize, dst_len: usize, src_len: usize) -> f32 {
        let scale = src_len as f32 / dst_len as f32;
        let src = (index as f32 + 0.5) * scale - 0.5;
        src.clamp(0.0, (src_len - 1) as f32)
    }
}
