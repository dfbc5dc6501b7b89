use crate::enums::{ImageOrigin, Interpolation, Orientation};
use crate::interpolator::Interpolator;
use crate::window::{Window, WindowBounds, intensity_range};

use image::GrayImage;
use ndarray::{Array2, Array3, ArrayView2, Zip, s};
use rayon::prelude::*;

/// Ordered stack of slices indexed `[stack, row, column]` plus physical
/// spacing (in-plane x, in-plane y, slice thickness).
///
/// A volume never changes after assembly; loading new data builds a new one.
#[derive(Debug, Clone)]
pub struct Volume {
    data: Array3<f32>,
    spacing: (f32, f32, f32),
    interpolated_dim: (u32, u32, u32),
    range: (f32, f32),
}

impl Volume {
    pub fn new(data: Array3<f32>, spacing: (f32, f32, f32)) -> Self {
        let original_dim = data.dim();
        let range = intensity_range(&data);
        Self {
            data,
            spacing,
            interpolated_dim: Interpolator::get_isotropic_dimensions(spacing, original_dim),
            range,
        }
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    pub fn spacing(&self) -> (f32, f32, f32) {
        self.spacing
    }

    /// Global (min, max) intensity over all finite samples.
    pub fn intensity_range(&self) -> (f32, f32) {
        self.range
    }

    pub fn window_bounds(&self) -> WindowBounds {
        WindowBounds::from_range(self.range.0, self.range.1)
    }

    /// Number of slices available along `orientation`.
    pub fn axis_len(&self, orientation: Orientation) -> usize {
        let dim = self.data.dim();
        match orientation {
            Orientation::Axial => dim.0,
            Orientation::Coronal => dim.1,
            Orientation::Sagittal => dim.2,
        }
    }

    pub fn is_valid_index(&self, index: usize, orientation: Orientation) -> bool {
        index < self.axis_len(orientation)
    }

    /// Middle slice along `orientation`.
    pub fn center_index(&self, orientation: Orientation) -> usize {
        self.axis_len(orientation) / 2
    }

    pub fn get_slice_from_axis(
        &self,
        index: usize,
        orientation: Orientation,
    ) -> Option<ArrayView2<'_, f32>> {
        if !self.is_valid_index(index, orientation) {
            return None;
        }
        let slice_result = match orientation {
            Orientation::Axial => self.data.slice(s![index, .., ..]),
            Orientation::Coronal => self.data.slice(s![.., index, ..]),
            Orientation::Sagittal => self.data.slice(s![.., .., index]),
        };
        Some(slice_result)
    }

    /// Windowed 8-bit grayscale image of one orthogonal slice.
    ///
    /// Returns `None` if `index` is outside the volume along `orientation`.
    pub fn get_image_from_axis(
        &self,
        index: usize,
        orientation: Orientation,
        window: &Window,
        interpolation: Interpolation,
        origin: ImageOrigin,
    ) -> Option<GrayImage> {
        let slice = self.get_slice_from_axis(index, orientation)?;

        let pixels = match interpolation {
            // Axial doesn't need interpolation (already isotropic in-plane)
            Interpolation::Bilinear if !matches!(orientation, Orientation::Axial) => {
                let (width, height) = self.get_output_dimensions(orientation);
                Self::interpolate_slice(&slice, window, width, height)
            }
            _ => Zip::from(&slice).par_map_collect(|&v| window.map_to_u8(v)),
        };
        Self::pixels_to_image(&pixels, origin)
    }

    fn get_output_dimensions(&self, orientation: Orientation) -> (u32, u32) {
        // Always return (width, height) - standard image convention
        match orientation {
            Orientation::Axial => {
                // Looking down Z-axis: X is width, Y is height
                (self.interpolated_dim.2, self.interpolated_dim.1)
            }
            Orientation::Coronal => {
                // Looking down Y-axis: X is width, Z is height
                (self.interpolated_dim.2, self.interpolated_dim.0)
            }
            Orientation::Sagittal => {
                // Looking down X-axis: Y is width, Z is height
                (self.interpolated_dim.1, self.interpolated_dim.0)
            }
        }
    }

    pub(crate) fn pixels_to_image(pixels: &Array2<u8>, origin: ImageOrigin) -> Option<GrayImage> {
        let (height, width) = pixels.dim();
        let rows = match origin {
            ImageOrigin::Upper => pixels.view(),
            ImageOrigin::Lower => pixels.slice(s![..;-1, ..]),
        };
        let pixel_data: Vec<u8> = rows.iter().copied().collect();
        GrayImage::from_raw(width as u32, height as u32, pixel_data)
    }

    fn interpolate_slice(
        slice: &ArrayView2<'_, f32>,
        window: &Window,
        width: u32,
        height: u32,
    ) -> Array2<u8> {
        let (slice_height, slice_width) = slice.dim();
        let (width, height) = (width as usize, height as usize);

        let pixel_data: Vec<u8> = (0..height)
            .into_par_iter()
            .flat_map_iter(|y| {
                let src_y = Interpolator::source_coordinate(y, height, slice_height);
                (0..width).map(move |x| {
                    let src_x = Interpolator::source_coordinate(x, width, slice_width);
                    let value = Interpolator::bilinear_interpolate(slice, src_y, src_x);
                    window.map_to_u8(value)
                })
            })
            .collect();

        Array2::from_shape_vec((height, width), pixel_data).unwrap_or_default()
    }
}
