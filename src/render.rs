//! The viewer's outputs: three windowed orthogonal slices, a downsampled
//! volumetric payload, and the thumbnail grid of the multi-file view.

use crate::config::{RenderSettings, ViewerConfig};
use crate::enums::{ImageOrigin, Orientation};
use crate::resample::resample_anti_aliased;
use crate::slice::RawSlice;
use crate::volume::Volume;
use crate::window::{Window, WindowBounds, intensity_range};

use image::{GrayImage, Luma, imageops};
use ndarray::Zip;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("{orientation:?} index {index} is outside the volume (0..{len})")]
    IndexOutOfRange {
        orientation: Orientation,
        index: usize,
        len: usize,
    },

    #[error("Failed to build {0:?} image")]
    Image(Orientation),
}

/// Selected slice along each axis.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SliceIndices {
    pub axial: usize,
    pub coronal: usize,
    pub sagittal: usize,
}

impl SliceIndices {
    /// The middle slice of every axis.
    pub fn centered(volume: &Volume) -> Self {
        Self {
            axial: volume.center_index(Orientation::Axial),
            coronal: volume.center_index(Orientation::Coronal),
            sagittal: volume.center_index(Orientation::Sagittal),
        }
    }

    /// Every index clamped to `[0, n - 1]` of its axis.
    pub fn clamped(self, volume: &Volume) -> Self {
        let clamp = |index: usize, orientation| {
            index.min(volume.axis_len(orientation).saturating_sub(1))
        };
        Self {
            axial: clamp(self.axial, Orientation::Axial),
            coronal: clamp(self.coronal, Orientation::Coronal),
            sagittal: clamp(self.sagittal, Orientation::Sagittal),
        }
    }

    pub fn get(&self, orientation: Orientation) -> usize {
        match orientation {
            Orientation::Axial => self.axial,
            Orientation::Coronal => self.coronal,
            Orientation::Sagittal => self.sagittal,
        }
    }

    pub fn set(&mut self, orientation: Orientation, index: usize) {
        match orientation {
            Orientation::Axial => self.axial = index,
            Orientation::Coronal => self.coronal = index,
            Orientation::Sagittal => self.sagittal = index,
        }
    }
}

/// Flattened coordinate/value list for a volumetric renderer.
///
/// `x`, `y` and `z` enumerate the resampled grid in row-major order and
/// `value` holds the raw (unwindowed) intensity at each point.
#[derive(Debug, Clone, Serialize)]
pub struct VolumeRender {
    pub shape: (usize, usize, usize),
    pub x: Vec<u32>,
    pub y: Vec<u32>,
    pub z: Vec<u32>,
    pub value: Vec<f32>,
    pub opacity: f32,
    pub surface_count: u32,
    pub colorscale: String,
}

impl VolumeRender {
    pub fn from_volume(volume: &Volume, settings: &RenderSettings) -> Self {
        let resampled = resample_anti_aliased(volume.data(), settings.target_shape);
        let shape = resampled.dim();
        let len = resampled.len();

        let mut x = Vec::with_capacity(len);
        let mut y = Vec::with_capacity(len);
        let mut z = Vec::with_capacity(len);
        let mut value = Vec::with_capacity(len);
        for ((i, j, k), &v) in resampled.indexed_iter() {
            x.push(i as u32);
            y.push(j as u32);
            z.push(k as u32);
            value.push(v);
        }

        log::debug!("Resampled volume {:?} to {:?}", volume.dim(), shape);

        Self {
            shape,
            x,
            y,
            z,
            value,
            opacity: settings.opacity,
            surface_count: settings.surface_count,
            colorscale: settings.colorscale.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

/// The four views shown for one set of viewer parameters.
#[derive(Debug)]
pub struct QuadView<'a> {
    pub indices: SliceIndices,
    pub window: Window,
    pub axial: GrayImage,
    pub coronal: GrayImage,
    pub sagittal: GrayImage,
    pub volume: &'a VolumeRender,
}

impl<'a> QuadView<'a> {
    /// Render the three orthogonal slices at `indices` through `window`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::IndexOutOfRange`] if any index exceeds its axis.
    pub fn render(
        volume: &Volume,
        volume_render: &'a VolumeRender,
        indices: SliceIndices,
        window: Window,
        config: &ViewerConfig,
    ) -> Result<Self, RenderError> {
        let [axial, coronal, sagittal] = Orientation::all().map(|orientation| {
            Self::render_slice(volume, orientation, indices.get(orientation), &window, config)
        });
        Ok(Self {
            indices,
            window,
            axial: axial?,
            coronal: coronal?,
            sagittal: sagittal?,
            volume: volume_render,
        })
    }

    pub fn image(&self, orientation: Orientation) -> &GrayImage {
        match orientation {
            Orientation::Axial => &self.axial,
            Orientation::Coronal => &self.coronal,
            Orientation::Sagittal => &self.sagittal,
        }
    }

    fn render_slice(
        volume: &Volume,
        orientation: Orientation,
        index: usize,
        window: &Window,
        config: &ViewerConfig,
    ) -> Result<GrayImage, RenderError> {
        if !volume.is_valid_index(index, orientation) {
            return Err(RenderError::IndexOutOfRange {
                orientation,
                index,
                len: volume.axis_len(orientation),
            });
        }
        volume
            .get_image_from_axis(
                index,
                orientation,
                window,
                config.interpolation,
                config.image_origin,
            )
            .ok_or(RenderError::Image(orientation))
    }
}

#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub label: String,
    pub image: GrayImage,
}

impl Thumbnail {
    /// Thumbnail of a single slice windowed by its own data range.
    pub fn from_slice(slice: &RawSlice, origin: ImageOrigin) -> Option<Self> {
        let (min, max) = intensity_range(slice.pixels());
        let window = WindowBounds::from_range(min, max).default_window();
        let pixels = Zip::from(slice.pixels()).par_map_collect(|&v| window.map_to_u8(v));
        Some(Self {
            label: slice.name().to_string(),
            image: Volume::pixels_to_image(&pixels, origin)?,
        })
    }
}

/// Thumbnails laid out row-major in a fixed number of columns; cells past
/// the last thumbnail are blank.
#[derive(Debug, Clone)]
pub struct ThumbnailGrid {
    columns: usize,
    cells: Vec<Option<Thumbnail>>,
}

impl ThumbnailGrid {
    pub fn new(thumbnails: Vec<Thumbnail>, columns: usize) -> Self {
        let columns = columns.max(1);
        let rows = thumbnails.len().div_ceil(columns);
        let mut cells: Vec<Option<Thumbnail>> = thumbnails.into_iter().map(Some).collect();
        cells.resize(rows * columns, None);
        Self { columns, cells }
    }

    pub fn from_slices(slices: &[RawSlice], columns: usize, origin: ImageOrigin) -> Self {
        let thumbnails = slices
            .iter()
            .filter_map(|slice| Thumbnail::from_slice(slice, origin))
            .collect();
        Self::new(thumbnails, columns)
    }

    pub fn rows(&self) -> usize {
        self.cells.len() / self.columns
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn len(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `None` both for blank cells and for positions outside the grid.
    pub fn cell(&self, row: usize, column: usize) -> Option<&Thumbnail> {
        if column >= self.columns {
            return None;
        }
        self.cells.get(row * self.columns + column)?.as_ref()
    }

    pub fn cells(&self) -> &[Option<Thumbnail>] {
        &self.cells
    }

    /// Tile the grid into one image, each thumbnail fitted into a square
    /// cell of `cell_size` pixels; blank cells stay black.
    pub fn compose(&self, cell_size: u32) -> GrayImage {
        let cell_size = cell_size.max(1);
        let mut canvas = GrayImage::from_pixel(
            self.columns as u32 * cell_size,
            self.rows() as u32 * cell_size,
            Luma([0]),
        );
        for (i, cell) in self.cells.iter().enumerate() {
            let Some(thumbnail) = cell else { continue };
            let (width, height) = thumbnail.image.dimensions();
            if width == 0 || height == 0 {
                continue;
            }
            let scale = (cell_size as f32 / width as f32).min(cell_size as f32 / height as f32);
            let fitted_width = ((width as f32 * scale) as u32).clamp(1, cell_size);
            let fitted_height = ((height as f32 * scale) as u32).clamp(1, cell_size);
            let fitted = imageops::resize(
                &thumbnail.image,
                fitted_width,
                fitted_height,
                imageops::FilterType::Triangle,
            );
            let column = (i % self.columns) as u32;
            let row = (i / self.columns) as u32;
            let x = column * cell_size + (cell_size - fitted_width) / 2;
            let y = row * cell_size + (cell_size - fitted_height) / 2;
            imageops::overlay(&mut canvas, &fitted, x as i64, y as i64);
        }
        canvas
    }
}
