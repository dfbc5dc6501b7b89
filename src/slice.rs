use dicom::{
    object::{FileDicomObject, InMemDicomObject, open_file},
    pixeldata::{ConvertOptions, PixelDecoder, VoiLutOption},
};
use dicom_dictionary_std::tags;
use ndarray::{Array2, s};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SliceDecodeError {
    #[error("'{name}' could not be decoded: {reason}")]
    UnreadableFile { name: String, reason: String },

    #[error("'{name}' has no slice position")]
    MissingPosition { name: String },
}

impl SliceDecodeError {
    /// Name of the candidate that failed.
    pub fn name(&self) -> &str {
        match self {
            SliceDecodeError::UnreadableFile { name, .. } => name,
            SliceDecodeError::MissingPosition { name } => name,
        }
    }

    fn unreadable(name: &str, reason: impl ToString) -> Self {
        SliceDecodeError::UnreadableFile {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Physical sample spacing of a single slice, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliceSpacing {
    /// In-plane spacing (x, y): x is the distance between columns, y the
    /// distance between rows. DICOM Pixel Spacing stores them as (row, column).
    pub pixel: (f32, f32),
    /// Out-of-plane spacing.
    pub thickness: f32,
}

impl Default for SliceSpacing {
    fn default() -> Self {
        Self {
            pixel: (1.0, 1.0),
            thickness: 1.0,
        }
    }
}

impl SliceSpacing {
    pub fn new(x: f32, y: f32, thickness: f32) -> Self {
        Self {
            pixel: (x, y),
            thickness,
        }
    }

    /// Spacing as a (x, y, thickness) tuple.
    pub fn as_tuple(&self) -> (f32, f32, f32) {
        (self.pixel.0, self.pixel.1, self.thickness)
    }
}

/// One decoded 2D image together with the metadata needed to stack it.
#[derive(Debug, Clone)]
pub struct RawSlice {
    name: String,
    pixels: Array2<f32>,
    position: Option<f32>,
    spacing: SliceSpacing,
}

impl RawSlice {
    pub fn new(
        name: impl Into<String>,
        pixels: Array2<f32>,
        position: Option<f32>,
        spacing: SliceSpacing,
    ) -> Self {
        Self {
            name: name.into(),
            pixels,
            position,
            spacing,
        }
    }

    /// Open and decode a single DICOM file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SliceDecodeError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let dicom_object = open_file(path).map_err(|e| SliceDecodeError::unreadable(&name, e))?;
        Self::from_dicom_object(name, &dicom_object)
    }

    /// Decode the first frame of a DICOM object.
    ///
    /// Pixel values have the modality LUT applied (e.g. Hounsfield units for
    /// CT) and no VOI LUT, so windowing happens downstream.
    pub fn from_dicom_object(
        name: impl Into<String>,
        dicom_object: &FileDicomObject<InMemDicomObject>,
    ) -> Result<Self, SliceDecodeError> {
        let name = name.into();
        let pixels = Self::decode_image(&name, dicom_object)?;
        let position = Self::get_position(dicom_object);
        let spacing = Self::get_spacing(dicom_object);
        Ok(Self {
            name,
            pixels,
            position,
            spacing,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pixels(&self) -> &Array2<f32> {
        &self.pixels
    }

    pub fn position(&self) -> Option<f32> {
        self.position
    }

    pub fn spacing(&self) -> SliceSpacing {
        self.spacing
    }

    /// (rows, columns)
    pub fn dim(&self) -> (usize, usize) {
        self.pixels.dim()
    }

    pub(crate) fn into_pixels(self) -> Array2<f32> {
        self.pixels
    }

    fn decode_image(
        name: &str,
        dicom_object: &FileDicomObject<InMemDicomObject>,
    ) -> Result<Array2<f32>, SliceDecodeError> {
        let pixel_data = dicom_object
            .decode_pixel_data()
            .map_err(|e| SliceDecodeError::unreadable(name, e))?;
        let options = ConvertOptions::new().with_voi_lut(VoiLutOption::Identity);
        let frames = pixel_data
            .to_ndarray_with_options::<f32>(&options)
            .map_err(|e| SliceDecodeError::unreadable(name, e))?;
        if frames.is_empty() {
            return Err(SliceDecodeError::unreadable(name, "empty pixel data"));
        }
        Ok(frames.slice_move(s![0, .., .., 0]))
    }

    fn get_position(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<f32> {
        dicom_object
            .element(tags::IMAGE_POSITION_PATIENT)
            .ok()?
            .to_multi_float32()
            .ok()?
            .get(2)
            .copied()
    }

    fn get_spacing(dicom_object: &FileDicomObject<InMemDicomObject>) -> SliceSpacing {
        let default = SliceSpacing::default();
        let pixel = dicom_object
            .element(tags::PIXEL_SPACING)
            .ok()
            .and_then(|e| e.to_multi_float32().ok())
            .and_then(|values| Self::in_plane_spacing(&values));
        let thickness = dicom_object
            .element(tags::SLICE_THICKNESS)
            .ok()
            .and_then(|e| e.to_float32().ok());
        if pixel.is_none() || thickness.is_none() {
            log::debug!("Missing spacing attributes, falling back to 1.0");
        }
        SliceSpacing {
            pixel: pixel.unwrap_or(default.pixel),
            thickness: thickness.unwrap_or(default.thickness),
        }
    }

    /// Pixel Spacing `[row, column]` as (x, y).
    fn in_plane_spacing(values: &[f32]) -> Option<(f32, f32)> {
        match values {
            [row, column, ..] => Some((*column, *row)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_open_rejects_non_dicom_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".dcm")
            .tempfile()
            .unwrap();
        file.write_all(b"definitely not a dicom file").unwrap();

        let err = RawSlice::open(file.path()).unwrap_err();
        assert!(matches!(err, SliceDecodeError::UnreadableFile { .. }));
        assert!(err.name().ends_with(".dcm"));
    }

    #[test]
    fn test_in_plane_spacing_swaps_row_and_column() {
        assert_eq!(RawSlice::in_plane_spacing(&[0.8, 0.5]), Some((0.5, 0.8)));
        assert_eq!(RawSlice::in_plane_spacing(&[0.7]), None);
        assert_eq!(RawSlice::in_plane_spacing(&[]), None);
    }

    #[test]
    fn test_spacing_tuple() {
        let spacing = SliceSpacing::new(0.7, 0.8, 2.5);
        assert_eq!(spacing.as_tuple(), (0.7, 0.8, 2.5));
        assert_eq!(SliceSpacing::default().as_tuple(), (1.0, 1.0, 1.0));
    }
}
