use crate::{
    enums::{DecodeFailurePolicy, SliceFilter},
    slice::{RawSlice, SliceDecodeError},
    volume::Volume,
};

use dicom::object::{FileDicomObject, InMemDicomObject};
use ndarray::{Array3, s};
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;
use web_time::Instant;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("No usable DICOM slices found ({dropped} candidates dropped)")]
    NoUsableInput { dropped: usize },

    #[error(
        "Slice {index} has shape {found:?}, expected {expected:?} (all slices must share the in-plane shape)"
    )]
    ShapeMismatch {
        index: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Candidates that did not make it into the volume.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub accepted: usize,
    pub dropped: Vec<SliceDecodeError>,
}

impl LoadReport {
    pub fn dropped_names(&self) -> Vec<&str> {
        self.dropped.iter().map(SliceDecodeError::name).collect()
    }
}

/// Options controlling which candidates are accepted and how drops are reported.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoadOptions {
    pub filter: SliceFilter,
    pub policy: DecodeFailurePolicy,
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Assemble a volume from decoded slice candidates.
    ///
    /// Failed candidates are dropped and recorded in the returned
    /// [`LoadReport`]; only an empty result or uneven slice shapes fail the
    /// whole load.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeLoaderError::NoUsableInput`] if no candidate survives
    /// filtering and [`VolumeLoaderError::ShapeMismatch`] if the surviving
    /// slices differ in shape.
    pub fn assemble(
        candidates: impl IntoIterator<Item = Result<RawSlice, SliceDecodeError>>,
        options: LoadOptions,
    ) -> Result<(Volume, LoadReport), VolumeLoaderError> {
        let started = Instant::now();
        let (mut slices, report) = Self::screen_candidates(candidates, options);

        if slices.is_empty() {
            return Err(VolumeLoaderError::NoUsableInput {
                dropped: report.dropped.len(),
            });
        }

        Self::sort_slices(&mut slices);
        Self::validate_dimensions(&slices)?;

        let spacing = slices[0].spacing().as_tuple();
        let volume_array = Self::build_volume_array(slices);
        let volume = Volume::new(volume_array, spacing);

        log::info!(
            "Assembled volume {:?} with spacing {:?} in {:?}",
            volume.dim(),
            spacing,
            started.elapsed()
        );

        Ok((volume, report))
    }

    /// Split candidates into usable slices and dropped failures, in input
    /// order, logging each drop according to `options.policy`.
    pub fn screen_candidates(
        candidates: impl IntoIterator<Item = Result<RawSlice, SliceDecodeError>>,
        options: LoadOptions,
    ) -> (Vec<RawSlice>, LoadReport) {
        let mut report = LoadReport::default();
        let mut slices = Vec::new();

        for candidate in candidates {
            match candidate.and_then(|slice| Self::screen(slice, options.filter)) {
                Ok(slice) => slices.push(slice),
                Err(err) => {
                    match options.policy {
                        DecodeFailurePolicy::Warn => log::warn!("Dropping candidate: {err}"),
                        DecodeFailurePolicy::Silent => log::debug!("Dropping candidate: {err}"),
                    }
                    report.dropped.push(err);
                }
            }
        }

        if !report.dropped.is_empty() {
            log::info!("Dropped {} unusable candidates", report.dropped.len());
        }
        report.accepted = slices.len();
        (slices, report)
    }

    /// Load a volume from DICOM objects
    ///
    /// # Arguments
    ///
    /// * `dicom_objects` - named DICOM file objects
    /// * `options` - filtering and reporting options
    pub fn load_from_dicom_objects(
        dicom_objects: &[(String, FileDicomObject<InMemDicomObject>)],
        options: LoadOptions,
    ) -> Result<(Volume, LoadReport), VolumeLoaderError> {
        let candidates = dicom_objects
            .iter()
            .map(|(name, object)| RawSlice::from_dicom_object(name.clone(), object));
        Self::assemble(candidates, options)
    }

    /// Load a volume from file paths; unreadable files are dropped.
    pub fn load_from_file_paths(
        paths: &[impl AsRef<Path>],
        options: LoadOptions,
    ) -> Result<(Volume, LoadReport), VolumeLoaderError> {
        Self::assemble(Self::decode_paths(paths, options.filter), options)
    }

    /// Decode every path accepted by `filter`.
    pub fn decode_paths(
        paths: &[impl AsRef<Path>],
        filter: SliceFilter,
    ) -> Vec<Result<RawSlice, SliceDecodeError>> {
        paths
            .iter()
            .map(|path| -> &Path { path.as_ref() })
            .filter(|path| Self::accepts_path(path, filter))
            .map(RawSlice::open)
            .collect()
    }

    /// Load a volume from every file below a directory
    pub fn load_from_directory(
        path: impl AsRef<Path>,
        options: LoadOptions,
    ) -> Result<(Volume, LoadReport), VolumeLoaderError> {
        let paths = Self::collect_files(path.as_ref())?;
        Self::load_from_file_paths(&paths, options)
    }

    /// Recursively list regular files below `root`, sorted by path.
    pub(crate) fn collect_files(root: &Path) -> Result<Vec<PathBuf>, VolumeLoaderError> {
        let mut paths = Vec::new();
        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.is_dir() {
                    pending.push(path);
                } else {
                    paths.push(path);
                }
            }
        }
        paths.sort();
        Ok(paths)
    }

    pub(crate) fn accepts_path(path: &Path, filter: SliceFilter) -> bool {
        match filter {
            SliceFilter::SpatialPosition => true,
            SliceFilter::DcmExtension => path
                .extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm")),
        }
    }

    fn screen(slice: RawSlice, filter: SliceFilter) -> Result<RawSlice, SliceDecodeError> {
        match filter {
            // NaN or infinite positions cannot be ordered against the rest
            SliceFilter::SpatialPosition if !slice.position().is_some_and(f32::is_finite) => {
                Err(SliceDecodeError::MissingPosition {
                    name: slice.name().to_string(),
                })
            }
            _ => Ok(slice),
        }
    }

    fn sort_slices(slices: &mut [RawSlice]) {
        // Stable sort: equal positions keep their input order.
        slices.sort_by(|a, b| Self::sort_key(a).total_cmp(&Self::sort_key(b)));
    }

    /// Slice position, with missing or non-finite positions sorted as 0.
    fn sort_key(slice: &RawSlice) -> f32 {
        slice
            .position()
            .filter(|position| position.is_finite())
            .unwrap_or(0.0)
    }

    fn validate_dimensions(slices: &[RawSlice]) -> Result<(), VolumeLoaderError> {
        let expected = slices[0].dim();
        match slices.iter().position(|slice| slice.dim() != expected) {
            Some(index) => Err(VolumeLoaderError::ShapeMismatch {
                index,
                expected,
                found: slices[index].dim(),
            }),
            None => Ok(()),
        }
    }

    fn build_volume_array(slices: Vec<RawSlice>) -> Array3<f32> {
        let (height, width) = slices[0].dim();
        let depth = slices.len();
        let mut volume = Array3::<f32>::zeros((depth, height, width));

        for (i, slice) in slices.into_iter().enumerate() {
            volume.slice_mut(s![i, .., ..]).assign(&slice.into_pixels());
        }

        volume
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slice::SliceSpacing;
    use ndarray::Array2;

    fn slice(name: &str, position: Option<f32>, fill: f32) -> RawSlice {
        RawSlice::new(
            name,
            Array2::from_elem((2, 3), fill),
            position,
            SliceSpacing::new(1.0, 1.0, 2.5),
        )
    }

    #[test]
    fn test_slices_sorted_by_ascending_position() {
        let candidates = vec![
            Ok(slice("c", Some(3.0), 3.0)),
            Ok(slice("a", Some(1.0), 1.0)),
            Ok(slice("b", Some(2.0), 2.0)),
        ];
        let (volume, report) = VolumeLoader::assemble(candidates, LoadOptions::default()).unwrap();

        assert_eq!(volume.dim(), (3, 2, 3));
        assert_eq!(report.accepted, 3);
        let firsts: Vec<f32> = (0..3).map(|i| volume.data()[[i, 0, 0]]).collect();
        assert_eq!(firsts, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_negative_positions_sort_numerically() {
        let candidates = vec![
            Ok(slice("a", Some(-10.0), 1.0)),
            Ok(slice("b", Some(-2.5), 2.0)),
            Ok(slice("c", Some(-100.0), 0.0)),
        ];
        let (volume, _) = VolumeLoader::assemble(candidates, LoadOptions::default()).unwrap();
        let firsts: Vec<f32> = (0..3).map(|i| volume.data()[[i, 0, 0]]).collect();
        assert_eq!(firsts, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_spacing_taken_from_first_sorted_slice() {
        let candidates = vec![
            Ok(RawSlice::new(
                "late",
                Array2::zeros((2, 2)),
                Some(5.0),
                SliceSpacing::new(0.5, 0.5, 3.0),
            )),
            Ok(RawSlice::new(
                "early",
                Array2::zeros((2, 2)),
                Some(1.0),
                SliceSpacing::new(1.0, 1.0, 2.5),
            )),
        ];
        let (volume, _) = VolumeLoader::assemble(candidates, LoadOptions::default()).unwrap();
        assert_eq!(volume.spacing(), (1.0, 1.0, 2.5));
    }

    #[test]
    fn test_missing_position_dropped_by_default() {
        let candidates = vec![Ok(slice("a", Some(1.0), 1.0)), Ok(slice("b", None, 2.0))];
        let (volume, report) = VolumeLoader::assemble(candidates, LoadOptions::default()).unwrap();
        assert_eq!(volume.dim().0, 1);
        assert_eq!(report.dropped_names(), vec!["b"]);
    }

    #[test]
    fn test_missing_position_treated_as_zero_for_dcm_filter() {
        let options = LoadOptions {
            filter: SliceFilter::DcmExtension,
            policy: DecodeFailurePolicy::Warn,
        };
        let candidates = vec![Ok(slice("a", Some(1.0), 1.0)), Ok(slice("b", None, 2.0))];
        let (volume, report) = VolumeLoader::assemble(candidates, options).unwrap();
        assert_eq!(volume.dim().0, 2);
        assert!(report.dropped.is_empty());
        assert_eq!(volume.data()[[0, 0, 0]], 2.0);
    }

    #[test]
    fn test_non_finite_positions_dropped_by_default() {
        let candidates: Vec<_> = (0..64)
            .map(|i| {
                let position = if i % 3 == 0 { f32::NAN } else { i as f32 };
                Ok(slice(&format!("s{i}"), Some(position), i as f32))
            })
            .chain([Ok(slice("inf", Some(f32::INFINITY), -1.0))])
            .collect();
        let (volume, report) = VolumeLoader::assemble(candidates, LoadOptions::default()).unwrap();

        assert_eq!(report.accepted, 42);
        assert_eq!(report.dropped.len(), 23);
        assert!(
            report
                .dropped
                .iter()
                .all(|err| matches!(err, SliceDecodeError::MissingPosition { .. }))
        );
        let firsts: Vec<f32> = (0..volume.dim().0).map(|i| volume.data()[[i, 0, 0]]).collect();
        assert!(firsts.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_non_finite_positions_sorted_as_zero_for_dcm_filter() {
        let options = LoadOptions {
            filter: SliceFilter::DcmExtension,
            ..LoadOptions::default()
        };
        let candidates: Vec<_> = (0..64)
            .map(|i| {
                let position = if i % 3 == 0 { f32::NAN } else { i as f32 };
                Ok(slice(&format!("s{i}"), Some(position), i as f32))
            })
            .collect();
        let (volume, report) = VolumeLoader::assemble(candidates, options).unwrap();

        assert_eq!(report.accepted, 64);
        // NaN slices share position 0 and keep their input order ahead of 1, 2, 4, ...
        let firsts: Vec<f32> = (0..64).map(|i| volume.data()[[i, 0, 0]]).collect();
        let expected: Vec<f32> = (0..64)
            .filter(|i| i % 3 == 0)
            .chain((0..64).filter(|i| i % 3 != 0))
            .map(|i| i as f32)
            .collect();
        assert_eq!(firsts, expected);
    }

    #[test]
    fn test_no_usable_input() {
        let candidates = vec![
            Err(SliceDecodeError::UnreadableFile {
                name: "readme.txt".into(),
                reason: "not dicom".into(),
            }),
            Ok(slice("b", None, 2.0)),
        ];
        let err = VolumeLoader::assemble(candidates, LoadOptions::default()).unwrap_err();
        assert!(matches!(err, VolumeLoaderError::NoUsableInput { dropped: 2 }));

        let empty: Vec<Result<RawSlice, SliceDecodeError>> = Vec::new();
        let err = VolumeLoader::assemble(empty, LoadOptions::default()).unwrap_err();
        assert!(matches!(err, VolumeLoaderError::NoUsableInput { dropped: 0 }));
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let candidates = vec![
            Ok(slice("a", Some(1.0), 1.0)),
            Ok(RawSlice::new(
                "b",
                Array2::zeros((4, 4)),
                Some(2.0),
                SliceSpacing::default(),
            )),
        ];
        let err = VolumeLoader::assemble(candidates, LoadOptions::default()).unwrap_err();
        match err {
            VolumeLoaderError::ShapeMismatch {
                index,
                expected,
                found,
            } => {
                assert_eq!(index, 1);
                assert_eq!(expected, (2, 3));
                assert_eq!(found, (4, 4));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_accepts_path() {
        assert!(VolumeLoader::accepts_path(
            Path::new("a/IM0001"),
            SliceFilter::SpatialPosition
        ));
        assert!(VolumeLoader::accepts_path(
            Path::new("a/IM0001.DCM"),
            SliceFilter::DcmExtension
        ));
        assert!(!VolumeLoader::accepts_path(
            Path::new("a/IM0001"),
            SliceFilter::DcmExtension
        ));
    }

    #[test]
    fn test_collect_files_recurses() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("series/nested")).unwrap();
        fs::write(dir.path().join("series/one.dcm"), b"x").unwrap();
        fs::write(dir.path().join("series/nested/two.dcm"), b"x").unwrap();

        let files = VolumeLoader::collect_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
    }
}
