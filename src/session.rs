use crate::{
    archive::{ArchiveError, ExtractedArchive},
    config::ViewerConfig,
    enums::{Orientation, SliceFilter},
    render::{QuadView, RenderError, SliceIndices, ThumbnailGrid, VolumeRender},
    slice::{RawSlice, SliceDecodeError},
    volume::Volume,
    volume_loader::{LoadOptions, LoadReport, VolumeLoader, VolumeLoaderError},
    window::{Window, WindowBounds, WindowError, WindowPreset, WindowSelection},
};

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Loader(#[from] VolumeLoaderError),

    #[error(transparent)]
    Window(#[from] WindowError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("No volume loaded")]
    NoVolume,

    #[error("Custom window values require the Custom preset (current: {0})")]
    CustomWindowInactive(WindowPreset),
}

/// A successfully loaded dataset and everything derived from it alone.
#[derive(Debug)]
struct Dataset {
    volume: Volume,
    volume_render: VolumeRender,
    bounds: WindowBounds,
    report: LoadReport,
}

/// Interactive state of one viewer: the current volume, the selected slice
/// indices and the window selection.
///
/// A failed load leaves the previous dataset in place; a successful one
/// replaces it wholesale and resets the indices to the volume center.
#[derive(Debug, Default)]
pub struct ViewerSession {
    config: ViewerConfig,
    dataset: Option<Dataset>,
    indices: SliceIndices,
    selection: WindowSelection,
}

impl ViewerSession {
    pub fn new(config: ViewerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Extract a zip archive and load the slices it contains.
    ///
    /// The extraction directory is removed before this returns.
    pub fn load_archive(&mut self, path: impl AsRef<Path>) -> Result<&LoadReport, ViewerError> {
        let archive = ExtractedArchive::from_path(path)?;
        self.load_extracted(archive)
    }

    pub fn load_archive_bytes(
        &mut self,
        data: &[u8],
        name: &str,
    ) -> Result<&LoadReport, ViewerError> {
        let archive = ExtractedArchive::from_bytes(data, name)?;
        self.load_extracted(archive)
    }

    pub fn load_directory(&mut self, path: impl AsRef<Path>) -> Result<&LoadReport, ViewerError> {
        let files = VolumeLoader::collect_files(path.as_ref())?;
        let candidates = VolumeLoader::decode_paths(&files, self.config.slice_filter);
        self.load_slices(candidates)
    }

    /// Assemble already decoded candidates into the current volume.
    pub fn load_slices(
        &mut self,
        candidates: impl IntoIterator<Item = Result<RawSlice, SliceDecodeError>>,
    ) -> Result<&LoadReport, ViewerError> {
        let (volume, report) = VolumeLoader::assemble(candidates, self.config.load_options())?;
        self.replace_volume(volume, report);
        self.report().ok_or(ViewerError::NoVolume)
    }

    /// Thumbnails of every individually valid `.dcm` file in an archive,
    /// labelled by file name. Does not touch the current volume.
    pub fn thumbnail_grid(&self, path: impl AsRef<Path>) -> Result<ThumbnailGrid, ViewerError> {
        let archive = ExtractedArchive::from_path(path)?;
        let options = LoadOptions {
            filter: SliceFilter::DcmExtension,
            policy: self.config.decode_failure_policy,
        };
        let candidates = VolumeLoader::decode_paths(archive.files(), options.filter);
        let (slices, report) = VolumeLoader::screen_candidates(candidates, options);
        if slices.is_empty() {
            return Err(VolumeLoaderError::NoUsableInput {
                dropped: report.dropped.len(),
            }
            .into());
        }
        Ok(ThumbnailGrid::from_slices(
            &slices,
            self.config.grid_columns,
            self.config.image_origin,
        ))
    }

    pub fn volume(&self) -> Option<&Volume> {
        self.dataset.as_ref().map(|dataset| &dataset.volume)
    }

    pub fn volume_render(&self) -> Option<&VolumeRender> {
        self.dataset.as_ref().map(|dataset| &dataset.volume_render)
    }

    pub fn report(&self) -> Option<&LoadReport> {
        self.dataset.as_ref().map(|dataset| &dataset.report)
    }

    /// Data-derived default window and limits of the custom inputs.
    pub fn window_bounds(&self) -> Option<WindowBounds> {
        self.dataset.as_ref().map(|dataset| dataset.bounds)
    }

    pub fn indices(&self) -> SliceIndices {
        self.indices
    }

    /// Select slices; indices beyond an axis are clamped to its last slice.
    pub fn set_slice_indices(
        &mut self,
        indices: SliceIndices,
    ) -> Result<SliceIndices, ViewerError> {
        let volume = self.volume().ok_or(ViewerError::NoVolume)?;
        self.indices = indices.clamped(volume);
        Ok(self.indices)
    }

    pub fn set_slice_index(
        &mut self,
        orientation: Orientation,
        index: usize,
    ) -> Result<SliceIndices, ViewerError> {
        let mut indices = self.indices;
        indices.set(orientation, index);
        self.set_slice_indices(indices)
    }

    pub fn preset(&self) -> WindowPreset {
        self.selection.preset()
    }

    /// Switch preset. Custom values are discarded; picking `Custom` starts
    /// again from the default window.
    pub fn select_preset(&mut self, preset: WindowPreset) {
        let bounds = self
            .window_bounds()
            .unwrap_or_else(|| WindowBounds::from_range(0.0, 0.0));
        self.selection = WindowSelection::from_preset(preset, &bounds);
        log::debug!("Selected window preset {}", preset);
    }

    /// Set the custom width and center, clamped into the allowed ranges.
    ///
    /// # Errors
    ///
    /// Fails unless the `Custom` preset is selected and a volume is loaded.
    pub fn set_custom_window(&mut self, width: f32, center: f32) -> Result<Window, ViewerError> {
        let current = self.preset();
        if current != WindowPreset::Custom {
            return Err(ViewerError::CustomWindowInactive(current));
        }
        let bounds = self.window_bounds().ok_or(ViewerError::NoVolume)?;
        let window = bounds.custom_window(width, center);
        self.selection = WindowSelection::Custom {
            width: window.width(),
            center: window.center(),
        };
        Ok(window)
    }

    /// The window currently in effect.
    pub fn window(&self) -> Result<Window, ViewerError> {
        let bounds = self.window_bounds().ok_or(ViewerError::NoVolume)?;
        Ok(self.selection.resolve(&bounds))
    }

    /// Render the three slices and hand out the volumetric payload.
    pub fn render(&self) -> Result<QuadView<'_>, ViewerError> {
        let dataset = self.dataset.as_ref().ok_or(ViewerError::NoVolume)?;
        let window = self.selection.resolve(&dataset.bounds);
        Ok(QuadView::render(
            &dataset.volume,
            &dataset.volume_render,
            self.indices,
            window,
            &self.config,
        )?)
    }

    /// Consumes the archive: the extracted files are removed right after
    /// decoding, before assembly can fail.
    fn load_extracted(&mut self, archive: ExtractedArchive) -> Result<&LoadReport, ViewerError> {
        let candidates = VolumeLoader::decode_paths(archive.files(), self.config.slice_filter);
        drop(archive);
        self.load_slices(candidates)
    }

    fn replace_volume(&mut self, volume: Volume, report: LoadReport) {
        let volume_render = VolumeRender::from_volume(&volume, &self.config.render);
        let bounds = volume.window_bounds();
        self.indices = SliceIndices::centered(&volume);
        self.selection = WindowSelection::from_preset(self.selection.preset(), &bounds);
        log::info!(
            "Loaded volume {:?}, intensity range {:?}, {} slices accepted",
            volume.dim(),
            volume.intensity_range(),
            report.accepted
        );
        self.dataset = Some(Dataset {
            volume,
            volume_render,
            bounds,
            report,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderSettings;
    use crate::slice::SliceSpacing;
    use ndarray::Array2;
    use std::io::{Cursor, Write};
    use zip::{ZipWriter, write::SimpleFileOptions};

    fn small_config() -> ViewerConfig {
        ViewerConfig {
            render: RenderSettings {
                target_shape: (4, 4, 4),
                ..RenderSettings::default()
            },
            ..ViewerConfig::default()
        }
    }

    fn candidates(count: usize) -> Vec<Result<RawSlice, SliceDecodeError>> {
        (0..count)
            .map(|i| {
                Ok(RawSlice::new(
                    format!("IM{i}"),
                    Array2::from_elem((4, 6), i as f32 * 100.0),
                    Some(i as f32),
                    SliceSpacing::new(1.0, 1.0, 2.5),
                ))
            })
            .collect()
    }

    fn extracted(entries: &[(&str, &[u8])]) -> ExtractedArchive {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        let data = writer.finish().unwrap().into_inner();
        ExtractedArchive::from_bytes(&data, "series.zip").unwrap()
    }

    #[test]
    fn test_render_requires_volume() {
        let session = ViewerSession::new(small_config());
        assert!(matches!(session.render(), Err(ViewerError::NoVolume)));
        assert!(matches!(session.window(), Err(ViewerError::NoVolume)));
    }

    #[test]
    fn test_load_centers_indices() {
        let mut session = ViewerSession::new(small_config());
        session.load_slices(candidates(5)).unwrap();
        assert_eq!(
            session.indices(),
            SliceIndices {
                axial: 2,
                coronal: 2,
                sagittal: 3,
            }
        );
        assert_eq!(session.volume().unwrap().spacing(), (1.0, 1.0, 2.5));

        let view = session.render().unwrap();
        assert_eq!(view.axial.dimensions(), (6, 4));
        assert_eq!(view.volume.len(), 64);
    }

    #[test]
    fn test_failed_load_keeps_previous_volume() {
        let mut session = ViewerSession::new(small_config());
        session.load_slices(candidates(3)).unwrap();

        let err = session.load_slices(Vec::new()).unwrap_err();
        assert!(matches!(
            err,
            ViewerError::Loader(VolumeLoaderError::NoUsableInput { .. })
        ));
        assert_eq!(session.volume().unwrap().dim(), (3, 4, 6));

        let err = session
            .load_archive_bytes(b"not a zip", "bad.zip")
            .unwrap_err();
        assert!(matches!(err, ViewerError::Archive(ArchiveError::BadArchive(_))));
        assert_eq!(session.volume().unwrap().dim(), (3, 4, 6));
    }

    #[test]
    fn test_failed_archive_load_removes_extraction_dir() {
        let mut session = ViewerSession::new(small_config());
        session.load_slices(candidates(3)).unwrap();

        let archive = extracted(&[("notes.txt", b"no images"), ("IM1.dcm", b"DICM")]);
        let root = archive.root().to_path_buf();
        assert!(root.join("IM1.dcm").exists());

        let err = session.load_extracted(archive).unwrap_err();
        assert!(matches!(
            err,
            ViewerError::Loader(VolumeLoaderError::NoUsableInput { dropped: 2 })
        ));
        assert!(!root.exists());
        assert_eq!(session.volume().unwrap().dim(), (3, 4, 6));
    }

    #[test]
    fn test_slice_indices_clamped() {
        let mut session = ViewerSession::new(small_config());
        session.load_slices(candidates(3)).unwrap();
        let indices = session.set_slice_index(Orientation::Sagittal, 99).unwrap();
        assert_eq!(indices.sagittal, 5);
        assert!(session.render().is_ok());
    }

    #[test]
    fn test_preset_and_custom_window() {
        let mut session = ViewerSession::new(small_config());
        session.load_slices(candidates(3)).unwrap();

        let window = session.window().unwrap();
        assert_eq!((window.width(), window.center()), (200.0, 100.0));

        session.select_preset(WindowPreset::CtBone);
        let window = session.window().unwrap();
        assert_eq!((window.width(), window.center()), (2000.0, 350.0));
        assert!(matches!(
            session.set_custom_window(10.0, 10.0),
            Err(ViewerError::CustomWindowInactive(WindowPreset::CtBone))
        ));

        session.select_preset(WindowPreset::Custom);
        assert_eq!(session.window().unwrap().width(), 200.0);
        let window = session.set_custom_window(0.0, 5000.0).unwrap();
        assert_eq!((window.width(), window.center()), (1.0, 400.0));
        assert_eq!(session.render().unwrap().window, window);

        // switching away and back discards the custom values
        session.select_preset(WindowPreset::Default);
        session.select_preset(WindowPreset::Custom);
        assert_eq!(session.window().unwrap().width(), 200.0);
    }
}
