//! # DICOM-quadview library
//!
//! This crate turns an unordered set of single-slice DICOM files into an
//! ordered volume and renders it as four views: the axial, coronal and
//! sagittal slices through a user-selected point, windowed for display, and
//! a downsampled volumetric payload for a 3D renderer.
//!
//! Slices are ordered by the z component of Image Position (Patient) in
//! ascending order, and the voxel spacing is taken from Pixel Spacing and
//! Slice Thickness of the first slice. Files that cannot be decoded, or that
//! lack a slice position, are dropped and reported in a [`LoadReport`]
//! instead of failing the whole load. DICOM files are assumed to have the
//! following attributes:
//!   - Axial data set
//!   - No multiframe (always the first frame is used)
//!   - Images from the same series and acquisition
//!
//! Intensities are mapped to the display range with a window/level pair
//! ([`Window`]), either derived from the data range or taken from one of
//! the [`WindowPreset`]s.
//!
//! # Examples
//!
//! ## Rendering the four views of a zipped series
//!
//! ```no_run
//! # use dicom_quadview::{ViewerConfig, ViewerSession, WindowPreset};
//! let mut session = ViewerSession::new(ViewerConfig::default());
//! session
//!     .load_archive("series.zip")
//!     .expect("should have loaded slices from the archive");
//! session.select_preset(WindowPreset::CtBone);
//! let view = session.render().expect("should have rendered the volume");
//! view.axial.save("axial.png").expect("should have saved the axial view");
//! ```
//!
//! ## Windowing a single array
//!
//! ```
//! # use dicom_quadview::windowed;
//! # use ndarray::array;
//! let image = array![[-1000.0_f32, 50.0, 1000.0]];
//! let display = windowed(&image, 350.0, 50.0).unwrap();
//! assert_eq!(display, array![[0.0, 0.5, 1.0]]);
//! ```

pub mod archive;
pub mod config;
pub mod enums;
mod interpolator;
pub mod render;
pub mod resample;
pub mod session;
pub mod slice;
pub mod volume;
pub mod volume_loader;
pub mod window;

pub use config::{RenderSettings, ViewerConfig};
pub use enums::{DecodeFailurePolicy, ImageOrigin, Interpolation, Orientation, SliceFilter};
pub use render::{QuadView, SliceIndices, Thumbnail, ThumbnailGrid, VolumeRender};
pub use session::{ViewerError, ViewerSession};
pub use slice::{RawSlice, SliceDecodeError, SliceSpacing};
pub use volume::Volume;
pub use volume_loader::{LoadOptions, LoadReport, VolumeLoader, VolumeLoaderError};
pub use window::{Window, WindowBounds, WindowError, WindowPreset, WindowSelection, windowed};
