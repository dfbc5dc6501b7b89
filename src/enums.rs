use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    Axial,
    Coronal,
    Sagittal,
}

impl Orientation {
    pub fn all() -> [Orientation; 3] {
        [
            Orientation::Axial,
            Orientation::Coronal,
            Orientation::Sagittal,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Orientation::Axial => "axial",
            Orientation::Coronal => "coronal",
            Orientation::Sagittal => "sagittal",
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    /// Raw orthogonal slices, one output pixel per voxel.
    #[default]
    None,
    /// Resample coronal and sagittal slices to isotropic spacing.
    Bilinear,
}

/// Which archive entries are considered slice candidates.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SliceFilter {
    /// Try every entry; drop those lacking a slice position.
    #[default]
    SpatialPosition,
    /// Only `*.dcm` entries; a missing slice position is tolerated.
    DcmExtension,
}

/// How dropped candidates are reported.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeFailurePolicy {
    /// Only the aggregated count is logged.
    #[default]
    Silent,
    /// Every dropped candidate is logged as a warning.
    Warn,
}

/// Vertical placement of row 0 in rendered images.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageOrigin {
    #[default]
    Lower,
    Upper,
}
