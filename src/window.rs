//! Window/level mapping of raw intensities onto the displayable range.
//!
//! A [`Window`] maps `[center - width/2, center + width/2]` linearly onto
//! `[0, 1]` and clips everything outside. The mapping is an affine rescale
//! followed by a clamp, so it is evaluated per call rather than through a
//! lookup table.

use ndarray::{Array, ArrayBase, Data, Dimension, Zip};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Smallest width accepted from user input.
pub const MIN_WINDOW_WIDTH: f32 = 1.0;

#[derive(Debug, Error, PartialEq)]
pub enum WindowError {
    #[error("Invalid window parameters: width {width} must be positive and center {center} finite")]
    InvalidWindowParameters { width: f32, center: f32 },

    #[error("Unknown window preset '{0}'")]
    UnknownPreset(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WindowParams")]
pub struct Window {
    width: f32,
    center: f32,
}

/// Unchecked wire form of a [`Window`]; deserialization goes through [`Window::new`].
#[derive(Deserialize)]
struct WindowParams {
    width: f32,
    center: f32,
}

impl TryFrom<WindowParams> for Window {
    type Error = WindowError;

    fn try_from(params: WindowParams) -> Result<Self, Self::Error> {
        Self::new(params.width, params.center)
    }
}

impl Window {
    /// # Errors
    ///
    /// Returns [`WindowError::InvalidWindowParameters`] unless `width > 0` and
    /// both values are finite.
    pub fn new(width: f32, center: f32) -> Result<Self, WindowError> {
        if !(width > 0.0) || !width.is_finite() || !center.is_finite() {
            return Err(WindowError::InvalidWindowParameters { width, center });
        }
        Ok(Self { width, center })
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn center(&self) -> f32 {
        self.center
    }

    /// Lowest intensity mapped above 0.
    pub fn lower(&self) -> f32 {
        self.center - self.width / 2.0
    }

    /// Lowest intensity mapped to 1.
    pub fn upper(&self) -> f32 {
        self.center + self.width / 2.0
    }

    #[inline]
    pub fn map(&self, value: f32) -> f32 {
        let t = (value - self.lower()) / self.width;
        // NaN samples render black
        if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) }
    }

    #[inline]
    pub fn map_to_u8(&self, value: f32) -> u8 {
        (self.map(value) * 255.0).round() as u8
    }

    /// Apply the window to every sample of `image`.
    pub fn apply<S, D>(&self, image: &ArrayBase<S, D>) -> Array<f32, D>
    where
        S: Data<Elem = f32>,
        D: Dimension,
    {
        Zip::from(image).par_map_collect(|&v| self.map(v))
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WW {} / WC {}", self.width, self.center)
    }
}

/// Map `image` through the window (`width`, `center`), clipping to `[0, 1]`.
///
/// # Errors
///
/// Fails with [`WindowError::InvalidWindowParameters`] for a non-positive
/// width, before any sample is touched.
pub fn windowed<S, D>(
    image: &ArrayBase<S, D>,
    width: f32,
    center: f32,
) -> Result<Array<f32, D>, WindowError>
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    Ok(Window::new(width, center)?.apply(image))
}

/// Global (min, max) over the finite samples of `data`; `(0, 0)` if there
/// are none.
pub fn intensity_range<S, D>(data: &ArrayBase<S, D>) -> (f32, f32)
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    let (min, max) = data
        .iter()
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if min > max { (0.0, 0.0) } else { (min, max) }
}

/// The closed set of window presets offered to the user.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowPreset {
    /// Full data range.
    #[default]
    Default,
    CtAbdomen,
    CtBone,
    /// User-entered width and center.
    Custom,
}

impl WindowPreset {
    pub fn all() -> &'static [WindowPreset] {
        &[
            WindowPreset::Default,
            WindowPreset::CtAbdomen,
            WindowPreset::CtBone,
            WindowPreset::Custom,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            WindowPreset::Default => "Default",
            WindowPreset::CtAbdomen => "CT Abdomen",
            WindowPreset::CtBone => "CT Bone",
            WindowPreset::Custom => "Custom",
        }
    }

    /// Data-independent (width, center) pair, if the preset has one.
    pub fn fixed(&self) -> Option<(f32, f32)> {
        match self {
            WindowPreset::CtAbdomen => Some((350.0, 50.0)),
            WindowPreset::CtBone => Some((2000.0, 350.0)),
            WindowPreset::Default | WindowPreset::Custom => None,
        }
    }

    /// Resolve the preset against the data range.
    ///
    /// `Custom` resolves to the initial values of the custom inputs, which
    /// equal the default window.
    pub fn window(&self, bounds: &WindowBounds) -> Window {
        match self.fixed() {
            Some((width, center)) => Window { width, center },
            None => bounds.default_window(),
        }
    }
}

impl fmt::Display for WindowPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WindowPreset {
    type Err = WindowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "default" => Ok(WindowPreset::Default),
            "ctabdomen" | "abdomen" => Ok(WindowPreset::CtAbdomen),
            "ctbone" | "bone" => Ok(WindowPreset::CtBone),
            "custom" => Ok(WindowPreset::Custom),
            _ => Err(WindowError::UnknownPreset(s.to_string())),
        }
    }
}

/// Data-derived default window and the limits of the custom inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowBounds {
    min: f32,
    max: f32,
    default_width: f32,
    default_center: f32,
}

impl WindowBounds {
    pub fn from_range(min: f32, max: f32) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        let range = max - min;
        Self {
            min,
            max,
            default_width: range.max(MIN_WINDOW_WIDTH),
            default_center: min + range / 2.0,
        }
    }

    pub fn default_window(&self) -> Window {
        Window {
            width: self.default_width,
            center: self.default_center,
        }
    }

    /// Allowed custom widths: `[1, 2 × default width]`.
    pub fn width_range(&self) -> (f32, f32) {
        (MIN_WINDOW_WIDTH, 2.0 * self.default_width)
    }

    /// Allowed custom centers: `[min − default width, max + default width]`.
    pub fn center_range(&self) -> (f32, f32) {
        (self.min - self.default_width, self.max + self.default_width)
    }

    pub fn clamp_width(&self, width: f32) -> f32 {
        let (lo, hi) = self.width_range();
        if width.is_nan() {
            self.default_width
        } else {
            width.clamp(lo, hi)
        }
    }

    pub fn clamp_center(&self, center: f32) -> f32 {
        let (lo, hi) = self.center_range();
        if center.is_nan() {
            self.default_center
        } else {
            center.clamp(lo, hi)
        }
    }

    /// A window from user-entered values, clamped into the allowed ranges.
    pub fn custom_window(&self, width: f32, center: f32) -> Window {
        Window {
            width: self.clamp_width(width),
            center: self.clamp_center(center),
        }
    }
}

/// Where the current window comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowSelection {
    Preset(WindowPreset),
    Custom { width: f32, center: f32 },
}

impl Default for WindowSelection {
    fn default() -> Self {
        WindowSelection::Preset(WindowPreset::Default)
    }
}

impl WindowSelection {
    /// Selection after the user picks `preset`; custom values are discarded
    /// and re-initialised to the defaults when `Custom` is picked again.
    pub fn from_preset(preset: WindowPreset, bounds: &WindowBounds) -> Self {
        match preset {
            WindowPreset::Custom => {
                let window = bounds.default_window();
                WindowSelection::Custom {
                    width: window.width,
                    center: window.center,
                }
            }
            other => WindowSelection::Preset(other),
        }
    }

    pub fn preset(&self) -> WindowPreset {
        match self {
            WindowSelection::Preset(preset) => *preset,
            WindowSelection::Custom { .. } => WindowPreset::Custom,
        }
    }

    pub fn resolve(&self, bounds: &WindowBounds) -> Window {
        match *self {
            WindowSelection::Preset(preset) => preset.window(bounds),
            WindowSelection::Custom { width, center } => bounds.custom_window(width, center),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{Array2, array};

    #[test]
    fn test_deserialized_window_is_validated() {
        let window: Window = serde_json::from_str(r#"{"width":400,"center":40}"#).unwrap();
        assert_eq!(window, Window::new(400.0, 40.0).unwrap());

        let err = serde_json::from_str::<Window>(r#"{"width":0,"center":40}"#).unwrap_err();
        assert!(err.to_string().contains("Invalid window parameters"));
        assert!(serde_json::from_str::<Window>(r#"{"width":-5,"center":0}"#).is_err());
    }

    #[test]
    fn test_window_rejects_non_positive_width() {
        assert!(matches!(
            Window::new(0.0, 10.0),
            Err(WindowError::InvalidWindowParameters { .. })
        ));
        assert!(Window::new(-5.0, 10.0).is_err());
        assert!(Window::new(f32::NAN, 10.0).is_err());
        assert!(Window::new(1.0, f32::INFINITY).is_err());
        assert!(Window::new(1.0, 0.0).is_ok());
    }

    #[test]
    fn test_windowed_formula() {
        let image = array![[-200.0_f32, -125.0, 50.0], [225.0, 400.0, 0.0]];
        let out = windowed(&image, 350.0, 50.0).unwrap();

        assert_relative_eq!(out[[0, 0]], 0.0);
        assert_relative_eq!(out[[0, 1]], 0.0);
        assert_relative_eq!(out[[0, 2]], 0.5);
        assert_relative_eq!(out[[1, 0]], 1.0);
        assert_relative_eq!(out[[1, 1]], 1.0);
        assert_relative_eq!(out[[1, 2]], 125.0 / 350.0, epsilon = 1e-6);
        assert_eq!(out.dim(), image.dim());
    }

    #[test]
    fn test_windowed_zero_width_rejected() {
        let image = Array2::<f32>::zeros((2, 2));
        assert!(windowed(&image, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_windowed_output_in_unit_range() {
        let values: Vec<f32> = (-3000..3000).step_by(7).map(|v| v as f32 * 1.3).collect();
        let image = Array2::from_shape_vec((1, values.len()), values).unwrap();
        for (width, center) in [(1.0, 0.0), (350.0, 50.0), (2000.0, 350.0), (0.01, -900.0)] {
            let out = windowed(&image, width, center).unwrap();
            assert!(out.iter().all(|&v| (0.0..=1.0).contains(&v)));
        }
    }

    #[test]
    fn test_windowed_monotonic() {
        let values: Vec<f32> = (-2048..2048).map(|v| v as f32).collect();
        let image = ndarray::Array1::from(values);
        let out = windowed(&image, 400.0, 40.0).unwrap();
        assert!(out.windows(2).into_iter().all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_windowed_nan_is_black() {
        let window = Window::new(10.0, 0.0).unwrap();
        assert_eq!(window.map(f32::NAN), 0.0);
        assert_eq!(window.map_to_u8(100.0), 255);
        assert_eq!(window.map_to_u8(-100.0), 0);
    }

    #[test]
    fn test_fixed_presets_ignore_data_range() {
        for bounds in [
            WindowBounds::from_range(0.0, 1.0),
            WindowBounds::from_range(-1024.0, 3071.0),
        ] {
            let bone = WindowPreset::CtBone.window(&bounds);
            assert_eq!((bone.width(), bone.center()), (2000.0, 350.0));
            let abdomen = WindowPreset::CtAbdomen.window(&bounds);
            assert_eq!((abdomen.width(), abdomen.center()), (350.0, 50.0));
        }
    }

    #[test]
    fn test_default_preset_spans_data_range() {
        let bounds = WindowBounds::from_range(-1000.0, 3000.0);
        let window = WindowPreset::Default.window(&bounds);
        assert_eq!(window.width(), 4000.0);
        assert_eq!(window.center(), 1000.0);
        assert_eq!(window.lower(), -1000.0);
        assert_eq!(window.upper(), 3000.0);
    }

    #[test]
    fn test_default_preset_constant_data_stays_valid() {
        let bounds = WindowBounds::from_range(42.0, 42.0);
        let window = WindowPreset::Default.window(&bounds);
        assert_eq!(window.width(), MIN_WINDOW_WIDTH);
        assert_eq!(window.center(), 42.0);
    }

    #[test]
    fn test_custom_values_clamped() {
        let bounds = WindowBounds::from_range(0.0, 100.0);
        assert_eq!(bounds.width_range(), (1.0, 200.0));
        assert_eq!(bounds.center_range(), (-100.0, 200.0));

        let window = bounds.custom_window(0.0, 1000.0);
        assert_eq!(window.width(), 1.0);
        assert_eq!(window.center(), 200.0);

        let window = bounds.custom_window(500.0, -500.0);
        assert_eq!(window.width(), 200.0);
        assert_eq!(window.center(), -100.0);
    }

    #[test]
    fn test_selection_switching_discards_custom_values() {
        let bounds = WindowBounds::from_range(0.0, 100.0);
        let selection = WindowSelection::Custom {
            width: 10.0,
            center: 5.0,
        };
        assert_eq!(selection.resolve(&bounds).width(), 10.0);

        let selection = WindowSelection::from_preset(WindowPreset::CtBone, &bounds);
        assert_eq!(selection.preset(), WindowPreset::CtBone);

        let selection = WindowSelection::from_preset(WindowPreset::Custom, &bounds);
        assert_eq!(
            selection,
            WindowSelection::Custom {
                width: 100.0,
                center: 50.0
            }
        );
    }

    #[test]
    fn test_preset_names_round_trip() {
        for preset in WindowPreset::all() {
            assert_eq!(preset.name().parse::<WindowPreset>().unwrap(), *preset);
        }
        assert_eq!("ct-bone".parse::<WindowPreset>().unwrap(), WindowPreset::CtBone);
        assert!("lung".parse::<WindowPreset>().is_err());
    }
}
