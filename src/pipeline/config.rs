use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound for LVN passes per frame.
pub const MAX_REPEAT: u32 = 32;

/// Upper bound for `smoothness`, the blur radius in pixels.
pub const MAX_SMOOTHNESS: f32 = 20.0;

/// Smallest variance floor added under the square root in LVN.
pub const MIN_VARIANCE_FLOOR: f32 = 0.01;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be {expected}, got {value}")]
    OutOfRange {
        field: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("unknown parameter: {0}")]
    UnknownParameter(String),
    #[error("invalid value {value:?} for {field}: {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
    #[error("unknown color space: {0}")]
    UnknownColorSpace(String),
    #[error("unknown blend mode: {0}")]
    UnknownBlendMode(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Target color space for the conversion stage, and the space saturation
/// scaling works in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ColorSpace {
    #[default]
    #[serde(rename = "RGB")]
    Rgb,
    #[serde(rename = "HSV")]
    Hsv,
    #[serde(rename = "HLS")]
    Hls,
    #[serde(rename = "LAB")]
    Lab,
    #[serde(rename = "LUV")]
    Luv,
    #[serde(rename = "XYZ")]
    Xyz,
    #[serde(rename = "YCrCb")]
    YCrCb,
    #[serde(rename = "YUV")]
    Yuv,
}

impl ColorSpace {
    pub const ALL: [ColorSpace; 8] = [
        Self::Rgb,
        Self::Hsv,
        Self::Hls,
        Self::Lab,
        Self::Luv,
        Self::Xyz,
        Self::YCrCb,
        Self::Yuv,
    ];

    /// Display name as shown in a color space picker.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Rgb => "RGB",
            Self::Hsv => "HSV",
            Self::Hls => "HLS",
            Self::Lab => "LAB",
            Self::Luv => "LUV",
            Self::Xyz => "XYZ",
            Self::YCrCb => "YCrCb",
            Self::Yuv => "YUV",
        }
    }

    /// Labels for the three channels, in buffer order.
    pub const fn channel_names(self) -> [&'static str; 3] {
        match self {
            Self::Rgb => ["R", "G", "B"],
            Self::Hsv => ["H", "S", "V"],
            Self::Hls => ["H", "L", "S"],
            Self::Lab => ["L", "A", "B"],
            Self::Luv => ["L", "U", "V"],
            Self::Xyz => ["X", "Y", "Z"],
            Self::YCrCb => ["Y", "Cr", "Cb"],
            Self::Yuv => ["Y", "U", "V"],
        }
    }
}

impl fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColorSpace {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = normalize_name(s);
        Self::ALL
            .into_iter()
            .find(|space| normalize_name(space.name()) == wanted)
            .ok_or_else(|| ConfigError::UnknownColorSpace(s.to_string()))
    }
}

/// Compositing formula for mixing the recompressed base frame with the
/// filtered frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BlendMode {
    #[default]
    None,
    Overlay,
    Multiply,
    #[serde(rename = "Linear Burn")]
    LinearBurn,
    Screen,
    Darken,
    Lighten,
    Difference,
    Exclusion,
    #[serde(rename = "Soft Light")]
    SoftLight,
    #[serde(rename = "Hard Light")]
    HardLight,
    Dodge,
    Burn,
}

impl BlendMode {
    pub const ALL: [BlendMode; 13] = [
        Self::None,
        Self::Overlay,
        Self::Multiply,
        Self::LinearBurn,
        Self::Screen,
        Self::Darken,
        Self::Lighten,
        Self::Difference,
        Self::Exclusion,
        Self::SoftLight,
        Self::HardLight,
        Self::Dodge,
        Self::Burn,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Overlay => "Overlay",
            Self::Multiply => "Multiply",
            Self::LinearBurn => "Linear Burn",
            Self::Screen => "Screen",
            Self::Darken => "Darken",
            Self::Lighten => "Lighten",
            Self::Difference => "Difference",
            Self::Exclusion => "Exclusion",
            Self::SoftLight => "Soft Light",
            Self::HardLight => "Hard Light",
            Self::Dodge => "Dodge",
            Self::Burn => "Burn",
        }
    }
}

impl fmt::Display for BlendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BlendMode {
    type Err = ConfigError;

    /// Accepts the display name in any case, with spaces, dashes or
    /// underscores as separators ("linear-burn", "SoftLight").
    fn from_str(s: &str) -> Result<Self> {
        let wanted = normalize_name(s);
        Self::ALL
            .into_iter()
            .find(|mode| normalize_name(mode.name()) == wanted)
            .ok_or_else(|| ConfigError::UnknownBlendMode(s.to_string()))
    }
}

fn normalize_name(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Which of the three channels the LVN filter touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelMask(pub [bool; 3]);

impl ChannelMask {
    pub const ALL: ChannelMask = ChannelMask([true; 3]);
    pub const NONE: ChannelMask = ChannelMask([false; 3]);

    /// Whether channel `index` is selected. Indices past the mask are never
    /// selected, so extra channels such as alpha pass through.
    pub fn is_selected(&self, index: usize) -> bool {
        self.0.get(index).copied().unwrap_or(false)
    }

    pub fn set(&mut self, index: usize, selected: bool) {
        if let Some(slot) = self.0.get_mut(index) {
            *slot = selected;
        }
    }

    pub fn any(&self) -> bool {
        self.0.iter().any(|&c| c)
    }

    /// Indices of the selected channels in ascending order.
    pub fn selected(&self) -> impl Iterator<Item = usize> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(i, &on)| on.then_some(i))
    }
}

impl Default for ChannelMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// The full parameter set for one pass of the frame processor.
///
/// Serialized as a flat camelCase object; missing keys take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessorConfig {
    /// Gain applied to the normalized deviation from the local mean.
    pub amplitude: f32,
    /// Drives the Gaussian kernel size (`2 * floor(smoothness) + 1`).
    pub smoothness: f32,
    /// Variance floor, raised to at least 0.01.
    pub threshold: f32,
    /// LVN passes per frame.
    pub repeat: u32,
    /// Quality of the final recompression.
    pub jpeg_quality: u8,
    /// Quality of the base recompression the blend stage mixes against.
    pub blend_jpeg_quality: u8,
    /// Offset in [-100, 100]; 0 leaves the frame unchanged.
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub base_weight: f32,
    pub blend_weight: f32,
    pub apply_filter: bool,
    pub selected_color_space: ColorSpace,
    pub selected_blend_mode: BlendMode,
    pub selected_channels: ChannelMask,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            amplitude: 100.0,
            smoothness: 5.0,
            threshold: 0.0,
            repeat: 1,
            jpeg_quality: 100,
            blend_jpeg_quality: 75,
            brightness: 0.0,
            contrast: 1.0,
            saturation: 1.0,
            base_weight: 0.5,
            blend_weight: 0.5,
            apply_filter: true,
            selected_color_space: ColorSpace::Rgb,
            selected_blend_mode: BlendMode::None,
            selected_channels: ChannelMask::ALL,
        }
    }
}

impl ProcessorConfig {
    /// Every serialized key, in declaration order.
    pub const KEYS: [&'static str; 15] = [
        "amplitude",
        "smoothness",
        "threshold",
        "repeat",
        "jpegQuality",
        "blendJpegQuality",
        "brightness",
        "contrast",
        "saturation",
        "baseWeight",
        "blendWeight",
        "applyFilter",
        "selectedColorSpace",
        "selectedBlendMode",
        "selectedChannels",
    ];

    /// Whether the blend stage runs.
    pub fn apply_blending(&self) -> bool {
        self.selected_blend_mode != BlendMode::None
    }

    /// Odd Gaussian kernel size derived from `smoothness`.
    pub fn kernel_size(&self) -> usize {
        let half = self.smoothness.clamp(0.0, MAX_SMOOTHNESS).floor() as usize;
        half.saturating_mul(2).saturating_add(1)
    }

    pub fn variance_floor(&self) -> f32 {
        self.threshold.max(MIN_VARIANCE_FLOOR)
    }

    /// Brightness mapped so that 1.0 is neutral.
    pub fn normalized_brightness(&self) -> f32 {
        (self.brightness + 100.0) / 100.0
    }

    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<()> {
        check("amplitude", self.amplitude, ">= 0", |v| v >= 0.0)?;
        check("smoothness", self.smoothness, "in [1, 20]", |v| {
            (1.0..=MAX_SMOOTHNESS).contains(&v)
        })?;
        check("threshold", self.threshold, ">= 0", |v| v >= 0.0)?;
        check("brightness", self.brightness, "in [-100, 100]", |v| {
            (-100.0..=100.0).contains(&v)
        })?;
        check("contrast", self.contrast, ">= 0", |v| v >= 0.0)?;
        check("saturation", self.saturation, ">= 0", |v| v >= 0.0)?;
        check("baseWeight", self.base_weight, ">= 0", |v| v >= 0.0)?;
        check("blendWeight", self.blend_weight, ">= 0", |v| v >= 0.0)?;

        if !(1..=MAX_REPEAT).contains(&self.repeat) {
            return Err(ConfigError::OutOfRange {
                field: "repeat",
                expected: "in [1, 32]",
                value: self.repeat.to_string(),
            });
        }
        for (field, quality) in [
            ("jpegQuality", self.jpeg_quality),
            ("blendJpegQuality", self.blend_jpeg_quality),
        ] {
            if quality > 100 {
                return Err(ConfigError::OutOfRange {
                    field,
                    expected: "in [0, 100]",
                    value: quality.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Set one field from its serialized key and a textual value.
    ///
    /// The value is read as JSON when it parses as JSON and as a plain
    /// string otherwise, so `repeat=3`, `applyFilter=false`,
    /// `selectedChannels=[true,false,true]` and `selectedBlendMode=linear burn`
    /// all work. The update is validated before it is applied; on error the
    /// config is left unchanged.
    pub fn set_param(&mut self, key: &str, value: &str) -> Result<()> {
        let key = match key {
            "colorSpace" => "selectedColorSpace",
            "blendMode" => "selectedBlendMode",
            "channels" => "selectedChannels",
            other => other,
        };
        if !Self::KEYS.contains(&key) {
            return Err(ConfigError::UnknownParameter(key.to_string()));
        }

        let parsed = match key {
            "selectedColorSpace" => {
                serde_json::Value::String(value.trim().parse::<ColorSpace>()?.name().to_string())
            }
            "selectedBlendMode" => {
                serde_json::Value::String(value.trim().parse::<BlendMode>()?.name().to_string())
            }
            _ => serde_json::from_str(value)
                .unwrap_or_else(|_| serde_json::Value::String(value.to_string())),
        };

        let invalid = |reason: String| ConfigError::InvalidValue {
            field: key.to_string(),
            value: value.to_string(),
            reason,
        };
        let mut snapshot = serde_json::to_value(*self).map_err(|e| invalid(e.to_string()))?;
        if let Some(map) = snapshot.as_object_mut() {
            map.insert(key.to_string(), parsed);
        }
        let updated: ProcessorConfig =
            serde_json::from_value(snapshot).map_err(|e| invalid(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }
}

fn check(field: &'static str, value: f32, expected: &'static str, ok: impl Fn(f32) -> bool) -> Result<()> {
    if value.is_finite() && ok(value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            expected,
            value: value.to_string(),
        })
    }
}

/// Processor configuration shared between a controller and the capture loop.
///
/// Every write is validated before it becomes visible. Readers take a copy
/// with [`SharedConfig::snapshot`] once per frame, so a frame never sees a
/// half-applied update.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<ProcessorConfig>>,
}

impl SharedConfig {
    pub fn new(config: ProcessorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(RwLock::new(config)),
        })
    }

    pub fn snapshot(&self) -> ProcessorConfig {
        *self.inner.read()
    }

    /// Replace the whole config.
    pub fn set(&self, config: ProcessorConfig) -> Result<()> {
        config.validate()?;
        *self.inner.write() = config;
        Ok(())
    }

    /// Edit a copy of the current config and publish it if it validates.
    /// Returns the published config.
    pub fn update<F>(&self, edit: F) -> Result<ProcessorConfig>
    where
        F: FnOnce(&mut ProcessorConfig),
    {
        let mut guard = self.inner.write();
        let mut next = *guard;
        edit(&mut next);
        next.validate()?;
        *guard = next;
        Ok(next)
    }

    pub fn set_param(&self, key: &str, value: &str) -> Result<()> {
        let mut guard = self.inner.write();
        guard.set_param(key, value)
    }

    pub fn reset_to_defaults(&self) {
        *self.inner.write() = ProcessorConfig::default();
    }
}
