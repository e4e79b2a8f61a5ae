use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::pipeline::config::{ConfigError, ProcessorConfig};

/// A saved preset: every processor setting as a flat camelCase object, plus
/// any extra keys a host UI stored alongside them (window toggles and the
/// like), carried through load and save unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PresetFile {
    #[serde(flatten)]
    pub config: ProcessorConfig,
    #[serde(flatten)]
    pub extras: BTreeMap<String, Value>,
}

impl PresetFile {
    pub fn new(config: ProcessorConfig) -> Self {
        Self {
            config,
            extras: BTreeMap::new(),
        }
    }

    /// Attach a UI-only value. Processor keys are not accepted here.
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        if !ProcessorConfig::KEYS.contains(&key.as_str()) {
            self.extras.insert(key, value);
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.config.validate()
    }
}

impl From<ProcessorConfig> for PresetFile {
    fn from(config: ProcessorConfig) -> Self {
        Self::new(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::config::{BlendMode, ColorSpace};

    #[test]
    fn preset_serialises_flat() {
        let preset = PresetFile::new(ProcessorConfig::default())
            .with_extra("showOriginal", Value::Bool(true));
        let json = serde_json::to_value(&preset).unwrap();

        assert_eq!(json["amplitude"], 100.0);
        assert_eq!(json["blendJpegQuality"], 75);
        assert_eq!(json["selectedColorSpace"], "RGB");
        assert_eq!(json["selectedChannels"], serde_json::json!([true, true, true]));
        assert_eq!(json["showOriginal"], true);
        assert!(json.get("config").is_none());
        assert!(json.get("extras").is_none());
    }

    #[test]
    fn preset_deserialises_partial_object_with_defaults() {
        let json = r#"{
            "amplitude": 40,
            "selectedBlendMode": "Soft Light",
            "selectedColorSpace": "LAB",
            "windowLayout": {"split": 0.3}
        }"#;
        let preset: PresetFile = serde_json::from_str(json).unwrap();

        assert_eq!(preset.config.amplitude, 40.0);
        assert_eq!(preset.config.selected_blend_mode, BlendMode::SoftLight);
        assert_eq!(preset.config.selected_color_space, ColorSpace::Lab);
        assert_eq!(preset.config.smoothness, 5.0);
        assert_eq!(preset.extras.len(), 1);
        assert_eq!(preset.extras["windowLayout"]["split"], 0.3);
    }

    #[test]
    fn extras_survive_a_round_trip() {
        let original = PresetFile::new(ProcessorConfig {
            repeat: 3,
            ..ProcessorConfig::default()
        })
        .with_extra("theme", Value::String("dark".to_string()));
        let json = serde_json::to_string(&original).unwrap();
        let restored: PresetFile = serde_json::from_str(&json).unwrap();
        assert_eq!(original, restored);
    }

    #[test]
    fn processor_keys_are_not_extras() {
        let preset = PresetFile::default().with_extra("amplitude", Value::from(3));
        assert!(preset.extras.is_empty());
        assert_eq!(preset.config.amplitude, 100.0);
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let preset: PresetFile = serde_json::from_str(r#"{"repeat": 0}"#).unwrap();
        assert!(preset.validate().is_err());
    }
}
