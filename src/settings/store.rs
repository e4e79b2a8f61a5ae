use std::path::{Path, PathBuf};

use crate::settings::types::PresetFile;
use crate::settings::{PresetError, Result};

const MAX_NAME_LEN: usize = 64;

/// A directory of named presets, one `<name>.json` file each.
pub struct PresetStore {
    dir: PathBuf,
}

impl PresetStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `name`, after checking the name is safe to
    /// use as a file name.
    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        if !is_valid_name(name) {
            return Err(PresetError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(format!("{name}.json")))
    }

    /// Save a preset atomically, creating the directory if needed.
    pub fn save(&self, name: &str, preset: &PresetFile) -> Result<PathBuf> {
        let path = self.path_for(name)?;
        write_preset(&path, preset)?;
        tracing::info!("saved preset {name} to {}", path.display());
        Ok(path)
    }

    pub fn load(&self, name: &str) -> Result<PresetFile> {
        let path = self.path_for(name)?;
        if !path.exists() {
            return Err(PresetError::NotFound(name.to_string()));
        }
        read_preset(&path)
    }

    /// Names of all saved presets, sorted. A missing directory is empty.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut names: Vec<String> = std::fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .filter(|name| is_valid_name(name))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Delete a preset. Returns whether a file was removed.
    pub fn remove(&self, name: &str) -> Result<bool> {
        let path = self.path_for(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && !name.starts_with(' ')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ' '))
}

/// Read and validate a preset file.
pub fn read_preset(path: &Path) -> Result<PresetFile> {
    let contents = std::fs::read_to_string(path)?;
    let preset: PresetFile = serde_json::from_str(&contents)?;
    preset.validate()?;
    Ok(preset)
}

/// Write a preset atomically (write .tmp then rename).
pub fn write_preset(path: &Path, preset: &PresetFile) -> Result<()> {
    preset.validate()?;
    let json = serde_json::to_string_pretty(preset)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, &json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::config::{BlendMode, ProcessorConfig};
    use serde_json::Value;
    use tempfile::TempDir;

    /// Helper: create a store backed by a temp directory.
    fn temp_store() -> (PresetStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = PresetStore::new(dir.path().join("presets"));
        (store, dir)
    }

    fn sample() -> PresetFile {
        PresetFile::new(ProcessorConfig {
            amplitude: 42.0,
            selected_blend_mode: BlendMode::Screen,
            ..ProcessorConfig::default()
        })
        .with_extra("showOriginal", Value::Bool(false))
    }

    #[test]
    fn save_round_trips_through_load() {
        let (store, _dir) = temp_store();
        store.save("night", &sample()).unwrap();
        let loaded = store.load("night").unwrap();
        assert_eq!(loaded, sample());
    }

    #[test]
    fn save_creates_directory_and_leaves_no_tmp() {
        let (store, _dir) = temp_store();
        let path = store.save("night", &sample()).unwrap();
        assert!(path.exists());
        assert!(!store.dir().join("night.json.tmp").exists());
    }

    #[test]
    fn save_overwrites_existing_preset() {
        let (store, _dir) = temp_store();
        store.save("a", &sample()).unwrap();
        store.save("a", &PresetFile::default()).unwrap();
        assert_eq!(store.load("a").unwrap().config.amplitude, 100.0);
    }

    #[test]
    fn load_missing_preset_is_not_found() {
        let (store, _dir) = temp_store();
        assert!(matches!(
            store.load("nothing"),
            Err(PresetError::NotFound(_))
        ));
    }

    #[test]
    fn load_rejects_invalid_json() {
        let (store, _dir) = temp_store();
        std::fs::create_dir_all(store.dir()).unwrap();
        std::fs::write(store.dir().join("broken.json"), "not valid json!!!").unwrap();
        assert!(matches!(store.load("broken"), Err(PresetError::Json(_))));
    }

    #[test]
    fn load_rejects_out_of_range_values() {
        let (store, _dir) = temp_store();
        std::fs::create_dir_all(store.dir()).unwrap();
        std::fs::write(store.dir().join("wild.json"), r#"{"repeat": 99}"#).unwrap();
        assert!(matches!(store.load("wild"), Err(PresetError::Config(_))));
    }

    #[test]
    fn unsafe_names_are_rejected() {
        let (store, _dir) = temp_store();
        let long = "x".repeat(65);
        for name in ["", "../escape", "a/b", ".hidden", " lead", long.as_str()] {
            assert!(
                matches!(store.save(name, &sample()), Err(PresetError::InvalidName(_))),
                "{name:?} should be rejected"
            );
        }
        assert!(store.path_for("My Preset_2-b").is_ok());
    }

    #[test]
    fn list_returns_sorted_names() {
        let (store, _dir) = temp_store();
        assert!(store.list().unwrap().is_empty());
        store.save("zeta", &sample()).unwrap();
        store.save("alpha", &sample()).unwrap();
        std::fs::write(store.dir().join("notes.txt"), "skip").unwrap();
        assert_eq!(store.list().unwrap(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn remove_deletes_and_is_idempotent() {
        let (store, _dir) = temp_store();
        store.save("gone", &sample()).unwrap();
        assert!(store.remove("gone").unwrap());
        assert!(!store.remove("gone").unwrap());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn write_preset_refuses_invalid_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        let preset = PresetFile::new(ProcessorConfig {
            smoothness: 0.0,
            ..ProcessorConfig::default()
        });
        assert!(write_preset(&path, &preset).is_err());
        assert!(!path.exists());
    }
}
