use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};

use crate::pipeline::config::SharedConfig;
use crate::settings::store::read_preset;
use crate::settings::PresetError;

/// What the watcher compares between polls.
type Stamp = Option<(SystemTime, u64)>;

fn stamp(path: &Path) -> Stamp {
    let meta = std::fs::metadata(path).ok()?;
    Some((meta.modified().ok()?, meta.len()))
}

/// Reloads a preset file into a [`SharedConfig`] whenever it changes on
/// disk, so a running capture picks up edits on its next frame.
///
/// Invalid files are logged and skipped; the last good config stays in
/// place. The watcher thread stops when this value is dropped.
pub struct PresetWatcher {
    path: PathBuf,
    stop: Arc<AtomicBool>,
    applied: Arc<AtomicU64>,
    thread: Option<JoinHandle<()>>,
}

impl PresetWatcher {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

    /// Start polling `path`. The file's current contents are assumed to be
    /// loaded already; only later changes are applied.
    pub fn spawn(
        path: impl Into<PathBuf>,
        config: SharedConfig,
        interval: Duration,
    ) -> std::io::Result<Self> {
        let path = path.into();
        let stop = Arc::new(AtomicBool::new(false));
        let applied = Arc::new(AtomicU64::new(0));
        let initial = stamp(&path);

        let thread = {
            let path = path.clone();
            let stop = Arc::clone(&stop);
            let applied = Arc::clone(&applied);
            std::thread::Builder::new()
                .name("preset-watch".to_string())
                .spawn(move || watch(&path, &config, interval, initial, &stop, &applied))?
        };

        tracing::debug!("watching {} for preset changes", path.display());
        Ok(Self {
            path,
            stop,
            applied,
            thread: Some(thread),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of changes applied so far.
    pub fn applied(&self) -> u64 {
        self.applied.load(Ordering::Relaxed)
    }

    /// Stop the watcher thread. Idempotent.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }
}

impl Drop for PresetWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn watch(
    path: &Path,
    config: &SharedConfig,
    interval: Duration,
    mut last: Stamp,
    stop: &AtomicBool,
    applied: &AtomicU64,
) {
    while !stop.load(Ordering::Relaxed) {
        std::thread::park_timeout(interval);
        if stop.load(Ordering::Relaxed) {
            break;
        }

        let current = stamp(path);
        if current == last || current.is_none() {
            continue;
        }
        last = current;

        let result = read_preset(path)
            .and_then(|preset| config.set(preset.config).map_err(PresetError::from));
        match result {
            Ok(()) => {
                applied.fetch_add(1, Ordering::Relaxed);
                tracing::info!("reloaded preset {}", path.display());
            }
            Err(e) => tracing::warn!("ignoring preset {}: {e}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::config::{ColorSpace, ProcessorConfig};
    use crate::settings::store::write_preset;
    use crate::settings::types::PresetFile;
    use std::time::Instant;
    use tempfile::TempDir;

    const FAST: Duration = Duration::from_millis(10);

    fn wait_for(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn applies_changes_to_shared_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("live.json");
        write_preset(&path, &PresetFile::default()).unwrap();

        let config = SharedConfig::default();
        let watcher = PresetWatcher::spawn(&path, config.clone(), FAST).unwrap();

        let edited = PresetFile::new(ProcessorConfig {
            amplitude: 12.5,
            selected_color_space: ColorSpace::Hsv,
            ..ProcessorConfig::default()
        })
        .with_extra("note", serde_json::Value::String("changed".to_string()));
        write_preset(&path, &edited).unwrap();

        assert!(wait_for(|| watcher.applied() == 1));
        assert_eq!(config.snapshot().amplitude, 12.5);
        assert_eq!(config.snapshot().selected_color_space, ColorSpace::Hsv);
    }

    #[test]
    fn invalid_file_keeps_last_good_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("live.json");
        write_preset(&path, &PresetFile::default()).unwrap();

        let config = SharedConfig::default();
        let _watcher = PresetWatcher::spawn(&path, config.clone(), FAST).unwrap();

        std::fs::write(&path, r#"{"amplitude": -5, "padding": "xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx"}"#)
            .unwrap();
        std::thread::sleep(FAST * 10);
        assert_eq!(config.snapshot(), ProcessorConfig::default());

        std::fs::write(&path, r#"{"amplitude": 7}"#).unwrap();
        assert!(wait_for(|| config.snapshot().amplitude == 7.0));
    }

    #[test]
    fn missing_file_is_tolerated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("later.json");
        let config = SharedConfig::default();
        let watcher = PresetWatcher::spawn(&path, config.clone(), FAST).unwrap();

        std::thread::sleep(FAST * 3);
        std::fs::write(&path, r#"{"repeat": 4}"#).unwrap();
        assert!(wait_for(|| config.snapshot().repeat == 4));
        assert_eq!(watcher.path(), path.as_path());
    }

    #[test]
    fn stop_is_idempotent_and_prompt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("live.json");
        let mut watcher =
            PresetWatcher::spawn(&path, SharedConfig::default(), Duration::from_secs(60)).unwrap();
        let start = Instant::now();
        watcher.stop();
        watcher.stop();
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
