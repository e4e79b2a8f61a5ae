// Settings: named processor presets on disk and live reloading of a preset file.

pub mod store;
pub mod types;
pub mod watch;

use thiserror::Error;

use crate::pipeline::config::ConfigError;

/// Preset persistence errors.
#[derive(Debug, Error)]
pub enum PresetError {
    #[error("invalid preset name {0:?}: use letters, digits, '-', '_' or spaces")]
    InvalidName(String),

    #[error("preset not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed preset: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, PresetError>;
