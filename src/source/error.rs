use thiserror::Error;

use crate::pipeline::frame::FrameError;

/// Video source errors.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("failed to open {target}: {reason}")]
    Open { target: String, reason: String },

    #[error("no frames available in {0}")]
    Empty(String),

    #[error("frame read failed: {0}")]
    Read(String),

    #[error("cannot seek to frame {index}: source has {len} frames")]
    SeekOutOfRange { index: u64, len: u64 },

    #[error("source has been released")]
    Released,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, SourceError>;
