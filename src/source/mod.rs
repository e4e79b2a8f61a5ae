// Video sources: webcams, files and the synthetic test camera.

pub mod backend;
pub mod convert;
pub mod dummy;
pub mod error;
pub mod file;
pub mod types;
pub mod video;
#[cfg(feature = "v4l")]
pub mod v4l2;

pub use backend::{DefaultOpener, SourceOpener, VideoSource};
pub use error::SourceError;
pub use types::{Geometry, SourceSpec};
