//! Live local variance normalization for webcam and file video.
//!
//! [`pipeline`] turns one frame into its filtered output, [`preview`] runs a
//! capture session from a [`source`] into a sink, and [`settings`] persists
//! the processor configuration as named presets.

pub mod diagnostics;
pub mod pipeline;
pub mod preview;
pub mod settings;
pub mod source;
