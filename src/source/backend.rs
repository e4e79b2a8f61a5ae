use crate::pipeline::frame::Frame;
use crate::source::dummy::SyntheticCamera;
use crate::source::error::Result;
use crate::source::file::FileSource;
use crate::source::types::{Geometry, SourceSpec};
use crate::source::video::{is_video_path, VideoFile};

/// An open stream of frames.
///
/// Owned by exactly one capture session at a time and driven from its loop
/// thread, so implementations need to be `Send` but not `Sync`.
pub trait VideoSource: Send {
    /// Pull the next frame.
    ///
    /// `Ok(None)` marks the end of a finite stream. Errors are read failures;
    /// the caller decides whether to rewind or stop.
    fn read_frame(&mut self) -> Result<Option<Frame>>;

    /// Reposition so the next read returns frame `index`.
    fn seek(&mut self, index: u64) -> Result<()>;

    /// Frame size and nominal rate.
    fn geometry(&self) -> Geometry;

    /// Whether running out of frames should rewind to the start.
    fn is_looping(&self) -> bool {
        false
    }

    /// Human-readable name for logs.
    fn describe(&self) -> String;

    /// Free the underlying device or file handles. Further reads fail.
    fn release(&mut self) {}
}

/// Opens a [`VideoSource`] for a [`SourceSpec`].
pub trait SourceOpener: Send + Sync {
    fn open(&self, spec: &SourceSpec) -> Result<Box<dyn VideoSource>>;
}

/// Opener used by the binary.
///
/// Webcams resolve to the synthetic camera when `DUMMY_CAMERA=1` is set,
/// otherwise to V4L2 when built with the `v4l` feature. Video containers
/// open through [`VideoFile`] (ffmpeg), everything else through
/// [`FileSource`].
#[derive(Debug, Clone)]
pub struct DefaultOpener {
    synthetic_webcam: bool,
}

impl Default for DefaultOpener {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultOpener {
    pub fn new() -> Self {
        Self {
            synthetic_webcam: SyntheticCamera::is_enabled(),
        }
    }

    /// Force webcams to resolve to the synthetic camera.
    pub fn synthetic() -> Self {
        Self {
            synthetic_webcam: true,
        }
    }
}

impl SourceOpener for DefaultOpener {
    fn open(&self, spec: &SourceSpec) -> Result<Box<dyn VideoSource>> {
        match spec {
            SourceSpec::Webcam { index } if self.synthetic_webcam => {
                Ok(Box::new(SyntheticCamera::new(*index)))
            }
            SourceSpec::Webcam { index } => open_webcam(*index),
            SourceSpec::File { path, looping } if is_video_path(path) => {
                Ok(Box::new(VideoFile::open(path, *looping)?))
            }
            SourceSpec::File { path, looping } => Ok(Box::new(FileSource::open(path, *looping)?)),
        }
    }
}

#[cfg(feature = "v4l")]
fn open_webcam(index: u32) -> Result<Box<dyn VideoSource>> {
    Ok(Box::new(crate::source::v4l2::V4l2Camera::open(index)?))
}

#[cfg(not(feature = "v4l"))]
fn open_webcam(index: u32) -> Result<Box<dyn VideoSource>> {
    Err(crate::source::error::SourceError::DeviceNotFound(format!(
        "webcam {index} (built without the v4l feature; set DUMMY_CAMERA=1 for a test pattern)"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::frame::PixelLayout;
    use crate::source::error::SourceError;

    /// Mock source for testing the trait contract.
    struct MockSource {
        frames: u64,
        position: u64,
    }

    impl VideoSource for MockSource {
        fn read_frame(&mut self) -> Result<Option<Frame>> {
            if self.position >= self.frames {
                return Ok(None);
            }
            self.position += 1;
            Ok(Some(Frame::filled(2, 2, PixelLayout::Rgb, &[0, 0, 0])?))
        }

        fn seek(&mut self, index: u64) -> Result<()> {
            if index >= self.frames {
                return Err(SourceError::SeekOutOfRange {
                    index,
                    len: self.frames,
                });
            }
            self.position = index;
            Ok(())
        }

        fn geometry(&self) -> Geometry {
            Geometry::new(2, 2)
        }

        fn describe(&self) -> String {
            "mock".to_string()
        }
    }

    #[test]
    fn mock_source_reads_until_exhausted() {
        let mut source = MockSource {
            frames: 2,
            position: 0,
        };
        assert!(source.read_frame().unwrap().is_some());
        assert!(source.read_frame().unwrap().is_some());
        assert!(source.read_frame().unwrap().is_none());
        source.seek(0).unwrap();
        assert!(source.read_frame().unwrap().is_some());
        assert!(source.seek(5).is_err());
        assert!(!source.is_looping());
    }

    #[test]
    fn synthetic_opener_resolves_webcams() {
        let opener = DefaultOpener::synthetic();
        let mut source = opener.open(&SourceSpec::webcam(0)).unwrap();
        assert!(source.read_frame().unwrap().is_some());
        assert!(!source.is_looping());
    }

    #[cfg(not(feature = "v4l"))]
    #[test]
    fn real_webcam_without_backend_is_not_found() {
        let opener = DefaultOpener {
            synthetic_webcam: false,
        };
        assert!(matches!(
            opener.open(&SourceSpec::webcam(3)),
            Err(SourceError::DeviceNotFound(_))
        ));
    }

    #[test]
    fn missing_file_fails_to_open() {
        let opener = DefaultOpener::synthetic();
        assert!(opener
            .open(&SourceSpec::file("/nonexistent/lvncam/clip.png"))
            .is_err());
    }

    #[test]
    fn video_files_route_to_the_ffmpeg_decoder() {
        let opener = DefaultOpener::synthetic();
        let err = opener
            .open(&SourceSpec::file("/nonexistent/lvncam/clip.mp4"))
            .err()
            .unwrap();
        assert!(err.to_string().contains("no such file"));
    }

    #[test]
    fn trait_objects_are_send() {
        fn assert_send<T: Send>() {}
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send::<Box<dyn VideoSource>>();
        assert_send_sync::<Box<dyn SourceOpener>>();
    }
}
