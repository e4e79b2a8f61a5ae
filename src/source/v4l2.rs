//! Linux webcams through V4L2 memory-mapped streaming.

use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

use crate::pipeline::frame::Frame;
use crate::source::backend::VideoSource;
use crate::source::convert::{mjpeg_to_frame, nv12_to_frame, yuyv_to_frame};
use crate::source::error::{Result, SourceError};
use crate::source::types::Geometry;

const BUFFER_COUNT: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RawFormat {
    Yuyv,
    Nv12,
    Mjpeg,
}

impl RawFormat {
    fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        match &fourcc.repr {
            b"YUYV" => Some(Self::Yuyv),
            b"NV12" => Some(Self::Nv12),
            b"MJPG" => Some(Self::Mjpeg),
            _ => None,
        }
    }
}

/// A `/dev/videoN` capture device.
pub struct V4l2Camera {
    index: u32,
    stream: Option<MmapStream<'static>>,
    format: RawFormat,
    geometry: Geometry,
}

impl V4l2Camera {
    /// Open the device and start streaming, preferring YUYV, then MJPG, at
    /// the device's current resolution.
    pub fn open(index: u32) -> Result<Self> {
        let path = format!("/dev/video{index}");
        let open_error = |reason: String| SourceError::Open {
            target: path.clone(),
            reason,
        };

        let dev = Device::with_path(&path).map_err(|e| open_error(e.to_string()))?;
        let current = dev.format().map_err(|e| open_error(e.to_string()))?;

        let mut accepted = None;
        for fourcc in [FourCC::new(b"YUYV"), FourCC::new(b"MJPG")] {
            let mut wanted = current.clone();
            wanted.fourcc = fourcc;
            match dev.set_format(&wanted) {
                Ok(f) if f.fourcc == fourcc => {
                    accepted = Some(f);
                    break;
                }
                Ok(f) => tracing::debug!("{path}: asked for {fourcc}, got {}", f.fourcc),
                Err(e) => tracing::debug!("{path}: {fourcc} rejected: {e}"),
            }
        }
        let format = accepted.unwrap_or(current);
        let raw = RawFormat::from_fourcc(format.fourcc).ok_or_else(|| {
            open_error(format!("unsupported pixel format {}", format.fourcc))
        })?;

        let mut geometry = Geometry::new(format.width, format.height);
        if let Ok(params) = dev.params() {
            let interval = params.interval;
            if interval.numerator > 0 {
                geometry = geometry.with_fps(interval.denominator as f32 / interval.numerator as f32);
            }
        }

        let stream = MmapStream::with_buffers(&dev, Type::VideoCapture, BUFFER_COUNT)
            .map_err(|e| open_error(e.to_string()))?;

        tracing::info!(
            "opened {path}: {}x{} {}",
            geometry.width,
            geometry.height,
            format.fourcc
        );
        Ok(Self {
            index,
            stream: Some(stream),
            format: raw,
            geometry,
        })
    }
}

impl VideoSource for V4l2Camera {
    fn read_frame(&mut self) -> Result<Option<Frame>> {
        let stream = self.stream.as_mut().ok_or(SourceError::Released)?;
        let (buf, meta) = stream.next().map_err(|e| SourceError::Read(e.to_string()))?;
        let used = (meta.bytesused as usize).min(buf.len());
        let data = if used > 0 { &buf[..used] } else { buf };

        let (width, height) = (self.geometry.width, self.geometry.height);
        let frame = match self.format {
            RawFormat::Yuyv => yuyv_to_frame(data, width, height)?,
            RawFormat::Nv12 => nv12_to_frame(data, width, height)?,
            RawFormat::Mjpeg => mjpeg_to_frame(data)?,
        };
        Ok(Some(frame))
    }

    /// Live devices have no position; seeking is a no-op.
    fn seek(&mut self, _index: u64) -> Result<()> {
        Ok(())
    }

    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn describe(&self) -> String {
        format!("webcam {} (/dev/video{})", self.index, self.index)
    }

    fn release(&mut self) {
        self.stream = None;
    }
}
