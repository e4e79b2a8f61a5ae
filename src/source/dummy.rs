use std::time::{Duration, Instant};

use crate::pipeline::frame::Frame;
use crate::source::backend::VideoSource;
use crate::source::convert::yuyv_to_frame;
use crate::source::error::{Result, SourceError};
use crate::source::types::Geometry;

const SYNTHETIC_WIDTH: u32 = 320;
const SYNTHETIC_HEIGHT: u32 = 240;
const SYNTHETIC_FPS: f32 = 30.0;

/// A fake webcam for running without real hardware.
///
/// Produces an endless moving test pattern. Frames are generated as packed
/// YUYV, the way most UVC cameras deliver them, and go through the same
/// conversion as a real capture. Reads are paced to the configured frame
/// interval.
///
/// Enable via `DUMMY_CAMERA=1` environment variable.
pub struct SyntheticCamera {
    index: u32,
    width: u32,
    height: u32,
    frame_interval: Duration,
    sequence: u64,
    last_frame: Option<Instant>,
    released: bool,
}

impl SyntheticCamera {
    /// A 320x240 camera at 30 fps.
    pub fn new(index: u32) -> Self {
        Self {
            index,
            width: SYNTHETIC_WIDTH,
            height: SYNTHETIC_HEIGHT,
            frame_interval: Duration::from_secs_f32(1.0 / SYNTHETIC_FPS),
            sequence: 0,
            last_frame: None,
            released: false,
        }
    }

    /// Override the frame size. Width is rounded up to an even number.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = (width.max(2) + 1) & !1;
        self.height = height.max(1);
        self
    }

    /// Override the pacing between reads. Zero disables pacing.
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Whether the synthetic camera is enabled via environment variable.
    pub fn is_enabled() -> bool {
        std::env::var("DUMMY_CAMERA").is_ok_and(|v| v == "1" || v == "true")
    }

    /// Frames produced since open or the last seek.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Packed YUYV test pattern for frame `sequence`: a luma ramp scrolling
    /// right, chroma varying down the frame and a bright vertical bar.
    pub fn pattern_yuyv(width: u32, height: u32, sequence: u64) -> Vec<u8> {
        let (w, h) = (width as usize, height as usize);
        let shift = (sequence * 4) as usize;
        let bar = (sequence as usize * 2) % w.max(1);
        let mut buf = Vec::with_capacity(w * h * 2);
        for y in 0..h {
            let u = (64 + y * 128 / h.max(1)) as u8;
            let v = (192 - y * 128 / h.max(1)) as u8;
            for x in (0..w).step_by(2) {
                let luma = |x: usize| {
                    if x / 4 == bar / 4 {
                        235
                    } else {
                        (16 + ((x + shift) * 219 / w.max(1)) % 220) as u8
                    }
                };
                buf.extend_from_slice(&[luma(x), u, luma(x + 1), v]);
            }
        }
        buf
    }

    fn pace(&mut self) {
        if let Some(last) = self.last_frame {
            let elapsed = last.elapsed();
            if elapsed < self.frame_interval {
                std::thread::sleep(self.frame_interval - elapsed);
            }
        }
        self.last_frame = Some(Instant::now());
    }
}

impl VideoSource for SyntheticCamera {
    fn read_frame(&mut self) -> Result<Option<Frame>> {
        if self.released {
            return Err(SourceError::Released);
        }
        self.pace();
        let raw = Self::pattern_yuyv(self.width, self.height, self.sequence);
        let frame = yuyv_to_frame(&raw, self.width, self.height)?;
        self.sequence += 1;
        Ok(Some(frame))
    }

    fn seek(&mut self, index: u64) -> Result<()> {
        if self.released {
            return Err(SourceError::Released);
        }
        self.sequence = index;
        Ok(())
    }

    fn geometry(&self) -> Geometry {
        let fps = if self.frame_interval.is_zero() {
            0.0
        } else {
            1.0 / self.frame_interval.as_secs_f32()
        };
        Geometry::new(self.width, self.height).with_fps(fps)
    }

    fn describe(&self) -> String {
        format!("synthetic webcam {}", self.index)
    }

    fn release(&mut self) {
        self.released = true;
    }
}
