use std::borrow::Cow;

use image::{DynamicImage, RgbImage, RgbaImage};
use thiserror::Error;

/// Channel arrangement of a frame's pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelLayout {
    /// Three interleaved 8-bit channels.
    Rgb,
    /// Three color channels plus an alpha channel that the pipeline carries
    /// through untouched.
    Rgba,
}

impl PixelLayout {
    /// Number of interleaved channels per pixel.
    pub const fn channels(self) -> usize {
        match self {
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame dimensions must be non-zero, got {width}x{height}")]
    EmptyDimensions { width: u32, height: u32 },
    #[error("buffer holds {actual} bytes, expected {expected} for a {width}x{height} frame")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

pub type Result<T> = std::result::Result<T, FrameError>;

/// A single video frame: an interleaved 8-bit pixel grid.
///
/// The buffer length always equals `width * height * channels`, which is
/// checked on construction so every stage can index pixels without bounds
/// bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    layout: PixelLayout,
}

impl Frame {
    /// Wrap an existing pixel buffer.
    pub fn new(width: u32, height: u32, layout: PixelLayout, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(FrameError::EmptyDimensions { width, height });
        }
        let expected = width as usize * height as usize * layout.channels();
        if data.len() != expected {
            return Err(FrameError::BufferSize {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            layout,
        })
    }

    /// A frame where every pixel has the same value.
    ///
    /// `pixel` must hold one value per channel of `layout`.
    pub fn filled(width: u32, height: u32, layout: PixelLayout, pixel: &[u8]) -> Result<Self> {
        let count = width as usize * height as usize;
        let data = pixel
            .iter()
            .copied()
            .cycle()
            .take(count * layout.channels())
            .collect();
        Self::new(width, height, layout, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn channels(&self) -> usize {
        self.layout.channels()
    }

    /// `(width, height)` in pixels.
    pub fn geometry(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Channel values of the pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let c = self.channels();
        let start = (y as usize * self.width as usize + x as usize) * c;
        &self.data[start..start + c]
    }

    /// The three color channels, dropping alpha if present.
    pub fn color_bytes(&self) -> Cow<'_, [u8]> {
        match self.layout {
            PixelLayout::Rgb => Cow::Borrowed(&self.data),
            PixelLayout::Rgba => Cow::Owned(
                self.data
                    .chunks_exact(4)
                    .flat_map(|px| [px[0], px[1], px[2]])
                    .collect(),
            ),
        }
    }

    /// Build a frame with this frame's geometry and layout from new color
    /// channels, carrying this frame's alpha channel over.
    ///
    /// Returns `None` when `rgb` does not hold exactly three bytes per pixel.
    pub fn with_color_bytes(&self, rgb: &[u8]) -> Option<Frame> {
        if rgb.len() != self.pixel_count() * 3 {
            return None;
        }
        let data = match self.layout {
            PixelLayout::Rgb => rgb.to_vec(),
            PixelLayout::Rgba => rgb
                .chunks_exact(3)
                .zip(self.data.chunks_exact(4))
                .flat_map(|(c, src)| [c[0], c[1], c[2], src[3]])
                .collect(),
        };
        Some(Frame {
            data,
            width: self.width,
            height: self.height,
            layout: self.layout,
        })
    }

    /// Apply `f` to the color channels of every pixel in place.
    pub fn map_color_mut<F>(&mut self, mut f: F)
    where
        F: FnMut([u8; 3]) -> [u8; 3],
    {
        let c = self.channels();
        for px in self.data.chunks_exact_mut(c) {
            let out = f([px[0], px[1], px[2]]);
            px[..3].copy_from_slice(&out);
        }
    }

    /// Convert a decoded image into a frame, keeping alpha only when the
    /// image has it.
    pub fn from_image(image: DynamicImage) -> Result<Self> {
        if image.color().has_alpha() {
            let rgba = image.into_rgba8();
            let (w, h) = rgba.dimensions();
            Self::new(w, h, PixelLayout::Rgba, rgba.into_raw())
        } else {
            let rgb = image.into_rgb8();
            let (w, h) = rgb.dimensions();
            Self::new(w, h, PixelLayout::Rgb, rgb.into_raw())
        }
    }

    /// Copy the frame into an `image` buffer for encoding.
    pub fn to_image(&self) -> DynamicImage {
        // Buffer length is validated on construction, so `from_raw` cannot fail.
        match self.layout {
            PixelLayout::Rgb => RgbImage::from_raw(self.width, self.height, self.data.clone())
                .map(DynamicImage::ImageRgb8),
            PixelLayout::Rgba => RgbaImage::from_raw(self.width, self.height, self.data.clone())
                .map(DynamicImage::ImageRgba8),
        }
        .unwrap_or_else(|| DynamicImage::new_rgb8(self.width, self.height))
    }
}
