use image::codecs::jpeg::JpegEncoder;
use image::{ImageBuffer, ImageFormat, Rgb};
use thiserror::Error;

use super::frame::Frame;

#[derive(Debug, Error)]
pub enum CompressError {
    #[error("image codec error: {0}")]
    Codec(#[from] image::ImageError),
    #[error("decoded {actual:?} but expected {expected:?}")]
    Geometry {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

/// Encode the color channels of a frame as JPEG.
///
/// `quality` is clamped to 1..=100; 0 is treated as the lossiest setting.
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, CompressError> {
    let (width, height) = frame.geometry();
    let img: ImageBuffer<Rgb<u8>, _> = ImageBuffer::from_raw(width, height, frame.color_bytes())
        .ok_or(CompressError::Geometry {
            expected: (width, height),
            actual: (0, 0),
        })?;

    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    img.write_with_encoder(encoder)?;
    Ok(buf)
}

/// Decode JPEG bytes into the color channels of `like`, keeping its alpha.
fn decode_into(bytes: &[u8], like: &Frame) -> Result<Frame, CompressError> {
    let decoded = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)?.into_rgb8();
    let actual = decoded.dimensions();
    let geometry_error = CompressError::Geometry {
        expected: like.geometry(),
        actual,
    };
    if actual != like.geometry() {
        return Err(geometry_error);
    }
    like.with_color_bytes(decoded.as_raw())
        .ok_or(geometry_error)
}

/// Lossy JPEG encode/decode round trip.
///
/// Codec failures are not fatal: the input frame is returned unchanged and
/// a warning is logged.
pub fn jpeg_round_trip(frame: &Frame, quality: u8) -> Frame {
    match encode_jpeg(frame, quality).and_then(|bytes| decode_into(&bytes, frame)) {
        Ok(out) => out,
        Err(e) => {
            tracing::warn!("JPEG round trip at quality {quality} failed, passing frame through: {e}");
            frame.clone()
        }
    }
}
