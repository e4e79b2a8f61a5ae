//! Raw capture formats to RGB frames.
//!
//! YUV conversions use BT.601 with fixed-point integer arithmetic (<<8),
//! cheap enough to run on the capture thread for every frame.

use image::ImageFormat;

use crate::pipeline::frame::{Frame, PixelLayout};
use crate::source::error::{Result, SourceError};

#[inline]
fn yuv_to_rgb(y: i32, u: i32, v: i32) -> [u8; 3] {
    [
        ((y * 256 + 359 * v) >> 8).clamp(0, 255) as u8,
        ((y * 256 - 88 * u - 183 * v) >> 8).clamp(0, 255) as u8,
        ((y * 256 + 454 * u) >> 8).clamp(0, 255) as u8,
    ]
}

fn undersized(format: &str, actual: usize, expected: usize) -> SourceError {
    SourceError::Read(format!(
        "{format} buffer holds {actual} bytes, expected at least {expected}"
    ))
}

/// Convert YUY2 (YUYV) packed data to an RGB frame.
///
/// YUY2 stores two pixels per 4-byte macro-pixel: [Y0, U, Y1, V]. Width
/// must be even.
pub fn yuyv_to_frame(yuyv: &[u8], width: u32, height: u32) -> Result<Frame> {
    let (w, h) = (width as usize, height as usize);
    let expected = w * h * 2;
    if yuyv.len() < expected {
        return Err(undersized("YUYV", yuyv.len(), expected));
    }

    let mut rgb = Vec::with_capacity(w * h * 3);
    for px in yuyv[..expected].chunks_exact(4) {
        let u = px[1] as i32 - 128;
        let v = px[3] as i32 - 128;
        rgb.extend_from_slice(&yuv_to_rgb(px[0] as i32, u, v));
        rgb.extend_from_slice(&yuv_to_rgb(px[2] as i32, u, v));
    }
    Ok(Frame::new(width, height, PixelLayout::Rgb, rgb)?)
}

/// Convert NV12 planar data to an RGB frame.
///
/// NV12 stores a full-resolution Y plane followed by an interleaved UV plane
/// at half resolution in both dimensions (4:2:0 subsampling). Each 2x2 block
/// of pixels shares one U,V pair.
pub fn nv12_to_frame(nv12: &[u8], width: u32, height: u32) -> Result<Frame> {
    let (w, h) = (width as usize, height as usize);
    let expected = w * h * 3 / 2;
    if nv12.len() < expected {
        return Err(undersized("NV12", nv12.len(), expected));
    }

    let y_plane = &nv12[..w * h];
    let uv_plane = &nv12[w * h..];

    let mut rgb = vec![0u8; w * h * 3];
    for row in 0..h {
        for col in 0..w {
            let y = y_plane[row * w + col] as i32;
            let uv_index = (row / 2) * w + (col / 2) * 2;
            let u = uv_plane[uv_index] as i32 - 128;
            let v = uv_plane[uv_index + 1] as i32 - 128;

            let base = (row * w + col) * 3;
            rgb[base..base + 3].copy_from_slice(&yuv_to_rgb(y, u, v));
        }
    }
    Ok(Frame::new(width, height, PixelLayout::Rgb, rgb)?)
}

/// Decode one Motion-JPEG frame.
pub fn mjpeg_to_frame(jpeg: &[u8]) -> Result<Frame> {
    let image = image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg)?;
    Ok(Frame::from_image(image)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_yuy2_white_pixel_pair() {
        // Y=235, U=128, V=128 (no chroma)
        let frame = yuyv_to_frame(&[235, 128, 235, 128], 2, 1).unwrap();
        assert_eq!(frame.data(), &[235, 235, 235, 235, 235, 235]);
    }

    #[test]
    fn converts_yuy2_black_pixel_pair() {
        let frame = yuyv_to_frame(&[0, 128, 0, 128], 2, 1).unwrap();
        assert_eq!(frame.data(), &[0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn yuy2_chroma_shifts_channels() {
        // Strong V pushes red up and green down.
        let frame = yuyv_to_frame(&[128, 128, 128, 228], 2, 1).unwrap();
        let px = frame.pixel(0, 0);
        assert!(px[0] > 200);
        assert!(px[1] < 128);
        assert_eq!(px[2], 128);
    }

    #[test]
    fn yuy2_undersized_buffer_is_an_error() {
        assert!(matches!(
            yuyv_to_frame(&[0u8; 3], 2, 1),
            Err(SourceError::Read(_))
        ));
    }

    #[test]
    fn yuy2_zero_dimensions_is_an_error() {
        assert!(matches!(
            yuyv_to_frame(&[], 0, 0),
            Err(SourceError::Frame(_))
        ));
    }

    #[test]
    fn converts_nv12_grey() {
        let nv12 = vec![
            128, 128, 128, 128, // Y plane (2x2)
            128, 128, // UV plane
        ];
        let frame = nv12_to_frame(&nv12, 2, 2).unwrap();
        for pixel in frame.data().chunks(3) {
            assert_eq!(pixel, [128, 128, 128]);
        }
    }

    #[test]
    fn converts_nv12_4x2() {
        let mut nv12 = vec![200u8; 8]; // Y plane
        nv12.extend_from_slice(&[128, 128, 128, 128]); // UV plane
        let frame = nv12_to_frame(&nv12, 4, 2).unwrap();
        assert_eq!(frame.geometry(), (4, 2));
        for pixel in frame.data().chunks(3) {
            assert_eq!(pixel, [200, 200, 200]);
        }
    }

    #[test]
    fn nv12_undersized_buffer_is_an_error() {
        assert!(nv12_to_frame(&[0u8; 5], 2, 2).is_err());
    }

    #[test]
    fn decodes_mjpeg_frame() {
        let frame = Frame::filled(8, 8, PixelLayout::Rgb, &[10, 200, 30]).unwrap();
        let jpeg = crate::pipeline::compress::encode_jpeg(&frame, 95).unwrap();
        let decoded = mjpeg_to_frame(&jpeg).unwrap();
        assert_eq!(decoded.geometry(), (8, 8));
        assert_eq!(decoded.layout(), PixelLayout::Rgb);
    }

    #[test]
    fn garbage_mjpeg_is_an_error() {
        assert!(matches!(
            mjpeg_to_frame(&[0xFF, 0xD8, 0x00]),
            Err(SourceError::Decode(_))
        ));
    }
}
