// Frame pipeline: adjustment, LVN filtering, color conversion, blending
// and recompression of single frames.

pub mod adjust;
pub mod blend;
pub mod color;
pub mod compress;
pub mod config;
pub mod frame;
pub mod lvn;

use config::ProcessorConfig;
use frame::Frame;

/// Turns one raw frame into the filtered output frame.
///
/// Processing never fails: codec and resize errors fall back to passing the
/// intermediate frame through, so a bad frame degrades the picture instead
/// of stopping the stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameProcessor;

impl FrameProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Run every stage against `config`, in order:
    /// brightness/contrast, saturation, base recompression, LVN, color
    /// space conversion, blend and final recompression.
    pub fn process(&self, frame: &Frame, config: &ProcessorConfig) -> Frame {
        let mut adjusted = frame.clone();
        adjust::brightness_contrast(&mut adjusted, config);
        adjust::saturation(&mut adjusted, config.selected_color_space, config.saturation);

        let base = compress::jpeg_round_trip(&adjusted, config.blend_jpeg_quality);

        let filtered = if config.apply_filter {
            lvn::local_variance_normalize(&base, config)
        } else {
            base.clone()
        };

        let converted = color::convert_frame(&filtered, config.selected_color_space);

        let composed = if config.apply_blending() {
            blend::blend(
                &base,
                &converted,
                config.selected_blend_mode,
                config.base_weight,
                config.blend_weight,
            )
        } else {
            converted
        };

        compress::jpeg_round_trip(&composed, config.jpeg_quality)
    }
}

#[cfg(test)]
mod tests {
    use super::config::{BlendMode, ColorSpace};
    use super::frame::PixelLayout;
    use super::*;

    fn scene(width: u32, height: u32) -> Frame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                let checker = if (x / 8 + y / 8) % 2 == 0 { 60 } else { 190 };
                data.extend_from_slice(&[(x * 4 % 256) as u8, checker, (y * 4 % 256) as u8]);
            }
        }
        Frame::new(width, height, PixelLayout::Rgb, data).unwrap()
    }

    #[test]
    fn process_is_deterministic_after_reset() {
        let frame = scene(48, 32);
        let config = ProcessorConfig::default();
        let processor = FrameProcessor::new();
        let a = processor.process(&frame, &config);
        let b = processor.process(&frame, &config);
        assert_eq!(a, b);
        assert_eq!(a.geometry(), frame.geometry());
        assert_eq!(frame, scene(48, 32));
    }

    #[test]
    fn blend_none_matches_skipping_the_blend_stage() {
        let frame = scene(32, 32);
        let config = ProcessorConfig {
            selected_color_space: ColorSpace::Hsv,
            ..Default::default()
        };
        let out = FrameProcessor::new().process(&frame, &config);

        let base = compress::jpeg_round_trip(&frame, config.blend_jpeg_quality);
        let filtered = lvn::local_variance_normalize(&base, &config);
        let converted = color::convert_frame(&filtered, config.selected_color_space);
        let expected = compress::jpeg_round_trip(&converted, config.jpeg_quality);
        assert_eq!(out, expected);
    }

    #[test]
    fn uniform_gray_survives_full_pipeline() {
        let frame = Frame::filled(64, 64, PixelLayout::Rgb, &[128, 128, 128]).unwrap();
        let config = ProcessorConfig {
            amplitude: 50.0,
            ..Default::default()
        };
        let out = FrameProcessor::new().process(&frame, &config);
        assert!(
            out.data().iter().all(|&v| (127..=129).contains(&v)),
            "gray frame drifted"
        );
    }

    #[test]
    fn blend_mode_changes_output() {
        let frame = scene(32, 32);
        let plain = FrameProcessor::new().process(&frame, &ProcessorConfig::default());
        let blended = FrameProcessor::new().process(
            &frame,
            &ProcessorConfig {
                selected_blend_mode: BlendMode::Difference,
                ..Default::default()
            },
        );
        assert_ne!(plain, blended);
    }

    #[test]
    fn alpha_is_carried_through_every_stage() {
        let data = (0..16 * 16)
            .flat_map(|i| [(i % 256) as u8, 90, 200, (i % 7) as u8 * 30])
            .collect();
        let frame = Frame::new(16, 16, PixelLayout::Rgba, data).unwrap();
        let config = ProcessorConfig {
            selected_blend_mode: BlendMode::Screen,
            selected_color_space: ColorSpace::Lab,
            saturation: 0.5,
            brightness: 20.0,
            ..Default::default()
        };
        let out = FrameProcessor::new().process(&frame, &config);
        let alpha_in: Vec<u8> = frame.data().iter().skip(3).step_by(4).copied().collect();
        let alpha_out: Vec<u8> = out.data().iter().skip(3).step_by(4).copied().collect();
        assert_eq!(alpha_in, alpha_out);
    }

    #[test]
    fn filter_off_leaves_only_recompression() {
        let frame = scene(24, 24);
        let config = ProcessorConfig {
            apply_filter: false,
            ..Default::default()
        };
        let out = FrameProcessor::new().process(&frame, &config);
        let base = compress::jpeg_round_trip(&frame, config.blend_jpeg_quality);
        assert_eq!(out, compress::jpeg_round_trip(&base, config.jpeg_quality));
    }
}
