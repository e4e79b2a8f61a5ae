use super::color::{from_components, scale_chroma, to_components, to_u8};
use super::config::{ColorSpace, ProcessorConfig};
use super::frame::Frame;

/// Linear brightness/contrast on the color channels.
///
/// `out = clamp(contrast * in + (normalized_brightness - 1) * 255)`. Skipped
/// entirely when both parameters are neutral.
pub fn brightness_contrast(frame: &mut Frame, config: &ProcessorConfig) {
    let contrast = config.contrast;
    let offset = (config.normalized_brightness() - 1.0) * 255.0;
    if contrast == 1.0 && offset == 0.0 {
        return;
    }

    let mut lut = [0u8; 256];
    for (i, slot) in lut.iter_mut().enumerate() {
        *slot = to_u8(contrast * i as f32 + offset);
    }
    frame.map_color_mut(|px| px.map(|v| lut[v as usize]));
}

/// Scale chroma by `factor` in `space`, then return to RGB.
///
/// A factor of 1 is a no-op. For RGB the pixel is pulled toward (or pushed
/// away from) its BT.601 luma.
pub fn saturation(frame: &mut Frame, space: ColorSpace, factor: f32) {
    if factor == 1.0 {
        return;
    }
    frame.map_color_mut(|px| {
        let scaled = scale_chroma(space, to_components(space, px), factor);
        from_components(space, scaled)
    });
}
