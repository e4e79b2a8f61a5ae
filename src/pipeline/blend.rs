use fast_image_resize as fr;
use fr::images::Image;

use super::color::to_u8;
use super::config::BlendMode;
use super::frame::Frame;

/// Combine one channel value of the base (`a`) and the operand (`b`).
///
/// The result is unclamped; callers saturate once at the end.
pub fn blend_value(mode: BlendMode, a: f32, b: f32, base_weight: f32, blend_weight: f32) -> f32 {
    let (w0, w1) = (base_weight, blend_weight);
    match mode {
        BlendMode::None => b,
        BlendMode::Overlay | BlendMode::SoftLight => w0 * a + w1 * b,
        BlendMode::HardLight => w0 * a - w1 * b,
        BlendMode::Multiply => w1 * (a * b) / 255.0 + w0 * a,
        BlendMode::LinearBurn => w1 * (a + b - 255.0) + w0 * a,
        BlendMode::Screen => w0 * a + w1 * (255.0 - b),
        BlendMode::Darken => w1 * a.min(b) + w0 * a,
        BlendMode::Lighten => w1 * a.max(b) + w0 * a,
        BlendMode::Difference => w1 * (a - b).abs() + w0 * a,
        BlendMode::Exclusion => w1 * (a + b - 2.0 * a * b / 255.0) + w0 * a,
        BlendMode::Dodge => w1 * saturating_div(a, 255.0 - b) + w0 * a,
        BlendMode::Burn => w1 * (255.0 - saturating_div(255.0 - a, b)) + w0 * a,
    }
}

/// `num / den` capped at 255; a zero denominator saturates.
fn saturating_div(num: f32, den: f32) -> f32 {
    if den <= 0.0 {
        255.0
    } else {
        (num / den).min(255.0)
    }
}

/// Blend `operand` onto `base`.
///
/// The operand is resized to the base geometry when they differ. Only the
/// color channels are blended; alpha, if any, comes from `base`.
pub fn blend(
    base: &Frame,
    operand: &Frame,
    mode: BlendMode,
    base_weight: f32,
    blend_weight: f32,
) -> Frame {
    if mode == BlendMode::None {
        return operand.clone();
    }

    let a = base.color_bytes();
    let b = if operand.geometry() == base.geometry() {
        operand.color_bytes().into_owned()
    } else {
        match resize_color(operand, base.width(), base.height()) {
            Some(resized) => resized,
            None => return base.clone(),
        }
    };

    let mixed: Vec<u8> = a
        .iter()
        .zip(&b)
        .map(|(&a, &b)| {
            to_u8(blend_value(
                mode,
                a as f32,
                b as f32,
                base_weight,
                blend_weight,
            ))
        })
        .collect();
    base.with_color_bytes(&mixed)
        .unwrap_or_else(|| base.clone())
}

/// Resample a frame's color channels to `width` x `height`.
pub fn resize_color(frame: &Frame, width: u32, height: u32) -> Option<Vec<u8>> {
    let src = match Image::from_vec_u8(
        frame.width(),
        frame.height(),
        frame.color_bytes().into_owned(),
        fr::PixelType::U8x3,
    ) {
        Ok(image) => image,
        Err(e) => {
            tracing::warn!("blend operand rejected by resizer: {e}");
            return None;
        }
    };
    let mut dst = Image::new(width, height, fr::PixelType::U8x3);

    let mut resizer = fr::Resizer::new();
    if let Err(e) = resizer.resize(&src, &mut dst, None) {
        tracing::warn!("blend operand resize failed: {e}");
        return None;
    }
    Some(dst.into_vec())
}
