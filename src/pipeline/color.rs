//! RGB to and from the supported color spaces.
//!
//! Every space has two forms here: a float "component" form in its natural
//! units (hue in degrees, L in 0..100, signed chroma around zero), used for
//! saturation scaling, and the 8-bit encoding that the conversion stage
//! writes into frames. The 8-bit encodings follow OpenCV's layouts so frames
//! look the same as they would coming out of `cvtColor`.

use std::sync::OnceLock;

use super::config::ColorSpace;
use super::frame::Frame;

/// D65 white point, normalized to Y = 1.
const XN: f32 = 0.950_456;
const ZN: f32 = 1.088_754;

const RGB_TO_XYZ: [[f32; 3]; 3] = [
    [0.412_453, 0.357_580, 0.180_423],
    [0.212_671, 0.715_160, 0.072_169],
    [0.019_334, 0.119_193, 0.950_227],
];

const XYZ_TO_RGB: [[f32; 3]; 3] = [
    [3.240_479, -1.537_150, -0.498_535],
    [-0.969_256, 1.875_991, 0.041_556],
    [0.055_648, -0.204_043, 1.057_311],
];

const LUV_DENOM: f32 = XN + 15.0 + 3.0 * ZN;
const UN: f32 = 4.0 * XN / LUV_DENOM;
const VN: f32 = 9.0 / LUV_DENOM;

const LAB_EPSILON: f32 = 0.008_856;
const LAB_KAPPA: f32 = 903.3;

fn mat_mul(m: &[[f32; 3]; 3], v: [f32; 3]) -> [f32; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

/// sRGB decode for every 8-bit value, computed once.
fn linear_lut() -> &'static [f32; 256] {
    static LUT: OnceLock<[f32; 256]> = OnceLock::new();
    LUT.get_or_init(|| {
        let mut lut = [0.0; 256];
        for (i, slot) in lut.iter_mut().enumerate() {
            *slot = srgb_to_linear(i as f32 / 255.0);
        }
        lut
    })
}

fn srgb_to_linear(v: f32) -> f32 {
    if v <= 0.040_45 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(v: f32) -> f32 {
    let v = v.clamp(0.0, 1.0);
    if v <= 0.003_130_8 {
        v * 12.92
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    }
}

fn lab_f(t: f32) -> f32 {
    if t > LAB_EPSILON {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

fn lab_f_inv(t: f32) -> f32 {
    let cubed = t * t * t;
    if cubed > LAB_EPSILON {
        cubed
    } else {
        (t - 16.0 / 116.0) / 7.787
    }
}

/// Shared by HSV and HLS: returns `(hue_degrees, max, min, delta)`.
fn hue_and_extrema([r, g, b]: [f32; 3]) -> (f32, f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let hue = if delta <= f32::EPSILON {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta)
    } else if max == g {
        60.0 * ((b - r) / delta) + 120.0
    } else {
        60.0 * ((r - g) / delta) + 240.0
    };
    let hue = if hue < 0.0 { hue + 360.0 } else { hue };
    (hue, max, min, delta)
}

/// RGB from hue, chroma and the lightness offset `m`.
fn from_hue_chroma(hue: f32, chroma: f32, m: f32) -> [f32; 3] {
    let h = hue.rem_euclid(360.0) / 60.0;
    let x = chroma * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    [r + m, g + m, b + m]
}

fn luma(r: f32, g: f32, b: f32) -> f32 {
    0.299 * r + 0.587 * g + 0.114 * b
}

/// Convert an 8-bit RGB pixel into `space`'s natural-unit components.
pub fn to_components(space: ColorSpace, rgb: [u8; 3]) -> [f32; 3] {
    let [r, g, b] = rgb.map(|v| v as f32 / 255.0);
    match space {
        ColorSpace::Rgb => [r, g, b],
        ColorSpace::Hsv => {
            let (h, max, _, delta) = hue_and_extrema([r, g, b]);
            let s = if max > 0.0 { delta / max } else { 0.0 };
            [h, s, max]
        }
        ColorSpace::Hls => {
            let (h, max, min, delta) = hue_and_extrema([r, g, b]);
            let l = (max + min) / 2.0;
            let s = if delta <= f32::EPSILON {
                0.0
            } else if l < 0.5 {
                delta / (max + min)
            } else {
                delta / (2.0 - max - min)
            };
            [h, l, s]
        }
        ColorSpace::Lab => {
            let lut = linear_lut();
            let [x, y, z] = mat_mul(&RGB_TO_XYZ, rgb.map(|v| lut[v as usize]));
            let (fx, fy, fz) = (lab_f(x / XN), lab_f(y), lab_f(z / ZN));
            [116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz)]
        }
        ColorSpace::Luv => {
            let lut = linear_lut();
            let [x, y, z] = mat_mul(&RGB_TO_XYZ, rgb.map(|v| lut[v as usize]));
            let l = if y > LAB_EPSILON {
                116.0 * y.cbrt() - 16.0
            } else {
                LAB_KAPPA * y
            };
            let denom = x + 15.0 * y + 3.0 * z;
            if denom <= f32::EPSILON {
                return [l, 0.0, 0.0];
            }
            let u = 13.0 * l * (4.0 * x / denom - UN);
            let v = 13.0 * l * (9.0 * y / denom - VN);
            [l, u, v]
        }
        ColorSpace::Xyz => mat_mul(&RGB_TO_XYZ, [r, g, b]),
        ColorSpace::YCrCb => {
            let y = luma(r, g, b);
            [y, (r - y) * 0.713, (b - y) * 0.564]
        }
        ColorSpace::Yuv => {
            let y = luma(r, g, b);
            [y, 0.492 * (b - y), 0.877 * (r - y)]
        }
    }
}

/// Convert natural-unit components of `space` back to 8-bit RGB, clipping
/// out-of-gamut results.
pub fn from_components(space: ColorSpace, c: [f32; 3]) -> [u8; 3] {
    let rgb = match space {
        ColorSpace::Rgb => c,
        ColorSpace::Hsv => {
            let [h, s, v] = c;
            let chroma = v * s;
            from_hue_chroma(h, chroma, v - chroma)
        }
        ColorSpace::Hls => {
            let [h, l, s] = c;
            let chroma = (1.0 - (2.0 * l - 1.0).abs()) * s;
            from_hue_chroma(h, chroma, l - chroma / 2.0)
        }
        ColorSpace::Lab => {
            let [l, a, b] = c;
            let fy = (l + 16.0) / 116.0;
            let xyz = [
                XN * lab_f_inv(fy + a / 500.0),
                lab_f_inv(fy),
                ZN * lab_f_inv(fy - b / 200.0),
            ];
            mat_mul(&XYZ_TO_RGB, xyz).map(linear_to_srgb)
        }
        ColorSpace::Luv => {
            let [l, u, v] = c;
            if l <= 0.0 {
                return [0, 0, 0];
            }
            let y = if l > 8.0 {
                ((l + 16.0) / 116.0).powi(3)
            } else {
                l / LAB_KAPPA
            };
            let up = u / (13.0 * l) + UN;
            let vp = v / (13.0 * l) + VN;
            let xyz = if vp.abs() <= f32::EPSILON {
                [0.0, y, 0.0]
            } else {
                [
                    y * 9.0 * up / (4.0 * vp),
                    y,
                    y * (12.0 - 3.0 * up - 20.0 * vp) / (4.0 * vp),
                ]
            };
            mat_mul(&XYZ_TO_RGB, xyz).map(linear_to_srgb)
        }
        ColorSpace::Xyz => mat_mul(&XYZ_TO_RGB, c),
        ColorSpace::YCrCb => {
            let [y, cr, cb] = c;
            [y + 1.403 * cr, y - 0.714 * cr - 0.344 * cb, y + 1.773 * cb]
        }
        ColorSpace::Yuv => {
            let [y, u, v] = c;
            [y + 1.140 * v, y - 0.395 * u - 0.581 * v, y + 2.032 * u]
        }
    };
    rgb.map(|v| to_u8(v * 255.0))
}

/// Scale the chroma of natural-unit components by `factor`.
///
/// Lightness is kept; chroma is scaled around the space's neutral axis so
/// a factor of 0 yields gray in every space. For XYZ the neutral point is
/// the D65 white scaled to the pixel's Y.
pub fn scale_chroma(space: ColorSpace, c: [f32; 3], factor: f32) -> [f32; 3] {
    match space {
        ColorSpace::Rgb => {
            let gray = luma(c[0], c[1], c[2]);
            c.map(|v| gray + factor * (v - gray))
        }
        ColorSpace::Hsv => [c[0], (c[1] * factor).clamp(0.0, 1.0), c[2]],
        ColorSpace::Hls => [c[0], c[1], (c[2] * factor).clamp(0.0, 1.0)],
        ColorSpace::Lab | ColorSpace::Luv | ColorSpace::YCrCb | ColorSpace::Yuv => {
            [c[0], c[1] * factor, c[2] * factor]
        }
        ColorSpace::Xyz => {
            let y = c[1];
            let (x0, z0) = (XN * y, ZN * y);
            [x0 + (c[0] - x0) * factor, y, z0 + (c[2] - z0) * factor]
        }
    }
}

/// The 8-bit encoding of an RGB pixel in `space`.
pub fn encode_pixel(space: ColorSpace, rgb: [u8; 3]) -> [u8; 3] {
    let c = to_components(space, rgb);
    match space {
        ColorSpace::Rgb => rgb,
        ColorSpace::Hsv | ColorSpace::Hls => {
            let hue = (c[0] / 2.0).round();
            let hue = if hue >= 180.0 { hue - 180.0 } else { hue };
            [to_u8(hue), to_u8(c[1] * 255.0), to_u8(c[2] * 255.0)]
        }
        ColorSpace::Lab => [
            to_u8(c[0] * 255.0 / 100.0),
            to_u8(c[1] + 128.0),
            to_u8(c[2] + 128.0),
        ],
        ColorSpace::Luv => [
            to_u8(c[0] * 255.0 / 100.0),
            to_u8((c[1] + 134.0) * 255.0 / 354.0),
            to_u8((c[2] + 140.0) * 255.0 / 262.0),
        ],
        ColorSpace::Xyz => c.map(|v| to_u8(v * 255.0)),
        ColorSpace::YCrCb | ColorSpace::Yuv => [
            to_u8(c[0] * 255.0),
            to_u8(c[1] * 255.0 + 128.0),
            to_u8(c[2] * 255.0 + 128.0),
        ],
    }
}

/// Re-encode a frame's color channels into `space`. RGB returns a copy.
pub fn convert_frame(frame: &Frame, space: ColorSpace) -> Frame {
    let mut out = frame.clone();
    if space != ColorSpace::Rgb {
        out.map_color_mut(|px| encode_pixel(space, px));
    }
    out
}

/// Round and saturate to the 8-bit range.
pub(crate) fn to_u8(v: f32) -> u8 {
    if v.is_nan() {
        0
    } else {
        v.round().clamp(0.0, 255.0) as u8
    }
}
