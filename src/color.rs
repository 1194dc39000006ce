//! RGBW color value with HSV conversion and two blending modes.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default, TS)]
#[ts(export, export_to = "color.ts")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    #[serde(default)]
    pub w: u8,
}

/// Hue in degrees [0, 360), saturation and value in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hsv {
    pub h: f64,
    pub s: f64,
    pub v: f64,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "color.ts")]
pub enum Interpolation {
    Linear,
    Hsv,
}

impl Interpolation {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "linear" => Some(Interpolation::Linear),
            "hsv" => Some(Interpolation::Hsv),
            _ => None,
        }
    }
}

fn clamp_channel(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 255.0) as u8
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, w: u8) -> Self {
        Self { r, g, b, w }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, w: 0 }
    }

    /// Unpack a `0xWWRRGGBB` word.
    pub const fn from_packed(value: u32) -> Self {
        Self {
            r: (value >> 16) as u8,
            g: (value >> 8) as u8,
            b: value as u8,
            w: (value >> 24) as u8,
        }
    }

    pub const fn packed(self) -> u32 {
        ((self.w as u32) << 24) | ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    /// HSV view of the RGB channels. White is not part of it.
    pub fn to_hsv(self) -> Hsv {
        let r = self.r as f64 / 255.0;
        let g = self.g as f64 / 255.0;
        let b = self.b as f64 / 255.0;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;

        let h = if delta == 0.0 {
            0.0
        } else if max == r {
            60.0 * ((g - b) / delta).rem_euclid(6.0)
        } else if max == g {
            60.0 * ((b - r) / delta + 2.0)
        } else {
            60.0 * ((r - g) / delta + 4.0)
        };
        let s = if max == 0.0 { 0.0 } else { delta / max };

        Hsv {
            h: h.rem_euclid(360.0),
            s,
            v: max,
        }
    }

    pub fn from_hsv(h: f64, s: f64, v: f64) -> Self {
        Self::from_hsv_white(h, s, v, 0)
    }

    pub fn from_hsv_white(h: f64, s: f64, v: f64, w: u8) -> Self {
        let h = if h.is_finite() { h.rem_euclid(360.0) } else { 0.0 };
        let s = s.clamp(0.0, 1.0);
        let v = v.clamp(0.0, 1.0);

        let c = v * s;
        let h6 = h / 60.0;
        let x = c * (1.0 - (h6.rem_euclid(2.0) - 1.0).abs());
        let m = v - c;

        let (r1, g1, b1) = match h6 as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };

        Color {
            r: clamp_channel((r1 + m) * 255.0),
            g: clamp_channel((g1 + m) * 255.0),
            b: clamp_channel((b1 + m) * 255.0),
            w,
        }
    }

    /// Channels scaled by `factor`, floored.
    pub fn scaled(self, factor: f64) -> Self {
        let f = |c: u8| {
            let v = (c as f64 * factor).floor();
            if v.is_nan() {
                0
            } else {
                v.clamp(0.0, 255.0) as u8
            }
        };
        Color {
            r: f(self.r),
            g: f(self.g),
            b: f(self.b),
            w: f(self.w),
        }
    }
}

impl From<u32> for Color {
    fn from(value: u32) -> Self {
        Color::from_packed(value)
    }
}

impl From<Color> for u32 {
    fn from(value: Color) -> Self {
        value.packed()
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn unit(t: f64) -> f64 {
    if t.is_nan() {
        0.0
    } else {
        t.clamp(0.0, 1.0)
    }
}

/// Component-wise blend. `t` is clamped to [0, 1].
pub fn interpolate_linear(from: Color, to: Color, t: f64) -> Color {
    let t = unit(t);
    if t == 0.0 {
        return from;
    }
    if t == 1.0 {
        return to;
    }
    Color {
        r: clamp_channel(lerp(from.r as f64, to.r as f64, t)),
        g: clamp_channel(lerp(from.g as f64, to.g as f64, t)),
        b: clamp_channel(lerp(from.b as f64, to.b as f64, t)),
        w: clamp_channel(lerp(from.w as f64, to.w as f64, t)),
    }
}

/// Blend through HSV along the shorter hue arc. White still blends linearly.
pub fn interpolate_hsv(from: Color, to: Color, t: f64) -> Color {
    let t = unit(t);
    if t == 0.0 {
        return from;
    }
    if t == 1.0 {
        return to;
    }
    let a = from.to_hsv();
    let b = to.to_hsv();
    let (mut h1, mut h2) = (a.h, b.h);
    if (h2 - h1).abs() > 180.0 {
        if h1 < h2 {
            h1 += 360.0;
        } else {
            h2 += 360.0;
        }
    }
    let h = lerp(h1, h2, t).rem_euclid(360.0);
    let w = clamp_channel(lerp(from.w as f64, to.w as f64, t));
    Color::from_hsv_white(h, lerp(a.s, b.s, t), lerp(a.v, b.v, t), w)
}

pub fn interpolate(from: Color, to: Color, t: f64, mode: Interpolation) -> Color {
    match mode {
        Interpolation::Linear => interpolate_linear(from, to, t),
        Interpolation::Hsv => interpolate_hsv(from, to, t),
    }
}

/// Full-saturation hue sweep with period 1.
pub fn rainbow(value: f64) -> Color {
    let value = if value.is_finite() { value } else { 0.0 };
    Color::from_hsv(value.rem_euclid(1.0) * 360.0, 1.0, 1.0)
}
