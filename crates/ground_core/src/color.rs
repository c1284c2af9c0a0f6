//! Colors and identification colors
//!
//! [`IdColor`] is the quantized form of a [`Color`] used as a picking key.
//! Registration and read-back both go through [`IdColor::from_color`] /
//! [`IdColor::from_rgba8`], so the packed key is identical on both sides.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Golden ratio conjugate used to spread sampled hues
pub const GOLDEN_RATIO_CONJUGATE: f32 = 0.618_033_988_749_895;

/// RGBA color, each channel in [0, 1]
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Gray with full alpha
    pub const fn splat(v: f32) -> Self {
        Self::rgb(v, v, v)
    }

    pub fn from_hex(hex: u32) -> Self {
        let r = ((hex >> 16) & 0xFF) as f32 / 255.0;
        let g = ((hex >> 8) & 0xFF) as f32 / 255.0;
        let b = (hex & 0xFF) as f32 / 255.0;
        Self::rgb(r, g, b)
    }

    /// Parse `#rrggbb` (the `#` is optional)
    pub fn from_hex_str(s: &str) -> Result<Self> {
        let digits = s.trim().trim_start_matches('#');
        if digits.len() != 6 {
            return Err(CoreError::InvalidHex(s.to_string()));
        }
        u32::from_str_radix(digits, 16)
            .map(Self::from_hex)
            .map_err(|_| CoreError::InvalidHex(s.to_string()))
    }

    /// Format as `#rrggbb`, ignoring alpha
    pub fn to_hex_string(&self) -> String {
        IdColor::from_color(*self).to_hex_string()
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn from_array(a: [f32; 4]) -> Self {
        Self::rgba(a[0], a[1], a[2], a[3])
    }

    /// Channel-wise product, alpha included
    pub fn modulate(&self, other: &Color) -> Color {
        Color::rgba(
            self.r * other.r,
            self.g * other.g,
            self.b * other.b,
            self.a * other.a,
        )
    }

    pub fn scaled(&self, k: f32) -> Color {
        Color::rgba(self.r * k, self.g * k, self.b * k, self.a)
    }

    /// Convert to 8-bit RGBA, clamping each channel
    pub fn to_rgba8(&self) -> [u8; 4] {
        [
            quantize(self.r),
            quantize(self.g),
            quantize(self.b),
            quantize(self.a),
        ]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

fn quantize(c: f32) -> u8 {
    (c.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// HSV to RGB, all components in [0, 1]
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Color {
    let i = (h * 6.0).floor();
    let f = h * 6.0 - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);

    let (r, g, b) = match (i as i32).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    Color::rgb(r, g, b)
}

/// Sample a candidate identification color.
///
/// A random hue is rotated by the golden ratio conjugate and converted at
/// fixed saturation 0.5 and value 0.95.
pub fn next_identification_color<R: Rng>(rng: &mut R) -> Color {
    let hue = (rng.gen::<f32>() + GOLDEN_RATIO_CONJUGATE) % 1.0;
    hsv_to_rgb(hue, 0.5, 0.95)
}

/// 24-bit identification color
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl IdColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Quantize each channel to the nearest byte
    pub fn from_color(c: Color) -> Self {
        Self::new(quantize(c.r), quantize(c.g), quantize(c.b))
    }

    /// From a read-back pixel; alpha is ignored
    pub fn from_rgba8(px: [u8; 4]) -> Self {
        Self::new(px[0], px[1], px[2])
    }

    /// Packed `(r << 16) | (g << 8) | b`
    pub fn key(&self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    pub fn from_key(key: u32) -> Self {
        Self::new((key >> 16) as u8, (key >> 8) as u8, key as u8)
    }

    /// The exact float color to shade with; quantizes back to `self`
    pub fn to_color(&self) -> Color {
        Color::rgb(
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        )
    }

    pub fn to_hex_string(&self) -> String {
        format!("#{:06x}", self.key())
    }
}

impl std::fmt::Display for IdColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_key_packing() {
        let id = IdColor::new(0x12, 0x34, 0x56);
        assert_eq!(id.key(), 0x123456);
        assert_eq!(IdColor::from_key(0x123456), id);
        assert_eq!(id.to_hex_string(), "#123456");
    }

    #[test]
    fn test_quantization_is_stable() {
        // Shading with `to_color` must read back as the same bytes
        for key in [0x000000, 0xffffff, 0x7f80f2, 0x0103fe] {
            let id = IdColor::from_key(key);
            assert_eq!(IdColor::from_color(id.to_color()), id);
            assert_eq!(IdColor::from_rgba8(id.to_color().to_rgba8()), id);
        }
    }

    #[test]
    fn test_rounding_matches_registration() {
        let c = Color::rgb(0.5, 0.2, 0.999);
        let id = IdColor::from_color(c);
        assert_eq!(id, IdColor::new(128, 51, 255));
    }

    #[test]
    fn test_hsv_primaries() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), Color::rgb(1.0, 0.0, 0.0));
        let green = hsv_to_rgb(1.0 / 3.0, 1.0, 1.0);
        assert!(green.r.abs() < 1e-5 && (green.g - 1.0).abs() < 1e-5);
        // h = 1 wraps to the red sextant
        assert_eq!(hsv_to_rgb(1.0, 0.0, 0.5), Color::rgb(0.5, 0.5, 0.5));
    }

    #[test]
    fn test_identification_color_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let c = next_identification_color(&mut rng);
            // s = 0.5, v = 0.95: max channel is v, min is v * (1 - s)
            let max = c.r.max(c.g).max(c.b);
            let min = c.r.min(c.g).min(c.b);
            assert!((max - 0.95).abs() < 1e-5);
            assert!((min - 0.475).abs() < 1e-5);
        }
    }

    #[test]
    fn test_hex_parse() {
        assert_eq!(Color::from_hex_str("#ff0000").unwrap(), Color::rgb(1.0, 0.0, 0.0));
        assert_eq!(Color::from_hex_str("00ff00").unwrap().to_hex_string(), "#00ff00");
        assert!(Color::from_hex_str("#fff").is_err());
        assert!(Color::from_hex_str("#gg0000").is_err());
    }
}
