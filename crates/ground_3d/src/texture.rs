//! Textures and texture units
//!
//! A [`Texture`] may be created before its pixels are available (an image
//! still loading in the host). Binding such a texture fails with
//! [`SceneError::MissingTexture`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ground_core::Color;

use crate::error::{Result, SceneError};

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a texture's pixel data, changes whenever the image is replaced
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

impl TextureId {
    fn next() -> Self {
        TextureId(NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Decoded RGBA8 pixels, row 0 at the top. Never empty.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl TextureImage {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected || width == 0 || height == 0 {
            return Err(SceneError::InvalidTexture {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// A 1x1 image of one color
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: rgba.to_vec(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Nearest-neighbour lookup with wrap-around addressing
    pub fn sample(&self, u: f32, v: f32) -> Color {
        let wrap = |t: f32, size: u32| -> u32 {
            let t = t - t.floor();
            ((t * size as f32) as u32).min(size.saturating_sub(1))
        };
        let x = wrap(u, self.width);
        let y = wrap(v, self.height);
        let i = ((y * self.width + x) * 4) as usize;
        let p = &self.pixels[i..i + 4];
        Color::rgba(
            p[0] as f32 / 255.0,
            p[1] as f32 / 255.0,
            p[2] as f32 / 255.0,
            p[3] as f32 / 255.0,
        )
    }
}

/// Generate a black and white checkerboard of `checks` x `checks` squares
pub fn checkerboard(size: u32, checks: u32) -> Result<TextureImage> {
    if checks == 0 || size < checks {
        return Err(SceneError::degenerate(format!(
            "checkerboard of {} checks does not fit {} pixels",
            checks, size
        )));
    }
    let patch = size / checks;
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for row in 0..size {
        for col in 0..size {
            let px = (col / patch) % 2;
            let py = (row / patch) % 2;
            let c = if px ^ py == 1 { 255 } else { 0 };
            pixels.extend_from_slice(&[c, c, c, 255]);
        }
    }
    TextureImage::new(size, size, pixels)
}

/// A texture slot on a renderable
#[derive(Clone, Debug)]
pub struct Texture {
    name: String,
    id: TextureId,
    image: Option<Arc<TextureImage>>,
}

impl Texture {
    /// A texture whose image is not available yet
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: TextureId::next(),
            image: None,
        }
    }

    pub fn from_image(name: impl Into<String>, image: TextureImage) -> Self {
        Self {
            name: name.into(),
            id: TextureId::next(),
            image: Some(Arc::new(image)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn image(&self) -> Option<&TextureImage> {
        self.image.as_deref()
    }

    /// Supply or replace the pixels
    pub fn set_image(&mut self, image: TextureImage) {
        self.image = Some(Arc::new(image));
        self.id = TextureId::next();
    }

    /// Resolve to a drawable binding on the next free unit
    pub fn bind<'a>(&'a self, units: &mut TextureUnits) -> Result<BoundTexture<'a>> {
        let image = self.image.as_deref().ok_or_else(|| {
            SceneError::MissingTexture(format!("texture '{}' has no image assigned", self.name))
        })?;
        let unit = units.allocate().ok_or_else(|| {
            SceneError::MissingTexture(format!(
                "no texture unit left for '{}' ({} in use)",
                self.name,
                units.in_use()
            ))
        })?;
        Ok(BoundTexture {
            id: self.id,
            unit,
            image,
        })
    }
}

/// Integer index of a texture unit, sampled in shaders as `texture<unit>`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureUnit(pub u32);

/// Hands out texture units in order for one draw
#[derive(Clone, Debug)]
pub struct TextureUnits {
    next: u32,
    max: u32,
}

impl TextureUnits {
    pub fn new(max: u32) -> Self {
        Self { next: 0, max }
    }

    pub fn allocate(&mut self) -> Option<TextureUnit> {
        if self.next >= self.max {
            return None;
        }
        let unit = TextureUnit(self.next);
        self.next += 1;
        Some(unit)
    }

    pub fn in_use(&self) -> u32 {
        self.next
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }
}

/// A texture resolved for one draw call
#[derive(Clone, Copy, Debug)]
pub struct BoundTexture<'a> {
    pub id: TextureId,
    pub unit: TextureUnit,
    pub image: &'a TextureImage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkerboard() {
        let img = checkerboard(256, 8).unwrap();
        assert_eq!(img.pixels().len(), 256 * 256 * 4);
        // first patch black, second white, alpha always opaque
        assert_eq!(&img.pixels()[0..4], &[0, 0, 0, 255]);
        let second = (32 * 4) as usize;
        assert_eq!(&img.pixels()[second..second + 4], &[255, 255, 255, 255]);
        assert_eq!(img.sample(0.0, 0.0), Color::rgba(0.0, 0.0, 0.0, 1.0));
        assert_eq!(img.sample(1.0 / 8.0 + 0.01, 0.0), Color::WHITE);
    }

    #[test]
    fn test_pending_texture_fails_to_bind() {
        let tex = Texture::pending("brick");
        let mut units = TextureUnits::new(4);
        let err = tex.bind(&mut units).unwrap_err();
        assert!(matches!(err, SceneError::MissingTexture(_)));
    }

    #[test]
    fn test_units_are_sequential() {
        let img = checkerboard(16, 2).unwrap();
        let a = Texture::from_image("a", img.clone());
        let b = Texture::from_image("b", img);
        let mut units = TextureUnits::new(2);
        assert_eq!(a.bind(&mut units).unwrap().unit, TextureUnit(0));
        assert_eq!(b.bind(&mut units).unwrap().unit, TextureUnit(1));
        assert!(a.bind(&mut units).is_err());
        units.reset();
        assert_eq!(b.bind(&mut units).unwrap().unit, TextureUnit(0));
    }

    #[test]
    fn test_set_image_changes_id() {
        let mut tex = Texture::pending("late");
        let before = tex.id();
        tex.set_image(checkerboard(8, 2).unwrap());
        assert_ne!(tex.id(), before);
        assert!(tex.image().is_some());
    }

    #[test]
    fn test_image_size_mismatch() {
        assert!(TextureImage::new(2, 2, vec![0; 15]).is_err());
    }

    #[test]
    fn test_empty_image_is_rejected() {
        let err = TextureImage::new(0, 0, Vec::new()).unwrap_err();
        assert!(matches!(err, SceneError::InvalidTexture { expected: 0, actual: 0 }));
        assert!(TextureImage::new(0, 4, Vec::new()).is_err());
    }

    #[test]
    fn test_solid_image_samples_everywhere() {
        let img = TextureImage::solid([10, 20, 30, 255]);
        assert_eq!((img.width(), img.height()), (1, 1));
        assert_eq!(img.pixels(), &[10, 20, 30, 255]);
        let expected = Color::rgba(10.0 / 255.0, 20.0 / 255.0, 30.0 / 255.0, 1.0);
        for (u, v) in [(0.0, 0.0), (0.999, 0.999), (1.0, 1.0), (-3.5, 7.25)] {
            assert_eq!(img.sample(u, v), expected);
        }
    }
}
