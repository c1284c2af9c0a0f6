//! Phong material

use ground_core::Color;

/// Classic Phong material
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    pub ambient: Color,
    pub diffuse: Color,
    pub specular: Color,
    /// Specular exponent
    pub shininess: f32,
    /// Whether drawing requires at least one bound texture
    pub textured: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ambient: Color::WHITE,
            diffuse: Color::rgb(1.0, 0.8, 0.0),
            specular: Color::rgb(0.8, 0.8, 0.8),
            shininess: 5.0,
            textured: false,
        }
    }
}

impl Material {
    /// Create a new material with default colors
    pub fn new() -> Self {
        Self::default()
    }

    /// Set ambient reflectance
    pub fn ambient(mut self, color: Color) -> Self {
        self.ambient = color;
        self
    }

    /// Set diffuse reflectance
    pub fn diffuse(mut self, color: Color) -> Self {
        self.diffuse = color;
        self
    }

    /// Set specular reflectance
    pub fn specular(mut self, color: Color) -> Self {
        self.specular = color;
        self
    }

    /// Set specular exponent
    pub fn shininess(mut self, shininess: f32) -> Self {
        self.shininess = shininess;
        self
    }

    /// Require a texture when drawing
    pub fn textured(mut self, textured: bool) -> Self {
        self.textured = textured;
        self
    }
}
