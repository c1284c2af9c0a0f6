//! Point lights

use ground_core::{radians, Color, Vec3, Vec4};

use crate::camera::FrameContext;

/// Most lights a scene (and the lit shader) supports
pub const MAX_LIGHTS: usize = 4;

/// Point light with Phong color terms and distance attenuation.
///
/// `position.w == 0` turns the light into a directional light shining from
/// `position.xyz` toward the origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointLight {
    pub enabled: bool,
    pub position: Vec4,
    pub ambient: Color,
    pub diffuse: Color,
    pub specular: Color,
    pub constant_attenuation: f32,
    pub linear_attenuation: f32,
    pub quadratic_attenuation: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            enabled: true,
            position: Vec4::new(1.0, 1.0, 1.0, 1.0),
            ambient: Color::splat(0.2),
            diffuse: Color::WHITE,
            specular: Color::WHITE,
            constant_attenuation: 0.0,
            linear_attenuation: 0.731,
            quadratic_attenuation: 0.0,
        }
    }
}

impl PointLight {
    /// Create a light at `position`
    pub fn new(position: Vec3) -> Self {
        Self {
            position: Vec4::from_vec3(position, 1.0),
            ..Default::default()
        }
    }

    /// Set ambient color
    pub fn ambient(mut self, color: Color) -> Self {
        self.ambient = color;
        self
    }

    /// Set diffuse color
    pub fn diffuse(mut self, color: Color) -> Self {
        self.diffuse = color;
        self
    }

    /// Set specular color
    pub fn specular(mut self, color: Color) -> Self {
        self.specular = color;
        self
    }

    /// Set constant, linear and quadratic attenuation coefficients
    pub fn attenuation_coefficients(mut self, constant: f32, linear: f32, quadratic: f32) -> Self {
        self.constant_attenuation = constant;
        self.linear_attenuation = linear;
        self.quadratic_attenuation = quadratic;
        self
    }

    /// Enable or disable
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_directional(&self) -> bool {
        self.position.w == 0.0
    }

    /// Attenuation factor at `distance`, 1 when every coefficient is zero
    pub fn attenuation(&self, distance: f32) -> f32 {
        let denom = self.constant_attenuation
            + self.linear_attenuation * distance
            + self.quadratic_attenuation * distance * distance;
        if denom <= 0.0 {
            1.0
        } else {
            1.0 / denom
        }
    }

    /// Move the light around the Y axis on a circle of `radius`, continuing
    /// from its current angle `atan2(z, x)`.
    ///
    /// `direction` is `1.0` or `-1.0` and flips the sense of rotation.
    pub fn orbit(&mut self, degrees_per_sec: f32, direction: f32, radius: f32, frame: &FrameContext) {
        let current = self.position.z.atan2(self.position.x);
        let angle = current + radians(frame.delta_time / 1000.0 * degrees_per_sec * direction);
        self.position.x = radius * angle.cos();
        self.position.z = radius * angle.sin();
    }
}
