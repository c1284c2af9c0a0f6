//! GPU uniform layouts
//!
//! `#[repr(C)]` mirrors of the `Light`, `Frame` and `Object` structs in the
//! built-in WGSL programs. Every field is a `vec4` or `mat4x4` so the std140
//! uniform rules add no padding.

use ground_3d::lights::{PointLight, MAX_LIGHTS};
use ground_3d::render::{FrameUniforms, Shading};
use ground_core::{Color, Mat4};

/// One light (matches shader `Light`)
///
/// Memory layout:
/// - position: `vec4<f32>`    (16 bytes)
/// - ambient: `vec4<f32>`     (16 bytes)
/// - diffuse: `vec4<f32>`     (16 bytes)
/// - specular: `vec4<f32>`    (16 bytes)
/// - attenuation: `vec4<f32>` (16 bytes) - (constant, linear, quadratic, enabled)
/// Total: 80 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuLight {
    pub position: [f32; 4],
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub attenuation: [f32; 4],
}

impl From<&PointLight> for GpuLight {
    fn from(light: &PointLight) -> Self {
        Self {
            position: light.position.to_array(),
            ambient: light.ambient.to_array(),
            diffuse: light.diffuse.to_array(),
            specular: light.specular.to_array(),
            attenuation: [
                light.constant_attenuation,
                light.linear_attenuation,
                light.quadratic_attenuation,
                if light.enabled { 1.0 } else { 0.0 },
            ],
        }
    }
}

/// Per-frame uniforms (matches shader `Frame`, group 0)
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameUniform {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub eye: [f32; 4],
    /// `x` is the light count
    pub light_count: [u32; 4],
    pub lights: [GpuLight; MAX_LIGHTS],
}

impl FrameUniform {
    pub fn new(frame: &FrameUniforms) -> Self {
        let mut lights = [GpuLight::default(); MAX_LIGHTS];
        for (slot, light) in lights.iter_mut().zip(frame.lights.iter()) {
            *slot = GpuLight::from(light);
        }
        Self {
            view: frame.view.to_cols_array_2d(),
            projection: frame.projection.to_cols_array_2d(),
            eye: [frame.eye.x, frame.eye.y, frame.eye.z, 1.0],
            light_count: [frame.lights.len().min(MAX_LIGHTS) as u32, 0, 0, 0],
            lights,
        }
    }
}

/// Per-draw uniforms (matches shader `Object`, group 1 binding 0)
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectUniform {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub flat_color: [f32; 4],
    /// (shininess, has_texture, has_normals, 0)
    pub params: [f32; 4],
}

impl ObjectUniform {
    pub fn new(model: Mat4, shading: &Shading<'_>, has_texture: bool, has_normals: bool) -> Self {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        let base = Self {
            model: model.to_cols_array_2d(),
            normal_matrix: model.normal_matrix().to_cols_array_2d(),
            ambient: Color::BLACK.to_array(),
            diffuse: Color::BLACK.to_array(),
            specular: Color::BLACK.to_array(),
            flat_color: Color::BLACK.to_array(),
            params: [0.0, 0.0, flag(has_normals), 0.0],
        };
        match shading {
            Shading::Lit { material, .. } => Self {
                ambient: material.ambient.to_array(),
                diffuse: material.diffuse.to_array(),
                specular: material.specular.to_array(),
                params: [material.shininess, flag(has_texture), flag(has_normals), 0.0],
                ..base
            },
            Shading::Flat { color, .. } => Self {
                flat_color: color.to_array(),
                ..base
            },
        }
    }
}
