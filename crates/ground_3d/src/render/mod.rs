//! Render system
//!
//! A [`RenderBackend`] receives one [`DrawCall`] per pass of each renderable
//! between `begin_frame` and `end_frame`. The crate ships a
//! [`SoftwareBackend`]; `ground_gpu` provides a wgpu one.

mod lighting;
mod software;

pub use lighting::shade_vertex;
pub use software::SoftwareBackend;

use ground_core::{Color, Mat4, Vec3};
use smallvec::SmallVec;

use crate::error::Result;
use crate::geometry::Mesh;
use crate::lights::{PointLight, MAX_LIGHTS};
use crate::materials::Material;
use crate::shaders::ShaderProgram;
use crate::texture::BoundTexture;

/// Color used for outline passes
pub const OUTLINE_COLOR: Color = Color::BLACK;

// ─────────────────────────────────────────────────────────────────────────────
// State
// ─────────────────────────────────────────────────────────────────────────────

/// Depth comparison
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DepthCompare {
    Less,
    LessEqual,
    Always,
}

impl DepthCompare {
    pub fn passes(&self, incoming: f32, stored: f32) -> bool {
        match self {
            DepthCompare::Less => incoming < stored,
            DepthCompare::LessEqual => incoming <= stored,
            DepthCompare::Always => true,
        }
    }
}

/// Cull mode
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CullMode {
    /// No culling
    None,
    /// Cull front faces
    Front,
    /// Cull back faces
    Back,
}

/// Winding order of front faces in screen space
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrontFace {
    Ccw,
    Cw,
}

/// Depth offset applied to filled polygons so outlines win the depth test
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PolygonOffset {
    pub factor: f32,
    pub units: f32,
}

/// Fixed-function state set once before the first frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderState {
    pub depth_compare: DepthCompare,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub polygon_offset: PolygonOffset,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            depth_compare: DepthCompare::LessEqual,
            cull_mode: CullMode::Back,
            front_face: FrontFace::Ccw,
            polygon_offset: PolygonOffset {
                factor: 1.0,
                units: 2.0,
            },
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Frames and draws
// ─────────────────────────────────────────────────────────────────────────────

/// Where a frame is drawn
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameTarget {
    /// The visible framebuffer
    Screen { width: u32, height: u32 },
    /// The hidden buffer used for picking
    Offscreen { width: u32, height: u32 },
}

impl FrameTarget {
    pub fn size(&self) -> (u32, u32) {
        match *self {
            FrameTarget::Screen { width, height } | FrameTarget::Offscreen { width, height } => {
                (width, height)
            }
        }
    }

    pub fn is_offscreen(&self) -> bool {
        matches!(self, FrameTarget::Offscreen { .. })
    }
}

/// Per-frame values shared by every draw
#[derive(Clone, Debug)]
pub struct FrameUniforms {
    pub view: Mat4,
    pub projection: Mat4,
    /// Camera position in world space
    pub eye: Vec3,
    pub lights: SmallVec<[PointLight; MAX_LIGHTS]>,
}

impl Default for FrameUniforms {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            eye: Vec3::ZERO,
            lights: SmallVec::new(),
        }
    }
}

/// Primitive assembly for a draw
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DrawPass {
    /// Faces as triangle fans
    Fill,
    /// Faces as closed line loops
    Outline,
}

/// How fragments are colored
#[derive(Clone, Debug)]
pub enum Shading<'a> {
    /// Material lit by the frame's lights
    Lit {
        material: &'a Material,
        program: &'a ShaderProgram,
    },
    /// One exact color for every fragment
    Flat {
        color: Color,
        program: &'a ShaderProgram,
    },
}

impl Shading<'_> {
    pub fn program(&self) -> &ShaderProgram {
        match self {
            Shading::Lit { program, .. } | Shading::Flat { program, .. } => *program,
        }
    }
}

/// One mesh drawn with one model matrix
#[derive(Clone, Debug)]
pub struct DrawCall<'a> {
    pub mesh: &'a Mesh,
    pub model: Mat4,
    pub pass: DrawPass,
    pub shading: Shading<'a>,
    /// Textures in unit order. Backends sample unit 0 only.
    pub textures: SmallVec<[BoundTexture<'a>; 2]>,
}

/// A rendering surface the scene can draw into and read pixels back from
pub trait RenderBackend {
    /// Apply fixed-function state; called once before the first frame
    fn init_state(&mut self, state: &RenderState);

    /// Clear `target` and make it current
    fn begin_frame(&mut self, target: FrameTarget, uniforms: &FrameUniforms, clear: Color) -> Result<()>;

    /// Draw into the current target
    fn draw(&mut self, call: &DrawCall<'_>) -> Result<()>;

    /// Finish the current frame
    fn end_frame(&mut self) -> Result<()>;

    /// RGBA of the last offscreen frame at `(x, y)`, origin top-left
    fn read_pixel(&mut self, x: u32, y: u32) -> Result<[u8; 4]>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        let state = RenderState::default();
        assert_eq!(state.depth_compare, DepthCompare::LessEqual);
        assert_eq!(state.cull_mode, CullMode::Back);
        assert_eq!(state.front_face, FrontFace::Ccw);
        assert_eq!(state.polygon_offset.factor, 1.0);
        assert_eq!(state.polygon_offset.units, 2.0);
    }

    #[test]
    fn test_depth_compare() {
        assert!(DepthCompare::LessEqual.passes(0.5, 0.5));
        assert!(!DepthCompare::Less.passes(0.5, 0.5));
        assert!(DepthCompare::Always.passes(1.0, 0.0));
    }
}
