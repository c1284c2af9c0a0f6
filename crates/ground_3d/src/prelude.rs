//! Prelude module for common imports
//!
//! ```rust
//! use ground_3d::prelude::*;
//! ```

// Core
pub use ground_core::{Color, IdColor, Mat4, Transform, Vec2, Vec3, Vec4};

// Scene
pub use crate::camera::{Camera, CameraConfig, FrameClock, FrameContext};
pub use crate::renderable::{Renderable, ShadingMode};
pub use crate::scene::{RenderableId, Scene, SceneConfig};

// Geometry
pub use crate::geometry::{
    subdivide_square, subdivide_triangle, swirl, Cone, Cube, Cylinder, Gasket, GasketShape, Mesh, Plane, Primitive,
    Shape, Sphere, UvProjection,
};

// Materials, lights and textures
pub use crate::lights::PointLight;
pub use crate::materials::Material;
pub use crate::texture::{checkerboard, Texture, TextureImage};

// Rendering
pub use crate::render::{RenderBackend, RenderState, SoftwareBackend};
pub use crate::shaders::ShaderProgram;
