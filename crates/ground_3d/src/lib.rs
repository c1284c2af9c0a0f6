//! # Ground 3D
//!
//! Procedural geometry and a pickable scene graph.
//!
//! This crate provides:
//! - **Subdivision** of triangles and squares into Sierpinski-style gaskets
//! - **Parametric primitives**: cube, cone, cylinder, sphere, plane
//! - **Scene graph** with a unique identification color per object
//! - **Color-coded picking** through an off-screen render and one pixel read-back
//! - **Render backends**: a CPU rasterizer here, wgpu in `ground_gpu`
//!
//! ## Quick Start
//!
//! ```rust
//! use ground_3d::prelude::*;
//!
//! let mut scene = Scene::new(SceneConfig { seed: Some(1), ..Default::default() }, Camera::default());
//! let cube = scene.add(Renderable::new("cube", Cube)).unwrap();
//!
//! let mut backend = SoftwareBackend::new();
//! scene.render(&mut backend, 64, 64).unwrap();
//! let _hit = scene.pick(&mut backend, 32, 38, 64, 64).unwrap();
//! # let _ = cube;
//! ```

// Camera and frame timing
pub mod camera;

// Errors
pub mod error;

// Meshes, subdivision and primitives
pub mod geometry;

// Lighting
pub mod lights;

// Phong materials
pub mod materials;

// Render backends
pub mod render;

// Scene objects
pub mod renderable;

// Scene graph and picking
pub mod scene;

// Shader programs
pub mod shaders;

// Textures
pub mod texture;

// Prelude for common imports
pub mod prelude;

pub use camera::{Camera, CameraConfig, FrameClock, FrameContext};
pub use error::{Result, SceneError};
pub use geometry::{
    Cone, Cube, Cylinder, Gasket, GasketShape, Mesh, MeshId, Plane, Primitive, Shape, Sphere, UvProjection, Vertex,
    VertexLayout,
};
pub use lights::{PointLight, MAX_LIGHTS};
pub use materials::Material;
pub use render::{RenderBackend, SoftwareBackend};
pub use renderable::{Renderable, ShadingMode};
pub use scene::{RenderableId, Scene, SceneConfig};
pub use shaders::{ProgramId, ShaderProgram};
pub use texture::{checkerboard, Texture, TextureImage};
