//! Ground GPU Backend
//!
//! A [`RenderBackend`](ground_3d::RenderBackend) on wgpu.
//!
//! # Features
//!
//! - **Headless**: renders into owned textures, no window or surface needed
//! - **Picking**: a separate offscreen target read back one pixel at a time
//! - **Caching**: pipelines per program and pass, vertex buffers per mesh
//!
//! ```ignore
//! use ground_3d::prelude::*;
//! use ground_gpu::GpuBackend;
//!
//! let mut backend = GpuBackend::new_headless()?;
//! let mut scene = Scene::new(SceneConfig::default(), Camera::default());
//! scene.add(Renderable::new("cube", Cube))?;
//! scene.render(&mut backend, 640, 480)?;
//! let hit = scene.pick(&mut backend, 320, 240, 640, 480)?;
//! ```

pub mod backend;
pub mod error;
pub mod uniforms;

pub use backend::{padded_bytes_per_row, GpuBackend, COLOR_FORMAT, DEPTH_FORMAT};
pub use error::{GpuError, Result};
pub use uniforms::{FrameUniform, GpuLight, ObjectUniform};
