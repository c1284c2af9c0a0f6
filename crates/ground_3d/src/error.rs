//! Error types for ground_3d

use ground_core::CoreError;
use thiserror::Error;

/// Errors raised while building or drawing a scene
#[derive(Error, Debug)]
pub enum SceneError {
    /// Shader source failed to parse or validate
    #[error("shader '{program}' failed to compile:\n{diagnostic}")]
    ShaderCompile { program: String, diagnostic: String },

    /// Vertex and fragment stages do not fit together
    #[error("shader program failed to link: {0}")]
    ShaderLink(String),

    /// A renderable needs a texture that has no image
    #[error("missing texture: {0}")]
    MissingTexture(String),

    /// No free identification color was found
    #[error("scene capacity exhausted after {attempts} identification color attempts")]
    SceneCapacity { attempts: u32 },

    /// Too many lights
    #[error("scene supports at most {max} lights")]
    LightCapacity { max: usize },

    /// Zero-length vectors or invalid tessellation parameters
    #[error(transparent)]
    DegenerateGeometry(#[from] CoreError),

    /// Vertex data does not divide into whole faces
    #[error("mesh data has {actual} floats, expected a multiple of {expected}")]
    InvalidMesh { expected: usize, actual: usize },

    /// Texture pixel data does not match its dimensions
    #[error("texture data is {actual} bytes, expected {expected}")]
    InvalidTexture { expected: usize, actual: usize },

    /// Render backend failure
    #[error("render backend error: {0}")]
    Backend(String),

    /// Pixel read-back failure
    #[error("pixel read-back failed: {0}")]
    ReadBack(String),
}

impl SceneError {
    /// Shorthand for degenerate geometry raised outside of ground_core
    pub fn degenerate(msg: impl Into<String>) -> Self {
        SceneError::DegenerateGeometry(CoreError::DegenerateGeometry(msg.into()))
    }
}

/// Result type for ground_3d operations
pub type Result<T> = std::result::Result<T, SceneError>;
