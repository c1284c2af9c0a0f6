//! Ground Graphics Core
//!
//! Foundational types shared by every Ground Graphics crate:
//!
//! - **Math**: `Vec2`/`Vec3`/`Vec4` and a column-major `Mat4`
//! - **Transforms**: translate/rotate/scale composition and its decomposition
//! - **Colors**: float colors, HSV and hex helpers, and the 24-bit
//!   identification colors used by color-coded picking
//!
//! # Example
//!
//! ```rust
//! use ground_core::{Mat4, Transform, Vec3};
//!
//! let t = Transform::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.1, 0.2, 0.3), Vec3::ONE);
//! let m = t.to_matrix();
//! let back = m.decompose();
//! assert!((back.translation.x - 1.0).abs() < 1e-5);
//! # let _ = Mat4::IDENTITY;
//! ```

pub mod color;
pub mod error;
pub mod math;
pub mod transform;

pub use color::{hsv_to_rgb, next_identification_color, Color, IdColor, GOLDEN_RATIO_CONJUGATE};
pub use error::{CoreError, Result};
pub use math::{mix, radians, Mat4, Vec2, Vec3, Vec4};
pub use transform::Transform;
