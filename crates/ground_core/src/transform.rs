//! Node transforms
//!
//! A node's matrix is always composed as
//! `translate * rotate_z * rotate_y * rotate_x * scale`. [`Mat4::decompose`]
//! recovers the three parts from such a matrix so that a selected node's pose
//! can be shown and edited.

use serde::{Deserialize, Serialize};

use crate::math::{Mat4, Vec3};

/// Translation, Euler rotation (radians, applied X then Y then Z) and scale
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn new(translation: Vec3, rotation: Vec3, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// Compose into a matrix
    pub fn to_matrix(&self) -> Mat4 {
        let t = self.translation;
        let r = self.rotation;
        let s = self.scale;
        let rotation = Mat4::rotation_z(r.z) * Mat4::rotation_y(r.y) * Mat4::rotation_x(r.x);
        Mat4::translation(t.x, t.y, t.z) * rotation * Mat4::scale(s.x, s.y, s.z)
    }
}

impl From<Transform> for Mat4 {
    fn from(t: Transform) -> Self {
        t.to_matrix()
    }
}

impl Mat4 {
    /// Split into translation, scale and ZYX Euler angles.
    ///
    /// Exact only for matrices built by [`Transform::to_matrix`]. When the
    /// un-scaled `[2][0]` rotation entry is exactly ±1 the Y angle is fixed at
    /// ∓90° and the Z angle is folded into X.
    pub fn decompose(&self) -> Transform {
        let m = &self.cols;
        let translation = Vec3::new(m[3][0], m[3][1], m[3][2]);
        let scale = Vec3::new(
            self.column3(0).length(),
            self.column3(1).length(),
            self.column3(2).length(),
        );

        if scale.x == 0.0 || scale.y == 0.0 || scale.z == 0.0 {
            tracing::warn!(?scale, "decomposing a matrix with a collapsed axis");
            return Transform::new(translation, Vec3::ZERO, scale);
        }

        // r<row><col> of the un-scaled rotation block
        let r11 = m[0][0] / scale.x;
        let r12 = m[1][0] / scale.y;
        let r13 = m[2][0] / scale.z;
        let r21 = m[0][1] / scale.x;
        let r31 = m[0][2] / scale.x;
        let r32 = m[1][2] / scale.y;
        let r33 = m[2][2] / scale.z;

        let (psi, theta, phi);
        if r31 != 1.0 && r31 != -1.0 {
            theta = -r31.clamp(-1.0, 1.0).asin();
            let c = theta.cos();
            psi = (r32 / c).atan2(r33 / c);
            phi = (r21 / c).atan2(r11 / c);
        } else {
            phi = 0.0;
            if r31 == -1.0 {
                theta = std::f32::consts::FRAC_PI_2;
                psi = r12.atan2(r13);
            } else {
                theta = -std::f32::consts::FRAC_PI_2;
                psi = (-r12).atan2(-r13);
            }
        }

        Transform::new(translation, Vec3::new(psi, theta, phi), scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_vec_eq(a: Vec3, b: Vec3) {
        assert!((a.x - b.x).abs() < 1e-4, "{:?} vs {:?}", a, b);
        assert!((a.y - b.y).abs() < 1e-4, "{:?} vs {:?}", a, b);
        assert!((a.z - b.z).abs() < 1e-4, "{:?} vs {:?}", a, b);
    }

    #[test]
    fn test_decompose_round_trip() {
        let cases = [
            (Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.3, -0.5, 1.2), Vec3::new(1.0, 1.0, 1.0)),
            (Vec3::new(-4.0, 0.5, 10.0), Vec3::new(-1.0, 0.25, -2.5), Vec3::new(2.0, 2.0, 2.0)),
            (Vec3::new(0.0, -1.0, 0.0), Vec3::new(0.1, 1.2, 0.0), Vec3::new(3.0, 0.5, 1.5)),
        ];

        for (t, r, s) in cases {
            let back = Transform::new(t, r, s).to_matrix().decompose();
            assert_vec_eq(back.translation, t);
            assert_vec_eq(back.scale, s);
            assert_vec_eq(back.rotation, r);
        }
    }

    #[test]
    fn test_decompose_identity() {
        let back = Mat4::IDENTITY.decompose();
        assert_eq!(back, Transform::default());
    }

    fn assert_recomposes(back: &Transform, m: &Mat4) {
        let again = back.to_matrix();
        for c in 0..4 {
            for row in 0..4 {
                assert!(
                    (again.cols[c][row] - m.cols[c][row]).abs() < 1e-5,
                    "mismatch at [{}][{}]: {} vs {}",
                    c,
                    row,
                    again.cols[c][row],
                    m.cols[c][row]
                );
            }
        }
    }

    #[test]
    fn test_decompose_gimbal_lock() {
        use std::f32::consts::FRAC_PI_2;

        // Y at +90°: r31 == -1, Z folds into X
        for (rx, rz) in [(0.4, 0.0), (-1.1, 0.0), (0.4, 0.3)] {
            let m = Transform::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(rx, FRAC_PI_2, rz), Vec3::ONE).to_matrix();
            let back = m.decompose();
            assert_eq!(back.rotation.y, FRAC_PI_2);
            assert_eq!(back.rotation.z, 0.0);
            if rz == 0.0 {
                assert!((back.rotation.x - rx).abs() < 1e-5);
            }
            assert_recomposes(&back, &m);
        }

        // Y at -90°: r31 == +1
        for (rx, rz) in [(0.4, 0.0), (-1.1, 0.0), (0.4, 0.3)] {
            let m = Transform::new(Vec3::new(-2.0, 0.0, 5.0), Vec3::new(rx, -FRAC_PI_2, rz), Vec3::ONE).to_matrix();
            let back = m.decompose();
            assert_eq!(back.rotation.y, -FRAC_PI_2);
            assert_eq!(back.rotation.z, 0.0);
            if rz == 0.0 {
                assert!((back.rotation.x - rx).abs() < 1e-5);
            }
            assert_recomposes(&back, &m);
        }
    }

    #[test]
    fn test_decompose_collapsed_axis() {
        let m = Transform::new(Vec3::new(1.0, 0.0, 0.0), Vec3::ZERO, Vec3::new(0.0, 1.0, 1.0)).to_matrix();
        let back = m.decompose();
        assert_eq!(back.rotation, Vec3::ZERO);
        assert_eq!(back.translation, Vec3::new(1.0, 0.0, 0.0));
    }
}
