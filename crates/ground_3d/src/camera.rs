//! Fly camera and frame timing

use std::time::Instant;

use ground_core::{Mat4, Vec3, Vec4};
use serde::Deserialize;

/// Per-frame timing passed into camera and animation updates
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameContext {
    /// Milliseconds since the previous frame
    pub delta_time: f32,
}

impl FrameContext {
    pub fn new(delta_time: f32) -> Self {
        Self { delta_time }
    }
}

/// Produces a [`FrameContext`] per tick from wall-clock time
#[derive(Debug)]
pub struct FrameClock {
    last: Option<Instant>,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    pub fn new() -> Self {
        Self { last: None }
    }

    pub fn tick(&mut self) -> FrameContext {
        self.tick_at(Instant::now())
    }

    /// Advance to `now`; the first tick has a zero delta
    pub fn tick_at(&mut self, now: Instant) -> FrameContext {
        let delta = self
            .last
            .map(|last| now.saturating_duration_since(last).as_secs_f32() * 1000.0)
            .unwrap_or(0.0);
        self.last = Some(now);
        FrameContext::new(delta)
    }
}

/// Camera settings
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// View-space translation applied after rotation
    pub eye: [f32; 3],
    /// Units moved per millisecond of `drive`
    pub speed: f32,
    /// Degrees turned per millisecond of `rotate`
    pub rot_speed: f32,
    /// Vertical field of view in degrees
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    /// Degrees about X
    pub pitch: f32,
    /// Degrees about Y
    pub yaw: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            eye: [0.0, -3.0, -5.0],
            speed: 0.02,
            rot_speed: 2.0,
            fov_y: 90.0,
            aspect: 1.0,
            near: 0.5,
            far: 100.0,
            pitch: 20.0,
            yaw: 0.0,
        }
    }
}

/// Camera whose view is `rotate_x(pitch) * rotate_y(yaw) * translate(eye)`
#[derive(Clone, Debug)]
pub struct Camera {
    eye: Vec3,
    speed: f32,
    rot_speed: f32,
    pitch: f32,
    yaw: f32,
    projection: Mat4,
    view: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(&CameraConfig::default())
    }
}

impl Camera {
    pub fn new(config: &CameraConfig) -> Self {
        let mut camera = Self {
            eye: Vec3::from_array(config.eye),
            speed: config.speed,
            rot_speed: config.rot_speed,
            pitch: config.pitch,
            yaw: config.yaw,
            projection: Mat4::perspective(config.fov_y, config.aspect, config.near, config.far),
            view: Mat4::IDENTITY,
        };
        camera.update();
        camera
    }

    fn rotation(&self) -> Mat4 {
        Mat4::rotation_x(ground_core::radians(self.pitch)) * Mat4::rotation_y(ground_core::radians(self.yaw))
    }

    fn update(&mut self) {
        self.view = self.rotation() * Mat4::translation(self.eye.x, self.eye.y, self.eye.z);
    }

    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    pub fn set_eye(&mut self, eye: Vec3) {
        self.eye = eye;
        self.update();
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    /// Set yaw and pitch in degrees
    pub fn set_orientation(&mut self, yaw: f32, pitch: f32) {
        self.yaw = yaw;
        self.pitch = pitch;
        self.update();
    }

    pub fn set_projection(&mut self, projection: Mat4) {
        self.projection = projection;
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Camera origin in world space
    pub fn world_position(&self) -> Vec3 {
        self.view
            .inverse()
            .map(|inv| inv.transform_point(Vec3::ZERO))
            .unwrap_or(Vec3::ZERO)
    }

    /// Turn by `yaw` / `pitch` input scaled by rotation speed and frame time
    pub fn rotate(&mut self, yaw: f32, pitch: f32, frame: &FrameContext) {
        self.pitch += pitch * self.rot_speed * frame.delta_time;
        self.yaw += yaw * self.rot_speed * frame.delta_time;
        self.update();
    }

    /// Move along `direction` (camera-relative) by `speed * sign * dt`
    pub fn drive(&mut self, direction: Vec3, sign: f32, frame: &FrameContext) {
        let movement = direction * (self.speed * sign * frame.delta_time);
        let length = movement.length();
        let rotated = self.rotation().transform_vector(movement);
        let rotated_length = rotated.length();
        if rotated_length > 0.0 {
            self.eye = self.eye + rotated * (length / rotated_length);
            self.update();
        }
    }

    /// World-space ray direction through a clip-space point.
    ///
    /// `None` when the view-projection is singular or the point maps to
    /// infinity.
    pub fn unproject(&self, x: f32, y: f32, z: f32) -> Option<Vec3> {
        let inverse = self.view_projection().inverse()?;
        let p = inverse.transform_vec4(Vec4::new(x, y, z, 1.0));
        if p.w == 0.0 {
            return None;
        }
        let world = p.xyz() * (1.0 / p.w);
        (world - self.world_position()).try_normalize().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_view() {
        let camera = Camera::default();
        // The world origin lands in front of the camera, slightly below center
        let p = camera.view().transform_point(Vec3::ZERO);
        assert!(p.z < -5.0);
        assert!(p.y < 0.0);
        assert!(p.x.abs() < 1e-5);
    }

    #[test]
    fn test_rotate_scales_with_frame_time() {
        let mut camera = Camera::default();
        camera.rotate(1.0, -0.5, &FrameContext::new(10.0));
        assert!((camera.yaw() - 20.0).abs() < 1e-5);
        assert!((camera.pitch() - 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_drive_preserves_distance() {
        let mut camera = Camera::default();
        let before = camera.eye();
        camera.drive(Vec3::new(0.0, 0.0, 1.0), 1.0, &FrameContext::new(100.0));
        let moved = camera.eye().distance(before);
        assert!((moved - 2.0).abs() < 1e-5);

        // Zero frame time does not move
        let before = camera.eye();
        camera.drive(Vec3::new(0.0, 0.0, 1.0), 1.0, &FrameContext::new(0.0));
        assert_eq!(camera.eye(), before);
    }

    #[test]
    fn test_unproject_center_looks_forward() {
        let mut camera = Camera::default();
        camera.set_orientation(0.0, 0.0);
        camera.set_eye(Vec3::new(0.0, 0.0, -5.0));
        let dir = camera.unproject(0.0, 0.0, 0.5).unwrap();
        assert!(dir.x.abs() < 1e-4 && dir.y.abs() < 1e-4);
        assert!((dir.z + 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_unproject_singular() {
        let mut camera = Camera::default();
        camera.set_projection(Mat4::scale(0.0, 0.0, 0.0));
        assert!(camera.unproject(0.0, 0.0, 0.5).is_none());
    }

    #[test]
    fn test_frame_clock() {
        let mut clock = FrameClock::new();
        let start = Instant::now();
        assert_eq!(clock.tick_at(start).delta_time, 0.0);
        let later = start + std::time::Duration::from_millis(16);
        assert!((clock.tick_at(later).delta_time - 16.0).abs() < 1e-3);
    }
}
