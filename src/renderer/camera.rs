use crate::renderer::util;
use glam::{Mat4, Vec3};

/// Perspective camera orbiting a pivot point
#[derive(Debug, Clone)]
pub struct Camera {
    position: Vec3,
    forward: Vec3,
    up: Vec3,
    right: Vec3,
    world_up: Vec3,
    fov_y_deg: f32,
    near: f32,
    far: f32,
    pivot: Vec3,
}

impl Camera {
    const DEFAULT_FOV_Y_DEG: f32 = 45.0;
    pub const MAX_PITCH_DEG: f32 = 80.0;

    /// Places the camera on the +Z axis at `distance` from the origin, looking at it
    pub fn new(distance: f32) -> Self {
        let mut camera = Self {
            position: Vec3::ZERO,
            forward: Vec3::NEG_Z,
            up: Vec3::Y,
            right: Vec3::X,
            world_up: Vec3::Y,
            fov_y_deg: Self::DEFAULT_FOV_Y_DEG,
            near: 0.1,
            far: 100.0,
            pivot: Vec3::ZERO,
        };
        let distance = camera.clamp_distance(distance);
        camera.set_position(Vec3::new(0.0, 0.0, distance));
        camera
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.look_at(self.pivot);
    }

    pub fn look_at(&mut self, target: Vec3) {
        if target == self.position {
            return;
        }
        self.pivot = target;
        self.forward = (target - self.position).normalize();
        self.right = self.forward.cross(self.world_up).normalize();
        self.up = self.right.cross(self.forward).normalize();
    }

    /// Rotates the eye around the pivot. Pitch stays within `MAX_PITCH_DEG` of the horizon.
    pub fn orbit(&mut self, yaw_delta: f32, pitch_delta: f32) {
        let pivot_to_eye = self.position - self.pivot;
        let max_pitch = Self::MAX_PITCH_DEG.to_radians();

        let yaw = util::calculate_yaw(pivot_to_eye) + yaw_delta;
        let pitch = (util::calculate_pitch(pivot_to_eye) + pitch_delta).clamp(-max_pitch, max_pitch);

        let direction = util::calculate_direction(pitch, yaw);
        self.set_position(self.pivot + direction * self.get_distance());
    }

    /// Moves the eye towards the pivot by `delta`, staying between the clip planes
    pub fn zoom(&mut self, delta: f32) {
        let distance = self.clamp_distance(self.get_distance() - delta);
        self.set_position(self.pivot - self.forward * distance);
    }

    fn clamp_distance(&self, distance: f32) -> f32 {
        distance.clamp(self.near + 0.1, self.far - 0.1)
    }

    pub fn get_view_proj_mat(&self, aspect_ratio: f32) -> Mat4 {
        self.get_proj_mat(aspect_ratio) * self.get_view_mat()
    }

    pub fn get_view_mat(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward, self.up)
    }

    pub fn get_proj_mat(&self, aspect_ratio: f32) -> Mat4 {
        let mut proj = Mat4::perspective_rh(
            self.fov_y_deg.to_radians(),
            aspect_ratio,
            self.near,
            self.far,
        );
        // Vulkan clip space has Y pointing down
        proj.y_axis.y *= -1.0;
        proj
    }

    pub fn get_position(&self) -> Vec3 {
        self.position
    }

    pub fn get_forward(&self) -> Vec3 {
        self.forward
    }

    pub fn get_near(&self) -> f32 {
        self.near
    }

    pub fn get_far(&self) -> f32 {
        self.far
    }

    pub fn get_distance(&self) -> f32 {
        self.position.distance(self.pivot)
    }

    pub fn get_pitch(&self) -> f32 {
        util::calculate_pitch(self.position - self.pivot)
    }

    pub fn get_yaw(&self) -> f32 {
        util::calculate_yaw(self.position - self.pivot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4Swizzles;

    #[test]
    fn starts_on_the_z_axis_looking_at_origin() {
        let camera = Camera::new(5.0);
        assert_eq!(camera.get_position(), Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(camera.get_forward(), Vec3::NEG_Z);
        assert!((camera.get_distance() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn orbit_keeps_distance_and_clamps_pitch() {
        let mut camera = Camera::new(3.0);
        camera.orbit(0.7, 10.0);

        assert!((camera.get_distance() - 3.0).abs() < 1e-4);
        assert!((camera.get_pitch() - Camera::MAX_PITCH_DEG.to_radians()).abs() < 1e-4);

        camera.orbit(0.0, -20.0);
        assert!((camera.get_pitch() + Camera::MAX_PITCH_DEG.to_radians()).abs() < 1e-4);
    }

    #[test]
    fn zoom_stays_between_clip_planes() {
        let mut camera = Camera::new(5.0);
        camera.zoom(2.0);
        assert!((camera.get_distance() - 3.0).abs() < 1e-5);

        camera.zoom(100.0);
        assert!((camera.get_distance() - (camera.get_near() + 0.1)).abs() < 1e-5);

        camera.zoom(-1000.0);
        assert!((camera.get_distance() - (camera.get_far() - 0.1)).abs() < 1e-3);
    }

    #[test]
    fn projection_flips_y_for_vulkan() {
        let camera = Camera::new(5.0);
        let above_pivot = camera.get_view_proj_mat(1.0) * Vec3::new(0.0, 1.0, 0.0).extend(1.0);
        // Points above the pivot land in the upper half of the framebuffer, which is -Y
        assert!(above_pivot.xyz().y / above_pivot.w < 0.0);
    }
}
