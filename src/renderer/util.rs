use glam::Vec3;

pub fn calculate_pitch(forward: Vec3) -> f32 {
    let forward = forward.normalize();
    forward.y.clamp(-1.0, 1.0).asin()
}

pub fn calculate_yaw(forward: Vec3) -> f32 {
    let forward = forward.normalize();
    forward.z.atan2(forward.x)
}

pub fn calculate_direction(pitch: f32, yaw: f32) -> Vec3 {
    Vec3::new(
        yaw.cos() * pitch.cos(),
        pitch.sin(),
        yaw.sin() * pitch.cos(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_round_trips_through_angles() {
        let (pitch, yaw) = (0.4_f32, -1.2_f32);
        let direction = calculate_direction(pitch, yaw);
        assert!((calculate_pitch(direction) - pitch).abs() < 1e-5);
        assert!((calculate_yaw(direction) - yaw).abs() < 1e-5);
    }
}
