use glam::{Mat4, Vec3};

/// Pitch never reaches the poles, otherwise the look-at basis collapses.
pub const PITCH_LIMIT_DEG: f32 = 89.0;

/// Movement commands understood by the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Forward,
    Backward,
    Left,
    Right,
    Up,
    Down,
}

/// First-person camera: a world position plus yaw/pitch orientation in degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    position: Vec3,
    up: Vec3,
    yaw_deg: f32,
    pitch_deg: f32,
}

impl Camera {
    /// Creates a camera at `position` looking toward `target`.
    pub fn new(position: Vec3, target: Vec3, up: Vec3) -> Self {
        let front = (target - position).normalize_or_zero();
        let (yaw_deg, pitch_deg) = if front.length_squared() > 0.0 {
            (
                front.z.atan2(front.x).to_degrees(),
                front.y.clamp(-1.0, 1.0).asin().to_degrees(),
            )
        } else {
            (-90.0, 0.0)
        };
        Self {
            position,
            up: up.normalize(),
            yaw_deg,
            pitch_deg,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Unit vector pointing where the camera looks.
    pub fn front(&self) -> Vec3 {
        let yaw = self.yaw_deg.to_radians();
        let pitch = self.pitch_deg.to_radians();
        Vec3::new(
            yaw.cos() * pitch.cos(),
            pitch.sin(),
            yaw.sin() * pitch.cos(),
        )
        .normalize()
    }

    /// Point one unit ahead of the camera. The shadow pass orbits this point.
    pub fn target(&self) -> Vec3 {
        self.position + self.front()
    }

    /// Translates the camera along `direction` by `speed` world units.
    pub fn advance(&mut self, direction: MoveDirection, speed: f32) {
        let front = self.front();
        let right = front.cross(self.up).normalize();
        let step = match direction {
            MoveDirection::Forward => front,
            MoveDirection::Backward => -front,
            MoveDirection::Left => -right,
            MoveDirection::Right => right,
            MoveDirection::Up => self.up,
            MoveDirection::Down => -self.up,
        };
        self.position += step * speed;
    }

    /// Applies accumulated look deltas, in degrees, clamping pitch.
    pub fn rotate(&mut self, delta_yaw_deg: f32, delta_pitch_deg: f32) {
        self.yaw_deg += delta_yaw_deg;
        self.pitch_deg = (self.pitch_deg + delta_pitch_deg).clamp(-PITCH_LIMIT_DEG, PITCH_LIMIT_DEG);
    }

    /// Look-at matrix for the current position and orientation.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target(), self.up)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_camera() -> Camera {
        Camera::new(
            Vec3::new(0.0, 2.0, 5.5),
            Vec3::new(0.0, 2.0, 0.0),
            Vec3::Y,
        )
    }

    #[test]
    fn front_points_at_construction_target() {
        let camera = demo_camera();
        let expected = (Vec3::new(0.0, 2.0, 0.0) - Vec3::new(0.0, 2.0, 5.5)).normalize();
        assert!(camera.front().distance(expected) < 1e-5);
    }

    #[test]
    fn forward_then_backward_returns_to_start() {
        let mut camera = demo_camera();
        let start = camera.position();
        camera.advance(MoveDirection::Forward, 0.1);
        camera.advance(MoveDirection::Backward, 0.1);
        assert!(camera.position().distance(start) < 1e-5);
    }

    #[test]
    fn strafe_moves_perpendicular_to_front() {
        let mut camera = demo_camera();
        let front = camera.front();
        let start = camera.position();
        camera.advance(MoveDirection::Right, 0.5);
        let moved = camera.position() - start;
        assert!(moved.dot(front).abs() < 1e-5);
        assert!((moved.length() - 0.5).abs() < 1e-5);
    }

    #[test]
    fn pitch_is_clamped_short_of_the_pole() {
        let mut camera = demo_camera();
        camera.rotate(0.0, 500.0);
        assert!(camera.front().y < 1.0);
        camera.rotate(0.0, -1000.0);
        assert!(camera.front().y > -1.0);
        // Still a usable basis: right vector does not degenerate.
        let right = camera.front().cross(Vec3::Y);
        assert!(right.length() > 1e-3);
    }

    #[test]
    fn full_yaw_turn_restores_front() {
        let mut camera = demo_camera();
        let before = camera.front();
        camera.rotate(360.0, 0.0);
        assert!(camera.front().distance(before) < 1e-4);
    }

    #[test]
    fn view_matrix_moves_eye_to_origin() {
        let camera = demo_camera();
        let eye = camera.view_matrix().transform_point3(camera.position());
        assert!(eye.length() < 1e-5);
    }

    #[test]
    fn view_matrix_looks_down_negative_z() {
        let camera = demo_camera();
        let ahead = camera.view_matrix().transform_point3(camera.target());
        assert!(ahead.x.abs() < 1e-5);
        assert!(ahead.y.abs() < 1e-5);
        assert!((ahead.z + 1.0).abs() < 1e-5);
    }
}
