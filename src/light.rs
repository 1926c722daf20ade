use glam::{Mat3, Mat4, Vec3};

use crate::transform;

/// Scale of the small unlit cube drawn at the light's position.
const MARKER_SCALE: f32 = 0.05;

/// Directional key light with a user-steered rotation about the world Y axis,
/// plus an optional fixed point light.
#[derive(Debug, Clone, PartialEq)]
pub struct LightRig {
    /// Vector from the scene toward the light, unrotated. Not normalized;
    /// its length sets how far the shadow eye sits from the camera target.
    pub direction: Vec3,
    pub color: Vec3,
    pub angle_deg: f32,
    pub point_position: Vec3,
    pub point_enabled: bool,
}

impl LightRig {
    pub fn new(direction: Vec3, color: Vec3) -> Self {
        Self {
            direction,
            color,
            angle_deg: 0.0,
            point_position: Vec3::new(-5.71, 0.36, 18.25),
            point_enabled: false,
        }
    }

    /// Swings the light about the Y axis by `delta_deg`.
    pub fn swing(&mut self, delta_deg: f32) {
        self.angle_deg += delta_deg;
    }

    pub fn rotation(&self) -> Mat4 {
        Mat4::from_rotation_y(self.angle_deg.to_radians())
    }

    /// Current light direction after the user-steered rotation.
    pub fn rotated_direction(&self) -> Vec3 {
        Mat3::from_rotation_y(self.angle_deg.to_radians()) * self.direction
    }

    /// Light direction expressed in view space, for shading.
    pub fn view_space_direction(&self, view: Mat4) -> Vec3 {
        transform::normal_matrix(view, self.rotation()) * self.direction
    }

    /// Point light position in view space.
    pub fn view_space_point(&self, view: Mat4) -> Vec3 {
        view.transform_point3(self.point_position)
    }

    /// Model matrix for the marker cube riding on the light direction.
    pub fn marker_model(&self) -> Mat4 {
        self.rotation()
            * Mat4::from_translation(self.direction)
            * Mat4::from_scale(Vec3::splat(MARKER_SCALE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_light() -> LightRig {
        LightRig::new(Vec3::new(-0.16, 6.79, 4.31), Vec3::ONE)
    }

    #[test]
    fn unrotated_direction_is_unchanged() {
        let light = demo_light();
        assert!(light.rotated_direction().distance(light.direction) < 1e-6);
    }

    #[test]
    fn quarter_swing_maps_x_to_z() {
        let mut light = LightRig::new(Vec3::new(1.0, 2.0, 3.0), Vec3::ONE);
        light.swing(90.0);
        // Rotation about Y sends (x, y, z) to (z, y, -x).
        assert!(light.rotated_direction().distance(Vec3::new(3.0, 2.0, -1.0)) < 1e-5);
    }

    #[test]
    fn swings_accumulate() {
        let mut light = demo_light();
        light.swing(1.0);
        light.swing(1.0);
        light.swing(-1.0);
        assert!((light.angle_deg - 1.0).abs() < 1e-6);
    }

    #[test]
    fn identity_view_leaves_direction_in_place() {
        let mut light = demo_light();
        light.swing(33.0);
        let through_view = light.view_space_direction(Mat4::IDENTITY);
        assert!(through_view.distance(light.rotated_direction()) < 1e-4);
    }

    #[test]
    fn marker_sits_on_the_rotated_direction() {
        let mut light = demo_light();
        light.swing(45.0);
        let marker = light.marker_model().transform_point3(Vec3::ZERO);
        assert!(marker.distance(light.rotated_direction()) < 1e-4);
    }

    #[test]
    fn view_space_point_matches_view_transform() {
        let light = demo_light();
        let view = Mat4::look_at_rh(Vec3::new(0.0, 2.0, 5.5), Vec3::new(0.0, 2.0, 0.0), Vec3::Y);
        let expected = view.transform_point3(light.point_position);
        assert!(light.view_space_point(view).distance(expected) < 1e-6);
    }
}
