use glam::{Mat3, Mat4, Vec3};

/// Normal matrix for a drawable: inverse-transpose of the model-view rotation.
///
/// Keeps normals perpendicular to surfaces under non-uniform scale.
pub fn normal_matrix(view: Mat4, model: Mat4) -> Mat3 {
    Mat3::from_mat4(view * model).inverse().transpose()
}

/// Builds a model matrix from translation, XYZ Euler rotation in degrees and scale.
pub fn compose_model(position: Vec3, rotation_deg: Vec3, scale: Vec3) -> Mat4 {
    Mat4::from_translation(position)
        * Mat4::from_rotation_z(rotation_deg.z.to_radians())
        * Mat4::from_rotation_y(rotation_deg.y.to_radians())
        * Mat4::from_rotation_x(rotation_deg.x.to_radians())
        * Mat4::from_scale(scale)
}

/// Perspective projection parameters. Aspect follows the window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub fov_y_deg: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Projection {
    pub fn new(width: u32, height: u32) -> Self {
        let mut projection = Self {
            fov_y_deg: 45.0,
            aspect: 1.0,
            near: 0.1,
            far: 1000.0,
        };
        projection.resize(width, height);
        projection
    }

    /// Tracks a window resize. Zero-sized windows leave the aspect untouched.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_deg.to_radians(), self.aspect, self.near, self.far)
    }
}

/// Window-space rectangle the final pass rasterizes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// Covers the whole window after a resize.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.x = 0;
        self.y = 0;
        self.width = width;
        self.height = height;
    }
}
