use crate::camera::Camera;
use crate::light::LightRig;
use crate::rain::Rain;
use crate::scene::SceneSettings;
use crate::transform::{Projection, Viewport};

/// Polygon rasterization modes cycled by the 1/2/3 keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillMode {
    #[default]
    Fill,
    Line,
    Point,
}

/// Mutable per-frame state threaded through both render passes.
///
/// Everything a pass reads lives here, so a frame is a pure function of this
/// struct plus the uploaded geometry.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub camera: Camera,
    pub light: LightRig,
    pub rain: Rain,
    pub projection: Projection,
    pub viewport: Viewport,
    pub fog_enabled: bool,
    pub fog_density: f32,
    pub depth_view: bool,
    pub fill_mode: FillMode,
}

impl RenderContext {
    pub fn new(settings: &SceneSettings) -> Self {
        let (width, height) = (settings.window_width, settings.window_height);
        Self {
            camera: Camera::new(
                settings.camera_position,
                settings.camera_target,
                glam::Vec3::Y,
            ),
            light: LightRig::new(settings.light_direction, settings.light_color),
            rain: Rain::scatter(settings.rain_count, settings.rain_seed),
            projection: Projection::new(width, height),
            viewport: Viewport::new(width, height),
            fog_enabled: false,
            fog_density: settings.fog_density,
            depth_view: false,
            fill_mode: FillMode::default(),
        }
    }

    /// Tracks a window resize: projection aspect plus viewport rectangle.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.projection.resize(width, height);
        self.viewport.resize(width, height);
    }

    /// Flips between the lit scene and the raw shadow-map view.
    pub fn toggle_depth_view(&mut self) {
        self.depth_view = !self.depth_view;
    }
}
