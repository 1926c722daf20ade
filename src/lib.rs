//! Building blocks for the Rainscape demo: a small wgpu renderer that
//! draws a rainy street scene with a first-person camera, instanced rain
//! and directional shadow mapping.
//!
//! The simulation and scene types are plain data and stay independent of
//! the GPU layer, so everything up to the render passes can be exercised
//! headlessly in tests.

pub mod app;
pub mod camera;
pub mod context;
pub mod input;
pub mod light;
pub mod obj;
pub mod rain;
pub mod render;
pub mod scene;
pub mod transform;

pub use camera::{Camera, MoveDirection};
pub use context::{FillMode, RenderContext};
pub use input::{InputState, KeyCode};
pub use light::LightRig;
pub use obj::{builtin_cube, load_obj, parse_obj, Mesh, Vertex};
pub use rain::Rain;
pub use render::Renderer;
pub use scene::{
    LoadedObject, ObjectRole, SceneAssets, SceneManifest, SceneObject, SceneSettings,
};
pub use transform::{compose_model, normal_matrix, Projection, Viewport};
