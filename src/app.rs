use std::fmt;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use glam::Vec2;
use log::info;
use pollster::block_on;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::{CursorGrabMode, Window, WindowId};

use crate::camera::MoveDirection;
use crate::context::{FillMode, RenderContext};
use crate::input::{InputState, KeyCode};
use crate::render::Renderer;
use crate::scene::SceneAssets;

/// Degrees the key light swings per frame while J or L is held.
const LIGHT_SWING_STEP_DEG: f32 = 1.0;
/// Speed of the T debug key that plunges the camera down.
const FAST_DESCENT_SPEED: f32 = 40.0;

/// Opens a window and runs the interactive frame loop until the user quits.
pub fn run(assets: SceneAssets) -> Result<()> {
    let event_loop = EventLoop::new()
        .map_err(|err| anyhow::Error::new(WindowInitError::new("event loop", &err)))?;
    let mut app = App::new(assets);
    event_loop
        .run_app(&mut app)
        .context("event loop terminated abnormally")?;
    app.finish()
}

/// Error for the window-system bring-up stage. Kept as its own type so the
/// caller can tell "no display available" apart from scene or GPU failures.
#[derive(Debug)]
pub struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn new(stage: &str, err: &dyn fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

struct App {
    assets: SceneAssets,
    context: RenderContext,
    input: InputState,
    renderer: Option<Renderer>,
    error: Option<anyhow::Error>,
}

impl App {
    fn new(assets: SceneAssets) -> Self {
        let context = RenderContext::new(&assets.settings);
        Self {
            assets,
            context,
            input: InputState::new(),
            renderer: None,
            error: None,
        }
    }

    fn finish(self) -> Result<()> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, event: KeyEvent) {
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        let Some(key) = map_keycode(code) else {
            return;
        };
        if event.state.is_pressed() {
            match key {
                KeyCode::Escape => {
                    event_loop.exit();
                    return;
                }
                // Edge-triggered: one toggle per press, no autorepeat.
                KeyCode::Character('M') if !event.repeat => self.context.toggle_depth_view(),
                _ => {}
            }
            self.input.press(key);
        } else {
            self.input.release(key);
        }
    }

    /// One fixed simulation step: camera, light and toggles from the held
    /// input state, then the rain.
    fn step(&mut self) {
        let look = self.input.take_look_delta() * self.assets.settings.mouse_sensitivity;
        if look != Vec2::ZERO {
            self.context.camera.rotate(look.x, look.y);
        }

        let speed = self.assets.settings.camera_speed;
        let moves = [
            (KeyCode::Character('W'), MoveDirection::Forward),
            (KeyCode::Character('S'), MoveDirection::Backward),
            (KeyCode::Character('A'), MoveDirection::Left),
            (KeyCode::Character('D'), MoveDirection::Right),
            (KeyCode::Character('Z'), MoveDirection::Up),
            (KeyCode::Character('X'), MoveDirection::Down),
        ];
        for (key, direction) in moves {
            if self.input.is_held(key) {
                self.context.camera.advance(direction, speed);
            }
        }
        if self.input.is_held(KeyCode::Character('T')) {
            self.context
                .camera
                .advance(MoveDirection::Down, FAST_DESCENT_SPEED);
        }

        if self.input.is_held(KeyCode::Character('J')) {
            self.context.light.swing(-LIGHT_SWING_STEP_DEG);
        }
        if self.input.is_held(KeyCode::Character('L')) {
            self.context.light.swing(LIGHT_SWING_STEP_DEG);
        }

        if self.input.is_held(KeyCode::Character('F')) {
            self.context.fog_enabled = true;
        }
        if self.input.is_held(KeyCode::Character('G')) {
            self.context.fog_enabled = false;
        }

        if self.input.is_held(KeyCode::Digit(1)) {
            self.context.fill_mode = FillMode::Fill;
        }
        if self.input.is_held(KeyCode::Digit(2)) {
            self.context.fill_mode = FillMode::Line;
        }
        if self.input.is_held(KeyCode::Digit(3)) {
            self.context.fill_mode = FillMode::Point;
        }

        if self.input.is_held(KeyCode::Digit(4)) {
            self.context.light.point_enabled = true;
        }
        if self.input.is_held(KeyCode::Digit(5)) {
            self.context.light.point_enabled = false;
        }

        self.context.rain.update();
    }

    fn redraw(&mut self) -> Result<()> {
        let Some(renderer) = &mut self.renderer else {
            return Ok(());
        };
        renderer.update_frame(&self.context);
        if let Err(err) = renderer.render(&self.context) {
            match err {
                wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                    let size = renderer.window().inner_size();
                    renderer.resize(size);
                }
                wgpu::SurfaceError::OutOfMemory => {
                    return Err(anyhow!("GPU is out of memory"));
                }
                wgpu::SurfaceError::Timeout => {
                    info!("surface timeout; retrying next frame");
                }
                wgpu::SurfaceError::Other => {
                    return Err(anyhow!("unrecoverable surface error"));
                }
            }
        }
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Poll);
        if self.renderer.is_some() {
            return;
        }

        let settings = &self.assets.settings;
        let attributes = Window::default_attributes()
            .with_title("Rainscape")
            .with_inner_size(LogicalSize::new(
                settings.window_width as f64,
                settings.window_height as f64,
            ));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                self.error = Some(anyhow::Error::new(WindowInitError::new("window", &err)));
                event_loop.exit();
                return;
            }
        };

        // Mouse look wants a captive cursor; not every platform grants it.
        if window.set_cursor_grab(CursorGrabMode::Confined).is_ok() {
            window.set_cursor_visible(false);
        }

        match block_on(Renderer::new(Arc::clone(&window), &self.assets)) {
            Ok(renderer) => {
                window.request_redraw();
                self.renderer = Some(renderer);
            }
            Err(err) => {
                self.error = Some(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(renderer) = &mut self.renderer {
                    renderer.resize(size);
                }
                self.context.resize(size.width, size.height);
            }
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(event_loop, event),
            WindowEvent::CursorMoved { position, .. } => {
                self.input
                    .cursor_moved(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::RedrawRequested => {
                self.step();
                if let Err(err) = self.redraw() {
                    self.error = Some(err);
                    event_loop.exit();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(renderer) = &self.renderer {
            renderer.window().request_redraw();
        }
    }
}

fn map_keycode(code: winit::keyboard::KeyCode) -> Option<KeyCode> {
    use winit::keyboard::KeyCode as Key;
    Some(match code {
        Key::Escape => KeyCode::Escape,
        Key::Digit1 => KeyCode::Digit(1),
        Key::Digit2 => KeyCode::Digit(2),
        Key::Digit3 => KeyCode::Digit(3),
        Key::Digit4 => KeyCode::Digit(4),
        Key::Digit5 => KeyCode::Digit(5),
        Key::KeyA => KeyCode::Character('A'),
        Key::KeyD => KeyCode::Character('D'),
        Key::KeyF => KeyCode::Character('F'),
        Key::KeyG => KeyCode::Character('G'),
        Key::KeyJ => KeyCode::Character('J'),
        Key::KeyL => KeyCode::Character('L'),
        Key::KeyM => KeyCode::Character('M'),
        Key::KeyS => KeyCode::Character('S'),
        Key::KeyT => KeyCode::Character('T'),
        Key::KeyW => KeyCode::Character('W'),
        Key::KeyX => KeyCode::Character('X'),
        Key::KeyZ => KeyCode::Character('Z'),
        _ => return None,
    })
}
