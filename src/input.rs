use std::collections::HashSet;

use glam::Vec2;

/// Identifier for a keyboard key, independent of the window backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// Letter keys, stored uppercase.
    Character(char),
    /// Digit row keys 0-9.
    Digit(u8),
    Escape,
}

/// Polled keyboard and mouse state for the frame loop.
///
/// Key state is level-triggered: the simulation step reads whatever is held
/// when it runs. Mouse motion accumulates between steps and is drained once
/// per frame.
#[derive(Debug, Default)]
pub struct InputState {
    held: HashSet<KeyCode>,
    look_delta: Vec2,
    last_cursor: Option<Vec2>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, key: KeyCode) {
        self.held.insert(key);
    }

    pub fn release(&mut self, key: KeyCode) {
        self.held.remove(&key);
    }

    pub fn is_held(&self, key: KeyCode) -> bool {
        self.held.contains(&key)
    }

    /// Folds a cursor sample into the pending look delta.
    ///
    /// The very first sample only establishes the reference point, so the view
    /// does not jump when the cursor enters the window. Vertical motion is
    /// flipped: moving the mouse up pitches the camera up.
    pub fn cursor_moved(&mut self, position: Vec2) {
        if let Some(last) = self.last_cursor {
            self.look_delta.x += position.x - last.x;
            self.look_delta.y += last.y - position.y;
        }
        self.last_cursor = Some(position);
    }

    /// Returns the accumulated look delta and resets it for the next frame.
    pub fn take_look_delta(&mut self) -> Vec2 {
        std::mem::take(&mut self.look_delta)
    }
}
