use winit::event::{ElementState, KeyEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use crate::types::KeyTrigger;

/// Keys the canvas reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanvasKey {
    Quit,
    Reload,
    Export,
}

impl CanvasKey {
    const ALL: [CanvasKey; 3] = [CanvasKey::Quit, CanvasKey::Reload, CanvasKey::Export];

    fn index(self) -> usize {
        match self {
            CanvasKey::Quit => 0,
            CanvasKey::Reload => 1,
            CanvasKey::Export => 2,
        }
    }

    /// Escape quits, R reloads, E exports; matched on physical position.
    pub fn from_key_event(event: &KeyEvent) -> Option<Self> {
        match event.physical_key {
            PhysicalKey::Code(KeyCode::Escape) => Some(CanvasKey::Quit),
            PhysicalKey::Code(KeyCode::KeyR) => Some(CanvasKey::Reload),
            PhysicalKey::Code(KeyCode::KeyE) => Some(CanvasKey::Export),
            _ => None,
        }
    }
}

/// Actions requested for the upcoming frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameCommands {
    pub quit: bool,
    pub reload: bool,
    pub export: bool,
}

/// Tracks key state between redraws.
#[derive(Debug, Default)]
pub struct InputState {
    held: [bool; 3],
    pressed: [bool; 3],
}

impl InputState {
    pub fn handle_key_event(&mut self, event: &KeyEvent) {
        let Some(key) = CanvasKey::from_key_event(event) else {
            return;
        };
        match event.state {
            ElementState::Pressed if !event.repeat => self.press(key),
            ElementState::Pressed => {}
            ElementState::Released => self.release(key),
        }
    }

    pub fn press(&mut self, key: CanvasKey) {
        let index = key.index();
        if !self.held[index] {
            self.pressed[index] = true;
        }
        self.held[index] = true;
    }

    pub fn release(&mut self, key: CanvasKey) {
        self.held[key.index()] = false;
    }

    /// Clears held keys, e.g. when the window loses focus.
    pub fn release_all(&mut self) {
        self.held = [false; 3];
    }

    /// Commands for this frame; press edges are consumed.
    ///
    /// Quit always fires on the press itself. Reload and export fire once per
    /// press with [`KeyTrigger::Edge`] and on every frame while held with
    /// [`KeyTrigger::Level`].
    pub fn take_commands(&mut self, trigger: KeyTrigger) -> FrameCommands {
        let active = |key: CanvasKey| -> bool {
            let index = key.index();
            match trigger {
                KeyTrigger::Edge => self.pressed[index],
                KeyTrigger::Level => self.pressed[index] || self.held[index],
            }
        };
        let commands = FrameCommands {
            quit: self.pressed[CanvasKey::Quit.index()] || self.held[CanvasKey::Quit.index()],
            reload: active(CanvasKey::Reload),
            export: active(CanvasKey::Export),
        };
        for key in CanvasKey::ALL {
            self.pressed[key.index()] = false;
        }
        commands
    }
}
