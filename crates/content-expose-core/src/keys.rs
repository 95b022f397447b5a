#![forbid(unsafe_code)]

//! Keyboard shortcuts.
//!
//! - `Ctrl+E` / `Cmd+E` toggles the panel.
//! - `Escape` closes it while open.
//!
//! Both call `preventDefault` on the triggering event so browser and editor
//! bindings for the same keys do not fire as well.

use bitflags::bitflags;

bitflags! {
    /// Modifier keys held during a key event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        const NONE  = 0b0000;
        const SHIFT = 0b0001;
        const ALT   = 0b0010;
        const CTRL  = 0b0100;
        /// Meta / Command.
        const META  = 0b1000;
    }
}

/// A key press as reported by the host (`KeyboardEvent.key` + modifiers).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInput {
    pub key: String,
    pub modifiers: Modifiers,
}

impl KeyInput {
    pub fn new(key: impl Into<String>, modifiers: Modifiers) -> Self {
        Self {
            key: key.into(),
            modifiers,
        }
    }
}

/// Panel command bound to a shortcut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelCommand {
    Toggle,
    Close,
}

impl PanelCommand {
    /// Map a key press to a command, if it is bound.
    #[must_use]
    pub fn from_key(input: &KeyInput) -> Option<Self> {
        let command_held = input
            .modifiers
            .intersects(Modifiers::CTRL | Modifiers::META);
        if command_held && input.key.eq_ignore_ascii_case("e") {
            return Some(Self::Toggle);
        }
        if input.key == "Escape" {
            return Some(Self::Close);
        }
        None
    }
}
