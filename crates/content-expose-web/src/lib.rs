#![forbid(unsafe_code)]

//! Browser host for content-expose.
//!
//! This crate is intentionally host-specific (web/WASM). It supplies the
//! pieces `content-expose-core` leaves to the host:
//! - a `localStorage` [`StorageBackend`](content_expose_core::StorageBackend),
//! - a DOM [`PanelHost`](content_expose_core::PanelHost) keyed by the
//!   reserved panel element id,
//! - a `wasm-bindgen` API for the page glue (key events, pointer events,
//!   timer ticks, panel actions, clipboard export).
//!
//! Native builds compile only the target-independent helpers ([`view`],
//! [`key_input`]) so `cargo test --workspace` covers them.

pub mod view;

#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use wasm::{ContentExposeWeb, DomPanelHost, LocalStorage};

use content_expose_core::{KeyInput, Modifiers};

/// Build a [`KeyInput`] from the fields of a DOM `KeyboardEvent`.
#[must_use]
pub fn key_input(key: &str, ctrl: bool, meta: bool, shift: bool, alt: bool) -> KeyInput {
    let mut modifiers = Modifiers::NONE;
    modifiers.set(Modifiers::CTRL, ctrl);
    modifiers.set(Modifiers::META, meta);
    modifiers.set(Modifiers::SHIFT, shift);
    modifiers.set(Modifiers::ALT, alt);
    KeyInput::new(key, modifiers)
}
