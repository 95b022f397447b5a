#![forbid(unsafe_code)]

//! Content Expose core
//!
//! Live editing of an application's static content tree from an in-page
//! panel. The host hands its raw tree to the resolver, reads through a
//! tracked accessor, and the panel offers one JSON tab per key that was
//! actually read. Saved edits become an override that replaces the raw
//! tree on the next load until reset.
//!
//! # Key Components
//!
//! - [`ExposeContext`] - One instance: resolver, store, and panel controller
//! - [`ContentResolver`] / [`TrackedContent`] - Override resolution and read tracking
//! - [`OverrideStore`] - Typed access to persisted override and panel state
//! - [`StorageBackend`] - Flat string key/value persistence ([`MemoryStorage`], `FileStorage`)
//! - [`PanelController`] - Panel lifecycle state machine and panel actions
//! - [`GestureTracker`] - Move and resize gestures with minimum size clamping
//! - [`TabEditor`] - Per-key JSON edit buffers
//!
//! # How it fits in the system
//! This crate is target-independent and drives nothing by itself: time,
//! key events, pointer events, and the document are supplied by the host
//! through [`PanelHost`]. `content-expose-web` is the browser host.

pub mod config;
pub mod content;
pub mod context;
pub mod error;
pub mod geometry;
pub mod keys;
pub mod panel;
pub mod resolver;
pub mod status;
pub mod storage;
pub mod store;
pub mod tabs;

pub use config::{ExposeConfig, OverrideVisibility, StorageKeys};
pub use content::{Content, ContentValue};
pub use context::ExposeContext;
pub use error::{ExposeError, ExposeResult};
pub use geometry::{
    Bounds, GestureKind, GestureTracker, ListenerCommand, MinSize, PointerPosition,
    ResizeDirection,
};
pub use keys::{KeyInput, Modifiers, PanelCommand};
pub use panel::{
    CommitOutcome, KeyOutcome, PanelController, PanelEffect, PanelHandle, PanelHost,
    PanelSession, PanelState, PanelTransition,
};
pub use resolver::{ContentResolver, TrackedContent};
pub use status::{StatusKind, StatusLine, StatusMessage};
#[cfg(feature = "file-storage")]
pub use storage::FileStorage;
pub use storage::{MemoryStorage, StorageBackend, StorageError, StorageResult};
pub use store::OverrideStore;
pub use tabs::{TabEditor, TabValidationError};
