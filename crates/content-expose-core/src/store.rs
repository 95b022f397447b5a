#![forbid(unsafe_code)]

//! Override store: the override tree and panel state in durable storage.
//!
//! All values are JSON-encoded strings under the fixed keys of
//! [`StorageKeys`]. Reads are forgiving (absent or malformed values read as
//! "nothing stored"); writes propagate storage failures.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::config::StorageKeys;
use crate::content::{Content, parse_content};
use crate::error::{ExposeError, ExposeResult};
use crate::geometry::{Bounds, MinSize};
use crate::storage::StorageBackend;

/// Stored bounds may be partial; missing fields come from the defaults.
#[derive(Deserialize)]
struct PartialBounds {
    x: Option<u32>,
    y: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Typed access to the persisted override and panel state.
///
/// Cloning is cheap; clones share the backend.
#[derive(Clone)]
pub struct OverrideStore {
    backend: Arc<dyn StorageBackend>,
    keys: StorageKeys,
}

impl OverrideStore {
    /// Create a store over `backend` using `keys`.
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>, keys: StorageKeys) -> Self {
        Self { backend, keys }
    }

    /// Backend name for logging.
    #[must_use]
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Storage key names in use.
    #[must_use]
    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.backend.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(backend = self.backend.name(), key, error = %e, "storage read failed");
                None
            }
        }
    }

    fn write_json<T: serde::Serialize + ?Sized>(&self, key: &str, value: &T) -> ExposeResult<()> {
        let encoded =
            serde_json::to_string(value).map_err(|e| ExposeError::Serialization(e.to_string()))?;
        self.backend.set(key, &encoded)?;
        Ok(())
    }

    // ── Override content ────────────────────────────────────────────────

    /// The persisted override, or `None` when absent or malformed.
    #[must_use]
    pub fn load(&self) -> Option<Content> {
        let raw = self.read(&self.keys.content)?;
        match parse_content(&raw) {
            Ok(content) => Some(content),
            Err(e) => {
                tracing::debug!(error = %e, "ignoring malformed stored override");
                None
            }
        }
    }

    /// Whether anything is stored under the override key.
    #[must_use]
    pub fn has_override(&self) -> bool {
        self.read(&self.keys.content).is_some()
    }

    /// Persist `merged` as the new override, replacing any previous one.
    pub fn commit(&self, merged: &Content) -> ExposeResult<()> {
        self.write_json(&self.keys.content, merged)?;
        tracing::debug!(keys = merged.len(), "committed override");
        Ok(())
    }

    /// Delete the persisted override.
    pub fn reset(&self) -> ExposeResult<()> {
        self.backend.remove(&self.keys.content)?;
        tracing::debug!("reset override");
        Ok(())
    }

    // ── Panel state ─────────────────────────────────────────────────────

    /// Whether the panel was open when state was last persisted.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.read(&self.keys.open)
            .and_then(|raw| serde_json::from_str::<bool>(&raw).ok())
            .unwrap_or(false)
    }

    pub fn set_open(&self, open: bool) -> ExposeResult<()> {
        self.write_json(&self.keys.open, &open)
    }

    /// Stored bounds merged over `defaults`, raised to `min`.
    #[must_use]
    pub fn bounds(&self, defaults: Bounds, min: MinSize) -> Bounds {
        let stored = self
            .read(&self.keys.bounds)
            .and_then(|raw| serde_json::from_str::<PartialBounds>(&raw).ok());
        let bounds = match stored {
            Some(p) => Bounds {
                x: p.x.unwrap_or(defaults.x),
                y: p.y.unwrap_or(defaults.y),
                width: p.width.unwrap_or(defaults.width),
                height: p.height.unwrap_or(defaults.height),
            },
            None => defaults,
        };
        bounds.clamp_to(min)
    }

    pub fn set_bounds(&self, bounds: Bounds) -> ExposeResult<()> {
        self.write_json(&self.keys.bounds, &bounds)
    }

    /// Stored active tab name.
    ///
    /// Accepts a JSON string or a bare legacy string.
    #[must_use]
    pub fn active_tab(&self) -> Option<String> {
        let raw = self.read(&self.keys.tab)?;
        let tab = serde_json::from_str::<String>(&raw).unwrap_or(raw);
        (!tab.is_empty()).then_some(tab)
    }

    pub fn set_active_tab(&self, tab: &str) -> ExposeResult<()> {
        self.write_json(&self.keys.tab, tab)
    }

    /// Stored editor scroll offset; 0 when absent.
    #[must_use]
    pub fn scroll_offset(&self) -> u32 {
        self.read(&self.keys.scroll)
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map_or(0, |v| v.min(f64::from(u32::MAX)) as u32)
    }

    pub fn set_scroll_offset(&self, offset: u32) -> ExposeResult<()> {
        self.write_json(&self.keys.scroll, &offset)
    }
}

impl fmt::Debug for OverrideStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverrideStore")
            .field("backend", &self.backend.name())
            .field("keys", &self.keys)
            .finish()
    }
}
