#![forbid(unsafe_code)]

//! Configuration as data.
//!
//! Every tunable lives in [`ExposeConfig`]. Each field defaults to the
//! built-in constant, so `ExposeConfig::default()` is the stock behavior and
//! a JSON document only needs the fields it changes:
//!
//! ```json
//! {
//!   "visibility": "after_panel_opened",
//!   "min_size": { "width": 300, "height": 250 },
//!   "keys": { "content": "my-app-preview" }
//! }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::geometry::{Bounds, MinSize};

/// Default id of the panel's root element.
pub const DEFAULT_PANEL_ID: &str = "content-expose-devtools";

/// Delay between process start and auto-reopening a panel that was open
/// before the reload.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// How long transient status messages stay visible.
pub const DEFAULT_STATUS_TTL: Duration = Duration::from_secs(3);

/// When a stored override becomes visible to readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideVisibility {
    /// As soon as an override exists in storage.
    #[default]
    Immediate,
    /// Only once the panel has been opened in the current load, so the first
    /// paint always shows raw content.
    AfterPanelOpened,
}

/// Fixed identifiers in the durable key/value store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageKeys {
    pub content: String,
    pub open: String,
    pub bounds: String,
    pub tab: String,
    pub scroll: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            content: "content-expose-preview".into(),
            open: "content-expose-open".into(),
            bounds: "content-expose-bounds".into(),
            tab: "content-expose-tab".into(),
            scroll: "content-expose-scroll".into(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExposeConfig {
    /// Storage key names.
    pub keys: StorageKeys,
    /// Reserved id of the panel's root element.
    pub panel_id: String,
    /// Bounds used when none are stored.
    pub default_bounds: Bounds,
    /// Smallest size a resize may produce.
    pub min_size: MinSize,
    /// Auto-reopen delay after a reload.
    #[serde(with = "millis")]
    pub settle_delay: Duration,
    /// Status message lifetime.
    #[serde(with = "millis")]
    pub status_ttl: Duration,
    /// Override visibility policy.
    pub visibility: OverrideVisibility,
}

impl Default for ExposeConfig {
    fn default() -> Self {
        Self {
            keys: StorageKeys::default(),
            panel_id: DEFAULT_PANEL_ID.into(),
            default_bounds: Bounds::default(),
            min_size: MinSize::default(),
            settle_delay: DEFAULT_SETTLE_DELAY,
            status_ttl: DEFAULT_STATUS_TTL,
            visibility: OverrideVisibility::default(),
        }
    }
}

impl ExposeConfig {
    /// Parse a (possibly partial) JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Builder-style policy override.
    #[must_use]
    pub fn with_visibility(mut self, visibility: OverrideVisibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Builder-style minimum size override.
    #[must_use]
    pub fn with_min_size(mut self, min_size: MinSize) -> Self {
        self.min_size = min_size;
        self
    }
}

/// Durations as integer milliseconds.
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_constants() {
        let config = ExposeConfig::default();
        assert_eq!(config.panel_id, "content-expose-devtools");
        assert_eq!(config.settle_delay, Duration::from_millis(500));
        assert_eq!(config.status_ttl, Duration::from_secs(3));
        assert_eq!(config.min_size, MinSize::new(250, 200));
        assert_eq!(config.keys.content, "content-expose-preview");
        assert_eq!(config.visibility, OverrideVisibility::Immediate);
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let config = ExposeConfig::from_json_str(
            r#"{"visibility":"after_panel_opened","settle_delay":750,"keys":{"tab":"t"}}"#,
        )
        .unwrap();
        assert_eq!(config.visibility, OverrideVisibility::AfterPanelOpened);
        assert_eq!(config.settle_delay, Duration::from_millis(750));
        assert_eq!(config.keys.tab, "t");
        assert_eq!(config.keys.open, "content-expose-open");
        assert_eq!(config.status_ttl, DEFAULT_STATUS_TTL);
    }

    #[test]
    fn empty_json_is_default() {
        assert_eq!(ExposeConfig::from_json_str("{}").unwrap(), ExposeConfig::default());
    }

    #[test]
    fn unknown_policy_is_rejected() {
        assert!(ExposeConfig::from_json_str(r#"{"visibility":"sometimes"}"#).is_err());
    }
}
