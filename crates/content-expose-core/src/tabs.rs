#![forbid(unsafe_code)]

//! Per-key JSON edit buffers.
//!
//! One text buffer per accessed top-level key. Edits are never validated
//! while typing; [`TabEditor::validate_all`] parses every buffer at commit
//! time, in load order, and stops at the first failure.

use std::fmt;

use crate::content::{Content, ContentValue, merge_over, pretty};

/// A tab buffer that failed to parse as JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabValidationError {
    /// The offending tab's key.
    pub key: String,
    /// Parser message, including line and column.
    pub message: String,
}

impl fmt::Display for TabValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid JSON in \"{}\" tab: {}", self.key, self.message)
    }
}

impl std::error::Error for TabValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TabBuffer {
    key: String,
    text: String,
}

/// Edit buffers plus the active tab.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabEditor {
    tabs: Vec<TabBuffer>,
    active: Option<String>,
}

impl TabEditor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all buffers with one per key, pretty-printed from `content`.
    ///
    /// The active tab becomes `preferred` when it is one of `keys`, else the
    /// first key. Duplicate keys are loaded once.
    pub fn load<S: AsRef<str>>(&mut self, keys: &[S], content: &Content, preferred: Option<&str>) {
        self.tabs.clear();
        for key in keys {
            let key = key.as_ref();
            if self.position(key).is_some() {
                continue;
            }
            self.tabs.push(TabBuffer {
                key: key.to_owned(),
                text: pretty(content.get(key)),
            });
        }
        self.active = preferred
            .filter(|p| self.position(p).is_some())
            .map(str::to_owned)
            .or_else(|| self.tabs.first().map(|t| t.key.clone()));
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.tabs.iter().position(|t| t.key == key)
    }

    /// Tab keys in load order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.tabs.iter().map(|t| t.key.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    #[must_use]
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Current text of the active buffer.
    #[must_use]
    pub fn active_text(&self) -> Option<&str> {
        self.active.as_deref().and_then(|key| self.text(key))
    }

    #[must_use]
    pub fn text(&self, key: &str) -> Option<&str> {
        self.position(key).map(|i| self.tabs[i].text.as_str())
    }

    /// Make `key` active. Returns `false` (no change) for unknown keys.
    pub fn set_active(&mut self, key: &str) -> bool {
        if self.position(key).is_none() {
            return false;
        }
        self.active = Some(key.to_owned());
        true
    }

    /// Replace the text of `key`. Returns `false` (no change) for unknown keys.
    pub fn edit(&mut self, key: &str, text: impl Into<String>) -> bool {
        match self.position(key) {
            Some(i) => {
                self.tabs[i].text = text.into();
                true
            }
            None => false,
        }
    }

    /// Parse every buffer, in load order, stopping at the first failure.
    pub fn validate_all(&self) -> Result<Vec<(String, ContentValue)>, TabValidationError> {
        self.tabs
            .iter()
            .map(|tab| {
                serde_json::from_str::<ContentValue>(&tab.text)
                    .map(|value| (tab.key.clone(), value))
                    .map_err(|e| TabValidationError {
                        key: tab.key.clone(),
                        message: e.to_string(),
                    })
            })
            .collect()
    }

    /// `{...base, ...parsed buffers}`.
    pub fn merged_with(&self, base: &Content) -> Result<Content, TabValidationError> {
        Ok(merge_over(base, self.validate_all()?))
    }
}
