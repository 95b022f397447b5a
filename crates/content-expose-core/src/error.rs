#![forbid(unsafe_code)]

//! Crate-level error type.

use std::fmt;

use crate::storage::StorageError;
use crate::tabs::TabValidationError;

/// Errors surfaced by content-expose operations.
///
/// Malformed override JSON is deliberately absent: a stored override that
/// fails to parse is treated as no override at all.
#[derive(Debug)]
pub enum ExposeError {
    /// Content was read before `initialize` supplied a raw tree.
    Uninitialized,
    /// The durable key/value store failed.
    Storage(StorageError),
    /// A tab buffer is not valid JSON.
    InvalidTab(TabValidationError),
    /// A value could not be serialized for storage or export.
    Serialization(String),
    /// A panel action was requested while no panel is open.
    NotOpen,
}

impl fmt::Display for ExposeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(
                f,
                "content-expose: content not initialized, call initialize() first"
            ),
            Self::Storage(e) => write!(f, "storage error: {e}"),
            Self::InvalidTab(e) => write!(f, "{e}"),
            Self::Serialization(msg) => write!(f, "serialization error: {msg}"),
            Self::NotOpen => write!(f, "panel is not open"),
        }
    }
}

impl std::error::Error for ExposeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(e) => Some(e),
            Self::InvalidTab(e) => Some(e),
            Self::Uninitialized | Self::Serialization(_) | Self::NotOpen => None,
        }
    }
}

impl From<StorageError> for ExposeError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<TabValidationError> for ExposeError {
    fn from(e: TabValidationError) -> Self {
        Self::InvalidTab(e)
    }
}

/// Result alias for content-expose operations.
pub type ExposeResult<T> = Result<T, ExposeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn uninitialized_message_names_initialize() {
        let msg = ExposeError::Uninitialized.to_string();
        assert!(msg.contains("initialize()"), "{msg}");
    }

    #[test]
    fn storage_error_is_source() {
        let err: ExposeError = StorageError::Unavailable("no window".into()).into();
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "storage error: storage unavailable: no window");
    }
}
