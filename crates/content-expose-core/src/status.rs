#![forbid(unsafe_code)]

//! Transient status messages with automatic dismissal.
//!
//! Time is supplied by the host as a monotonic `Duration`; nothing here
//! sleeps or schedules. A message shown at `now` is visible while
//! `now < shown_at + ttl` and is dropped by the first [`StatusLine::expire`]
//! at or after its deadline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Message severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Success,
    Error,
}

/// One visible message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub text: String,
    #[serde(skip)]
    expires_at: Duration,
}

impl StatusMessage {
    /// Monotonic time at which the message disappears.
    #[must_use]
    pub const fn expires_at(&self) -> Duration {
        self.expires_at
    }
}

/// Holds at most one message; a new message replaces the old one.
#[derive(Debug, Clone)]
pub struct StatusLine {
    ttl: Duration,
    current: Option<StatusMessage>,
}

impl StatusLine {
    #[must_use]
    pub const fn new(ttl: Duration) -> Self {
        Self { ttl, current: None }
    }

    /// Show `text` from `now` until `now + ttl`.
    pub fn show(&mut self, kind: StatusKind, text: impl Into<String>, now: Duration) {
        self.current = Some(StatusMessage {
            kind,
            text: text.into(),
            expires_at: now.saturating_add(self.ttl),
        });
    }

    pub fn success(&mut self, text: impl Into<String>, now: Duration) {
        self.show(StatusKind::Success, text, now);
    }

    pub fn error(&mut self, text: impl Into<String>, now: Duration) {
        self.show(StatusKind::Error, text, now);
    }

    /// Drop the message if its deadline has passed. Returns `true` if one was dropped.
    pub fn expire(&mut self, now: Duration) -> bool {
        if self.current.as_ref().is_some_and(|m| now >= m.expires_at) {
            self.current = None;
            return true;
        }
        false
    }

    /// The message visible at `now`, if any.
    #[must_use]
    pub fn visible(&self, now: Duration) -> Option<&StatusMessage> {
        self.current.as_ref().filter(|m| now < m.expires_at)
    }

    /// The held message regardless of time.
    #[must_use]
    pub fn current(&self) -> Option<&StatusMessage> {
        self.current.as_ref()
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(3);

    #[test]
    fn message_expires_after_ttl() {
        let mut line = StatusLine::new(TTL);
        let t0 = Duration::from_millis(1_000);
        line.error("Invalid JSON in \"a\" tab", t0);
        assert!(line.visible(t0).is_some());
        assert!(line.visible(t0 + Duration::from_millis(2_999)).is_some());
        assert!(line.visible(t0 + TTL).is_none());

        assert!(!line.expire(t0 + Duration::from_millis(2_999)));
        assert!(line.expire(t0 + TTL));
        assert!(line.current().is_none());
    }

    #[test]
    fn newer_message_replaces_and_restarts_timer() {
        let mut line = StatusLine::new(TTL);
        line.error("first", Duration::ZERO);
        line.success("Copied!", Duration::from_secs(2));
        let msg = line.visible(Duration::from_secs(4)).unwrap();
        assert_eq!(msg.kind, StatusKind::Success);
        assert_eq!(msg.text, "Copied!");
        assert_eq!(msg.expires_at(), Duration::from_secs(5));
    }
}
