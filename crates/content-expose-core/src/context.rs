#![forbid(unsafe_code)]

//! One content-expose instance: resolver, store, and panel controller.
//!
//! Independent contexts share nothing but what their storage backends
//! share, so tests can run several side by side, and a page reload is
//! modelled by building a fresh context over the same backend.

use std::sync::Arc;
use std::time::Duration;

use crate::config::ExposeConfig;
use crate::content::Content;
use crate::error::ExposeResult;
use crate::keys::KeyInput;
use crate::panel::{KeyOutcome, PanelController, PanelHost, PanelTransition};
use crate::resolver::{ContentResolver, TrackedContent};
use crate::storage::StorageBackend;
use crate::store::OverrideStore;

/// Entry point for hosts.
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use content_expose_core::{ExposeConfig, ExposeContext, MemoryStorage};
/// use serde_json::json;
///
/// let mut ctx = ExposeContext::create(ExposeConfig::default(), Arc::new(MemoryStorage::new()));
/// let raw = json!({"hero": {"title": "Hi"}}).as_object().cloned().unwrap();
/// let content = ctx.initialize(raw, Duration::ZERO);
/// assert_eq!(content.get("hero").unwrap().unwrap()["title"], "Hi");
/// assert_eq!(ctx.resolver().accessed_keys(), vec!["hero".to_string()]);
/// ```
#[derive(Debug)]
pub struct ExposeContext {
    config: ExposeConfig,
    resolver: ContentResolver,
    controller: PanelController,
    listeners_installed: bool,
    listener_request: bool,
}

impl ExposeContext {
    /// Build a context over `backend`.
    #[must_use]
    pub fn create(config: ExposeConfig, backend: Arc<dyn StorageBackend>) -> Self {
        let store = OverrideStore::new(backend, config.keys.clone());
        let resolver = ContentResolver::new(store.clone(), config.visibility);
        let controller = PanelController::new(resolver.clone(), store, config.clone());
        tracing::debug!(
            backend = resolver.store().backend_name(),
            visibility = ?config.visibility,
            "content-expose context created"
        );
        Self {
            config,
            resolver,
            controller,
            listeners_installed: false,
            listener_request: false,
        }
    }

    /// Supply the raw tree and get the tracked accessor.
    ///
    /// The first call also marks the keyboard listener as installed, raises
    /// the one-shot request read by [`take_listener_request`](Self::take_listener_request),
    /// and schedules the auto-reopen when the panel was open before the
    /// reload. Later calls only replace the raw tree.
    pub fn initialize(&mut self, raw: Content, now: Duration) -> TrackedContent {
        if self.resolver.initialize(raw) {
            self.listeners_installed = true;
            self.listener_request = true;
            self.controller.schedule_auto_reopen(now);
        }
        self.resolver.tracked()
    }

    /// Tracked accessor; reads fail with `Uninitialized` until `initialize`.
    #[must_use]
    pub fn content(&self) -> TrackedContent {
        self.resolver.tracked()
    }

    /// Whether the host should have its keyboard listener attached.
    #[must_use]
    pub const fn listeners_installed(&self) -> bool {
        self.listeners_installed
    }

    /// `true` exactly once, after the first `initialize`: the host should
    /// attach its keydown listener now. Re-initialization never asks again.
    pub fn take_listener_request(&mut self) -> bool {
        std::mem::take(&mut self.listener_request)
    }

    /// Route a keydown event to the panel.
    pub fn handle_key(
        &mut self,
        input: &KeyInput,
        host: &mut dyn PanelHost,
    ) -> ExposeResult<KeyOutcome> {
        self.controller.handle_key(input, host)
    }

    /// Advance host time.
    pub fn tick(&mut self, host: &mut dyn PanelHost, now: Duration) -> Option<PanelTransition> {
        self.controller.tick(host, now)
    }

    #[must_use]
    pub const fn config(&self) -> &ExposeConfig {
        &self.config
    }

    #[must_use]
    pub const fn resolver(&self) -> &ContentResolver {
        &self.resolver
    }

    #[must_use]
    pub const fn controller(&self) -> &PanelController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut PanelController {
        &mut self.controller
    }

    /// Detach the panel and the keyboard listener; persisted state is kept.
    pub fn teardown(&mut self, host: &mut dyn PanelHost) {
        self.controller.teardown(host);
        self.listeners_installed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde_json::json;

    fn raw() -> Content {
        json!({"a": 1, "b": 2}).as_object().cloned().unwrap()
    }

    #[test]
    fn content_before_initialize_is_uninitialized() {
        let ctx = ExposeContext::create(ExposeConfig::default(), Arc::new(MemoryStorage::new()));
        assert!(matches!(
            ctx.content().get("a"),
            Err(crate::error::ExposeError::Uninitialized)
        ));
    }

    #[test]
    fn setup_runs_once() {
        let backend = Arc::new(MemoryStorage::new());
        let store = OverrideStore::new(backend.clone(), ExposeConfig::default().keys);
        store.set_open(true).unwrap();

        let mut ctx = ExposeContext::create(ExposeConfig::default(), backend);
        ctx.initialize(raw(), Duration::from_millis(100));
        assert!(ctx.listeners_installed());
        assert_eq!(ctx.controller().reopen_at(), Some(Duration::from_millis(600)));

        ctx.initialize(raw(), Duration::from_secs(9));
        assert_eq!(ctx.controller().reopen_at(), Some(Duration::from_millis(600)));
    }

    #[test]
    fn listener_requested_once_across_reinitialize() {
        let mut ctx = ExposeContext::create(ExposeConfig::default(), Arc::new(MemoryStorage::new()));
        assert!(!ctx.take_listener_request());
        ctx.initialize(raw(), Duration::ZERO);
        assert!(ctx.take_listener_request());
        assert!(!ctx.take_listener_request());

        // Hot reload re-initializes the same context.
        ctx.initialize(raw(), Duration::from_secs(1));
        assert!(!ctx.take_listener_request());
        assert!(ctx.listeners_installed());
    }

    #[test]
    fn contexts_are_independent() {
        let mut one = ExposeContext::create(ExposeConfig::default(), Arc::new(MemoryStorage::new()));
        let two = ExposeContext::create(ExposeConfig::default(), Arc::new(MemoryStorage::new()));
        one.initialize(raw(), Duration::ZERO).get("a").unwrap();
        assert_eq!(one.resolver().accessed_keys(), vec!["a".to_string()]);
        assert!(two.resolver().accessed_keys().is_empty());
        assert!(!two.resolver().is_initialized());
    }
}
