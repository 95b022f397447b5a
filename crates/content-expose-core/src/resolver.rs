#![forbid(unsafe_code)]

//! Content resolution with read tracking.
//!
//! The host application hands its raw content tree to
//! [`ContentResolver::initialize`] and reads through a [`TrackedContent`]
//! accessor. Every accessor call resolves first: the persisted override
//! when one is visible under the [`OverrideVisibility`] policy, else the
//! raw tree. Value reads record their top-level key into the accessed-key
//! set, which decides which editor tabs the panel shows.
//!
//! # Invariants
//!
//! 1. Accessed keys are append-only for the lifetime of the resolver.
//! 2. Each distinct key is recorded once, in first-access order.
//! 3. `get`, `has`, `keys`, and `entries` all go through the same
//!    resolution step, so they never disagree with each other.
//! 4. Resolving before `initialize` fails with [`ExposeError::Uninitialized`].

use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::OverrideVisibility;
use crate::content::{Content, ContentValue};
use crate::error::{ExposeError, ExposeResult};
use crate::store::OverrideStore;

#[derive(Debug, Default)]
struct ResolverState {
    raw: Option<Arc<Content>>,
    /// First-access order; small enough that a linear scan beats hashing.
    accessed: Vec<String>,
    setup_done: bool,
    panel_opened: bool,
}

/// Resolves the active content tree and records which keys were read.
///
/// Cloning is cheap; clones share state, so the panel controller and the
/// host's accessor observe the same raw tree and accessed keys.
#[derive(Clone)]
pub struct ContentResolver {
    state: Arc<RwLock<ResolverState>>,
    store: OverrideStore,
    visibility: OverrideVisibility,
}

impl ContentResolver {
    /// Create an uninitialized resolver.
    #[must_use]
    pub fn new(store: OverrideStore, visibility: OverrideVisibility) -> Self {
        Self {
            state: Arc::new(RwLock::new(ResolverState::default())),
            store,
            visibility,
        }
    }

    // Poisoning only happens if a panic escaped while holding the lock; the
    // state is still structurally valid, so keep going with it.
    fn read_state(&self) -> RwLockReadGuard<'_, ResolverState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, ResolverState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store `raw` as the raw tree, replacing any earlier tree.
    ///
    /// Returns `true` only on the first call, so callers can run one-time
    /// setup (listener registration, auto-reopen) at most once.
    pub fn initialize(&self, raw: Content) -> bool {
        let mut state = self.write_state();
        state.raw = Some(Arc::new(raw));
        let first = !state.setup_done;
        state.setup_done = true;
        tracing::debug!(first, "content initialized");
        first
    }

    /// Whether `initialize` has been called.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.read_state().raw.is_some()
    }

    /// The raw tree supplied by the host.
    pub fn raw(&self) -> ExposeResult<Arc<Content>> {
        self.read_state().raw.clone().ok_or(ExposeError::Uninitialized)
    }

    /// Record that the panel has been opened in this load.
    ///
    /// Under [`OverrideVisibility::AfterPanelOpened`] this is what makes a
    /// stored override visible.
    pub fn mark_panel_opened(&self) {
        self.write_state().panel_opened = true;
    }

    /// Whether a stored override would currently be honored.
    #[must_use]
    pub fn override_visible(&self) -> bool {
        match self.visibility {
            OverrideVisibility::Immediate => true,
            OverrideVisibility::AfterPanelOpened => self.read_state().panel_opened,
        }
    }

    /// The configured visibility policy.
    #[must_use]
    pub const fn visibility(&self) -> OverrideVisibility {
        self.visibility
    }

    /// The tree readers currently see.
    pub fn resolve(&self) -> ExposeResult<Arc<Content>> {
        let raw = self.raw()?;
        if self.override_visible()
            && let Some(preview) = self.store.load()
        {
            return Ok(Arc::new(preview));
        }
        Ok(raw)
    }

    /// Record `key` unless already recorded or absent from the raw tree.
    ///
    /// Override-only keys are never recorded: accessed keys stay a subset of
    /// the raw tree's keys.
    fn record(&self, key: &str) {
        if self.read_state().accessed.iter().any(|k| k == key) {
            return;
        }
        let mut state = self.write_state();
        let in_raw = state.raw.as_ref().is_some_and(|raw| raw.contains_key(key));
        if !in_raw {
            tracing::trace!(key, "skipped override-only key");
            return;
        }
        // Re-check under the write lock.
        if !state.accessed.iter().any(|k| k == key) {
            tracing::trace!(key, "recorded accessed key");
            state.accessed.push(key.to_owned());
        }
    }

    /// Resolve and read one top-level value, recording the key if present.
    ///
    /// An absent key is `Ok(None)`, not an error.
    pub fn read(&self, key: &str) -> ExposeResult<Option<ContentValue>> {
        let active = self.resolve()?;
        let value = active.get(key).cloned();
        if value.is_some() {
            self.record(key);
        }
        Ok(value)
    }

    /// Snapshot of the accessed keys in first-access order.
    #[must_use]
    pub fn accessed_keys(&self) -> Vec<String> {
        self.read_state().accessed.clone()
    }

    /// Whether `key` has been read through this resolver.
    #[must_use]
    pub fn was_accessed(&self, key: &str) -> bool {
        self.read_state().accessed.iter().any(|k| k == key)
    }

    /// Accessor handed to consumers.
    #[must_use]
    pub fn tracked(&self) -> TrackedContent {
        TrackedContent {
            resolver: self.clone(),
        }
    }

    /// Store used for override lookups.
    #[must_use]
    pub fn store(&self) -> &OverrideStore {
        &self.store
    }
}

impl fmt::Debug for ContentResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read_state();
        f.debug_struct("ContentResolver")
            .field("initialized", &state.raw.is_some())
            .field("accessed", &state.accessed)
            .field("panel_opened", &state.panel_opened)
            .field("visibility", &self.visibility)
            .finish()
    }
}

/// Read-tracking view of the active content tree.
///
/// Behaves like indexing a plain tree, but each call resolves against
/// storage first and value reads count toward the accessed keys.
#[derive(Clone, Debug)]
pub struct TrackedContent {
    resolver: ContentResolver,
}

impl TrackedContent {
    /// Read one top-level value; records the key when present.
    pub fn get(&self, key: &str) -> ExposeResult<Option<ContentValue>> {
        self.resolver.read(key)
    }

    /// Existence check. Does not count as a read.
    pub fn has(&self, key: &str) -> ExposeResult<bool> {
        Ok(self.resolver.resolve()?.contains_key(key))
    }

    /// Top-level keys of the active tree. Does not count as a read.
    pub fn keys(&self) -> ExposeResult<Vec<String>> {
        Ok(self.resolver.resolve()?.keys().cloned().collect())
    }

    pub fn len(&self) -> ExposeResult<usize> {
        Ok(self.resolver.resolve()?.len())
    }

    pub fn is_empty(&self) -> ExposeResult<bool> {
        Ok(self.resolver.resolve()?.is_empty())
    }

    /// Every key/value pair of the active tree; reads (and records) all keys.
    pub fn entries(&self) -> ExposeResult<Vec<(String, ContentValue)>> {
        let active = self.resolver.resolve()?;
        let entries: Vec<_> = active
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (key, _) in &entries {
            self.resolver.record(key);
        }
        Ok(entries)
    }

    /// Resolver behind this accessor.
    #[must_use]
    pub fn resolver(&self) -> &ContentResolver {
        &self.resolver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageKeys;
    use crate::storage::{MemoryStorage, StorageBackend};
    use serde_json::json;

    fn content(value: serde_json::Value) -> Content {
        value.as_object().cloned().unwrap()
    }

    fn resolver(visibility: OverrideVisibility) -> (Arc<MemoryStorage>, ContentResolver) {
        let backend = Arc::new(MemoryStorage::new());
        let store = OverrideStore::new(backend.clone(), StorageKeys::default());
        (backend, ContentResolver::new(store, visibility))
    }

    #[test]
    fn uninitialized_resolve_fails() {
        let (_, r) = resolver(OverrideVisibility::Immediate);
        assert!(matches!(r.resolve(), Err(ExposeError::Uninitialized)));
        assert!(matches!(r.tracked().get("a"), Err(ExposeError::Uninitialized)));
        assert!(matches!(r.raw(), Err(ExposeError::Uninitialized)));
    }

    #[test]
    fn initialize_reports_first_call_only() {
        let (_, r) = resolver(OverrideVisibility::Immediate);
        assert!(r.initialize(content(json!({"a": 1}))));
        assert!(!r.initialize(content(json!({"a": 2}))));
        // The tree is still replaced.
        assert_eq!(r.read("a").unwrap(), Some(json!(2)));
    }

    #[test]
    fn raw_without_override() {
        let (_, r) = resolver(OverrideVisibility::Immediate);
        let raw = content(json!({"a": 1, "b": 2}));
        r.initialize(raw.clone());
        assert_eq!(*r.resolve().unwrap(), raw);
    }

    #[test]
    fn override_replaces_raw() {
        let (_, r) = resolver(OverrideVisibility::Immediate);
        r.initialize(content(json!({"a": 1, "b": 2})));
        r.store().commit(&content(json!({"a": 5, "b": 2}))).unwrap();
        assert_eq!(r.read("a").unwrap(), Some(json!(5)));
    }

    #[test]
    fn malformed_override_falls_back_to_raw() {
        let (backend, r) = resolver(OverrideVisibility::Immediate);
        r.initialize(content(json!({"a": 1})));
        backend.set("content-expose-preview", "{bad").unwrap();
        assert_eq!(r.read("a").unwrap(), Some(json!(1)));
    }

    #[test]
    fn deferred_policy_hides_override_until_panel_opened() {
        let (_, r) = resolver(OverrideVisibility::AfterPanelOpened);
        r.initialize(content(json!({"a": 1})));
        r.store().commit(&content(json!({"a": 9}))).unwrap();
        assert_eq!(r.read("a").unwrap(), Some(json!(1)));
        r.mark_panel_opened();
        assert_eq!(r.read("a").unwrap(), Some(json!(9)));
    }

    #[test]
    fn reads_record_each_key_once_in_order() {
        let (_, r) = resolver(OverrideVisibility::Immediate);
        r.initialize(content(json!({"a": 1, "b": 2, "c": 3})));
        let view = r.tracked();
        view.get("b").unwrap();
        view.get("a").unwrap();
        view.get("b").unwrap();
        view.get("missing").unwrap();
        assert_eq!(r.accessed_keys(), vec!["b", "a"]);
    }

    #[test]
    fn existence_and_listing_do_not_record() {
        let (_, r) = resolver(OverrideVisibility::Immediate);
        r.initialize(content(json!({"a": 1, "b": 2})));
        let view = r.tracked();
        assert!(view.has("a").unwrap());
        assert!(!view.has("z").unwrap());
        assert_eq!(view.keys().unwrap(), vec!["a", "b"]);
        assert_eq!(view.len().unwrap(), 2);
        assert!(r.accessed_keys().is_empty());
    }

    #[test]
    fn entries_record_all_keys() {
        let (_, r) = resolver(OverrideVisibility::Immediate);
        r.initialize(content(json!({"a": 1, "b": 2})));
        let entries = r.tracked().entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(r.accessed_keys(), vec!["a", "b"]);
    }

    #[test]
    fn accessor_agrees_with_override() {
        let (_, r) = resolver(OverrideVisibility::Immediate);
        r.initialize(content(json!({"a": 1})));
        r.store()
            .commit(&content(json!({"a": 1, "extra": true})))
            .unwrap();
        let view = r.tracked();
        assert!(view.has("extra").unwrap());
        assert_eq!(view.keys().unwrap(), vec!["a", "extra"]);
        assert_eq!(view.get("extra").unwrap(), Some(json!(true)));
    }

    #[test]
    fn override_only_key_is_not_recorded() {
        let (_, r) = resolver(OverrideVisibility::Immediate);
        r.initialize(content(json!({"a": 1, "gone": 2})));
        r.store()
            .commit(&content(json!({"a": 1, "gone": 5})))
            .unwrap();
        // Hot reload drops `gone` from the raw tree.
        r.initialize(content(json!({"a": 1})));
        let view = r.tracked();
        assert_eq!(view.get("gone").unwrap(), Some(json!(5)));
        assert!(r.accessed_keys().is_empty());

        view.entries().unwrap();
        assert_eq!(r.accessed_keys(), vec!["a"]);
    }

    #[test]
    fn accessed_keys_survive_reinitialize() {
        let (_, r) = resolver(OverrideVisibility::Immediate);
        r.initialize(content(json!({"a": 1})));
        r.read("a").unwrap();
        r.initialize(content(json!({"a": 2, "b": 3})));
        assert_eq!(r.accessed_keys(), vec!["a"]);
        assert!(r.was_accessed("a"));
        assert!(!r.was_accessed("b"));
    }
}
