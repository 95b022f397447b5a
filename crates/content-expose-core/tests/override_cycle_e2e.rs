//! Override Cycle E2E Tests
//!
//! Drives the full edit, preview, reload, and reset cycle through
//! [`ExposeContext`] with a fake document host. A page reload is modelled by
//! building a fresh context over the same storage backend.
//!
//! # Invariants
//!
//! 1. **Merge**: a committed override is `{...raw, ...edited tabs}`.
//! 2. **Atomic commit**: one invalid tab means nothing is written.
//! 3. **Reset**: after reset the next load reads the raw tree again.
//! 4. **Export**: the copied JSON reflects unsaved buffers.

use std::sync::Arc;
use std::time::Duration;

use content_expose_core::{
    CommitOutcome, Content, ExposeConfig, ExposeContext, MemoryStorage, OverrideStore,
    PanelEffect, PanelHost, PanelSession, StatusKind, StorageBackend,
};
use pretty_assertions::assert_eq;
use serde_json::json;

// ============================================================================
// Test Utilities
// ============================================================================

#[derive(Default)]
struct DocumentHost {
    attached: bool,
    reloads: usize,
    refreshes: usize,
}

impl PanelHost for DocumentHost {
    fn panel_attached(&self) -> bool {
        self.attached
    }
    fn attach_panel(&mut self, _session: &PanelSession) {
        self.attached = true;
    }
    fn detach_panel(&mut self) {
        self.attached = false;
    }
    fn reload(&mut self) {
        self.reloads += 1;
        // A reload throws the document away.
        self.attached = false;
    }
    fn refresh_panel(&mut self, _session: &PanelSession) {
        self.refreshes += 1;
    }
}

fn raw() -> Content {
    json!({
        "hero": {"title": "Welcome", "cta": "Start"},
        "footer": {"copyright": "2024"},
        "pricing": [10, 20]
    })
    .as_object()
    .cloned()
    .unwrap()
}

fn load_page(backend: &Arc<MemoryStorage>) -> ExposeContext {
    let backend: Arc<dyn StorageBackend> = backend.clone();
    ExposeContext::create(ExposeConfig::default(), backend)
}

fn open_panel(ctx: &mut ExposeContext, host: &mut DocumentHost) {
    let t = ctx.controller_mut().toggle(host).unwrap();
    let PanelEffect::BeginConstruction { ticket } = t.effect else {
        panic!("expected construction, got {t:?}");
    };
    ctx.controller_mut().finish_open(ticket, host).unwrap();
}

// ============================================================================
// 1. Commit and reload
// ============================================================================

#[test]
fn commit_then_reload_resolves_override() {
    let backend = Arc::new(MemoryStorage::new());
    let mut host = DocumentHost::default();

    let mut ctx = load_page(&backend);
    let content = ctx.initialize(raw(), Duration::ZERO);
    content.get("hero").unwrap();

    open_panel(&mut ctx, &mut host);
    let session = ctx.controller().session().unwrap();
    assert_eq!(session.tabs().keys().collect::<Vec<_>>(), vec!["hero"]);
    assert!(!session.has_override());

    let c = ctx.controller_mut();
    c.edit_tab("hero", r#"{"title": "Hello"}"#).unwrap();
    assert_eq!(
        c.commit(&mut host, Duration::from_secs(1)).unwrap(),
        CommitOutcome::Committed
    );
    assert_eq!(host.reloads, 1);

    // Next page load.
    let mut ctx = load_page(&backend);
    let content = ctx.initialize(raw(), Duration::from_secs(2));
    assert_eq!(content.get("hero").unwrap(), Some(json!({"title": "Hello"})));
    assert_eq!(
        content.get("footer").unwrap(),
        Some(json!({"copyright": "2024"}))
    );
    assert_eq!(content.get("pricing").unwrap(), Some(json!([10, 20])));
}

#[test]
fn panel_reopens_after_commit_reload() {
    let backend = Arc::new(MemoryStorage::new());
    let mut host = DocumentHost::default();

    let mut ctx = load_page(&backend);
    ctx.initialize(raw(), Duration::ZERO).get("pricing").unwrap();
    open_panel(&mut ctx, &mut host);
    ctx.controller_mut().set_scroll_offset(120).unwrap();
    ctx.controller_mut()
        .commit(&mut host, Duration::ZERO)
        .unwrap();

    let mut ctx = load_page(&backend);
    ctx.initialize(raw(), Duration::from_secs(10))
        .get("pricing")
        .unwrap();
    assert!(ctx.tick(&mut host, Duration::from_millis(10_400)).is_none());
    let t = ctx.tick(&mut host, Duration::from_millis(10_500)).unwrap();
    let PanelEffect::BeginConstruction { ticket } = t.effect else {
        panic!("expected construction, got {t:?}");
    };
    ctx.controller_mut().finish_open(ticket, &mut host).unwrap();

    let session = ctx.controller().session().unwrap();
    assert!(session.has_override());
    assert_eq!(session.scroll_offset(), 120);
    assert_eq!(session.tabs().active(), Some("pricing"));
}

// ============================================================================
// 2. Invalid tab
// ============================================================================

#[test]
fn invalid_tab_blocks_commit() {
    let backend = Arc::new(MemoryStorage::new());
    let mut host = DocumentHost::default();
    let mut ctx = load_page(&backend);
    let content = ctx.initialize(raw(), Duration::ZERO);
    content.get("hero").unwrap();
    content.get("footer").unwrap();
    open_panel(&mut ctx, &mut host);

    let before = backend.snapshot();
    let now = Duration::from_secs(5);
    let c = ctx.controller_mut();
    c.select_tab("footer", &mut host).unwrap();
    c.edit_tab("hero", "{bad").unwrap();
    c.edit_tab("footer", r#"{"copyright": "2025"}"#).unwrap();

    let CommitOutcome::Rejected(err) = c.commit(&mut host, now).unwrap() else {
        panic!("commit should be rejected");
    };
    assert_eq!(err.key, "hero");
    assert_eq!(host.reloads, 0);

    let mut after = backend.snapshot();
    // Only the active-tab key may change.
    after.remove("content-expose-tab");
    let mut before = before;
    before.remove("content-expose-tab");
    assert_eq!(before, after);

    let session = ctx.controller().session().unwrap();
    assert_eq!(session.tabs().active(), Some("hero"));
    let status = session.status(now).unwrap();
    assert_eq!(status.kind, StatusKind::Error);
    assert!(status.text.contains("hero"));
    assert!(host.refreshes > 0);
}

// ============================================================================
// 3. Reset
// ============================================================================

#[test]
fn reset_restores_raw_on_next_load() {
    let backend = Arc::new(MemoryStorage::new());
    let store = OverrideStore::new(backend.clone(), ExposeConfig::default().keys);
    let mut overridden = raw();
    overridden.insert("hero".into(), json!({"title": "Edited"}));
    store.commit(&overridden).unwrap();

    let mut host = DocumentHost::default();
    let mut ctx = load_page(&backend);
    let content = ctx.initialize(raw(), Duration::ZERO);
    assert_eq!(content.get("hero").unwrap(), Some(json!({"title": "Edited"})));

    open_panel(&mut ctx, &mut host);
    assert!(ctx.controller_mut().reset(&mut host).unwrap());
    assert_eq!(host.reloads, 1);

    let mut ctx = load_page(&backend);
    let content = ctx.initialize(raw(), Duration::ZERO);
    assert_eq!(content.get("hero").unwrap(), raw().get("hero").cloned());
}

#[test]
fn malformed_override_reads_raw_but_allows_reset() {
    let backend = Arc::new(MemoryStorage::with_entries([(
        "content-expose-preview",
        "{not json",
    )]));
    let mut host = DocumentHost::default();
    let mut ctx = load_page(&backend);
    let content = ctx.initialize(raw(), Duration::ZERO);
    assert_eq!(content.get("hero").unwrap(), raw().get("hero").cloned());

    open_panel(&mut ctx, &mut host);
    assert!(ctx.controller().session().unwrap().has_override());
    assert!(ctx.controller_mut().reset(&mut host).unwrap());
    assert!(backend.snapshot().get("content-expose-preview").is_none());
}

// ============================================================================
// 4. Export
// ============================================================================

#[test]
fn export_uses_unsaved_buffers() {
    let backend = Arc::new(MemoryStorage::new());
    let mut host = DocumentHost::default();
    let mut ctx = load_page(&backend);
    ctx.initialize(raw(), Duration::ZERO).get("pricing").unwrap();
    open_panel(&mut ctx, &mut host);

    let c = ctx.controller_mut();
    c.edit_tab("pricing", "[30]").unwrap();
    let text = c.export(&mut host, Duration::ZERO).unwrap();
    let exported: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(exported["pricing"], json!([30]));
    assert_eq!(exported["hero"]["title"], "Welcome");

    // Export never writes the override.
    assert!(backend.snapshot().get("content-expose-preview").is_none());
}
