#![forbid(unsafe_code)]

//! Panel lifecycle state machine.
//!
//! ```text
//!            request_open                finish_open
//! Closed ───────────────────▶ Opening ───────────────────▶ Open
//!   ▲                            │                          │
//!   │        duplicate found     │                          │
//!   ├────────────────────────────┘                          │
//!   │                       close / toggle / Escape         │
//!   └───────────────────────────────────────────────────────┘
//! ```
//!
//! Panel construction is asynchronous on real hosts (the panel code loads
//! lazily), so opening is split in two: [`PanelController::request_open`]
//! hands out a ticket and [`PanelController::finish_open`] redeems it once
//! the host is ready. Any open request that arrives in between is ignored.
//!
//! Two sources say whether a panel exists: the in-process session and the
//! host's document (an element with the reserved panel id). After a
//! hot-reload either one can be stale, so every entry point first
//! reconciles them, and `finish_open` checks both again before attaching.
//!
//! Time is host-driven: the auto-reopen delay and status expiry advance
//! only through [`PanelController::tick`].

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{ExposeConfig, OverrideVisibility};
use crate::content::pretty_content;
use crate::error::{ExposeError, ExposeResult};
use crate::geometry::{Bounds, GestureKind, GestureTracker, ListenerCommand, PointerPosition};
use crate::keys::{KeyInput, PanelCommand};
use crate::resolver::ContentResolver;
use crate::status::{StatusLine, StatusMessage};
use crate::store::OverrideStore;
use crate::tabs::{TabEditor, TabValidationError};

/// Identity of one attached panel within this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PanelHandle(pub u64);

/// The document side of the panel.
///
/// Web hosts back this with the DOM; tests back it with a flag.
pub trait PanelHost {
    /// Whether an element with the reserved panel id is in the document.
    fn panel_attached(&self) -> bool;

    /// Build and attach the panel element for `session`.
    fn attach_panel(&mut self, session: &PanelSession);

    /// Remove the panel element, whoever attached it.
    fn detach_panel(&mut self);

    /// Reload the page so the host application re-reads its content.
    fn reload(&mut self);

    /// Re-render after the session changed (active tab, status, bounds).
    fn refresh_panel(&mut self, _session: &PanelSession) {}

    /// Install or remove the document-level pointer listeners of a gesture.
    fn pointer_listeners(&mut self, _command: ListenerCommand) {}
}

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PanelState {
    Closed,
    Opening { ticket: u64 },
    Open,
}

/// Why a request did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelNoopReason {
    AlreadyOpening,
    AlreadyAttached,
    StaleTicket,
    NotOpen,
}

/// What one lifecycle step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum PanelEffect {
    /// The host should construct the panel and then call `finish_open`.
    BeginConstruction { ticket: u64 },
    /// Panel attached.
    Attached { handle: PanelHandle },
    /// Another panel appeared while constructing; this one was dropped.
    ConstructionAbandoned { ticket: u64 },
    /// Panel removed; `reload` is set when a reload was requested.
    Detached { reload: bool },
    Noop { reason: PanelNoopReason },
}

/// One state-machine step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelTransition {
    pub transition_id: u64,
    pub from: PanelState,
    pub to: PanelState,
    pub effect: PanelEffect,
}

impl PanelTransition {
    /// Whether the step was a no-op.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        matches!(self.effect, PanelEffect::Noop { .. })
    }
}

/// Response to a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyOutcome {
    /// The host must call `preventDefault` on the key event.
    pub prevent_default: bool,
    pub transition: Option<PanelTransition>,
}

impl KeyOutcome {
    const IGNORED: Self = Self {
        prevent_default: false,
        transition: None,
    };
}

/// Result of the "Preview" action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Override stored and reload requested.
    Committed,
    /// A tab failed to parse; nothing was stored.
    Rejected(TabValidationError),
}

/// State of the open panel.
#[derive(Debug, Clone)]
pub struct PanelSession {
    handle: PanelHandle,
    tabs: TabEditor,
    bounds: Bounds,
    gesture: GestureTracker,
    status: StatusLine,
    scroll_offset: u32,
    has_override: bool,
}

impl PanelSession {
    #[must_use]
    pub const fn handle(&self) -> PanelHandle {
        self.handle
    }

    #[must_use]
    pub const fn tabs(&self) -> &TabEditor {
        &self.tabs
    }

    #[must_use]
    pub const fn bounds(&self) -> Bounds {
        self.bounds
    }

    #[must_use]
    pub const fn scroll_offset(&self) -> u32 {
        self.scroll_offset
    }

    /// Whether an override was stored when the panel opened.
    #[must_use]
    pub const fn has_override(&self) -> bool {
        self.has_override
    }

    /// Status message visible at `now`.
    #[must_use]
    pub fn status(&self, now: Duration) -> Option<&StatusMessage> {
        self.status.visible(now)
    }

    #[must_use]
    pub const fn gesture_active(&self) -> bool {
        self.gesture.is_active()
    }
}

/// Owns the panel lifecycle and the panel's actions.
pub struct PanelController {
    resolver: ContentResolver,
    store: OverrideStore,
    config: ExposeConfig,
    state: PanelState,
    session: Option<PanelSession>,
    reopen_at: Option<Duration>,
    next_ticket: u64,
    next_handle: u64,
    transition_counter: u64,
}

impl PanelController {
    #[must_use]
    pub fn new(resolver: ContentResolver, store: OverrideStore, config: ExposeConfig) -> Self {
        Self {
            resolver,
            store,
            config,
            state: PanelState::Closed,
            session: None,
            reopen_at: None,
            next_ticket: 1,
            next_handle: 1,
            transition_counter: 0,
        }
    }

    #[must_use]
    pub const fn state(&self) -> PanelState {
        self.state
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self.state, PanelState::Open)
    }

    #[must_use]
    pub const fn session(&self) -> Option<&PanelSession> {
        self.session.as_ref()
    }

    /// Pending auto-reopen deadline.
    #[must_use]
    pub const fn reopen_at(&self) -> Option<Duration> {
        self.reopen_at
    }

    fn transition(&mut self, from: PanelState, effect: PanelEffect) -> PanelTransition {
        self.transition_counter = self.transition_counter.saturating_add(1);
        let transition = PanelTransition {
            transition_id: self.transition_counter,
            from,
            to: self.state,
            effect,
        };
        tracing::debug!(
            id = transition.transition_id,
            from = ?transition.from,
            to = ?transition.to,
            effect = ?transition.effect,
            "panel transition"
        );
        transition
    }

    fn noop(&mut self, reason: PanelNoopReason) -> PanelTransition {
        let state = self.state;
        self.transition(state, PanelEffect::Noop { reason })
    }

    /// Drop an in-process session whose element is gone from the document.
    fn reconcile(&mut self, host: &dyn PanelHost) {
        if self.session.is_some() && !host.panel_attached() {
            tracing::warn!("panel handle is stale (element missing), clearing it");
            self.session = None;
            if self.is_open() {
                self.state = PanelState::Closed;
            }
            if let Err(e) = self.store.set_open(false) {
                tracing::warn!(error = %e, "failed to persist closed state for stale panel");
            }
        }
    }

    fn panel_exists(&self, host: &dyn PanelHost) -> bool {
        self.session.is_some() || host.panel_attached()
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    /// Start opening the panel.
    ///
    /// Ignored while another open is in flight or a panel already exists,
    /// either in-process or in the document.
    pub fn request_open(&mut self, host: &dyn PanelHost) -> PanelTransition {
        self.reconcile(host);
        if matches!(self.state, PanelState::Opening { .. }) {
            return self.noop(PanelNoopReason::AlreadyOpening);
        }
        if self.panel_exists(host) {
            tracing::warn!("panel already attached, ignoring open request");
            return self.noop(PanelNoopReason::AlreadyAttached);
        }
        let from = self.state;
        let ticket = self.next_ticket;
        self.next_ticket = self.next_ticket.saturating_add(1);
        self.state = PanelState::Opening { ticket };
        self.transition(from, PanelEffect::BeginConstruction { ticket })
    }

    /// Complete the open started by `request_open` with `ticket`.
    pub fn finish_open(
        &mut self,
        ticket: u64,
        host: &mut dyn PanelHost,
    ) -> ExposeResult<PanelTransition> {
        let from = self.state;
        if from != (PanelState::Opening { ticket }) {
            return Ok(self.noop(PanelNoopReason::StaleTicket));
        }
        if self.panel_exists(host) {
            self.state = PanelState::Closed;
            return Ok(self.transition(from, PanelEffect::ConstructionAbandoned { ticket }));
        }

        let session = match self.build_session() {
            Ok(session) => session,
            Err(e) => {
                self.state = PanelState::Closed;
                return Err(e);
            }
        };
        let handle = session.handle;
        host.attach_panel(&session);
        self.session = Some(session);
        self.state = PanelState::Open;
        self.store.set_open(true)?;
        Ok(self.transition(from, PanelEffect::Attached { handle }))
    }

    fn build_session(&mut self) -> ExposeResult<PanelSession> {
        self.resolver.mark_panel_opened();
        let active = self.resolver.resolve()?;
        let keys = self.resolver.accessed_keys();

        let mut tabs = TabEditor::new();
        let stored_tab = self.store.active_tab();
        tabs.load(&keys, &active, stored_tab.as_deref());
        if let Some(tab) = tabs.active()
            && stored_tab.as_deref() != Some(tab)
        {
            self.store.set_active_tab(tab)?;
        }

        let handle = PanelHandle(self.next_handle);
        self.next_handle = self.next_handle.saturating_add(1);
        Ok(PanelSession {
            handle,
            tabs,
            bounds: self
                .store
                .bounds(self.config.default_bounds, self.config.min_size),
            gesture: GestureTracker::new(),
            status: StatusLine::new(self.config.status_ttl),
            scroll_offset: self.store.scroll_offset(),
            has_override: self.store.has_override(),
        })
    }

    /// Close the panel and remember that it is closed.
    ///
    /// Also removes a panel element this controller did not attach. Under
    /// [`OverrideVisibility::AfterPanelOpened`] a pending override triggers
    /// a reload so the page goes back to raw content.
    pub fn close(&mut self, host: &mut dyn PanelHost) -> ExposeResult<PanelTransition> {
        let from = self.state;
        let had_session = self.session.is_some();
        let attached = host.panel_attached();
        if !had_session && !attached && !matches!(from, PanelState::Opening { .. }) {
            return Ok(self.noop(PanelNoopReason::NotOpen));
        }

        if let Some(session) = self.session.take()
            && session.gesture.is_active()
        {
            host.pointer_listeners(ListenerCommand::Remove);
        }
        if attached {
            host.detach_panel();
        }
        self.state = PanelState::Closed;
        self.store.set_open(false)?;

        let reload = self.config.visibility == OverrideVisibility::AfterPanelOpened
            && self.store.has_override();
        if reload {
            host.reload();
        }
        Ok(self.transition(from, PanelEffect::Detached { reload }))
    }

    /// Close if a panel exists, otherwise start opening one.
    pub fn toggle(&mut self, host: &mut dyn PanelHost) -> ExposeResult<PanelTransition> {
        self.reconcile(host);
        if self.panel_exists(host) {
            self.close(host)
        } else {
            Ok(self.request_open(host))
        }
    }

    /// Schedule an automatic reopen if the panel was open before the reload.
    pub fn schedule_auto_reopen(&mut self, now: Duration) -> bool {
        if !self.store.is_open() {
            return false;
        }
        let at = now.saturating_add(self.config.settle_delay);
        tracing::debug!(at_ms = at.as_millis() as u64, "scheduled panel auto-reopen");
        self.reopen_at = Some(at);
        true
    }

    /// Advance host time: expire status messages and fire a due auto-reopen.
    pub fn tick(&mut self, host: &mut dyn PanelHost, now: Duration) -> Option<PanelTransition> {
        if let Some(session) = self.session.as_mut()
            && session.status.expire(now)
        {
            host.refresh_panel(session);
        }
        match self.reopen_at {
            Some(at) if now >= at => {
                self.reopen_at = None;
                Some(self.request_open(host))
            }
            _ => None,
        }
    }

    /// Route a key press: `Ctrl/Cmd+E` toggles, `Escape` closes an open panel.
    pub fn handle_key(
        &mut self,
        input: &KeyInput,
        host: &mut dyn PanelHost,
    ) -> ExposeResult<KeyOutcome> {
        match PanelCommand::from_key(input) {
            Some(PanelCommand::Toggle) => Ok(KeyOutcome {
                prevent_default: true,
                transition: Some(self.toggle(host)?),
            }),
            Some(PanelCommand::Close) if self.is_open() => Ok(KeyOutcome {
                prevent_default: true,
                transition: Some(self.close(host)?),
            }),
            _ => Ok(KeyOutcome::IGNORED),
        }
    }

    /// Detach without touching persisted state and cancel the scheduled reopen.
    pub fn teardown(&mut self, host: &mut dyn PanelHost) {
        if let Some(session) = self.session.take()
            && session.gesture.is_active()
        {
            host.pointer_listeners(ListenerCommand::Remove);
        }
        if host.panel_attached() {
            host.detach_panel();
        }
        self.state = PanelState::Closed;
        self.reopen_at = None;
    }

    // ── Session actions ─────────────────────────────────────────────────

    fn session_mut(&mut self) -> ExposeResult<&mut PanelSession> {
        self.session.as_mut().ok_or(ExposeError::NotOpen)
    }

    /// Switch tabs and remember the choice.
    pub fn select_tab(&mut self, key: &str, host: &mut dyn PanelHost) -> ExposeResult<bool> {
        let session = self.session.as_mut().ok_or(ExposeError::NotOpen)?;
        if !session.tabs.set_active(key) {
            return Ok(false);
        }
        self.store.set_active_tab(key)?;
        host.refresh_panel(session);
        Ok(true)
    }

    /// Replace a tab's text. No validation happens here.
    pub fn edit_tab(&mut self, key: &str, text: impl Into<String>) -> ExposeResult<bool> {
        Ok(self.session_mut()?.tabs.edit(key, text))
    }

    /// Record the editor's scroll position; persisted on commit and reset.
    pub fn set_scroll_offset(&mut self, offset: u32) -> ExposeResult<()> {
        self.session_mut()?.scroll_offset = offset;
        Ok(())
    }

    /// Start a move or resize gesture. `false` if one is already running.
    pub fn pointer_down(
        &mut self,
        kind: GestureKind,
        position: PointerPosition,
        host: &mut dyn PanelHost,
    ) -> ExposeResult<bool> {
        let session = self.session.as_mut().ok_or(ExposeError::NotOpen)?;
        let bounds = session.bounds;
        match session.gesture.pointer_down(kind, position, bounds) {
            Some(update) => {
                if let Some(command) = update.listeners {
                    host.pointer_listeners(command);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Recompute bounds for a pointer move during a gesture.
    pub fn pointer_move(
        &mut self,
        position: PointerPosition,
        host: &mut dyn PanelHost,
    ) -> ExposeResult<Option<Bounds>> {
        let min = self.config.min_size;
        let session = self.session.as_mut().ok_or(ExposeError::NotOpen)?;
        let Some(update) = session.gesture.pointer_move(position, min) else {
            return Ok(None);
        };
        session.bounds = update.bounds;
        host.refresh_panel(session);
        Ok(Some(update.bounds))
    }

    /// Finish a gesture: remove listeners and persist the final bounds.
    ///
    /// Without an open panel there is nothing to update, but a host that
    /// still forwards the pointer-up gets `Ok(None)` rather than an error.
    pub fn pointer_up(
        &mut self,
        position: PointerPosition,
        host: &mut dyn PanelHost,
    ) -> ExposeResult<Option<Bounds>> {
        let min = self.config.min_size;
        let Some(session) = self.session.as_mut() else {
            return Ok(None);
        };
        let Some(update) = session.gesture.pointer_up(position, min) else {
            return Ok(None);
        };
        if let Some(command) = update.listeners {
            host.pointer_listeners(command);
        }
        session.bounds = update.bounds;
        host.refresh_panel(session);
        self.store.set_bounds(update.bounds)?;
        Ok(Some(update.bounds))
    }

    /// "Preview": validate every tab, store `{...raw, ...tabs}`, reload.
    ///
    /// A tab that fails to parse aborts the whole commit: storage is left
    /// alone, the failing tab becomes active, and an error status names it.
    pub fn commit(&mut self, host: &mut dyn PanelHost, now: Duration) -> ExposeResult<CommitOutcome> {
        let raw = self.resolver.raw()?;
        let session = self.session.as_mut().ok_or(ExposeError::NotOpen)?;
        match session.tabs.merged_with(&raw) {
            Err(e) => {
                tracing::debug!(key = %e.key, error = %e.message, "commit rejected");
                session.tabs.set_active(&e.key);
                session
                    .status
                    .error(format!("Invalid JSON in \"{}\" tab", e.key), now);
                host.refresh_panel(session);
                self.store.set_active_tab(&e.key)?;
                Ok(CommitOutcome::Rejected(e))
            }
            Ok(merged) => {
                let scroll = session.scroll_offset;
                self.store.commit(&merged)?;
                self.store.set_scroll_offset(scroll)?;
                host.reload();
                Ok(CommitOutcome::Committed)
            }
        }
    }

    /// Delete the override and reload. `false` when there is none.
    pub fn reset(&mut self, host: &mut dyn PanelHost) -> ExposeResult<bool> {
        let scroll = self.session_mut()?.scroll_offset;
        if !self.store.has_override() {
            return Ok(false);
        }
        self.store.reset()?;
        self.store.set_scroll_offset(scroll)?;
        host.reload();
        Ok(true)
    }

    /// JSON text for the clipboard: current (possibly unsaved) buffers over raw.
    ///
    /// An unparseable tab is reported as a failed copy.
    pub fn export(&mut self, host: &mut dyn PanelHost, now: Duration) -> ExposeResult<String> {
        let raw = self.resolver.raw()?;
        let session = self.session.as_mut().ok_or(ExposeError::NotOpen)?;
        match session.tabs.merged_with(&raw) {
            Ok(merged) => Ok(pretty_content(&merged)),
            Err(e) => {
                session.status.error("Failed to copy", now);
                host.refresh_panel(session);
                Err(ExposeError::InvalidTab(e))
            }
        }
    }

    /// Report the clipboard write started after [`export`](Self::export).
    pub fn finish_export(
        &mut self,
        result: Result<(), String>,
        host: &mut dyn PanelHost,
        now: Duration,
    ) -> ExposeResult<()> {
        let session = self.session.as_mut().ok_or(ExposeError::NotOpen)?;
        match result {
            Ok(()) => session.status.success("Copied!", now),
            Err(e) => {
                tracing::debug!(error = %e, "clipboard write failed");
                session.status.error("Failed to copy", now);
            }
        }
        host.refresh_panel(session);
        Ok(())
    }
}

impl fmt::Debug for PanelController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanelController")
            .field("state", &self.state)
            .field("session", &self.session.as_ref().map(|s| s.handle))
            .field("reopen_at", &self.reopen_at)
            .finish()
    }
}
