#![forbid(unsafe_code)]

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use content_expose_core::content::parse_content;
use content_expose_core::{
    ExposeConfig, ExposeContext, GestureKind, ListenerCommand, PanelHost, PanelSession,
    PanelTransition, PointerPosition, StorageBackend, StorageError, StorageResult,
};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Document, KeyboardEvent};

use crate::key_input;
use crate::view::{PanelView, bounds_style, parse_direction};

fn js_message(value: &JsValue) -> String {
    value
        .as_string()
        .unwrap_or_else(|| format!("{value:?}"))
}

fn js_err(e: impl fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Milliseconds since the epoch as a monotonic-enough host clock.
fn now() -> Duration {
    Duration::from_millis(js_sys::Date::now().max(0.0) as u64)
}

fn document() -> Option<Document> {
    web_sys::window().and_then(|w| w.document())
}

// ─────────────────────────────────────────────────────────────────────────────
// localStorage backend
// ─────────────────────────────────────────────────────────────────────────────

/// `window.localStorage`, looked up on every call.
///
/// Holding no JS handles keeps the type `Send + Sync`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStorage;

impl LocalStorage {
    fn storage() -> StorageResult<web_sys::Storage> {
        let window =
            web_sys::window().ok_or_else(|| StorageError::Unavailable("no window".into()))?;
        window
            .local_storage()
            .map_err(|e| StorageError::Unavailable(js_message(&e)))?
            .ok_or_else(|| StorageError::Unavailable("localStorage disabled".into()))
    }
}

impl StorageBackend for LocalStorage {
    fn name(&self) -> &str {
        "LocalStorage"
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Self::storage()?
            .get_item(key)
            .map_err(|e| StorageError::Unavailable(js_message(&e)))
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        // Quota errors surface here.
        Self::storage()?
            .set_item(key, value)
            .map_err(|e| StorageError::Unavailable(js_message(&e)))
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        Self::storage()?
            .remove_item(key)
            .map_err(|e| StorageError::Unavailable(js_message(&e)))
    }

    fn is_available(&self) -> bool {
        Self::storage().is_ok()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// DOM panel host
// ─────────────────────────────────────────────────────────────────────────────

/// Panel element management on the live document.
///
/// The element with `panel_id` is the source of truth for whether a panel
/// is attached.
#[derive(Debug)]
pub struct DomPanelHost {
    panel_id: String,
    now: Duration,
    last_html: String,
    listener_command: Option<ListenerCommand>,
}

impl DomPanelHost {
    #[must_use]
    pub fn new(panel_id: impl Into<String>) -> Self {
        Self {
            panel_id: panel_id.into(),
            now: Duration::ZERO,
            last_html: String::new(),
            listener_command: None,
        }
    }

    fn render(&mut self, element: &web_sys::Element, session: &PanelSession) {
        let view = PanelView::from_session(session, self.now);
        if let Err(e) = element.set_attribute("style", &bounds_style(view.bounds)) {
            tracing::warn!(error = %js_message(&e), "failed to position panel");
        }
        let html = view.render_html();
        if html != self.last_html {
            element.set_inner_html(&html);
            self.last_html = html;
        }
    }

    fn take_listener_command(&mut self) -> Option<String> {
        self.listener_command.take().map(|command| {
            match command {
                ListenerCommand::Install => "install",
                ListenerCommand::Remove => "remove",
            }
            .to_owned()
        })
    }
}

impl PanelHost for DomPanelHost {
    fn panel_attached(&self) -> bool {
        document().is_some_and(|d| d.get_element_by_id(&self.panel_id).is_some())
    }

    fn attach_panel(&mut self, session: &PanelSession) {
        let Some(document) = document() else {
            tracing::warn!("no document, panel not attached");
            return;
        };
        let Some(body) = document.body() else {
            tracing::warn!("no document body, panel not attached");
            return;
        };
        let element = match document.create_element("div") {
            Ok(element) => element,
            Err(e) => {
                tracing::warn!(error = %js_message(&e), "failed to create panel element");
                return;
            }
        };
        element.set_id(&self.panel_id);
        element.set_class_name("content-expose-panel");
        self.last_html.clear();
        self.render(&element, session);
        if let Err(e) = body.append_child(&element) {
            tracing::warn!(error = %js_message(&e), "failed to attach panel element");
        }
    }

    fn detach_panel(&mut self) {
        if let Some(element) = document().and_then(|d| d.get_element_by_id(&self.panel_id)) {
            element.remove();
        }
        self.last_html.clear();
    }

    fn reload(&mut self) {
        let Some(window) = web_sys::window() else {
            return;
        };
        if let Err(e) = window.location().reload() {
            tracing::warn!(error = %js_message(&e), "page reload failed");
        }
    }

    fn refresh_panel(&mut self, session: &PanelSession) {
        if let Some(element) = document().and_then(|d| d.get_element_by_id(&self.panel_id)) {
            self.render(&element, session);
        }
    }

    fn pointer_listeners(&mut self, command: ListenerCommand) {
        self.listener_command = Some(command);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// JS API
// ─────────────────────────────────────────────────────────────────────────────

fn transition_to_js(transition: Option<PanelTransition>) -> Result<JsValue, JsValue> {
    match transition {
        Some(t) => {
            let json = serde_json::to_string(&t).map_err(js_err)?;
            js_sys::JSON::parse(&json)
        }
        None => Ok(JsValue::NULL),
    }
}

/// One content-expose instance bound to the page.
///
/// The page glue owns the event wiring: it forwards `keydown` to
/// [`handle_key`](Self::handle_key), calls [`tick`](Self::tick) from a timer,
/// calls [`finish_open`](Self::finish_open) once the panel code has loaded
/// for a `begin_construction` transition, and installs or removes
/// document-level pointer listeners when a pointer call returns
/// `"install"` / `"remove"`.
#[wasm_bindgen]
pub struct ContentExposeWeb {
    ctx: ExposeContext,
    host: DomPanelHost,
}

impl ContentExposeWeb {
    fn stamp(&mut self) -> Duration {
        let now = now();
        self.host.now = now;
        now
    }
}

#[wasm_bindgen]
impl ContentExposeWeb {
    /// Create an instance; `config` is an optional (partial) JSON config.
    #[wasm_bindgen(constructor)]
    pub fn new(config: Option<String>) -> Result<ContentExposeWeb, JsValue> {
        let config = match config {
            Some(json) => ExposeConfig::from_json_str(&json).map_err(js_err)?,
            None => ExposeConfig::default(),
        };
        let host = DomPanelHost::new(config.panel_id.clone());
        let backend: Arc<dyn StorageBackend> = Arc::new(LocalStorage);
        Ok(Self {
            ctx: ExposeContext::create(config, backend),
            host,
        })
    }

    /// Supply the raw content tree. Returns `true` only on the first call,
    /// when the keydown listener should be attached; re-initialization after
    /// a hot reload returns `false`.
    pub fn initialize(&mut self, raw: JsValue) -> Result<bool, JsValue> {
        let json = String::from(js_sys::JSON::stringify(&raw)?);
        let raw = parse_content(&json).map_err(js_err)?;
        let now = self.stamp();
        self.ctx.initialize(raw, now);
        Ok(self.ctx.take_listener_request())
    }

    /// Read one top-level value through the tracked accessor.
    pub fn get(&self, key: &str) -> Result<JsValue, JsValue> {
        match self.ctx.content().get(key).map_err(js_err)? {
            Some(value) => {
                let json = serde_json::to_string(&value).map_err(js_err)?;
                js_sys::JSON::parse(&json)
            }
            None => Ok(JsValue::UNDEFINED),
        }
    }

    #[wasm_bindgen(js_name = handleKey)]
    pub fn handle_key(&mut self, event: &KeyboardEvent) -> Result<JsValue, JsValue> {
        self.stamp();
        let input = key_input(
            &event.key(),
            event.ctrl_key(),
            event.meta_key(),
            event.shift_key(),
            event.alt_key(),
        );
        let outcome = self
            .ctx
            .handle_key(&input, &mut self.host)
            .map_err(js_err)?;
        if outcome.prevent_default {
            event.prevent_default();
        }
        transition_to_js(outcome.transition)
    }

    pub fn tick(&mut self) -> Result<JsValue, JsValue> {
        let now = self.stamp();
        transition_to_js(self.ctx.tick(&mut self.host, now))
    }

    pub fn toggle(&mut self) -> Result<JsValue, JsValue> {
        self.stamp();
        let t = self
            .ctx
            .controller_mut()
            .toggle(&mut self.host)
            .map_err(js_err)?;
        transition_to_js(Some(t))
    }

    #[wasm_bindgen(js_name = finishOpen)]
    pub fn finish_open(&mut self, ticket: u32) -> Result<JsValue, JsValue> {
        self.stamp();
        let t = self
            .ctx
            .controller_mut()
            .finish_open(u64::from(ticket), &mut self.host)
            .map_err(js_err)?;
        transition_to_js(Some(t))
    }

    pub fn close(&mut self) -> Result<JsValue, JsValue> {
        self.stamp();
        let t = self
            .ctx
            .controller_mut()
            .close(&mut self.host)
            .map_err(js_err)?;
        transition_to_js(Some(t))
    }

    #[wasm_bindgen(js_name = selectTab)]
    pub fn select_tab(&mut self, key: &str) -> Result<bool, JsValue> {
        self.stamp();
        self.ctx
            .controller_mut()
            .select_tab(key, &mut self.host)
            .map_err(js_err)
    }

    #[wasm_bindgen(js_name = editTab)]
    pub fn edit_tab(&mut self, key: &str, text: String) -> Result<bool, JsValue> {
        self.ctx.controller_mut().edit_tab(key, text).map_err(js_err)
    }

    #[wasm_bindgen(js_name = setScrollOffset)]
    pub fn set_scroll_offset(&mut self, offset: u32) -> Result<(), JsValue> {
        self.ctx
            .controller_mut()
            .set_scroll_offset(offset)
            .map_err(js_err)
    }

    /// `target` is `"drag"` or a resize direction (`"n"`, `"se"`, ...).
    #[wasm_bindgen(js_name = pointerDown)]
    pub fn pointer_down(&mut self, target: &str, x: i32, y: i32) -> Result<Option<String>, JsValue> {
        self.stamp();
        let kind = match target {
            "drag" => GestureKind::Move,
            other => GestureKind::Resize(
                parse_direction(other)
                    .ok_or_else(|| js_err(format!("unknown gesture target: {other}")))?,
            ),
        };
        self.ctx
            .controller_mut()
            .pointer_down(kind, PointerPosition::new(x, y), &mut self.host)
            .map_err(js_err)?;
        Ok(self.host.take_listener_command())
    }

    #[wasm_bindgen(js_name = pointerMove)]
    pub fn pointer_move(&mut self, x: i32, y: i32) -> Result<(), JsValue> {
        self.stamp();
        self.ctx
            .controller_mut()
            .pointer_move(PointerPosition::new(x, y), &mut self.host)
            .map_err(js_err)?;
        Ok(())
    }

    #[wasm_bindgen(js_name = pointerUp)]
    pub fn pointer_up(&mut self, x: i32, y: i32) -> Result<Option<String>, JsValue> {
        self.stamp();
        self.ctx
            .controller_mut()
            .pointer_up(PointerPosition::new(x, y), &mut self.host)
            .map_err(js_err)?;
        Ok(self.host.take_listener_command())
    }

    /// "Preview". Returns `false` when a tab failed validation.
    pub fn commit(&mut self) -> Result<bool, JsValue> {
        let now = self.stamp();
        let outcome = self
            .ctx
            .controller_mut()
            .commit(&mut self.host, now)
            .map_err(js_err)?;
        Ok(matches!(outcome, content_expose_core::CommitOutcome::Committed))
    }

    pub fn reset(&mut self) -> Result<bool, JsValue> {
        self.stamp();
        self.ctx
            .controller_mut()
            .reset(&mut self.host)
            .map_err(js_err)
    }

    /// Copy the merged content to the clipboard. Resolves to `true` on success.
    pub async fn copy(&mut self) -> Result<bool, JsValue> {
        let now = self.stamp();
        let Ok(text) = self.ctx.controller_mut().export(&mut self.host, now) else {
            return Ok(false);
        };
        let result = match web_sys::window() {
            Some(window) => {
                let promise = window.navigator().clipboard().write_text(&text);
                JsFuture::from(promise)
                    .await
                    .map(|_| ())
                    .map_err(|e| js_message(&e))
            }
            None => Err("no window".to_owned()),
        };
        let copied = result.is_ok();
        let now = self.stamp();
        self.ctx
            .controller_mut()
            .finish_export(result, &mut self.host, now)
            .map_err(js_err)?;
        Ok(copied)
    }

    /// Explicit teardown for JS callers: removes the panel and cancels the
    /// pending reopen. Persisted state is kept.
    pub fn destroy(&mut self) {
        self.ctx.teardown(&mut self.host);
    }
}
