#![forbid(unsafe_code)]

//! Panel markup.
//!
//! The panel is rendered as one HTML string per refresh. Interactive parts
//! carry `data-*` attributes that the page glue maps back to controller
//! calls:
//!
//! | attribute            | controller call                        |
//! |----------------------|----------------------------------------|
//! | `data-tab="<key>"`   | `select_tab(key)`                      |
//! | `data-action="..."`  | `commit`, `reset`, `copy`, `close`     |
//! | `data-drag`          | `pointer_down(GestureKind::Move)`      |
//! | `data-resize="<d>"`  | `pointer_down(GestureKind::Resize(d))` |
//! | `data-editor`        | `edit_tab(active, value)` on input     |
//!
//! Styling is left to the page; only geometry is inlined.

use std::fmt::Write as _;
use std::time::Duration;

use content_expose_core::{Bounds, PanelSession, ResizeDirection, StatusKind};
use serde::Serialize;

/// One tab button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TabView {
    pub key: String,
    pub active: bool,
}

/// Everything needed to draw the panel at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelView {
    pub bounds: Bounds,
    pub tabs: Vec<TabView>,
    pub editor_text: String,
    pub scroll_offset: u32,
    pub status: Option<(StatusKind, String)>,
    /// The Reset action is offered only when an override exists.
    pub show_reset: bool,
}

impl PanelView {
    #[must_use]
    pub fn from_session(session: &PanelSession, now: Duration) -> Self {
        let tabs = session.tabs();
        let active = tabs.active();
        Self {
            bounds: session.bounds(),
            tabs: tabs
                .keys()
                .map(|key| TabView {
                    key: key.to_owned(),
                    active: Some(key) == active,
                })
                .collect(),
            editor_text: tabs.active_text().unwrap_or_default().to_owned(),
            scroll_offset: session.scroll_offset(),
            status: session
                .status(now)
                .map(|m| (m.kind, m.text.clone())),
            show_reset: session.has_override(),
        }
    }

    /// Inner HTML of the panel element.
    #[must_use]
    pub fn render_html(&self) -> String {
        let mut html = String::with_capacity(256 + self.editor_text.len());
        html.push_str("<div class=\"content-expose-header\" data-drag>Content</div>");

        html.push_str("<div class=\"content-expose-tabs\">");
        if self.tabs.is_empty() {
            html.push_str("<span class=\"content-expose-empty\">No content read yet</span>");
        }
        for tab in &self.tabs {
            let key = escape_html(&tab.key);
            let class = if tab.active { " active" } else { "" };
            let _ = write!(
                html,
                "<button class=\"content-expose-tab{class}\" data-tab=\"{key}\">{key}</button>"
            );
        }
        html.push_str("</div>");

        let _ = write!(
            html,
            "<textarea class=\"content-expose-editor\" data-editor data-scroll=\"{}\" spellcheck=\"false\">{}</textarea>",
            self.scroll_offset,
            escape_html(&self.editor_text)
        );

        html.push_str("<div class=\"content-expose-actions\">");
        html.push_str("<button data-action=\"commit\">Preview</button>");
        if self.show_reset {
            html.push_str("<button data-action=\"reset\">Reset</button>");
        }
        html.push_str("<button data-action=\"copy\">Copy JSON</button>");
        html.push_str("<button data-action=\"close\">Close</button>");
        html.push_str("</div>");

        if let Some((kind, text)) = &self.status {
            let class = match kind {
                StatusKind::Success => "success",
                StatusKind::Error => "error",
            };
            let _ = write!(
                html,
                "<div class=\"content-expose-status {class}\">{}</div>",
                escape_html(text)
            );
        }

        for direction in ResizeDirection::ALL {
            let d = direction.as_str();
            let _ = write!(
                html,
                "<div class=\"content-expose-resize content-expose-resize-{d}\" data-resize=\"{d}\"></div>"
            );
        }
        html
    }
}

/// Inline geometry for the panel element.
#[must_use]
pub fn bounds_style(bounds: Bounds) -> String {
    format!(
        "position: fixed; left: {}px; top: {}px; width: {}px; height: {}px;",
        bounds.x, bounds.y, bounds.width, bounds.height
    )
}

/// Parse the value of a `data-resize` attribute.
#[must_use]
pub fn parse_direction(value: &str) -> Option<ResizeDirection> {
    ResizeDirection::ALL
        .into_iter()
        .find(|d| d.as_str() == value)
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn view(show_reset: bool) -> PanelView {
        PanelView {
            bounds: Bounds::default(),
            tabs: vec![
                TabView {
                    key: "hero".into(),
                    active: true,
                },
                TabView {
                    key: "<odd>".into(),
                    active: false,
                },
            ],
            editor_text: "{\n  \"title\": \"<b>Hi</b>\"\n}".into(),
            scroll_offset: 12,
            status: Some((StatusKind::Error, "Invalid JSON in \"hero\" tab".into())),
            show_reset,
        }
    }

    #[test]
    fn bounds_style_inlines_pixels() {
        assert_eq!(
            bounds_style(Bounds::new(1, 2, 300, 400)),
            "position: fixed; left: 1px; top: 2px; width: 300px; height: 400px;"
        );
    }

    #[test]
    fn markup_escapes_user_text() {
        let html = view(false).render_html();
        assert!(html.contains("data-tab=\"&lt;odd&gt;\""));
        assert!(html.contains("&lt;b&gt;Hi&lt;/b&gt;"));
        assert!(html.contains("Invalid JSON in &quot;hero&quot; tab"));
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn reset_offered_only_with_override() {
        assert!(!view(false).render_html().contains("data-action=\"reset\""));
        assert!(view(true).render_html().contains("data-action=\"reset\""));
    }

    #[test]
    fn every_direction_has_a_handle() {
        let html = view(false).render_html();
        for d in ResizeDirection::ALL {
            assert!(html.contains(&format!("data-resize=\"{}\"", d.as_str())));
            assert_eq!(parse_direction(d.as_str()), Some(d));
        }
        assert_eq!(parse_direction("up"), None);
    }
}
