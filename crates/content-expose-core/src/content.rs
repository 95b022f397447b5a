#![forbid(unsafe_code)]

//! Content tree types and the small set of tree operations shared by the
//! resolver, the override store, and the tab editor.
//!
//! Content is plain JSON: the root is always an object, values are any JSON
//! value. Key order is preserved (`serde_json/preserve_order`) so tabs and
//! exported JSON list keys the way the host application declared them.

/// One value in the content tree.
pub type ContentValue = serde_json::Value;

/// A content tree: string keys at the root mapping to [`ContentValue`]s.
pub type Content = serde_json::Map<String, ContentValue>;

/// Render a value as 2-space indented JSON.
///
/// A missing value renders as `null`.
#[must_use]
pub fn pretty(value: Option<&ContentValue>) -> String {
    let value = value.unwrap_or(&ContentValue::Null);
    // Serializing a `Value` cannot fail: map keys are always strings.
    serde_json::to_string_pretty(value).unwrap_or_else(|_| String::from("null"))
}

/// Render a whole tree as 2-space indented JSON.
#[must_use]
pub fn pretty_content(content: &Content) -> String {
    serde_json::to_string_pretty(content).unwrap_or_else(|_| String::from("{}"))
}

/// Parse a full content tree.
///
/// Fails when the text is not JSON or when the top level is not an object.
pub fn parse_content(text: &str) -> Result<Content, serde_json::Error> {
    serde_json::from_str::<Content>(text)
}

/// `{...base, ...edits}`: each edited key replaces the base value wholesale;
/// keys without an edit pass through untouched.
#[must_use]
pub fn merge_over<I>(base: &Content, edits: I) -> Content
where
    I: IntoIterator<Item = (String, ContentValue)>,
{
    let mut merged = base.clone();
    for (key, value) in edits {
        merged.insert(key, value);
    }
    merged
}
