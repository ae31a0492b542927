//! Plain-text extraction from parsed markup.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node};

/// Elements whose text never reaches the reader.
const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

    WS_RE.replace_all(text.trim(), " ").into_owned()
}

/// Visible text of an element: each text node trimmed, joined by single spaces.
pub fn element_text(el: ElementRef<'_>) -> String {
    let mut pieces: Vec<&str> = Vec::new();

    for node in el.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        if node.parent().is_some_and(|p| is_hidden(p.value())) {
            continue;
        }
        let piece = text.trim();
        if !piece.is_empty() {
            pieces.push(piece);
        }
    }

    collapse_whitespace(&pieces.join(" "))
}

/// Visible text of the whole document.
pub fn document_text(doc: &Html) -> String {
    element_text(doc.root_element())
}

/// Whether a node is one of the [`HIDDEN_TAGS`] containers.
pub(crate) fn is_hidden(node: &Node) -> bool {
    node.as_element()
        .is_some_and(|el| HIDDEN_TAGS.contains(&el.name()))
}

/// The first `max` characters of `text` (not bytes).
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
