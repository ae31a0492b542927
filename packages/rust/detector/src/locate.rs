//! Candidate block location.
//!
//! Finds text nodes matching a keyword, then widens each match to the nearest
//! enclosing element whose text is long enough to be a whole announcement.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Node};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::normalize::{document_text, element_text, is_hidden, truncate_chars};
use crate::patterns::Patterns;

/// Size limits for the upward block walk.
#[derive(Debug, Clone, Copy)]
pub struct BlockLimits {
    /// Blocks shorter than this (in characters) are skipped.
    pub min_chars: usize,
    /// Characters hashed into a block fingerprint.
    pub fingerprint_chars: usize,
    /// Maximum number of nodes visited, starting at the anchor itself.
    pub max_ascent: usize,
}

/// A node that can report its text and its structural parent.
pub trait ParentLink: Sized {
    fn parent_link(&self) -> Option<Self>;
    fn block_text(&self) -> String;
}

impl ParentLink for ElementRef<'_> {
    fn parent_link(&self) -> Option<Self> {
        self.parent().and_then(ElementRef::wrap)
    }

    fn block_text(&self) -> String {
        element_text(*self)
    }
}

/// SHA-256 hex digest of the first `prefix_chars` characters of `text`.
pub fn fingerprint(text: &str, prefix_chars: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(truncate_chars(text, prefix_chars).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Climb from `anchor` until a long-enough, not-yet-seen block is found.
///
/// Records the accepted block's fingerprint in `seen`.
pub fn widen<N: ParentLink>(
    anchor: N,
    limits: &BlockLimits,
    seen: &mut HashSet<String>,
) -> Option<String> {
    let mut current = Some(anchor);

    for _ in 0..limits.max_ascent {
        let node = current?;
        let text = node.block_text();

        if text.chars().count() >= limits.min_chars
            && seen.insert(fingerprint(&text, limits.fingerprint_chars))
        {
            return Some(text);
        }

        current = node.parent_link();
    }

    None
}

/// Unique candidate blocks of `doc`, in document order.
pub fn locate_blocks(doc: &Html, patterns: &Patterns, limits: &BlockLimits) -> Vec<String> {
    if !patterns.any_keyword(&document_text(doc)) {
        return Vec::new();
    }

    let anchors: Vec<ElementRef<'_>> = doc
        .tree
        .root()
        .descendants()
        .filter_map(|node| {
            let Node::Text(text) = node.value() else {
                return None;
            };
            let parent = node.parent()?;
            if is_hidden(parent.value()) {
                return None;
            }
            let piece = text.trim();
            if piece.is_empty() || !patterns.any_keyword(piece) {
                return None;
            }
            ElementRef::wrap(parent)
        })
        .collect();

    let mut seen = HashSet::new();
    let blocks: Vec<String> = anchors
        .into_iter()
        .filter_map(|anchor| widen(anchor, limits, &mut seen))
        .collect();

    debug!(blocks = blocks.len(), "located candidate blocks");
    blocks
}
