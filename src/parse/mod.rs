//! Text extraction from acquisition artifacts
//!
//! This module handles:
//! - Scoped HTML extraction from sharing pages
//! - Fragment cleanup and deduplication

mod html;

pub use html::*;

use std::collections::HashSet;

/// Drop repeated fragments, keeping first-seen order
pub fn dedupe_fragments(fragments: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    fragments
        .into_iter()
        .filter(|f| seen.insert(f.clone()))
        .collect()
}

/// Collapse runs of whitespace inside a line to a single space
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
