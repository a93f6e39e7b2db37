//! Text extraction from a response container.
//!
//! The host streams a response either as one flat text node or as nested
//! formatted nodes (paragraphs, list items). Both shapes reduce to the same
//! plain-text form so consecutive samples can be compared by equality.

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

/// Rendered content of a response container at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSnapshot {
    /// Visible text of the container itself.
    pub text: String,
    /// Visible text of each `span`/`div` descendant, in document order.
    #[serde(default)]
    pub children: Vec<String>,
}

impl ContentSnapshot {
    /// Snapshot of a container with no formatted children.
    pub fn flat(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            children: Vec::new(),
        }
    }

    /// Build a snapshot from saved markup.
    ///
    /// The first element matching `container_selector` is used as the
    /// container; when nothing matches (or the selector is invalid) the whole
    /// document is.
    pub fn from_html(html: &str, container_selector: &str) -> Self {
        let document = Html::parse_fragment(html);
        let container = Selector::parse(container_selector)
            .ok()
            .and_then(|sel| document.select(&sel).next());

        let root = match container {
            Some(el) => el,
            None => document.root_element(),
        };

        let children = match Selector::parse("span, div") {
            Ok(sel) => root.select(&sel).map(|el| element_text(&el)).collect(),
            Err(_) => Vec::new(),
        };

        Self {
            text: element_text(&root),
            children,
        }
    }
}

fn element_text(el: &ElementRef<'_>) -> String {
    el.text().collect::<String>()
}

/// Reduce a snapshot to normalized plain text.
///
/// With formatted children: each non-blank child's trimmed text followed by a
/// newline, the whole result trimmed. Without: the container's trimmed text.
pub fn extract_text(snapshot: &ContentSnapshot) -> String {
    if snapshot.children.is_empty() {
        return snapshot.text.trim().to_string();
    }

    let mut out = String::new();
    for child in &snapshot.children {
        let trimmed = child.trim();
        if !trimmed.is_empty() {
            out.push_str(trimmed);
            out.push('\n');
        }
    }
    out.trim().to_string()
}
