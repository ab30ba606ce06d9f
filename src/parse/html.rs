//! Sharing page text extraction

use super::{dedupe_fragments, normalize_whitespace};
use crate::config::AcquisitionConfig;
use scraper::{ElementRef, Html, Selector};

/// Summary blocks, text nodes joined with newlines
const SUMMARY_SELECTORS: [&str; 2] = ["div.summary-scroll-inner", "div.summary-scroll"];

/// Thesis fragments, text nodes joined with spaces
const THESIS_SELECTORS: [&str; 2] = ["p.thesis-text", "span.text-wrapper"];

/// Meta tags read in this order, one fragment each
const META_NAMES: [&str; 2] = ["description", "og:description"];

/// Minimum fragment lengths; zero keeps any non-empty fragment
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractionRules {
    pub min_summary_block_chars: usize,
    pub min_thesis_chars: usize,
}

impl From<&AcquisitionConfig> for ExtractionRules {
    fn from(config: &AcquisitionConfig) -> Self {
        Self {
            min_summary_block_chars: config.min_summary_block_chars,
            min_thesis_chars: config.min_thesis_chars,
        }
    }
}

/// Extract the summary text from a sharing page.
///
/// Returns `None` when none of the scoped selectors yield text.
pub fn extract_sharing_text(html: &str, rules: &ExtractionRules) -> Option<String> {
    let document = Html::parse_document(html);
    let mut fragments = Vec::new();

    for css in SUMMARY_SELECTORS {
        collect_joined(
            &document,
            css,
            "\n",
            rules.min_summary_block_chars,
            &mut fragments,
        );
    }

    for css in THESIS_SELECTORS {
        collect_joined(&document, css, " ", rules.min_thesis_chars, &mut fragments);
    }

    for meta_name in META_NAMES {
        if let Some(content) = first_meta_content(&document, meta_name) {
            push_fragment(content, rules.min_thesis_chars, &mut fragments);
        }
    }

    let fragments = dedupe_fragments(fragments);
    if fragments.is_empty() {
        None
    } else {
        Some(fragments.join("\n\n"))
    }
}

fn collect_joined(
    document: &Html,
    css: &str,
    separator: &str,
    min_chars: usize,
    out: &mut Vec<String>,
) {
    let Ok(selector) = Selector::parse(css) else {
        return;
    };
    for elem in document.select(&selector) {
        push_fragment(element_text(elem, separator), min_chars, out);
    }
}

/// Content of the first `<meta>` named `meta_name`, by `name` then `property`
fn first_meta_content(document: &Html, meta_name: &str) -> Option<String> {
    ["name", "property"].into_iter().find_map(|attr| {
        let selector =
            Selector::parse(&format!(r#"meta[{}="{}"][content]"#, attr, meta_name)).ok()?;
        document
            .select(&selector)
            .next()
            .and_then(|elem| elem.value().attr("content"))
            .map(|content| content.trim().to_string())
    })
}

fn element_text(elem: ElementRef<'_>, separator: &str) -> String {
    elem.text()
        .map(normalize_whitespace)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

fn push_fragment(fragment: String, min_chars: usize, out: &mut Vec<String>) {
    if fragment.is_empty() || fragment.chars().count() < min_chars {
        return;
    }
    out.push(fragment);
}
