//! Structured outlines returned by the session backend

use serde::{Deserialize, Serialize};

/// Source identifier stored for text rendered from an outline
pub const OUTLINE_SOURCE: &str = "session-outline";

/// Ordered key points of a video
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Outline {
    pub sections: Vec<Section>,
}

/// One titled section with its start offset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub start_secs: u64,
    pub theses: Vec<String>,
}

impl Section {
    pub fn new(title: &str, start_secs: u64, theses: &[&str]) -> Self {
        Self {
            title: title.to_string(),
            start_secs,
            theses: theses.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl Outline {
    /// Non-empty theses across all sections
    pub fn thesis_count(&self) -> usize {
        self.sections
            .iter()
            .flat_map(|s| &s.theses)
            .filter(|t| !t.trim().is_empty())
            .count()
    }

    /// Render as markdown-like text. Untitled sections are numbered.
    pub fn render(&self) -> String {
        let mut out = String::from("# Key points\n\n");
        for (index, section) in self.sections.iter().enumerate() {
            let title = match section.title.trim() {
                "" => format!("Section {}", index + 1),
                title => title.to_string(),
            };
            out.push_str(&format!(
                "## {} ({})\n",
                title,
                format_offset(section.start_secs)
            ));
            for thesis in section.theses.iter().map(|t| t.trim()) {
                if !thesis.is_empty() {
                    out.push_str("- ");
                    out.push_str(thesis);
                    out.push('\n');
                }
            }
            out.push('\n');
        }
        out.trim_end().to_string()
    }
}

/// `MM:SS`, with minutes growing past 59 for long videos
pub fn format_offset(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_sections_in_order() {
        let outline = Outline {
            sections: vec![
                Section::new("Intro", 65, &["a", "b"]),
                Section::new("End", 125, &["c"]),
            ],
        };

        assert_eq!(
            outline.render(),
            "# Key points\n\n## Intro (01:05)\n- a\n- b\n\n## End (02:05)\n- c"
        );
    }

    #[test]
    fn test_blank_theses_skipped_and_not_counted() {
        let outline = Outline {
            sections: vec![Section::new("Only", 0, &["x", "  ", ""])],
        };
        assert_eq!(outline.thesis_count(), 1);
        assert_eq!(outline.render(), "# Key points\n\n## Only (00:00)\n- x");
    }

    #[test]
    fn test_untitled_section_is_numbered() {
        let outline = Outline {
            sections: vec![
                Section::new("Intro", 0, &["a"]),
                Section::new("  ", 30, &["b"]),
            ],
        };
        assert_eq!(
            outline.render(),
            "# Key points\n\n## Intro (00:00)\n- a\n\n## Section 2 (00:30)\n- b"
        );
    }

    #[test]
    fn test_format_offset() {
        assert_eq!(format_offset(0), "00:00");
        assert_eq!(format_offset(59), "00:59");
        assert_eq!(format_offset(3725), "62:05");
    }
}
