//! Heading-delimited sections of a note body.
//!
//! Text before the first heading is section 0 with no heading. Headings are
//! ATX lines (`#` to `######` then a space) outside fenced code blocks.
//! Joining the sections back reproduces the body exactly.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use super::links::{closes_fence, opening_fence};

lazy_static! {
    static ref HEADING_RE: Regex =
        Regex::new(r"^ {0,3}(#{1,6})(?:[ \t]+(.*?))?(?:[ \t]+#+)?[ \t]*$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub index: usize,
    pub heading: Option<String>,
    pub level: usize,
    /// Heading line including its line break.
    heading_line: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionInfo {
    pub index: usize,
    pub heading: Option<String>,
    pub level: usize,
}

impl From<&Section> for SectionInfo {
    fn from(section: &Section) -> Self {
        Self {
            index: section.index,
            heading: section.heading.clone(),
            level: section.level,
        }
    }
}

pub fn parse_sections(body: &str) -> Vec<Section> {
    let mut sections = vec![Section {
        index: 0,
        heading: None,
        level: 0,
        heading_line: String::new(),
        content: String::new(),
    }];
    let mut fence: Option<(u8, usize)> = None;

    for line in body.split_inclusive('\n') {
        let bare = line.trim_end_matches(['\n', '\r']);

        if let Some((marker, len)) = fence {
            if closes_fence(bare, marker, len) {
                fence = None;
            }
        } else if let Some(open) = opening_fence(bare) {
            fence = Some(open);
        } else if let Some(caps) = HEADING_RE.captures(bare) {
            let level = caps.get(1).map(|m| m.as_str().len()).unwrap_or(1);
            let heading = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
            sections.push(Section {
                index: sections.len(),
                heading: Some(heading.to_string()),
                level,
                heading_line: line.to_string(),
                content: String::new(),
            });
            continue;
        }

        if let Some(current) = sections.last_mut() {
            current.content.push_str(line);
        }
    }

    sections
}

pub fn reconstruct(sections: &[Section]) -> String {
    sections
        .iter()
        .map(|s| format!("{}{}", s.heading_line, s.content))
        .collect()
}

/// Find a section by heading text; leading `#`s and spacing are ignored.
pub fn find_section(sections: &[Section], heading: &str) -> Option<usize> {
    let wanted = heading.trim().trim_start_matches('#').trim();
    sections
        .iter()
        .position(|s| s.heading.as_deref().map(str::trim) == Some(wanted))
}

/// Replace a section's content, keeping its heading line.
pub fn replace_content(sections: &mut [Section], index: usize, content: &str) {
    let is_last = index + 1 == sections.len();
    if let Some(section) = sections.get_mut(index) {
        let mut content = content.to_string();
        if !is_last && !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        section.content = content;
        if !section.heading_line.is_empty() && !section.heading_line.ends_with('\n') {
            section.heading_line.push('\n');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = "intro line\n# Daily\n- task\n\n## Notes ##\n```\n# not a heading\n```\ntext\n#tag line\n";

    #[test]
    fn test_parse_sections() {
        let sections = parse_sections(BODY);
        let headings: Vec<Option<&str>> = sections.iter().map(|s| s.heading.as_deref()).collect();
        assert_eq!(headings, vec![None, Some("Daily"), Some("Notes")]);
        assert_eq!(sections[1].level, 1);
        assert_eq!(sections[2].level, 2);
        assert_eq!(sections[0].content, "intro line\n");
        assert!(sections[2].content.contains("# not a heading"));
        assert!(sections[2].content.ends_with("#tag line\n"));
    }

    #[test]
    fn test_reconstruct_is_exact() {
        let sections = parse_sections(BODY);
        assert_eq!(reconstruct(&sections), BODY);
        assert_eq!(reconstruct(&parse_sections("")), "");
    }

    #[test]
    fn test_find_and_replace() {
        let mut sections = parse_sections(BODY);
        let idx = find_section(&sections, "## Daily").unwrap();
        assert_eq!(idx, 1);
        assert!(find_section(&sections, "Missing").is_none());

        replace_content(&mut sections, idx, "- done");
        let body = reconstruct(&sections);
        assert!(body.starts_with("intro line\n# Daily\n- done\n## Notes ##\n"));
    }
}
