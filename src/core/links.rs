//! Outbound reference extraction.
//!
//! `extract` is a pure function of the body text. Code is masked first, so
//! nothing inside fenced blocks or inline code spans is ever a reference.
//! The remaining text is scanned once, left to right, non-overlapping; at any
//! position a wikilink beats an inline link, which beats an inline tag. A link
//! span swallows everything inside it, so `[[note#heading]]` yields no tag.

use std::ops::Range;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use super::paths::has_note_extension;

lazy_static! {
    static ref REFERENCE_RE: Regex = Regex::new(concat!(
        r"(?P<wiki>!?\[\[(?P<winner>[^\]\n]+)\]\])",
        r"|(?P<md>!?\[[^\]\n]*\]\((?P<mtarget><[^>\n]*>|[^()\s]+)(?:\s+(?:'[^'\n]*'|\x22[^\x22\n]*\x22))?\s*\))",
        r"|(?P<tag>#(?P<tname>[\p{L}\p{N}_/\-]+))",
    ))
    .unwrap();
    static ref SCHEME_RE: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceKind {
    Wikilink,
    InlineLink,
    InlineTag,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkReference {
    pub kind: ReferenceKind,
    /// Target as written (tag name without `#` for tags).
    pub raw: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Byte range of the whole reference in the body.
    pub span: Range<usize>,
    /// Resolved note identity; filled in by the graph resolver.
    pub resolved: Option<String>,
}

impl LinkReference {
    pub fn is_note_link(&self) -> bool {
        self.kind != ReferenceKind::InlineTag
    }
}

/// Extract every reference from a note body.
pub fn extract(body: &str) -> Vec<LinkReference> {
    let masked = mask_code(body);
    let mut refs = Vec::new();

    for caps in REFERENCE_RE.captures_iter(&masked) {
        let whole = match caps.get(0) {
            Some(m) => m,
            None => continue,
        };
        let span = whole.range();

        if let Some(inner) = caps.name("winner") {
            if let Some((target, alias)) = wikilink_target(inner.as_str()) {
                refs.push(LinkReference {
                    kind: ReferenceKind::Wikilink,
                    raw: target,
                    alias,
                    span,
                    resolved: None,
                });
            }
        } else if let Some(target) = caps.name("mtarget") {
            if let Some(target) = inline_link_target(target.as_str()) {
                refs.push(LinkReference {
                    kind: ReferenceKind::InlineLink,
                    raw: target,
                    alias: None,
                    span,
                    resolved: None,
                });
            }
        } else if let Some(name) = caps.name("tname") {
            if !tag_boundary(&masked, span.start) {
                continue;
            }
            let tag = name.as_str().trim_end_matches('/');
            if tag.is_empty() || tag.chars().all(|c| c.is_ascii_digit() || c == '/') {
                continue;
            }
            refs.push(LinkReference {
                kind: ReferenceKind::InlineTag,
                raw: tag.to_string(),
                alias: None,
                span: span.start..span.start + 1 + tag.len(),
                resolved: None,
            });
        }
    }

    refs
}

/// Inline tag names in order of appearance (raw, not normalized).
pub fn inline_tags(body: &str) -> Vec<String> {
    extract(body)
        .into_iter()
        .filter(|r| r.kind == ReferenceKind::InlineTag)
        .map(|r| r.raw)
        .collect()
}

fn wikilink_target(inner: &str) -> Option<(String, Option<String>)> {
    let (target, alias) = match inner.split_once('|') {
        Some((target, alias)) => (target, Some(alias.trim().to_string())),
        None => (inner, None),
    };
    // `\|` is how a pipe is escaped inside tables.
    let target = target.trim_end_matches('\\');
    let target = target.split(['#', '^']).next().unwrap_or_default().trim();
    if target.is_empty() {
        return None;
    }
    Some((target.to_string(), alias.filter(|a| !a.is_empty())))
}

fn inline_link_target(raw: &str) -> Option<String> {
    let mut target = raw.trim();
    if let Some(inner) = target.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
        target = inner.trim();
    }
    if target.is_empty() || target.starts_with('#') || SCHEME_RE.is_match(target) {
        return None;
    }
    let target = target.split(['#', '?']).next().unwrap_or_default();
    let decoded = target.replace("%20", " ");
    if has_note_extension(&decoded) {
        Some(decoded)
    } else {
        None
    }
}

fn tag_boundary(text: &str, marker: usize) -> bool {
    match text[..marker].chars().next_back() {
        None => true,
        Some(prev) => !(prev.is_alphanumeric() || prev == '_' || prev == '#'),
    }
}

/// Replace code (fenced blocks and inline spans) with spaces, keeping byte
/// offsets and line breaks intact. Inline spans are matched within a line.
pub fn mask_code(text: &str) -> String {
    let mut bytes = text.as_bytes().to_vec();
    let mut fence: Option<(u8, usize)> = None;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let range = offset..offset + line.len();
        offset += line.len();
        let bare = line.trim_end_matches(['\n', '\r']);

        match fence {
            Some((marker, len)) => {
                if closes_fence(bare, marker, len) {
                    fence = None;
                }
                blank(&mut bytes[range]);
            }
            None => {
                if let Some(open) = opening_fence(bare) {
                    fence = Some(open);
                    blank(&mut bytes[range]);
                } else {
                    mask_inline_code(&mut bytes[range]);
                }
            }
        }
    }

    String::from_utf8_lossy(&bytes).into_owned()
}

/// Fence marker and run length when `line` opens a fenced code block.
pub(crate) fn opening_fence(line: &str) -> Option<(u8, usize)> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let rest = &line[indent..];
    let marker = *rest.as_bytes().first()?;
    if marker != b'`' && marker != b'~' {
        return None;
    }
    let run = rest.bytes().take_while(|b| *b == marker).count();
    if run < 3 {
        return None;
    }
    if marker == b'`' && rest[run..].contains('`') {
        return None;
    }
    Some((marker, run))
}

pub(crate) fn closes_fence(line: &str, marker: u8, len: usize) -> bool {
    let trimmed = line.trim_start_matches(' ');
    let run = trimmed.bytes().take_while(|b| *b == marker).count();
    run >= len && trimmed[run..].trim().is_empty()
}

fn blank(bytes: &mut [u8]) {
    for b in bytes.iter_mut() {
        if *b != b'\n' && *b != b'\r' {
            *b = b' ';
        }
    }
}

fn mask_inline_code(line: &mut [u8]) {
    let len = line.len();
    let mut i = 0;
    while i < len {
        if line[i] != b'`' {
            i += 1;
            continue;
        }
        let open = backtick_run(line, i);
        match find_closing_run(line, i + open, open) {
            Some(close_end) => {
                blank(&mut line[i..close_end]);
                i = close_end;
            }
            None => i += open,
        }
    }
}

fn backtick_run(bytes: &[u8], start: usize) -> usize {
    bytes[start..].iter().take_while(|b| **b == b'`').count()
}

fn find_closing_run(bytes: &[u8], from: usize, len: usize) -> Option<usize> {
    let mut j = from;
    while j < bytes.len() {
        if bytes[j] == b'`' {
            let run = backtick_run(bytes, j);
            if run == len {
                return Some(j + run);
            }
            j += run;
        } else {
            j += 1;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raws(refs: &[LinkReference], kind: ReferenceKind) -> Vec<&str> {
        refs.iter()
            .filter(|r| r.kind == kind)
            .map(|r| r.raw.as_str())
            .collect()
    }

    #[test]
    fn test_wikilinks_with_alias_heading_and_embed() {
        let refs = extract("See [[projects/alpha]], [[Beta|the beta]] and [[Gamma#Plan]] ![[diagram.png]]");
        assert_eq!(
            raws(&refs, ReferenceKind::Wikilink),
            vec!["projects/alpha", "Beta", "Gamma", "diagram.png"]
        );
        assert_eq!(refs[1].alias.as_deref(), Some("the beta"));
        assert!(raws(&refs, ReferenceKind::InlineTag).is_empty());
    }

    #[test]
    fn test_heading_only_wikilink_is_skipped() {
        let refs = extract("Jump to [[#Section]] or [[^block]]");
        assert!(refs.is_empty());
    }

    #[test]
    fn test_inline_links_only_for_notes() {
        let body = "[a](notes/a.md) [b](https://example.com/b.md) [c](image.png) \
                    [d](<My Note.md>) [e](My%20Other.md#part) [f](mailto:x@y.md) [g](#anchor)";
        let refs = extract(body);
        assert_eq!(
            raws(&refs, ReferenceKind::InlineLink),
            vec!["notes/a.md", "My Note.md", "My Other.md"]
        );
        assert!(raws(&refs, ReferenceKind::InlineTag).is_empty());
    }

    #[test]
    fn test_inline_tags() {
        let refs = extract("#start mid#word (#paren) #project/alpha-1 #123 #_x ## heading\n#end/");
        assert_eq!(
            raws(&refs, ReferenceKind::InlineTag),
            vec!["start", "paren", "project/alpha-1", "_x", "end"]
        );
    }

    #[test]
    fn test_unicode_tags() {
        assert_eq!(inline_tags("메모 #할일 and #café"), vec!["할일", "café"]);
    }

    #[test]
    fn test_code_is_masked() {
        let body = "real #tag\n```rust\nlet x = \"#nottag [[NotLink]]\";\n```\nuse `#inline` and ``[[x]] ` `` too\n~~~\n#fenced\n~~~\nafter #done";
        let refs = extract(body);
        assert_eq!(raws(&refs, ReferenceKind::InlineTag), vec!["tag", "done"]);
        assert!(raws(&refs, ReferenceKind::Wikilink).is_empty());
    }

    #[test]
    fn test_unclosed_inline_code_is_literal() {
        assert_eq!(inline_tags("a ` b #tag"), vec!["tag"]);
    }

    #[test]
    fn test_mask_preserves_offsets() {
        let body = "한 `코드` #tag";
        let masked = mask_code(body);
        assert_eq!(masked.len(), body.len());
        let refs = extract(body);
        assert_eq!(&body[refs[0].span.clone()], "#tag");
    }

    #[test]
    fn test_precedence_left_to_right() {
        let refs = extract("[[a#b]] #c [x](d.md)#e");
        let kinds: Vec<ReferenceKind> = refs.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![ReferenceKind::Wikilink, ReferenceKind::InlineTag, ReferenceKind::InlineLink, ReferenceKind::InlineTag]
        );
        assert_eq!(refs[0].raw, "a");
    }

    #[test]
    fn test_escaped_pipe_in_table() {
        let refs = extract("| [[Target\\|Alias]] |");
        assert_eq!(refs[0].raw, "Target");
        assert_eq!(refs[0].alias.as_deref(), Some("Alias"));
    }

    #[test]
    fn test_opening_fence() {
        assert_eq!(opening_fence("```rust"), Some((b'`', 3)));
        assert_eq!(opening_fence("   ~~~~"), Some((b'~', 4)));
        assert_eq!(opening_fence("    ```"), None);
        assert_eq!(opening_fence("``` a`b"), None);
        assert!(closes_fence("````", b'`', 3));
        assert!(!closes_fence("``", b'`', 3));
    }
}
