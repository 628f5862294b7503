//! Search over one vault scan.
//!
//! Full-text search ranks by match count only, with identity as the tie
//! break. There is no relevance scoring beyond that count.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::core::error::{Result, VaultError};
use crate::core::frontmatter::scalar_string;
use crate::graph::{GraphIndex, ScannedNote, TagCount, TagIndex, VaultScan};

pub const DEFAULT_MAX_SNIPPETS: usize = 5;
const SNIPPET_WIDTH: usize = 160;

#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Maximum number of hits; `None` returns all.
    pub limit: Option<usize>,
    pub case_sensitive: bool,
    pub max_snippets: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: None,
            case_sensitive: false,
            max_snippets: DEFAULT_MAX_SNIPPETS,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub path: String,
    pub matches: usize,
    pub snippets: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "mcp", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum PredicateOp {
    /// Scalar field equal to the value.
    #[default]
    Equals,
    /// List field with the value as an element, or text field containing it.
    Contains,
}

/// One condition on a named frontmatter field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "mcp", derive(schemars::JsonSchema))]
pub struct FieldPredicate {
    pub field: String,
    #[serde(default)]
    pub op: PredicateOp,
    pub value: String,
}

impl FieldPredicate {
    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op: PredicateOp::Equals,
            value: value.into(),
        }
    }

    pub fn contains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op: PredicateOp::Contains,
            value: value.into(),
        }
    }

    /// Parse `field=value` or `field~value`.
    pub fn parse(expr: &str) -> Result<Self> {
        let (field, op, value) = match (expr.find('='), expr.find('~')) {
            (Some(eq), Some(ct)) if ct < eq => (&expr[..ct], PredicateOp::Contains, &expr[ct + 1..]),
            (Some(eq), _) => (&expr[..eq], PredicateOp::Equals, &expr[eq + 1..]),
            (None, Some(ct)) => (&expr[..ct], PredicateOp::Contains, &expr[ct + 1..]),
            (None, None) => {
                return Err(VaultError::InvalidQuery(format!(
                    "expected field=value or field~value, got '{}'",
                    expr
                )))
            }
        };
        let field = field.trim();
        if field.is_empty() {
            return Err(VaultError::InvalidQuery(format!("missing field name in '{}'", expr)));
        }
        Ok(Self {
            field: field.to_string(),
            op,
            value: value.trim().to_string(),
        })
    }

    fn matches(&self, field: Option<&Value>) -> bool {
        let Some(value) = field else {
            return false;
        };
        match (self.op, value) {
            (_, Value::Null) => false,
            (PredicateOp::Equals, value) => scalar_string(value).as_deref() == Some(self.value.as_str()),
            (PredicateOp::Contains, Value::Sequence(items)) => items
                .iter()
                .filter_map(scalar_string)
                .any(|item| item == self.value),
            (PredicateOp::Contains, value) => scalar_string(value)
                .map(|text| text.to_lowercase().contains(&self.value.to_lowercase()))
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VaultStats {
    pub note_count: usize,
    pub tag_count: usize,
    pub link_count: usize,
    pub resolved_link_count: usize,
    pub unresolved_link_count: usize,
    pub skipped_notes: usize,
}

pub struct SearchEngine<'a> {
    scan: &'a VaultScan,
    tags: TagIndex,
}

impl<'a> SearchEngine<'a> {
    pub fn new(scan: &'a VaultScan) -> Self {
        Self {
            scan,
            tags: TagIndex::build(scan),
        }
    }

    pub fn full_text(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(VaultError::InvalidQuery("empty search query".to_string()));
        }
        let pattern = RegexBuilder::new(&regex::escape(query))
            .case_insensitive(!options.case_sensitive)
            .build()
            .map_err(|e| VaultError::InvalidQuery(e.to_string()))?;

        let mut hits: Vec<SearchHit> = self
            .scan
            .notes
            .iter()
            .filter_map(|scanned| hit(scanned, &pattern, options.max_snippets))
            .collect();

        hits.sort_by(|a, b| b.matches.cmp(&a.matches).then_with(|| a.id.cmp(&b.id)));
        if let Some(limit) = options.limit {
            hits.truncate(limit);
        }
        Ok(hits)
    }

    /// Notes carrying an already normalized tag.
    pub fn by_tag(&self, tag: &str) -> Vec<String> {
        self.tags.notes(tag)
    }

    /// Notes whose frontmatter satisfies every predicate.
    pub fn by_frontmatter(&self, predicates: &[FieldPredicate]) -> Vec<String> {
        self.scan
            .notes
            .iter()
            .filter(|s| s.note.has_valid_frontmatter())
            .filter(|s| predicates.iter().all(|p| p.matches(s.note.field(&p.field))))
            .map(|s| s.note.id.clone())
            .collect()
    }

    pub fn tags(&self) -> Vec<TagCount> {
        self.tags.counts()
    }

    pub fn stats(&self, graph: &GraphIndex) -> VaultStats {
        VaultStats {
            note_count: self.scan.notes.len(),
            tag_count: self.tags.len(),
            link_count: graph.total_links(),
            resolved_link_count: graph.resolved_links(),
            unresolved_link_count: graph.total_links() - graph.resolved_links(),
            skipped_notes: self.scan.skipped(),
        }
    }
}

fn hit(scanned: &ScannedNote, pattern: &Regex, max_snippets: usize) -> Option<SearchHit> {
    let note = &scanned.note;
    let matches = pattern.find_iter(&note.body).count() + pattern.find_iter(&note.id).count();
    if matches == 0 {
        return None;
    }

    let snippets = note
        .body
        .lines()
        .filter(|line| pattern.is_match(line))
        .map(|line| truncate(line.trim(), SNIPPET_WIDTH))
        .take(max_snippets)
        .collect();

    Some(SearchHit {
        id: note.id.clone(),
        path: note.path.clone(),
        matches,
        snippets,
    })
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::VaultConfig;
    use crate::core::store::NoteStore;
    use anyhow::Result;
    use std::fs;

    fn scan(files: &[(&str, &str)]) -> Result<(tempfile::TempDir, VaultScan)> {
        let dir = tempfile::tempdir()?;
        for (path, content) in files {
            let path = dir.path().join(path);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, content)?;
        }
        let store = NoteStore::new(&VaultConfig::new(dir.path())?)?;
        Ok((dir, VaultScan::collect(&store)))
    }

    #[test]
    fn test_full_text_ordering() -> Result<()> {
        let (_dir, scan) = scan(&[
            ("b.md", "rust once"),
            ("a.md", "Rust twice\nand RUST"),
            ("rust-notes.md", "nothing here about it"),
            ("c.md", "python"),
        ])?;
        let engine = SearchEngine::new(&scan);
        let hits = engine.full_text("rust", &SearchOptions::default())?;

        let ranked: Vec<(&str, usize)> = hits.iter().map(|h| (h.id.as_str(), h.matches)).collect();
        assert_eq!(ranked, vec![("a", 2), ("b", 1), ("rust-notes", 1)]);
        assert_eq!(hits[0].snippets, vec!["Rust twice", "and RUST"]);
        assert!(hits[2].snippets.is_empty());
        Ok(())
    }

    #[test]
    fn test_full_text_options() -> Result<()> {
        let (_dir, scan) = scan(&[("a.md", "a.b a.b axb\nA.B"), ("b.md", "a.b")])?;
        let engine = SearchEngine::new(&scan);

        let literal = engine.full_text("a.b", &SearchOptions::default())?;
        assert_eq!(literal[0].matches, 3);

        let options = SearchOptions {
            limit: Some(1),
            case_sensitive: true,
            max_snippets: 1,
        };
        let hits = engine.full_text("a.b", &options)?;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].matches, 2);
        assert_eq!(hits[0].snippets.len(), 1);

        assert_eq!(
            engine.full_text("   ", &options).unwrap_err().kind(),
            "InvalidQuery"
        );
        Ok(())
    }

    #[test]
    fn test_by_frontmatter() -> Result<()> {
        let (_dir, scan) = scan(&[
            ("a.md", "---\nstatus: active\npriority: 2\ntags: [work, urgent]\ntitle: Quarterly Plan\n---\n"),
            ("b.md", "---\nstatus: done\npriority: 2\nowner:\n---\n"),
            ("c.md", "no header, status: active"),
            ("d.md", "---\nstatus: [active\n---\n"),
        ])?;
        let engine = SearchEngine::new(&scan);

        assert_eq!(engine.by_frontmatter(&[FieldPredicate::equals("status", "active")]), vec!["a"]);
        assert_eq!(engine.by_frontmatter(&[FieldPredicate::equals("priority", "2")]), vec!["a", "b"]);
        assert_eq!(
            engine.by_frontmatter(&[
                FieldPredicate::equals("priority", "2"),
                FieldPredicate::contains("tags", "urgent"),
            ]),
            vec!["a"]
        );
        assert_eq!(engine.by_frontmatter(&[FieldPredicate::contains("title", "plan")]), vec!["a"]);
        // Sequences never equal a scalar; missing and null fields never match.
        assert!(engine.by_frontmatter(&[FieldPredicate::equals("tags", "work")]).is_empty());
        assert!(engine.by_frontmatter(&[FieldPredicate::equals("owner", "")]).is_empty());
        assert!(engine.by_frontmatter(&[FieldPredicate::equals("missing", "")]).is_empty());
        Ok(())
    }

    #[test]
    fn test_predicate_parse() -> Result<()> {
        let eq = FieldPredicate::parse("status = active")?;
        assert_eq!((eq.field.as_str(), eq.op, eq.value.as_str()), ("status", PredicateOp::Equals, "active"));
        let ct = FieldPredicate::parse("tags~a=b")?;
        assert_eq!((ct.field.as_str(), ct.op, ct.value.as_str()), ("tags", PredicateOp::Contains, "a=b"));
        assert!(FieldPredicate::parse("novalue").is_err());
        assert!(FieldPredicate::parse("=x").is_err());
        Ok(())
    }

    #[test]
    fn test_tags_and_stats() -> Result<()> {
        let (_dir, scan) = scan(&[("a.md", "#x #y [[b]] [[ghost]]"), ("b.md", "#x")])?;
        let engine = SearchEngine::new(&scan);
        assert_eq!(engine.by_tag("x"), vec!["a", "b"]);
        assert_eq!(engine.tags()[0], TagCount { tag: "x".into(), count: 2 });

        let resolver = crate::graph::LinkResolver::new(scan.ids(), true);
        let graph = GraphIndex::build(&scan, &resolver);
        let stats = engine.stats(&graph);
        assert_eq!(stats.note_count, 2);
        assert_eq!(stats.tag_count, 2);
        assert_eq!(stats.link_count, 2);
        assert_eq!(stats.unresolved_link_count, 1);
        Ok(())
    }
}
