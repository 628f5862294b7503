use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;

use chrono::{DateTime, Local};
use serde::Serialize;
use serde_yaml::{Mapping, Value};

use super::error::{Result, VaultError};
use super::frontmatter;
use super::links::{self, LinkReference, ReferenceKind};
use super::paths::ResolvedPath;

/// One note as read from disk. Built per request and dropped afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct Note {
    pub id: String,
    pub path: String,
    pub frontmatter: Mapping,
    pub body: String,
    /// Frontmatter and inline tags, normalized, sorted and deduplicated.
    pub tags: Vec<String>,
    pub modified: DateTime<Local>,
    /// Set when the header could not be parsed and the whole file became the body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontmatter_error: Option<String>,
}

impl Note {
    pub fn load(resolved: &ResolvedPath, lowercase_tags: bool) -> Result<Self> {
        Self::load_with_references(resolved, lowercase_tags).map(|(note, _)| note)
    }

    /// Read a note and extract its references in the same pass.
    pub fn load_with_references(
        resolved: &ResolvedPath,
        lowercase_tags: bool,
    ) -> Result<(Self, Vec<LinkReference>)> {
        let content = fs::read_to_string(&resolved.absolute).map_err(|e| match e.kind() {
            ErrorKind::NotFound => VaultError::NotFound(resolved.id.clone()),
            _ => VaultError::io(&resolved.absolute, e),
        })?;
        let metadata =
            fs::metadata(&resolved.absolute).map_err(|e| VaultError::io(&resolved.absolute, e))?;
        let modified = metadata
            .modified()
            .map(DateTime::from)
            .unwrap_or_else(|_| Local::now());

        Ok(Self::from_content(resolved, &content, modified, lowercase_tags))
    }

    pub fn from_content(
        resolved: &ResolvedPath,
        content: &str,
        modified: DateTime<Local>,
        lowercase_tags: bool,
    ) -> (Self, Vec<LinkReference>) {
        let (fields, body, frontmatter_error) = match frontmatter::parse(content) {
            Ok((fields, body)) => (fields, body.to_string(), None),
            Err(e) => {
                tracing::warn!(note = %resolved.id, error = %e, "malformed frontmatter, reading as plain body");
                (Mapping::new(), content.to_string(), Some(e.to_string()))
            }
        };

        let references = links::extract(&body);

        let mut tags: BTreeSet<String> = frontmatter::tags_from(&fields, lowercase_tags)
            .into_iter()
            .collect();
        tags.extend(
            references
                .iter()
                .filter(|r| r.kind == ReferenceKind::InlineTag)
                .filter_map(|r| frontmatter::normalize_tag(&r.raw, lowercase_tags)),
        );

        let note = Self {
            id: resolved.id.clone(),
            path: resolved.relative.clone(),
            frontmatter: fields,
            body,
            tags: tags.into_iter().collect(),
            modified,
            frontmatter_error,
        };
        (note, references)
    }

    /// Last path segment of the identity.
    pub fn name(&self) -> &str {
        self.id.rsplit('/').next().unwrap_or(&self.id)
    }

    /// Containing folder, empty for notes at the root.
    pub fn folder(&self) -> &str {
        self.id.rsplit_once('/').map(|(folder, _)| folder).unwrap_or("")
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.frontmatter.get(key)
    }

    pub fn has_valid_frontmatter(&self) -> bool {
        self.frontmatter_error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn resolved(id: &str) -> ResolvedPath {
        ResolvedPath {
            id: id.to_string(),
            relative: format!("{}.md", id),
            absolute: PathBuf::from(format!("/vault/{}.md", id)),
        }
    }

    #[test]
    fn test_tags_merge_frontmatter_and_inline() {
        let content = "---\ntags: [work, '#urgent']\n---\nDo it #urgent #later `#code`\n";
        let (note, refs) = Note::from_content(&resolved("daily/today"), content, Local::now(), false);
        assert_eq!(note.tags, vec!["later", "urgent", "work"]);
        assert_eq!(note.body, "Do it #urgent #later `#code`\n");
        assert_eq!(refs.len(), 2);
        assert_eq!(note.name(), "today");
        assert_eq!(note.folder(), "daily");
    }

    #[test]
    fn test_malformed_frontmatter_recovers_body() {
        let content = "---\ntitle: [oops\n---\nSee [[Other]]\n";
        let (note, refs) = Note::from_content(&resolved("broken"), content, Local::now(), false);
        assert!(!note.has_valid_frontmatter());
        assert!(note.frontmatter.is_empty());
        assert_eq!(note.body, content);
        assert_eq!(refs[0].raw, "Other");
        assert_eq!(note.folder(), "");
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let err = Note::load(&resolved("nowhere/ghost"), false).unwrap_err();
        assert_eq!(err.kind(), "NotFound");
        assert_eq!(err.subject(), "nowhere/ghost");
    }
}
