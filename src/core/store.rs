//! Note persistence.
//!
//! Mutations hold a per-identity lock for their whole read-modify-write and
//! land on disk through a temporary file renamed over the target, so readers
//! see either the old or the new file and a failed write leaves nothing behind.

use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;
use tempfile::Builder;
use walkdir::WalkDir;

use super::config::VaultConfig;
use super::error::{Result, VaultError};
use super::frontmatter;
use super::links::LinkReference;
use super::note::Note;
use super::paths::{has_note_extension, note_id, ResolvedPath, VaultPaths};
use super::sections::{self, SectionInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Fails if the note exists.
    Create,
    /// Replaces frontmatter and body; creates when missing.
    Overwrite,
    /// Adds to the end of the body; the note must exist.
    Append,
    /// Adds to the start of the body; the note must exist.
    Prepend,
}

#[derive(Debug, Clone, Serialize)]
pub struct TagChange {
    pub note: String,
    pub tag: String,
    pub changed: bool,
    /// Frontmatter tags after the change.
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionContent {
    pub heading: Option<String>,
    pub level: usize,
    pub content: String,
}

/// Advisory locks keyed by note path, shared by every writer in the process.
#[derive(Default)]
struct LockTable {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LockTable {
    /// Lock for `key`. Entries no writer holds any more are dropped here.
    fn handle(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.retain(|k, lock| k == key || Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(key.to_string()).or_default())
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

pub struct NoteStore {
    paths: VaultPaths,
    lowercase_tags: bool,
    locks: LockTable,
}

impl NoteStore {
    pub fn new(config: &VaultConfig) -> Result<Self> {
        Ok(Self {
            paths: VaultPaths::from_config(config)?,
            lowercase_tags: config.lowercase_tags,
            locks: LockTable::default(),
        })
    }

    pub fn paths(&self) -> &VaultPaths {
        &self.paths
    }

    pub fn read(&self, id: &str) -> Result<Note> {
        let resolved = self.paths.resolve(id)?;
        Note::load(&resolved, self.lowercase_tags)
    }

    /// Read a note together with the references in its body.
    pub fn read_with_references(&self, id: &str) -> Result<(Note, Vec<LinkReference>)> {
        let resolved = self.paths.resolve(id)?;
        Note::load_with_references(&resolved, self.lowercase_tags)
    }

    pub fn lowercase_tags(&self) -> bool {
        self.lowercase_tags
    }

    /// Run `op` holding the writer lock for `key`. Used for vault files that
    /// are not notes, such as the folder-template config.
    pub fn locked<T>(&self, key: &str, op: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock = self.locks.handle(key);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        op()
    }

    pub fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.paths.resolve(id)?.absolute.is_file())
    }

    pub fn write(&self, id: &str, fields: Mapping, body: &str, mode: WriteMode) -> Result<Note> {
        let resolved = self.paths.resolve(id)?;
        let lock = self.locks.handle(&resolved.relative);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let content = match mode {
            WriteMode::Create => {
                if resolved.absolute.exists() {
                    return Err(VaultError::AlreadyExists(resolved.id));
                }
                render(&resolved, &fields, body)?
            }
            WriteMode::Overwrite => render(&resolved, &fields, body)?,
            WriteMode::Append | WriteMode::Prepend => {
                let (mut existing, old_body) = self.load_structured(&resolved)?;
                frontmatter::merge(&mut existing, fields);
                let new_body = if mode == WriteMode::Append {
                    append_body(&old_body, body)
                } else {
                    prepend_body(&old_body, body)
                };
                render(&resolved, &existing, &new_body)?
            }
        };

        write_atomic(&resolved.absolute, &content, mode == WriteMode::Create).map_err(|e| {
            match e {
                VaultError::Io { source, .. } if source.kind() == ErrorKind::AlreadyExists => {
                    VaultError::AlreadyExists(resolved.id.clone())
                }
                other => other,
            }
        })?;
        tracing::info!(note = %resolved.id, ?mode, "note written");

        Note::load(&resolved, self.lowercase_tags)
    }

    /// Merge `patch` into the frontmatter and optionally replace the body.
    pub fn update(&self, id: &str, body: Option<&str>, patch: Option<Mapping>) -> Result<Note> {
        let resolved = self.paths.resolve(id)?;
        let lock = self.locks.handle(&resolved.relative);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let (mut fields, old_body) = self.load_structured(&resolved)?;
        if let Some(patch) = patch {
            frontmatter::merge(&mut fields, patch);
        }
        let body = body.map(String::from).unwrap_or(old_body);

        write_atomic(&resolved.absolute, &render(&resolved, &fields, &body)?, false)?;
        tracing::info!(note = %resolved.id, "note updated");
        Note::load(&resolved, self.lowercase_tags)
    }

    /// Remove a note permanently.
    pub fn delete(&self, id: &str) -> Result<()> {
        let resolved = self.paths.resolve(id)?;
        let lock = self.locks.handle(&resolved.relative);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        if !resolved.absolute.is_file() {
            return Err(VaultError::NotFound(resolved.id));
        }
        fs::remove_file(&resolved.absolute).map_err(|e| VaultError::io(&resolved.absolute, e))?;
        tracing::info!(note = %resolved.id, "note deleted");
        Ok(())
    }

    /// Rename a note. Refuses to overwrite an existing target.
    pub fn move_note(&self, from: &str, to: &str) -> Result<Note> {
        let source = self.paths.resolve(from)?;
        let target = self.paths.resolve(to)?;
        if source.relative == target.relative {
            return Note::load(&source, self.lowercase_tags);
        }

        // Fixed acquisition order so two opposite moves cannot deadlock.
        let (first, second) = if source.relative < target.relative {
            (&source, &target)
        } else {
            (&target, &source)
        };
        let first_lock = self.locks.handle(&first.relative);
        let _first = first_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let second_lock = self.locks.handle(&second.relative);
        let _second = second_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if !source.absolute.is_file() {
            return Err(VaultError::NotFound(source.id));
        }
        if target.absolute.exists() {
            return Err(VaultError::AlreadyExists(target.id));
        }
        if let Some(parent) = target.absolute.parent() {
            fs::create_dir_all(parent).map_err(|e| VaultError::io(parent, e))?;
        }
        fs::rename(&source.absolute, &target.absolute)
            .map_err(|e| VaultError::io(&source.absolute, e))?;
        tracing::info!(from = %source.id, to = %target.id, "note moved");

        Note::load(&target, self.lowercase_tags)
    }

    /// Every note identity in the vault, sorted.
    pub fn list(&self) -> Vec<String> {
        let root = &self.paths.root;
        let mut ids: Vec<String> = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || self
                        .paths
                        .relative(entry.path())
                        .map(|rel| !self.paths.is_excluded(&rel))
                        .unwrap_or(false)
            })
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable vault entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| self.paths.relative(entry.path()))
            .filter(|rel| has_note_extension(rel))
            .map(|rel| note_id(&rel))
            .collect();

        ids.sort();
        ids
    }

    pub fn normalize_tag(&self, tag: &str) -> Result<String> {
        frontmatter::normalize_tag(tag, self.lowercase_tags)
            .ok_or_else(|| VaultError::InvalidTag(tag.to_string()))
    }

    /// Add a tag to the frontmatter. Adding a present tag changes nothing.
    pub fn add_tag(&self, id: &str, tag: &str) -> Result<TagChange> {
        let tag = self.normalize_tag(tag)?;
        self.mutate_tags(id, &tag, |tags| {
            if tags.contains(&tag) {
                false
            } else {
                tags.push(tag.clone());
                true
            }
        })
    }

    /// Remove a tag from the frontmatter. Removing an absent tag changes nothing.
    pub fn remove_tag(&self, id: &str, tag: &str) -> Result<TagChange> {
        let tag = self.normalize_tag(tag)?;
        self.mutate_tags(id, &tag, |tags| {
            let before = tags.len();
            tags.retain(|t| t != &tag);
            tags.len() != before
        })
    }

    fn mutate_tags(
        &self,
        id: &str,
        tag: &str,
        change: impl FnOnce(&mut Vec<String>) -> bool,
    ) -> Result<TagChange> {
        let resolved = self.paths.resolve(id)?;
        let lock = self.locks.handle(&resolved.relative);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let (mut fields, body) = self.load_structured(&resolved)?;
        let mut tags = frontmatter::tags_from(&fields, self.lowercase_tags);
        let changed = change(&mut tags);
        if changed {
            frontmatter::set_tags(&mut fields, tags.clone());
            write_atomic(&resolved.absolute, &render(&resolved, &fields, &body)?, false)?;
            tracing::info!(note = %resolved.id, tag, "tags updated");
        }

        Ok(TagChange {
            note: resolved.id,
            tag: tag.to_string(),
            changed,
            tags,
        })
    }

    pub fn sections(&self, id: &str) -> Result<Vec<SectionInfo>> {
        let note = self.read(id)?;
        Ok(sections::parse_sections(&note.body)
            .iter()
            .map(SectionInfo::from)
            .collect())
    }

    pub fn read_section(&self, id: &str, heading: &str) -> Result<SectionContent> {
        let note = self.read(id)?;
        let parsed = sections::parse_sections(&note.body);
        let index = sections::find_section(&parsed, heading).ok_or_else(|| {
            VaultError::SectionNotFound {
                id: note.id.clone(),
                heading: heading.to_string(),
            }
        })?;
        let section = &parsed[index];
        Ok(SectionContent {
            heading: section.heading.clone(),
            level: section.level,
            content: section.content.clone(),
        })
    }

    /// Replace the content under a heading; the heading line is kept.
    pub fn update_section(&self, id: &str, heading: &str, content: &str) -> Result<Note> {
        let resolved = self.paths.resolve(id)?;
        let lock = self.locks.handle(&resolved.relative);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let (fields, body) = self.load_structured(&resolved)?;
        let mut parsed = sections::parse_sections(&body);
        let index = sections::find_section(&parsed, heading).ok_or_else(|| {
            VaultError::SectionNotFound {
                id: resolved.id.clone(),
                heading: heading.to_string(),
            }
        })?;
        sections::replace_content(&mut parsed, index, content);
        let body = sections::reconstruct(&parsed);

        write_atomic(&resolved.absolute, &render(&resolved, &fields, &body)?, false)?;
        tracing::info!(note = %resolved.id, heading, "section updated");
        Note::load(&resolved, self.lowercase_tags)
    }

    /// Frontmatter and body of an existing note; malformed headers are fatal here.
    fn load_structured(&self, resolved: &ResolvedPath) -> Result<(Mapping, String)> {
        let content = fs::read_to_string(&resolved.absolute).map_err(|e| match e.kind() {
            ErrorKind::NotFound => VaultError::NotFound(resolved.id.clone()),
            _ => VaultError::io(&resolved.absolute, e),
        })?;
        let (fields, body) = frontmatter::parse(&content).map_err(|e| VaultError::Parse {
            id: resolved.id.clone(),
            message: e.to_string(),
        })?;
        Ok((fields, body.to_string()))
    }
}

fn render(resolved: &ResolvedPath, fields: &Mapping, body: &str) -> Result<String> {
    frontmatter::serialize(fields, body).map_err(|e| VaultError::Parse {
        id: resolved.id.clone(),
        message: e.to_string(),
    })
}

fn append_body(old: &str, addition: &str) -> String {
    let head = old.trim_end();
    if head.is_empty() {
        addition.to_string()
    } else {
        format!("{}\n\n{}", head, addition)
    }
}

fn prepend_body(old: &str, addition: &str) -> String {
    let tail = old.trim_start_matches(['\n', '\r']);
    if tail.is_empty() {
        addition.to_string()
    } else {
        format!("{}\n\n{}", addition.trim_end(), tail)
    }
}

/// Write `content` to `path` through a sibling temporary file.
pub(crate) fn write_atomic(path: &Path, content: &str, no_clobber: bool) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| VaultError::invalid_path(path.to_string_lossy(), "no parent directory"))?;
    fs::create_dir_all(parent).map_err(|e| VaultError::io(parent, e))?;

    let existing = fs::metadata(path).ok().map(|m| m.permissions());
    let mut tmp = temp_builder(existing.is_none())
        .tempfile_in(parent)
        .map_err(|e| VaultError::io(parent, e))?;
    if let Some(permissions) = existing {
        tmp.as_file()
            .set_permissions(permissions)
            .map_err(|e| VaultError::io(tmp.path(), e))?;
    }
    tmp.write_all(content.as_bytes())
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| VaultError::io(tmp.path(), e))?;

    let persisted = if no_clobber {
        tmp.persist_noclobber(path)
    } else {
        tmp.persist(path)
    };
    persisted.map_err(|e| VaultError::io(path, e.error))?;
    Ok(())
}

/// Temp files default to 0600; a new note gets the umask-derived mode instead.
#[cfg(unix)]
fn temp_builder(new_file: bool) -> Builder<'static, 'static> {
    use std::os::unix::fs::PermissionsExt;

    let mut builder = Builder::new();
    if new_file {
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    builder
}

#[cfg(not(unix))]
fn temp_builder(_new_file: bool) -> Builder<'static, 'static> {
    Builder::new()
}
