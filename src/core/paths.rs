//! Path resolution for the vault.
//!
//! Every filesystem path the crate touches is built here. Identifiers are
//! normalized as follows:
//!
//! - surrounding whitespace is trimmed and `\` becomes `/`
//! - empty identifiers, NUL bytes, absolute paths (`/x`, `C:x`) and any `..`
//!   segment are rejected
//! - empty and `.` segments are dropped
//! - case is preserved
//! - `.md` is appended unless the path already ends with it or names an
//!   existing file exactly
//!
//! The result must not match an exclusion pattern and must not escape the
//! canonical root through a symlink. Exclusions compare case-insensitively,
//! so `.Obsidian/x` is hidden by `.obsidian` on case-folding filesystems too.

use std::fs;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};

use super::config::{VaultConfig, NOTE_EXTENSION};
use super::error::{Result, VaultError};

pub const CONFIG_FILE_NAME: &str = ".obsidian-mcp.json";

const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone)]
enum Exclusion {
    Prefix(Vec<String>),
    Glob(Pattern),
}

impl Exclusion {
    fn parse(raw: &str) -> Result<Self> {
        if raw.contains(['*', '?', '[']) {
            Pattern::new(raw)
                .map(Exclusion::Glob)
                .map_err(|e| VaultError::Config(format!("bad exclusion pattern '{}': {}", raw, e)))
        } else {
            Ok(Exclusion::Prefix(raw.split('/').map(str::to_lowercase).collect()))
        }
    }

    fn matches(&self, segments: &[&str]) -> bool {
        match self {
            Exclusion::Prefix(prefix) => {
                segments.len() >= prefix.len()
                    && prefix.iter().zip(segments).all(|(p, s)| *p == s.to_lowercase())
            }
            Exclusion::Glob(pattern) => (1..=segments.len())
                .any(|n| pattern.matches_with(&segments[..n].join("/"), GLOB_OPTIONS)),
        }
    }
}

/// A validated location of a note inside the vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Logical identity, e.g. `daily/2024-01-01`.
    pub id: String,
    /// Path relative to the root, e.g. `daily/2024-01-01.md`.
    pub relative: String,
    pub absolute: PathBuf,
}

pub struct VaultPaths {
    pub root: PathBuf,
    pub templates: PathBuf,
    pub config_file: PathBuf,
    template_dir: String,
    exclusions: Vec<Exclusion>,
}

impl VaultPaths {
    pub fn from_config(config: &VaultConfig) -> Result<Self> {
        let exclusions = config
            .exclude_patterns
            .iter()
            .map(|p| Exclusion::parse(p))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            templates: config.root.join(&config.template_dir),
            config_file: config.root.join(CONFIG_FILE_NAME),
            template_dir: config.template_dir.clone(),
            root: config.root.clone(),
            exclusions,
        })
    }

    /// Map a logical identifier to a note path inside the vault.
    pub fn resolve(&self, identifier: &str) -> Result<ResolvedPath> {
        let normalized = normalize_identifier(identifier)?;

        let relative = if has_note_extension(&normalized) || self.root.join(&normalized).is_file() {
            normalized
        } else {
            format!("{}.{}", normalized, NOTE_EXTENSION)
        };

        if self.is_excluded(&relative) {
            return Err(VaultError::invalid_path(identifier, "path is excluded"));
        }

        let absolute = self.root.join(&relative);
        self.ensure_inside(identifier, &absolute)?;

        Ok(ResolvedPath {
            id: note_id(&relative),
            relative,
            absolute,
        })
    }

    /// Validate a folder path. An empty folder means the root itself.
    pub fn resolve_dir(&self, folder: &str) -> Result<(String, PathBuf)> {
        let trimmed = folder.trim().replace('\\', "/");
        let trimmed = trimmed.trim_matches('/');
        if trimmed.is_empty() || trimmed == "." {
            return Ok((String::new(), self.root.clone()));
        }

        let normalized = normalize_identifier(trimmed)?;
        if self.is_excluded(&normalized) {
            return Err(VaultError::invalid_path(folder, "path is excluded"));
        }
        let absolute = self.root.join(&normalized);
        self.ensure_inside(folder, &absolute)?;
        Ok((normalized, absolute))
    }

    /// Location of a template file by name, `.md` optional.
    pub fn template_path(&self, name: &str) -> Result<PathBuf> {
        let normalized = normalize_identifier(name)?;
        let file = if has_note_extension(&normalized) {
            normalized
        } else {
            format!("{}.{}", normalized, NOTE_EXTENSION)
        };
        let absolute = self.templates.join(file);
        self.ensure_inside(name, &absolute)?;
        Ok(absolute)
    }

    pub fn template_dir(&self) -> &str {
        &self.template_dir
    }

    pub fn is_excluded(&self, relative: &str) -> bool {
        let segments: Vec<&str> = relative.split('/').filter(|s| !s.is_empty()).collect();
        !segments.is_empty() && self.exclusions.iter().any(|e| e.matches(&segments))
    }

    /// Slash-separated path of `absolute` relative to the root.
    pub fn relative(&self, absolute: &Path) -> Option<String> {
        let rel = absolute.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        Some(parts.join("/"))
    }

    fn ensure_inside(&self, identifier: &str, absolute: &Path) -> Result<()> {
        let existing = absolute
            .ancestors()
            .find(|p| fs::symlink_metadata(p).is_ok())
            .unwrap_or(self.root.as_path());

        let canonical = existing
            .canonicalize()
            .map_err(|_| VaultError::invalid_path(identifier, "unresolvable symlink"))?;

        if canonical.starts_with(&self.root) {
            Ok(())
        } else {
            Err(VaultError::invalid_path(identifier, "path escapes the vault root"))
        }
    }
}

fn normalize_identifier(identifier: &str) -> Result<String> {
    let cleaned = identifier.trim().replace('\\', "/");

    if cleaned.is_empty() {
        return Err(VaultError::invalid_path(identifier, "empty identifier"));
    }
    if cleaned.contains('\0') {
        return Err(VaultError::invalid_path(identifier, "NUL byte in identifier"));
    }
    if cleaned.starts_with('/') || has_drive_prefix(&cleaned) {
        return Err(VaultError::invalid_path(identifier, "absolute paths are not allowed"));
    }

    let mut segments = Vec::new();
    for segment in cleaned.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(VaultError::invalid_path(identifier, "parent traversal is not allowed"))
            }
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        return Err(VaultError::invalid_path(identifier, "empty identifier"));
    }
    Ok(segments.join("/"))
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

pub fn has_note_extension(path: &str) -> bool {
    path.len() > NOTE_EXTENSION.len() + 1
        && path.ends_with(NOTE_EXTENSION)
        && path[..path.len() - NOTE_EXTENSION.len()].ends_with('.')
}

/// Logical identity for a relative file path: the path without `.md`.
pub fn note_id(relative: &str) -> String {
    if has_note_extension(relative) {
        relative[..relative.len() - NOTE_EXTENSION.len() - 1].to_string()
    } else {
        relative.to_string()
    }
}
