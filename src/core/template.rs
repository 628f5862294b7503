//! Note templates.
//!
//! Templates are markdown files under the configured template folder. `{{key}}`
//! placeholders are replaced by caller variables; `date`, `time` and `title`
//! have defaults. Folders can be mapped to a template in the vault's
//! `.obsidian-mcp.json` under `folder_templates`; keys may use `*` (one
//! segment) and `**` (any number of segments).

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;

use chrono::Local;
use glob::Pattern;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use super::error::{Result, VaultError};
use super::paths::{has_note_extension, VaultPaths};
use super::store::write_atomic;

lazy_static! {
    static ref PLACEHOLDER_RE: Regex = Regex::new(r"\{\{\s*([\w.\-]+)\s*\}\}").unwrap();
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct McpConfigFile {
    #[serde(default)]
    folder_templates: BTreeMap<String, String>,
    #[serde(flatten)]
    other: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FolderTemplate {
    pub folder: String,
    pub template: String,
}

/// Substitute `{{key}}` placeholders. Unknown keys stay as written.
pub fn render(template: &str, variables: &BTreeMap<String, String>) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures| {
            let key = &caps[1];
            variables
                .get(key)
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Caller variables over the built-in `date`, `time` and `title`.
pub fn with_defaults(title: &str, variables: Option<BTreeMap<String, String>>) -> BTreeMap<String, String> {
    let now = Local::now();
    let mut merged = BTreeMap::from([
        ("date".to_string(), now.format("%Y-%m-%d").to_string()),
        ("time".to_string(), now.format("%H:%M").to_string()),
        ("title".to_string(), title.to_string()),
    ]);
    merged.extend(variables.unwrap_or_default());
    merged
}

pub fn list_templates(paths: &VaultPaths) -> Vec<String> {
    if !paths.templates.is_dir() {
        return Vec::new();
    }
    let mut templates: Vec<String> = WalkDir::new(&paths.templates)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let rel = e.path().strip_prefix(&paths.templates).ok()?;
            let rel = rel.to_string_lossy().replace('\\', "/");
            has_note_extension(&rel).then_some(rel)
        })
        .collect();
    templates.sort();
    templates
}

pub fn load_template(paths: &VaultPaths, name: &str) -> Result<String> {
    let path = paths.template_path(name)?;
    fs::read_to_string(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => VaultError::TemplateNotFound(name.to_string()),
        _ => VaultError::io(&path, e),
    })
}

pub fn list_folder_templates(paths: &VaultPaths) -> Result<BTreeMap<String, String>> {
    Ok(load_config(paths)?.folder_templates)
}

/// Template for a folder: exact mapping, then the most specific wildcard,
/// then the nearest mapped parent.
pub fn folder_template(paths: &VaultPaths, folder: &str) -> Result<Option<String>> {
    let mapping = load_config(paths)?.folder_templates;
    let folder = normalize_folder(folder);

    if let Some(template) = mapping.get(&folder) {
        return Ok(Some(template.clone()));
    }

    let parts: Vec<&str> = folder.split('/').collect();
    let best = mapping
        .iter()
        .filter(|(pattern, _)| pattern.contains(['*', '?']))
        .filter(|(pattern, _)| {
            let pattern_parts: Vec<&str> = pattern.split('/').collect();
            match_segments(&parts, &pattern_parts)
        })
        .max_by_key(|(pattern, _)| specificity(pattern));
    if let Some((_, template)) = best {
        return Ok(Some(template.clone()));
    }

    for end in (1..parts.len()).rev() {
        if let Some(template) = mapping.get(&parts[..end].join("/")) {
            return Ok(Some(template.clone()));
        }
    }
    Ok(None)
}

/// Read-modify-write of the config file; `Vault` runs it under the config lock.
pub fn set_folder_template(paths: &VaultPaths, folder: &str, template: &str) -> Result<FolderTemplate> {
    if !paths.template_path(template)?.is_file() {
        return Err(VaultError::TemplateNotFound(template.to_string()));
    }
    let folder = normalize_folder(folder);
    let mut config = load_config(paths)?;
    config
        .folder_templates
        .insert(folder.clone(), template.to_string());
    save_config(paths, &config)?;

    Ok(FolderTemplate {
        folder,
        template: template.to_string(),
    })
}

pub fn remove_folder_template(paths: &VaultPaths, folder: &str) -> Result<FolderTemplate> {
    let folder = normalize_folder(folder);
    let mut config = load_config(paths)?;
    let template = config
        .folder_templates
        .remove(&folder)
        .ok_or_else(|| VaultError::MappingNotFound(folder.clone()))?;
    save_config(paths, &config)?;

    Ok(FolderTemplate { folder, template })
}

fn normalize_folder(folder: &str) -> String {
    folder.trim().replace('\\', "/").trim_matches('/').to_string()
}

fn load_config(paths: &VaultPaths) -> Result<McpConfigFile> {
    let text = match fs::read_to_string(&paths.config_file) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(McpConfigFile::default()),
        Err(e) => return Err(VaultError::io(&paths.config_file, e)),
    };
    serde_json::from_str(&text).map_err(|e| {
        VaultError::Config(format!("{}: {}", paths.config_file.display(), e))
    })
}

fn save_config(paths: &VaultPaths, config: &McpConfigFile) -> Result<()> {
    let text = serde_json::to_string_pretty(config)
        .map_err(|e| VaultError::Config(e.to_string()))?;
    write_atomic(&paths.config_file, &text, false)
}

fn match_segments(folder: &[&str], pattern: &[&str]) -> bool {
    match pattern.split_first() {
        None => folder.is_empty(),
        Some((&"**", rest)) => (0..=folder.len()).any(|i| match_segments(&folder[i..], rest)),
        Some((head, rest)) => match folder.split_first() {
            Some((segment, remaining)) => {
                Pattern::new(head)
                    .map(|p| p.matches(segment))
                    .unwrap_or(false)
                    && match_segments(remaining, rest)
            }
            None => false,
        },
    }
}

/// (total segments, literal segments)
fn specificity(pattern: &str) -> (usize, usize) {
    let parts: Vec<&str> = pattern.split('/').collect();
    let literal = parts.iter().filter(|p| !p.contains(['*', '?'])).count();
    (parts.len(), literal)
}
