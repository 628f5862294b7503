use std::path::{Path, PathBuf};

use super::error::{Result, VaultError};

pub const DEFAULT_TEMPLATE_DIR: &str = "Templates";
pub const DEFAULT_EXCLUDE_PATTERNS: &str = ".obsidian,.trash";
pub const NOTE_EXTENSION: &str = "md";

/// Process-wide vault settings. Built once at startup, never mutated.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Canonicalized vault root.
    pub root: PathBuf,
    /// Template folder, relative to `root`.
    pub template_dir: String,
    pub exclude_patterns: Vec<String>,
    /// Lowercase tags when normalizing.
    pub lowercase_tags: bool,
    /// Fall back to case-insensitive matching when resolving link targets.
    pub case_insensitive_links: bool,
}

impl VaultConfig {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(VaultError::Config(format!(
                "vault path is not a directory: {}",
                root.display()
            )));
        }
        let root = root
            .canonicalize()
            .map_err(|e| VaultError::io(root.to_path_buf(), e))?;

        Ok(Self {
            root,
            template_dir: DEFAULT_TEMPLATE_DIR.to_string(),
            exclude_patterns: parse_patterns(DEFAULT_EXCLUDE_PATTERNS),
            lowercase_tags: false,
            case_insensitive_links: true,
        })
    }

    pub fn with_template_dir(mut self, template_dir: impl Into<String>) -> Self {
        let dir: String = template_dir.into();
        self.template_dir = dir.replace('\\', "/").trim_matches('/').to_string();
        self
    }

    pub fn with_exclude_patterns(mut self, patterns: &str) -> Self {
        self.exclude_patterns = parse_patterns(patterns);
        self
    }

    pub fn with_lowercase_tags(mut self, lowercase: bool) -> Self {
        self.lowercase_tags = lowercase;
        self
    }

    pub fn with_case_insensitive_links(mut self, enabled: bool) -> Self {
        self.case_insensitive_links = enabled;
        self
    }
}

/// Split a comma-separated pattern list, dropping blanks and edge slashes.
pub fn parse_patterns(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|p| p.trim().replace('\\', "/").trim_matches('/').to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_patterns() {
        assert_eq!(
            parse_patterns(" .obsidian , .trash/,, archive/**"),
            vec![".obsidian", ".trash", "archive/**"]
        );
        assert!(parse_patterns("").is_empty());
    }

    #[test]
    fn test_missing_root_is_config_error() {
        let err = VaultConfig::new("/definitely/not/a/vault").unwrap_err();
        assert_eq!(err.kind(), "ConfigError");
    }

    #[test]
    fn test_defaults() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let config = VaultConfig::new(dir.path())?.with_template_dir("/Tpl/");
        assert_eq!(config.template_dir, "Tpl");
        assert_eq!(config.exclude_patterns, vec![".obsidian", ".trash"]);
        assert!(config.case_insensitive_links);
        assert!(!config.lowercase_tags);
        Ok(())
    }
}
