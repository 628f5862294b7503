pub mod links;
pub mod note;
pub mod search;
pub mod status;
pub mod tags;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use obsidian_vault::core::config::{VaultConfig, DEFAULT_EXCLUDE_PATTERNS, DEFAULT_TEMPLATE_DIR};
use obsidian_vault::Vault;

/// Vault settings shared by every command.
#[derive(Args, Debug, Clone)]
pub struct VaultArgs {
    /// Vault root (defaults to the current directory)
    #[arg(long, global = true, env = "OBSIDIAN_VAULT_PATH")]
    pub vault: Option<PathBuf>,

    /// Template folder, relative to the vault root
    #[arg(long, global = true, env = "OBSIDIAN_TEMPLATE_DIR", default_value = DEFAULT_TEMPLATE_DIR)]
    pub template_dir: String,

    /// Comma separated folders or globs hidden from every operation
    #[arg(long, global = true, env = "OBSIDIAN_EXCLUDE_PATTERNS", default_value = DEFAULT_EXCLUDE_PATTERNS)]
    pub exclude: String,

    /// Lowercase tags when normalizing
    #[arg(long, global = true, env = "OBSIDIAN_LOWERCASE_TAGS")]
    pub lowercase_tags: bool,

    /// Disable the case-insensitive fallback when resolving links
    #[arg(long, global = true, env = "OBSIDIAN_CASE_SENSITIVE_LINKS")]
    pub case_sensitive_links: bool,

    /// Log filter used when RUST_LOG is unset (e.g. "debug")
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

impl VaultArgs {
    pub fn config(&self) -> Result<VaultConfig> {
        let root = match &self.vault {
            Some(path) => path.clone(),
            None => std::env::current_dir().context("Failed to read current directory")?,
        };
        Ok(VaultConfig::new(&root)?
            .with_template_dir(self.template_dir.as_str())
            .with_exclude_patterns(&self.exclude)
            .with_lowercase_tags(self.lowercase_tags)
            .with_case_insensitive_links(!self.case_sensitive_links))
    }

    pub fn open(&self) -> Result<Vault> {
        Ok(Vault::open(self.config()?)?)
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
