//! obsidian-vault library
//!
//! Safe access to an Obsidian vault on disk and a link graph built over it.
//!
//! # Modules
//!
//! - `core`: Vault paths, notes, frontmatter, sections, templates and the note store
//! - `graph`: Vault scan, link resolution, backlink/tag indexes and traversal
//! - `search`: Full-text, tag and frontmatter search
//! - `vault`: The `Vault` facade every caller goes through
//! - `mcp`: MCP tool server over stdio (feature `mcp`)

pub mod core;
pub mod graph;
pub mod logging;
#[cfg(feature = "mcp")]
pub mod mcp;
pub mod search;
pub mod vault;

// Re-exports for convenience
pub use core::config::VaultConfig;
pub use core::error::{Result, VaultError};
pub use core::note::Note;
pub use core::store::WriteMode;
pub use vault::{NewNote, Vault};
