//! Vault core: path resolution, note storage and reference extraction.

pub mod config;
pub mod error;
pub mod frontmatter;
pub mod links;
pub mod note;
pub mod paths;
pub mod sections;
pub mod store;
pub mod template;
