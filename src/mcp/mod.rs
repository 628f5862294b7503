//! MCP Server for an Obsidian vault
//!
//! Exposes note, tag, search, graph and template operations as MCP tools.

mod server;

pub use server::{run_mcp_server, VaultService};
