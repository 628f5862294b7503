//! Link graph derived from the current vault contents.
//!
//! Nothing here is persisted: a query scans the vault, resolves references
//! against the scanned identities and builds the adjacency in one pass.

pub mod index;
pub mod resolve;
pub mod scan;
pub mod traversal;

pub use index::{GraphEdge, GraphIndex, LinkReport, TagCount, TagIndex, VaultGraph};
pub use resolve::LinkResolver;
pub use scan::{ScanWarning, ScannedNote, VaultScan};
pub use traversal::{connections, ConnectionGraph, ConnectionNode, MAX_DEPTH};
