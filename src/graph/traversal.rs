use std::collections::BTreeSet;

use serde::Serialize;

use super::index::{GraphEdge, GraphIndex};

/// Upper bound on traversal depth.
pub const MAX_DEPTH: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionNode {
    pub id: String,
    pub distance: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionGraph {
    pub root: String,
    pub depth: usize,
    /// Ordered by distance, then identity.
    pub nodes: Vec<ConnectionNode>,
    pub edges: Vec<GraphEdge>,
}

impl ConnectionGraph {
    pub fn ids(&self) -> BTreeSet<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }
}

/// Breadth-first expansion from `root` along links in both directions.
///
/// The link graph may contain cycles; the visited set guarantees every note is
/// expanded at most once. Each frontier is processed in identity order.
pub fn connections(index: &GraphIndex, root: &str, depth: usize) -> ConnectionGraph {
    let depth = depth.min(MAX_DEPTH);

    let mut visited: BTreeSet<String> = BTreeSet::new();
    visited.insert(root.to_string());
    let mut nodes = vec![ConnectionNode {
        id: root.to_string(),
        distance: 0,
    }];
    let mut frontier: Vec<String> = vec![root.to_string()];

    for distance in 1..=depth {
        let next: BTreeSet<String> = frontier
            .iter()
            .flat_map(|id| index.neighbors(id))
            .filter(|n| !visited.contains(*n))
            .cloned()
            .collect();
        if next.is_empty() {
            break;
        }

        for id in &next {
            visited.insert(id.clone());
            nodes.push(ConnectionNode {
                id: id.clone(),
                distance,
            });
        }
        frontier = next.into_iter().collect();
    }

    ConnectionGraph {
        root: root.to_string(),
        depth,
        edges: index.edges_within(&visited),
        nodes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::VaultConfig;
    use crate::core::store::NoteStore;
    use crate::graph::resolve::LinkResolver;
    use crate::graph::scan::VaultScan;
    use anyhow::Result;
    use std::fs;

    fn index(files: &[(&str, &str)]) -> Result<GraphIndex> {
        let dir = tempfile::tempdir()?;
        for (name, content) in files {
            fs::write(dir.path().join(name), content)?;
        }
        let store = NoteStore::new(&VaultConfig::new(dir.path())?)?;
        let scan = VaultScan::collect(&store);
        Ok(GraphIndex::build(&scan, &LinkResolver::new(scan.ids(), true)))
    }

    #[test]
    fn test_cycle_terminates() -> Result<()> {
        let index = index(&[("A.md", "[[B]]"), ("B.md", "[[A]]")])?;
        let graph = connections(&index, "A", 5);
        assert_eq!(graph.ids(), BTreeSet::from(["A", "B"]));
        assert_eq!(graph.edges.len(), 2);
        Ok(())
    }

    #[test]
    fn test_depth_bounds_and_order() -> Result<()> {
        let index = index(&[
            ("hub.md", "[[zeta]] [[alpha]]"),
            ("alpha.md", "[[far]]"),
            ("zeta.md", ""),
            ("far.md", "[[farther]]"),
            ("farther.md", ""),
            ("inbound.md", "[[hub]]"),
        ])?;

        let graph = connections(&index, "hub", 1);
        let order: Vec<(&str, usize)> = graph.nodes.iter().map(|n| (n.id.as_str(), n.distance)).collect();
        assert_eq!(order, vec![("hub", 0), ("alpha", 1), ("inbound", 1), ("zeta", 1)]);

        let graph = connections(&index, "hub", 2);
        assert!(graph.ids().contains("far"));
        assert!(!graph.ids().contains("farther"));

        let graph = connections(&index, "hub", 0);
        assert_eq!(graph.nodes.len(), 1);
        assert!(graph.edges.is_empty());

        assert_eq!(connections(&index, "hub", 99).depth, MAX_DEPTH);
        Ok(())
    }
}
