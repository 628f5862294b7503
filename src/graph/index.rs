use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::resolve::LinkResolver;
use super::scan::VaultScan;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VaultGraph {
    pub nodes: Vec<String>,
    pub edges: Vec<GraphEdge>,
    pub node_count: usize,
    pub edge_count: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LinkReport {
    pub total_links: usize,
    pub resolved_links: usize,
    pub unresolved_links: usize,
    /// Raw targets that matched no note, per source note.
    pub unresolved_by_note: BTreeMap<String, Vec<String>>,
    /// Notes with neither inbound nor outbound links.
    pub orphans: Vec<String>,
}

/// Bidirectional adjacency between notes, built from one scan.
///
/// Every resolved reference A -> B appears as B in `outgoing[A]` and as A in
/// `incoming[B]`. A note linking to itself keeps the reference but gets no
/// edge.
#[derive(Debug, Default)]
pub struct GraphIndex {
    notes: BTreeSet<String>,
    outgoing: BTreeMap<String, BTreeSet<String>>,
    incoming: BTreeMap<String, BTreeSet<String>>,
    unresolved: BTreeMap<String, Vec<String>>,
    total_links: usize,
    resolved_links: usize,
}

impl GraphIndex {
    pub fn build(scan: &VaultScan, resolver: &LinkResolver) -> Self {
        let mut index = Self::default();

        for scanned in &scan.notes {
            let source = &scanned.note.id;
            index.notes.insert(source.clone());

            for reference in scanned.references.iter().filter(|r| r.is_note_link()) {
                index.total_links += 1;
                match resolver.resolve(reference, source) {
                    Some(target) => {
                        index.resolved_links += 1;
                        if &target != source {
                            index.add_edge(source, &target);
                        }
                    }
                    None => {
                        let broken = index.unresolved.entry(source.clone()).or_default();
                        if !broken.contains(&reference.raw) {
                            broken.push(reference.raw.clone());
                        }
                    }
                }
            }
        }

        tracing::debug!(
            notes = index.notes.len(),
            edges = index.edge_count(),
            unresolved = index.total_links - index.resolved_links,
            "link graph built"
        );
        index
    }

    fn add_edge(&mut self, from: &str, to: &str) {
        self.outgoing
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
        self.incoming
            .entry(to.to_string())
            .or_default()
            .insert(from.to_string());
    }

    pub fn contains(&self, id: &str) -> bool {
        self.notes.contains(id)
    }

    /// Notes with a resolved reference to `id`, sorted.
    pub fn backlinks(&self, id: &str) -> Vec<String> {
        self.incoming
            .get(id)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Notes `id` links to, sorted.
    pub fn forward_links(&self, id: &str) -> Vec<String> {
        self.outgoing
            .get(id)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Outbound and inbound neighbours of `id`.
    pub fn neighbors<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a String> + 'a {
        let outgoing = self.outgoing.get(id).into_iter().flatten();
        let incoming = self.incoming.get(id).into_iter().flatten();
        outgoing.chain(incoming)
    }

    pub fn edge_count(&self) -> usize {
        self.outgoing.values().map(BTreeSet::len).sum()
    }

    pub fn edges(&self) -> Vec<GraphEdge> {
        self.outgoing
            .iter()
            .flat_map(|(from, targets)| {
                targets.iter().map(move |to| GraphEdge {
                    from: from.clone(),
                    to: to.clone(),
                })
            })
            .collect()
    }

    /// Edges with both ends in `nodes`, sorted.
    pub fn edges_within(&self, nodes: &BTreeSet<String>) -> Vec<GraphEdge> {
        nodes
            .iter()
            .filter_map(|from| self.outgoing.get(from).map(|targets| (from, targets)))
            .flat_map(|(from, targets)| {
                targets
                    .iter()
                    .filter(|to| nodes.contains(*to))
                    .map(move |to| GraphEdge {
                        from: from.clone(),
                        to: to.clone(),
                    })
            })
            .collect()
    }

    pub fn graph(&self) -> VaultGraph {
        let edges = self.edges();
        VaultGraph {
            nodes: self.notes.iter().cloned().collect(),
            node_count: self.notes.len(),
            edge_count: edges.len(),
            edges,
        }
    }

    pub fn total_links(&self) -> usize {
        self.total_links
    }

    pub fn resolved_links(&self) -> usize {
        self.resolved_links
    }

    pub fn link_report(&self) -> LinkReport {
        let orphans = self
            .notes
            .iter()
            .filter(|id| !self.outgoing.contains_key(*id) && !self.incoming.contains_key(*id))
            .cloned()
            .collect();

        LinkReport {
            total_links: self.total_links,
            resolved_links: self.resolved_links,
            unresolved_links: self.total_links - self.resolved_links,
            unresolved_by_note: self.unresolved.clone(),
            orphans,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

/// Normalized tag -> notes carrying it, from the same scan as the graph.
#[derive(Debug, Default)]
pub struct TagIndex {
    tags: BTreeMap<String, BTreeSet<String>>,
}

impl TagIndex {
    pub fn build(scan: &VaultScan) -> Self {
        let mut index = Self::default();
        for scanned in &scan.notes {
            for tag in &scanned.note.tags {
                index
                    .tags
                    .entry(tag.clone())
                    .or_default()
                    .insert(scanned.note.id.clone());
            }
        }
        index
    }

    /// Notes carrying `tag` exactly, sorted.
    pub fn notes(&self, tag: &str) -> Vec<String> {
        self.tags
            .get(tag)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every tag with its note count, most used first.
    pub fn counts(&self) -> Vec<TagCount> {
        let mut counts: Vec<TagCount> = self
            .tags
            .iter()
            .map(|(tag, notes)| TagCount {
                tag: tag.clone(),
                count: notes.len(),
            })
            .collect();
        counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
        counts
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::VaultConfig;
    use crate::core::store::NoteStore;
    use anyhow::Result;
    use std::fs;

    fn build(files: &[(&str, &str)]) -> Result<(tempfile::TempDir, VaultScan, GraphIndex)> {
        let dir = tempfile::tempdir()?;
        for (path, content) in files {
            let path = dir.path().join(path);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, content)?;
        }
        let store = NoteStore::new(&VaultConfig::new(dir.path())?)?;
        let scan = VaultScan::collect(&store);
        let resolver = LinkResolver::new(scan.ids(), true);
        let index = GraphIndex::build(&scan, &resolver);
        Ok((dir, scan, index))
    }

    #[test]
    fn test_backlinks_invert_forward_links() -> Result<()> {
        let (_dir, _scan, index) = build(&[
            ("a.md", "[[b]] [[c]] [[b|again]] [[nowhere]]"),
            ("b.md", "[c](c.md) [[a]]"),
            ("c.md", "[[c]] #solo"),
        ])?;

        assert_eq!(index.forward_links("a"), vec!["b", "c"]);
        assert_eq!(index.backlinks("c"), vec!["a", "b"]);
        for from in ["a", "b", "c"] {
            for to in index.forward_links(from) {
                assert!(index.backlinks(&to).contains(&from.to_string()));
            }
        }
        // Self links count as resolved but add no edge.
        assert!(index.forward_links("c").is_empty());
        assert_eq!(index.edge_count(), 4);
        Ok(())
    }

    #[test]
    fn test_link_report() -> Result<()> {
        let (_dir, _scan, index) = build(&[
            ("a.md", "[[b]] [[ghost]] [[ghost]] [x](missing.md)"),
            ("b.md", ""),
            ("lonely.md", "#tag only"),
        ])?;
        let report = index.link_report();

        assert_eq!(report.total_links, 4);
        assert_eq!(report.resolved_links, 1);
        assert_eq!(report.unresolved_links, 3);
        assert_eq!(report.unresolved_by_note["a"], vec!["ghost", "missing.md"]);
        assert_eq!(report.orphans, vec!["lonely"]);
        Ok(())
    }

    #[test]
    fn test_graph_and_tags() -> Result<()> {
        let (_dir, scan, index) = build(&[
            ("x.md", "---\ntags: [shared]\n---\n[[y]] #shared #x-only"),
            ("y.md", "#shared"),
        ])?;
        let graph = index.graph();
        assert_eq!(graph.nodes, vec!["x", "y"]);
        assert_eq!(
            graph.edges,
            vec![GraphEdge {
                from: "x".into(),
                to: "y".into()
            }]
        );

        let tags = TagIndex::build(&scan);
        assert_eq!(tags.notes("shared"), vec!["x", "y"]);
        assert_eq!(
            tags.counts(),
            vec![
                TagCount { tag: "shared".into(), count: 2 },
                TagCount { tag: "x-only".into(), count: 1 },
            ]
        );
        Ok(())
    }
}
