//! The boundary every caller goes through.
//!
//! A `Vault` owns the immutable configuration and the note store. Query
//! operations scan the vault afresh and build the link graph and tag index
//! from that one scan; nothing derived is kept between calls.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use serde_yaml::Mapping;
use walkdir::WalkDir;

use crate::core::config::VaultConfig;
use crate::core::error::{Result, VaultError};
use crate::core::frontmatter;
use crate::core::note::Note;
use crate::core::paths::{has_note_extension, CONFIG_FILE_NAME};
use crate::core::sections::SectionInfo;
use crate::core::store::{NoteStore, SectionContent, TagChange, WriteMode};
use crate::core::template::{self, FolderTemplate};
use crate::graph::{
    self, ConnectionGraph, GraphIndex, LinkReport, LinkResolver, ScanWarning, TagCount, VaultGraph,
    VaultScan,
};
use crate::search::{FieldPredicate, SearchEngine, SearchHit, SearchOptions, VaultStats};

/// Input for [`Vault::create_note`].
#[derive(Debug, Clone, Default)]
pub struct NewNote {
    pub content: String,
    pub frontmatter: Option<Mapping>,
    /// Template name under the template folder, `.md` optional.
    pub template: Option<String>,
    pub variables: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedNote {
    #[serde(flatten)]
    pub note: Note,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_applied: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Folder,
    File,
}

#[derive(Debug, Clone, Serialize)]
pub struct FolderNode {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Vault-relative path; empty for the root.
    pub path: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FolderNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VaultOverview {
    pub root: String,
    pub stats: VaultStats,
    pub tags: Vec<TagCount>,
    pub links: LinkReport,
    pub warnings: Vec<ScanWarning>,
}

/// Scan plus the structures derived from it.
struct Snapshot {
    scan: VaultScan,
    graph: GraphIndex,
}

pub struct Vault {
    config: VaultConfig,
    store: NoteStore,
}

impl Vault {
    pub fn open(config: VaultConfig) -> Result<Self> {
        let store = NoteStore::new(&config)?;
        tracing::debug!(root = %config.root.display(), "vault opened");
        Ok(Self { config, store })
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    pub fn store(&self) -> &NoteStore {
        &self.store
    }

    // Notes

    pub fn read_note(&self, id: &str) -> Result<Note> {
        self.store.read(id)
    }

    /// Create a note. An explicit template wins; with no template, content or
    /// frontmatter the template mapped to the note's folder is used.
    pub fn create_note(&self, id: &str, new: NewNote) -> Result<CreatedNote> {
        let resolved = self.store.paths().resolve(id)?;
        if resolved.absolute.exists() {
            return Err(VaultError::AlreadyExists(resolved.id));
        }
        let folder = resolved.id.rsplit_once('/').map(|(f, _)| f).unwrap_or("");
        let title = resolved.id.rsplit('/').next().unwrap_or(&resolved.id);

        let template_name = match new.template {
            Some(name) => Some(name),
            None if new.content.is_empty() && new.frontmatter.is_none() && !folder.is_empty() => {
                template::folder_template(self.store.paths(), folder)?
            }
            None => None,
        };

        let (fields, body) = match &template_name {
            Some(name) => {
                let text = template::load_template(self.store.paths(), name)?;
                let rendered = template::render(&text, &template::with_defaults(title, new.variables));
                let (fields, body) = frontmatter::parse(&rendered).map_err(|e| VaultError::Parse {
                    id: name.clone(),
                    message: e.to_string(),
                })?;
                (fields, body.to_string())
            }
            None => (new.frontmatter.unwrap_or_default(), new.content),
        };

        let note = self.store.write(&resolved.id, fields, &body, WriteMode::Create)?;
        Ok(CreatedNote {
            note,
            template_applied: template_name,
        })
    }

    pub fn create_from_template(
        &self,
        template: &str,
        id: &str,
        variables: Option<BTreeMap<String, String>>,
    ) -> Result<CreatedNote> {
        self.create_note(
            id,
            NewNote {
                template: Some(template.to_string()),
                variables,
                ..NewNote::default()
            },
        )
    }

    pub fn write_note(&self, id: &str, fields: Mapping, body: &str, mode: WriteMode) -> Result<Note> {
        self.store.write(id, fields, body, mode)
    }

    pub fn update_note(&self, id: &str, body: Option<&str>, fields: Option<Mapping>) -> Result<Note> {
        self.store.update(id, body, fields)
    }

    pub fn append_to_note(&self, id: &str, content: &str, fields: Option<Mapping>) -> Result<Note> {
        self.store
            .write(id, fields.unwrap_or_default(), content, WriteMode::Append)
    }

    pub fn prepend_to_note(&self, id: &str, content: &str, fields: Option<Mapping>) -> Result<Note> {
        self.store
            .write(id, fields.unwrap_or_default(), content, WriteMode::Prepend)
    }

    pub fn delete_note(&self, id: &str) -> Result<()> {
        self.store.delete(id)
    }

    pub fn move_note(&self, from: &str, to: &str) -> Result<Note> {
        self.store.move_note(from, to)
    }

    /// Note identities, optionally limited to one folder and its subfolders.
    pub fn list_notes(&self, folder: Option<&str>) -> Result<Vec<String>> {
        let ids = self.store.list();
        let prefix = match folder {
            Some(folder) => self.store.paths().resolve_dir(folder)?.0,
            None => String::new(),
        };
        if prefix.is_empty() {
            return Ok(ids);
        }
        let prefix = format!("{}/", prefix);
        Ok(ids.into_iter().filter(|id| id.starts_with(&prefix)).collect())
    }

    pub fn list_sections(&self, id: &str) -> Result<Vec<SectionInfo>> {
        self.store.sections(id)
    }

    pub fn read_section(&self, id: &str, heading: &str) -> Result<SectionContent> {
        self.store.read_section(id, heading)
    }

    pub fn update_section(&self, id: &str, heading: &str, content: &str) -> Result<Note> {
        self.store.update_section(id, heading, content)
    }

    // Tags

    pub fn add_tag(&self, id: &str, tag: &str) -> Result<TagChange> {
        self.store.add_tag(id, tag)
    }

    pub fn remove_tag(&self, id: &str, tag: &str) -> Result<TagChange> {
        self.store.remove_tag(id, tag)
    }

    pub fn list_tags(&self) -> Vec<TagCount> {
        let scan = VaultScan::collect(&self.store);
        SearchEngine::new(&scan).tags()
    }

    // Search

    pub fn search_notes(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchHit>> {
        let scan = VaultScan::collect(&self.store);
        SearchEngine::new(&scan).full_text(query, options)
    }

    pub fn search_by_tag(&self, tag: &str) -> Result<Vec<String>> {
        let tag = self.store.normalize_tag(tag)?;
        let scan = VaultScan::collect(&self.store);
        Ok(SearchEngine::new(&scan).by_tag(&tag))
    }

    pub fn search_by_frontmatter(&self, predicates: &[FieldPredicate]) -> Result<Vec<String>> {
        if predicates.is_empty() {
            return Err(VaultError::InvalidQuery("no frontmatter predicates given".to_string()));
        }
        let scan = VaultScan::collect(&self.store);
        Ok(SearchEngine::new(&scan).by_frontmatter(predicates))
    }

    // Graph

    pub fn backlinks(&self, id: &str) -> Result<Vec<String>> {
        let (snapshot, id) = self.snapshot_for(id)?;
        Ok(snapshot.graph.backlinks(&id))
    }

    pub fn forward_links(&self, id: &str) -> Result<Vec<String>> {
        let (snapshot, id) = self.snapshot_for(id)?;
        Ok(snapshot.graph.forward_links(&id))
    }

    /// Notes within `depth` links of `id`, following links both ways.
    pub fn connections(&self, id: &str, depth: usize) -> Result<ConnectionGraph> {
        let (snapshot, id) = self.snapshot_for(id)?;
        Ok(graph::connections(&snapshot.graph, &id, depth))
    }

    pub fn graph(&self) -> VaultGraph {
        self.snapshot().graph.graph()
    }

    pub fn link_report(&self) -> LinkReport {
        self.snapshot().graph.link_report()
    }

    // Vault

    pub fn stats(&self) -> VaultStats {
        let snapshot = self.snapshot();
        SearchEngine::new(&snapshot.scan).stats(&snapshot.graph)
    }

    /// Stats, tag counts and the link report from a single scan.
    pub fn overview(&self) -> VaultOverview {
        let snapshot = self.snapshot();
        let engine = SearchEngine::new(&snapshot.scan);
        VaultOverview {
            root: self.config.root.display().to_string(),
            stats: engine.stats(&snapshot.graph),
            tags: engine.tags(),
            links: snapshot.graph.link_report(),
            warnings: snapshot.scan.warnings.clone(),
        }
    }

    /// Folder tree of notes, folders first, each level sorted by name.
    pub fn structure(&self, folder: Option<&str>) -> Result<FolderNode> {
        let (relative, absolute) = self.store.paths().resolve_dir(folder.unwrap_or(""))?;
        if !absolute.is_dir() {
            return Err(VaultError::NotFound(relative));
        }
        let name = if relative.is_empty() {
            self.root()
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        } else {
            relative.rsplit('/').next().unwrap_or(&relative).to_string()
        };
        Ok(self.folder_node(name, relative, &absolute))
    }

    fn folder_node(&self, name: String, relative: String, absolute: &Path) -> FolderNode {
        let mut children = Vec::new();
        let entries = WalkDir::new(absolute)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by(|a, b| {
                (a.file_type().is_file(), a.file_name()).cmp(&(b.file_type().is_file(), b.file_name()))
            });

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(folder = %relative, error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            let Some(path) = self.store.paths().relative(entry.path()) else {
                continue;
            };
            if self.store.paths().is_excluded(&path) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if entry.file_type().is_dir() {
                children.push(self.folder_node(name, path, entry.path()));
            } else if entry.file_type().is_file() && has_note_extension(&path) {
                children.push(FolderNode {
                    name,
                    kind: EntryKind::File,
                    path,
                    children: Vec::new(),
                });
            }
        }

        FolderNode {
            name,
            kind: EntryKind::Folder,
            path: relative,
            children,
        }
    }

    // Templates

    pub fn list_templates(&self) -> Vec<String> {
        template::list_templates(self.store.paths())
    }

    pub fn folder_template(&self, folder: &str) -> Result<Option<String>> {
        template::folder_template(self.store.paths(), folder)
    }

    pub fn set_folder_template(&self, folder: &str, template: &str) -> Result<FolderTemplate> {
        self.store.locked(CONFIG_FILE_NAME, || {
            template::set_folder_template(self.store.paths(), folder, template)
        })
    }

    pub fn remove_folder_template(&self, folder: &str) -> Result<FolderTemplate> {
        self.store.locked(CONFIG_FILE_NAME, || {
            template::remove_folder_template(self.store.paths(), folder)
        })
    }

    pub fn list_folder_templates(&self) -> Result<BTreeMap<String, String>> {
        template::list_folder_templates(self.store.paths())
    }

    fn snapshot(&self) -> Snapshot {
        let scan = VaultScan::collect(&self.store);
        let resolver = LinkResolver::new(scan.ids(), self.config.case_insensitive_links);
        let graph = GraphIndex::build(&scan, &resolver);
        Snapshot { scan, graph }
    }

    /// Snapshot for a query about one note, which must exist.
    fn snapshot_for(&self, id: &str) -> Result<(Snapshot, String)> {
        let resolved = self.store.paths().resolve(id)?;
        let snapshot = self.snapshot();
        if !snapshot.graph.contains(&resolved.id) {
            return Err(VaultError::NotFound(resolved.id));
        }
        Ok((snapshot, resolved.id))
    }
}
