//! Vault MCP Server implementation

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;

use crate::core::config::VaultConfig;
use crate::core::error::VaultError;
use crate::core::frontmatter;
use crate::search::{FieldPredicate, SearchOptions, DEFAULT_MAX_SNIPPETS};
use crate::vault::{NewNote, Vault};

const MAX_SEARCH_LIMIT: usize = 500;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NotePathParams {
    /// Note path relative to the vault root; `.md` is optional (e.g. "daily/2024-01-01")
    pub note_path: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateNoteParams {
    /// Path of the new note
    pub note_path: String,
    /// Note body
    #[serde(default)]
    pub content: Option<String>,
    /// Frontmatter fields as a JSON object
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    /// Template to apply; overrides content and metadata
    #[serde(default)]
    pub template_name: Option<String>,
    /// Values for {{placeholders}} in the template
    #[serde(default)]
    pub variables: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateNoteParams {
    pub note_path: String,
    /// New body; the current body is kept when omitted
    #[serde(default)]
    pub content: Option<String>,
    /// Frontmatter fields merged over the existing ones
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddContentParams {
    pub note_path: String,
    /// Text to add
    pub content: String,
    /// Frontmatter fields merged over the existing ones
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MoveNoteParams {
    /// Current note path
    pub from: String,
    /// New note path; must not exist yet
    pub to: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FolderParams {
    /// Folder relative to the vault root; omit for the whole vault
    #[serde(default)]
    pub folder: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SectionParams {
    pub note_path: String,
    /// Heading text, with or without leading '#'
    pub heading: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateSectionParams {
    pub note_path: String,
    pub heading: String,
    /// New section content; the heading line is kept
    pub content: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TagParams {
    pub note_path: String,
    /// Tag with or without '#' (e.g. "project" or "#project")
    pub tag: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TagQueryParams {
    #[schemars(description = "Tag to search for (e.g. \"project\" or \"#project\")")]
    pub tag: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchParams {
    #[schemars(description = "Text to search for in note bodies and paths")]
    pub query: String,
    /// Maximum number of notes to return
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub case_sensitive: bool,
    /// Matching lines returned per note (default: 5)
    #[serde(default)]
    pub max_snippets: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FrontmatterSearchParams {
    /// Conditions that must all hold
    pub predicates: Vec<FieldPredicate>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ConnectionsParams {
    pub note_path: String,
    /// Hops to follow in both directions (default: 2, max: 10)
    #[serde(default = "default_depth")]
    pub depth: usize,
}

fn default_depth() -> usize {
    2
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TemplateNoteParams {
    /// Template name under the template folder
    pub template_name: String,
    /// Path of the new note
    pub note_path: String,
    #[serde(default)]
    pub variables: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FolderNameParams {
    /// Folder relative to the vault root
    pub folder: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FolderTemplateParams {
    /// Folder or pattern ('*' one level, '**' any depth)
    pub folder: String,
    pub template_name: String,
}

#[derive(Debug, Serialize)]
struct FolderTemplateLookup {
    folder: String,
    template: Option<String>,
}

#[derive(Debug, Serialize)]
struct Deleted {
    path: String,
    deleted: bool,
}

/// Vault MCP Service
#[derive(Clone)]
pub struct VaultService {
    vault: Arc<Vault>,
    tool_router: ToolRouter<Self>,
}

impl VaultService {
    pub fn new(vault: Vault) -> Self {
        Self {
            vault: Arc::new(vault),
            tool_router: Self::tool_router(),
        }
    }

    /// Run a core operation on the blocking pool and wrap its outcome.
    async fn call<T, F>(&self, op: F) -> Result<CallToolResult, McpError>
    where
        T: Serialize + Send + 'static,
        F: FnOnce(&Vault) -> crate::core::error::Result<T> + Send + 'static,
    {
        let vault = Arc::clone(&self.vault);
        let outcome = tokio::task::spawn_blocking(move || op(&vault))
            .await
            .map_err(|e| McpError::internal_error(format!("Tool task failed: {}", e), None))?;

        match outcome {
            Ok(value) => json_result(&value),
            Err(e) => {
                tracing::debug!(kind = e.kind(), error = %e, "tool call failed");
                error_result(&e)
            }
        }
    }
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let output = serde_json::to_string_pretty(value).map_err(|e| {
        McpError::internal_error(format!("JSON serialization failed: {}", e), None)
    })?;
    Ok(CallToolResult::success(vec![Content::text(output)]))
}

fn error_result(error: &VaultError) -> Result<CallToolResult, McpError> {
    let output = serde_json::to_string_pretty(&error.report()).map_err(|e| {
        McpError::internal_error(format!("JSON serialization failed: {}", e), None)
    })?;
    Ok(CallToolResult::error(vec![Content::text(output)]))
}

fn metadata(note_path: &str, value: Option<serde_json::Value>) -> crate::core::error::Result<Option<Mapping>> {
    value
        .map(|v| {
            frontmatter::fields_from_json(&v).map_err(|e| VaultError::Parse {
                id: note_path.to_string(),
                message: e.to_string(),
            })
        })
        .transpose()
}

#[tool_router]
impl VaultService {
    // Notes

    #[tool(description = "Read a note: frontmatter, body, tags and modification time.")]
    async fn read_note(&self, params: Parameters<NotePathParams>) -> Result<CallToolResult, McpError> {
        let NotePathParams { note_path } = params.0;
        self.call(move |vault| vault.read_note(&note_path)).await
    }

    #[tool(description = "Create a new note. Fails if it exists. With no template, content or metadata, the template mapped to the note's folder is applied.")]
    async fn create_note(&self, params: Parameters<CreateNoteParams>) -> Result<CallToolResult, McpError> {
        let p = params.0;
        self.call(move |vault| {
            let new = NewNote {
                content: p.content.unwrap_or_default(),
                frontmatter: metadata(&p.note_path, p.metadata)?,
                template: p.template_name,
                variables: p.variables,
            };
            vault.create_note(&p.note_path, new)
        })
        .await
    }

    #[tool(description = "Replace a note's body and/or merge frontmatter fields.")]
    async fn update_note(&self, params: Parameters<UpdateNoteParams>) -> Result<CallToolResult, McpError> {
        let p = params.0;
        self.call(move |vault| {
            let fields = metadata(&p.note_path, p.metadata)?;
            vault.update_note(&p.note_path, p.content.as_deref(), fields)
        })
        .await
    }

    #[tool(description = "Append text to the end of an existing note.")]
    async fn append_to_note(&self, params: Parameters<AddContentParams>) -> Result<CallToolResult, McpError> {
        let p = params.0;
        self.call(move |vault| {
            let fields = metadata(&p.note_path, p.metadata)?;
            vault.append_to_note(&p.note_path, &p.content, fields)
        })
        .await
    }

    #[tool(description = "Insert text at the start of an existing note's body, after its frontmatter.")]
    async fn prepend_to_note(&self, params: Parameters<AddContentParams>) -> Result<CallToolResult, McpError> {
        let p = params.0;
        self.call(move |vault| {
            let fields = metadata(&p.note_path, p.metadata)?;
            vault.prepend_to_note(&p.note_path, &p.content, fields)
        })
        .await
    }

    #[tool(description = "Delete a note permanently. Use move_note to archive instead.")]
    async fn delete_note(&self, params: Parameters<NotePathParams>) -> Result<CallToolResult, McpError> {
        let NotePathParams { note_path } = params.0;
        self.call(move |vault| {
            let id = vault.store().paths().resolve(&note_path)?.id;
            vault.delete_note(&id)?;
            Ok(Deleted { path: id, deleted: true })
        })
        .await
    }

    #[tool(description = "Move or rename a note. Refuses to overwrite an existing note.")]
    async fn move_note(&self, params: Parameters<MoveNoteParams>) -> Result<CallToolResult, McpError> {
        let MoveNoteParams { from, to } = params.0;
        self.call(move |vault| vault.move_note(&from, &to)).await
    }

    #[tool(description = "List note paths in the vault or in one folder, sorted.")]
    async fn list_notes(&self, params: Parameters<FolderParams>) -> Result<CallToolResult, McpError> {
        let FolderParams { folder } = params.0;
        self.call(move |vault| vault.list_notes(folder.as_deref())).await
    }

    #[tool(description = "List the headings of a note with their levels.")]
    async fn list_note_sections(&self, params: Parameters<NotePathParams>) -> Result<CallToolResult, McpError> {
        let NotePathParams { note_path } = params.0;
        self.call(move |vault| vault.list_sections(&note_path)).await
    }

    #[tool(description = "Read the content under one heading of a note.")]
    async fn read_note_section(&self, params: Parameters<SectionParams>) -> Result<CallToolResult, McpError> {
        let SectionParams { note_path, heading } = params.0;
        self.call(move |vault| vault.read_section(&note_path, &heading)).await
    }

    #[tool(description = "Replace the content under one heading of a note, keeping the heading.")]
    async fn update_note_section(
        &self,
        params: Parameters<UpdateSectionParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        self.call(move |vault| vault.update_section(&p.note_path, &p.heading, &p.content))
            .await
    }

    // Tags

    #[tool(description = "Add a tag to a note's frontmatter. Adding a present tag is a no-op.")]
    async fn add_tag(&self, params: Parameters<TagParams>) -> Result<CallToolResult, McpError> {
        let TagParams { note_path, tag } = params.0;
        self.call(move |vault| vault.add_tag(&note_path, &tag)).await
    }

    #[tool(description = "Remove a tag from a note's frontmatter. Removing an absent tag is a no-op.")]
    async fn remove_tag(&self, params: Parameters<TagParams>) -> Result<CallToolResult, McpError> {
        let TagParams { note_path, tag } = params.0;
        self.call(move |vault| vault.remove_tag(&note_path, &tag)).await
    }

    #[tool(description = "List every tag in the vault with the number of notes using it.")]
    async fn list_tags(&self) -> Result<CallToolResult, McpError> {
        self.call(|vault| Ok(vault.list_tags())).await
    }

    // Search

    #[tool(description = "Full-text search over note bodies and paths. Results are ordered by match count, then path, with matching lines as snippets.")]
    async fn search_notes(&self, params: Parameters<SearchParams>) -> Result<CallToolResult, McpError> {
        let p = params.0;
        // Clamp limit (max 500)
        let options = SearchOptions {
            limit: Some(p.limit.unwrap_or(MAX_SEARCH_LIMIT).clamp(1, MAX_SEARCH_LIMIT)),
            case_sensitive: p.case_sensitive,
            max_snippets: p.max_snippets.unwrap_or(DEFAULT_MAX_SNIPPETS),
        };
        self.call(move |vault| vault.search_notes(&p.query, &options)).await
    }

    #[tool(description = "Find notes carrying a tag, from frontmatter or inline #tags.")]
    async fn search_by_tag(&self, params: Parameters<TagQueryParams>) -> Result<CallToolResult, McpError> {
        let TagQueryParams { tag } = params.0;
        self.call(move |vault| vault.search_by_tag(&tag)).await
    }

    #[tool(description = "Find notes whose frontmatter satisfies all predicates. 'equals' compares scalar fields; 'contains' checks list membership or substring. Missing fields never match.")]
    async fn search_by_frontmatter(
        &self,
        params: Parameters<FrontmatterSearchParams>,
    ) -> Result<CallToolResult, McpError> {
        let FrontmatterSearchParams { predicates } = params.0;
        self.call(move |vault| vault.search_by_frontmatter(&predicates)).await
    }

    // Graph

    #[tool(description = "List notes that link to the given note.")]
    async fn get_backlinks(&self, params: Parameters<NotePathParams>) -> Result<CallToolResult, McpError> {
        let NotePathParams { note_path } = params.0;
        self.call(move |vault| vault.backlinks(&note_path)).await
    }

    #[tool(description = "List notes the given note links to.")]
    async fn get_forward_links(&self, params: Parameters<NotePathParams>) -> Result<CallToolResult, McpError> {
        let NotePathParams { note_path } = params.0;
        self.call(move |vault| vault.forward_links(&note_path)).await
    }

    #[tool(description = "Notes within N links of a note, following links in both directions, with the links between them.")]
    async fn get_connections(&self, params: Parameters<ConnectionsParams>) -> Result<CallToolResult, McpError> {
        let ConnectionsParams { note_path, depth } = params.0;
        self.call(move |vault| vault.connections(&note_path, depth)).await
    }

    #[tool(description = "The whole note link graph: nodes and edges.")]
    async fn get_graph(&self) -> Result<CallToolResult, McpError> {
        self.call(|vault| Ok(vault.graph())).await
    }

    #[tool(description = "Broken links per note and orphan notes with no links in or out.")]
    async fn get_link_report(&self) -> Result<CallToolResult, McpError> {
        self.call(|vault| Ok(vault.link_report())).await
    }

    // Vault

    #[tool(description = "Folder tree of the vault (or one folder) with its notes.")]
    async fn get_vault_structure(&self, params: Parameters<FolderParams>) -> Result<CallToolResult, McpError> {
        let FolderParams { folder } = params.0;
        self.call(move |vault| vault.structure(folder.as_deref())).await
    }

    #[tool(description = "Vault statistics: note, tag and link counts.")]
    async fn get_vault_stats(&self) -> Result<CallToolResult, McpError> {
        self.call(|vault| Ok(vault.stats())).await
    }

    // Templates

    #[tool(description = "List available templates.")]
    async fn list_templates(&self) -> Result<CallToolResult, McpError> {
        self.call(|vault| Ok(vault.list_templates())).await
    }

    #[tool(description = "Create a note from a template, filling {{placeholders}}. date, time and title are always available.")]
    async fn create_from_template(
        &self,
        params: Parameters<TemplateNoteParams>,
    ) -> Result<CallToolResult, McpError> {
        let TemplateNoteParams {
            template_name,
            note_path,
            variables,
        } = params.0;
        self.call(move |vault| vault.create_from_template(&template_name, &note_path, variables))
            .await
    }

    #[tool(description = "Template that applies to a folder: exact mapping, then wildcard patterns, then parent folders.")]
    async fn get_folder_template(&self, params: Parameters<FolderNameParams>) -> Result<CallToolResult, McpError> {
        let FolderNameParams { folder } = params.0;
        self.call(move |vault| {
            let template = vault.folder_template(&folder)?;
            Ok(FolderTemplateLookup { folder, template })
        })
        .await
    }

    #[tool(description = "Map a folder or folder pattern to a template.")]
    async fn set_folder_template(
        &self,
        params: Parameters<FolderTemplateParams>,
    ) -> Result<CallToolResult, McpError> {
        let FolderTemplateParams {
            folder,
            template_name,
        } = params.0;
        self.call(move |vault| vault.set_folder_template(&folder, &template_name))
            .await
    }

    #[tool(description = "Remove a folder's template mapping.")]
    async fn remove_folder_template(
        &self,
        params: Parameters<FolderNameParams>,
    ) -> Result<CallToolResult, McpError> {
        let FolderNameParams { folder } = params.0;
        self.call(move |vault| vault.remove_folder_template(&folder)).await
    }

    #[tool(description = "List all folder to template mappings.")]
    async fn list_folder_templates(&self) -> Result<CallToolResult, McpError> {
        self.call(|vault| vault.list_folder_templates()).await
    }
}

#[tool_handler]
impl ServerHandler for VaultService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Obsidian vault MCP server. Read and write notes, manage tags, search, and query backlinks and the link graph.".to_string()
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

/// Run the MCP server over stdio
pub async fn run_mcp_server(config: VaultConfig) -> Result<()> {
    use tokio::io::{stdin, stdout};

    let vault = Vault::open(config)?;
    tracing::info!(root = %vault.root().display(), "starting MCP server");

    let service = VaultService::new(vault);
    let transport = (stdin(), stdout());
    let server = service.serve(transport).await?;
    server.waiting().await?;

    Ok(())
}
