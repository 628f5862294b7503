mod commands;

use clap::{Parser, Subcommand};

use commands::VaultArgs;

#[derive(Parser)]
#[command(name = "vault")]
#[command(about = "Obsidian vault CLI: notes, tags, search and backlinks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    vault: VaultArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    // ===== Notes =====
    /// Print a note, one of its sections, or its outline
    Read {
        note: String,
        #[arg(long, help = "Print only the content under this heading")]
        section: Option<String>,
        #[arg(long, help = "Print the heading outline")]
        outline: bool,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Full-text and frontmatter search
    Search {
        query: Option<String>,
        #[arg(long = "field", help = "Frontmatter predicate: key=value or key~value (repeatable)")]
        fields: Vec<String>,
        #[arg(long, help = "Limit results")]
        limit: Option<usize>,
        #[arg(long, help = "Match case exactly")]
        case_sensitive: bool,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// List, add, remove and find tags
    #[command(subcommand)]
    Tag(TagCommand),
    /// Backlinks, forward links, connections and the link report
    #[command(subcommand)]
    Links(LinksCommand),
    /// Vault summary
    Status {
        #[arg(short, long, help = "Brief output")]
        brief: bool,
        #[arg(long, help = "Show the folder tree")]
        tree: bool,
        #[arg(long, help = "JSON output")]
        json: bool,
    },

    // ===== MCP Server =====
    /// Start MCP server for Claude integration
    #[cfg(feature = "mcp")]
    Mcp {
        #[arg(long, help = "Show Claude configuration instructions")]
        install: bool,
    },
}

#[derive(Subcommand)]
enum TagCommand {
    /// Every tag with its note count
    List {
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Add a tag to a note's frontmatter
    Add {
        note: String,
        tag: String,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Remove a tag from a note's frontmatter
    Remove {
        note: String,
        tag: String,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Notes carrying a tag
    Find {
        tag: String,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
}

#[derive(Subcommand)]
enum LinksCommand {
    /// Notes linking to a note
    Backlinks {
        note: String,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Notes a note links to
    Forward {
        note: String,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Notes within N links of a note
    Connections {
        note: String,
        #[arg(short, long, default_value_t = 2, help = "Hops to follow (max 10)")]
        depth: usize,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Broken links and orphan notes
    Report {
        #[arg(long, help = "JSON output")]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    obsidian_vault::logging::init(cli.vault.log_level.as_deref())?;
    let args = &cli.vault;

    match cli.command {
        Commands::Read {
            note,
            section,
            outline,
            json,
        } => commands::note::run(args, &note, section.as_deref(), outline, json),
        Commands::Search {
            query,
            fields,
            limit,
            case_sensitive,
            json,
        } => commands::search::run(args, query.as_deref(), &fields, limit, case_sensitive, json),
        Commands::Tag(tag) => match tag {
            TagCommand::List { json } => commands::tags::list(args, json),
            TagCommand::Add { note, tag, json } => commands::tags::add(args, &note, &tag, json),
            TagCommand::Remove { note, tag, json } => {
                commands::tags::remove(args, &note, &tag, json)
            }
            TagCommand::Find { tag, json } => commands::tags::find(args, &tag, json),
        },
        Commands::Links(links) => match links {
            LinksCommand::Backlinks { note, json } => commands::links::backlinks(args, &note, json),
            LinksCommand::Forward { note, json } => commands::links::forward(args, &note, json),
            LinksCommand::Connections { note, depth, json } => {
                commands::links::connections(args, &note, depth, json)
            }
            LinksCommand::Report { json } => commands::links::report(args, json),
        },
        Commands::Status { brief, tree, json } => commands::status::run(args, brief, tree, json),

        // MCP Server
        #[cfg(feature = "mcp")]
        Commands::Mcp { install } => {
            if install {
                print_mcp_install_instructions(args);
                Ok(())
            } else {
                run_mcp_server(args)
            }
        }
    }
}

#[cfg(feature = "mcp")]
fn run_mcp_server(args: &VaultArgs) -> anyhow::Result<()> {
    let config = args.config()?;
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(obsidian_vault::mcp::run_mcp_server(config))
}

#[cfg(feature = "mcp")]
fn print_mcp_install_instructions(args: &VaultArgs) {
    use colored::Colorize;

    let vault_path = args
        .config()
        .map(|c| c.root.to_string_lossy().to_string())
        .unwrap_or_else(|_| "/path/to/your/vault".to_string());

    let binary_path = std::env::current_exe()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| "vault".to_string());

    println!("{}", "MCP Server Installation Guide".bold().cyan());
    println!();
    println!("Add the following to your Claude configuration:");
    println!();
    println!("{}", "For Claude Desktop (~/.config/claude/claude_desktop_config.json):".dimmed());
    println!(r#"{{
  "mcpServers": {{
    "obsidian-vault": {{
      "command": "{}",
      "args": ["mcp"],
      "env": {{
        "OBSIDIAN_VAULT_PATH": "{}"
      }}
    }}
  }}
}}"#, binary_path, vault_path);
    println!();
    println!("{}", "Optional environment:".dimmed());
    println!("  OBSIDIAN_TEMPLATE_DIR, OBSIDIAN_EXCLUDE_PATTERNS, OBSIDIAN_LOWERCASE_TAGS, RUST_LOG");
    println!();
    println!("{}", "Available tools:".bold());
    let groups: [(&str, &[&str]); 6] = [
        ("Notes", &[
            "read_note", "create_note", "update_note", "append_to_note", "prepend_to_note",
            "delete_note", "move_note", "list_notes",
        ]),
        ("Sections", &["list_note_sections", "read_note_section", "update_note_section"]),
        ("Tags", &["add_tag", "remove_tag", "list_tags"]),
        ("Search", &["search_notes", "search_by_tag", "search_by_frontmatter"]),
        ("Graph", &[
            "get_backlinks", "get_forward_links", "get_connections", "get_graph",
            "get_link_report", "get_vault_structure", "get_vault_stats",
        ]),
        ("Templates", &[
            "list_templates", "create_from_template", "get_folder_template",
            "set_folder_template", "remove_folder_template", "list_folder_templates",
        ]),
    ];
    for (group, tools) in groups {
        let names: Vec<String> = tools.iter().map(|t| t.green().to_string()).collect();
        println!("  • {}: {}", group, names.join(", "));
    }
}
