use anyhow::Result;
use chrono::Local;
use colored::*;
use serde::Serialize;

use obsidian_vault::vault::{EntryKind, FolderNode, VaultOverview};

use super::{print_json, VaultArgs};

const TOP_TAGS: usize = 10;

#[derive(Serialize)]
struct VaultStatus {
    timestamp: String,
    #[serde(flatten)]
    overview: VaultOverview,
    #[serde(skip_serializing_if = "Option::is_none")]
    structure: Option<FolderNode>,
}

pub fn run(args: &VaultArgs, brief: bool, tree: bool, json: bool) -> Result<()> {
    let vault = args.open()?;
    let status = VaultStatus {
        timestamp: Local::now().to_rfc3339(),
        overview: vault.overview(),
        structure: if tree { Some(vault.structure(None)?) } else { None },
    };

    if json {
        return print_json(&status);
    }
    print_status(&status, brief);
    Ok(())
}

fn print_status(status: &VaultStatus, brief: bool) {
    let overview = &status.overview;
    let stats = &overview.stats;

    println!("{}", "Vault Status".bold());
    println!("{}", "=".repeat(50));
    println!("Vault: {}", overview.root);
    println!("Checked: {}", status.timestamp);
    println!();

    println!("   {:<18} {:>6}", "Notes", stats.note_count);
    println!("   {:<18} {:>6}", "Tags", stats.tag_count);
    println!("   {:<18} {:>6}", "Links", stats.link_count);
    println!("   {:<18} {:>6}", "Unresolved links", stats.unresolved_link_count);
    println!("   {:<18} {:>6}", "Orphan notes", overview.links.orphans.len());

    if !brief && !overview.tags.is_empty() {
        println!();
        println!("{}", "Top tags".cyan());
        println!("{}", "-".repeat(30));
        for tag in overview.tags.iter().take(TOP_TAGS) {
            let pct = if stats.note_count > 0 {
                (tag.count as f64 / stats.note_count as f64) * 100.0
            } else {
                0.0
            };
            println!("   {:<18} {:>4} ({:.0}%)", tag.tag, tag.count, pct);
        }
    }

    if let Some(root) = &status.structure {
        println!();
        println!("{}", "Structure".cyan());
        println!("{}", "-".repeat(30));
        print_tree(root, 0);
    }

    if !overview.warnings.is_empty() {
        println!();
        println!("{}", "Needs attention".yellow());
        println!("{}", "-".repeat(30));
        for w in &overview.warnings {
            println!("   {} [{}]: {}", w.note, w.kind, w.message);
        }
    }
    println!();
    println!("{}", "=".repeat(50));
}

fn print_tree(node: &FolderNode, depth: usize) {
    for child in &node.children {
        let indent = "  ".repeat(depth + 1);
        match child.kind {
            EntryKind::Folder => {
                println!("{}{}/", indent, child.name.blue());
                print_tree(child, depth + 1);
            }
            EntryKind::File => println!("{}{}", indent, child.name),
        }
    }
}
