use anyhow::Result;
use colored::*;

use obsidian_vault::graph::{ConnectionGraph, LinkReport};

use super::{print_json, VaultArgs};

const REPORT_PREVIEW: usize = 20;

pub fn backlinks(args: &VaultArgs, note: &str, json: bool) -> Result<()> {
    let ids = args.open()?.backlinks(note)?;
    print_list(&format!("Backlinks to {}", note), &ids, json)
}

pub fn forward(args: &VaultArgs, note: &str, json: bool) -> Result<()> {
    let ids = args.open()?.forward_links(note)?;
    print_list(&format!("Links from {}", note), &ids, json)
}

pub fn connections(args: &VaultArgs, note: &str, depth: usize, json: bool) -> Result<()> {
    let graph = args.open()?.connections(note, depth)?;
    if json {
        return print_json(&graph);
    }
    print_connections(&graph);
    Ok(())
}

pub fn report(args: &VaultArgs, json: bool) -> Result<()> {
    let report = args.open()?.link_report();
    if json {
        return print_json(&report);
    }
    print_report(&report);
    Ok(())
}

fn print_list(title: &str, ids: &[String], json: bool) -> Result<()> {
    if json {
        return print_json(&ids);
    }
    println!("{}", title.bold());
    println!("{}", "=".repeat(60));
    if ids.is_empty() {
        println!("{}", "None.".yellow());
    }
    for id in ids {
        println!("  {}", id.cyan());
    }
    Ok(())
}

fn print_connections(graph: &ConnectionGraph) {
    println!("{}", format!("Connections of {} (depth {})", graph.root, graph.depth).bold());
    println!("{}", "=".repeat(60));

    let mut current = None;
    for node in graph.nodes.iter().skip(1) {
        if current != Some(node.distance) {
            current = Some(node.distance);
            println!("{}", format!("{} hop(s):", node.distance).cyan());
        }
        println!("  {}", node.id);
    }
    if graph.nodes.len() == 1 {
        println!("{}", "No connected notes.".yellow());
    }

    println!();
    println!("{} notes, {} links", graph.nodes.len(), graph.edges.len());
}

fn print_report(report: &LinkReport) {
    println!("{}", "Link Report".bold());
    println!("{}", "=".repeat(60));
    println!("Total links:      {}", report.total_links);
    println!("Resolved links:   {}", report.resolved_links.to_string().green());
    let unresolved = report.unresolved_links.to_string();
    println!(
        "Unresolved links: {}",
        if report.unresolved_links > 0 { unresolved.red() } else { unresolved.green() }
    );
    println!("Orphan notes:     {}", report.orphans.len());

    if !report.unresolved_by_note.is_empty() {
        println!();
        println!("{}", "Unresolved:".yellow().bold());
        for (note, targets) in report.unresolved_by_note.iter().take(REPORT_PREVIEW) {
            println!("  {} -> {}", note.cyan(), targets.join(", "));
        }
        if report.unresolved_by_note.len() > REPORT_PREVIEW {
            println!(
                "{}",
                format!("  ... and {} more notes", report.unresolved_by_note.len() - REPORT_PREVIEW).dimmed()
            );
        }
    }

    if !report.orphans.is_empty() {
        println!();
        println!("{}", "Orphans:".yellow().bold());
        for id in report.orphans.iter().take(REPORT_PREVIEW) {
            println!("  {}", id);
        }
        if report.orphans.len() > REPORT_PREVIEW {
            println!(
                "{}",
                format!("  ... and {} more", report.orphans.len() - REPORT_PREVIEW).dimmed()
            );
        }
    }
}
