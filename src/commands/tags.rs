use anyhow::Result;
use colored::*;

use obsidian_vault::graph::TagCount;

use super::{print_json, VaultArgs};

pub fn list(args: &VaultArgs, json: bool) -> Result<()> {
    let vault = args.open()?;
    let counts = vault.list_tags();

    if json {
        return print_json(&counts);
    }
    print_counts(&counts);
    Ok(())
}

pub fn add(args: &VaultArgs, note: &str, tag: &str, json: bool) -> Result<()> {
    let change = args.open()?.add_tag(note, tag)?;
    if json {
        return print_json(&change);
    }
    if change.changed {
        println!("{} #{} -> {}", "Added".green(), change.tag, change.note.cyan());
    } else {
        println!("{}", format!("{} already has #{}", change.note, change.tag).dimmed());
    }
    Ok(())
}

pub fn remove(args: &VaultArgs, note: &str, tag: &str, json: bool) -> Result<()> {
    let change = args.open()?.remove_tag(note, tag)?;
    if json {
        return print_json(&change);
    }
    if change.changed {
        println!("{} #{} from {}", "Removed".yellow(), change.tag, change.note.cyan());
    } else {
        println!("{}", format!("{} has no #{}", change.note, change.tag).dimmed());
    }
    Ok(())
}

pub fn find(args: &VaultArgs, tag: &str, json: bool) -> Result<()> {
    let notes = args.open()?.search_by_tag(tag)?;
    if json {
        return print_json(&notes);
    }
    if notes.is_empty() {
        println!("{}", format!("No notes tagged #{}", tag.trim_start_matches('#')).yellow());
    }
    for id in &notes {
        println!("{}", id.cyan());
    }
    Ok(())
}

fn print_counts(counts: &[TagCount]) {
    println!("{}", "Vault Tags".bold());
    println!("{}", "=".repeat(60));
    println!("Unique tags: {}", counts.len());
    println!();

    for usage in counts {
        let count_str = format!("{:>3}", usage.count);
        let count_colored = if usage.count >= 5 {
            count_str.green()
        } else if usage.count >= 2 {
            count_str.yellow()
        } else {
            count_str.normal()
        };
        println!("  {} x #{}", count_colored, usage.tag);
    }
}
