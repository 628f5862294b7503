use anyhow::Result;
use colored::*;

use obsidian_vault::core::frontmatter;

use super::{print_json, VaultArgs};

pub fn run(
    args: &VaultArgs,
    note: &str,
    section: Option<&str>,
    outline: bool,
    json: bool,
) -> Result<()> {
    let vault = args.open()?;

    if outline {
        let sections = vault.list_sections(note)?;
        if json {
            return print_json(&sections);
        }
        for s in sections.iter().filter(|s| s.heading.is_some()) {
            let indent = "  ".repeat(s.level.saturating_sub(1));
            println!(
                "{}{} {}",
                indent,
                "#".repeat(s.level).dimmed(),
                s.heading.as_deref().unwrap_or_default()
            );
        }
        return Ok(());
    }

    if let Some(heading) = section {
        let content = vault.read_section(note, heading)?;
        if json {
            return print_json(&content);
        }
        print!("{}", content.content);
        return Ok(());
    }

    let note = vault.read_note(note)?;
    if json {
        return print_json(&note);
    }

    println!("{} {}", note.id.cyan().bold(), format!("({})", note.path).dimmed());
    if let Some(error) = &note.frontmatter_error {
        println!("{}", format!("Malformed frontmatter: {}", error).yellow());
    }
    if !note.frontmatter.is_empty() {
        let yaml = frontmatter::serialize(&note.frontmatter, "")?;
        println!("{}", yaml.trim_end().dimmed());
    }
    if !note.tags.is_empty() {
        println!("Tags: {}", note.tags.join(", ").green());
    }
    println!("{}", "-".repeat(60));
    print!("{}", note.body);
    if !note.body.ends_with('\n') {
        println!();
    }

    Ok(())
}
