use anyhow::{bail, Result};
use colored::*;

use obsidian_vault::search::{FieldPredicate, SearchHit, SearchOptions};

use super::{print_json, VaultArgs};

const DEFAULT_LIMIT: usize = 20;

pub fn run(
    args: &VaultArgs,
    query: Option<&str>,
    fields: &[String],
    limit: Option<usize>,
    case_sensitive: bool,
    json: bool,
) -> Result<()> {
    let vault = args.open()?;
    let predicates = fields
        .iter()
        .map(|f| FieldPredicate::parse(f))
        .collect::<Result<Vec<_>, _>>()?;

    let Some(query) = query else {
        if predicates.is_empty() {
            bail!("Give a search query, --field predicates, or both");
        }
        let ids = vault.search_by_frontmatter(&predicates)?;
        if json {
            return print_json(&ids);
        }
        print_ids(&ids);
        return Ok(());
    };

    let options = SearchOptions {
        limit: None,
        case_sensitive,
        ..SearchOptions::default()
    };
    let mut hits = vault.search_notes(query, &options)?;
    if !predicates.is_empty() {
        let allowed = vault.search_by_frontmatter(&predicates)?;
        hits.retain(|h| allowed.binary_search(&h.id).is_ok());
    }

    let total = hits.len();
    let display_limit = limit.unwrap_or(DEFAULT_LIMIT);
    hits.truncate(display_limit);

    if json {
        return print_json(&hits);
    }
    print_hits(query, &hits, total, display_limit);
    Ok(())
}

fn print_ids(ids: &[String]) {
    if ids.is_empty() {
        println!("{}", "No matches found.".yellow());
        return;
    }
    for id in ids {
        println!("{}", id.cyan());
    }
}

fn print_hits(query: &str, hits: &[SearchHit], total: usize, display_limit: usize) {
    println!("{}", "Search Results".bold());
    println!("{}", "=".repeat(60));
    println!("Query: \"{}\"", query);
    println!("Found: {} notes", total);
    println!();

    if hits.is_empty() {
        println!("{}", "No matches found.".yellow());
        return;
    }

    for hit in hits {
        println!("{} {}", hit.id.cyan(), format!("({} matches)", hit.matches).dimmed());
        for snippet in &hit.snippets {
            println!("  {}", snippet.dimmed());
        }
        println!();
    }

    if total > display_limit {
        println!(
            "{}",
            format!("... and {} more results", total - display_limit).dimmed()
        );
    }
}
