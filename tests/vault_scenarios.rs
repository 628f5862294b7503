//! End-to-end behaviour of the vault facade against a small on-disk vault.

use std::fs;
use std::path::Path;

use anyhow::Result;
use serde_yaml::{Mapping, Value};
use tempfile::TempDir;

use obsidian_vault::search::FieldPredicate;
use obsidian_vault::{NewNote, Vault, VaultConfig, VaultError, WriteMode};

fn write(root: &Path, rel: &str, content: &str) -> Result<()> {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

fn sample_vault() -> Result<(TempDir, Vault)> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    write(
        root,
        "daily/2024-01-01.md",
        "---\ntags: [journal]\n---\nWorked on [[alpha]] today. #urgent\n",
    )?;
    write(
        root,
        "projects/alpha.md",
        "---\nstatus: active\ntags: [project]\n---\n# Alpha\n\nSee [[beta|the beta]] and [[missing]].\n",
    )?;
    write(root, "projects/beta.md", "# Beta\n\nBack to [[alpha#Alpha]].\n")?;
    write(root, "inbox/lonely.md", "Nothing links here.\n")?;
    write(root, ".obsidian/workspace.md", "[[alpha]]\n")?;

    let vault = Vault::open(VaultConfig::new(root)?)?;
    Ok((dir, vault))
}

#[test]
fn test_traversal_is_rejected_before_any_io() -> Result<()> {
    let (_dir, vault) = sample_vault()?;

    for bad in ["../etc/passwd", "projects/../../x", "/etc/passwd"] {
        let err = vault.read_note(bad).unwrap_err();
        assert_eq!(err.kind(), "InvalidPath", "{}", bad);
    }
    let err = vault.create_note("../escape", NewNote::default()).unwrap_err();
    assert!(matches!(err, VaultError::InvalidPath { .. }));
    Ok(())
}

#[test]
fn test_daily_note_links_and_inline_tag() -> Result<()> {
    let (_dir, vault) = sample_vault()?;

    assert_eq!(vault.forward_links("daily/2024-01-01")?, vec!["projects/alpha"]);
    assert_eq!(vault.search_by_tag("urgent")?, vec!["daily/2024-01-01"]);
    assert_eq!(vault.search_by_tag("#urgent")?, vec!["daily/2024-01-01"]);

    let note = vault.read_note("daily/2024-01-01.md")?;
    assert_eq!(note.tags, vec!["journal", "urgent"]);
    Ok(())
}

#[test]
fn test_backlinks_mirror_forward_links() -> Result<()> {
    let (_dir, vault) = sample_vault()?;

    for source in vault.list_notes(None)? {
        for target in vault.forward_links(&source)? {
            assert!(
                vault.backlinks(&target)?.contains(&source),
                "{} -> {} missing from backlinks",
                source,
                target
            );
        }
    }
    assert_eq!(
        vault.backlinks("projects/alpha")?,
        vec!["daily/2024-01-01", "projects/beta"]
    );
    Ok(())
}

#[test]
fn test_excluded_folders_are_invisible() -> Result<()> {
    let (_dir, vault) = sample_vault()?;

    let notes = vault.list_notes(None)?;
    assert!(notes.iter().all(|id| !id.starts_with(".obsidian")));
    assert_eq!(vault.stats().note_count, 4);
    Ok(())
}

#[test]
fn test_tag_add_and_remove_are_idempotent() -> Result<()> {
    let (_dir, vault) = sample_vault()?;

    let first = vault.add_tag("projects/beta", "#review")?;
    assert!(first.changed);
    let again = vault.add_tag("projects/beta", "review")?;
    assert!(!again.changed);
    assert_eq!(again.tags, vec!["review"]);

    let removed = vault.remove_tag("projects/beta", "review")?;
    assert!(removed.changed);
    let absent = vault.remove_tag("projects/beta", "review")?;
    assert!(!absent.changed);

    assert_eq!(vault.add_tag("projects/beta", "  ").unwrap_err().kind(), "InvalidTag");
    Ok(())
}

#[test]
fn test_write_then_read_round_trip() -> Result<()> {
    let (_dir, vault) = sample_vault()?;

    let mut fields = Mapping::new();
    fields.insert(Value::from("status"), Value::from("draft"));
    fields.insert(
        Value::from("tags"),
        Value::Sequence(vec![Value::from("idea")]),
    );
    let body = "Body with [[projects/alpha]].\n";

    vault.write_note("inbox/idea", fields.clone(), body, WriteMode::Create)?;
    let note = vault.read_note("inbox/idea")?;
    assert_eq!(note.frontmatter, fields);
    assert_eq!(note.body, body);
    assert_eq!(note.tags, vec!["idea"]);

    assert!(vault.backlinks("projects/alpha")?.contains(&"inbox/idea".to_string()));
    Ok(())
}

#[test]
fn test_append_and_prepend_keep_frontmatter() -> Result<()> {
    let (_dir, vault) = sample_vault()?;

    vault.append_to_note("projects/alpha", "Appended line.", None)?;
    vault.prepend_to_note("projects/alpha", "Prepended line.", None)?;

    let note = vault.read_note("projects/alpha")?;
    assert_eq!(note.field("status"), Some(&Value::from("active")));
    assert!(note.body.starts_with("Prepended line."));
    assert!(note.body.trim_end().ends_with("Appended line."));

    let err = vault.append_to_note("ghost", "x", None).unwrap_err();
    assert_eq!(err.kind(), "NotFound");
    Ok(())
}

#[test]
fn test_connections_terminate_on_cycles() -> Result<()> {
    let (_dir, vault) = sample_vault()?;

    // alpha <-> beta form a cycle
    let graph = vault.connections("projects/alpha", 10)?;
    let ids: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["projects/alpha", "daily/2024-01-01", "projects/beta"]);
    assert_eq!(graph.nodes[1].distance, 1);

    let shallow = vault.connections("projects/alpha", 0)?;
    assert_eq!(shallow.nodes.len(), 1);
    assert!(shallow.edges.is_empty());
    Ok(())
}

#[test]
fn test_create_collision_leaves_file_untouched() -> Result<()> {
    let (dir, vault) = sample_vault()?;
    let path = dir.path().join("projects/alpha.md");
    let before = fs::read_to_string(&path)?;

    let new = NewNote {
        content: "replacement".to_string(),
        ..NewNote::default()
    };
    let err = vault.create_note("projects/alpha", new).unwrap_err();
    assert_eq!(err.kind(), "AlreadyExists");
    assert_eq!(fs::read_to_string(&path)?, before);
    Ok(())
}

#[test]
fn test_missing_note_operations_report_not_found() -> Result<()> {
    let (_dir, vault) = sample_vault()?;

    assert_eq!(vault.delete_note("ghost").unwrap_err().kind(), "NotFound");
    assert_eq!(vault.backlinks("ghost").unwrap_err().kind(), "NotFound");
    assert_eq!(vault.move_note("ghost", "elsewhere").unwrap_err().kind(), "NotFound");
    Ok(())
}

#[test]
fn test_move_refuses_to_overwrite() -> Result<()> {
    let (_dir, vault) = sample_vault()?;

    let err = vault.move_note("projects/beta", "projects/alpha").unwrap_err();
    assert_eq!(err.kind(), "AlreadyExists");

    let moved = vault.move_note("inbox/lonely", "archive/lonely")?;
    assert_eq!(moved.id, "archive/lonely");
    assert_eq!(vault.read_note("inbox/lonely").unwrap_err().kind(), "NotFound");
    Ok(())
}

#[test]
fn test_link_report_lists_broken_links_and_orphans() -> Result<()> {
    let (_dir, vault) = sample_vault()?;

    let report = vault.link_report();
    assert_eq!(report.unresolved_links, 1);
    assert_eq!(
        report.unresolved_by_note.get("projects/alpha"),
        Some(&vec!["missing".to_string()])
    );
    assert_eq!(report.orphans, vec!["inbox/lonely"]);
    assert_eq!(report.total_links, report.resolved_links + report.unresolved_links);
    Ok(())
}

#[test]
fn test_search_by_frontmatter_and_full_text() -> Result<()> {
    let (_dir, vault) = sample_vault()?;

    let active = vault.search_by_frontmatter(&[FieldPredicate::equals("status", "active")])?;
    assert_eq!(active, vec!["projects/alpha"]);
    let tagged = vault.search_by_frontmatter(&[FieldPredicate::contains("tags", "project")])?;
    assert_eq!(tagged, vec!["projects/alpha"]);

    // Equal match counts fall back to path order.
    let hits = vault.search_notes("beta", &Default::default())?;
    let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["projects/alpha", "projects/beta"]);
    assert_eq!(hits[0].matches, 2);
    assert_eq!(hits[0].snippets, vec!["See [[beta|the beta]] and [[missing]]."]);

    assert_eq!(
        vault.search_notes("  ", &Default::default()).unwrap_err().kind(),
        "InvalidQuery"
    );
    Ok(())
}

#[test]
fn test_sections_read_and_update() -> Result<()> {
    let (_dir, vault) = sample_vault()?;

    let section = vault.read_section("projects/beta", "Beta")?;
    assert!(section.content.contains("Back to"));

    vault.update_section("projects/beta", "# Beta", "Rewritten.\n")?;
    let note = vault.read_note("projects/beta")?;
    assert!(note.body.contains("# Beta"));
    assert!(note.body.contains("Rewritten."));
    assert!(!note.body.contains("Back to"));

    let err = vault.read_section("projects/beta", "Nope").unwrap_err();
    assert_eq!(err.kind(), "SectionNotFound");
    Ok(())
}
