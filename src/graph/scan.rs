use serde::Serialize;

use crate::core::links::LinkReference;
use crate::core::note::Note;
use crate::core::store::NoteStore;

pub struct ScannedNote {
    pub note: Note,
    pub references: Vec<LinkReference>,
}

/// A note that was skipped or only partially understood during a scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanWarning {
    pub note: String,
    pub kind: &'static str,
    pub message: String,
    /// The note is missing from the scan entirely.
    pub skipped: bool,
}

/// Every readable note in the vault, read once.
///
/// Each file is read with a single call and writers replace files by rename,
/// so every note is internally consistent. Two notes may still have been
/// read at different instants: a scan is not a snapshot of the whole vault.
///
/// Scans are rebuilt per query. An incremental cache keyed by file
/// modification time would slot in front of [`VaultScan::collect`].
#[derive(Default)]
pub struct VaultScan {
    /// Sorted by identity.
    pub notes: Vec<ScannedNote>,
    pub warnings: Vec<ScanWarning>,
}

impl VaultScan {
    pub fn collect(store: &NoteStore) -> Self {
        let mut scan = Self::default();

        for id in store.list() {
            match store.read_with_references(&id) {
                Ok((note, references)) => {
                    if let Some(message) = &note.frontmatter_error {
                        scan.warnings.push(ScanWarning {
                            note: id.clone(),
                            kind: "ParseError",
                            message: message.clone(),
                            skipped: false,
                        });
                    }
                    scan.notes.push(ScannedNote { note, references });
                }
                Err(e) => {
                    tracing::warn!(note = %id, error = %e, "skipping unreadable note");
                    scan.warnings.push(ScanWarning {
                        note: id,
                        kind: e.kind(),
                        message: e.to_string(),
                        skipped: true,
                    });
                }
            }
        }

        tracing::debug!(
            notes = scan.notes.len(),
            skipped = scan.skipped(),
            "vault scanned"
        );
        scan
    }

    pub fn get(&self, id: &str) -> Option<&ScannedNote> {
        self.notes
            .binary_search_by(|n| n.note.id.as_str().cmp(id))
            .ok()
            .map(|i| &self.notes[i])
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.notes.iter().map(|n| n.note.id.as_str())
    }

    pub fn skipped(&self) -> usize {
        self.warnings.iter().filter(|w| w.skipped).count()
    }
}
