//! Reference target resolution against the current set of notes.
//!
//! Order: path relative to the source folder (inline links only), exact
//! identity, then path-suffix match where the candidate with the fewest
//! segments wins. With the case-insensitive fallback enabled the last two
//! steps are repeated on lowercased identities. A tie is ambiguous and
//! resolves to nothing.

use std::collections::{BTreeSet, HashMap};

use crate::core::links::{LinkReference, ReferenceKind};
use crate::core::paths::note_id;

enum Lookup {
    Found(String),
    Ambiguous(Vec<String>),
    Missing,
}

pub struct LinkResolver {
    ids: BTreeSet<String>,
    /// Last path segment -> identities.
    by_name: HashMap<String, Vec<String>>,
    /// Lowercased identity -> identities.
    lower_ids: HashMap<String, Vec<String>>,
    /// Lowercased last segment -> identities.
    lower_names: HashMap<String, Vec<String>>,
    case_insensitive: bool,
}

impl LinkResolver {
    pub fn new<'a>(ids: impl IntoIterator<Item = &'a str>, case_insensitive: bool) -> Self {
        let mut resolver = Self {
            ids: BTreeSet::new(),
            by_name: HashMap::new(),
            lower_ids: HashMap::new(),
            lower_names: HashMap::new(),
            case_insensitive,
        };

        for id in ids {
            let name = last_segment(id);
            resolver
                .by_name
                .entry(name.to_string())
                .or_default()
                .push(id.to_string());
            if case_insensitive {
                resolver
                    .lower_ids
                    .entry(id.to_lowercase())
                    .or_default()
                    .push(id.to_string());
                resolver
                    .lower_names
                    .entry(name.to_lowercase())
                    .or_default()
                    .push(id.to_string());
            }
            resolver.ids.insert(id.to_string());
        }
        resolver
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Resolve a reference found in note `source`. Tags never resolve.
    pub fn resolve(&self, reference: &LinkReference, source: &str) -> Option<String> {
        match reference.kind {
            ReferenceKind::InlineTag => None,
            ReferenceKind::Wikilink => self.resolve_target(&reference.raw, None),
            ReferenceKind::InlineLink => {
                let folder = source.rsplit_once('/').map(|(folder, _)| folder).unwrap_or("");
                self.resolve_target(&reference.raw, Some(folder))
            }
        }
    }

    /// Fill in `resolved` on every reference of one note.
    pub fn resolve_all(&self, references: &mut [LinkReference], source: &str) {
        for reference in references.iter_mut() {
            reference.resolved = self.resolve(reference, source);
        }
    }

    pub fn resolve_target(&self, raw: &str, relative_to: Option<&str>) -> Option<String> {
        let target = normalize_target(raw)?;

        if let Some(folder) = relative_to {
            if let Some(joined) = collapse(&format!("{}/{}", folder, target)) {
                if self.ids.contains(&joined) {
                    return Some(joined);
                }
            }
        }
        let target = collapse(&target)?;

        match self.lookup(&target) {
            Lookup::Found(id) => return Some(id),
            Lookup::Ambiguous(candidates) => {
                tracing::debug!(target = %raw, ?candidates, "AmbiguousReference");
                return None;
            }
            Lookup::Missing => {}
        }

        if self.case_insensitive {
            match self.lookup_lowercase(&target.to_lowercase()) {
                Lookup::Found(id) => return Some(id),
                Lookup::Ambiguous(candidates) => {
                    tracing::debug!(target = %raw, ?candidates, "AmbiguousReference");
                }
                Lookup::Missing => {}
            }
        }
        None
    }

    fn lookup(&self, target: &str) -> Lookup {
        if self.ids.contains(target) {
            return Lookup::Found(target.to_string());
        }
        let suffix = format!("/{}", target);
        let candidates = self
            .by_name
            .get(last_segment(target))
            .into_iter()
            .flatten()
            .filter(|id| id.ends_with(&suffix));
        shortest(candidates)
    }

    fn lookup_lowercase(&self, target: &str) -> Lookup {
        if let Some(exact) = self.lower_ids.get(target) {
            return shortest(exact.iter());
        }
        let suffix = format!("/{}", target);
        let candidates = self
            .lower_names
            .get(last_segment(target))
            .into_iter()
            .flatten()
            .filter(|id| id.to_lowercase().ends_with(&suffix));
        shortest(candidates)
    }
}

/// Pick the candidate with the fewest path segments; a tie is ambiguous.
fn shortest<'a>(candidates: impl Iterator<Item = &'a String>) -> Lookup {
    let mut best: Vec<&String> = Vec::new();
    let mut best_depth = usize::MAX;

    for candidate in candidates {
        let depth = candidate.matches('/').count();
        if depth < best_depth {
            best_depth = depth;
            best.clear();
        }
        if depth == best_depth {
            best.push(candidate);
        }
    }

    match best.as_slice() {
        [] => Lookup::Missing,
        [only] => Lookup::Found((*only).clone()),
        many => {
            let mut names: Vec<String> = many.iter().map(|s| s.to_string()).collect();
            names.sort();
            Lookup::Ambiguous(names)
        }
    }
}

fn last_segment(id: &str) -> &str {
    id.rsplit('/').next().unwrap_or(id)
}

fn normalize_target(raw: &str) -> Option<String> {
    let mut target = raw.trim().replace('\\', "/");
    while let Some(rest) = target.strip_prefix("./") {
        target = rest.to_string();
    }
    let target = note_id(target.trim_start_matches('/'));
    if target.is_empty() {
        None
    } else {
        Some(target)
    }
}

/// Collapse `.` and `..` segments; `None` when the path climbs above the root.
fn collapse(path: &str) -> Option<String> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            s => segments.push(s),
        }
    }
    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::links::extract;

    const IDS: [&str; 7] = [
        "Alpha",
        "projects/alpha",
        "projects/beta",
        "archive/projects/beta",
        "daily/2024-01-01",
        "one/Gamma",
        "two/Gamma",
    ];

    fn resolver(case_insensitive: bool) -> LinkResolver {
        LinkResolver::new(IDS, case_insensitive)
    }

    #[test]
    fn test_exact_and_extension() {
        let r = resolver(true);
        assert_eq!(r.resolve_target("projects/alpha", None).as_deref(), Some("projects/alpha"));
        assert_eq!(r.resolve_target("projects/alpha.md", None).as_deref(), Some("projects/alpha"));
        assert_eq!(r.resolve_target("./Alpha", None).as_deref(), Some("Alpha"));
        assert_eq!(r.resolve_target("missing", None), None);
    }

    #[test]
    fn test_shortest_path_wins() {
        let r = resolver(true);
        assert_eq!(r.resolve_target("beta", None).as_deref(), Some("projects/beta"));
        assert_eq!(
            r.resolve_target("projects/beta", None).as_deref(),
            Some("projects/beta")
        );
    }

    #[test]
    fn test_ambiguous_resolves_to_none() {
        let r = resolver(true);
        assert_eq!(r.resolve_target("Gamma", None), None);
        assert_eq!(r.resolve_target("one/Gamma", None).as_deref(), Some("one/Gamma"));
    }

    #[test]
    fn test_case_insensitive_fallback() {
        assert_eq!(
            resolver(true).resolve_target("PROJECTS/Alpha", None).as_deref(),
            Some("projects/alpha")
        );
        assert_eq!(resolver(false).resolve_target("PROJECTS/Alpha", None), None);
        // Case-sensitive suffix matches come before the lowercase pass.
        assert_eq!(resolver(true).resolve_target("alpha", None).as_deref(), Some("projects/alpha"));
        assert_eq!(resolver(true).resolve_target("ALPHA", None).as_deref(), Some("Alpha"));
    }

    #[test]
    fn test_inline_links_are_relative_to_source() {
        let r = resolver(true);
        let mut refs = extract("[b](beta.md) [a](../Alpha.md) [up](../../../x.md) #tag");
        r.resolve_all(&mut refs, "projects/alpha");
        let resolved: Vec<Option<&str>> = refs.iter().map(|r| r.resolved.as_deref()).collect();
        assert_eq!(resolved, vec![Some("projects/beta"), Some("Alpha"), None, None]);
    }
}
