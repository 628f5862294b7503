//! YAML frontmatter codec.
//!
//! A note may start with a `---` line followed by a YAML mapping and a closing
//! `---` (or `...`) line. Everything after the closing line is the body,
//! byte for byte.

use serde_yaml::{Mapping, Value};
use thiserror::Error;

pub const TAGS_KEY: &str = "tags";

#[derive(Debug, Error)]
pub enum FrontmatterError {
    #[error("{0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("frontmatter must be a key/value mapping")]
    NotMapping,
}

/// Split raw note text into the YAML block (if any) and the body.
pub fn split(content: &str) -> (Option<&str>, &str) {
    let text = content.strip_prefix('\u{feff}').unwrap_or(content);

    let after_open = match text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
    {
        Some(rest) => rest,
        None => return (None, content),
    };

    let mut offset = 0;
    for line in after_open.split_inclusive('\n') {
        let bare = line.trim_end_matches(['\n', '\r']);
        if bare == "---" || bare == "..." {
            let yaml = &after_open[..offset];
            let body = &after_open[offset + line.len()..];
            return (Some(yaml), body);
        }
        offset += line.len();
    }

    (None, content)
}

/// Parse raw note text into ordered fields and the body.
pub fn parse(content: &str) -> Result<(Mapping, &str), FrontmatterError> {
    match split(content) {
        (None, body) => Ok((Mapping::new(), body)),
        (Some(yaml), body) => Ok((parse_fields(yaml)?, body)),
    }
}

fn parse_fields(yaml: &str) -> Result<Mapping, FrontmatterError> {
    if yaml.trim().is_empty() {
        return Ok(Mapping::new());
    }
    match serde_yaml::from_str::<Value>(yaml)? {
        Value::Mapping(fields) => Ok(fields),
        Value::Null => Ok(Mapping::new()),
        _ => Err(FrontmatterError::NotMapping),
    }
}

/// Render fields and body back into note text. Empty fields produce no
/// header, unless the body itself opens with something `split` would take
/// for one; then an empty header keeps the body intact.
pub fn serialize(fields: &Mapping, body: &str) -> Result<String, FrontmatterError> {
    if fields.is_empty() {
        return Ok(match split(body) {
            (Some(_), _) => format!("---\n---\n{}", body),
            (None, _) => body.to_string(),
        });
    }
    let yaml = serde_yaml::to_string(fields)?;
    Ok(format!("---\n{}---\n{}", yaml, body))
}

/// Overlay `patch` on `base`; existing keys keep their position.
pub fn merge(base: &mut Mapping, patch: Mapping) {
    for (key, value) in patch {
        base.insert(key, value);
    }
}

/// Convert a JSON object (tool parameters) into frontmatter fields.
pub fn fields_from_json(value: &serde_json::Value) -> Result<Mapping, FrontmatterError> {
    match serde_yaml::to_value(value)? {
        Value::Mapping(fields) => Ok(fields),
        Value::Null => Ok(Mapping::new()),
        _ => Err(FrontmatterError::NotMapping),
    }
}

/// String form of a scalar value. Null, sequences and mappings have none.
pub fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_string(&tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

/// Strip `#` markers and whitespace; `None` when nothing is left.
pub fn normalize_tag(raw: &str, lowercase: bool) -> Option<String> {
    let tag = raw.trim().trim_start_matches('#').trim();
    if tag.is_empty() {
        return None;
    }
    Some(if lowercase {
        tag.to_lowercase()
    } else {
        tag.to_string()
    })
}

/// Tags declared in the `tags` field. A plain string is split on commas and
/// whitespace.
pub fn tags_from(fields: &Mapping, lowercase: bool) -> Vec<String> {
    let raw: Vec<String> = match fields.get(TAGS_KEY) {
        Some(Value::Sequence(items)) => items.iter().filter_map(scalar_string).collect(),
        Some(Value::String(s)) => s
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(String::from)
            .collect(),
        Some(other) => scalar_string(other).into_iter().collect(),
        None => Vec::new(),
    };

    let mut tags: Vec<String> = Vec::new();
    for tag in raw.iter().filter_map(|t| normalize_tag(t, lowercase)) {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

pub fn set_tags(fields: &mut Mapping, tags: Vec<String>) {
    let items = tags.into_iter().map(Value::String).collect();
    fields.insert(Value::String(TAGS_KEY.to_string()), Value::Sequence(items));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_without_header() {
        let (yaml, body) = split("# Title\n\nbody");
        assert!(yaml.is_none());
        assert_eq!(body, "# Title\n\nbody");
    }

    #[test]
    fn test_split_unterminated_header_is_body() {
        let text = "---\ntitle: x\nno closing line";
        let (yaml, body) = split(text);
        assert!(yaml.is_none());
        assert_eq!(body, text);
    }

    #[test]
    fn test_parse_keeps_order_and_body() {
        let text = "---\ntitle: Alpha\ntags: [one, two]\nstatus: draft\n---\nBody line\n";
        let (fields, body) = parse(text).unwrap();
        let keys: Vec<String> = fields
            .keys()
            .filter_map(|k| k.as_str().map(String::from))
            .collect();
        assert_eq!(keys, vec!["title", "tags", "status"]);
        assert_eq!(body, "Body line\n");
        assert_eq!(tags_from(&fields, false), vec!["one", "two"]);
    }

    #[test]
    fn test_malformed_yaml_is_error() {
        let text = "---\ntitle: [unclosed\n---\nbody";
        assert!(parse(text).is_err());

        let text = "---\n- just\n- a list\n---\nbody";
        assert!(matches!(parse(text), Err(FrontmatterError::NotMapping)));
    }

    #[test]
    fn test_serialize_round_trip() {
        let text = "---\ntitle: Alpha\n---\n\nSome *body*\n";
        let (fields, body) = parse(text).unwrap();
        let rendered = serialize(&fields, body).unwrap();
        let (again, again_body) = parse(&rendered).unwrap();
        assert_eq!(fields, again);
        assert_eq!(body, again_body);
    }

    #[test]
    fn test_serialize_empty_fields_is_body() {
        assert_eq!(serialize(&Mapping::new(), "plain").unwrap(), "plain");
        assert_eq!(serialize(&Mapping::new(), "---\nno closing").unwrap(), "---\nno closing");
    }

    #[test]
    fn test_body_that_looks_like_header_survives() {
        let body = "---\nstatus: draft\n---\nreal text\n";
        let rendered = serialize(&Mapping::new(), body).unwrap();
        assert_eq!(rendered, format!("---\n---\n{}", body));

        let (fields, again) = parse(&rendered).unwrap();
        assert!(fields.is_empty());
        assert_eq!(again, body);
    }

    #[test]
    fn test_tags_from_string_and_markers() {
        let (fields, _) = parse("---\ntags: \"#Work, ideas  #work\"\n---\n").unwrap();
        assert_eq!(tags_from(&fields, false), vec!["Work", "ideas", "work"]);
        assert_eq!(tags_from(&fields, true), vec!["work", "ideas"]);
    }

    #[test]
    fn test_merge_overrides_in_place() {
        let (mut base, _) = parse("---\na: 1\nb: 2\n---\n").unwrap();
        let (patch, _) = parse("---\nb: 3\nc: 4\n---\n").unwrap();
        merge(&mut base, patch);
        let rendered = serialize(&base, "").unwrap();
        assert_eq!(rendered, "---\na: 1\nb: 3\nc: 4\n---\n");
    }

    #[test]
    fn test_normalize_tag() {
        assert_eq!(normalize_tag("  #Project/Alpha ", false).as_deref(), Some("Project/Alpha"));
        assert_eq!(normalize_tag("##x", true).as_deref(), Some("x"));
        assert_eq!(normalize_tag(" # ", false), None);
    }
}
