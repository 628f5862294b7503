use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, VaultError>;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("note not found: {0}")]
    NotFound(String),

    #[error("note already exists: {0}")]
    AlreadyExists(String),

    #[error("malformed frontmatter in '{id}': {message}")]
    Parse { id: String, message: String },

    #[error("invalid tag: '{0}'")]
    InvalidTag(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("section '{heading}' not found in '{id}'")]
    SectionNotFound { id: String, heading: String },

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("no template mapping for folder: {0}")]
    MappingNotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl VaultError {
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable kind name surfaced to callers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidPath { .. } => "InvalidPath",
            Self::NotFound(_) => "NotFound",
            Self::AlreadyExists(_) => "AlreadyExists",
            Self::Parse { .. } => "ParseError",
            Self::InvalidTag(_) => "InvalidTag",
            Self::InvalidQuery(_) => "InvalidQuery",
            Self::SectionNotFound { .. } => "SectionNotFound",
            Self::TemplateNotFound(_) => "TemplateNotFound",
            Self::MappingNotFound(_) => "MappingNotFound",
            Self::Config(_) => "ConfigError",
            Self::Io { .. } => "IoError",
        }
    }

    /// The identifier the failure is about.
    pub fn subject(&self) -> String {
        match self {
            Self::InvalidPath { path, .. } => path.clone(),
            Self::NotFound(id) | Self::AlreadyExists(id) => id.clone(),
            Self::Parse { id, .. } | Self::SectionNotFound { id, .. } => id.clone(),
            Self::InvalidTag(tag) => tag.clone(),
            Self::InvalidQuery(query) => query.clone(),
            Self::TemplateNotFound(name) => name.clone(),
            Self::MappingNotFound(folder) => folder.clone(),
            Self::Config(_) => String::new(),
            Self::Io { path, .. } => path.to_string_lossy().to_string(),
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            subject: self.subject(),
            message: self.to_string(),
        }
    }
}

/// Structured error payload for tool results and `--json` output.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub kind: &'static str,
    pub subject: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_subject() {
        let err = VaultError::invalid_path("../etc/passwd", "parent traversal");
        assert_eq!(err.kind(), "InvalidPath");
        assert_eq!(err.subject(), "../etc/passwd");

        let err = VaultError::Parse {
            id: "daily/today".to_string(),
            message: "bad indent".to_string(),
        };
        let report = err.report();
        assert_eq!(report.kind, "ParseError");
        assert_eq!(report.subject, "daily/today");
        assert!(report.message.contains("bad indent"));
    }
}
