//! Full-text, tag and frontmatter search over a vault scan.

pub mod engine;

pub use engine::{
    FieldPredicate, PredicateOp, SearchEngine, SearchHit, SearchOptions, VaultStats,
    DEFAULT_MAX_SNIPPETS,
};
