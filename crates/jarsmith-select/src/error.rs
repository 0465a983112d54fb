use thiserror::Error;

#[derive(Debug, Error)]
pub enum SelectError {
    #[error(transparent)]
    Archive(#[from] jarsmith_archive::ArchiveError),
    #[error("malformed class entry {entry}: {source}")]
    Class {
        entry: String,
        #[source]
        source: jarsmith_classfile::Error,
    },
    #[error("cannot generate the companion of {entry}: {source}")]
    Companion {
        entry: String,
        #[source]
        source: crate::companion::CompanionError,
    },
    #[error("generated companion {name} collides with an input class entry")]
    CompanionConflict { name: String },
    #[error(
        "expected every top-level pattern to match at least one class entry; unmatched: {}",
        .patterns.join(", ")
    )]
    UnmatchedPatterns { patterns: Vec<String> },
    #[error("unknown selector preset `{0}`")]
    UnknownPreset(String),
    #[error(
        "invalid pattern `{0}`: patterns are non-empty and may only end in `*`"
    )]
    InvalidPattern(String),
}
