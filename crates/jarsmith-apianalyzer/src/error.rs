use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error(transparent)]
    Archive(#[from] jarsmith_archive::ArchiveError),
    #[error("malformed class entry {entry}: {source}")]
    Class {
        entry: String,
        #[source]
        source: jarsmith_classfile::Error,
    },
    #[error("malformed class file: {0}")]
    ClassFormat(#[from] jarsmith_classfile::Error),
    #[error("text digest {line}:{column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },
    #[error("type `{0}` appears more than once in the digest collection")]
    DuplicateType(String),
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AnalyzerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
