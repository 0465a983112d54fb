use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemapError {
    #[error(transparent)]
    Archive(#[from] jarsmith_archive::ArchiveError),
    #[error("failed to rewrite class entry {entry}: {source}")]
    Class {
        entry: String,
        #[source]
        source: jarsmith_classfile::Error,
    },
    #[error("expected at least one input archive")]
    NoInputs,
}
