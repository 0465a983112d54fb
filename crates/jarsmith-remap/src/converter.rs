use std::path::{Path, PathBuf};

use jarsmith_archive::{transfer, ArchiveEntry, TransferStats};
use jarsmith_classfile::Pipeline;

use crate::error::RemapError;
use crate::remapper::TypeRemapper;
use crate::retarget::InvocationRetarget;

/// Package prefixes relocated by default.
pub const WRAPPED_PREFIXES: &[&str] = &["java/nio/", "j$/nio/", "java/io/", "j$/io/"];

pub const WRAPPER_NAMESPACE: &str = "__wrapper__/";

/// Relocates the types of selected packages under a wrapper namespace in
/// every class of one or more jars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeWrapperConverter {
    prefixes: Vec<String>,
    namespace: String,
}

impl Default for TypeWrapperConverter {
    fn default() -> Self {
        Self::new(WRAPPED_PREFIXES.iter().copied(), WRAPPER_NAMESPACE)
    }
}

impl TypeWrapperConverter {
    pub fn new<I, S>(prefixes: I, namespace: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
            namespace: namespace.into(),
        }
    }

    pub fn wraps(&self, name: &str) -> bool {
        wraps(&self.prefixes, name)
    }

    pub fn wrapped_name(&self, name: &str) -> Option<String> {
        self.wraps(name).then(|| format!("{}{name}", self.namespace))
    }

    /// `[type-remapper, invocation-retarget]`.
    pub fn pipeline(&self) -> Pipeline {
        let prefixes = self.prefixes.clone();
        let remapper =
            TypeRemapper::prefixing(move |name| wraps(&prefixes, name), self.namespace.clone());
        Pipeline::new().stage(remapper).stage(InvocationRetarget)
    }

    /// Streams `inputs`, in order, into `output`, rewriting every class and
    /// keeping entry names.
    pub fn convert(&self, inputs: &[PathBuf], output: &Path) -> Result<TransferStats, RemapError> {
        if inputs.is_empty() {
            return Err(RemapError::NoInputs);
        }
        let pipeline = self.pipeline();
        tracing::debug!(
            target: "jarsmith.remap",
            inputs = inputs.len(),
            prefixes = ?self.prefixes,
            namespace = %self.namespace,
            "converting archives"
        );
        transfer(inputs, output, |entry: ArchiveEntry| {
            let data = pipeline
                .run(&entry.data)
                .map_err(|source| RemapError::Class {
                    entry: entry.name.clone(),
                    source,
                })?;
            Ok(vec![ArchiveEntry::new(entry.name, data)])
        })
    }
}

fn wraps(prefixes: &[String], name: &str) -> bool {
    prefixes.iter().any(|prefix| name.starts_with(prefix.as_str()))
}
