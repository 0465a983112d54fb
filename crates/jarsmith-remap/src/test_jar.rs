use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use jarsmith_archive::{transfer, Archive, ArchiveEntry, TransferStats};
use jarsmith_classfile::{entry_to_internal_name, is_jdk_type, Pipeline};

use crate::error::RemapError;
use crate::remapper::TypeRemapper;

/// Namespace for JDK types a test jar carries but the desugar jar lacks.
pub const RELOCATION_PREFIX: &str = "jdk11/";

/// Prepares a test jar to run against a selected desugar library jar.
///
/// Test classes the desugar jar already ships are omitted. JDK-owned types
/// that only the test jar provides are moved under [`RELOCATION_PREFIX`], and
/// every reference to them is rewritten.
#[derive(Debug, Clone)]
pub struct TestJarSelector {
    shipped: BTreeSet<String>,
    relocated: Arc<BTreeSet<String>>,
}

impl TestJarSelector {
    pub fn scan(desugar_jar: &Path, test_jar: &Path) -> Result<Self, RemapError> {
        let shipped = class_names(desugar_jar)?;
        let relocated: BTreeSet<String> = class_names(test_jar)?
            .into_iter()
            .filter(|name| is_jdk_type(name) && !shipped.contains(name))
            .collect();
        tracing::debug!(
            target: "jarsmith.remap",
            shipped = shipped.len(),
            relocated = relocated.len(),
            "scanned test and desugar archives"
        );
        Ok(Self {
            shipped,
            relocated: Arc::new(relocated),
        })
    }

    pub fn is_omitted(&self, name: &str) -> bool {
        self.shipped.contains(name)
    }

    pub fn relocated_types(&self) -> impl Iterator<Item = &str> {
        self.relocated.iter().map(String::as_str)
    }

    pub fn pipeline(&self) -> Pipeline {
        let relocated = Arc::clone(&self.relocated);
        Pipeline::new().stage(TypeRemapper::prefixing(
            move |name| relocated.contains(name),
            RELOCATION_PREFIX,
        ))
    }

    /// Entry names are kept, including those of relocated classes.
    pub fn run(&self, test_jar: &Path, output: &Path) -> Result<TransferStats, RemapError> {
        let pipeline = self.pipeline();
        transfer(&[test_jar.to_path_buf()], output, |entry: ArchiveEntry| {
            let name = entry_to_internal_name(&entry.name).unwrap_or_default();
            if self.is_omitted(name) {
                tracing::info!(
                    target: "jarsmith.remap",
                    entry = %entry.name,
                    "omitted type already shipped by the desugar jar"
                );
                return Ok(Vec::new());
            }
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

fn class_names(jar: &Path) -> Result<BTreeSet<String>, RemapError> {
    Ok(Archive::new(jar)
        .entry_names()?
        .iter()
        .filter_map(|name| entry_to_internal_name(name))
        .map(str::to_string)
        .collect())
}
