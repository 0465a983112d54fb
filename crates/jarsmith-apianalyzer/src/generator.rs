use std::fmt;
use std::io::Write;
use std::path::Path;

use jarsmith_archive::Archive;
use jarsmith_classfile::{is_class_entry, JDK_PACKAGE_PREFIXES};

use crate::digest::{ClassDigest, ClassDigestCollection};
use crate::error::AnalyzerError;
use crate::textproto;

type DigestFilter = dyn Fn(&ClassDigest) -> bool + Send + Sync;

/// Builds the digest collection of a jar's classes.
pub struct ClassDigestGenerator {
    filter: Box<DigestFilter>,
}

impl ClassDigestGenerator {
    pub fn new(filter: impl Fn(&ClassDigest) -> bool + Send + Sync + 'static) -> Self {
        Self {
            filter: Box::new(filter),
        }
    }

    /// Keeps types whose internal name starts with one of `prefixes`.
    pub fn with_package_prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let prefixes: Vec<String> = prefixes.into_iter().map(Into::into).collect();
        Self::new(move |digest| {
            prefixes
                .iter()
                .any(|prefix| digest.name.starts_with(prefix.as_str()))
        })
    }

    /// Keeps JDK-owned types: `com/sun/`, `java/`, `javax/`, `jdk/`, `sun/`
    /// and the desugared `j$/` mirror.
    pub fn jdk_types() -> Self {
        Self::with_package_prefixes(JDK_PACKAGE_PREFIXES.iter().copied())
    }

    /// Digests of every accepted class in archive order. A malformed class
    /// aborts the whole archive.
    pub fn read(&self, jar: &Path) -> Result<ClassDigestCollection, AnalyzerError> {
        let mut collection = ClassDigestCollection::default();
        let mut skipped = 0usize;
        Archive::new(jar).for_each_entry(|entry| {
            if !is_class_entry(&entry.name) {
                return Ok(());
            }
            let digest = ClassDigest::from_bytes(&entry.data).map_err(|source| {
                AnalyzerError::Class {
                    entry: entry.name.clone(),
                    source,
                }
            })?;
            if (self.filter)(&digest) {
                collection.classes.push(digest);
            } else {
                skipped += 1;
            }
            Ok::<_, AnalyzerError>(())
        })?;
        tracing::debug!(
            target: "jarsmith.apianalyzer",
            jar = %jar.display(),
            kept = collection.len(),
            skipped,
            "generated class digests"
        );
        Ok(collection)
    }
}

impl Default for ClassDigestGenerator {
    fn default() -> Self {
        Self::jdk_types()
    }
}

impl fmt::Debug for ClassDigestGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDigestGenerator")
            .finish_non_exhaustive()
    }
}

/// Writes the text digest of `collection` to `path`, replacing it atomically.
pub fn write_text_digest(
    collection: &ClassDigestCollection,
    path: &Path,
) -> Result<(), AnalyzerError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let text = textproto::to_text(collection);
    let mut tmp =
        tempfile::NamedTempFile::new_in(parent).map_err(|err| AnalyzerError::io(parent, err))?;
    tmp.write_all(text.as_bytes())
        .map_err(|err| AnalyzerError::io(tmp.path(), err))?;
    tmp.as_file()
        .sync_all()
        .map_err(|err| AnalyzerError::io(tmp.path(), err))?;
    tmp.persist(path)
        .map_err(|err| AnalyzerError::io(path, err.error))?;
    Ok(())
}

pub fn read_text_digest(path: &Path) -> Result<ClassDigestCollection, AnalyzerError> {
    let text = std::fs::read_to_string(path).map_err(|err| AnalyzerError::io(path, err))?;
    textproto::parse(&text)
}
