//! Public methods of a desugared JDK library jar, each paired with the JDK
//! API it stands in for.

use std::fmt;
use std::path::Path;

use jarsmith_archive::Archive;
use jarsmith_classfile::{is_class_entry, ClassFile, ReadOptions, ACC_PUBLIC};

use crate::error::AnalyzerError;

const COMPANION_MARKER: &str = "/Desugar";
const INTERFACE_COMPANION_SUFFIX: &str = "$-CC";
const DEFAULT_METHOD_PREFIX: &str = "$default$";

/// Package renames undone by [`undo_desugar_mirrored_type`], applied in order.
const MIRROR_RENAMES: &[(&str, &str)] = &[
    ("j$/desugar/", "desugar/"),
    ("j$/libcore/", "libcore/"),
    ("j$/jdk/", "jdk/"),
    ("j$/", "java/"),
    (COMPANION_MARKER, "/"),
    (INTERFACE_COMPANION_SUFFIX, ""),
];

/// Maps a name or descriptor from the desugared library back to the JDK
/// types it mirrors.
pub fn undo_desugar_mirrored_type(text: &str) -> String {
    MIRROR_RENAMES
        .iter()
        .fold(text.to_string(), |text, (from, to)| text.replace(from, to))
}

/// One public method of the library and the JDK method it provides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRecord {
    pub class: String,
    pub name: String,
    pub descriptor: String,
    pub api_class: String,
    pub api_name: String,
    pub api_descriptor: String,
}

impl ApiRecord {
    /// `Desugar` companions and `$-CC` interface companions carry instance
    /// methods as statics taking the receiver first; that parameter is
    /// dropped from the API descriptor.
    pub fn new(class: &str, name: &str, descriptor: &str) -> Self {
        let (api_class, api_name, api_descriptor) = if class.contains(COMPANION_MARKER) {
            let owner = class.replace(COMPANION_MARKER, "/");
            let descriptor = strip_receiver(descriptor, &owner);
            (owner, name.to_string(), descriptor)
        } else if let Some(owner) = class.strip_suffix(INTERFACE_COMPANION_SUFFIX) {
            let descriptor = if name.starts_with(DEFAULT_METHOD_PREFIX) {
                strip_receiver(descriptor, owner)
            } else {
                descriptor.to_string()
            };
            (
                owner.to_string(),
                name.replace(DEFAULT_METHOD_PREFIX, ""),
                descriptor,
            )
        } else {
            (class.to_string(), name.to_string(), descriptor.to_string())
        };
        Self {
            class: class.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            api_class: undo_desugar_mirrored_type(&api_class),
            api_name,
            api_descriptor: undo_desugar_mirrored_type(&api_descriptor),
        }
    }
}

/// `class,name,descriptor,api_class,api_name,api_descriptor`
impl fmt::Display for ApiRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{}",
            self.class,
            self.name,
            self.descriptor,
            self.api_class,
            self.api_name,
            self.api_descriptor
        )
    }
}

fn strip_receiver(descriptor: &str, owner: &str) -> String {
    match descriptor
        .strip_prefix("(L")
        .and_then(|rest| rest.strip_prefix(owner))
        .and_then(|rest| rest.strip_prefix(';'))
    {
        Some(rest) => format!("({rest}"),
        None => descriptor.to_string(),
    }
}

/// Records for every public method of every public class of `jar`, in
/// archive and declaration order.
pub fn list_desugared_apis(jar: &Path) -> Result<Vec<ApiRecord>, AnalyzerError> {
    let mut records = Vec::new();
    let mut classes = 0usize;
    Archive::new(jar).for_each_entry(|entry| {
        if !is_class_entry(&entry.name) {
            return Ok(());
        }
        let class_error = |source| AnalyzerError::Class {
            entry: entry.name.clone(),
            source,
        };
        let class = ClassFile::parse_with(&entry.data, ReadOptions::STRUCTURE_ONLY)
            .map_err(class_error)?;
        if class.access_flags & ACC_PUBLIC == 0 {
            return Ok(());
        }
        classes += 1;
        let cp = &class.constant_pool;
        let name = class.name().map_err(class_error)?;
        for method in &class.methods {
            if method.access_flags & ACC_PUBLIC == 0 {
                continue;
            }
            let method_name = method.name(cp).map_err(class_error)?;
            let descriptor = method.descriptor(cp).map_err(class_error)?;
            records.push(ApiRecord::new(name, method_name, descriptor));
        }
        Ok::<_, AnalyzerError>(())
    })?;
    tracing::debug!(
        target: "jarsmith.apianalyzer",
        jar = %jar.display(),
        classes,
        methods = records.len(),
        "listed desugared apis"
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn mirrored_packages_map_back_to_the_jdk() {
        assert_eq!(
            undo_desugar_mirrored_type("j$/util/DesugarCollections"),
            "java/util/Collections"
        );
        assert_eq!(
            undo_desugar_mirrored_type("(Lj$/desugar/sun/nio/fs/X;)Lj$/jdk/internal/Y;"),
            "(Ldesugar/sun/nio/fs/X;)Ljdk/internal/Y;"
        );
        assert_eq!(
            undo_desugar_mirrored_type("j$/libcore/io/Memory"),
            "libcore/io/Memory"
        );
        assert_eq!(
            undo_desugar_mirrored_type("j$/util/Map$-CC"),
            "java/util/Map"
        );
    }

    #[test]
    fn companion_methods_drop_their_receiver() {
        let record = ApiRecord::new(
            "j$/util/DesugarOptional",
            "isEmpty",
            "(Lj$/util/Optional;)Z",
        );
        assert_eq!(record.api_class, "java/util/Optional");
        assert_eq!(record.api_name, "isEmpty");
        assert_eq!(record.api_descriptor, "()Z");
        assert_eq!(
            record.to_string(),
            "j$/util/DesugarOptional,isEmpty,(Lj$/util/Optional;)Z,\
             java/util/Optional,isEmpty,()Z"
        );

        let record = ApiRecord::new("java/util/DesugarLong", "sum", "(JJ)J");
        assert_eq!(record.api_class, "java/util/Long");
        assert_eq!(record.api_descriptor, "(JJ)J");
    }

    #[test]
    fn interface_companions_keep_receivers_of_static_methods() {
        let record = ApiRecord::new(
            "j$/util/Map$-CC",
            "$default$getOrDefault",
            "(Lj$/util/Map;Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;",
        );
        assert_eq!(record.api_class, "java/util/Map");
        assert_eq!(record.api_name, "getOrDefault");
        assert_eq!(
            record.api_descriptor,
            "(Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;"
        );

        let record = ApiRecord::new("j$/util/Map$-CC", "of", "(Lj$/util/Map;)Lj$/util/Map;");
        assert_eq!(record.api_name, "of");
        assert_eq!(record.api_descriptor, "(Ljava/util/Map;)Ljava/util/Map;");
    }

    #[test]
    fn receivers_of_other_types_are_kept() {
        let record = ApiRecord::new(
            "j$/util/DesugarArrays",
            "stream",
            "(Lj$/util/ArraysHelper;)V",
        );
        assert_eq!(record.api_descriptor, "(Ljava/util/ArraysHelper;)V");
    }
}
