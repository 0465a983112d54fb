//! Structure-preserving rewrite of internal type names.
//!
//! Only `CONSTANT_Utf8` text is ever replaced, and never in place: a rewritten
//! name is interned (appended once) and the referencing slot is repointed. No
//! existing pool index moves, so bytecode operands stay valid and a UTF-8
//! entry shared with a string literal keeps its text.

use std::fmt;

use jarsmith_classfile::{
    attribute_refs, map_class_constant, map_descriptor, map_signature, Attribute, ClassFile,
    ClassTransform, Constant, ConstantPool, Error, NameMapper, RefKind, Result,
};

type NameFilter = dyn Fn(&str) -> bool + Send + Sync;
type NameRewrite = dyn Fn(&str) -> String + Send + Sync;

/// Rewrites every internal name accepted by `filter` to `rewrite(name)`.
pub struct TypeRemapper {
    filter: Box<NameFilter>,
    rewrite: Box<NameRewrite>,
}

impl TypeRemapper {
    pub fn new<F, R>(filter: F, rewrite: R) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
        R: Fn(&str) -> String + Send + Sync + 'static,
    {
        Self {
            filter: Box::new(filter),
            rewrite: Box::new(rewrite),
        }
    }

    /// Moves every accepted name under `prefix`.
    pub fn prefixing<F>(filter: F, prefix: impl Into<String>) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        let prefix = prefix.into();
        Self::new(filter, move |name| format!("{prefix}{name}"))
    }

    /// The replacement for `name`, if it changes.
    pub fn map_name(&self, name: &str) -> Option<String> {
        if !(self.filter)(name) {
            return None;
        }
        let mapped = (self.rewrite)(name);
        (mapped != name).then_some(mapped)
    }

    /// Rewrites `class` in place and returns the number of repointed slots.
    pub fn remap(&self, class: &mut ClassFile) -> Result<usize> {
        let mut map = |name: &str| self.map_name(name);
        let cp = &mut class.constant_pool;
        let mut rewritten = remap_pool(cp, &mut map)?;

        for member in class.fields.iter_mut().chain(class.methods.iter_mut()) {
            let mapped = map_descriptor(member.descriptor(cp)?, &mut map)?;
            if let Some(mapped) = mapped {
                member.descriptor_index = cp.intern_utf8(&mapped)?;
                rewritten += 1;
            }
            rewritten += remap_attributes(&mut member.attributes, cp, &mut map)?;
        }
        rewritten += remap_attributes(&mut class.attributes, cp, &mut map)?;
        Ok(rewritten)
    }
}

impl fmt::Debug for TypeRemapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRemapper").finish_non_exhaustive()
    }
}

impl ClassTransform for TypeRemapper {
    fn name(&self) -> &'static str {
        "type-remapper"
    }

    fn apply(&self, class: &mut ClassFile) -> Result<()> {
        let rewritten = self.remap(class)?;
        tracing::trace!(
            target: "jarsmith.remap",
            class = class.name().unwrap_or_default(),
            rewritten,
            "remapped type names"
        );
        Ok(())
    }
}

/// `Class`, `NameAndType` and `MethodType` entries. Entries appended while
/// interning hold already-mapped text and are not revisited.
fn remap_pool(cp: &mut ConstantPool, map: &mut NameMapper<'_>) -> Result<usize> {
    let mut updates = Vec::new();
    for (index, constant) in cp.iter() {
        let mapped = match constant {
            Constant::Class { name_index } => map_class_constant(cp.get_utf8(*name_index)?, map)?,
            Constant::NameAndType {
                descriptor_index, ..
            }
            | Constant::MethodType { descriptor_index } => {
                map_descriptor(cp.get_utf8(*descriptor_index)?, map)?
            }
            _ => None,
        };
        if let Some(mapped) = mapped {
            updates.push((index, mapped));
        }
    }

    let rewritten = updates.len();
    for (index, mapped) in updates {
        let utf8 = cp.intern_utf8(&mapped)?;
        match cp.get_mut(index)? {
            Constant::Class { name_index } => *name_index = utf8,
            Constant::NameAndType {
                descriptor_index, ..
            }
            | Constant::MethodType { descriptor_index } => *descriptor_index = utf8,
            _ => {}
        }
    }
    Ok(rewritten)
}

/// Descriptor and signature indices stored inside attribute payloads,
/// including those of nested `Code` and `Record` attributes.
fn remap_attributes(
    attributes: &mut [Attribute],
    cp: &mut ConstantPool,
    map: &mut NameMapper<'_>,
) -> Result<usize> {
    let mut rewritten = 0;
    for attribute in attributes {
        let mut patches = Vec::new();
        for reference in attribute_refs(attribute, cp)? {
            let mapped = match reference.kind {
                RefKind::Descriptor => map_descriptor(cp.get_utf8(reference.index)?, map)?,
                RefKind::Signature => map_signature(cp.get_utf8(reference.index)?, map)?,
                // Class entries were rewritten with the pool.
                _ => None,
            };
            if let Some(mapped) = mapped {
                patches.push((reference.offset, mapped));
            }
        }

        for (offset, mapped) in patches {
            let index = cp.intern_utf8(&mapped)?;
            attribute
                .info
                .get_mut(offset..offset + 2)
                .ok_or(Error::MalformedAttribute("attribute reference"))?
                .copy_from_slice(&index.to_be_bytes());
            rewritten += 1;
        }
    }
    Ok(rewritten)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jarsmith_test_utils::{ClassBuilder, Target};
    use pretty_assertions::assert_eq;

    fn io_remapper() -> TypeRemapper {
        TypeRemapper::prefixing(|name| name.starts_with("java/io/"), "__wrapper__/")
    }

    fn class_names(class: &ClassFile) -> Vec<&str> {
        let cp = &class.constant_pool;
        cp.iter()
            .filter_map(|(index, constant)| match constant {
                Constant::Class { .. } => Some(cp.get_class_name(index).unwrap()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn map_name_skips_unaccepted_and_identity_rewrites() {
        let remapper = io_remapper();
        assert_eq!(
            remapper.map_name("java/io/File").as_deref(),
            Some("__wrapper__/java/io/File")
        );
        assert_eq!(remapper.map_name("java/nio/Path"), None);

        let identity = TypeRemapper::new(|_| true, str::to_string);
        assert_eq!(identity.map_name("a/B"), None);
    }

    #[test]
    fn rewrites_class_entries_and_array_descriptors() {
        let mut builder = ClassBuilder::new("a/User");
        builder.class("java/io/File");
        builder.class("[[Ljava/io/File;");
        builder.class("java/lang/String");
        let mut class = ClassFile::parse(&builder.build()).unwrap();

        io_remapper().remap(&mut class).unwrap();
        assert_eq!(
            class_names(&class),
            vec![
                "a/User",
                "java/lang/Object",
                "__wrapper__/java/io/File",
                "[[L__wrapper__/java/io/File;",
                "java/lang/String",
            ]
        );
    }

    #[test]
    fn unaccepted_classes_are_left_byte_identical() {
        let mut builder = ClassBuilder::new("a/User");
        builder.field(0x0001, "name", "Ljava/lang/String;");
        let bytes = builder.build();

        let mut class = ClassFile::parse(&bytes).unwrap();
        assert_eq!(io_remapper().remap(&mut class).unwrap(), 0);
        assert_eq!(class.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn rewrites_member_descriptors_and_signatures_without_shifting_indices() {
        let mut builder = ClassBuilder::new("a/User");
        let field = builder.field(0x0001, "files", "Ljava/util/List;");
        builder.signature(Target::Field(field), "Ljava/util/List<Ljava/io/File;>;");
        builder.method(0x0001, "open", "(Ljava/io/File;I)Ljava/io/InputStream;");
        let bytes = builder.build();
        let original = ClassFile::parse(&bytes).unwrap();
        let count = original.constant_pool.count();

        let mut class = original.clone();
        io_remapper().remap(&mut class).unwrap();
        let class = ClassFile::parse(&class.to_bytes().unwrap()).unwrap();
        let cp = &class.constant_pool;

        assert_eq!(class.fields[0].descriptor(cp).unwrap(), "Ljava/util/List;");
        assert_eq!(
            class.methods[0].descriptor(cp).unwrap(),
            "(L__wrapper__/java/io/File;I)L__wrapper__/java/io/InputStream;"
        );
        let signature = &class.fields[0].attributes[0];
        let index = u16::from_be_bytes([signature.info[0], signature.info[1]]);
        assert_eq!(
            cp.get_utf8(index).unwrap(),
            "Ljava/util/List<L__wrapper__/java/io/File;>;"
        );

        // Every original entry is still where it was.
        for (index, constant) in original.constant_pool.iter() {
            assert_eq!(cp.get(index).unwrap(), constant);
        }
        assert!(cp.count() > count);
    }
}
