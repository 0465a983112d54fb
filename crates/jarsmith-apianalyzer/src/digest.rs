//! Structural class summaries for API analysis.

use jarsmith_classfile::{ClassFile, Member, ReadOptions, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldDigest {
    pub name: String,
    /// JVM field descriptor, e.g. `Ljava/lang/String;`.
    pub desc: String,
    pub owner: String,
    pub access: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct MethodDigest {
    pub name: String,
    /// JVM method descriptor, e.g. `(I)V`.
    pub desc: String,
    pub owner: String,
    pub access: u16,
    /// Internal names from the `Exceptions` attribute, in declaration order.
    pub exceptions: Vec<String>,
}

/// The externally visible surface of one class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassDigest {
    /// Internal name, e.g. `java/util/List`.
    pub name: String,
    pub access: u16,
    /// `None` only for `java/lang/Object`.
    pub super_class: Option<String>,
    pub super_interfaces: Vec<String>,
    /// Public and protected fields only.
    pub fields: Vec<FieldDigest>,
    /// Public and protected methods only.
    pub methods: Vec<MethodDigest>,
}

impl ClassDigest {
    /// Decodes `bytes` without method bodies.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_class(&ClassFile::parse_with(bytes, ReadOptions::STRUCTURE_ONLY)?)
    }

    pub fn from_class(class: &ClassFile) -> Result<Self> {
        let cp = &class.constant_pool;
        let owner = class.name()?;

        let mut fields = Vec::new();
        for field in visible(&class.fields) {
            fields.push(FieldDigest {
                name: field.name(cp)?.to_string(),
                desc: field.descriptor(cp)?.to_string(),
                owner: owner.to_string(),
                access: field.access_flags,
            });
        }

        let mut methods = Vec::new();
        for method in visible(&class.methods) {
            methods.push(MethodDigest {
                name: method.name(cp)?.to_string(),
                desc: method.descriptor(cp)?.to_string(),
                owner: owner.to_string(),
                access: method.access_flags,
                exceptions: method
                    .exceptions(cp)?
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            });
        }

        Ok(Self {
            name: owner.to_string(),
            access: class.access_flags,
            super_class: class.super_name()?.map(str::to_string),
            super_interfaces: class
                .interface_names()?
                .into_iter()
                .map(str::to_string)
                .collect(),
            fields,
            methods,
        })
    }
}

fn visible(members: &[Member]) -> impl Iterator<Item = &Member> {
    members.iter().filter(|m| m.is_public_or_protected())
}

/// An ordered list of digests; the unit of the text digest format.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassDigestCollection {
    pub classes: Vec<ClassDigest>,
}

impl ClassDigestCollection {
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ClassDigest> {
        self.classes.iter()
    }
}

impl FromIterator<ClassDigest> for ClassDigestCollection {
    fn from_iter<I: IntoIterator<Item = ClassDigest>>(iter: I) -> Self {
        Self {
            classes: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ClassDigestCollection {
    type Item = &'a ClassDigest;
    type IntoIter = std::slice::Iter<'a, ClassDigest>;

    fn into_iter(self) -> Self::IntoIter {
        self.classes.iter()
    }
}
