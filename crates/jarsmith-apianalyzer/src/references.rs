//! Collects the type names a class refers to.

use std::fmt;

use indexmap::IndexSet;
use jarsmith_classfile::{
    attribute_refs, visit_class_constant, visit_descriptor, visit_signature, Attribute, ClassFile,
    Constant, ConstantPool, ReadOptions, RefKind, Result,
};

const METHOD_HANDLES: &str = "java/lang/invoke/MethodHandles";
const METHOD_HANDLES_LOOKUP: &str = "java/lang/invoke/MethodHandles$Lookup";

type TypeFilter = dyn Fn(&str) -> bool + Send + Sync;

/// Scans class bytes for referenced type names accepted by a filter.
///
/// Classes that create lambdas or method references carry an `InnerClasses`
/// row for `MethodHandles$Lookup`; that row is skipped, as it does not reflect
/// a dependency of the class.
pub struct TypeReferenceScanner {
    filter: Box<TypeFilter>,
    skip_debug_and_frames: bool,
}

impl TypeReferenceScanner {
    pub fn new(
        filter: impl Fn(&str) -> bool + Send + Sync + 'static,
        skip_debug_and_frames: bool,
    ) -> Self {
        Self {
            filter: Box::new(filter),
            skip_debug_and_frames,
        }
    }

    /// Distinct accepted type names, in first-seen order. Array types
    /// contribute their element type; primitives contribute nothing.
    pub fn scan(&self, bytes: &[u8]) -> Result<IndexSet<String>> {
        let options = ReadOptions {
            skip_code: false,
            skip_debug: self.skip_debug_and_frames,
            skip_frames: self.skip_debug_and_frames,
        };
        let class = ClassFile::parse_with(bytes, options)?;
        let cp = &class.constant_pool;
        let mut scan = Scan {
            cp,
            filter: self.filter.as_ref(),
            found: IndexSet::new(),
        };

        scan.class(class.this_class)?;
        if class.super_class != 0 {
            scan.class(class.super_class)?;
        }
        for interface in &class.interfaces {
            scan.class(*interface)?;
        }
        for member in class.fields.iter().chain(&class.methods) {
            scan.descriptor(member.descriptor(cp)?)?;
            scan.attributes(&member.attributes)?;
        }
        scan.attributes(&class.attributes)?;

        for inner in class.inner_classes()? {
            let outer = match inner.outer_class_info_index {
                0 => None,
                index => Some(cp.get_class_name(index)?),
            };
            let name = cp.get_class_name(inner.inner_class_info_index)?;
            if outer == Some(METHOD_HANDLES) && name == METHOD_HANDLES_LOOKUP {
                continue;
            }
            scan.class(inner.inner_class_info_index)?;
            if inner.outer_class_info_index != 0 {
                scan.class(inner.outer_class_info_index)?;
            }
        }

        tracing::trace!(
            target: "jarsmith.apianalyzer",
            class = class.name().unwrap_or_default(),
            references = scan.found.len(),
            "scanned type references"
        );
        Ok(scan.found)
    }
}

impl fmt::Debug for TypeReferenceScanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeReferenceScanner")
            .field("skip_debug_and_frames", &self.skip_debug_and_frames)
            .finish_non_exhaustive()
    }
}

struct Scan<'a> {
    cp: &'a ConstantPool,
    filter: &'a TypeFilter,
    found: IndexSet<String>,
}

impl Scan<'_> {
    fn add(&mut self, name: &str) {
        if (self.filter)(name) && !self.found.contains(name) {
            self.found.insert(name.to_string());
        }
    }

    fn class(&mut self, index: u16) -> Result<()> {
        let cp = self.cp;
        let name = cp.get_class_name(index)?;
        visit_class_constant(name, &mut |n| self.add(n))
    }

    fn descriptor(&mut self, descriptor: &str) -> Result<()> {
        visit_descriptor(descriptor, &mut |n| self.add(n))
    }

    fn signature(&mut self, signature: &str) -> Result<()> {
        visit_signature(signature, &mut |n| self.add(n))
    }

    fn attributes(&mut self, attributes: &[Attribute]) -> Result<()> {
        let cp = self.cp;
        for attribute in attributes {
            for reference in attribute_refs(attribute, cp)? {
                match reference.kind {
                    RefKind::Class => self.class(reference.index)?,
                    RefKind::Descriptor => self.descriptor(cp.get_utf8(reference.index)?)?,
                    RefKind::Signature => self.signature(cp.get_utf8(reference.index)?)?,
                    RefKind::Constant => self.constant(reference.index)?,
                    // The bootstrap method's own descriptor is plumbing of the
                    // call site, not a dependency; only its owner counts.
                    RefKind::BootstrapMethod => self.method_handle(reference.index, false)?,
                }
            }
        }
        Ok(())
    }

    fn constant(&mut self, index: u16) -> Result<()> {
        let cp = self.cp;
        match cp.get(index)? {
            Constant::Class { .. } => self.class(index),
            Constant::Fieldref { .. }
            | Constant::Methodref { .. }
            | Constant::InterfaceMethodref { .. } => self.member_ref(index, true),
            Constant::NameAndType { .. } => self.descriptor(cp.get_name_and_type(index)?.1),
            Constant::MethodType { descriptor_index } => {
                self.descriptor(cp.get_utf8(*descriptor_index)?)
            }
            Constant::MethodHandle { .. } => self.method_handle(index, true),
            Constant::Dynamic {
                name_and_type_index,
                ..
            }
            | Constant::InvokeDynamic {
                name_and_type_index,
                ..
            } => self.descriptor(cp.get_name_and_type(*name_and_type_index)?.1),
            _ => Ok(()),
        }
    }

    fn member_ref(&mut self, index: u16, with_descriptor: bool) -> Result<()> {
        let cp = self.cp;
        let (owner, _, descriptor) = cp.get_member_ref(index)?;
        visit_class_constant(owner, &mut |n| self.add(n))?;
        if with_descriptor {
            self.descriptor(descriptor)?;
        }
        Ok(())
    }

    fn method_handle(&mut self, index: u16, with_descriptor: bool) -> Result<()> {
        let cp = self.cp;
        match cp.get(index)? {
            Constant::MethodHandle {
                reference_index, ..
            } => self.member_ref(*reference_index, with_descriptor),
            _ => self.constant(index),
        }
    }
}
