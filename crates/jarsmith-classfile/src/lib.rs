//! Native JVM class-file model: decoding, reference walking and rewriting.

#![forbid(unsafe_code)]

mod annotation;
mod bytecode;
mod classfile;
mod code;
mod constant_pool;
mod descriptor;
mod error;
mod names;
mod reader;
mod refs;
mod signature;
mod transform;

pub use crate::annotation::{annotation_types, retain_annotations, AnnotationLayout, Retained};
pub use crate::bytecode::{walk as walk_instructions, Instruction};
pub use crate::classfile::{
    Attribute, BootstrapMethod, ClassFile, InnerClass, Member, ReadOptions, ACC_PRIVATE,
    ACC_PROTECTED, ACC_PUBLIC, ACC_STATIC, DEBUG_ATTRIBUTES,
};
pub use crate::code::{CodeAttribute, ExceptionHandler};
pub use crate::constant_pool::{Constant, ConstantPool, Utf8};
pub use crate::descriptor::{
    map_class_constant, map_descriptor, visit_class_constant, visit_descriptor, NameMapper,
};
pub use crate::error::{Error, Result};
pub use crate::names::{
    class_entry_name, entry_to_internal_name, is_class_entry, is_jdk_type, CLASS_SUFFIX,
    JDK_PACKAGE_PREFIXES,
};
pub use crate::refs::{attribute_refs, AttrRef, RefKind};
pub use crate::signature::{map_signature, visit_signature};
pub use crate::transform::{ClassTransform, Pipeline};

pub mod opcodes {
    pub use crate::bytecode::{
        ANEWARRAY, CHECKCAST, GETSTATIC, INSTANCEOF, INVOKEDYNAMIC, INVOKEINTERFACE,
        INVOKESPECIAL, INVOKESTATIC, INVOKEVIRTUAL, LDC, LDC2_W, LDC_W, MULTIANEWARRAY, NEW,
        PUTFIELD,
    };
}
