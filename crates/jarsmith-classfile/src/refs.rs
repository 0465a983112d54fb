//! Constant-pool references held inside attribute payloads.
//!
//! [`attribute_refs`] reports every `u2` constant-pool index an attribute
//! stores, together with its byte offset inside the payload, so callers can
//! either resolve the referenced names or patch the index in place. Nested
//! attributes (`Code`, `Record` components) are reported at offsets relative
//! to the outermost payload.
//!
//! `InnerClasses` is deliberately not walked: its rows only reference
//! `CONSTANT_Class` entries and simple names, and callers treat it on its own.

use crate::annotation::{walk_annotation_attribute, walk_element_value, AnnotationLayout};
use crate::bytecode;
use crate::classfile::Attribute;
use crate::constant_pool::ConstantPool;
use crate::error::{Error, Result};
use crate::reader::Reader;

/// What the referenced constant-pool entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    /// A `CONSTANT_Class` entry.
    Class,
    /// A `CONSTANT_Utf8` field, method or return descriptor.
    Descriptor,
    /// A `CONSTANT_Utf8` generic signature.
    Signature,
    /// Any other constant: instruction operands, bootstrap arguments, the
    /// `NameAndType` of an enclosing method.
    Constant,
    /// The `MethodHandle` naming a bootstrap method.
    BootstrapMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrRef {
    /// Offset of the big-endian index inside the attribute payload. For the
    /// one-byte `ldc` operand this is the offset of that byte.
    pub offset: usize,
    pub index: u16,
    pub kind: RefKind,
}

/// Lists the references stored in `attribute`.
pub fn attribute_refs(attribute: &Attribute, cp: &ConstantPool) -> Result<Vec<AttrRef>> {
    let mut refs = Vec::new();
    walk_attribute(attribute.name(cp)?, &attribute.info, 0, cp, &mut refs)?;
    Ok(refs)
}

fn walk_attribute(
    name: &str,
    info: &[u8],
    base: usize,
    cp: &ConstantPool,
    refs: &mut Vec<AttrRef>,
) -> Result<()> {
    if let Some(layout) = AnnotationLayout::of(name) {
        return walk_annotation_attribute(layout, info, base, refs);
    }

    let mut r = Walk {
        reader: Reader::new(info),
        base,
        refs,
    };
    match name {
        "Code" => return walk_code(info, base, cp, r.refs),
        "Signature" => r.index(RefKind::Signature)?,
        "Exceptions" | "NestMembers" | "PermittedSubclasses" => {
            let count = r.reader.read_u2()?;
            for _ in 0..count {
                r.index(RefKind::Class)?;
            }
        }
        "NestHost" => r.index(RefKind::Class)?,
        "EnclosingMethod" => {
            r.index(RefKind::Class)?;
            r.index(RefKind::Constant)?;
        }
        "LocalVariableTable" | "LocalVariableTypeTable" => {
            let kind = if name == "LocalVariableTable" {
                RefKind::Descriptor
            } else {
                RefKind::Signature
            };
            let count = r.reader.read_u2()?;
            for _ in 0..count {
                // start_pc, length, name_index
                r.reader.skip(6)?;
                r.index(kind)?;
                r.reader.skip(2)?;
            }
        }
        "AnnotationDefault" => walk_element_value(&mut r.reader, base, r.refs)?,
        "BootstrapMethods" => {
            let count = r.reader.read_u2()?;
            for _ in 0..count {
                r.index(RefKind::BootstrapMethod)?;
                let arguments = r.reader.read_u2()?;
                for _ in 0..arguments {
                    r.index(RefKind::Constant)?;
                }
            }
        }
        "StackMapTable" => walk_stack_map(&mut r)?,
        "Record" => {
            let count = r.reader.read_u2()?;
            for _ in 0..count {
                r.reader.skip(2)?;
                r.index(RefKind::Descriptor)?;
                walk_nested(&mut r, cp)?;
            }
        }
        _ => return Ok(()),
    }
    r.reader.ensure_empty("attribute")
}

struct Walk<'a, 'r> {
    reader: Reader<'a>,
    base: usize,
    refs: &'r mut Vec<AttrRef>,
}

impl Walk<'_, '_> {
    /// Reads one index and records it unless it is the `0` "absent" marker.
    fn index(&mut self, kind: RefKind) -> Result<()> {
        let offset = self.base + self.reader.position();
        let index = self.reader.read_u2()?;
        if index != 0 {
            self.refs.push(AttrRef {
                offset,
                index,
                kind,
            });
        }
        Ok(())
    }
}

fn walk_nested(r: &mut Walk<'_, '_>, cp: &ConstantPool) -> Result<()> {
    let count = r.reader.read_u2()?;
    for _ in 0..count {
        let name_index = r.reader.read_u2()?;
        let length = r.reader.read_u4()? as usize;
        let start = r.base + r.reader.position();
        let info = r.reader.read_bytes(length)?;
        walk_attribute(cp.get_utf8(name_index)?, info, start, cp, r.refs)?;
    }
    Ok(())
}

fn walk_code(info: &[u8], base: usize, cp: &ConstantPool, refs: &mut Vec<AttrRef>) -> Result<()> {
    let mut r = Walk {
        reader: Reader::new(info),
        base,
        refs,
    };
    r.reader.skip(4)?;
    let code_length = r.reader.read_u4()? as usize;
    let code_start = r.reader.position();
    let code = r.reader.read_bytes(code_length)?;
    let code_base = base + code_start;

    let mut result = Ok(());
    bytecode::walk(code, |insn| {
        if let Some(index) = insn.constant {
            if index == 0 {
                result = Err(Error::InvalidConstantPoolIndex(0));
            }
            r.refs.push(AttrRef {
                offset: code_base + insn.offset + 1,
                index,
                kind: RefKind::Constant,
            });
        }
    })?;
    result?;

    let handlers = r.reader.read_u2()?;
    for _ in 0..handlers {
        r.reader.skip(6)?;
        r.index(RefKind::Class)?;
    }
    walk_nested(&mut r, cp)?;
    r.reader.ensure_empty("Code attribute")
}

fn walk_stack_map(r: &mut Walk<'_, '_>) -> Result<()> {
    let frames = r.reader.read_u2()?;
    for _ in 0..frames {
        match r.reader.read_u1()? {
            0..=63 => {}
            64..=127 => walk_verification_type(r)?,
            247 => {
                r.reader.skip(2)?;
                walk_verification_type(r)?;
            }
            248..=251 => r.reader.skip(2)?,
            frame @ 252..=254 => {
                r.reader.skip(2)?;
                for _ in 0..(frame - 251) {
                    walk_verification_type(r)?;
                }
            }
            255 => {
                r.reader.skip(2)?;
                for _ in 0..2 {
                    let count = r.reader.read_u2()?;
                    for _ in 0..count {
                        walk_verification_type(r)?;
                    }
                }
            }
            _ => return Err(Error::MalformedAttribute("StackMapTable")),
        }
    }
    Ok(())
}

fn walk_verification_type(r: &mut Walk<'_, '_>) -> Result<()> {
    match r.reader.read_u1()? {
        0..=6 => Ok(()),
        // Object_variable_info
        7 => r.index(RefKind::Class),
        // Uninitialized_variable_info: a bytecode offset, not an index.
        8 => r.reader.skip(2),
        _ => Err(Error::MalformedAttribute("StackMapTable")),
    }
}
