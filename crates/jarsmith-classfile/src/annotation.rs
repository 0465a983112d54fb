//! Annotation attribute layouts: reference walking and selective removal.

use crate::constant_pool::ConstantPool;
use crate::error::{Error, Result};
use crate::reader::{push_u2, Reader};
use crate::refs::{AttrRef, RefKind};

/// The annotation-bearing attribute layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationLayout {
    /// `Runtime{Visible,Invisible}Annotations`
    Annotations,
    /// `Runtime{Visible,Invisible}ParameterAnnotations`
    ParameterAnnotations,
    /// `Runtime{Visible,Invisible}TypeAnnotations`
    TypeAnnotations,
}

impl AnnotationLayout {
    pub fn of(attribute_name: &str) -> Option<Self> {
        match attribute_name {
            "RuntimeVisibleAnnotations" | "RuntimeInvisibleAnnotations" => {
                Some(Self::Annotations)
            }
            "RuntimeVisibleParameterAnnotations" | "RuntimeInvisibleParameterAnnotations" => {
                Some(Self::ParameterAnnotations)
            }
            "RuntimeVisibleTypeAnnotations" | "RuntimeInvisibleTypeAnnotations" => {
                Some(Self::TypeAnnotations)
            }
            _ => None,
        }
    }
}

/// Outcome of [`retain_annotations`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retained {
    Unchanged,
    Rewritten(Vec<u8>),
    /// Every annotation was removed; the attribute should be dropped.
    Emptied,
}

/// Removes the annotations whose type descriptor fails `keep`.
pub fn retain_annotations(
    layout: AnnotationLayout,
    info: &[u8],
    cp: &ConstantPool,
    keep: &dyn Fn(&str) -> bool,
) -> Result<Retained> {
    let mut reader = Reader::new(info);
    let mut out = Vec::with_capacity(info.len());
    let mut removed = 0usize;
    let mut remaining = 0usize;

    match layout {
        AnnotationLayout::ParameterAnnotations => {
            let parameters = reader.read_u1()?;
            out.push(parameters);
            for _ in 0..parameters {
                let (kept, dropped) = retain_list(&mut reader, info, cp, layout, keep, &mut out)?;
                remaining += kept;
                removed += dropped;
            }
        }
        _ => {
            let (kept, dropped) = retain_list(&mut reader, info, cp, layout, keep, &mut out)?;
            remaining += kept;
            removed += dropped;
        }
    }
    reader.ensure_empty("annotation attribute")?;

    Ok(if removed == 0 {
        Retained::Unchanged
    } else if remaining == 0 {
        Retained::Emptied
    } else {
        Retained::Rewritten(out)
    })
}

/// Type descriptors of the top-level annotations in an
/// [`AnnotationLayout::Annotations`] payload, in attribute order.
pub fn annotation_types<'a>(info: &[u8], cp: &'a ConstantPool) -> Result<Vec<&'a str>> {
    let mut reader = Reader::new(info);
    let count = reader.read_u2()?;
    let mut types = Vec::with_capacity(count as usize);
    let mut scratch = Vec::new();
    for _ in 0..count {
        let type_at = reader.position();
        walk_annotation(&mut reader, 0, &mut scratch)?;
        types.push(cp.get_utf8(crate::reader::u2_at(info, type_at)?)?);
    }
    reader.ensure_empty("annotation attribute")?;
    Ok(types)
}

/// Copies one counted annotation list into `out`, skipping rejected entries.
fn retain_list(
    reader: &mut Reader<'_>,
    info: &[u8],
    cp: &ConstantPool,
    layout: AnnotationLayout,
    keep: &dyn Fn(&str) -> bool,
    out: &mut Vec<u8>,
) -> Result<(usize, usize)> {
    let count = reader.read_u2()?;
    let count_at = out.len();
    push_u2(out, 0);

    let mut scratch = Vec::new();
    let mut kept = 0u16;
    let mut dropped = 0usize;
    for _ in 0..count {
        let start = reader.position();
        if layout == AnnotationLayout::TypeAnnotations {
            skip_type_annotation_target(reader)?;
        }
        let type_at = reader.position();
        walk_annotation(reader, 0, &mut scratch)?;
        let end = reader.position();

        let type_index = crate::reader::u2_at(info, type_at)?;
        if keep(cp.get_utf8(type_index)?) {
            out.extend_from_slice(&info[start..end]);
            kept += 1;
        } else {
            dropped += 1;
        }
    }
    crate::reader::patch_u2(out, count_at, kept);
    Ok((kept as usize, dropped))
}

/// Records the references of an annotation attribute payload.
pub(crate) fn walk_annotation_attribute(
    layout: AnnotationLayout,
    info: &[u8],
    base: usize,
    refs: &mut Vec<AttrRef>,
) -> Result<()> {
    let mut reader = Reader::new(info);
    let lists = match layout {
        AnnotationLayout::ParameterAnnotations => reader.read_u1()? as usize,
        _ => 1,
    };
    for _ in 0..lists {
        let count = reader.read_u2()?;
        for _ in 0..count {
            if layout == AnnotationLayout::TypeAnnotations {
                skip_type_annotation_target(&mut reader)?;
            }
            walk_annotation(&mut reader, base, refs)?;
        }
    }
    reader.ensure_empty("annotation attribute")
}

pub(crate) fn walk_annotation(
    reader: &mut Reader<'_>,
    base: usize,
    refs: &mut Vec<AttrRef>,
) -> Result<()> {
    push_ref(reader, base, RefKind::Descriptor, refs)?;
    let pairs = reader.read_u2()?;
    for _ in 0..pairs {
        reader.skip(2)?;
        walk_element_value(reader, base, refs)?;
    }
    Ok(())
}

pub(crate) fn walk_element_value(
    reader: &mut Reader<'_>,
    base: usize,
    refs: &mut Vec<AttrRef>,
) -> Result<()> {
    match reader.read_u1()? {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' => reader.skip(2),
        b'e' => {
            push_ref(reader, base, RefKind::Descriptor, refs)?;
            reader.skip(2)
        }
        b'c' => push_ref(reader, base, RefKind::Descriptor, refs),
        b'@' => walk_annotation(reader, base, refs),
        b'[' => {
            let values = reader.read_u2()?;
            for _ in 0..values {
                walk_element_value(reader, base, refs)?;
            }
            Ok(())
        }
        _ => Err(Error::MalformedAttribute("annotation element_value")),
    }
}

/// Skips `target_type`, `target_info` and `type_path` (JVMS §4.7.20).
fn skip_type_annotation_target(reader: &mut Reader<'_>) -> Result<()> {
    let target_info_len = match reader.read_u1()? {
        0x00 | 0x01 => 1,
        0x10 => 2,
        0x11 | 0x12 => 2,
        0x13..=0x15 => 0,
        0x16 => 1,
        0x17 => 2,
        0x40 | 0x41 => {
            let entries = reader.read_u2()? as usize;
            entries * 6
        }
        0x42 => 2,
        0x43..=0x46 => 2,
        0x47..=0x4b => 3,
        _ => return Err(Error::MalformedAttribute("type annotation target")),
    };
    reader.skip(target_info_len)?;
    let path_length = reader.read_u1()? as usize;
    reader.skip(path_length * 2)
}

fn push_ref(
    reader: &mut Reader<'_>,
    base: usize,
    kind: RefKind,
    refs: &mut Vec<AttrRef>,
) -> Result<()> {
    let offset = base + reader.position();
    let index = reader.read_u2()?;
    refs.push(AttrRef {
        offset,
        index,
        kind,
    });
    Ok(())
}
