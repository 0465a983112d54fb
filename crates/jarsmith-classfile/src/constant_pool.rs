use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::reader::{push_u2, push_u4, Reader};

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Index 0 and the second slot of `Long`/`Double` constants.
    Unusable,
    Utf8(Utf8),
    Integer(i32),
    /// Raw IEEE 754 bits, kept verbatim so NaN payloads survive re-encoding.
    Float(u32),
    Long(i64),
    Double(u64),
    Class {
        name_index: u16,
    },
    String {
        string_index: u16,
    },
    Fieldref {
        class_index: u16,
        name_and_type_index: u16,
    },
    Methodref {
        class_index: u16,
        name_and_type_index: u16,
    },
    InterfaceMethodref {
        class_index: u16,
        name_and_type_index: u16,
    },
    NameAndType {
        name_index: u16,
        descriptor_index: u16,
    },
    MethodHandle {
        reference_kind: u8,
        reference_index: u16,
    },
    MethodType {
        descriptor_index: u16,
    },
    Dynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    InvokeDynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    Module {
        name_index: u16,
    },
    Package {
        name_index: u16,
    },
}

impl Constant {
    pub fn kind(&self) -> &'static str {
        match self {
            Constant::Unusable => "Unusable",
            Constant::Utf8(_) => "Utf8",
            Constant::Integer(_) => "Integer",
            Constant::Float(_) => "Float",
            Constant::Long(_) => "Long",
            Constant::Double(_) => "Double",
            Constant::Class { .. } => "Class",
            Constant::String { .. } => "String",
            Constant::Fieldref { .. } => "Fieldref",
            Constant::Methodref { .. } => "Methodref",
            Constant::InterfaceMethodref { .. } => "InterfaceMethodref",
            Constant::NameAndType { .. } => "NameAndType",
            Constant::MethodHandle { .. } => "MethodHandle",
            Constant::MethodType { .. } => "MethodType",
            Constant::Dynamic { .. } => "Dynamic",
            Constant::InvokeDynamic { .. } => "InvokeDynamic",
            Constant::Module { .. } => "Module",
            Constant::Package { .. } => "Package",
        }
    }

    fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }
}

/// A `CONSTANT_Utf8` entry: the decoded text plus the exact bytes it was read
/// from, so untouched entries are written back unchanged.
///
/// The bytes are authoritative. Unpaired surrogates are legal in class files
/// but not in `str`; such entries decode lossily (U+FFFD) and are flagged as
/// inexact so interning never resolves to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utf8 {
    text: String,
    raw: Vec<u8>,
    exact: bool,
}

impl Utf8 {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let raw = encode_modified_utf8(&text);
        Self {
            text,
            raw,
            exact: true,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Whether [`Utf8::as_str`] is a faithful decoding of the stored bytes.
    pub fn is_exact(&self) -> bool {
        self.exact
    }
}

#[derive(Debug, Clone)]
pub struct ConstantPool {
    entries: Vec<Constant>,
    utf8_lookup: HashMap<String, u16>,
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantPool {
    /// An empty pool holding only the reserved index 0.
    pub fn new() -> Self {
        Self {
            entries: vec![Constant::Unusable],
            utf8_lookup: HashMap::new(),
        }
    }

    pub(crate) fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let count = reader.read_u2()?;
        let mut pool = ConstantPool {
            entries: Vec::with_capacity(count as usize),
            utf8_lookup: HashMap::new(),
        };
        pool.entries.push(Constant::Unusable);

        while pool.entries.len() < count as usize {
            let index = pool.entries.len() as u16;
            let constant = parse_constant(reader)?;
            if let Constant::Utf8(utf8) = &constant {
                if utf8.exact {
                    pool.utf8_lookup.entry(utf8.text.clone()).or_insert(index);
                }
            }
            let wide = constant.is_wide();
            pool.entries.push(constant);
            if wide {
                pool.entries.push(Constant::Unusable);
            }
        }
        if pool.entries.len() != count as usize {
            // A trailing Long/Double overran `constant_pool_count`.
            return Err(Error::InvalidConstantPoolIndex(count));
        }

        Ok(pool)
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let count = u16::try_from(self.entries.len()).map_err(|_| Error::ConstantPoolOverflow)?;
        push_u2(out, count);
        for constant in &self.entries {
            write_constant(constant, out)?;
        }
        Ok(())
    }

    /// `constant_pool_count`: one more than the highest valid index.
    pub fn count(&self) -> u16 {
        self.entries.len() as u16
    }

    pub fn get(&self, index: u16) -> Result<&Constant> {
        match self.entries.get(index as usize) {
            None | Some(Constant::Unusable) => Err(Error::InvalidConstantPoolIndex(index)),
            Some(constant) => Ok(constant),
        }
    }

    pub fn get_mut(&mut self, index: u16) -> Result<&mut Constant> {
        match self.entries.get_mut(index as usize) {
            None | Some(Constant::Unusable) => Err(Error::InvalidConstantPoolIndex(index)),
            Some(constant) => Ok(constant),
        }
    }

    /// Iterates over every usable `(index, constant)` pair.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Constant)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, c)| !matches!(c, Constant::Unusable))
            .map(|(idx, c)| (idx as u16, c))
    }

    pub fn get_utf8(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Utf8(utf8) => Ok(utf8.as_str()),
            other => Err(mismatch(index, "Utf8", other)),
        }
    }

    pub fn get_class_name(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Class { name_index } => self.get_utf8(*name_index),
            other => Err(mismatch(index, "Class", other)),
        }
    }

    /// Resolves a `NameAndType` entry to `(name, descriptor)`.
    pub fn get_name_and_type(&self, index: u16) -> Result<(&str, &str)> {
        match self.get(index)? {
            Constant::NameAndType {
                name_index,
                descriptor_index,
            } => Ok((self.get_utf8(*name_index)?, self.get_utf8(*descriptor_index)?)),
            other => Err(mismatch(index, "NameAndType", other)),
        }
    }

    /// Resolves a field/method/interface-method reference to
    /// `(owner, name, descriptor)`.
    pub fn get_member_ref(&self, index: u16) -> Result<(&str, &str, &str)> {
        match self.get(index)? {
            Constant::Fieldref {
                class_index,
                name_and_type_index,
            }
            | Constant::Methodref {
                class_index,
                name_and_type_index,
            }
            | Constant::InterfaceMethodref {
                class_index,
                name_and_type_index,
            } => {
                let owner = self.get_class_name(*class_index)?;
                let (name, descriptor) = self.get_name_and_type(*name_and_type_index)?;
                Ok((owner, name, descriptor))
            }
            other => Err(mismatch(index, "Fieldref/Methodref", other)),
        }
    }

    /// Appends `constant`, returning its index. `Long` and `Double` also
    /// reserve the following slot.
    pub fn push(&mut self, constant: Constant) -> Result<u16> {
        let index = u16::try_from(self.entries.len()).map_err(|_| Error::ConstantPoolOverflow)?;
        let slots = if constant.is_wide() { 2 } else { 1 };
        if self.entries.len() + slots > u16::MAX as usize {
            return Err(Error::ConstantPoolOverflow);
        }
        if let Constant::Utf8(utf8) = &constant {
            if utf8.raw.len() > u16::MAX as usize {
                return Err(Error::TooLarge("CONSTANT_Utf8"));
            }
            if utf8.exact {
                self.utf8_lookup.entry(utf8.text.clone()).or_insert(index);
            }
        }
        self.entries.push(constant);
        if slots == 2 {
            self.entries.push(Constant::Unusable);
        }
        Ok(index)
    }

    /// Returns the index of a `CONSTANT_Utf8` holding `text`, appending a new
    /// entry when none exists. Existing indices never move.
    pub fn intern_utf8(&mut self, text: &str) -> Result<u16> {
        if let Some(index) = self.utf8_lookup.get(text) {
            return Ok(*index);
        }
        self.push(Constant::Utf8(Utf8::new(text)))
    }
}

fn mismatch(index: u16, expected: &'static str, found: &Constant) -> Error {
    Error::ConstantPoolTypeMismatch {
        index,
        expected,
        found: found.kind(),
    }
}

fn parse_constant(reader: &mut Reader<'_>) -> Result<Constant> {
    let tag = reader.read_u1()?;
    let constant = match tag {
        1 => {
            let len = reader.read_u2()? as usize;
            let raw = reader.read_bytes(len)?.to_vec();
            let (text, exact) = decode_modified_utf8(&raw)?;
            Constant::Utf8(Utf8 { text, raw, exact })
        }
        3 => Constant::Integer(reader.read_i4()?),
        4 => Constant::Float(reader.read_u4()?),
        5 => Constant::Long(reader.read_u8()? as i64),
        6 => Constant::Double(reader.read_u8()?),
        7 => Constant::Class {
            name_index: reader.read_u2()?,
        },
        8 => Constant::String {
            string_index: reader.read_u2()?,
        },
        9 => Constant::Fieldref {
            class_index: reader.read_u2()?,
            name_and_type_index: reader.read_u2()?,
        },
        10 => Constant::Methodref {
            class_index: reader.read_u2()?,
            name_and_type_index: reader.read_u2()?,
        },
        11 => Constant::InterfaceMethodref {
            class_index: reader.read_u2()?,
            name_and_type_index: reader.read_u2()?,
        },
        12 => Constant::NameAndType {
            name_index: reader.read_u2()?,
            descriptor_index: reader.read_u2()?,
        },
        15 => Constant::MethodHandle {
            reference_kind: reader.read_u1()?,
            reference_index: reader.read_u2()?,
        },
        16 => Constant::MethodType {
            descriptor_index: reader.read_u2()?,
        },
        17 => Constant::Dynamic {
            bootstrap_method_attr_index: reader.read_u2()?,
            name_and_type_index: reader.read_u2()?,
        },
        18 => Constant::InvokeDynamic {
            bootstrap_method_attr_index: reader.read_u2()?,
            name_and_type_index: reader.read_u2()?,
        },
        19 => Constant::Module {
            name_index: reader.read_u2()?,
        },
        20 => Constant::Package {
            name_index: reader.read_u2()?,
        },
        other => return Err(Error::InvalidConstantPoolTag(other)),
    };
    Ok(constant)
}

fn write_constant(constant: &Constant, out: &mut Vec<u8>) -> Result<()> {
    match constant {
        Constant::Unusable => {}
        Constant::Utf8(utf8) => {
            out.push(1);
            let len =
                u16::try_from(utf8.raw.len()).map_err(|_| Error::TooLarge("CONSTANT_Utf8"))?;
            push_u2(out, len);
            out.extend_from_slice(&utf8.raw);
        }
        Constant::Integer(value) => {
            out.push(3);
            push_u4(out, *value as u32);
        }
        Constant::Float(bits) => {
            out.push(4);
            push_u4(out, *bits);
        }
        Constant::Long(value) => {
            out.push(5);
            out.extend_from_slice(&value.to_be_bytes());
        }
        Constant::Double(bits) => {
            out.push(6);
            out.extend_from_slice(&bits.to_be_bytes());
        }
        Constant::Class { name_index } => {
            out.push(7);
            push_u2(out, *name_index);
        }
        Constant::String { string_index } => {
            out.push(8);
            push_u2(out, *string_index);
        }
        Constant::Fieldref {
            class_index,
            name_and_type_index,
        } => {
            out.push(9);
            push_u2(out, *class_index);
            push_u2(out, *name_and_type_index);
        }
        Constant::Methodref {
            class_index,
            name_and_type_index,
        } => {
            out.push(10);
            push_u2(out, *class_index);
            push_u2(out, *name_and_type_index);
        }
        Constant::InterfaceMethodref {
            class_index,
            name_and_type_index,
        } => {
            out.push(11);
            push_u2(out, *class_index);
            push_u2(out, *name_and_type_index);
        }
        Constant::NameAndType {
            name_index,
            descriptor_index,
        } => {
            out.push(12);
            push_u2(out, *name_index);
            push_u2(out, *descriptor_index);
        }
        Constant::MethodHandle {
            reference_kind,
            reference_index,
        } => {
            out.push(15);
            out.push(*reference_kind);
            push_u2(out, *reference_index);
        }
        Constant::MethodType { descriptor_index } => {
            out.push(16);
            push_u2(out, *descriptor_index);
        }
        Constant::Dynamic {
            bootstrap_method_attr_index,
            name_and_type_index,
        } => {
            out.push(17);
            push_u2(out, *bootstrap_method_attr_index);
            push_u2(out, *name_and_type_index);
        }
        Constant::InvokeDynamic {
            bootstrap_method_attr_index,
            name_and_type_index,
        } => {
            out.push(18);
            push_u2(out, *bootstrap_method_attr_index);
            push_u2(out, *name_and_type_index);
        }
        Constant::Module { name_index } => {
            out.push(19);
            push_u2(out, *name_index);
        }
        Constant::Package { name_index } => {
            out.push(20);
            push_u2(out, *name_index);
        }
    }
    Ok(())
}

/// Decodes the JVM's modified UTF-8 (`\0` as `C0 80`, supplementary
/// characters as surrogate pairs). The flag is false when an unpaired
/// surrogate had to be replaced.
pub(crate) fn decode_modified_utf8(bytes: &[u8]) -> Result<(String, bool)> {
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i];
        if b0 & 0x80 == 0 {
            if b0 == 0 {
                return Err(Error::InvalidModifiedUtf8);
            }
            units.push(b0 as u16);
            i += 1;
        } else if b0 & 0xE0 == 0xC0 {
            let b1 = *bytes.get(i + 1).ok_or(Error::InvalidModifiedUtf8)?;
            if b1 & 0xC0 != 0x80 {
                return Err(Error::InvalidModifiedUtf8);
            }
            units.push((((b0 & 0x1F) as u16) << 6) | (b1 & 0x3F) as u16);
            i += 2;
        } else if b0 & 0xF0 == 0xE0 {
            let b1 = *bytes.get(i + 1).ok_or(Error::InvalidModifiedUtf8)?;
            let b2 = *bytes.get(i + 2).ok_or(Error::InvalidModifiedUtf8)?;
            if b1 & 0xC0 != 0x80 || b2 & 0xC0 != 0x80 {
                return Err(Error::InvalidModifiedUtf8);
            }
            units.push(
                (((b0 & 0x0F) as u16) << 12) | (((b1 & 0x3F) as u16) << 6) | (b2 & 0x3F) as u16,
            );
            i += 3;
        } else {
            return Err(Error::InvalidModifiedUtf8);
        }
    }
    match String::from_utf16(&units) {
        Ok(text) => Ok((text, true)),
        Err(_) => Ok((String::from_utf16_lossy(&units), false)),
    }
}

pub(crate) fn encode_modified_utf8(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for unit in text.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modified_utf8_encodes_nul_and_supplementary_characters() {
        let text = "a\u{0}\u{e9}\u{1F600}";
        let encoded = encode_modified_utf8(text);
        assert_eq!(&encoded[..3], &[b'a', 0xC0, 0x80]);
        // Surrogate pair: two 3-byte sequences.
        assert_eq!(encoded.len(), 1 + 2 + 2 + 6);
        assert_eq!(
            decode_modified_utf8(&encoded).unwrap(),
            (text.to_string(), true)
        );
    }

    #[test]
    fn oversized_utf8_replaced_in_place_fails_to_write() {
        let mut pool = ConstantPool::new();
        let index = pool.intern_utf8("a").unwrap();
        *pool.get_mut(index).unwrap() = Constant::Utf8(Utf8::new("x".repeat(70_000)));

        let mut out = Vec::new();
        assert!(matches!(
            pool.write(&mut out),
            Err(Error::TooLarge("CONSTANT_Utf8"))
        ));
    }

    #[test]
    fn modified_utf8_rejects_raw_nul_and_truncation() {
        assert!(decode_modified_utf8(&[0x00]).is_err());
        assert!(decode_modified_utf8(&[0xE0, 0x80]).is_err());
    }

    #[test]
    fn unpaired_surrogates_keep_their_bytes() {
        let bytes = [
            0x00, 0x03, // count
            0x01, 0x00, 0x03, 0xED, 0xA0, 0x80, // #1 Utf8 "\uD800"
            0x08, 0x00, 0x01, // #2 String #1
        ];
        let mut pool = ConstantPool::parse(&mut Reader::new(&bytes)).unwrap();
        match pool.get(1).unwrap() {
            Constant::Utf8(utf8) => {
                assert!(!utf8.is_exact());
                assert_eq!(utf8.as_str(), "\u{FFFD}");
                assert_eq!(utf8.as_bytes(), &[0xED, 0xA0, 0x80]);
            }
            other => panic!("unexpected constant {other:?}"),
        }
        // A real U+FFFD is a different constant.
        assert_eq!(pool.intern_utf8("\u{FFFD}").unwrap(), 3);

        let mut out = Vec::new();
        pool.write(&mut out).unwrap();
        assert_eq!(&out[2..11], &bytes[2..]);
        assert_eq!(&out[..2], &[0x00, 0x04]);
    }

    #[test]
    fn intern_reuses_existing_entries_and_appends_new_ones() {
        let bytes = [
            0x00, 0x03, // count
            0x01, 0x00, 0x01, b'A', // #1 Utf8 "A"
            0x07, 0x00, 0x01, // #2 Class #1
        ];
        let mut pool = ConstantPool::parse(&mut Reader::new(&bytes)).unwrap();
        assert_eq!(pool.get_class_name(2).unwrap(), "A");
        assert_eq!(pool.intern_utf8("A").unwrap(), 1);
        assert_eq!(pool.intern_utf8("B").unwrap(), 3);
        assert_eq!(pool.count(), 4);
        assert!(matches!(
            pool.get_utf8(2),
            Err(Error::ConstantPoolTypeMismatch { index: 2, .. })
        ));
    }

    #[test]
    fn long_constants_take_two_slots() {
        let bytes = [
            0x00, 0x04, // count
            0x05, 0, 0, 0, 0, 0, 0, 0, 7, // #1 Long (occupies #1 and #2)
            0x01, 0x00, 0x01, b'x', // #3 Utf8
        ];
        let pool = ConstantPool::parse(&mut Reader::new(&bytes)).unwrap();
        assert_eq!(pool.get(1).unwrap(), &Constant::Long(7));
        assert!(pool.get(2).is_err());
        assert_eq!(pool.get_utf8(3).unwrap(), "x");

        let mut out = Vec::new();
        pool.write(&mut out).unwrap();
        assert_eq!(out, bytes);
    }
}
