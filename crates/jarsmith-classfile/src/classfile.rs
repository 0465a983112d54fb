use crate::code::CodeAttribute;
use crate::constant_pool::ConstantPool;
use crate::error::{Error, Result};
use crate::reader::{push_u2, push_u4, Reader};

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_PROTECTED: u16 = 0x0004;
pub const ACC_STATIC: u16 = 0x0008;

const MAGIC: u32 = 0xCAFEBABE;

/// Attributes dropped by [`ReadOptions::skip_debug`].
pub const DEBUG_ATTRIBUTES: &[&str] = &[
    "SourceFile",
    "SourceDebugExtension",
    "LineNumberTable",
    "LocalVariableTable",
    "LocalVariableTypeTable",
    "MethodParameters",
];

/// Which parts of a class file to drop while decoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Drop every `Code` attribute (structural-only decoding).
    pub skip_code: bool,
    /// Drop [`DEBUG_ATTRIBUTES`], including those nested in `Code`.
    pub skip_debug: bool,
    /// Drop `StackMapTable` frames nested in `Code`.
    pub skip_frames: bool,
}

impl ReadOptions {
    pub const STRUCTURE_ONLY: ReadOptions = ReadOptions {
        skip_code: true,
        skip_debug: false,
        skip_frames: false,
    };

    fn keeps(&self, name: &str) -> bool {
        !(self.skip_code && name == "Code"
            || self.skip_debug && DEBUG_ATTRIBUTES.contains(&name)
            || self.skip_frames && name == "StackMapTable")
    }

    fn filters_code(&self) -> bool {
        self.skip_debug || self.skip_frames
    }
}

fn table_len(len: usize, table: &'static str) -> Result<u16> {
    u16::try_from(len).map_err(|_| Error::TooLarge(table))
}

/// An attribute kept as its name index and undecoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name_index: u16,
    pub info: Vec<u8>,
}

impl Attribute {
    pub fn name<'a>(&self, cp: &'a ConstantPool) -> Result<&'a str> {
        cp.get_utf8(self.name_index)
    }

    pub(crate) fn parse_all(reader: &mut Reader<'_>) -> Result<Vec<Attribute>> {
        let count = reader.read_u2()? as usize;
        let mut attributes = Vec::with_capacity(count);
        for _ in 0..count {
            let name_index = reader.read_u2()?;
            let length = reader.read_u4()? as usize;
            let info = reader.read_bytes(length)?.to_vec();
            attributes.push(Attribute { name_index, info });
        }
        Ok(attributes)
    }

    pub(crate) fn write_all(attributes: &[Attribute], out: &mut Vec<u8>) -> Result<()> {
        let count = table_len(attributes.len(), "attribute table")?;
        push_u2(out, count);
        for attribute in attributes {
            let length =
                u32::try_from(attribute.info.len()).map_err(|_| Error::TooLarge("attribute"))?;
            push_u2(out, attribute.name_index);
            push_u4(out, length);
            out.extend_from_slice(&attribute.info);
        }
        Ok(())
    }
}

/// A `field_info` or `method_info` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<Attribute>,
}

impl Member {
    pub fn name<'a>(&self, cp: &'a ConstantPool) -> Result<&'a str> {
        cp.get_utf8(self.name_index)
    }

    pub fn descriptor<'a>(&self, cp: &'a ConstantPool) -> Result<&'a str> {
        cp.get_utf8(self.descriptor_index)
    }

    pub fn is_public_or_protected(&self) -> bool {
        self.access_flags & (ACC_PUBLIC | ACC_PROTECTED) != 0
    }

    /// Class names listed by the method's `Exceptions` attribute.
    pub fn exceptions<'a>(&self, cp: &'a ConstantPool) -> Result<Vec<&'a str>> {
        let Some(attribute) = find_attribute(&self.attributes, cp, "Exceptions") else {
            return Ok(Vec::new());
        };
        let mut reader = Reader::new(&attribute.info);
        let count = reader.read_u2()?;
        let mut names = Vec::with_capacity(count as usize);
        for _ in 0..count {
            names.push(cp.get_class_name(reader.read_u2()?)?);
        }
        reader.ensure_empty("Exceptions attribute")?;
        Ok(names)
    }
}

/// One row of the `InnerClasses` attribute. Index fields are `0` when absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InnerClass {
    pub inner_class_info_index: u16,
    pub outer_class_info_index: u16,
    pub inner_name_index: u16,
    pub inner_class_access_flags: u16,
}

/// One row of the `BootstrapMethods` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapMethod {
    pub method_handle_index: u16,
    pub arguments: Vec<u16>,
}

impl BootstrapMethod {
    pub fn parse_table(info: &[u8]) -> Result<Vec<Self>> {
        let mut reader = Reader::new(info);
        let count = reader.read_u2()?;
        let mut rows = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let method_handle_index = reader.read_u2()?;
            let arguments = reader.read_u2()?;
            let arguments = (0..arguments)
                .map(|_| reader.read_u2())
                .collect::<Result<Vec<_>>>()?;
            rows.push(BootstrapMethod {
                method_handle_index,
                arguments,
            });
        }
        reader.ensure_empty("BootstrapMethods attribute")?;
        Ok(rows)
    }

    pub fn write_table(rows: &[Self]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        push_u2(&mut out, table_len(rows.len(), "bootstrap method table")?);
        for row in rows {
            push_u2(&mut out, row.method_handle_index);
            let arguments = table_len(row.arguments.len(), "bootstrap arguments")?;
            push_u2(&mut out, arguments);
            for argument in &row.arguments {
                push_u2(&mut out, *argument);
            }
        }
        Ok(out)
    }
}

/// Structural model of a class file.
///
/// Parsing keeps every attribute payload verbatim, so serialising an
/// unmodified model reproduces the input bytes exactly.
#[derive(Debug, Clone)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    /// `0` only for `java/lang/Object` (and `module-info`).
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<Member>,
    pub methods: Vec<Member>,
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        Self::parse_with(bytes, ReadOptions::default())
    }

    pub fn parse_with(bytes: &[u8], options: ReadOptions) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let magic = reader.read_u4()?;
        if magic != MAGIC {
            return Err(Error::InvalidMagic(magic));
        }

        let minor_version = reader.read_u2()?;
        let major_version = reader.read_u2()?;
        let constant_pool = ConstantPool::parse(&mut reader)?;

        let access_flags = reader.read_u2()?;
        let this_class = reader.read_u2()?;
        let super_class = reader.read_u2()?;
        // Validate eagerly: every consumer needs these names.
        constant_pool.get_class_name(this_class)?;
        if super_class != 0 {
            constant_pool.get_class_name(super_class)?;
        }

        let interfaces_count = reader.read_u2()? as usize;
        let mut interfaces = Vec::with_capacity(interfaces_count);
        for _ in 0..interfaces_count {
            let index = reader.read_u2()?;
            constant_pool.get_class_name(index)?;
            interfaces.push(index);
        }

        let fields = parse_members(&mut reader, &constant_pool, options)?;
        let methods = parse_members(&mut reader, &constant_pool, options)?;
        let attributes = filter_attributes(
            Attribute::parse_all(&mut reader)?,
            &constant_pool,
            options,
        )?;
        reader.ensure_empty("class file")?;

        Ok(Self {
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        push_u4(&mut out, MAGIC);
        push_u2(&mut out, self.minor_version);
        push_u2(&mut out, self.major_version);
        self.constant_pool.write(&mut out)?;
        push_u2(&mut out, self.access_flags);
        push_u2(&mut out, self.this_class);
        push_u2(&mut out, self.super_class);
        push_u2(&mut out, table_len(self.interfaces.len(), "interfaces")?);
        for index in &self.interfaces {
            push_u2(&mut out, *index);
        }
        for (members, table) in [(&self.fields, "fields"), (&self.methods, "methods")] {
            push_u2(&mut out, table_len(members.len(), table)?);
            for member in members {
                push_u2(&mut out, member.access_flags);
                push_u2(&mut out, member.name_index);
                push_u2(&mut out, member.descriptor_index);
                Attribute::write_all(&member.attributes, &mut out)?;
            }
        }
        Attribute::write_all(&self.attributes, &mut out)?;
        Ok(out)
    }

    pub fn name(&self) -> Result<&str> {
        self.constant_pool.get_class_name(self.this_class)
    }

    pub fn super_name(&self) -> Result<Option<&str>> {
        if self.super_class == 0 {
            return Ok(None);
        }
        self.constant_pool
            .get_class_name(self.super_class)
            .map(Some)
    }

    pub fn interface_names(&self) -> Result<Vec<&str>> {
        self.interfaces
            .iter()
            .map(|index| self.constant_pool.get_class_name(*index))
            .collect()
    }

    pub fn inner_classes(&self) -> Result<Vec<InnerClass>> {
        let Some(attribute) = self.find_attribute("InnerClasses") else {
            return Ok(Vec::new());
        };
        let mut reader = Reader::new(&attribute.info);
        let count = reader.read_u2()?;
        let mut rows = Vec::with_capacity(count as usize);
        for _ in 0..count {
            rows.push(InnerClass {
                inner_class_info_index: reader.read_u2()?,
                outer_class_info_index: reader.read_u2()?,
                inner_name_index: reader.read_u2()?,
                inner_class_access_flags: reader.read_u2()?,
            });
        }
        reader.ensure_empty("InnerClasses attribute")?;
        Ok(rows)
    }

    /// First class-level attribute named `name`.
    pub fn find_attribute(&self, name: &str) -> Option<&Attribute> {
        find_attribute(&self.attributes, &self.constant_pool, name)
    }
}

pub(crate) fn find_attribute<'a>(
    attributes: &'a [Attribute],
    cp: &ConstantPool,
    name: &str,
) -> Option<&'a Attribute> {
    attributes
        .iter()
        .find(|attr| attr.name(cp).map(|n| n == name).unwrap_or(false))
}

fn parse_members(
    reader: &mut Reader<'_>,
    cp: &ConstantPool,
    options: ReadOptions,
) -> Result<Vec<Member>> {
    let count = reader.read_u2()? as usize;
    let mut members = Vec::with_capacity(count);
    for _ in 0..count {
        let access_flags = reader.read_u2()?;
        let name_index = reader.read_u2()?;
        let descriptor_index = reader.read_u2()?;
        cp.get_utf8(name_index)?;
        cp.get_utf8(descriptor_index)?;
        let attributes = filter_attributes(Attribute::parse_all(reader)?, cp, options)?;
        members.push(Member {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        });
    }
    Ok(members)
}

fn filter_attributes(
    attributes: Vec<Attribute>,
    cp: &ConstantPool,
    options: ReadOptions,
) -> Result<Vec<Attribute>> {
    if options == ReadOptions::default() {
        return Ok(attributes);
    }
    let mut kept = Vec::with_capacity(attributes.len());
    for mut attribute in attributes {
        let name = attribute.name(cp)?;
        if !options.keeps(name) {
            continue;
        }
        if name == "Code" && options.filters_code() {
            let mut code = CodeAttribute::parse(&attribute.info)?;
            let nested = std::mem::take(&mut code.attributes);
            code.attributes = filter_attributes(nested, cp, options)?;
            attribute.info = code.to_bytes()?;
        }
        kept.push(attribute);
    }
    Ok(kept)
}
