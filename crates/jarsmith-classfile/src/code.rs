use crate::classfile::Attribute;
use crate::error::{Error, Result};
use crate::reader::{push_u2, push_u4, Reader};

/// Decoded `Code` attribute payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionHandler>,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionHandler {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    /// `0` for a catch-all (`finally`) handler.
    pub catch_type: u16,
}

/// Byte offset of the bytecode array inside a `Code` payload.
pub(crate) const CODE_HEADER_LEN: usize = 8;

impl CodeAttribute {
    pub fn parse(info: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(info);
        let max_stack = reader.read_u2()?;
        let max_locals = reader.read_u2()?;
        let code_length = reader.read_u4()? as usize;
        let code = reader.read_bytes(code_length)?.to_vec();

        let handlers = reader.read_u2()? as usize;
        let mut exception_table = Vec::with_capacity(handlers);
        for _ in 0..handlers {
            exception_table.push(ExceptionHandler {
                start_pc: reader.read_u2()?,
                end_pc: reader.read_u2()?,
                handler_pc: reader.read_u2()?,
                catch_type: reader.read_u2()?,
            });
        }

        let attributes = Attribute::parse_all(&mut reader)?;
        reader.ensure_empty("Code attribute")?;

        Ok(Self {
            max_stack,
            max_locals,
            code,
            exception_table,
            attributes,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let code_length = u32::try_from(self.code.len()).map_err(|_| Error::TooLarge("Code"))?;
        let handlers = u16::try_from(self.exception_table.len())
            .map_err(|_| Error::TooLarge("exception table"))?;

        let mut out = Vec::with_capacity(CODE_HEADER_LEN + self.code.len() + 16);
        push_u2(&mut out, self.max_stack);
        push_u2(&mut out, self.max_locals);
        push_u4(&mut out, code_length);
        out.extend_from_slice(&self.code);
        push_u2(&mut out, handlers);
        for handler in &self.exception_table {
            push_u2(&mut out, handler.start_pc);
            push_u2(&mut out, handler.end_pc);
            push_u2(&mut out, handler.handler_pc);
            push_u2(&mut out, handler.catch_type);
        }
        Attribute::write_all(&self.attributes, &mut out)?;
        Ok(out)
    }

    /// Offset of the nested attribute table inside the `Code` payload.
    pub(crate) fn attributes_offset(&self) -> usize {
        CODE_HEADER_LEN + self.code.len() + 2 + self.exception_table.len() * 8
    }
}
