//! Instruction-stream walking for `Code` bytecode.
//!
//! Only instruction boundaries and constant-pool operands are decoded; this is
//! enough to find every constant a method body references without building an
//! instruction model.

use crate::error::{Error, Result};

pub const LDC: u8 = 0x12;
pub const LDC_W: u8 = 0x13;
pub const LDC2_W: u8 = 0x14;
pub const GETSTATIC: u8 = 0xb2;
pub const PUTFIELD: u8 = 0xb5;
pub const INVOKEVIRTUAL: u8 = 0xb6;
pub const INVOKESPECIAL: u8 = 0xb7;
pub const INVOKESTATIC: u8 = 0xb8;
pub const INVOKEINTERFACE: u8 = 0xb9;
pub const INVOKEDYNAMIC: u8 = 0xba;
pub const NEW: u8 = 0xbb;
pub const ANEWARRAY: u8 = 0xbd;
pub const CHECKCAST: u8 = 0xc0;
pub const INSTANCEOF: u8 = 0xc1;
pub const MULTIANEWARRAY: u8 = 0xc5;

const TABLESWITCH: u8 = 0xaa;
const LOOKUPSWITCH: u8 = 0xab;
const WIDE: u8 = 0xc4;
const IINC: u8 = 0x84;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// Offset of the opcode within the bytecode array.
    pub offset: usize,
    pub opcode: u8,
    /// Constant-pool operand, for instructions that carry one.
    pub constant: Option<u16>,
}

impl Instruction {
    pub fn is_invocation(&self) -> bool {
        (INVOKEVIRTUAL..=INVOKEDYNAMIC).contains(&self.opcode)
    }
}

/// Calls `f` for each instruction of `code`, in order.
pub fn walk(code: &[u8], mut f: impl FnMut(Instruction)) -> Result<()> {
    let mut offset = 0usize;
    while offset < code.len() {
        let opcode = code[offset];
        let (len, constant) = match opcode {
            LDC => (2, Some(u1_operand(code, offset + 1)? as u16)),
            LDC_W | LDC2_W | GETSTATIC..=INVOKESTATIC | NEW | ANEWARRAY | CHECKCAST
            | INSTANCEOF => (3, Some(u2_operand(code, offset + 1)?)),
            INVOKEINTERFACE | INVOKEDYNAMIC => (5, Some(u2_operand(code, offset + 1)?)),
            MULTIANEWARRAY => (4, Some(u2_operand(code, offset + 1)?)),
            TABLESWITCH => (tableswitch_len(code, offset)?, None),
            LOOKUPSWITCH => (lookupswitch_len(code, offset)?, None),
            WIDE => {
                let modified = u1_operand(code, offset + 1)?;
                (if modified == IINC { 6 } else { 4 }, None)
            }
            _ => (fixed_len(opcode).ok_or(Error::UnknownOpcode { opcode, offset })?, None),
        };
        if offset + len > code.len() {
            return Err(Error::UnexpectedEof);
        }
        f(Instruction {
            offset,
            opcode,
            constant,
        });
        offset += len;
    }
    Ok(())
}

/// Length of instructions whose size does not depend on their operands.
fn fixed_len(opcode: u8) -> Option<usize> {
    let len = match opcode {
        0x00..=0x0f => 1,
        0x10 => 2,
        0x11 => 3,
        0x15..=0x19 => 2,
        0x1a..=0x35 => 1,
        0x36..=0x3a => 2,
        0x3b..=0x83 => 1,
        IINC => 3,
        0x85..=0x98 => 1,
        0x99..=0xa8 => 3,
        0xa9 => 2,
        0xac..=0xb1 => 1,
        0xbc => 2,
        0xbe | 0xbf | 0xc2 | 0xc3 => 1,
        0xc6 | 0xc7 => 3,
        0xc8 | 0xc9 => 5,
        0xca | 0xfe | 0xff => 1,
        _ => return None,
    };
    Some(len)
}

fn switch_padding(offset: usize) -> usize {
    (4 - (offset + 1) % 4) % 4
}

fn tableswitch_len(code: &[u8], offset: usize) -> Result<usize> {
    let base = offset + 1 + switch_padding(offset);
    let low = i4_operand(code, base + 4)?;
    let high = i4_operand(code, base + 8)?;
    if high < low {
        return Err(Error::MalformedAttribute("Code"));
    }
    let entries = (high as i64 - low as i64 + 1) as usize;
    Ok(base + 12 + entries * 4 - offset)
}

fn lookupswitch_len(code: &[u8], offset: usize) -> Result<usize> {
    let base = offset + 1 + switch_padding(offset);
    let pairs = i4_operand(code, base + 4)?;
    if pairs < 0 {
        return Err(Error::MalformedAttribute("Code"));
    }
    Ok(base + 8 + pairs as usize * 8 - offset)
}

fn u1_operand(code: &[u8], at: usize) -> Result<u8> {
    code.get(at).copied().ok_or(Error::UnexpectedEof)
}

fn u2_operand(code: &[u8], at: usize) -> Result<u16> {
    crate::reader::u2_at(code, at)
}

fn i4_operand(code: &[u8], at: usize) -> Result<i32> {
    let bytes = code.get(at..at + 4).ok_or(Error::UnexpectedEof)?;
    Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}
