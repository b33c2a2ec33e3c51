//! The CIL opcode table (ECMA-335 Partition III).
//!
//! Every opcode is described by a static [`OpcodeDescriptor`]. Single-byte opcodes and the
//! `0xFE`-escaped two-byte opcodes live in two 256-entry arrays indexed by their last byte, so a
//! lookup is a single array access. Slots without an opcode hold a reserved descriptor with an
//! empty mnemonic and are reported as [`crate::Error::UnknownOpcode`].
//!
//! # Examples
//!
//! ```rust
//! use cildecode::disassembler::{by_mnemonic, lookup, OperandKind};
//!
//! let ceq = lookup(0xFE, Some(0x01))?;
//! assert_eq!(ceq.mnemonic, "ceq");
//! assert_eq!(ceq.size, 2);
//!
//! let br_s = by_mnemonic("br.s").unwrap();
//! assert_eq!(br_s.value, 0x2B);
//! assert_eq!(br_s.operand, OperandKind::ShortBranchTarget);
//! # Ok::<(), cildecode::Error>(())
//! ```

use std::{collections::HashMap, sync::OnceLock};

use strum::{Display, EnumIter};

use crate::{Error, Parser, Result};

/// First byte of every two-byte opcode
pub const PREFIX_FE: u8 = 0xFE;

/// Operand encodings, one per distinct operand layout an opcode can have.
///
/// The kind alone determines how many bytes follow the opcode, except for
/// [`OperandKind::SwitchTargets`] whose length depends on its leading count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum OperandKind {
    /// No operand
    None,
    /// Signed 8-bit immediate (`ldc.i4.s`, `unaligned.`, `no.`)
    Int8,
    /// Signed 32-bit immediate
    Int32,
    /// Signed 64-bit immediate
    Int64,
    /// 32-bit float immediate
    Float32,
    /// 64-bit float immediate
    Float64,
    /// `#US` heap token
    StringToken,
    /// `MethodDef`, `MemberRef` or `MethodSpec` token
    MethodToken,
    /// `Field` or `MemberRef` token
    FieldToken,
    /// `TypeDef`, `TypeRef` or `TypeSpec` token
    TypeToken,
    /// Any method, field or type token (`ldtoken`)
    MemberToken,
    /// `StandAloneSig` token of a call site (`calli`); never decoded
    InlineSignature,
    /// Signed 8-bit branch delta
    ShortBranchTarget,
    /// Signed 32-bit branch delta
    LongBranchTarget,
    /// 32-bit count followed by that many 32-bit deltas
    SwitchTargets,
    /// Unsigned 8-bit argument or local index
    LocalIndexShort,
    /// 16-bit argument or local index
    LocalIndexLong,
}

impl OperandKind {
    /// Encoded width in bytes, or `None` for the variable-length switch table.
    #[must_use]
    pub const fn size(&self) -> Option<usize> {
        match self {
            OperandKind::None => Some(0),
            OperandKind::Int8 | OperandKind::ShortBranchTarget | OperandKind::LocalIndexShort => {
                Some(1)
            }
            OperandKind::LocalIndexLong => Some(2),
            OperandKind::Int32
            | OperandKind::Float32
            | OperandKind::StringToken
            | OperandKind::MethodToken
            | OperandKind::FieldToken
            | OperandKind::TypeToken
            | OperandKind::MemberToken
            | OperandKind::InlineSignature
            | OperandKind::LongBranchTarget => Some(4),
            OperandKind::Int64 | OperandKind::Float64 => Some(8),
            OperandKind::SwitchTargets => None,
        }
    }

    /// Returns `true` for the kinds that carry a metadata token.
    #[must_use]
    pub const fn is_token(&self) -> bool {
        matches!(
            self,
            OperandKind::StringToken
                | OperandKind::MethodToken
                | OperandKind::FieldToken
                | OperandKind::TypeToken
                | OperandKind::MemberToken
                | OperandKind::InlineSignature
        )
    }
}

/// How an instruction affects control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum FlowType {
    /// Execution continues with the next instruction
    Sequential,
    /// Branches when a condition holds, otherwise falls through
    ConditionalBranch,
    /// Always branches
    UnconditionalBranch,
    /// Calls another method and continues afterwards
    Call,
    /// Leaves the current method (`ret`, or `jmp` into another method)
    Return,
    /// Multi-way branch
    Switch,
    /// Throws an exception
    Throw,
    /// Ends a finally, fault or filter block
    EndFinally,
    /// Leaves a protected region
    Leave,
}

/// Static description of one opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeDescriptor {
    /// Lookup key: `0x00XX` for single-byte opcodes, `0xFEXX` for two-byte opcodes
    pub value: u16,
    /// Mnemonic as written in IL assembly; empty for reserved slots
    pub mnemonic: &'static str,
    /// Number of opcode bytes (1 or 2)
    pub size: u8,
    /// Layout of the operand that follows the opcode bytes
    pub operand: OperandKind,
    /// Control flow classification
    pub flow: FlowType,
}

impl OpcodeDescriptor {
    /// Returns `true` for slots that do not hold an opcode.
    #[must_use]
    pub const fn is_reserved(&self) -> bool {
        self.mnemonic.is_empty()
    }

    /// Returns `true` for the `0xFE`-escaped opcodes.
    #[must_use]
    pub const fn is_prefixed(&self) -> bool {
        self.size == 2
    }

    /// The opcode bytes as they appear in the instruction stream.
    #[must_use]
    pub fn bytes(&self) -> &'static [u8] {
        let index = usize::from(self.value & 0xFF);
        if self.is_prefixed() {
            &PREFIXED_BYTES[index]
        } else {
            &SINGLE_BYTES[index..=index]
        }
    }
}

const RESERVED: OpcodeDescriptor = OpcodeDescriptor {
    value: 0,
    mnemonic: "",
    size: 0,
    operand: OperandKind::None,
    flow: FlowType::Sequential,
};

macro_rules! opcodes {
    ($($value:literal => $mnemonic:literal, $operand:ident, $flow:ident;)*) => {
        &[$(
            OpcodeDescriptor {
                value: $value,
                mnemonic: $mnemonic,
                size: if $value > 0xFF { 2 } else { 1 },
                operand: OperandKind::$operand,
                flow: FlowType::$flow,
            },
        )*]
    };
}

const OPCODES: &[OpcodeDescriptor] = opcodes! {
    0x00 => "nop", None, Sequential;
    0x01 => "break", None, Sequential;
    0x02 => "ldarg.0", None, Sequential;
    0x03 => "ldarg.1", None, Sequential;
    0x04 => "ldarg.2", None, Sequential;
    0x05 => "ldarg.3", None, Sequential;
    0x06 => "ldloc.0", None, Sequential;
    0x07 => "ldloc.1", None, Sequential;
    0x08 => "ldloc.2", None, Sequential;
    0x09 => "ldloc.3", None, Sequential;
    0x0A => "stloc.0", None, Sequential;
    0x0B => "stloc.1", None, Sequential;
    0x0C => "stloc.2", None, Sequential;
    0x0D => "stloc.3", None, Sequential;
    0x0E => "ldarg.s", LocalIndexShort, Sequential;
    0x0F => "ldarga.s", LocalIndexShort, Sequential;
    0x10 => "starg.s", LocalIndexShort, Sequential;
    0x11 => "ldloc.s", LocalIndexShort, Sequential;
    0x12 => "ldloca.s", LocalIndexShort, Sequential;
    0x13 => "stloc.s", LocalIndexShort, Sequential;
    0x14 => "ldnull", None, Sequential;
    0x15 => "ldc.i4.m1", None, Sequential;
    0x16 => "ldc.i4.0", None, Sequential;
    0x17 => "ldc.i4.1", None, Sequential;
    0x18 => "ldc.i4.2", None, Sequential;
    0x19 => "ldc.i4.3", None, Sequential;
    0x1A => "ldc.i4.4", None, Sequential;
    0x1B => "ldc.i4.5", None, Sequential;
    0x1C => "ldc.i4.6", None, Sequential;
    0x1D => "ldc.i4.7", None, Sequential;
    0x1E => "ldc.i4.8", None, Sequential;
    0x1F => "ldc.i4.s", Int8, Sequential;
    0x20 => "ldc.i4", Int32, Sequential;
    0x21 => "ldc.i8", Int64, Sequential;
    0x22 => "ldc.r4", Float32, Sequential;
    0x23 => "ldc.r8", Float64, Sequential;
    0x25 => "dup", None, Sequential;
    0x26 => "pop", None, Sequential;
    0x27 => "jmp", MethodToken, Return;
    0x28 => "call", MethodToken, Call;
    0x29 => "calli", InlineSignature, Call;
    0x2A => "ret", None, Return;
    0x2B => "br.s", ShortBranchTarget, UnconditionalBranch;
    0x2C => "brfalse.s", ShortBranchTarget, ConditionalBranch;
    0x2D => "brtrue.s", ShortBranchTarget, ConditionalBranch;
    0x2E => "beq.s", ShortBranchTarget, ConditionalBranch;
    0x2F => "bge.s", ShortBranchTarget, ConditionalBranch;
    0x30 => "bgt.s", ShortBranchTarget, ConditionalBranch;
    0x31 => "ble.s", ShortBranchTarget, ConditionalBranch;
    0x32 => "blt.s", ShortBranchTarget, ConditionalBranch;
    0x33 => "bne.un.s", ShortBranchTarget, ConditionalBranch;
    0x34 => "bge.un.s", ShortBranchTarget, ConditionalBranch;
    0x35 => "bgt.un.s", ShortBranchTarget, ConditionalBranch;
    0x36 => "ble.un.s", ShortBranchTarget, ConditionalBranch;
    0x37 => "blt.un.s", ShortBranchTarget, ConditionalBranch;
    0x38 => "br", LongBranchTarget, UnconditionalBranch;
    0x39 => "brfalse", LongBranchTarget, ConditionalBranch;
    0x3A => "brtrue", LongBranchTarget, ConditionalBranch;
    0x3B => "beq", LongBranchTarget, ConditionalBranch;
    0x3C => "bge", LongBranchTarget, ConditionalBranch;
    0x3D => "bgt", LongBranchTarget, ConditionalBranch;
    0x3E => "ble", LongBranchTarget, ConditionalBranch;
    0x3F => "blt", LongBranchTarget, ConditionalBranch;
    0x40 => "bne.un", LongBranchTarget, ConditionalBranch;
    0x41 => "bge.un", LongBranchTarget, ConditionalBranch;
    0x42 => "bgt.un", LongBranchTarget, ConditionalBranch;
    0x43 => "ble.un", LongBranchTarget, ConditionalBranch;
    0x44 => "blt.un", LongBranchTarget, ConditionalBranch;
    0x45 => "switch", SwitchTargets, Switch;
    0x46 => "ldind.i1", None, Sequential;
    0x47 => "ldind.u1", None, Sequential;
    0x48 => "ldind.i2", None, Sequential;
    0x49 => "ldind.u2", None, Sequential;
    0x4A => "ldind.i4", None, Sequential;
    0x4B => "ldind.u4", None, Sequential;
    0x4C => "ldind.i8", None, Sequential;
    0x4D => "ldind.i", None, Sequential;
    0x4E => "ldind.r4", None, Sequential;
    0x4F => "ldind.r8", None, Sequential;
    0x50 => "ldind.ref", None, Sequential;
    0x51 => "stind.ref", None, Sequential;
    0x52 => "stind.i1", None, Sequential;
    0x53 => "stind.i2", None, Sequential;
    0x54 => "stind.i4", None, Sequential;
    0x55 => "stind.i8", None, Sequential;
    0x56 => "stind.r4", None, Sequential;
    0x57 => "stind.r8", None, Sequential;
    0x58 => "add", None, Sequential;
    0x59 => "sub", None, Sequential;
    0x5A => "mul", None, Sequential;
    0x5B => "div", None, Sequential;
    0x5C => "div.un", None, Sequential;
    0x5D => "rem", None, Sequential;
    0x5E => "rem.un", None, Sequential;
    0x5F => "and", None, Sequential;
    0x60 => "or", None, Sequential;
    0x61 => "xor", None, Sequential;
    0x62 => "shl", None, Sequential;
    0x63 => "shr", None, Sequential;
    0x64 => "shr.un", None, Sequential;
    0x65 => "neg", None, Sequential;
    0x66 => "not", None, Sequential;
    0x67 => "conv.i1", None, Sequential;
    0x68 => "conv.i2", None, Sequential;
    0x69 => "conv.i4", None, Sequential;
    0x6A => "conv.i8", None, Sequential;
    0x6B => "conv.r4", None, Sequential;
    0x6C => "conv.r8", None, Sequential;
    0x6D => "conv.u4", None, Sequential;
    0x6E => "conv.u8", None, Sequential;
    0x6F => "callvirt", MethodToken, Call;
    0x70 => "cpobj", TypeToken, Sequential;
    0x71 => "ldobj", TypeToken, Sequential;
    0x72 => "ldstr", StringToken, Sequential;
    0x73 => "newobj", MethodToken, Call;
    0x74 => "castclass", TypeToken, Sequential;
    0x75 => "isinst", TypeToken, Sequential;
    0x76 => "conv.r.un", None, Sequential;
    0x79 => "unbox", TypeToken, Sequential;
    0x7A => "throw", None, Throw;
    0x7B => "ldfld", FieldToken, Sequential;
    0x7C => "ldflda", FieldToken, Sequential;
    0x7D => "stfld", FieldToken, Sequential;
    0x7E => "ldsfld", FieldToken, Sequential;
    0x7F => "ldsflda", FieldToken, Sequential;
    0x80 => "stsfld", FieldToken, Sequential;
    0x81 => "stobj", TypeToken, Sequential;
    0x82 => "conv.ovf.i1.un", None, Sequential;
    0x83 => "conv.ovf.i2.un", None, Sequential;
    0x84 => "conv.ovf.i4.un", None, Sequential;
    0x85 => "conv.ovf.i8.un", None, Sequential;
    0x86 => "conv.ovf.u1.un", None, Sequential;
    0x87 => "conv.ovf.u2.un", None, Sequential;
    0x88 => "conv.ovf.u4.un", None, Sequential;
    0x89 => "conv.ovf.u8.un", None, Sequential;
    0x8A => "conv.ovf.i.un", None, Sequential;
    0x8B => "conv.ovf.u.un", None, Sequential;
    0x8C => "box", TypeToken, Sequential;
    0x8D => "newarr", TypeToken, Sequential;
    0x8E => "ldlen", None, Sequential;
    0x8F => "ldelema", TypeToken, Sequential;
    0x90 => "ldelem.i1", None, Sequential;
    0x91 => "ldelem.u1", None, Sequential;
    0x92 => "ldelem.i2", None, Sequential;
    0x93 => "ldelem.u2", None, Sequential;
    0x94 => "ldelem.i4", None, Sequential;
    0x95 => "ldelem.u4", None, Sequential;
    0x96 => "ldelem.i8", None, Sequential;
    0x97 => "ldelem.i", None, Sequential;
    0x98 => "ldelem.r4", None, Sequential;
    0x99 => "ldelem.r8", None, Sequential;
    0x9A => "ldelem.ref", None, Sequential;
    0x9B => "stelem.i", None, Sequential;
    0x9C => "stelem.i1", None, Sequential;
    0x9D => "stelem.i2", None, Sequential;
    0x9E => "stelem.i4", None, Sequential;
    0x9F => "stelem.i8", None, Sequential;
    0xA0 => "stelem.r4", None, Sequential;
    0xA1 => "stelem.r8", None, Sequential;
    0xA2 => "stelem.ref", None, Sequential;
    0xA3 => "ldelem", TypeToken, Sequential;
    0xA4 => "stelem", TypeToken, Sequential;
    0xA5 => "unbox.any", TypeToken, Sequential;
    0xB3 => "conv.ovf.i1", None, Sequential;
    0xB4 => "conv.ovf.u1", None, Sequential;
    0xB5 => "conv.ovf.i2", None, Sequential;
    0xB6 => "conv.ovf.u2", None, Sequential;
    0xB7 => "conv.ovf.i4", None, Sequential;
    0xB8 => "conv.ovf.u4", None, Sequential;
    0xB9 => "conv.ovf.i8", None, Sequential;
    0xBA => "conv.ovf.u8", None, Sequential;
    0xC2 => "refanyval", TypeToken, Sequential;
    0xC3 => "ckfinite", None, Sequential;
    0xC6 => "mkrefany", TypeToken, Sequential;
    0xD0 => "ldtoken", MemberToken, Sequential;
    0xD1 => "conv.u2", None, Sequential;
    0xD2 => "conv.u1", None, Sequential;
    0xD3 => "conv.i", None, Sequential;
    0xD4 => "conv.ovf.i", None, Sequential;
    0xD5 => "conv.ovf.u", None, Sequential;
    0xD6 => "add.ovf", None, Sequential;
    0xD7 => "add.ovf.un", None, Sequential;
    0xD8 => "mul.ovf", None, Sequential;
    0xD9 => "mul.ovf.un", None, Sequential;
    0xDA => "sub.ovf", None, Sequential;
    0xDB => "sub.ovf.un", None, Sequential;
    0xDC => "endfinally", None, EndFinally;
    0xDD => "leave", LongBranchTarget, Leave;
    0xDE => "leave.s", ShortBranchTarget, Leave;
    0xDF => "stind.i", None, Sequential;
    0xE0 => "conv.u", None, Sequential;
    0xFE00 => "arglist", None, Sequential;
    0xFE01 => "ceq", None, Sequential;
    0xFE02 => "cgt", None, Sequential;
    0xFE03 => "cgt.un", None, Sequential;
    0xFE04 => "clt", None, Sequential;
    0xFE05 => "clt.un", None, Sequential;
    0xFE06 => "ldftn", MethodToken, Sequential;
    0xFE07 => "ldvirtftn", MethodToken, Sequential;
    0xFE09 => "ldarg", LocalIndexLong, Sequential;
    0xFE0A => "ldarga", LocalIndexLong, Sequential;
    0xFE0B => "starg", LocalIndexLong, Sequential;
    0xFE0C => "ldloc", LocalIndexLong, Sequential;
    0xFE0D => "ldloca", LocalIndexLong, Sequential;
    0xFE0E => "stloc", LocalIndexLong, Sequential;
    0xFE0F => "localloc", None, Sequential;
    0xFE11 => "endfilter", None, EndFinally;
    0xFE12 => "unaligned.", Int8, Sequential;
    0xFE13 => "volatile.", None, Sequential;
    0xFE14 => "tail.", None, Sequential;
    0xFE15 => "initobj", TypeToken, Sequential;
    0xFE16 => "constrained.", TypeToken, Sequential;
    0xFE17 => "cpblk", None, Sequential;
    0xFE18 => "initblk", None, Sequential;
    0xFE19 => "no.", Int8, Sequential;
    0xFE1A => "rethrow", None, Throw;
    0xFE1C => "sizeof", TypeToken, Sequential;
    0xFE1D => "refanytype", None, Sequential;
    0xFE1E => "readonly.", None, Sequential;
};

const fn build_table(opcodes: &[OpcodeDescriptor], prefixed: bool) -> [OpcodeDescriptor; 256] {
    let mut table = [RESERVED; 256];
    let mut i = 0;
    while i < opcodes.len() {
        let descriptor = opcodes[i];
        if (descriptor.value > 0xFF) == prefixed {
            table[(descriptor.value & 0xFF) as usize] = descriptor;
        }
        i += 1;
    }
    table
}

const fn byte_table() -> [u8; 256] {
    let mut bytes = [0_u8; 256];
    let mut i = 0;
    while i < 256 {
        bytes[i] = i as u8;
        i += 1;
    }
    bytes
}

const fn prefixed_byte_table() -> [[u8; 2]; 256] {
    let mut bytes = [[PREFIX_FE, 0_u8]; 256];
    let mut i = 0;
    while i < 256 {
        bytes[i][1] = i as u8;
        i += 1;
    }
    bytes
}

/// Single-byte opcodes, indexed by the opcode byte
static INSTRUCTIONS: [OpcodeDescriptor; 256] = build_table(OPCODES, false);
/// Two-byte opcodes, indexed by the byte following `0xFE`
static INSTRUCTIONS_FE: [OpcodeDescriptor; 256] = build_table(OPCODES, true);

static SINGLE_BYTES: [u8; 256] = byte_table();
static PREFIXED_BYTES: [[u8; 2]; 256] = prefixed_byte_table();

static MNEMONIC_TO_OPCODE: OnceLock<HashMap<&'static str, &'static OpcodeDescriptor>> =
    OnceLock::new();

/// Looks up the descriptor for an opcode.
///
/// `second` is the byte following `first` and is only consulted when `first` is `0xFE`.
///
/// # Errors
/// Returns [`crate::Error::UnknownOpcode`] for reserved or undefined opcodes, and
/// [`crate::Error::BufferTruncated`] if `first` is `0xFE` but `second` is missing. That error's
/// `offset` is relative to the first opcode byte; [`read_opcode`] reports the absolute cursor
/// position instead.
pub fn lookup(first: u8, second: Option<u8>) -> Result<&'static OpcodeDescriptor> {
    let (descriptor, key) = if first == PREFIX_FE {
        let Some(second) = second else {
            return Err(Error::BufferTruncated {
                offset: 1,
                needed: 1,
                remaining: 0,
            });
        };
        (
            &INSTRUCTIONS_FE[usize::from(second)],
            u16::from_be_bytes([PREFIX_FE, second]),
        )
    } else {
        (&INSTRUCTIONS[usize::from(first)], u16::from(first))
    };

    if descriptor.is_reserved() {
        return Err(Error::UnknownOpcode(key));
    }
    Ok(descriptor)
}

/// Reads the opcode at the cursor, consuming one byte, or two for `0xFE`-escaped opcodes.
///
/// On failure the cursor is left at the first opcode byte.
///
/// # Errors
/// Returns [`crate::Error::BufferTruncated`] if the cursor is exhausted or a `0xFE` byte is not
/// followed by another byte, and [`crate::Error::UnknownOpcode`] for undefined opcodes.
pub fn read_opcode(parser: &mut Parser) -> Result<&'static OpcodeDescriptor> {
    let start = parser.pos();
    let first = parser.read_le::<u8>()?;

    let result = if first == PREFIX_FE {
        parser
            .read_le::<u8>()
            .and_then(|second| lookup(first, Some(second)))
    } else {
        lookup(first, None)
    };

    if result.is_err() {
        parser.seek(start)?;
    }
    result
}

/// Finds an opcode by its IL assembly mnemonic, e.g. `"ldc.i4.s"` or `"constrained."`.
pub fn by_mnemonic(mnemonic: &str) -> Option<&'static OpcodeDescriptor> {
    MNEMONIC_TO_OPCODE
        .get_or_init(|| iter().map(|opcode| (opcode.mnemonic, opcode)).collect())
        .get(mnemonic)
        .copied()
}

/// All defined opcodes: single-byte opcodes first, then the two-byte ones, each in ascending
/// order.
pub fn iter() -> impl Iterator<Item = &'static OpcodeDescriptor> {
    INSTRUCTIONS
        .iter()
        .chain(INSTRUCTIONS_FE.iter())
        .filter(|opcode| !opcode.is_reserved())
}
