//! Decoded operand values and the per-kind operand reader.

use std::fmt;

use log::trace;

use crate::{
    disassembler::{
        branch::{resolve_long_branch, resolve_short_branch, resolve_switch_targets},
        OpcodeDescriptor, OperandKind,
    },
    metadata::{
        resolver::{FieldRef, MemberRef, MetadataResolver, MethodRef, TypeRef, UserString},
        token::Token,
    },
    Error, Parser, Result,
};

/// The decoded operand of one instruction.
///
/// Exactly one variant corresponds to each [`OperandKind`] except
/// [`OperandKind::InlineSignature`], which is never decoded. Branch and switch operands hold
/// absolute targets, not the raw deltas.
///
/// Float immediates compare by bit pattern, so `NaN` equals an identical `NaN` and `-0.0`
/// differs from `0.0`.
#[derive(Debug, Clone)]
pub enum OperandValue {
    /// No operand
    None,
    /// Signed 8-bit immediate
    Int8(i8),
    /// Signed 32-bit immediate
    Int32(i32),
    /// Signed 64-bit immediate
    Int64(i64),
    /// 32-bit float immediate
    Float32(f32),
    /// 64-bit float immediate
    Float64(f64),
    /// Resolved `ldstr` literal
    String(UserString),
    /// Resolved method reference
    Method(MethodRef),
    /// Resolved field reference
    Field(FieldRef),
    /// Resolved type reference
    Type(TypeRef),
    /// Resolved `ldtoken` member
    Member(MemberRef),
    /// Absolute target of a short or long branch
    Target(u32),
    /// Absolute targets of a switch, in table order
    Switch(Vec<u32>),
    /// 8-bit argument or local index
    ShortLocal(u8),
    /// 16-bit argument or local index
    Local(i16),
}

impl PartialEq for OperandValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (OperandValue::None, OperandValue::None) => true,
            (OperandValue::Int8(a), OperandValue::Int8(b)) => a == b,
            (OperandValue::Int32(a), OperandValue::Int32(b)) => a == b,
            (OperandValue::Int64(a), OperandValue::Int64(b)) => a == b,
            (OperandValue::Float32(a), OperandValue::Float32(b)) => a.to_bits() == b.to_bits(),
            (OperandValue::Float64(a), OperandValue::Float64(b)) => a.to_bits() == b.to_bits(),
            (OperandValue::String(a), OperandValue::String(b)) => a == b,
            (OperandValue::Method(a), OperandValue::Method(b)) => a == b,
            (OperandValue::Field(a), OperandValue::Field(b)) => a == b,
            (OperandValue::Type(a), OperandValue::Type(b)) => a == b,
            (OperandValue::Member(a), OperandValue::Member(b)) => a == b,
            (OperandValue::Target(a), OperandValue::Target(b)) => a == b,
            (OperandValue::Switch(a), OperandValue::Switch(b)) => a == b,
            (OperandValue::ShortLocal(a), OperandValue::ShortLocal(b)) => a == b,
            (OperandValue::Local(a), OperandValue::Local(b)) => a == b,
            _ => false,
        }
    }
}

impl OperandValue {
    /// The operand kind this value decodes.
    ///
    /// `Target` reports [`OperandKind::LongBranchTarget`]; both branch widths share the variant,
    /// so use [`OperandValue::matches`] to check a value against an opcode.
    #[must_use]
    pub fn kind(&self) -> OperandKind {
        match self {
            OperandValue::None => OperandKind::None,
            OperandValue::Int8(_) => OperandKind::Int8,
            OperandValue::Int32(_) => OperandKind::Int32,
            OperandValue::Int64(_) => OperandKind::Int64,
            OperandValue::Float32(_) => OperandKind::Float32,
            OperandValue::Float64(_) => OperandKind::Float64,
            OperandValue::String(_) => OperandKind::StringToken,
            OperandValue::Method(_) => OperandKind::MethodToken,
            OperandValue::Field(_) => OperandKind::FieldToken,
            OperandValue::Type(_) => OperandKind::TypeToken,
            OperandValue::Member(_) => OperandKind::MemberToken,
            OperandValue::Target(_) => OperandKind::LongBranchTarget,
            OperandValue::Switch(_) => OperandKind::SwitchTargets,
            OperandValue::ShortLocal(_) => OperandKind::LocalIndexShort,
            OperandValue::Local(_) => OperandKind::LocalIndexLong,
        }
    }

    /// Returns `true` if this value is a valid operand for `kind`.
    #[must_use]
    pub fn matches(&self, kind: OperandKind) -> bool {
        match self {
            OperandValue::Target(_) => matches!(
                kind,
                OperandKind::ShortBranchTarget | OperandKind::LongBranchTarget
            ),
            _ => self.kind() == kind,
        }
    }

    /// Number of bytes this operand occupies when encoded for an opcode of `kind`.
    #[must_use]
    pub fn encoded_size(&self, kind: OperandKind) -> usize {
        match self {
            OperandValue::Switch(targets) => 4 + 4 * targets.len(),
            _ => kind.size().unwrap_or(0),
        }
    }

    /// The metadata token behind a resolved operand.
    #[must_use]
    pub fn token(&self) -> Option<Token> {
        match self {
            OperandValue::String(string) => Some(string.token),
            OperandValue::Method(method) => Some(method.token),
            OperandValue::Field(field) => Some(field.token),
            OperandValue::Type(ty) => Some(ty.token),
            OperandValue::Member(member) => Some(member.token()),
            _ => None,
        }
    }
}

impl fmt::Display for OperandValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperandValue::None => Ok(()),
            OperandValue::Int8(value) => write!(f, "{value}"),
            OperandValue::Int32(value) => write!(f, "{value}"),
            OperandValue::Int64(value) => write!(f, "{value}"),
            OperandValue::Float32(value) => write!(f, "{value:?}"),
            OperandValue::Float64(value) => write!(f, "{value:?}"),
            OperandValue::String(string) => write!(f, "{string}"),
            OperandValue::Method(method) => write!(f, "{method}"),
            OperandValue::Field(field) => write!(f, "{field}"),
            OperandValue::Type(ty) => write!(f, "{ty}"),
            OperandValue::Member(member) => write!(f, "{member}"),
            OperandValue::Target(target) => write!(f, "IL_{target:04x}"),
            OperandValue::Switch(targets) => {
                f.write_str("(")?;
                for (index, target) in targets.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "IL_{target:04x}")?;
                }
                f.write_str(")")
            }
            OperandValue::ShortLocal(index) => write!(f, "{index}"),
            OperandValue::Local(index) => write!(f, "{index}"),
        }
    }
}

/// Decodes the operand of `opcode`, whose opcode bytes start at `instruction_offset` and have
/// already been consumed from `parser`.
///
/// On success the cursor has advanced by exactly the operand's encoded size. Token operands
/// are handed to `resolver`; the opcode's kind selects which resolution function is called.
///
/// # Errors
/// - [`crate::Error::UnsupportedOperand`] for `calli` signatures, without consuming anything
/// - [`crate::Error::BufferTruncated`] if the operand does not fit in the remaining input
/// - [`crate::Error::UnresolvedToken`] if the resolver rejects a token
pub fn read_operand<R: MetadataResolver + ?Sized>(
    opcode: &'static OpcodeDescriptor,
    parser: &mut Parser,
    instruction_offset: u32,
    resolver: &R,
) -> Result<OperandValue> {
    if let Some(size) = opcode.operand.size() {
        parser.ensure_remaining(size)?;
    }

    let value = match opcode.operand {
        OperandKind::None => OperandValue::None,
        OperandKind::Int8 => OperandValue::Int8(parser.read_le::<i8>()?),
        OperandKind::Int32 => OperandValue::Int32(parser.read_le::<i32>()?),
        OperandKind::Int64 => OperandValue::Int64(parser.read_le::<i64>()?),
        OperandKind::Float32 => OperandValue::Float32(parser.read_le::<f32>()?),
        OperandKind::Float64 => OperandValue::Float64(parser.read_le::<f64>()?),
        OperandKind::StringToken => {
            OperandValue::String(resolver.resolve_string(read_token(parser)?)?)
        }
        OperandKind::MethodToken => {
            OperandValue::Method(resolver.resolve_method(read_token(parser)?)?)
        }
        OperandKind::FieldToken => OperandValue::Field(resolver.resolve_field(read_token(parser)?)?),
        OperandKind::TypeToken => OperandValue::Type(resolver.resolve_type(read_token(parser)?)?),
        OperandKind::MemberToken => {
            OperandValue::Member(resolver.resolve_member(read_token(parser)?)?)
        }
        OperandKind::InlineSignature => {
            return Err(Error::UnsupportedOperand {
                mnemonic: opcode.mnemonic,
                kind: opcode.operand,
            })
        }
        OperandKind::ShortBranchTarget => {
            OperandValue::Target(resolve_short_branch(parser, instruction_offset, opcode.size)?)
        }
        OperandKind::LongBranchTarget => {
            OperandValue::Target(resolve_long_branch(parser, instruction_offset, opcode.size)?)
        }
        OperandKind::SwitchTargets => OperandValue::Switch(resolve_switch_targets(
            parser,
            instruction_offset,
            opcode.size,
        )?),
        OperandKind::LocalIndexShort => OperandValue::ShortLocal(parser.read_le::<u8>()?),
        OperandKind::LocalIndexLong => OperandValue::Local(parser.read_le::<i16>()?),
    };

    Ok(value)
}

fn read_token(parser: &mut Parser) -> Result<Token> {
    let token = Token::new(parser.read_le::<u32>()?);
    trace!("resolving token {token:?}");
    Ok(token)
}
