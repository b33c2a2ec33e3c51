//! Encoding of decoded instructions back into CIL bytes.
//!
//! This is the inverse of [`crate::disassembler::decode`]: opcode bytes are written first,
//! then the operand in little-endian order. Branch and switch operands hold absolute targets
//! and are turned back into deltas relative to the end of the instruction, using the
//! instruction's own `offset`. Resolved token operands write back the token they were resolved
//! from, so no resolver is needed.
//!
//! [`InstructionEncoder`] builds instruction lists from mnemonics and lays out offsets
//! automatically.
//!
//! # Examples
//!
//! ```rust
//! use cildecode::{
//!     disassembler::{decode, encode, InstructionEncoder, OperandValue},
//!     metadata::resolver::OpaqueResolver,
//! };
//!
//! let mut encoder = InstructionEncoder::new();
//! encoder.emit("ldarg.0", OperandValue::None)?;
//! encoder.emit("brtrue.s", OperandValue::Target(4))?;
//! encoder.emit("nop", OperandValue::None)?;
//! encoder.emit("ret", OperandValue::None)?;
//!
//! let code = encoder.finish()?;
//! assert_eq!(code, [0x02, 0x2D, 0x01, 0x00, 0x2A]);
//!
//! // Decoding gives back the same instructions
//! assert_eq!(encode(&decode(&code, &OpaqueResolver)?)?, code);
//! # Ok::<(), cildecode::Error>(())
//! ```

use crate::{
    disassembler::{
        branch::{instruction_end, relative_offset},
        by_mnemonic, Instruction, OperandKind, OperandValue,
    },
    file::io::write_le,
    Result,
};

/// Appends the encoding of `instruction` to `out`.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if the operand does not fit the opcode's operand kind,
/// the opcode takes an inline signature, or a short branch target is out of reach.
pub fn encode_instruction(instruction: &Instruction, out: &mut Vec<u8>) -> Result<()> {
    let opcode = instruction.opcode;
    if opcode.operand == OperandKind::InlineSignature {
        return Err(malformed_error!(
            "'{}' at IL_{:04x} carries an inline signature, which cannot be encoded",
            opcode.mnemonic,
            instruction.offset
        ));
    }
    if !instruction.operand.matches(opcode.operand) {
        return Err(malformed_error!(
            "'{}' at IL_{:04x} expects a {} operand, got {:?}",
            opcode.mnemonic,
            instruction.offset,
            opcode.operand,
            instruction.operand
        ));
    }

    out.extend_from_slice(opcode.bytes());

    match &instruction.operand {
        OperandValue::None => {}
        OperandValue::Int8(value) => write_le(out, *value),
        OperandValue::Int32(value) => write_le(out, *value),
        OperandValue::Int64(value) => write_le(out, *value),
        OperandValue::Float32(value) => write_le(out, *value),
        OperandValue::Float64(value) => write_le(out, *value),
        OperandValue::ShortLocal(index) => write_le(out, *index),
        OperandValue::Local(index) => write_le(out, *index),
        OperandValue::Target(target) => {
            if opcode.operand == OperandKind::ShortBranchTarget {
                let base = instruction_end(instruction.offset, opcode.size, 1);
                let delta = i8::try_from(relative_offset(base, *target)).map_err(|_| {
                    malformed_error!(
                        "'{}' at IL_{:04x} cannot reach IL_{:04x}",
                        opcode.mnemonic,
                        instruction.offset,
                        target
                    )
                })?;
                write_le(out, delta);
            } else {
                let base = instruction_end(instruction.offset, opcode.size, 4);
                write_le(out, relative_offset(base, *target));
            }
        }
        OperandValue::Switch(targets) => {
            let count = u32::try_from(targets.len())
                .map_err(|_| malformed_error!("Switch with {} targets", targets.len()))?;
            let base = instruction_end(
                instruction.offset,
                opcode.size,
                4_u32.wrapping_add(count.wrapping_mul(4)),
            );

            write_le(out, count);
            for target in targets {
                write_le(out, relative_offset(base, *target));
            }
        }
        OperandValue::String(_)
        | OperandValue::Method(_)
        | OperandValue::Field(_)
        | OperandValue::Type(_)
        | OperandValue::Member(_) => {
            if let Some(token) = instruction.operand.token() {
                write_le(out, token.value());
            }
        }
    }

    Ok(())
}

/// Encodes a complete instruction list.
///
/// Each instruction's `offset` must equal the number of bytes written before it, which is
/// always the case for lists produced by the decoder or by [`InstructionEncoder`].
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for offset mismatches and for any error of
/// [`encode_instruction`].
pub fn encode(instructions: &[Instruction]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(instructions.iter().map(Instruction::size).sum());
    for instruction in instructions {
        if u64::from(instruction.offset) != out.len() as u64 {
            return Err(malformed_error!(
                "'{}' claims offset IL_{:04x} but is encoded at IL_{:04x}",
                instruction.opcode.mnemonic,
                instruction.offset,
                out.len()
            ));
        }
        encode_instruction(instruction, &mut out)?;
    }
    Ok(out)
}

/// Builds an instruction list from mnemonics, assigning consecutive offsets.
///
/// Branch operands are absolute targets, so forward targets must be computed by the caller.
#[derive(Debug, Default)]
pub struct InstructionEncoder {
    instructions: Vec<Instruction>,
    position: u32,
}

impl InstructionEncoder {
    /// Creates an empty encoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset the next emitted instruction will receive.
    #[must_use]
    pub fn position(&self) -> u32 {
        self.position
    }

    /// Appends an instruction.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for unknown mnemonics, operands that do not fit the
    /// opcode, or code growing past 32-bit offsets.
    pub fn emit(&mut self, mnemonic: &str, operand: OperandValue) -> Result<&Instruction> {
        let Some(opcode) = by_mnemonic(mnemonic) else {
            return Err(malformed_error!("Unknown mnemonic '{}'", mnemonic));
        };
        if opcode.operand == OperandKind::InlineSignature || !operand.matches(opcode.operand) {
            return Err(malformed_error!(
                "'{}' expects a {} operand, got {:?}",
                mnemonic,
                opcode.operand,
                operand
            ));
        }

        let instruction = Instruction {
            offset: self.position,
            opcode,
            operand,
        };
        self.position = u32::try_from(instruction.end())
            .map_err(|_| malformed_error!("Code exceeds the 32-bit address space"))?;
        self.instructions.push(instruction);

        Ok(&self.instructions[self.instructions.len() - 1])
    }

    /// Instructions emitted so far.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Consumes the encoder and returns the instruction list.
    #[must_use]
    pub fn into_instructions(self) -> Vec<Instruction> {
        self.instructions
    }

    /// Consumes the encoder and returns the encoded bytes.
    ///
    /// # Errors
    /// Returns the first error of [`encode`].
    pub fn finish(self) -> Result<Vec<u8>> {
        encode(&self.instructions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        disassembler::decode,
        metadata::{
            resolver::{OpaqueResolver, TypeRef},
            token::Token,
        },
        Error,
    };

    #[test]
    fn simple_instructions() -> Result<()> {
        let mut encoder = InstructionEncoder::new();
        encoder.emit("nop", OperandValue::None)?;
        encoder.emit("ldc.i4.s", OperandValue::Int8(-1))?;
        encoder.emit("ldloc", OperandValue::Local(300))?;
        encoder.emit("ceq", OperandValue::None)?;
        encoder.emit("ret", OperandValue::None)?;
        assert_eq!(encoder.position(), 10);

        assert_eq!(
            encoder.finish()?,
            [0x00, 0x1F, 0xFF, 0xFE, 0x0C, 0x2C, 0x01, 0xFE, 0x01, 0x2A]
        );
        Ok(())
    }

    #[test]
    fn backward_branches() -> Result<()> {
        let mut encoder = InstructionEncoder::new();
        encoder.emit("br.s", OperandValue::Target(0))?;
        encoder.emit("br", OperandValue::Target(0))?;

        assert_eq!(encoder.finish()?, [0x2B, 0xFE, 0x38, 0xF9, 0xFF, 0xFF, 0xFF]);
        Ok(())
    }

    #[test]
    fn switch_targets() -> Result<()> {
        let mut encoder = InstructionEncoder::new();
        encoder.emit("switch", OperandValue::Switch(vec![13, 0]))?;

        #[rustfmt::skip]
        let expected = [
            0x45, 0x02, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0xF3, 0xFF, 0xFF, 0xFF,
        ];
        assert_eq!(encoder.finish()?, expected);
        Ok(())
    }

    #[test]
    fn tokens_are_written_back() -> Result<()> {
        let mut encoder = InstructionEncoder::new();
        encoder.emit(
            "box",
            OperandValue::Type(TypeRef {
                token: Token(0x0100_0009),
                name: "int".into(),
            }),
        )?;

        assert_eq!(encoder.finish()?, [0x8C, 0x09, 0x00, 0x00, 0x01]);
        Ok(())
    }

    #[test]
    fn short_branch_out_of_range() {
        let mut encoder = InstructionEncoder::new();
        encoder.emit("br.s", OperandValue::Target(500)).unwrap();
        assert!(matches!(encoder.finish(), Err(Error::Malformed { .. })));
    }

    #[test]
    fn rejects_mismatched_operands() {
        let mut encoder = InstructionEncoder::new();
        assert!(encoder.emit("ldc.i4", OperandValue::Int8(1)).is_err());
        assert!(encoder.emit("calli", OperandValue::None).is_err());
        assert!(encoder.emit("frobnicate", OperandValue::None).is_err());
        assert!(encoder.instructions().is_empty());

        let bad = Instruction {
            offset: 0,
            opcode: by_mnemonic("ret").unwrap(),
            operand: OperandValue::Int32(0),
        };
        assert!(matches!(encode(&[bad]), Err(Error::Malformed { .. })));
    }

    #[test]
    fn rejects_offset_gaps() {
        let instructions = vec![Instruction {
            offset: 3,
            opcode: by_mnemonic("nop").unwrap(),
            operand: OperandValue::None,
        }];
        assert!(matches!(encode(&instructions), Err(Error::Malformed { .. })));
    }

    #[test]
    fn round_trip() -> Result<()> {
        #[rustfmt::skip]
        let code = [
            0x16,                               // ldc.i4.0
            0x0A,                               // stloc.0
            0x2B, 0x08,                         // br.s IL_000c
            0x06,                               // ldloc.0
            0x17,                               // ldc.i4.1
            0x58,                               // add
            0x0A,                               // stloc.0
            0xFE, 0x0C, 0x01, 0x00,             // ldloc 1
            0x06,                               // ldloc.0
            0x1F, 0x0A,                         // ldc.i4.s 10
            0x32, 0xF3,                         // blt.s IL_0004
            0x22, 0x00, 0x00, 0xC0, 0x3F,       // ldc.r4 1.5
            0x26,                               // pop
            0xD0, 0x01, 0x00, 0x00, 0x02,       // ldtoken
            0x26,                               // pop
            0x2A,                               // ret
        ];
        let instructions = decode(&code, &OpaqueResolver)?;
        assert_eq!(instructions[2].operand, OperandValue::Target(0x0c));
        assert_eq!(instructions[10].operand, OperandValue::Target(0x04));

        assert_eq!(encode(&instructions)?, code);
        Ok(())
    }
}
