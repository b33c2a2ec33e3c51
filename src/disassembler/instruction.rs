//! The decoded instruction type.

use std::fmt;

use crate::disassembler::{FlowType, OpcodeDescriptor, OperandValue};

/// One decoded CIL instruction.
///
/// Instructions own their operands and do not borrow the buffer they were decoded from. The
/// opcode is a reference into the static opcode table.
///
/// The [`fmt::Display`] implementation follows `ildasm`:
///
/// ```rust
/// use cildecode::{disassembler::decode, metadata::resolver::OpaqueResolver};
///
/// let instructions = decode(&[0x00, 0x2B, 0xFD], &OpaqueResolver)?;
/// assert_eq!(instructions[1].to_string(), "IL_0001: br.s IL_0000");
/// # Ok::<(), cildecode::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Offset of the first opcode byte from the start of the code
    pub offset: u32,
    /// The opcode's table entry
    pub opcode: &'static OpcodeDescriptor,
    /// The decoded operand
    pub operand: OperandValue,
}

impl Instruction {
    /// Instruction mnemonic, e.g. `"ldc.i4.s"`
    #[must_use]
    pub fn mnemonic(&self) -> &'static str {
        self.opcode.mnemonic
    }

    /// Control flow classification of the opcode
    #[must_use]
    pub fn flow(&self) -> FlowType {
        self.opcode.flow
    }

    /// Encoded size in bytes: opcode plus operand.
    #[must_use]
    pub fn size(&self) -> usize {
        usize::from(self.opcode.size) + self.operand.encoded_size(self.opcode.operand)
    }

    /// Offset of the first byte after this instruction.
    #[must_use]
    pub fn end(&self) -> u64 {
        u64::from(self.offset) + self.size() as u64
    }

    /// Absolute targets of a branch, `leave` or `switch`; empty for everything else.
    #[must_use]
    pub fn branch_targets(&self) -> Vec<u32> {
        match &self.operand {
            OperandValue::Target(target) => vec![*target],
            OperandValue::Switch(targets) => targets.clone(),
            _ => Vec::new(),
        }
    }

    /// Returns `true` if execution can continue with the next instruction.
    #[must_use]
    pub fn falls_through(&self) -> bool {
        matches!(
            self.opcode.flow,
            FlowType::Sequential
                | FlowType::ConditionalBranch
                | FlowType::Call
                | FlowType::Switch
        )
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IL_{:04x}: {}", self.offset, self.opcode.mnemonic)?;
        match &self.operand {
            OperandValue::None => Ok(()),
            operand => write!(f, " {operand}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        disassembler::by_mnemonic,
        metadata::{resolver::MethodRef, token::Token},
    };

    fn method() -> OperandValue {
        OperandValue::Method(MethodRef {
            token: Token(0x0600_0001),
            declaring_type: None,
            name: "Run".into(),
        })
    }

    fn instruction(offset: u32, mnemonic: &str, operand: OperandValue) -> Instruction {
        Instruction {
            offset,
            opcode: by_mnemonic(mnemonic).unwrap(),
            operand,
        }
    }

    #[test]
    fn sizes() {
        assert_eq!(instruction(0, "ret", OperandValue::None).size(), 1);
        assert_eq!(instruction(0, "br.s", OperandValue::Target(0)).size(), 2);
        assert_eq!(instruction(0, "br", OperandValue::Target(0)).size(), 5);
        assert_eq!(instruction(0, "ldloc", OperandValue::Local(3)).size(), 4);
        assert_eq!(
            instruction(6, "switch", OperandValue::Switch(vec![1, 2])).end(),
            6 + 1 + 4 + 8
        );
    }

    #[test]
    fn targets_and_flow() {
        let switch = instruction(0, "switch", OperandValue::Switch(vec![9, 12]));
        assert_eq!(switch.branch_targets(), vec![9, 12]);
        assert!(switch.falls_through());

        let br = instruction(0, "br", OperandValue::Target(7));
        assert_eq!(br.branch_targets(), vec![7]);
        assert_eq!(br.flow(), FlowType::UnconditionalBranch);
        assert!(!br.falls_through());

        assert!(!instruction(0, "throw", OperandValue::None).falls_through());
        assert!(instruction(0, "call", method()).falls_through());

        let jmp = instruction(0, "jmp", method());
        assert_eq!(jmp.flow(), FlowType::Return);
        assert!(!jmp.falls_through());
        assert!(instruction(0, "add", OperandValue::None).branch_targets().is_empty());
    }

    #[test]
    fn display() {
        assert_eq!(instruction(0x10, "ret", OperandValue::None).to_string(), "IL_0010: ret");
        assert_eq!(
            instruction(2, "ldc.i4.s", OperandValue::Int8(-3)).to_string(),
            "IL_0002: ldc.i4.s -3"
        );

        let call = instruction(
            5,
            "call",
            OperandValue::Method(MethodRef {
                token: Token(0x0A00_0001),
                declaring_type: Some("System.Console".into()),
                name: "WriteLine".into(),
            }),
        );
        assert_eq!(call.to_string(), "IL_0005: call System.Console::WriteLine");

        let switch = instruction(0, "switch", OperandValue::Switch(vec![0x10, 0x14]));
        assert_eq!(switch.to_string(), "IL_0000: switch (IL_0010, IL_0014)");
    }
}
