//! CIL (Common Intermediate Language) instruction decoding engine.
//!
//! This module turns the raw code of one method into a list of [`Instruction`]s and back.
//!
//! # Key Types
//! - [`OpcodeDescriptor`] - Static description of an opcode
//! - [`OperandKind`] / [`OperandValue`] - Operand layouts and decoded operands
//! - [`Instruction`] - A decoded instruction
//! - [`FlowType`] - How instructions affect control flow
//!
//! # Main Functions
//! - [`lookup`] / [`read_opcode`] / [`by_mnemonic`] - Opcode table access
//! - [`read_operand`] - Decode one operand per its kind
//! - [`decode_instruction`] / [`decode`] - Decode one instruction or a whole buffer
//! - [`decode_method`] / [`decode_methods`] - Decode method bodies, optionally in parallel
//! - [`encode`] / [`encode_instruction`] - Encode instructions back to bytes
//!
//! # Example
//! ```rust
//! use cildecode::{disassembler::decode, metadata::resolver::OpaqueResolver};
//!
//! let instructions = decode(&[0x00, 0x2A], &OpaqueResolver)?; // nop, ret
//! assert_eq!(instructions[1].mnemonic(), "ret");
//! assert_eq!(instructions[1].offset, 1);
//! # Ok::<(), cildecode::Error>(())
//! ```

pub mod branch;
mod decoder;
mod encoder;
mod instruction;
mod operand;
mod table;

pub use decoder::{decode, decode_instruction, decode_method, decode_methods, DecodedMethod};
pub use encoder::{encode, encode_instruction, InstructionEncoder};
pub use instruction::Instruction;
pub use operand::{read_operand, OperandValue};
pub use table::{
    by_mnemonic, iter as opcodes, lookup, read_opcode, FlowType, OpcodeDescriptor, OperandKind,
    PREFIX_FE,
};
