//! CIL instruction stream decoding.
//!
//! The decoder walks a method's code from offset 0 to the end, reading one opcode and one
//! operand per step. It keeps no state beyond the cursor: every instruction records its own
//! start offset, and its size is the number of bytes the cursor advanced.
//!
//! # Example: Decoding a Single Instruction
//!
//! ```rust
//! use cildecode::{disassembler::decode_instruction, metadata::resolver::OpaqueResolver, Parser};
//!
//! let code = [0x1F, 0xF6]; // ldc.i4.s -10
//! let mut parser = Parser::new(&code);
//! let instruction = decode_instruction(&mut parser, &OpaqueResolver)?;
//! assert_eq!(instruction.mnemonic(), "ldc.i4.s");
//! assert_eq!(instruction.size(), 2);
//! # Ok::<(), cildecode::Error>(())
//! ```
//!
//! # Example: Decoding a Method Body
//!
//! ```rust
//! use cildecode::{disassembler::decode_method, metadata::resolver::OpaqueResolver};
//!
//! let body = [0x0A, 0x00, 0x2A]; // tiny header, nop, ret
//! let method = decode_method(&body, &OpaqueResolver)?;
//! assert_eq!(method.instructions.len(), 2);
//! assert!(!method.body.is_fat);
//! # Ok::<(), cildecode::Error>(())
//! ```

use std::fmt::Debug;

use log::{debug, trace, warn};
use rayon::prelude::*;

use crate::{
    disassembler::{operand::read_operand, read_opcode, Instruction},
    metadata::{method::MethodBody, resolver::MetadataResolver},
    Parser, Result,
};

/// A method body together with its decoded code.
#[derive(Debug, Clone)]
pub struct DecodedMethod {
    /// Parsed header and exception clauses
    pub body: MethodBody,
    /// Instructions of the code range, in offset order
    pub instructions: Vec<Instruction>,
}

/// Decodes the instruction starting at the cursor and advances past it.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if the cursor position does not fit in 32 bits, or any
/// error of the opcode lookup and operand decoding.
pub fn decode_instruction<R: MetadataResolver + ?Sized>(
    parser: &mut Parser,
    resolver: &R,
) -> Result<Instruction> {
    let offset = u32::try_from(parser.pos()).map_err(|_| {
        malformed_error!(
            "Instruction offset {} exceeds the 32-bit address space",
            parser.pos()
        )
    })?;

    let opcode = read_opcode(parser)?;
    let operand = read_operand(opcode, parser, offset, resolver)?;

    let instruction = Instruction {
        offset,
        opcode,
        operand,
    };
    trace!("{instruction}");

    Ok(instruction)
}

/// Decodes a complete code buffer into its instructions.
///
/// An empty buffer yields an empty list. Any error aborts the whole decode; a partially
/// decoded list is never returned.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for buffers longer than `u32::MAX` bytes, otherwise the
/// first error of [`decode_instruction`].
///
/// # Examples
///
/// ```rust
/// use cildecode::{disassembler::decode, metadata::resolver::OpaqueResolver};
///
/// // ldarg.0; ldarg.1; ceq; ret
/// let instructions = decode(&[0x02, 0x03, 0xFE, 0x01, 0x2A], &OpaqueResolver)?;
/// let offsets: Vec<u32> = instructions.iter().map(|i| i.offset).collect();
/// assert_eq!(offsets, [0, 1, 2, 4]);
/// # Ok::<(), cildecode::Error>(())
/// ```
pub fn decode<R: MetadataResolver + ?Sized>(code: &[u8], resolver: &R) -> Result<Vec<Instruction>> {
    if u32::try_from(code.len()).is_err() {
        return Err(malformed_error!(
            "Code of {} bytes exceeds the 32-bit address space",
            code.len()
        ));
    }

    let mut parser = Parser::new(code);
    let mut instructions = Vec::new();
    while parser.has_more_data() {
        instructions.push(decode_instruction(&mut parser, resolver)?);
    }

    debug!(
        "decoded {} instructions from {} bytes",
        instructions.len(),
        code.len()
    );
    Ok(instructions)
}

/// Parses a method body header and decodes exactly its code range.
///
/// # Errors
/// Returns header errors from [`MethodBody::from`] or decode errors from [`decode`].
pub fn decode_method<R: MetadataResolver + ?Sized>(
    data: &[u8],
    resolver: &R,
) -> Result<DecodedMethod> {
    let body = MethodBody::from(data)?;
    let instructions = decode(body.code(data)?, resolver)?;

    Ok(DecodedMethod { body, instructions })
}

/// Decodes many independent code buffers in parallel.
///
/// Results keep the input order and carry the caller's key (typically the method's `MethodDef`
/// token). A failing buffer is logged and reported in its own slot without affecting the
/// others.
///
/// # Examples
///
/// ```rust
/// use cildecode::{
///     disassembler::decode_methods,
///     metadata::{resolver::OpaqueResolver, token::Token},
/// };
///
/// let bodies: [(Token, &[u8]); 2] = [
///     (Token(0x0600_0001), &[0x00, 0x2A]),
///     (Token(0x0600_0002), &[0x24]),
/// ];
/// let results = decode_methods(&bodies, &OpaqueResolver);
///
/// assert_eq!(results[0].0, Token(0x0600_0001));
/// assert!(results[0].1.is_ok());
/// assert!(results[1].1.is_err());
/// ```
pub fn decode_methods<K, R>(bodies: &[(K, &[u8])], resolver: &R) -> Vec<(K, Result<Vec<Instruction>>)>
where
    K: Copy + Debug + Send + Sync,
    R: MetadataResolver + Sync + ?Sized,
{
    bodies
        .par_iter()
        .map(|(key, code)| {
            let result = decode(code, resolver);
            if let Err(error) = &result {
                warn!("skipping {key:?}: {error}");
            }
            (*key, result)
        })
        .collect()
}
