use thiserror::Error;

use crate::{disassembler::OperandKind, metadata::token::Token};

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every variant aborts the decode of the method body that produced it. No partially decoded
/// instruction list is ever returned alongside an error; callers that process many bodies
/// decide for themselves whether to skip the failing one or stop altogether.
///
/// # Error Categories
///
/// ## Instruction stream errors
/// - [`Error::UnknownOpcode`] - A byte (or `0xFE`-escaped byte pair) has no opcode table entry
/// - [`Error::UnsupportedOperand`] - The operand kind is known but deliberately not decoded
/// - [`Error::BufferTruncated`] - Fewer bytes remain than the current read requires
///
/// ## Metadata errors
/// - [`Error::UnresolvedToken`] - The injected resolver could not resolve a token
///
/// ## Structural errors
/// - [`Error::Malformed`] - Corrupted method headers, unencodable instructions, oversized input
///
/// # Examples
///
/// ```rust
/// use cildecode::{disassembler::decode, metadata::resolver::OpaqueResolver, Error};
///
/// // ldc.i4 with only two of its four operand bytes present
/// match decode(&[0x20, 0x01, 0x00], &OpaqueResolver) {
///     Err(Error::BufferTruncated { needed, remaining, .. }) => {
///         assert_eq!(needed, 4);
///         assert_eq!(remaining, 2);
///     }
///     other => panic!("unexpected result: {other:?}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// No opcode table entry exists for the byte (or escaped byte pair) at the cursor.
    ///
    /// The associated value is the lookup key: `0x00XX` for single-byte opcodes and
    /// `0xFEXX` for two-byte opcodes.
    #[error("Unknown opcode: 0x{0:04X}")]
    UnknownOpcode(u16),

    /// The operand kind is recognised but cannot be decoded.
    ///
    /// Only inline call-site signatures (`calli`) fall into this category. They are rejected
    /// outright instead of being skipped on a best-effort basis.
    #[error("Operand kind {kind} of '{mnemonic}' is not supported")]
    UnsupportedOperand {
        /// Mnemonic of the offending instruction
        mnemonic: &'static str,
        /// The operand kind that could not be decoded
        kind: OperandKind,
    },

    /// Fewer bytes remain in the buffer than the current read requires.
    ///
    /// This is always detected before any byte is consumed, so the cursor still points to the
    /// start of the incomplete value.
    ///
    /// # Fields
    ///
    /// * `offset` - Position of the cursor when the read was attempted
    /// * `needed` - Number of bytes the read requires
    /// * `remaining` - Number of bytes that were actually left
    #[error("Buffer truncated at offset {offset}: needed {needed} bytes, {remaining} remaining")]
    BufferTruncated {
        /// Cursor position of the failed read
        offset: usize,
        /// Bytes required by the read
        needed: usize,
        /// Bytes left in the buffer
        remaining: usize,
    },

    /// The metadata resolver could not resolve a token.
    #[error("Failed to resolve metadata token - {0}")]
    UnresolvedToken(Token),

    /// The input is damaged and could not be processed.
    ///
    /// The error includes the source location where the malformation was detected for
    /// debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },
}
