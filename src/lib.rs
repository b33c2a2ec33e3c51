// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # cildecode
//!
//! A decoder for CIL (Common Intermediate Language) method bodies, as found in .NET assemblies.
//! Given the raw bytes of one method, `cildecode` produces a structured, randomly inspectable
//! list of instructions with resolved operands and absolute branch targets.
//!
//! ## Features
//!
//! - **Complete opcode table** - Every ECMA-335 opcode, single-byte and `0xFE`-escaped
//! - **Exact byte accounting** - Every instruction records its offset; sizes add up to the input
//! - **Absolute branch targets** - Deltas are resolved against the end of each instruction
//! - **Pluggable metadata** - Tokens are resolved through an injected [`metadata::resolver::MetadataResolver`]
//! - **Method bodies** - Tiny and fat headers plus exception clauses
//! - **Parallel batches** - Independent bodies decode concurrently
//! - **Round trips** - Decoded instructions encode back to the original bytes
//!
//! ## Quick Start
//!
//! ```rust
//! use cildecode::prelude::*;
//!
//! let mut map = TokenMap::new();
//! map.insert_string(Token(0x7000_0001), "Hello, World!")
//!     .insert_method(Token(0x0A00_0001), Some("System.Console"), "WriteLine");
//!
//! #[rustfmt::skip]
//! let code = [
//!     0x72, 0x01, 0x00, 0x00, 0x70,   // ldstr
//!     0x28, 0x01, 0x00, 0x00, 0x0A,   // call
//!     0x2A,                           // ret
//! ];
//!
//! for instruction in decode(&code, &map)? {
//!     println!("{instruction}");
//! }
//! # Ok::<(), cildecode::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`prelude`] - Convenient re-exports of commonly used types and traits
//! - [`disassembler`] - Opcode table, operand reader, branch resolver, decoder and encoder
//! - [`metadata`] - Tokens, the resolver seam, method body headers and type names
//! - [`file`] - The bounds-checked byte cursor everything is built on
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`]. Any error aborts the decode of the current method; the
//! decoder never returns a partial instruction list. See [`Error`] for the categories.

#[macro_use]
pub(crate) mod error;

/// Bounds-checked little-endian reading and writing
pub mod file;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use cildecode::prelude::*;
///
/// let instructions = decode(&[0x14, 0x2A], &OpaqueResolver)?;
/// assert_eq!(instructions[0].mnemonic(), "ldnull");
/// # Ok::<(), cildecode::Error>(())
/// ```
pub mod prelude;

/// Instruction decoding and encoding based on ECMA-335 Partition III
///
/// # Key Types
///
/// - [`disassembler::Instruction`] - A decoded CIL instruction
/// - [`disassembler::OperandValue`] - Decoded operands (immediates, resolved tokens, targets)
/// - [`disassembler::OpcodeDescriptor`] - Static opcode table entries
///
/// # Main Functions
///
/// - [`disassembler::decode`] - Decode a complete code buffer
/// - [`disassembler::decode_method`] - Decode a method body including its header
/// - [`disassembler::decode_methods`] - Decode many code buffers in parallel
/// - [`disassembler::encode`] - Encode instructions back to bytes
pub mod disassembler;

/// Metadata collaborators: tokens, resolvers, method bodies and type names
pub mod metadata;

pub use error::Error;
pub use file::parser::Parser;

/// `cildecode` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always
/// [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
