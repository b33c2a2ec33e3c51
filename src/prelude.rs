//! # cildecode Prelude
//!
//! The types most decoding code needs, for glob import.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all cildecode operations
pub use crate::Error;

/// The result type used throughout cildecode
pub use crate::Result;

/// Bounds-checked byte cursor
pub use crate::Parser;

// ================================================================================================
// Decoding
// ================================================================================================

/// Decoding entry points
pub use crate::disassembler::{decode, decode_instruction, decode_method, decode_methods};

/// Encoding entry points
pub use crate::disassembler::{encode, InstructionEncoder};

/// Instruction model
pub use crate::disassembler::{
    DecodedMethod, FlowType, Instruction, OpcodeDescriptor, OperandKind, OperandValue,
};

// ================================================================================================
// Metadata
// ================================================================================================

/// Metadata token type
pub use crate::metadata::token::Token;

/// Token resolution
pub use crate::metadata::resolver::{
    CachingResolver, FieldRef, MemberRef, MetadataResolver, MethodRef, OpaqueResolver, TokenMap,
    TypeRef, UserString,
};

/// Method body headers
pub use crate::metadata::method::{ExceptionHandler, ExceptionHandlerFlags, MethodBody};

/// Type display names
pub use crate::metadata::typename::{PrimitiveType, TypeDescriptor};
