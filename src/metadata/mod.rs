//! Metadata collaborators of the instruction decoder.
//!
//! The decoder never reads metadata tables itself. It sees tokens, method bodies and,
//! for display purposes, type names:
//!
//! - [`token`] - Metadata tokens as they appear inline in operands
//! - [`resolver`] - The injected capability that turns tokens into strings, methods, fields and types
//! - [`method`] - Tiny/fat method body headers and exception clauses
//! - [`typename`] - C#-style display names for referenced types

/// Tiny and fat method body headers
pub mod method;
/// Token resolution injected into the decoder
pub mod resolver;
/// Commonly used metadata token type
pub mod token;
/// Source-level type display names
pub mod typename;
