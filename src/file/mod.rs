//! Byte-level access to CIL method bodies.
//!
//! - [`io`] - Endian-aware primitive reads and writes
//! - [`parser`] - The bounds-checked cursor used by the decoder

pub mod io;
pub mod parser;
