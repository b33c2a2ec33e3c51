//! Cursor-based byte stream parser for CIL bytecode.
//!
//! This module provides the [`crate::file::parser::Parser`] type, a bounds-checked cursor over
//! a borrowed byte slice. It is the single place where the decoder advances through a method
//! body, so the consumed-byte accounting of every instruction reduces to the difference between
//! two [`crate::file::parser::Parser::pos`] values.
//!
//! # Key Methods
//!
//! - [`crate::file::parser::Parser::read_le`] - Read a primitive (little-endian) and advance
//! - [`crate::file::parser::Parser::ensure_remaining`] - Verify availability before reading
//! - [`crate::file::parser::Parser::read_bytes`] - Borrow a raw slice and advance
//! - [`crate::file::parser::Parser::seek`] / [`crate::file::parser::Parser::pos`] - Navigation
//!
//! # Usage Examples
//!
//! ```rust
//! use cildecode::Parser;
//!
//! let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06];
//! let mut parser = Parser::new(&data);
//!
//! let value = parser.read_le::<u32>()?;
//! assert_eq!(value, 0x04030201);
//! assert_eq!(parser.remaining(), 2);
//! assert!(parser.read_le::<u32>().is_err());
//! assert_eq!(parser.pos(), 4); // a failed read does not move the cursor
//! # Ok::<(), cildecode::Error>(())
//! ```

use crate::{
    file::io::{read_le_at, CilIO},
    Error, Result,
};

/// A bounds-checked cursor over a byte slice.
///
/// The parser maintains an internal position and guarantees that no read ever indexes past
/// the end of the data: every operation validates availability first and reports
/// [`crate::Error::BufferTruncated`] otherwise.
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`crate::file::parser::Parser`] from a byte slice.
    ///
    /// # Arguments
    /// * `data` - The byte slice to read from
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if there is more data available to parse.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cildecode::Parser;
    /// let data = [0x01];
    /// let mut parser = Parser::new(&data);
    /// assert!(parser.has_more_data());
    ///
    /// let _byte = parser.read_le::<u8>()?;
    /// assert!(!parser.has_more_data());
    /// # Ok::<(), cildecode::Error>(())
    /// ```
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Move the current position to the specified index.
    ///
    /// Seeking to `len()` is allowed and leaves the parser exhausted.
    ///
    /// # Errors
    /// Returns [`crate::Error::BufferTruncated`] if position is beyond the data length.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(Error::BufferTruncated {
                offset: pos,
                needed: 0,
                remaining: 0,
            });
        }

        self.position = pos;
        Ok(())
    }

    /// Get the current position of the parser within the data buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Get access to the underlying data buffer.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Returns the number of bytes remaining from the current position.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Ensures that at least `needed` bytes are available from the current position.
    ///
    /// # Errors
    /// Returns [`crate::Error::BufferTruncated`] if fewer than `needed` bytes remain.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cildecode::Parser;
    /// let data = [0x01, 0x02, 0x03];
    /// let parser = Parser::new(&data);
    ///
    /// assert!(parser.ensure_remaining(3).is_ok());
    /// assert!(parser.ensure_remaining(4).is_err());
    /// ```
    pub fn ensure_remaining(&self, needed: usize) -> Result<()> {
        let remaining = self.remaining();
        if remaining < needed {
            return Err(Error::BufferTruncated {
                offset: self.position,
                needed,
                remaining,
            });
        }
        Ok(())
    }

    /// Peek at the next byte without advancing the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::BufferTruncated`] if the parser is exhausted.
    pub fn peek_byte(&self) -> Result<u8> {
        self.ensure_remaining(1)?;
        Ok(self.data[self.position])
    }

    /// Read a type `T` from the current position in little-endian format and advance the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::BufferTruncated`] if reading would exceed the data length.
    pub fn read_le<T: CilIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Reads a slice of bytes of the specified length from the current position.
    ///
    /// # Errors
    /// Returns [`crate::Error::BufferTruncated`] if reading `length` bytes would exceed the data.
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        self.ensure_remaining(length)?;
        let bytes = &self.data[self.position..self.position + length];
        self.position += length;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_reads() {
        let data = [0x2A, 0x01, 0x00, 0xFF, 0xFF, 0xFF, 0xFF];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_le::<u8>().unwrap(), 0x2A);
        assert_eq!(parser.read_le::<i16>().unwrap(), 1);
        assert_eq!(parser.read_le::<i32>().unwrap(), -1);
        assert!(!parser.has_more_data());
        assert_eq!(parser.remaining(), 0);
    }

    #[test]
    fn truncated_read_reports_position() {
        let data = [0x20, 0x01, 0x00];
        let mut parser = Parser::new(&data);
        parser.read_le::<u8>().unwrap();

        match parser.read_le::<u32>() {
            Err(Error::BufferTruncated {
                offset,
                needed,
                remaining,
            }) => {
                assert_eq!(offset, 1);
                assert_eq!(needed, 4);
                assert_eq!(remaining, 2);
            }
            other => panic!("Expected BufferTruncated, got {other:?}"),
        }
        assert_eq!(parser.pos(), 1);
    }

    #[test]
    fn seek_bounds() {
        let data = [0x00, 0x00];
        let mut parser = Parser::new(&data);

        parser.seek(2).unwrap();
        assert!(!parser.has_more_data());
        assert!(parser.seek(3).is_err());
    }

    #[test]
    fn read_bytes_and_peek() {
        let data = [0x01, 0x02, 0x03];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.peek_byte().unwrap(), 0x01);
        assert_eq!(parser.read_bytes(2).unwrap(), &[0x01, 0x02]);
        assert!(parser.read_bytes(2).is_err());
        assert_eq!(parser.pos(), 2);
    }

    #[test]
    fn empty_parser() {
        let parser = Parser::new(&[]);
        assert!(parser.is_empty());
        assert!(!parser.has_more_data());
        assert!(parser.peek_byte().is_err());
    }
}
