//! Metadata tokens as they appear inline in CIL operands.
//!
//! A token is a 32-bit value: the high byte selects a metadata table (or the user-string heap)
//! and the low 24 bits are a row index or heap offset. The decoder never interprets tokens
//! itself; it hands them to a [`crate::metadata::resolver::MetadataResolver`].

use std::fmt;

/// `TypeRef` table
pub const TABLE_TYPE_REF: u8 = 0x01;
/// `TypeDef` table
pub const TABLE_TYPE_DEF: u8 = 0x02;
/// `Field` table
pub const TABLE_FIELD: u8 = 0x04;
/// `MethodDef` table
pub const TABLE_METHOD_DEF: u8 = 0x06;
/// `MemberRef` table (field or method references into other modules)
pub const TABLE_MEMBER_REF: u8 = 0x0A;
/// `StandAloneSig` table
pub const TABLE_STANDALONE_SIG: u8 = 0x11;
/// `TypeSpec` table
pub const TABLE_TYPE_SPEC: u8 = 0x1B;
/// `MethodSpec` table
pub const TABLE_METHOD_SPEC: u8 = 0x2B;
/// `#US` heap, used by `ldstr`
pub const TABLE_USER_STRING: u8 = 0x70;

/// A metadata token representing a reference to a metadata table entry.
///
/// - The high byte (bits 24-31) indicates the table type
/// - The low 24 bits (bits 0-23) indicate the row index within that table
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(pub u32);

impl Token {
    /// Creates a new token from a raw 32-bit value
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Returns the raw token value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Extracts the table type from the token (high byte)
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Extracts the row index from the token (low 24 bits)
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Returns true if this is a null token (row 0)
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.row() == 0
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_and_row() {
        let token = Token::new(0x0600_0001);
        assert_eq!(token.table(), TABLE_METHOD_DEF);
        assert_eq!(token.row(), 1);

        let token = Token(0x70FF_FFFF);
        assert_eq!(token.table(), TABLE_USER_STRING);
        assert_eq!(token.row(), 0x00FF_FFFF);
    }

    #[test]
    fn null_tokens() {
        assert!(Token(0).is_null());
        assert!(Token(0x0200_0000).is_null());
        assert!(!Token(0x0200_0001).is_null());
    }

    #[test]
    fn conversions() {
        let token: Token = 0x0400_0002_u32.into();
        let raw: u32 = token.into();
        assert_eq!(raw, 0x0400_0002);
    }

    #[test]
    fn formatting() {
        let token = Token(0x0600_0001);
        assert_eq!(token.to_string(), "0x06000001");

        let debug = format!("{token:?}");
        assert!(debug.contains("table: 0x06"));
        assert!(debug.contains("row: 1"));
    }
}
