//! Parsing of CIL method body headers and exception handling sections.
//!
//! A method body stored in a PE image starts with either a one-byte *tiny* header (code up to
//! 63 bytes, no locals, no exception handlers) or a twelve-byte *fat* header. Fat bodies may be
//! followed by 4-byte aligned data sections holding exception handling clauses in a small or a
//! fat layout.
//!
//! # Examples
//!
//! ```rust
//! use cildecode::metadata::method::MethodBody;
//!
//! // Tiny header for 2 bytes of code: nop; ret
//! let data = [0x0A, 0x00, 0x2A];
//! let body = MethodBody::from(&data)?;
//!
//! assert!(!body.is_fat);
//! assert_eq!(body.size_code, 2);
//! assert_eq!(body.code(&data)?, &[0x00, 0x2A]);
//! # Ok::<(), cildecode::Error>(())
//! ```
//!
//! # References
//! - ECMA-335 6th Edition, Partition II, Section 25.4 - Common Intermediate Language physical layout

use crate::{
    metadata::{
        method::{
            ExceptionHandler, ExceptionHandlerFlags, MethodBodyFlags, SectionFlags,
            METHOD_BODY_FLAGS_MASK, METHOD_BODY_FORMAT_MASK,
        },
        token::Token,
    },
    Error, Parser, Result,
};

/// Size in bytes of a fat method header
const FAT_HEADER_SIZE: usize = 12;
/// Size in bytes of a data section header
const SECTION_HEADER_SIZE: usize = 4;
/// Size in bytes of a small exception clause
const SMALL_CLAUSE_SIZE: usize = 12;
/// Size in bytes of a fat exception clause
const FAT_CLAUSE_SIZE: usize = 24;

/// Header information and exception clauses of one method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodBody {
    /// Size of the CIL code in bytes, not counting the header
    pub size_code: usize,
    /// Size of the method header in bytes
    pub size_header: usize,
    /// `StandAloneSig` token describing the locals; a null token means no locals
    pub local_var_sig_token: Token,
    /// Maximum number of items on the operand stack
    pub max_stack: usize,
    /// The header uses the fat format
    pub is_fat: bool,
    /// Locals are zero-initialized on entry
    pub is_init_local: bool,
    /// At least one exception clause was found
    pub is_exception_data: bool,
    /// Exception clauses in declaration order
    pub exception_handlers: Vec<ExceptionHandler>,
}

impl MethodBody {
    /// Parses a method header, plus its exception sections, from the start of `data`.
    ///
    /// `data` must contain at least the header and the whole code range; trailing bytes are
    /// ignored unless the header announces extra sections.
    ///
    /// # Errors
    /// Returns [`crate::Error::BufferTruncated`] if the header or code range does not fit in
    /// `data`, or [`crate::Error::Malformed`] for an empty buffer, an unknown header format or a
    /// fat header that is smaller than twelve bytes.
    pub fn from(data: &[u8]) -> Result<MethodBody> {
        if data.is_empty() {
            return Err(malformed_error!("Provided data for body parsing is empty"));
        }

        let mut parser = Parser::new(data);
        let first_byte = parser.peek_byte()?;
        match MethodBodyFlags::from_bits_truncate(u16::from(first_byte & METHOD_BODY_FORMAT_MASK))
        {
            MethodBodyFlags::TINY_FORMAT => {
                let size_code = usize::from(first_byte >> 2);
                parser.ensure_remaining(size_code + 1)?;

                Ok(MethodBody {
                    size_code,
                    size_header: 1,
                    local_var_sig_token: Token(0),
                    max_stack: 8,
                    is_fat: false,
                    is_init_local: false,
                    is_exception_data: false,
                    exception_handlers: Vec::new(),
                })
            }
            MethodBodyFlags::FAT_FORMAT => {
                parser.ensure_remaining(FAT_HEADER_SIZE)?;

                let first_duo = parser.read_le::<u16>()?;
                let max_stack = usize::from(parser.read_le::<u16>()?);
                let size_code = parser.read_le::<u32>()? as usize;
                let local_var_sig_token = Token(parser.read_le::<u32>()?);

                let size_header = usize::from(first_duo >> 12) * 4;
                if size_header < FAT_HEADER_SIZE {
                    return Err(malformed_error!(
                        "Fat method header declares {} bytes, expected at least {}",
                        size_header,
                        FAT_HEADER_SIZE
                    ));
                }

                parser.seek(0)?;
                parser.ensure_remaining(size_header.saturating_add(size_code))?;

                let flags_header =
                    MethodBodyFlags::from_bits_truncate(first_duo & METHOD_BODY_FLAGS_MASK);
                let exception_handlers = if flags_header.contains(MethodBodyFlags::MORE_SECTS) {
                    parse_sections(&mut parser, size_header + size_code)?
                } else {
                    Vec::new()
                };

                Ok(MethodBody {
                    size_code,
                    size_header,
                    local_var_sig_token,
                    max_stack,
                    is_fat: true,
                    is_init_local: flags_header.contains(MethodBodyFlags::INIT_LOCALS),
                    is_exception_data: !exception_handlers.is_empty(),
                    exception_handlers,
                })
            }
            _ => Err(malformed_error!(
                "MethodHeader is neither FAT nor TINY - {}",
                first_byte
            )),
        }
    }

    /// Full size of the header plus code
    #[must_use]
    pub fn size(&self) -> usize {
        self.size_code + self.size_header
    }

    /// The code range of `data`, which must be the buffer this body was parsed from.
    ///
    /// # Errors
    /// Returns [`crate::Error::BufferTruncated`] if `data` is shorter than [`MethodBody::size`].
    pub fn code<'a>(&self, data: &'a [u8]) -> Result<&'a [u8]> {
        data.get(self.size_header..self.size()).ok_or(Error::BufferTruncated {
            offset: self.size_header,
            needed: self.size_code,
            remaining: data.len().saturating_sub(self.size_header),
        })
    }
}

fn align4(value: usize) -> usize {
    (value + 3) & !3
}

/// Reads the exception sections that follow the code, starting at the first aligned offset
/// after `code_end`. Sections that are not exception tables end the scan.
fn parse_sections(parser: &mut Parser, code_end: usize) -> Result<Vec<ExceptionHandler>> {
    let mut exception_handlers = Vec::new();
    let mut cursor = align4(code_end);

    while cursor + SECTION_HEADER_SIZE <= parser.len() {
        parser.seek(cursor)?;
        let section_flags = SectionFlags::from_bits_truncate(parser.read_le::<u8>()?);
        if !section_flags.contains(SectionFlags::EHTABLE) {
            break;
        }

        let is_fat = section_flags.contains(SectionFlags::FAT_FORMAT);
        let section_size = if is_fat {
            let low = u32::from(parser.read_le::<u16>()?);
            let high = u32::from(parser.read_le::<u8>()?);
            (low | (high << 16)) as usize
        } else {
            let size = usize::from(parser.read_le::<u8>()?);
            parser.read_le::<u16>()?;
            size
        };

        if section_size < SECTION_HEADER_SIZE {
            return Err(malformed_error!(
                "Exception section at {} declares {} bytes",
                cursor,
                section_size
            ));
        }
        parser.ensure_remaining(section_size - SECTION_HEADER_SIZE)?;

        let clause_size = if is_fat {
            FAT_CLAUSE_SIZE
        } else {
            SMALL_CLAUSE_SIZE
        };
        for _ in 0..(section_size - SECTION_HEADER_SIZE) / clause_size {
            exception_handlers.push(if is_fat {
                read_fat_clause(parser)?
            } else {
                read_small_clause(parser)?
            });
        }

        if !section_flags.contains(SectionFlags::MORE_SECTS) {
            break;
        }
        cursor = align4(cursor + section_size);
    }

    Ok(exception_handlers)
}

fn read_fat_clause(parser: &mut Parser) -> Result<ExceptionHandler> {
    // Only the low bits carry the clause kind
    #[allow(clippy::cast_possible_truncation)]
    let flags = ExceptionHandlerFlags::from_bits_truncate(parser.read_le::<u32>()? as u16);

    Ok(ExceptionHandler {
        flags,
        try_offset: parser.read_le::<u32>()?,
        try_length: parser.read_le::<u32>()?,
        handler_offset: parser.read_le::<u32>()?,
        handler_length: parser.read_le::<u32>()?,
        class_token_or_filter: parser.read_le::<u32>()?,
    })
}

fn read_small_clause(parser: &mut Parser) -> Result<ExceptionHandler> {
    Ok(ExceptionHandler {
        flags: ExceptionHandlerFlags::from_bits_truncate(parser.read_le::<u16>()?),
        try_offset: u32::from(parser.read_le::<u16>()?),
        try_length: u32::from(parser.read_le::<u8>()?),
        handler_offset: u32::from(parser.read_le::<u16>()?),
        handler_length: u32::from(parser.read_le::<u8>()?),
        class_token_or_filter: parser.read_le::<u32>()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a fat body with `code`, padded to 4 bytes, followed by `sections` verbatim.
    fn fat_body(flags: u16, max_stack: u16, code: &[u8], local_sig: u32, sections: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&(0x3000 | flags | 0x3).to_le_bytes());
        data.extend_from_slice(&max_stack.to_le_bytes());
        data.extend_from_slice(&(code.len() as u32).to_le_bytes());
        data.extend_from_slice(&local_sig.to_le_bytes());
        data.extend_from_slice(code);
        while data.len() % 4 != 0 {
            data.push(0);
        }
        data.extend_from_slice(sections);
        data
    }

    #[test]
    fn tiny() {
        let data = [0x16, 0x00, 0x17, 0x58, 0x2A, 0xFF];
        let body = MethodBody::from(&data).unwrap();

        assert!(!body.is_fat);
        assert!(!body.is_exception_data);
        assert!(!body.is_init_local);
        assert_eq!(body.max_stack, 8);
        assert_eq!(body.size_code, 5);
        assert_eq!(body.size_header, 1);
        assert_eq!(body.size(), 6);
        assert!(body.local_var_sig_token.is_null());
        assert_eq!(body.code(&data).unwrap(), &[0x00, 0x17, 0x58, 0x2A, 0xFF]);
    }

    #[test]
    fn tiny_truncated() {
        let data = [0x16, 0x00, 0x2A];
        assert!(matches!(
            MethodBody::from(&data),
            Err(Error::BufferTruncated { needed: 6, remaining: 3, .. })
        ));
    }

    #[test]
    fn fat() {
        let data = fat_body(0x10, 5, &[0x00, 0x00, 0x00, 0x2A], 0x1100_0059, &[]);
        let body = MethodBody::from(&data).unwrap();

        assert!(body.is_fat);
        assert!(!body.is_exception_data);
        assert!(body.is_init_local);
        assert_eq!(body.max_stack, 5);
        assert_eq!(body.size_code, 4);
        assert_eq!(body.size_header, 12);
        assert_eq!(body.size(), 16);
        assert_eq!(body.local_var_sig_token, Token(0x1100_0059));
        assert_eq!(body.code(&data).unwrap(), &[0x00, 0x00, 0x00, 0x2A]);
    }

    #[test]
    fn fat_truncated_code() {
        let mut data = fat_body(0, 1, &[0x00; 8], 0, &[]);
        data.truncate(16);
        assert!(matches!(
            MethodBody::from(&data),
            Err(Error::BufferTruncated { needed: 20, .. })
        ));
    }

    #[test]
    fn fat_small_header_size() {
        let mut data = fat_body(0, 1, &[0x2A], 0, &[]);
        data[1] = 0x10;
        assert!(matches!(MethodBody::from(&data), Err(Error::Malformed { .. })));
    }

    #[test]
    fn invalid_format() {
        assert!(matches!(MethodBody::from(&[0x00, 0x2A]), Err(Error::Malformed { .. })));
        assert!(matches!(MethodBody::from(&[]), Err(Error::Malformed { .. })));
    }

    #[test]
    fn fat_small_exception_section() {
        #[rustfmt::skip]
        let section = [
            0x01, 0x10, 0x00, 0x00,     // EHTABLE, 16 bytes
            0x02, 0x00,                 // FINALLY
            0x01, 0x00, 0x03,           // try 1..4
            0x04, 0x00, 0x02,           // handler 4..6
            0x00, 0x00, 0x00, 0x00,
        ];
        let data = fat_body(
            0x18,
            2,
            &[0x00, 0x00, 0x00, 0xDC, 0x00, 0xDC, 0x2A],
            0x1100_0003,
            &section,
        );
        let body = MethodBody::from(&data).unwrap();

        assert!(body.is_exception_data);
        assert_eq!(body.exception_handlers.len(), 1);
        let handler = &body.exception_handlers[0];
        assert!(handler.flags.contains(ExceptionHandlerFlags::FINALLY));
        assert_eq!(handler.try_offset, 1);
        assert_eq!(handler.try_length, 3);
        assert_eq!(handler.handler_offset, 4);
        assert_eq!(handler.handler_length, 2);
        assert_eq!(handler.class_token(), None);
    }

    #[test]
    fn fat_chained_exception_sections() {
        #[rustfmt::skip]
        let sections = [
            // fat section, 28 bytes, more sections follow
            0xC1, 0x1C, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,     // EXCEPTION
            0x00, 0x00, 0x00, 0x00,
            0x02, 0x00, 0x00, 0x00,
            0x02, 0x00, 0x00, 0x00,
            0x03, 0x00, 0x00, 0x00,
            0x05, 0x00, 0x00, 0x01,     // catch TypeRef row 5
            // small section, 16 bytes
            0x01, 0x10, 0x00, 0x00,
            0x01, 0x00,                 // FILTER
            0x00, 0x00, 0x05,
            0x07, 0x00, 0x01,
            0x05, 0x00, 0x00, 0x00,     // filter at 5
        ];
        let data = fat_body(0x08, 1, &[0x00; 8], 0, &sections);
        let body = MethodBody::from(&data).unwrap();

        assert_eq!(body.exception_handlers.len(), 2);
        assert_eq!(body.exception_handlers[0].class_token(), Some(Token(0x0100_0005)));
        assert_eq!(body.exception_handlers[0].handler_offset, 2);
        assert_eq!(body.exception_handlers[0].handler_length, 3);
        assert_eq!(body.exception_handlers[1].filter_offset(), Some(5));
        assert_eq!(body.exception_handlers[1].try_length, 5);
    }

    #[test]
    fn non_exception_section_is_ignored() {
        let data = fat_body(0x08, 1, &[0x2A], 0, &[0x02, 0x04, 0x00, 0x00]);
        let body = MethodBody::from(&data).unwrap();
        assert!(!body.is_exception_data);
    }
}
