//! Exception handling clauses attached to fat method bodies.

use bitflags::bitflags;

use crate::metadata::token::Token;

/// Mask selecting the clause kind from [`ExceptionHandlerFlags`]
const CLAUSE_KIND_MASK: u16 = 0x0007;

bitflags! {
    /// Kind of an exception handling clause.
    ///
    /// A typed catch clause has no bits set, so test for it with
    /// [`ExceptionHandler::class_token`] rather than `contains(EXCEPTION)`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ExceptionHandlerFlags: u16 {
        /// A typed exception clause
        const EXCEPTION = 0x0000;
        /// An exception filter and handler clause
        const FILTER = 0x0001;
        /// A finally clause
        const FINALLY = 0x0002;
        /// A fault clause (finally that runs only on exception)
        const FAULT = 0x0004;
    }
}

/// One try region and its handler, with offsets relative to the start of the method code.
///
/// ```text
/// try_offset .. try_offset + try_length              protected region
/// handler_offset .. handler_offset + handler_length  catch / filter / finally / fault body
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// Clause kind
    pub flags: ExceptionHandlerFlags,
    /// Start of the protected region
    pub try_offset: u32,
    /// Length in bytes of the protected region
    pub try_length: u32,
    /// Start of the handler
    pub handler_offset: u32,
    /// Length in bytes of the handler
    pub handler_length: u32,
    /// Catch type token for typed clauses, filter code offset for filter clauses, 0 otherwise
    pub class_token_or_filter: u32,
}

impl ExceptionHandler {
    /// The caught exception type of a typed clause.
    #[must_use]
    pub fn class_token(&self) -> Option<Token> {
        (self.flags.bits() & CLAUSE_KIND_MASK == 0).then_some(Token(self.class_token_or_filter))
    }

    /// Offset of the filter block of a filter clause.
    #[must_use]
    pub fn filter_offset(&self) -> Option<u32> {
        self.flags
            .contains(ExceptionHandlerFlags::FILTER)
            .then_some(self.class_token_or_filter)
    }

    /// Returns `true` if `offset` lies inside the protected region.
    #[must_use]
    pub fn protects(&self, offset: u32) -> bool {
        offset >= self.try_offset && offset - self.try_offset < self.try_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clause(flags: ExceptionHandlerFlags, extra: u32) -> ExceptionHandler {
        ExceptionHandler {
            flags,
            try_offset: 4,
            try_length: 10,
            handler_offset: 14,
            handler_length: 6,
            class_token_or_filter: extra,
        }
    }

    #[test]
    fn typed_clause() {
        let handler = clause(ExceptionHandlerFlags::EXCEPTION, 0x0100_0007);
        assert_eq!(handler.class_token(), Some(Token(0x0100_0007)));
        assert_eq!(handler.filter_offset(), None);
    }

    #[test]
    fn filter_and_finally() {
        let filter = clause(ExceptionHandlerFlags::FILTER, 0x20);
        assert_eq!(filter.filter_offset(), Some(0x20));
        assert_eq!(filter.class_token(), None);

        let finally = clause(ExceptionHandlerFlags::FINALLY, 0);
        assert_eq!(finally.class_token(), None);
        assert_eq!(finally.filter_offset(), None);
    }

    #[test]
    fn protected_range() {
        let handler = clause(ExceptionHandlerFlags::FAULT, 0);
        assert!(!handler.protects(3));
        assert!(handler.protects(4));
        assert!(handler.protects(13));
        assert!(!handler.protects(14));
    }
}
