//! Header and section flags of CIL method bodies (ECMA-335 II.25.4).

use bitflags::bitflags;

/// Mask selecting the header format bits of the first header byte
pub const METHOD_BODY_FORMAT_MASK: u8 = 0b0000_0011;
/// Mask selecting the flag bits of a fat header's first 16-bit word
pub const METHOD_BODY_FLAGS_MASK: u16 = 0x0FFF;
/// Largest code size a tiny header can describe
pub const TINY_MAX_CODE_SIZE: usize = 63;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Flags that a method body header can have
    pub struct MethodBodyFlags: u16 {
        /// Tiny method header format
        const TINY_FORMAT = 0x2;
        /// Fat method header format
        const FAT_FORMAT = 0x3;
        /// More data sections follow the code
        const MORE_SECTS = 0x8;
        /// Call the default constructor on all local variables
        const INIT_LOCALS = 0x10;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Flags of an extra data section following the method code
    pub struct SectionFlags: u8 {
        /// Section holds exception handling clauses
        const EHTABLE = 0x1;
        /// Reserved, shall be 0
        const OPT_ILTABLE = 0x2;
        /// Section uses the fat layout (24-bit size, 24-byte clauses)
        const FAT_FORMAT = 0x40;
        /// Another section follows this one
        const MORE_SECTS = 0x80;
    }
}
