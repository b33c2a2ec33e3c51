pub mod batch;
pub mod common;
pub mod disasm;
pub mod opcodes;
