//! Absolute branch and switch targets.
//!
//! CIL stores branch destinations as signed deltas relative to the address *after* the whole
//! instruction, i.e. `offset + opcode size + operand size`. For `switch` the operand size
//! includes the full jump table, so every case shares the same base address.
//!
//! All arithmetic wraps at 32 bits. A delta that points before the method start therefore
//! produces a large target rather than an error; [`relative_offset`] inverts it exactly.

use crate::{Error, Parser, Result};

/// Address of the first byte after an instruction.
#[must_use]
pub fn instruction_end(instruction_offset: u32, opcode_size: u8, operand_size: u32) -> u32 {
    instruction_offset
        .wrapping_add(u32::from(opcode_size))
        .wrapping_add(operand_size)
}

/// Applies a signed delta to a base address.
#[must_use]
pub fn apply_delta(base: u32, delta: i32) -> u32 {
    base.wrapping_add_signed(delta)
}

/// The signed delta that reaches `target` from `base`.
#[must_use]
pub fn relative_offset(base: u32, target: u32) -> i32 {
    target.wrapping_sub(base) as i32
}

/// Reads a 1-byte delta and returns the absolute target.
///
/// # Errors
/// Returns [`crate::Error::BufferTruncated`] if the delta byte is missing.
pub fn resolve_short_branch(
    parser: &mut Parser,
    instruction_offset: u32,
    opcode_size: u8,
) -> Result<u32> {
    let delta = parser.read_le::<i8>()?;
    let base = instruction_end(instruction_offset, opcode_size, 1);
    Ok(apply_delta(base, i32::from(delta)))
}

/// Reads a 4-byte delta and returns the absolute target.
///
/// # Errors
/// Returns [`crate::Error::BufferTruncated`] if fewer than four bytes remain.
pub fn resolve_long_branch(
    parser: &mut Parser,
    instruction_offset: u32,
    opcode_size: u8,
) -> Result<u32> {
    let delta = parser.read_le::<i32>()?;
    let base = instruction_end(instruction_offset, opcode_size, 4);
    Ok(apply_delta(base, delta))
}

/// Reads a switch jump table and returns the absolute target of every case, in table order.
///
/// The table length is validated against the remaining input before anything is allocated,
/// so a corrupted count cannot trigger a huge allocation.
///
/// # Errors
/// Returns [`crate::Error::BufferTruncated`] if the count is missing or the table it announces
/// does not fit in the remaining input.
pub fn resolve_switch_targets(
    parser: &mut Parser,
    instruction_offset: u32,
    opcode_size: u8,
) -> Result<Vec<u32>> {
    let count = parser.read_le::<u32>()?;
    let table_len = (count as usize)
        .checked_mul(4)
        .ok_or(Error::BufferTruncated {
            offset: parser.pos(),
            needed: usize::MAX,
            remaining: parser.remaining(),
        })?;
    parser.ensure_remaining(table_len)?;

    let operand_size = 4_u32.wrapping_add(count.wrapping_mul(4));
    let base = instruction_end(instruction_offset, opcode_size, operand_size);

    let mut targets = Vec::with_capacity(count as usize);
    for _ in 0..count {
        targets.push(apply_delta(base, parser.read_le::<i32>()?));
    }
    Ok(targets)
}
