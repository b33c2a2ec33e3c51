//! Low-level endian-aware reading and writing of primitive values.
//!
//! This module provides the bounds-checked primitives every other part of the crate builds on.
//! CIL operands, method headers and exception clauses are all little-endian, so only the
//! little-endian direction is exposed.
//!
//! # Key Components
//!
//! - [`crate::file::io::CilIO`] - Conversion between primitive types and their byte arrays
//! - [`crate::file::io::read_le`] / [`crate::file::io::read_le_at`] - Bounds-checked reads
//! - [`crate::file::io::write_le`] - Append-style writes used by the encoder
//!
//! # Bounds checking
//!
//! Reads verify that the full width of the requested type is available *before* any byte is
//! touched. A short buffer yields [`crate::Error::BufferTruncated`] carrying the position, the
//! required width and the number of bytes that were actually left; the offset is not advanced.
//!
//! # Thread Safety
//!
//! All functions are pure and operate on caller-owned buffers.

use crate::{Error, Result};

/// Trait for implementing type-specific safe binary data reading and writing operations.
///
/// Each implementation defines a `Bytes` associated type that represents the fixed-size
/// byte array required for that particular type (e.g., `[u8; 4]` for `u32`).
pub trait CilIO: Sized {
    /// Associated type representing the byte array type for this numeric type.
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in little-endian
    fn from_le_bytes(bytes: Self::Bytes) -> Self;

    /// Write T to a byte buffer in little-endian
    fn to_le_bytes(self) -> Self::Bytes;
}

macro_rules! impl_cil_io {
    ($($ty:ty),* $(,)?) => {
        $(
            impl CilIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }
            }
        )*
    };
}

impl_cil_io!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// Safely reads a value of type `T` in little-endian byte order from the start of `data`.
///
/// # Errors
///
/// Returns [`crate::Error::BufferTruncated`] if there are insufficient bytes.
///
/// # Examples
///
/// ```rust
/// use cildecode::file::io::read_le;
///
/// let data = [0x01, 0x00, 0x00, 0x00];
/// let value: u32 = read_le(&data)?;
/// assert_eq!(value, 1);
/// # Ok::<(), cildecode::Error>(())
/// ```
pub fn read_le<T: CilIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Safely reads a value of type `T` in little-endian byte order at `offset`, advancing it.
///
/// The offset is only advanced when the read succeeds.
///
/// # Errors
///
/// Returns [`crate::Error::BufferTruncated`] if fewer than `size_of::<T>()` bytes remain.
///
/// # Examples
///
/// ```rust
/// use cildecode::file::io::read_le_at;
///
/// let data = [0x01, 0x00, 0x02, 0x00];
/// let mut offset = 0;
///
/// let first: u16 = read_le_at(&data, &mut offset)?;
/// let second: u16 = read_le_at(&data, &mut offset)?;
/// assert_eq!((first, second, offset), (1, 2, 4));
/// # Ok::<(), cildecode::Error>(())
/// ```
pub fn read_le_at<T: CilIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let remaining = data.len().saturating_sub(*offset);
    if remaining < type_len {
        return Err(Error::BufferTruncated {
            offset: *offset,
            needed: type_len,
            remaining,
        });
    }

    let Ok(read) = data[*offset..*offset + type_len].try_into() else {
        return Err(Error::BufferTruncated {
            offset: *offset,
            needed: type_len,
            remaining,
        });
    };

    *offset += type_len;

    Ok(T::from_le_bytes(read))
}

/// Appends `value` in little-endian byte order to `out`.
///
/// # Examples
///
/// ```rust
/// use cildecode::file::io::write_le;
///
/// let mut out = Vec::new();
/// write_le(&mut out, 0x0102_u16);
/// write_le(&mut out, -1_i8);
/// assert_eq!(out, [0x02, 0x01, 0xFF]);
/// ```
pub fn write_le<T: CilIO>(out: &mut Vec<u8>, value: T) {
    out.extend_from_slice(value.to_le_bytes().as_ref());
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_BUFFER: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

    #[test]
    fn read_le_u8() {
        let result = read_le::<u8>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x01);
    }

    #[test]
    fn read_le_i16() {
        let result = read_le::<i16>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0201);
    }

    #[test]
    fn read_le_u32() {
        let result = read_le::<u32>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0403_0201);
    }

    #[test]
    fn read_le_i64() {
        let result = read_le::<i64>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0807060504030201);
    }

    #[test]
    fn read_le_f32() {
        let result = read_le::<f32>(&1.5_f32.to_le_bytes()).unwrap();
        assert_eq!(result, 1.5);
    }

    #[test]
    fn read_le_at_sequence() {
        let mut offset = 0;
        assert_eq!(read_le_at::<u16>(&TEST_BUFFER, &mut offset).unwrap(), 0x0201);
        assert_eq!(read_le_at::<u8>(&TEST_BUFFER, &mut offset).unwrap(), 0x03);
        assert_eq!(offset, 3);
    }

    #[test]
    fn read_le_at_truncated_keeps_offset() {
        let mut offset = 6;
        let result = read_le_at::<u32>(&TEST_BUFFER, &mut offset);

        assert!(matches!(
            result,
            Err(Error::BufferTruncated {
                offset: 6,
                needed: 4,
                remaining: 2
            })
        ));
        assert_eq!(offset, 6);
    }

    #[test]
    fn read_le_at_past_end() {
        let mut offset = 12;
        let result = read_le_at::<u8>(&TEST_BUFFER, &mut offset);

        assert!(matches!(
            result,
            Err(Error::BufferTruncated { remaining: 0, .. })
        ));
    }

    #[test]
    fn write_le_values() {
        let mut out = Vec::new();
        write_le(&mut out, 0x0403_0201_u32);
        write_le(&mut out, -2_i16);
        write_le(&mut out, 0.5_f64);

        assert_eq!(&out[..4], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(&out[4..6], &[0xFE, 0xFF]);
        assert_eq!(&out[6..], &0.5_f64.to_le_bytes());
    }
}
