//! Little-endian primitive access for metadata structures.
//!
//! Every multi-byte value in CLI metadata is stored little-endian. The helpers in this module
//! read and write those primitives at explicit offsets, advancing the offset on success and
//! turning any access past the end of the buffer into [`crate::Error::OutOfBounds`].
//!
//! [`read_le_at_dyn`] handles the columns whose width depends on heap or table sizes: it reads
//! either a `u16` or a `u32` and always hands back a `u32`.
//!
//! # Examples
//!
//! ```rust,ignore
//! use cilmeta::file::io::{read_le_at, read_le_at_dyn, write_le_at};
//!
//! let mut buffer = [0u8; 6];
//! let mut offset = 0;
//! write_le_at(&mut buffer, &mut offset, 0x1234_5678u32)?;
//! write_le_at(&mut buffer, &mut offset, 0xABCDu16)?;
//!
//! let mut offset = 0;
//! assert_eq!(read_le_at::<u32>(&buffer, &mut offset)?, 0x1234_5678);
//! assert_eq!(read_le_at_dyn(&buffer, &mut offset, false)?, 0xABCD);
//! # Ok::<(), cilmeta::Error>(())
//! ```

use crate::Result;

/// Trait for the primitive types that can be read from and written to metadata buffers.
pub trait CilIO: Sized + Copy {
    /// Fixed-size byte representation of the type
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Decode a value from its little-endian byte representation
    fn from_le_bytes(bytes: Self::Bytes) -> Self;

    /// Encode a value into its little-endian byte representation
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

/// Read a `T` at `offset`, advancing `offset` by the size of `T`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the read would pass the end of `data`.
pub fn read_le_at<T: CilIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(out_of_bounds_error!());
    };
    if end > data.len() {
        return Err(out_of_bounds_error!());
    }

    let Ok(bytes) = T::Bytes::try_from(&data[*offset..end]) else {
        return Err(out_of_bounds_error!());
    };

    *offset = end;
    Ok(T::from_le_bytes(bytes))
}

/// Read a 2 or 4 byte index at `offset`, depending on `is_large`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the read would pass the end of `data`.
pub fn read_le_at_dyn(data: &[u8], offset: &mut usize, is_large: bool) -> Result<u32> {
    if is_large {
        read_le_at::<u32>(data, offset)
    } else {
        Ok(u32::from(read_le_at::<u16>(data, offset)?))
    }
}

/// Write `value` at `offset`, advancing `offset` by the size of `T`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the write would pass the end of `data`.
pub fn write_le_at<T: CilIO>(data: &mut [u8], offset: &mut usize, value: T) -> Result<()> {
    let bytes = value.to_le_bytes();
    let bytes = bytes.as_ref();
    let Some(end) = offset.checked_add(bytes.len()) else {
        return Err(out_of_bounds_error!());
    };
    if end > data.len() {
        return Err(out_of_bounds_error!());
    }

    data[*offset..end].copy_from_slice(bytes);
    *offset = end;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    const TEST_BUFFER: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

    #[test]
    fn read_primitives() {
        assert_eq!(read_le_at::<u8>(&TEST_BUFFER, &mut 0).unwrap(), 0x01);
        assert_eq!(read_le_at::<u16>(&TEST_BUFFER, &mut 0).unwrap(), 0x0201);
        assert_eq!(read_le_at::<u32>(&TEST_BUFFER, &mut 0).unwrap(), 0x0403_0201);
        assert_eq!(read_le_at::<u64>(&TEST_BUFFER, &mut 0).unwrap(), 0x0807_0605_0403_0201);
        assert_eq!(read_le_at::<i16>(&[0xFE, 0xFF], &mut 0).unwrap(), -2);
    }

    #[test]
    fn read_advances_offset() {
        let mut offset = 2;
        assert_eq!(read_le_at::<u16>(&TEST_BUFFER, &mut offset).unwrap(), 0x0403);
        assert_eq!(offset, 4);
        assert_eq!(read_le_at_dyn(&TEST_BUFFER, &mut offset, true).unwrap(), 0x0807_0605);
        assert_eq!(offset, 8);
    }

    #[test]
    fn read_past_end() {
        let mut offset = 6;
        assert!(matches!(
            read_le_at::<u32>(&TEST_BUFFER, &mut offset),
            Err(Error::OutOfBounds { .. })
        ));
        assert_eq!(offset, 6);

        let mut offset = usize::MAX;
        assert!(read_le_at::<u8>(&TEST_BUFFER, &mut offset).is_err());
    }

    #[test]
    fn float_bits() {
        let mut buffer = [0u8; 12];
        let mut offset = 0;
        write_le_at(&mut buffer, &mut offset, 1.5f32).unwrap();
        write_le_at(&mut buffer, &mut offset, -2.25f64).unwrap();

        let mut offset = 0;
        assert_eq!(read_le_at::<f32>(&buffer, &mut offset).unwrap(), 1.5);
        assert_eq!(read_le_at::<f64>(&buffer, &mut offset).unwrap(), -2.25);
    }
}
