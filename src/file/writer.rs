//! Append-only writer for metadata structures.
//!
//! [`ByteWriter`] is the emitting counterpart of [`crate::Parser`]. It grows a `Vec<u8>` and
//! encodes little-endian primitives, ECMA-335 compressed integers, compressed `TypeDefOrRef`
//! tokens and padding. Values that cannot be represented by the format (a compressed integer
//! above `0x1FFF_FFFF`, a signed value outside the 29-bit range) are capacity errors.

use crate::{
    file::io::{write_le_at, CilIO},
    metadata::{tables::TableId, token::Token},
    Result,
};

/// Largest value representable as a compressed unsigned integer
pub const MAX_COMPRESSED_UINT: u32 = 0x1FFF_FFFF;

/// Smallest value representable as a compressed signed integer
pub const MIN_COMPRESSED_INT: i32 = -0x1000_0000;

/// Largest value representable as a compressed signed integer
pub const MAX_COMPRESSED_INT: i32 = 0x0FFF_FFFF;

/// Number of bytes the compressed form of `value` takes.
///
/// # Errors
/// Returns [`crate::Error::LimitExceeded`] for values above [`MAX_COMPRESSED_UINT`].
pub fn compressed_uint_size(value: u32) -> Result<usize> {
    match value {
        0..=0x7F => Ok(1),
        0x80..=0x3FFF => Ok(2),
        0x4000..=MAX_COMPRESSED_UINT => Ok(4),
        _ => Err(limit_error!("compressed integer", value, MAX_COMPRESSED_UINT)),
    }
}

/// A growable little-endian output buffer.
#[derive(Debug, Default, Clone)]
pub struct ByteWriter {
    data: Vec<u8>,
}

impl ByteWriter {
    /// Create an empty writer
    #[must_use]
    pub fn new() -> Self {
        ByteWriter { data: Vec::new() }
    }

    /// Create an empty writer with preallocated room for `capacity` bytes
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        ByteWriter {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Number of bytes written so far
    #[must_use]
    pub fn pos(&self) -> usize {
        self.data.len()
    }

    /// `true` if nothing has been written
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The bytes written so far
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the writer and return the written bytes
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    /// Append a little-endian `T`
    pub fn write_le<T: CilIO>(&mut self, value: T) {
        self.data.extend_from_slice(value.to_le_bytes().as_ref());
    }

    /// Overwrite an already written little-endian `T` at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `offset` does not point at written data.
    pub fn patch_le<T: CilIO>(&mut self, offset: usize, value: T) -> Result<()> {
        let mut offset = offset;
        write_le_at(&mut self.data, &mut offset, value)
    }

    /// Append a 2 or 4 byte index.
    ///
    /// # Errors
    /// Returns [`crate::Error::LimitExceeded`] if `value` does not fit a narrow column.
    pub fn write_dyn(&mut self, value: u32, is_large: bool) -> Result<()> {
        if is_large {
            self.write_le(value);
        } else {
            let Ok(narrow) = u16::try_from(value) else {
                return Err(limit_error!("narrow index column", value, u16::MAX));
            };
            self.write_le(narrow);
        }

        Ok(())
    }

    /// Append raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Append a NUL-terminated UTF-8 string
    pub fn write_string_utf8(&mut self, value: &str) {
        self.data.extend_from_slice(value.as_bytes());
        self.data.push(0);
    }

    /// Append a compressed unsigned integer in its shortest form.
    ///
    /// # Errors
    /// Returns [`crate::Error::LimitExceeded`] for values above [`MAX_COMPRESSED_UINT`].
    pub fn write_compressed_uint(&mut self, value: u32) -> Result<()> {
        let width = compressed_uint_size(value)?;
        self.write_compressed_uint_width(value, width);
        Ok(())
    }

    /// Append a compressed signed integer in its shortest form.
    ///
    /// # Errors
    /// Returns [`crate::Error::LimitExceeded`] outside
    /// [`MIN_COMPRESSED_INT`]..=[`MAX_COMPRESSED_INT`].
    #[allow(clippy::cast_sign_loss)]
    pub fn write_compressed_int(&mut self, value: i32) -> Result<()> {
        let (mask, width) = match value {
            -0x40..=0x3F => (0x3F, 1),
            -0x2000..=0x1FFF => (0x1FFF, 2),
            MIN_COMPRESSED_INT..=MAX_COMPRESSED_INT => (0x0FFF_FFFF, 4),
            _ => {
                return Err(limit_error!(
                    "compressed signed integer",
                    value.unsigned_abs(),
                    MAX_COMPRESSED_INT
                ))
            }
        };

        let rotated = ((value as u32 & mask) << 1) | u32::from(value < 0);
        self.write_compressed_uint_width(rotated, width);
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_compressed_uint_width(&mut self, value: u32, width: usize) {
        match width {
            1 => self.data.push(value as u8),
            2 => {
                self.data.push(((value >> 8) as u8) | 0x80);
                self.data.push(value as u8);
            }
            _ => {
                self.data.push(((value >> 24) as u8) | 0xC0);
                self.data.push((value >> 16) as u8);
                self.data.push((value >> 8) as u8);
                self.data.push(value as u8);
            }
        }
    }

    /// Append a `TypeDefOrRefOrSpecEncoded` token.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidToken`] for tokens outside TypeDef, TypeRef and TypeSpec,
    /// which includes every pseudo-token.
    pub fn write_compressed_token(&mut self, token: Token) -> Result<()> {
        let tag = match TableId::from_token(token) {
            Some(TableId::TypeDef) => 0,
            Some(TableId::TypeRef) => 1,
            Some(TableId::TypeSpec) => 2,
            _ => return Err(crate::Error::InvalidToken(token)),
        };

        if token.row() > (MAX_COMPRESSED_UINT >> 2) {
            return Err(limit_error!("compressed token row", token.row(), MAX_COMPRESSED_UINT >> 2));
        }
        self.write_compressed_uint((token.row() << 2) | tag)
    }

    /// Pad with zero bytes up to the next multiple of `alignment` (a power of two)
    pub fn align(&mut self, alignment: usize) {
        debug_assert!(alignment.is_power_of_two());
        let padding = (alignment - (self.data.len() & (alignment - 1))) & (alignment - 1);
        self.data.resize(self.data.len() + padding, 0);
    }

    /// Pad with zero bytes until `len` bytes have been written
    pub fn pad_to(&mut self, len: usize) {
        if self.data.len() < len {
            self.data.resize(len, 0);
        }
    }
}

/// Round `value` up to the next multiple of `alignment` (a power of two)
#[must_use]
pub fn align_to(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Parser;

    #[test]
    fn compressed_uint_minimal_forms() {
        let cases: [(u32, &[u8]); 7] = [
            (0x03, &[0x03]),
            (0x7F, &[0x7F]),
            (0x80, &[0x80, 0x80]),
            (0x2E57, &[0xAE, 0x57]),
            (0x3FFF, &[0xBF, 0xFF]),
            (0x4000, &[0xC0, 0x00, 0x40, 0x00]),
            (0x1FFF_FFFF, &[0xDF, 0xFF, 0xFF, 0xFF]),
        ];

        for (value, expected) in cases {
            let mut writer = ByteWriter::new();
            writer.write_compressed_uint(value).unwrap();
            assert_eq!(writer.data(), expected, "0x{:X}", value);
            assert_eq!(compressed_uint_size(value).unwrap(), expected.len());
        }

        let mut writer = ByteWriter::new();
        assert!(writer
            .write_compressed_uint(0x2000_0000)
            .unwrap_err()
            .is_limit_exceeded());
    }

    #[test]
    fn compressed_int_minimal_forms() {
        let cases: [(i32, &[u8]); 8] = [
            (3, &[0x06]),
            (-3, &[0x7B]),
            (64, &[0x80, 0x80]),
            (-64, &[0x01]),
            (8192, &[0xC0, 0x00, 0x40, 0x00]),
            (-8192, &[0x80, 0x01]),
            (268_435_455, &[0xDF, 0xFF, 0xFF, 0xFE]),
            (-268_435_456, &[0xC0, 0x00, 0x00, 0x01]),
        ];

        for (value, expected) in cases {
            let mut writer = ByteWriter::new();
            writer.write_compressed_int(value).unwrap();
            assert_eq!(writer.data(), expected, "{}", value);
        }

        let mut writer = ByteWriter::new();
        assert!(writer.write_compressed_int(0x1000_0000).is_err());
        assert!(writer.write_compressed_int(-0x1000_0001).is_err());
    }

    #[test]
    fn compressed_boundaries_decode() {
        let unsigned = [0u32, 1, 0x7F, 0x80, 0x3FFF, 0x4000, 0x0012_3456, 0x1FFF_FFFF];
        let signed = [
            0i32, 1, -1, 63, -64, 64, -65, 8191, -8192, 8192, -8193, 0x0FFF_FFFF, -0x1000_0000,
        ];

        let mut writer = ByteWriter::new();
        for value in unsigned {
            writer.write_compressed_uint(value).unwrap();
        }
        for value in signed {
            writer.write_compressed_int(value).unwrap();
        }

        let data = writer.into_inner();
        let mut parser = Parser::new(&data);
        for value in unsigned {
            assert_eq!(parser.read_compressed_uint().unwrap(), value);
        }
        for value in signed {
            assert_eq!(parser.read_compressed_int().unwrap(), value);
        }
        assert!(!parser.has_more_data());
    }

    #[test]
    fn compressed_token() {
        let mut writer = ByteWriter::new();
        writer.write_compressed_token(Token::new(0x1B00_0012)).unwrap();
        writer.write_compressed_token(Token::new(0x0100_0012)).unwrap();
        writer.write_compressed_token(Token::new(0x0200_0001)).unwrap();
        assert_eq!(writer.data(), &[0x4A, 0x49, 0x04]);

        assert!(writer
            .write_compressed_token(Token::new(0x0600_0001))
            .unwrap_err()
            .is_contract_violation());
    }

    #[test]
    fn alignment_and_patch() {
        let mut writer = ByteWriter::new();
        writer.write_le(0xAAu8);
        writer.align(4);
        assert_eq!(writer.pos(), 4);
        writer.write_le(0u32);
        writer.patch_le(4, 0x0102_0304u32).unwrap();
        assert_eq!(&writer.data()[4..], &[0x04, 0x03, 0x02, 0x01]);
        assert!(writer.patch_le(6, 0u32).is_err());

        writer.write_dyn(0x1234, false).unwrap();
        assert!(writer.write_dyn(0x1_0000, false).is_err());
        writer.pad_to(16);
        assert_eq!(writer.pos(), 16);
        assert_eq!(align_to(13, 4), 16);
        assert_eq!(align_to(16, 4), 16);
    }
}
