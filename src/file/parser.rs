//! Bounds-checked sequential reader for metadata structures.
//!
//! [`Parser`] walks a byte slice and decodes the primitives used throughout the metadata format:
//! little-endian fixed-width integers, ECMA-335 compressed integers (II.23.2), compressed
//! `TypeDefOrRef` tokens, NUL-terminated UTF-8 strings and raw byte runs. Reading past the end of
//! the slice is the only thing it validates; it yields [`crate::Error::OutOfBounds`] and leaves the
//! position untouched.
//!
//! # Examples
//!
//! ```rust
//! use cilmeta::Parser;
//!
//! let data = [0x03, 0x80, 0x80, 0x7B];
//! let mut parser = Parser::new(&data);
//! assert_eq!(parser.read_compressed_uint()?, 3);
//! assert_eq!(parser.read_compressed_uint()?, 0x80);
//! assert_eq!(parser.read_compressed_int()?, -3);
//! assert!(!parser.has_more_data());
//! # Ok::<(), cilmeta::Error>(())
//! ```

use crate::{
    file::io::{read_le_at, CilIO},
    metadata::token::Token,
    Result,
};

/// A sequential reader over a borrowed byte slice.
pub struct Parser<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new parser positioned at the start of `data`
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Total length of the underlying data
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// `true` if the underlying data is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// `true` while there are unread bytes left
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Number of unread bytes
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Current position
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// The complete underlying data
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Move to an absolute position. Seeking to the end is allowed.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `pos` lies past the end.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        self.position = pos;
        Ok(())
    }

    /// Skip `step` bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if that would pass the end.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        let end = self.end_of(step)?;
        self.position = end;
        Ok(())
    }

    /// Skip to the next multiple of `alignment` (a power of two).
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the padding would pass the end.
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        debug_assert!(alignment.is_power_of_two());
        let padding = (alignment - (self.position & (alignment - 1))) & (alignment - 1);
        self.advance_by(padding)
    }

    /// Look at the next byte without consuming it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] at the end of the data.
    pub fn peek_byte(&self) -> Result<u8> {
        match self.data.get(self.position) {
            Some(byte) => Ok(*byte),
            None => Err(out_of_bounds_error!()),
        }
    }

    /// Read a little-endian `T`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if not enough data is left.
    pub fn read_le<T: CilIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Read a compressed unsigned integer (ECMA-335 II.23.2).
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if truncated, or [`crate::Error::Malformed`] for a
    /// first byte with the reserved `111` prefix.
    pub fn read_compressed_uint(&mut self) -> Result<u32> {
        self.read_compressed_uint_sized().map(|(value, _)| value)
    }

    fn read_compressed_uint_sized(&mut self) -> Result<(u32, usize)> {
        let first = self.peek_byte()?;

        let (value, size) = if first & 0x80 == 0 {
            (u32::from(first), 1)
        } else if first & 0xC0 == 0x80 {
            let bytes = self.slice_at(self.position, 2)?;
            ((u32::from(bytes[0] & 0x3F) << 8) | u32::from(bytes[1]), 2)
        } else if first & 0xE0 == 0xC0 {
            let bytes = self.slice_at(self.position, 4)?;
            (
                (u32::from(bytes[0] & 0x1F) << 24)
                    | (u32::from(bytes[1]) << 16)
                    | (u32::from(bytes[2]) << 8)
                    | u32::from(bytes[3]),
                4,
            )
        } else {
            return Err(malformed_error!("Invalid compressed uint - 0x{:02X}", first));
        };

        self.position += size;
        Ok((value, size))
    }

    /// Read a compressed signed integer (ECMA-335 II.23.2).
    ///
    /// The sign bit is rotated into bit 0; the remaining bits are sign-extended according to the
    /// width of the envelope: 6 bits for one byte, 13 for two, 28 for four.
    ///
    /// # Errors
    /// Same as [`Parser::read_compressed_uint`].
    pub fn read_compressed_int(&mut self) -> Result<i32> {
        let (raw, size) = self.read_compressed_uint_sized()?;

        #[allow(clippy::cast_possible_wrap)]
        let magnitude = (raw >> 1) as i32;
        if raw & 1 == 0 {
            return Ok(magnitude);
        }

        let bias = match size {
            1 => 0x40,
            2 => 0x2000,
            _ => 0x1000_0000,
        };
        Ok(magnitude - bias)
    }

    /// Read a `TypeDefOrRefOrSpecEncoded` token (ECMA-335 II.23.2.8).
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for the unused tag value 3.
    pub fn read_compressed_token(&mut self) -> Result<Token> {
        let encoded = self.read_compressed_uint()?;
        let table: u32 = match encoded & 0x3 {
            0x0 => 0x0200_0000,
            0x1 => 0x0100_0000,
            0x2 => 0x1B00_0000,
            _ => return Err(malformed_error!("Invalid compressed token - {}", encoded)),
        };

        Ok(Token::new(table | (encoded >> 2)))
    }

    /// Read `length` raw bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if not enough data is left.
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        let bytes = self.slice_at(self.position, length)?;
        self.position += length;
        Ok(bytes)
    }

    /// Read a blob-style run: a compressed length followed by that many bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the run is truncated.
    pub fn read_prefixed_bytes(&mut self) -> Result<&'a [u8]> {
        let length = self.read_compressed_uint()? as usize;
        self.read_bytes(length)
    }

    /// Read a NUL-terminated UTF-8 string, consuming the terminator.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if no terminator is found or the bytes are not UTF-8.
    pub fn read_string_utf8(&mut self) -> Result<&'a str> {
        let start = self.position;
        let Some(length) = self.data[start..].iter().position(|byte| *byte == 0) else {
            return Err(malformed_error!("Unterminated string at offset {}", start));
        };

        let bytes = &self.data[start..start + length];
        let string = std::str::from_utf8(bytes).map_err(|error| {
            malformed_error!("Invalid UTF-8 string at offset {} - {}", start, error)
        })?;

        self.position = start + length + 1;
        Ok(string)
    }

    /// Read `count` little-endian UTF-16 code units.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if not enough data is left.
    pub fn read_utf16_units(&mut self, count: usize) -> Result<Vec<u16>> {
        let Some(byte_len) = count.checked_mul(2) else {
            return Err(out_of_bounds_error!());
        };
        let bytes = self.read_bytes(byte_len)?;

        Ok(bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect())
    }

    /// Run `f`, restoring the position if it fails.
    ///
    /// # Errors
    /// Whatever `f` returns.
    pub fn transactional<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let saved_position = self.position;
        let result = f(self);
        if result.is_err() {
            self.position = saved_position;
        }

        result
    }

    fn end_of(&self, length: usize) -> Result<usize> {
        let Some(end) = self.position.checked_add(length) else {
            return Err(out_of_bounds_error!());
        };
        if end > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        Ok(end)
    }

    fn slice_at(&self, start: usize, length: usize) -> Result<&'a [u8]> {
        let data = self.data;
        match start.checked_add(length) {
            Some(end) if end <= data.len() => Ok(&data[start..end]),
            _ => Err(out_of_bounds_error!()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn read_compressed_uint() {
        let test_cases = vec![
            (vec![0x03], 3),                             // 1-byte format
            (vec![0x7F], 0x7F),                          // 1-byte format, max value
            (vec![0x80, 0x80], 0x80),                    // 2-byte format, min value
            (vec![0xAE, 0x57], 0x2E57),                  // 2-byte format
            (vec![0xBF, 0xFF], 0x3FFF),                  // 2-byte format, max value
            (vec![0xC0, 0x00, 0x40, 0x00], 0x4000),      // 4-byte format, min value
            (vec![0xDF, 0xFF, 0xFF, 0xFF], 0x1FFF_FFFF), // 4-byte format, max value
        ];

        for (input, expected) in test_cases {
            let mut parser = Parser::new(&input);
            assert_eq!(parser.read_compressed_uint().unwrap(), expected);
            assert!(!parser.has_more_data());
        }

        let mut parser = Parser::new(&[]);
        assert!(matches!(
            parser.read_compressed_uint(),
            Err(Error::OutOfBounds { .. })
        ));

        let mut parser = Parser::new(&[0xE0, 0, 0, 0]);
        assert!(matches!(
            parser.read_compressed_uint(),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn read_compressed_uint_truncated_keeps_position() {
        let mut parser = Parser::new(&[0xC0, 0x01]);
        assert!(parser.read_compressed_uint().is_err());
        assert_eq!(parser.pos(), 0);
    }

    #[test]
    fn read_compressed_int() {
        // Values from ECMA-335 II.23.2
        let test_cases: Vec<(Vec<u8>, i32)> = vec![
            (vec![0x06], 3),
            (vec![0x7B], -3),
            (vec![0x80, 0x80], 64),
            (vec![0x01], -64),
            (vec![0xC0, 0x00, 0x40, 0x00], 8192),
            (vec![0x80, 0x01], -8192),
            (vec![0xDF, 0xFF, 0xFF, 0xFE], 268_435_455),
            (vec![0xC0, 0x00, 0x00, 0x01], -268_435_456),
            (vec![0x7F], -1),
            (vec![0x00], 0),
        ];

        for (input, expected) in test_cases {
            let mut parser = Parser::new(&input);
            assert_eq!(parser.read_compressed_int().unwrap(), expected, "{:02X?}", input);
        }
    }

    #[test]
    fn read_compressed_token() {
        let mut parser = Parser::new(&[0x4A, 0x49, 0x00, 0x07]);
        assert_eq!(parser.read_compressed_token().unwrap(), Token::new(0x1B00_0012));
        assert_eq!(parser.read_compressed_token().unwrap(), Token::new(0x0100_0012));
        assert_eq!(parser.read_compressed_token().unwrap(), Token::new(0x0200_0000));
        assert!(parser.read_compressed_token().is_err());
    }

    #[test]
    fn read_strings() {
        let data = [0x61, 0x62, 0x63, 0x00, 0x00, 0xE4, 0xB8, 0xAD, 0x00, 0x61];
        let mut parser = Parser::new(&data);
        assert_eq!(parser.read_string_utf8().unwrap(), "abc");
        assert_eq!(parser.read_string_utf8().unwrap(), "");
        assert_eq!(parser.read_string_utf8().unwrap(), "中");
        assert!(parser.read_string_utf8().is_err());
    }

    #[test]
    fn align_and_bytes() {
        let data = [1, 2, 3, 4, 5, 6, 7, 8];
        let mut parser = Parser::new(&data);
        parser.advance_by(1).unwrap();
        parser.align(4).unwrap();
        assert_eq!(parser.pos(), 4);
        parser.align(4).unwrap();
        assert_eq!(parser.pos(), 4);
        assert_eq!(parser.read_bytes(4).unwrap(), &[5, 6, 7, 8]);
        assert!(parser.read_bytes(1).is_err());
        parser.seek(8).unwrap();
        assert!(parser.seek(9).is_err());
    }

    #[test]
    fn transactional_restores() {
        let data = [0x01, 0x02];
        let mut parser = Parser::new(&data);
        let result = parser.transactional(|p| {
            p.read_le::<u8>()?;
            p.read_le::<u32>()
        });
        assert!(result.is_err());
        assert_eq!(parser.pos(), 0);
    }

    #[test]
    fn read_utf16() {
        let data = [0x48, 0x00, 0x69, 0x00];
        let mut parser = Parser::new(&data);
        assert_eq!(parser.read_utf16_units(2).unwrap(), vec![0x48, 0x69]);
        assert!(parser.read_utf16_units(usize::MAX).is_err());
    }
}
