//! The `#US` heap: UTF-16 string literals referenced by `ldstr` tokens.
//!
//! Each entry is a compressed length followed by UTF-16LE code units and one marker byte. The
//! length counts the units' bytes plus the marker. The marker is 1 if any unit has a non-zero high
//! byte or a low byte in `0x01-0x08`, `0x0E-0x1F`, `0x27`, `0x2D` or `0x7F`.
//!
//! # Reference
//! * '<https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf>' - II.24.2.4

use std::borrow::Cow;

use rustc_hash::FxHashMap;
use widestring::U16String;

use crate::{
    file::{parser::Parser, writer::ByteWriter},
    Result,
};

/// Largest `#US` heap: user-string tokens hold the offset in 24 bits
pub const MAX_USER_STRING_HEAP_SIZE: usize = 0x00FF_FFFF;

/// Compute the trailing marker byte for `units`
#[must_use]
pub fn user_string_marker(units: &[u16]) -> u8 {
    let special = units.iter().any(|unit| {
        let low = unit & 0xFF;
        unit >> 8 != 0 || matches!(low, 0x01..=0x08 | 0x0E..=0x1F | 0x27 | 0x2D | 0x7F)
    });

    u8::from(special)
}

/// One decoded `#US` entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserString {
    /// The UTF-16 code units
    pub value: U16String,
    /// The stored marker byte, 0 if the entry had none
    pub marker: u8,
}

/// The frozen `#US` heap
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserStrings<'a> {
    data: Cow<'a, [u8]>,
}

impl<'a> UserStrings<'a> {
    /// Create a `UserStrings` view over `data`.
    ///
    /// # Errors
    /// Returns an error if `data` is empty or does not start with a NUL byte.
    pub fn from(data: &'a [u8]) -> Result<UserStrings<'a>> {
        if data.is_empty() || data[0] != 0 {
            return Err(malformed_error!("Invalid memory for #US heap"));
        }

        Ok(UserStrings {
            data: Cow::Borrowed(data),
        })
    }

    /// Decode the entry at `index`.
    ///
    /// # Errors
    /// Returns an error if the entry is truncated or has an odd length without marker.
    pub fn get(&self, index: usize) -> Result<UserString> {
        if index >= self.data.len() {
            return Err(out_of_bounds_error!());
        }

        let mut parser = Parser::new(&self.data[index..]);
        let len = parser.read_compressed_uint()? as usize;
        let bytes = parser.read_bytes(len)?;

        let units = bytes.len() / 2;
        let marker = if bytes.len() % 2 == 1 {
            bytes[bytes.len() - 1]
        } else {
            0
        };

        let mut units_parser = Parser::new(bytes);
        let value = U16String::from_vec(units_parser.read_utf16_units(units)?);
        Ok(UserString { value, marker })
    }

    /// Decode the entry at `index` into a Rust string, replacing unpaired surrogates.
    ///
    /// # Errors
    /// See [`UserStrings::get`].
    pub fn get_string(&self, index: usize) -> Result<String> {
        Ok(self.get(index)?.value.to_string_lossy())
    }

    /// Iterate `(offset, entry)` pairs, skipping the reserved offset 0
    pub fn iter(&self) -> impl Iterator<Item = (usize, UserString)> + '_ {
        let mut offset = 1;
        std::iter::from_fn(move || {
            // Trailing zero bytes are alignment padding
            if offset >= self.data.len() || self.data[offset] == 0 {
                return None;
            }

            let start = offset;
            let mut parser = Parser::new(&self.data[start..]);
            let len = parser.read_compressed_uint().ok()? as usize;
            let entry = self.get(start).ok()?;
            offset += parser.pos() + len;
            Some((start, entry))
        })
    }

    /// The raw heap bytes
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Heap size in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// `true` if the heap holds no bytes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// The open `#US` heap.
#[derive(Clone, Debug)]
pub struct UserStringHeapBuilder {
    writer: ByteWriter,
    interned: FxHashMap<Vec<u16>, u32>,
}

impl Default for UserStringHeapBuilder {
    fn default() -> Self {
        UserStringHeapBuilder::new()
    }
}

impl UserStringHeapBuilder {
    /// A heap holding only the reserved byte at offset 0
    #[must_use]
    pub fn new() -> Self {
        let mut writer = ByteWriter::new();
        writer.write_le(0u8);
        UserStringHeapBuilder {
            writer,
            interned: FxHashMap::default(),
        }
    }

    /// Start from existing heap content, keeping every offset stable
    #[must_use]
    pub fn from_heap(heap: &UserStrings<'_>) -> Self {
        let mut writer = ByteWriter::new();
        writer.write_bytes(heap.data());

        let mut interned = FxHashMap::default();
        for (offset, entry) in heap.iter() {
            interned.entry(entry.value.into_vec()).or_insert(offset as u32);
        }
        UserStringHeapBuilder { writer, interned }
    }

    /// Intern `value` and return its offset
    ///
    /// # Errors
    /// Returns [`crate::Error::LimitExceeded`] if the heap would outgrow the token range.
    pub fn add(&mut self, value: &str) -> Result<u32> {
        let units: Vec<u16> = value.encode_utf16().collect();
        self.add_units(units)
    }

    /// Intern raw UTF-16 code units, which may contain unpaired surrogates.
    ///
    /// # Errors
    /// Returns [`crate::Error::LimitExceeded`] if the heap would outgrow the token range.
    pub fn add_units(&mut self, units: Vec<u16>) -> Result<u32> {
        if let Some(offset) = self.interned.get(&units) {
            return Ok(*offset);
        }

        let offset = self.writer.pos();
        if offset > MAX_USER_STRING_HEAP_SIZE {
            return Err(limit_error!("#US heap size", offset, MAX_USER_STRING_HEAP_SIZE));
        }

        let len = units.len() * 2 + 1;
        self.writer.write_compressed_uint(u32::try_from(len).unwrap_or(u32::MAX))?;
        for unit in &units {
            self.writer.write_le(*unit);
        }
        self.writer.write_le(user_string_marker(&units));

        self.interned.insert(units, offset as u32);
        Ok(offset as u32)
    }

    /// Current heap size in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.writer.pos()
    }

    /// `true` if no string was added
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writer.pos() <= 1
    }

    /// Fix the heap content
    #[must_use]
    pub fn freeze(self) -> UserStrings<'static> {
        log::debug!("#US frozen at {} bytes", self.writer.pos());
        UserStrings {
            data: Cow::Owned(self.writer.into_inner()),
        }
    }
}

#[cfg(test)]
mod tests {
    use widestring::u16str;

    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let data: [u8; 30] = [
            0x00,
            0x1b, 0x48, 0x00, 0x65, 0x00, 0x6c, 0x00, 0x6c, 0x00, 0x6f, 0x00, 0x2c, 0x00, 0x20, 0x00,
            0x57, 0x00, 0x6f, 0x00, 0x72, 0x00, 0x6c, 0x00, 0x64, 0x00, 0x21, 0x00, 0x00,
            0x00,
        ];

        let us_str = UserStrings::from(&data).unwrap();
        let entry = us_str.get(1).unwrap();
        assert_eq!(entry.value.as_ustr(), u16str!("Hello, World!"));
        assert_eq!(entry.marker, 0);
        assert_eq!(us_str.get_string(1).unwrap(), "Hello, World!");
        assert_eq!(us_str.iter().count(), 1);
    }

    #[test]
    fn invalid() {
        assert!(UserStrings::from(&[]).is_err());
        assert!(UserStrings::from(&[0x01]).is_err());

        // Claims 0x10 bytes, has 2
        let truncated = [0x00, 0x10, 0x41, 0x00];
        let heap = UserStrings::from(&truncated).unwrap();
        assert!(heap.get(1).is_err());
    }

    #[test]
    fn markers() {
        assert_eq!(user_string_marker(&[u16::from(b'A'), u16::from(b'z')]), 0);
        assert_eq!(user_string_marker(&[0x00E9]), 0);
        assert_eq!(user_string_marker(&[0x0100]), 1);
        assert_eq!(user_string_marker(&[u16::from(b'\'')]), 1);
        assert_eq!(user_string_marker(&[u16::from(b'-')]), 1);
        assert_eq!(user_string_marker(&[0x7F]), 1);
        assert_eq!(user_string_marker(&[0x09, 0x0A, 0x0D]), 0);
        assert_eq!(user_string_marker(&[0x1F]), 1);
    }

    #[test]
    fn builder() {
        let mut builder = UserStringHeapBuilder::new();
        let hello = builder.add("Hi").unwrap();
        assert_eq!(hello, 1);
        let dash = builder.add("a-b").unwrap();
        assert_eq!(dash, 7);
        assert_eq!(builder.add("Hi").unwrap(), hello);

        let heap = builder.freeze();
        #[rustfmt::skip]
        assert_eq!(heap.data(), &[
            0x00,
            0x05, b'H', 0x00, b'i', 0x00, 0x00,
            0x07, b'a', 0x00, b'-', 0x00, b'b', 0x00, 0x01,
        ]);
        assert_eq!(heap.get(dash as usize).unwrap().marker, 1);

        let mut reopened = UserStringHeapBuilder::from_heap(&heap);
        assert_eq!(reopened.add("a-b").unwrap(), dash);
    }

    #[test]
    fn unpaired_surrogate() {
        let mut builder = UserStringHeapBuilder::new();
        let offset = builder.add_units(vec![0xD800]).unwrap();
        let heap = builder.freeze();
        let entry = heap.get(offset as usize).unwrap();
        assert_eq!(entry.value.as_slice(), &[0xD800]);
        assert_eq!(entry.marker, 1);
    }
}
