//! The `#Strings` heap: NUL-terminated UTF-8 identifiers addressed by byte offset.
//!
//! [`Strings`] is the frozen, read-only view used by the reader and produced by
//! [`StringHeapBuilder::freeze`]. The builder interns exact strings and always keeps the empty
//! string at offset 0.
//!
//! # Reference
//! * '<https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf>' - II.24.2.3

use std::{borrow::Cow, ffi::CStr};

use rustc_hash::FxHashMap;

use crate::Result;

/// Largest `#Strings` offset a token-free reference can address
pub const MAX_STRING_HEAP_SIZE: usize = 0x1FFF_FFFF;

/// The frozen `#Strings` heap
///
/// # Examples
///
/// ```rust
/// use cilmeta::metadata::streams::Strings;
///
/// let data = &[0u8, b'<', b'M', b'o', b'd', b'u', b'l', b'e', b'>', 0u8];
/// let strings = Strings::from(data)?;
/// assert_eq!(strings.get(1)?, "<Module>");
/// assert_eq!(strings.get(0)?, "");
/// # Ok::<(), cilmeta::Error>(())
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Strings<'a> {
    data: Cow<'a, [u8]>,
}

impl<'a> Strings<'a> {
    /// Create a `Strings` view over `data`.
    ///
    /// # Errors
    /// Returns an error if `data` is empty or does not start with a NUL byte.
    pub fn from(data: &'a [u8]) -> Result<Strings<'a>> {
        if data.is_empty() || data[0] != 0 {
            return Err(malformed_error!("Provided #Strings heap is empty"));
        }

        Ok(Strings {
            data: Cow::Borrowed(data),
        })
    }

    /// Like [`Strings::from`], but accepts a heap whose first byte is not NUL.
    ///
    /// # Errors
    /// Returns an error if `data` is empty.
    pub fn from_lenient(data: &'a [u8]) -> Result<Strings<'a>> {
        if data.is_empty() {
            return Err(malformed_error!("Provided #Strings heap is empty"));
        }
        if data[0] != 0 {
            log::warn!("#Strings heap does not start with NUL (0x{:02X}), accepting", data[0]);
        }

        Ok(Strings {
            data: Cow::Borrowed(data),
        })
    }

    /// Get the string at offset `index`.
    ///
    /// # Errors
    /// Returns an error if the offset is out of bounds, or the string is unterminated or not UTF-8.
    pub fn get(&self, index: usize) -> Result<&str> {
        if index >= self.data.len() {
            return Err(out_of_bounds_error!());
        }

        match CStr::from_bytes_until_nul(&self.data[index..]) {
            Ok(result) => match result.to_str() {
                Ok(result) => Ok(result),
                Err(_) => Err(malformed_error!("Invalid string at index - {}", index)),
            },
            Err(_) => Err(malformed_error!("Invalid string at index - {}", index)),
        }
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

    /// `true` if offsets into this heap need 4 bytes
    #[must_use]
    pub fn is_large(&self) -> bool {
        self.data.len() > usize::from(u16::MAX)
    }

    /// Iterate `(offset, string)` pairs, skipping the leading empty string
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        let mut offset = 1;
        std::iter::from_fn(move || {
            if offset >= self.data.len() {
                return None;
            }

            let start = offset;
            let value = self.get(start).ok()?;
            offset += value.len() + 1;
            Some((start, value))
        })
    }

    /// Detach from the input buffer
    #[must_use]
    pub fn into_owned(self) -> Strings<'static> {
        Strings {
            data: Cow::Owned(self.data.into_owned()),
        }
    }
}

/// The open `#Strings` heap.
#[derive(Clone, Debug)]
pub struct StringHeapBuilder {
    data: Vec<u8>,
    interned: FxHashMap<String, u32>,
}

impl Default for StringHeapBuilder {
    fn default() -> Self {
        StringHeapBuilder::new()
    }
}

impl StringHeapBuilder {
    /// A heap holding only the empty string
    #[must_use]
    pub fn new() -> Self {
        let mut interned = FxHashMap::default();
        interned.insert(String::new(), 0);
        StringHeapBuilder {
            data: vec![0],
            interned,
        }
    }

    /// Start from existing heap content, keeping every offset stable.
    ///
    /// Strings already present are interned, so re-adding them returns their original offset.
    #[must_use]
    pub fn from_heap(heap: &Strings<'_>) -> Self {
        let mut builder = StringHeapBuilder {
            data: heap.data().to_vec(),
            interned: FxHashMap::default(),
        };
        // Offset 0 holds the empty string only in a well-formed heap
        if let Ok(value) = heap.get(0) {
            builder.interned.insert(value.to_string(), 0);
        }
        for (offset, value) in heap.iter() {
            builder
                .interned
                .entry(value.to_string())
                .or_insert(offset as u32);
        }
        builder
    }

    /// Intern `value` and return its offset.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for a string containing NUL and
    /// [`crate::Error::LimitExceeded`] if the heap would outgrow its index range.
    pub fn add(&mut self, value: &str) -> Result<u32> {
        if let Some(offset) = self.interned.get(value) {
            return Ok(*offset);
        }
        if value.contains('\0') {
            return Err(malformed_error!("String {:?} contains a NUL character", value));
        }

        let offset = self.data.len();
        let end = offset + value.len() + 1;
        if end > MAX_STRING_HEAP_SIZE {
            return Err(limit_error!("#Strings heap size", end, MAX_STRING_HEAP_SIZE));
        }

        self.data.extend_from_slice(value.as_bytes());
        self.data.push(0);
        self.interned.insert(value.to_string(), offset as u32);
        Ok(offset as u32)
    }

    /// Current heap size in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// `true` if only the empty string is present
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() <= 1
    }

    /// Fix the heap content
    #[must_use]
    pub fn freeze(self) -> Strings<'static> {
        log::debug!("#Strings frozen at {} bytes", self.data.len());
        Strings {
            data: Cow::Owned(self.data),
        }
    }
}
