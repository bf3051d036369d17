//! The `#Blob` heap: length-prefixed byte strings holding signatures, constants, attribute values
//! and the Portable PDB blobs.
//!
//! Offset 0 holds the empty blob and stands for "no blob". The builder is content addressed:
//! identical blobs are stored once.
//!
//! # Reference
//! * '<https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf>' - II.24.2.4

use std::borrow::Cow;

use rustc_hash::FxHashMap;

use crate::{
    file::{parser::Parser, writer::ByteWriter},
    Result,
};

/// Largest `#Blob` offset the 4-byte index form can hold in this crate
pub const MAX_BLOB_HEAP_SIZE: usize = 0x1FFF_FFFF;

/// The frozen `#Blob` heap
///
/// # Examples
///
/// ```rust
/// use cilmeta::metadata::streams::Blob;
///
/// let data = &[0x00, 0x03, 0x41, 0x42, 0x43];
/// let blob = Blob::from(data)?;
/// assert_eq!(blob.get(1)?, &[0x41, 0x42, 0x43]);
/// # Ok::<(), cilmeta::Error>(())
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blob<'a> {
    data: Cow<'a, [u8]>,
}

impl<'a> Blob<'a> {
    /// Create a `Blob` view over `data`.
    ///
    /// # Errors
    /// Returns an error if `data` is empty or does not start with the empty blob.
    pub fn from(data: &'a [u8]) -> Result<Blob<'a>> {
        if data.is_empty() || data[0] != 0 {
            return Err(malformed_error!("Invalid memory for #Blob heap"));
        }

        Ok(Blob {
            data: Cow::Borrowed(data),
        })
    }

    /// Get the blob at `index`.
    ///
    /// # Errors
    /// Returns an error if the offset is out of bounds or the blob runs past the heap.
    pub fn get(&self, index: usize) -> Result<&[u8]> {
        if index >= self.data.len() {
            return Err(out_of_bounds_error!());
        }

        let mut parser = Parser::new(&self.data[index..]);
        let len = parser.read_compressed_uint()? as usize;
        let skip = parser.pos();

        let Some(data_start) = index.checked_add(skip) else {
            return Err(out_of_bounds_error!());
        };
        let Some(data_end) = data_start.checked_add(len) else {
            return Err(out_of_bounds_error!());
        };
        if data_end > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        Ok(&self.data[data_start..data_end])
    }

    /// Iterate `(offset, blob)` pairs, skipping the empty blob at offset 0.
    ///
    /// Iteration stops at the first entry that does not decode.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[u8])> + '_ {
        let mut position = 1;
        std::iter::from_fn(move || {
            if position >= self.data.len() {
                return None;
            }

            let start = position;
            let mut parser = Parser::new(&self.data[start..]);
            let len = parser.read_compressed_uint().ok()? as usize;
            let blob = self.get(start).ok()?;
            position += parser.pos() + len;
            Some((start, blob))
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

/// The open `#Blob` heap.
#[derive(Clone, Debug)]
pub struct BlobHeapBuilder {
    writer: ByteWriter,
    interned: FxHashMap<Vec<u8>, u32>,
}

impl Default for BlobHeapBuilder {
    fn default() -> Self {
        BlobHeapBuilder::new()
    }
}

impl BlobHeapBuilder {
    /// A heap holding only the empty blob
    #[must_use]
    pub fn new() -> Self {
        let mut writer = ByteWriter::new();
        writer.write_le(0u8);

        let mut interned = FxHashMap::default();
        interned.insert(Vec::new(), 0);
        BlobHeapBuilder { writer, interned }
    }

    /// Start from existing heap content, keeping every offset stable
    #[must_use]
    pub fn from_heap(heap: &Blob<'_>) -> Self {
        let mut writer = ByteWriter::new();
        writer.write_bytes(heap.data());

        let mut interned = FxHashMap::default();
        interned.insert(Vec::new(), 0);
        for (offset, blob) in heap.iter() {
            interned.entry(blob.to_vec()).or_insert(offset as u32);
        }
        BlobHeapBuilder { writer, interned }
    }

    /// Add `blob`, returning the offset of an identical blob if one exists.
    ///
    /// # Errors
    /// Returns [`crate::Error::LimitExceeded`] if the heap would outgrow its index range.
    pub fn add(&mut self, blob: &[u8]) -> Result<u32> {
        if let Some(offset) = self.interned.get(blob) {
            return Ok(*offset);
        }

        let offset = self.writer.pos();
        let end = offset + blob.len() + 4;
        if end > MAX_BLOB_HEAP_SIZE {
            return Err(limit_error!("#Blob heap size", end, MAX_BLOB_HEAP_SIZE));
        }

        self.writer.write_compressed_uint(blob.len() as u32)?;
        self.writer.write_bytes(blob);
        self.interned.insert(blob.to_vec(), offset as u32);
        Ok(offset as u32)
    }

    /// Current heap size in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.writer.pos()
    }

    /// `true` if only the empty blob is present
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writer.pos() <= 1
    }

    /// Fix the heap content
    #[must_use]
    pub fn freeze(self) -> Blob<'static> {
        log::debug!("#Blob frozen at {} bytes", self.writer.pos());
        Blob {
            data: Cow::Owned(self.writer.into_inner()),
        }
    }
}
