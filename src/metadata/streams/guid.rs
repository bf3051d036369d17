//! The `#GUID` heap: a plain array of 16-byte GUIDs, indexed from 1.
//!
//! # Reference
//! * '<https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf>' - II.24.2.5

use std::borrow::Cow;

use crate::Result;

/// The frozen `#GUID` heap
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Guid<'a> {
    data: Cow<'a, [u8]>,
}

impl<'a> Guid<'a> {
    /// Create a `Guid` view over `data`.
    ///
    /// # Errors
    /// Returns an error if `data` is not a whole number of GUIDs.
    pub fn from(data: &'a [u8]) -> Result<Guid<'a>> {
        if data.len() % 16 != 0 {
            return Err(malformed_error!(
                "#GUID heap size {} is not a multiple of 16",
                data.len()
            ));
        }

        Ok(Guid {
            data: Cow::Borrowed(data),
        })
    }

    /// Get the GUID at 1-based `index`.
    ///
    /// # Errors
    /// Returns an error if `index` is 0 or past the last GUID.
    pub fn get(&self, index: usize) -> Result<uguid::Guid> {
        if index < 1 || index > self.count() {
            return Err(out_of_bounds_error!());
        }

        let offset_start = (index - 1) * 16;
        let mut buffer = [0u8; 16];
        buffer.copy_from_slice(&self.data[offset_start..offset_start + 16]);

        Ok(uguid::Guid::from_bytes(buffer))
    }

    /// Number of GUIDs
    #[must_use]
    pub fn count(&self) -> usize {
        self.data.len() / 16
    }

    /// Iterate `(index, guid)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (usize, uguid::Guid)> + '_ {
        self.data.chunks_exact(16).enumerate().map(|(index, chunk)| {
            let mut buffer = [0u8; 16];
            buffer.copy_from_slice(chunk);
            (index + 1, uguid::Guid::from_bytes(buffer))
        })
    }

    /// The raw heap bytes
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Heap size in bytes, 16 per GUID
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// `true` if the heap holds no GUID
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// The open `#GUID` heap.
#[derive(Clone, Debug, Default)]
pub struct GuidHeapBuilder {
    data: Vec<u8>,
}

impl GuidHeapBuilder {
    /// An empty heap
    #[must_use]
    pub fn new() -> Self {
        GuidHeapBuilder::default()
    }

    /// Start from existing heap content
    #[must_use]
    pub fn from_heap(heap: &Guid<'_>) -> Self {
        GuidHeapBuilder {
            data: heap.data().to_vec(),
        }
    }

    /// Add `guid`, returning the index of an identical GUID if one exists.
    ///
    /// # Errors
    /// Returns [`crate::Error::LimitExceeded`] if the index range is exhausted.
    pub fn add(&mut self, guid: uguid::Guid) -> Result<u32> {
        let bytes = guid.to_bytes();
        if let Some(position) = self.data.chunks_exact(16).position(|chunk| chunk == bytes) {
            return Ok(position as u32 + 1);
        }

        let index = self.data.len() / 16 + 1;
        if index > 0x1FFF_FFFF {
            return Err(limit_error!("#GUID heap entries", index, 0x1FFF_FFFFu32));
        }

        self.data.extend_from_slice(&bytes);
        Ok(index as u32)
    }

    /// Number of GUIDs
    #[must_use]
    pub fn count(&self) -> usize {
        self.data.len() / 16
    }

    /// Heap size in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// `true` if no GUID was added
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Fix the heap content
    #[must_use]
    pub fn freeze(self) -> Guid<'static> {
        log::debug!("#GUID frozen with {} entries", self.data.len() / 16);
        Guid {
            data: Cow::Owned(self.data),
        }
    }
}
