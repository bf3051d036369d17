//! Byte sources and the byte cursor.
//!
//! [`File`] holds a raw metadata blob, either owned in memory or memory-mapped from disk. The blob
//! starts with the metadata root (`BSJB`); locating it inside a container image is the container
//! layer's job.
//!
//! [`parser::Parser`] and [`writer::ByteWriter`] are the bounds-checked read and write cursors
//! used by every decoder and encoder in this crate.
//!
//! # Examples
//!
//! ```rust,no_run
//! use cilmeta::File;
//!
//! let file = File::from_file("metadata.bin".as_ref())?;
//! println!("{} bytes", file.len());
//! # Ok::<(), cilmeta::Error>(())
//! ```

pub mod io;
pub mod parser;
mod physical;
pub mod writer;

use std::path::Path;

use physical::Physical;

use crate::Result;

/// A source of metadata bytes
pub trait Backend: Send + Sync {
    /// The entire buffer
    fn data(&self) -> &[u8];
}

impl Backend for Vec<u8> {
    fn data(&self) -> &[u8] {
        self
    }
}

/// Metadata bytes, owned or memory-mapped.
pub struct File {
    data: Box<dyn Backend>,
}

impl std::fmt::Debug for File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File").field("len", &self.len()).finish()
    }
}

impl File {
    /// Memory-map the file at `path`.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or mapped, and
    /// [`crate::Error::Empty`] for an empty file.
    pub fn from_file(path: &Path) -> Result<File> {
        let physical = Physical::new(path)?;
        File::load(Box::new(physical))
    }

    /// Take ownership of an in-memory buffer.
    ///
    /// # Errors
    /// Returns [`crate::Error::Empty`] for an empty buffer.
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        File::load(Box::new(data))
    }

    fn load(data: Box<dyn Backend>) -> Result<File> {
        if data.data().is_empty() {
            return Err(crate::Error::Empty);
        }

        Ok(File { data })
    }

    /// Total size in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.data().len()
    }

    /// `true` if the buffer is empty; never the case for a loaded file
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.data().is_empty()
    }

    /// The whole buffer
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data.data()
    }

    /// A bounds-checked sub-slice.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the buffer.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.data().get(offset..end))
            .ok_or_else(|| out_of_bounds_error!())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn from_mem() {
        let file = File::from_mem(vec![1, 2, 3]).unwrap();
        assert_eq!(file.len(), 3);
        assert_eq!(file.data_slice(1, 2).unwrap(), &[2, 3]);
        assert_eq!(file.data_slice(3, 0).unwrap(), &[] as &[u8]);
        assert!(file.data_slice(2, 2).is_err());
        assert!(file.data_slice(usize::MAX, 2).is_err());
        assert!(matches!(File::from_mem(Vec::new()), Err(crate::Error::Empty)));
    }

    #[test]
    fn from_file() {
        let mut temp = tempfile::NamedTempFile::new().unwrap();
        temp.write_all(&[9; 16]).unwrap();
        temp.flush().unwrap();

        let file = File::from_file(temp.path()).unwrap();
        assert_eq!(file.data(), &[9; 16]);
        assert_eq!(file.data_slice(12, 4).unwrap(), &[9; 4]);
        assert!(file.data_slice(12, 5).is_err());
    }
}
