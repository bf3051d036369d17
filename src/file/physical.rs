use std::{fs, path::Path};

use memmap2::Mmap;

use super::Backend;
use crate::Result;

/// A memory-mapped metadata file
#[derive(Debug)]
pub struct Physical {
    data: Mmap,
}

impl Physical {
    /// Map the file at `path` read-only.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or mapped.
    pub fn new(path: impl AsRef<Path>) -> Result<Physical> {
        let file = fs::File::open(path)?;

        // The mapping is read-only; the file is not expected to change while mapped.
        let mmap = unsafe { Mmap::map(&file) }?;

        Ok(Physical { data: mmap })
    }
}

impl Backend for Physical {
    fn data(&self) -> &[u8] {
        self.data.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn physical() {
        let mut temp = tempfile::NamedTempFile::new().unwrap();
        temp.write_all(&[0x42, 0x53, 0x4A, 0x42, 0x01]).unwrap();
        temp.flush().unwrap();

        let physical = Physical::new(temp.path()).unwrap();
        assert_eq!(physical.data(), &[0x42, 0x53, 0x4A, 0x42, 0x01]);
    }

    #[test]
    fn missing() {
        assert!(Physical::new("/this/path/does/not/exist.bin").is_err());
    }
}
