use std::path::Path;

use anyhow::{bail, Context};
use cilmeta::{
    metadata::image::{MetadataImage, ReaderOptions},
    File,
};

use crate::app::GlobalOptions;

/// `BSJB`, the metadata root signature
const METADATA_SIGNATURE: &[u8] = b"BSJB";

/// A loaded input and the offset of the metadata root inside it.
pub struct Input {
    file: File,
    offset: usize,
}

impl Input {
    /// The metadata blob: the whole file, or the rest of a PE file from its root on
    pub fn metadata(&self) -> &[u8] {
        &self.file.data()[self.offset..]
    }

    /// Offset of the metadata root within the file
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Decode the metadata with the reader options selected on the command line
    pub fn image(&self, opts: &GlobalOptions) -> anyhow::Result<MetadataImage<'_>> {
        let options = if opts.strict {
            ReaderOptions::strict()
        } else {
            ReaderOptions::default()
        };
        MetadataImage::read_with_options(self.metadata(), options)
            .context("failed to decode metadata")
    }
}

/// Memory-map `path` and find its metadata root.
pub fn load_input(path: &Path) -> anyhow::Result<Input> {
    let file = File::from_file(path)
        .with_context(|| format!("failed to load file: {}", path.display()))?;

    let Some(offset) = file
        .data()
        .windows(METADATA_SIGNATURE.len())
        .position(|window| window == METADATA_SIGNATURE)
    else {
        bail!("no metadata root (BSJB) in {}", path.display());
    };

    if offset != 0 {
        log::debug!("metadata root at file offset 0x{offset:x}");
    }
    Ok(Input { file, offset })
}
