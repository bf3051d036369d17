//! The metadata format: root, streams, tables, heaps and signatures.
//!
//! Reading starts at [`image::MetadataImage`], which decodes a complete metadata blob (everything
//! from the `BSJB` signature on) and keeps its tables and heaps immutable afterwards. Writing goes
//! through [`writer::MetadataWriter`], which takes open heaps and tables and makes every width and
//! offset decision in one pass.
//!
//! # Examples
//!
//! ```rust
//! use cilmeta::metadata::{
//!     image::MetadataImage,
//!     tables::TableId,
//!     writer::{MetadataWriter, WriterOptions},
//! };
//!
//! let mut writer = MetadataWriter::new(WriterOptions::default());
//! let name = writer.strings_mut().add("demo.dll")?;
//! writer.table_mut(TableId::Module).push(&[0, name, 0, 0, 0])?;
//! let data = writer.write()?;
//!
//! let image = MetadataImage::read(&data)?;
//! assert_eq!(image.tables().row_count(TableId::Module), 1);
//! # Ok::<(), cilmeta::Error>(())
//! ```

/// The CLI header
pub mod cor20header;
/// The reader orchestrator
pub mod image;
/// The metadata root and stream directory
pub mod root;
/// Portable PDB sequence points
pub mod sequencepoints;
/// Signature model and codec
pub mod signatures;
/// Heaps and the tables stream
pub mod streams;
/// Table schema, frozen tables and table builders
pub mod tables;
/// Metadata tokens
pub mod token;
/// The writer orchestrator
pub mod writer;
