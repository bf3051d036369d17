//! The writer side: heaps and tables laid out into a complete metadata blob.
//!
//! [`MetadataWriter::write`] makes every width and offset decision exactly once, in this order:
//!
//! 1. freeze the heaps, which fixes their sizes and so their index widths
//! 2. freeze the tables (their contents are final), which fixes the coded-index widths
//! 3. compute the stream offsets
//! 4. write the root and stream directory
//! 5. write the streams, each padded to 4 bytes
//!
//! The result is the bare metadata blob starting with `BSJB`. Mapping it into a container and
//! recording its RVA in the CLI header is up to the caller, see
//! [`crate::metadata::cor20header::Cor20Header::for_metadata`].

use crate::{
    file::writer::{align_to, ByteWriter},
    metadata::{
        image::MetadataImage,
        root::Root,
        streams::{
            BlobHeapBuilder, GuidHeapBuilder, PdbStream, StreamHeader, StringHeapBuilder,
            TablesHeader, TablesStream, UserStringHeapBuilder,
        },
        tables::{HeapSizes, MetadataTable, TableBuilder, TableId, TABLE_SLOTS},
    },
    Result,
};

/// Writer configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriterOptions {
    /// Runtime version string of the root
    pub version: String,
    /// Root major and minor version
    pub root_version: (u16, u16),
    /// Tables stream major and minor version
    pub tables_version: (u8, u8),
    /// Heap index widths forced to 4 bytes regardless of heap size
    pub force_heap_sizes: HeapSizes,
    /// Emit `#US` and `#GUID` even when nothing was added to them
    pub emit_empty_heaps: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        WriterOptions {
            version: "v4.0.30319".to_string(),
            root_version: (1, 1),
            tables_version: (2, 0),
            force_heap_sizes: HeapSizes::empty(),
            emit_empty_heaps: true,
        }
    }
}

impl WriterOptions {
    /// Set the runtime version string
    #[must_use]
    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    /// Set the tables stream version
    #[must_use]
    pub fn with_tables_version(mut self, major: u8, minor: u8) -> Self {
        self.tables_version = (major, minor);
        self
    }

    /// Force 4-byte indexes into the given heaps
    #[must_use]
    pub fn with_force_heap_sizes(mut self, heap_sizes: HeapSizes) -> Self {
        self.force_heap_sizes = heap_sizes;
        self
    }

    /// Set whether empty `#US` / `#GUID` heaps are emitted
    #[must_use]
    pub fn with_emit_empty_heaps(mut self, emit: bool) -> Self {
        self.emit_empty_heaps = emit;
        self
    }
}

/// Heaps and tables waiting to be laid out
#[derive(Debug)]
pub struct MetadataWriter {
    options: WriterOptions,
    strings: StringHeapBuilder,
    user_strings: UserStringHeapBuilder,
    guids: GuidHeapBuilder,
    blobs: BlobHeapBuilder,
    tables: Vec<Option<TableBuilder>>,
    pdb: Option<PdbStream>,
    original_header: Option<TablesHeader>,
}

impl MetadataWriter {
    /// An empty writer
    #[must_use]
    pub fn new(options: WriterOptions) -> Self {
        MetadataWriter {
            options,
            strings: StringHeapBuilder::new(),
            user_strings: UserStringHeapBuilder::new(),
            guids: GuidHeapBuilder::new(),
            blobs: BlobHeapBuilder::new(),
            tables: vec![None; TABLE_SLOTS],
            pdb: None,
            original_header: None,
        }
    }

    /// Reopen a decoded image. Heap offsets and row positions are kept, so writing without
    /// changes reproduces a blob this writer produced.
    ///
    /// # Errors
    /// Returns an error if the image holds a table that cannot be reopened.
    pub fn from_image(image: &MetadataImage<'_>) -> Result<MetadataWriter> {
        let root = image.root();
        let header = image.tables().header();
        let widths = HeapSizes::LARGE_STRINGS | HeapSizes::LARGE_GUID | HeapSizes::LARGE_BLOB;

        let options = WriterOptions {
            version: root.version.clone(),
            root_version: (root.major_version, root.minor_version),
            tables_version: (header.major_version, header.minor_version),
            force_heap_sizes: header.heap_sizes & widths,
            emit_empty_heaps: image.user_strings().is_some() || image.guids().is_some(),
        };

        let mut writer = MetadataWriter::new(options);
        if let Some(strings) = image.strings() {
            writer.strings = StringHeapBuilder::from_heap(strings);
        }
        if let Some(user_strings) = image.user_strings() {
            writer.user_strings = UserStringHeapBuilder::from_heap(user_strings);
        }
        if let Some(guids) = image.guids() {
            writer.guids = GuidHeapBuilder::from_heap(guids);
        }
        if let Some(blobs) = image.blobs() {
            writer.blobs = BlobHeapBuilder::from_heap(blobs);
        }
        for table in image.tables().to_builders() {
            writer.set_table(table);
        }
        writer.pdb = image.pdb().cloned();
        writer.original_header = Some(header.clone());

        Ok(writer)
    }

    /// The options
    #[must_use]
    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    /// The open `#Strings` heap
    pub fn strings_mut(&mut self) -> &mut StringHeapBuilder {
        &mut self.strings
    }

    /// The open `#US` heap
    pub fn user_strings_mut(&mut self) -> &mut UserStringHeapBuilder {
        &mut self.user_strings
    }

    /// The open `#GUID` heap
    pub fn guids_mut(&mut self) -> &mut GuidHeapBuilder {
        &mut self.guids
    }

    /// The open `#Blob` heap
    pub fn blobs_mut(&mut self) -> &mut BlobHeapBuilder {
        &mut self.blobs
    }

    /// Table `id`, created empty on first access
    pub fn table_mut(&mut self, id: TableId) -> &mut TableBuilder {
        self.tables[id as usize].get_or_insert_with(|| TableBuilder::new(id))
    }

    /// Table `id`, if it was touched
    #[must_use]
    pub fn table(&self, id: TableId) -> Option<&TableBuilder> {
        self.tables[id as usize].as_ref()
    }

    /// Every table touched so far, in table order
    pub fn tables_mut(&mut self) -> impl Iterator<Item = &mut TableBuilder> {
        self.tables.iter_mut().flatten()
    }

    /// Replace table `table.id()`
    pub fn set_table(&mut self, table: TableBuilder) {
        let slot = table.id() as usize;
        self.tables[slot] = Some(table);
    }

    /// Make this a Portable PDB image described by `pdb`
    pub fn set_pdb(&mut self, pdb: PdbStream) {
        self.pdb = Some(pdb);
    }

    /// Lay out and encode the blob.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnresolvedPseudoToken`] if a table still holds a pseudo-token,
    /// [`crate::Error::LimitExceeded`] if a heap, table or index is beyond its maximum, and a
    /// format error if a sorted table is out of order.
    pub fn write(self) -> Result<Vec<u8>> {
        // 1. heaps
        let strings = self.strings.freeze();
        let user_strings = self.user_strings.freeze();
        let guids = self.guids.freeze();
        let blobs = self.blobs.freeze();

        let mut heap_sizes = self.options.force_heap_sizes;
        if strings.len() > 0xFFFF {
            heap_sizes |= HeapSizes::LARGE_STRINGS;
        }
        if guids.len() > 0xFFFF {
            heap_sizes |= HeapSizes::LARGE_GUID;
        }
        if blobs.len() > 0xFFFF {
            heap_sizes |= HeapSizes::LARGE_BLOB;
        }
        log::debug!(
            "heaps: #Strings {} bytes, #US {} bytes, #GUID {} bytes, #Blob {} bytes, {:?}",
            strings.len(),
            user_strings.len(),
            guids.len(),
            blobs.len(),
            heap_sizes
        );

        // 2. tables
        let tables = self
            .tables
            .into_iter()
            .flatten()
            .map(TableBuilder::freeze)
            .collect::<Result<Vec<MetadataTable>>>()?;
        let mut tables_stream = TablesStream::from_tables(
            tables,
            heap_sizes,
            self.options.tables_version,
            self.pdb.as_ref().map(|pdb| &pdb.row_counts),
        )?;
        if let Some(original) = &self.original_header {
            tables_stream.preserve_header(original);
        }

        // 3. offsets
        let mut streams: Vec<(&str, Vec<u8>)> = Vec::with_capacity(6);
        if let Some(pdb) = &self.pdb {
            let mut writer = ByteWriter::new();
            pdb.write(&mut writer);
            streams.push(("#Pdb", writer.into_inner()));
        }
        streams.push(("#~", tables_stream.to_bytes()?));
        streams.push(("#Strings", strings.data().to_vec()));
        if !user_strings.is_empty() || self.options.emit_empty_heaps {
            streams.push(("#US", user_strings.data().to_vec()));
        }
        if !guids.is_empty() || self.options.emit_empty_heaps {
            streams.push(("#GUID", guids.data().to_vec()));
        }
        streams.push(("#Blob", blobs.data().to_vec()));

        let mut root = Root::new(
            &self.options.version,
            self.options.root_version.0,
            self.options.root_version.1,
        );
        for (name, data) in &streams {
            let size = align_to(data.len(), 4);
            let Ok(size) = u32::try_from(size) else {
                return Err(limit_error!("stream size", size, u32::MAX));
            };
            root.stream_headers.push(StreamHeader::new(name, 0, size));
        }

        let mut offset = root.encoded_size();
        for header in &mut root.stream_headers {
            let Ok(stream_offset) = u32::try_from(offset) else {
                return Err(limit_error!("stream offset", offset, u32::MAX));
            };
            header.offset = stream_offset;
            offset += header.size as usize;
            log::debug!(
                "stream {} at 0x{:X}, {} bytes",
                header.name,
                header.offset,
                header.size
            );
        }

        // 4. root, 5. streams
        let mut writer = ByteWriter::with_capacity(offset);
        root.write(&mut writer)?;
        for (_, data) in &streams {
            writer.write_bytes(data);
            writer.align(4);
        }

        Ok(writer.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::{
            image::MetadataImage,
            tables::{interfaceimpl, typedef, CodedIndexType, TableInfo},
            token::Token,
        },
        Error,
    };

    fn sample() -> MetadataWriter {
        let mut writer = MetadataWriter::new(WriterOptions::default());
        let name = writer.strings_mut().add("Program").unwrap();
        let namespace = writer.strings_mut().add("Demo").unwrap();
        let module = writer.strings_mut().add("demo.dll").unwrap();
        let mvid = writer.guids_mut().add(uguid::guid!("01234567-89ab-cdef-0123-456789abcdef")).unwrap();
        writer.user_strings_mut().add("Hello").unwrap();

        writer.table_mut(TableId::Module).push(&[0, module, mvid, 0, 0]).unwrap();
        writer
            .table_mut(TableId::TypeDef)
            .push(&[0x0010_0001, name, namespace, 0, 1, 1])
            .unwrap();
        writer
    }

    #[test]
    fn layout() {
        let data = sample().write().unwrap();
        let image = MetadataImage::read(&data).unwrap();

        let names: Vec<&str> =
            image.root().stream_headers.iter().map(|header| header.name.as_str()).collect();
        assert_eq!(names, vec!["#~", "#Strings", "#US", "#GUID", "#Blob"]);
        for header in &image.root().stream_headers {
            assert_eq!(header.offset % 4, 0);
            assert_eq!(header.size % 4, 0);
        }

        assert_eq!(image.root().version, "v4.0.30319");
        assert_eq!(image.tables().header().major_version, 2);
        assert_eq!(image.type_name(Token::new(0x0200_0001)).unwrap(), "Demo.Program");
        assert_eq!(image.user_strings().unwrap().get_string(1).unwrap(), "Hello");
        assert_eq!(image.tables().info().heap_sizes(), HeapSizes::empty());
    }

    #[test]
    fn rewrite_is_identical() {
        let data = sample().write().unwrap();
        let image = MetadataImage::read(&data).unwrap();

        let rewritten = MetadataWriter::from_image(&image).unwrap().write().unwrap();
        assert_eq!(rewritten, data);
        assert_eq!(image.to_bytes().unwrap(), data);
    }

    #[test]
    fn forced_heap_sizes() {
        let mut writer = sample();
        writer.options.force_heap_sizes = HeapSizes::LARGE_STRINGS | HeapSizes::LARGE_BLOB;
        let data = writer.write().unwrap();

        let image = MetadataImage::read(&data).unwrap();
        let info: &TableInfo = image.tables().info();
        assert!(info.is_large_str());
        assert!(info.is_large_blob());
        assert!(!info.is_large_guid());
    }

    #[test]
    fn guid_heap_width_follows_byte_length() {
        fn with_guids(count: u32) -> Vec<u8> {
            let mut writer = MetadataWriter::new(WriterOptions::default());
            let mut mvid = 0;
            for index in 1..=count {
                let mut bytes = [0u8; 16];
                bytes[..4].copy_from_slice(&index.to_le_bytes());
                mvid = writer.guids_mut().add(uguid::Guid::from_bytes(bytes)).unwrap();
            }
            writer.table_mut(TableId::Module).push(&[0, 0, mvid, 0, 0]).unwrap();
            writer.write().unwrap()
        }

        // 4095 GUIDs are 65520 bytes
        let data = with_guids(4095);
        let image = MetadataImage::read(&data).unwrap();
        assert_eq!(image.guids().unwrap().len(), 0xFFF0);
        assert!(!image.tables().info().is_large_guid());
        assert_eq!(image.table(TableId::Module).unwrap().get(1).unwrap().get(2), 4095);

        // 4096 GUIDs are 65536 bytes and need 4-byte indexes
        let data = with_guids(4096);
        let image = MetadataImage::read(&data).unwrap();
        assert_eq!(image.guids().unwrap().len(), 0x1_0000);
        assert!(image.tables().info().is_large_guid());
        assert!(image.tables().header().heap_sizes.contains(HeapSizes::LARGE_GUID));
        let module = image.table(TableId::Module).unwrap().get(1).unwrap();
        assert_eq!(module.get(2), 4096);
        assert_eq!(
            module.guid(2, image.guids().unwrap()).unwrap(),
            Some(image.guids().unwrap().get(4096).unwrap())
        );
    }

    #[test]
    fn coded_index_width_in_written_rows() {
        fn with_type_refs(count: u32) -> Vec<u8> {
            let mut writer = MetadataWriter::new(WriterOptions::default());
            let name = writer.strings_mut().add("Base").unwrap();
            let namespace = writer.strings_mut().add("Demo").unwrap();
            writer.table_mut(TableId::Module).push(&[0, name, 0, 0, 0]).unwrap();
            for _ in 0..count {
                writer
                    .table_mut(TableId::TypeRef)
                    .push(&[0x0000_0001, name, namespace])
                    .unwrap();
            }
            let last = Token::from_parts(TableId::TypeRef, count).value();
            writer
                .table_mut(TableId::TypeDef)
                .push(&[0x0010_0001, name, namespace, last, 1, 1])
                .unwrap();
            writer.table_mut(TableId::InterfaceImpl).push(&[1, last]).unwrap();
            writer.write().unwrap()
        }

        // Module, TypeRef, TypeDef and InterfaceImpl present
        let header = 24 + 4 * 4;
        for (count, wide, type_ref, type_def, interface_impl) in [
            (0x3FFF, false, 6, 14, 4),
            (0x4000, true, 8, 16, 6),
        ] {
            let data = with_type_refs(count);
            let image = MetadataImage::read(&data).unwrap();
            let info = image.tables().info();
            assert_eq!(info.is_large_coded(CodedIndexType::TypeDefOrRef), wide);
            assert_eq!(info.is_large_coded(CodedIndexType::ResolutionScope), wide);
            assert_eq!(info.row_size(TableId::TypeRef), type_ref);
            assert_eq!(info.row_size(TableId::TypeDef), type_def);
            assert_eq!(info.row_size(TableId::InterfaceImpl), interface_impl);

            let expected = header
                + info.row_size(TableId::Module)
                + count as usize * type_ref
                + type_def
                + interface_impl;
            let stream = image.stream_data("#~").unwrap().len();
            assert!(stream >= expected && stream < expected + 4, "{stream} vs {expected}");

            let last = Token::from_parts(TableId::TypeRef, count);
            let type_def = image.table(TableId::TypeDef).unwrap().get(1).unwrap();
            assert_eq!(type_def.reference(typedef::EXTENDS), Some(last));
            assert_eq!(type_def.get(typedef::FIELD_LIST), 1);
            let interface = image.table(TableId::InterfaceImpl).unwrap().get(1).unwrap();
            assert_eq!(interface.reference(interfaceimpl::INTERFACE), Some(last));
            assert_eq!(interface.reference(interfaceimpl::CLASS), Some(Token::new(0x0200_0001)));
        }
    }

    #[test]
    fn empty_heaps_omitted() {
        let mut writer =
            MetadataWriter::new(WriterOptions::default().with_emit_empty_heaps(false));
        writer.table_mut(TableId::Module).push(&[0, 0, 0, 0, 0]).unwrap();
        let data = writer.write().unwrap();

        let image = MetadataImage::read(&data).unwrap();
        assert!(image.user_strings().is_none());
        assert!(image.guids().is_none());
        assert!(image.strings().is_some());
    }

    #[test]
    fn pseudo_token_fails() {
        let mut writer = sample();
        writer.table_mut(TableId::NestedClass).push(&[0x8000_0001, 1]).unwrap();
        assert!(matches!(writer.write(), Err(Error::UnresolvedPseudoToken(_))));
    }
}
