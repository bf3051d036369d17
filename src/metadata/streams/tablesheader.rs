//! The `#~` tables stream (and its uncompressed `#-` variant).
//!
//! Layout (ECMA-335 II.24.2.6):
//!
//! | Offset | Size | Field        |
//! |--------|------|--------------|
//! | 0      | 4    | Reserved     |
//! | 4      | 1    | MajorVersion |
//! | 5      | 1    | MinorVersion |
//! | 6      | 1    | HeapSizes    |
//! | 7      | 1    | Reserved     |
//! | 8      | 8    | Valid        |
//! | 16     | 8    | Sorted       |
//! | 24     | 4*n  | Rows         |
//!
//! When `HeapSizes` carries `0x40` one more `u32` follows the row counts. The rows of every present
//! table follow in table-number order. Bytes after the last row are kept as they are.
//!
//! A Portable PDB tables stream only holds the debug tables, but its columns may reference the
//! type-system tables of the described assembly. Those row counts come from the `#Pdb` stream and
//! are passed in as `external_rows`.

use strum::IntoEnumIterator;

use crate::{
    file::{io::read_le_at, writer::ByteWriter},
    metadata::tables::{
        HeapSizes, MetadataTable, TableBuilder, TableId, TableInfo, MAX_TABLE_ROWS, TABLE_SLOTS,
    },
    Result,
};

/// The fixed part of the tables stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TablesHeader {
    /// First reserved field, always 0 in practice
    pub reserved: u32,
    /// Major version of the table schema
    pub major_version: u8,
    /// Minor version of the table schema
    pub minor_version: u8,
    /// Heap index width flags
    pub heap_sizes: HeapSizes,
    /// Second reserved field, usually 1
    pub reserved2: u8,
    /// Bitmap of present tables
    pub valid: u64,
    /// Bitmap of sorted tables
    pub sorted: u64,
    /// Row count per table slot, 0 for absent tables
    pub row_counts: [u32; TABLE_SLOTS],
    /// The extra `u32` announced by `HeapSizes::EXTRA_DATA`
    pub extra_data: Option<u32>,
}

impl TablesHeader {
    /// Parse the header from the start of a tables stream.
    ///
    /// # Errors
    /// Returns an error if the header is truncated or a present table cannot be described.
    pub fn read(data: &[u8]) -> Result<(TablesHeader, usize)> {
        let mut offset = 0;
        let reserved = read_le_at::<u32>(data, &mut offset)?;
        let major_version = read_le_at::<u8>(data, &mut offset)?;
        let minor_version = read_le_at::<u8>(data, &mut offset)?;
        let heap_sizes = HeapSizes::from_bits_retain(read_le_at::<u8>(data, &mut offset)?);
        let reserved2 = read_le_at::<u8>(data, &mut offset)?;
        let valid = read_le_at::<u64>(data, &mut offset)?;
        let sorted = read_le_at::<u64>(data, &mut offset)?;

        let mut row_counts = [0u32; TABLE_SLOTS];
        for (slot, count) in row_counts.iter_mut().enumerate() {
            if valid & (1u64 << slot) == 0 {
                continue;
            }

            *count = read_le_at::<u32>(data, &mut offset)?;
            if TableId::from_u8(slot as u8).is_none() {
                return Err(malformed_error!("Unknown table 0x{:02X} marked as present", slot));
            }
            if *count > MAX_TABLE_ROWS {
                return Err(malformed_error!(
                    "Table 0x{:02X} claims {} rows",
                    slot,
                    *count
                ));
            }
        }

        let extra_data = if heap_sizes.contains(HeapSizes::EXTRA_DATA) {
            Some(read_le_at::<u32>(data, &mut offset)?)
        } else {
            None
        };

        let header = TablesHeader {
            reserved,
            major_version,
            minor_version,
            heap_sizes,
            reserved2,
            valid,
            sorted,
            row_counts,
            extra_data,
        };
        Ok((header, offset))
    }

    /// Append the header to `writer`.
    pub fn write(&self, writer: &mut ByteWriter) {
        writer.write_le(self.reserved);
        writer.write_le(self.major_version);
        writer.write_le(self.minor_version);
        writer.write_le(self.heap_sizes.bits());
        writer.write_le(self.reserved2);
        writer.write_le(self.valid);
        writer.write_le(self.sorted);
        for (slot, count) in self.row_counts.iter().enumerate() {
            if self.valid & (1u64 << slot) != 0 {
                writer.write_le(*count);
            }
        }
        if let Some(extra) = self.extra_data {
            writer.write_le(extra);
        }
    }

    /// Number of present tables
    #[must_use]
    pub fn table_count(&self) -> u32 {
        self.valid.count_ones()
    }
}

/// Bitmap of every table that must be kept sorted
#[must_use]
pub fn sorted_tables_bitmap() -> u64 {
    TableId::iter()
        .filter(|table| table.sort_key().is_some())
        .fold(0, |bits, table| bits | table.bit())
}

/// A decoded tables stream: header, width decisions and frozen tables.
#[derive(Clone, Debug)]
pub struct TablesStream {
    header: TablesHeader,
    info: TableInfo,
    tables: Vec<Option<MetadataTable>>,
    trailing: Vec<u8>,
}

impl TablesStream {
    /// Decode a tables stream.
    ///
    /// `external_rows` carries the row counts of tables that live in another image (see the module
    /// documentation); local counts win where both are present.
    ///
    /// # Errors
    /// Returns an error if the header or any row is truncated or holds an invalid coded index.
    pub fn read(data: &[u8], external_rows: Option<&[u32; TABLE_SLOTS]>) -> Result<TablesStream> {
        let (header, mut offset) = TablesHeader::read(data)?;

        let mut counts = external_rows.copied().unwrap_or([0; TABLE_SLOTS]);
        for (slot, count) in header.row_counts.iter().enumerate() {
            if header.valid & (1u64 << slot) != 0 {
                counts[slot] = *count;
            }
        }
        let info = TableInfo::new(&counts, header.heap_sizes);

        let mut tables = vec![None; TABLE_SLOTS];
        for table_id in TableId::iter() {
            if header.valid & table_id.bit() == 0 {
                continue;
            }

            let rows = header.row_counts[table_id as usize];
            tables[table_id as usize] =
                Some(MetadataTable::read(table_id, data, &mut offset, rows, &info)?);
            log::debug!("read {} rows of {} (row size {})", rows, table_id, info.row_size(table_id));
        }

        Ok(TablesStream {
            header,
            info,
            tables,
            trailing: data[offset..].to_vec(),
        })
    }

    /// Assemble a new tables stream from frozen tables.
    ///
    /// Empty tables are left out of the `valid` bitmap. The `sorted` bitmap marks every table with
    /// a sort key.
    ///
    /// # Errors
    /// Returns [`crate::Error::LimitExceeded`] if a table has more rows than a token can address.
    pub fn from_tables(
        tables: Vec<MetadataTable>,
        heap_sizes: HeapSizes,
        version: (u8, u8),
        external_rows: Option<&[u32; TABLE_SLOTS]>,
    ) -> Result<TablesStream> {
        let mut slots = vec![None; TABLE_SLOTS];
        let mut row_counts = [0u32; TABLE_SLOTS];
        let mut valid = 0u64;

        for table in tables {
            let rows = table.row_count();
            if rows == 0 {
                continue;
            }
            if rows > MAX_TABLE_ROWS {
                return Err(limit_error!("table rows", rows, MAX_TABLE_ROWS));
            }

            let id = table.id();
            row_counts[id as usize] = rows;
            valid |= id.bit();
            slots[id as usize] = Some(table);
        }

        let mut counts = external_rows.copied().unwrap_or([0; TABLE_SLOTS]);
        for (slot, count) in row_counts.iter().enumerate() {
            if valid & (1u64 << slot) != 0 {
                counts[slot] = *count;
            }
        }
        let info = TableInfo::new(&counts, heap_sizes);
        log_width_decisions(&info);

        let header = TablesHeader {
            reserved: 0,
            major_version: version.0,
            minor_version: version.1,
            heap_sizes,
            reserved2: 1,
            valid,
            sorted: sorted_tables_bitmap(),
            row_counts,
            extra_data: None,
        };

        Ok(TablesStream {
            header,
            info,
            tables: slots,
            trailing: Vec::new(),
        })
    }

    /// Carry over the fields of `original` that do not depend on the rows: the reserved fields,
    /// the `sorted` bitmap, the extra data and the non-width heap flags.
    pub fn preserve_header(&mut self, original: &TablesHeader) {
        let widths = HeapSizes::LARGE_STRINGS | HeapSizes::LARGE_GUID | HeapSizes::LARGE_BLOB;

        self.header.reserved = original.reserved;
        self.header.reserved2 = original.reserved2;
        self.header.sorted = original.sorted;
        self.header.extra_data = original.extra_data;
        self.header.heap_sizes =
            (self.header.heap_sizes & widths) | (original.heap_sizes - widths);
    }

    /// Encode the stream: header, rows, then any preserved trailing bytes.
    ///
    /// # Errors
    /// Returns an error if a cell does not fit its column.
    pub fn write(&self, writer: &mut ByteWriter) -> Result<()> {
        self.header.write(writer);
        for table in self.tables.iter().flatten() {
            table.write(writer, &self.info)?;
        }
        writer.write_bytes(&self.trailing);
        Ok(())
    }

    /// Encode the stream into a new buffer.
    ///
    /// # Errors
    /// See [`TablesStream::write`].
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = ByteWriter::new();
        self.write(&mut writer)?;
        Ok(writer.into_inner())
    }

    /// The fixed header
    #[must_use]
    pub fn header(&self) -> &TablesHeader {
        &self.header
    }

    /// Width decisions for every column
    #[must_use]
    pub fn info(&self) -> &TableInfo {
        &self.info
    }

    /// The table `id`, if present
    #[must_use]
    pub fn table(&self, id: TableId) -> Option<&MetadataTable> {
        self.tables.get(id as usize).and_then(Option::as_ref)
    }

    /// Every present table in table-number order
    pub fn tables(&self) -> impl Iterator<Item = &MetadataTable> {
        self.tables.iter().flatten()
    }

    /// Rows of table `id`, 0 if absent
    #[must_use]
    pub fn row_count(&self, id: TableId) -> u32 {
        self.table(id).map_or(0, MetadataTable::row_count)
    }

    /// Number of present tables
    #[must_use]
    pub fn table_count(&self) -> u32 {
        self.header.table_count()
    }

    /// Bytes after the last row
    #[must_use]
    pub fn trailing(&self) -> &[u8] {
        &self.trailing
    }

    /// Reopen every present table for editing
    #[must_use]
    pub fn to_builders(&self) -> Vec<TableBuilder> {
        self.tables().map(TableBuilder::from_table).collect()
    }
}

fn log_width_decisions(info: &TableInfo) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }

    for kind in crate::metadata::tables::CodedIndexType::iter() {
        if info.is_large_coded(kind) {
            log::debug!("coded index {:?} uses 4 bytes", kind);
        }
    }
    log::debug!("heap sizes {:?}", info.heap_sizes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rustfmt::skip]
    const STREAM: [u8; 44] = [
        0x00, 0x00, 0x00, 0x00,                         // reserved
        0x02, 0x00,                                     // version 2.0
        0x00,                                           // heap sizes
        0x01,                                           // reserved
        0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // valid: Module
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // sorted
        0x01, 0x00, 0x00, 0x00,                         // Module rows
        0x00, 0x00,                                     // Generation
        0x0A, 0x00,                                     // Name
        0x01, 0x00,                                     // Mvid
        0x00, 0x00,                                     // EncId
        0x00, 0x00,                                     // EncBaseId
        0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x00,             // trailing
    ];

    #[test]
    fn crafted() {
        let stream = TablesStream::read(&STREAM, None).unwrap();
        assert_eq!(stream.header().major_version, 2);
        assert_eq!(stream.table_count(), 1);
        assert_eq!(stream.row_count(TableId::Module), 1);
        assert_eq!(stream.row_count(TableId::TypeDef), 0);

        let module = stream.table(TableId::Module).unwrap();
        assert_eq!(module.get(1).unwrap().get(1), 0x0A);
        assert_eq!(stream.trailing(), &[0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x00]);

        assert_eq!(stream.to_bytes().unwrap(), STREAM.to_vec());
    }

    #[test]
    fn extra_data() {
        let mut data = STREAM[..38].to_vec();
        data[6] = HeapSizes::EXTRA_DATA.bits();
        data.splice(28..28, [0x78, 0x56, 0x34, 0x12]);

        let stream = TablesStream::read(&data, None).unwrap();
        assert_eq!(stream.header().extra_data, Some(0x1234_5678));
        assert_eq!(stream.table(TableId::Module).unwrap().get(1).unwrap().get(1), 0x0A);
        assert_eq!(stream.to_bytes().unwrap(), data);
    }

    #[test]
    fn truncated() {
        assert!(TablesStream::read(&STREAM[..20], None).is_err());
        assert!(TablesStream::read(&STREAM[..30], None).is_err());
    }

    #[test]
    fn unknown_table() {
        let mut data = STREAM.to_vec();
        // Slot 0x2D has no layout
        data[13] = 0x20;
        assert!(TablesStream::read(&data, None).is_err());
    }

    #[test]
    fn new_stream() {
        let mut module = TableBuilder::new(TableId::Module);
        module.push(&[0, 1, 1, 0, 0]).unwrap();
        let empty = TableBuilder::new(TableId::TypeRef);

        let stream = TablesStream::from_tables(
            vec![module.freeze().unwrap(), empty.freeze().unwrap()],
            HeapSizes::empty(),
            (2, 0),
            None,
        )
        .unwrap();

        assert_eq!(stream.header().valid, TableId::Module.bit());
        assert_ne!(stream.header().sorted & TableId::CustomAttribute.bit(), 0);
        assert_eq!(stream.header().sorted & TableId::TypeDef.bit(), 0);
        assert_eq!(stream.to_bytes().unwrap().len(), 24 + 4 + 10);
    }

    #[test]
    fn debug_stream_uses_external_counts() {
        // LocalScope.Method is a MethodDef index, wide when the assembly has > 0xFFFF methods
        let mut external = [0u32; TABLE_SLOTS];
        external[TableId::MethodDef as usize] = 0x1_0000;

        let mut scope = TableBuilder::new(TableId::LocalScope);
        scope.push(&[1, 0, 0, 0, 0, 10]).unwrap();

        let stream = TablesStream::from_tables(
            vec![scope.freeze().unwrap()],
            HeapSizes::empty(),
            (2, 0),
            Some(&external),
        )
        .unwrap();
        assert!(stream.info().is_large(TableId::MethodDef));

        let bytes = stream.to_bytes().unwrap();
        let reread = TablesStream::read(&bytes, Some(&external)).unwrap();
        assert_eq!(reread.table(TableId::LocalScope).unwrap().get(1).unwrap().get(0), 1);
        assert_eq!(reread.header().valid, TableId::LocalScope.bit());
    }
}
