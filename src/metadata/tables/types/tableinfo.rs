use bitflags::bitflags;
use strum::{EnumCount, IntoEnumIterator};

use crate::metadata::tables::{
    types::{tableid::TABLE_SLOTS, ColumnKind},
    CodedIndexType, TableId,
};

bitflags! {
    /// The `HeapSizes` byte of the tables stream header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct HeapSizes: u8 {
        /// `#Strings` indexes are 4 bytes wide
        const LARGE_STRINGS = 0x01;
        /// `#GUID` indexes are 4 bytes wide
        const LARGE_GUID = 0x02;
        /// `#Blob` indexes are 4 bytes wide
        const LARGE_BLOB = 0x04;
        /// Tables stream was padded by the producer
        const PADDING_BIT = 0x08;
        /// Edit-and-continue delta image
        const DELTA_ONLY = 0x20;
        /// One extra `u32` follows the row counts
        const EXTRA_DATA = 0x40;
        /// Rows may carry deleted markers
        const HAS_DELETE = 0x80;
    }
}

/// Row count and derived index width of one table.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct TableRowInfo {
    /// Number of rows
    pub rows: u32,
    /// `true` if references to this table need 4 bytes
    pub is_large: bool,
}

impl TableRowInfo {
    /// Derive the width decision for `rows`
    #[must_use]
    pub fn new(rows: u32) -> Self {
        TableRowInfo {
            rows,
            is_large: rows > u32::from(u16::MAX),
        }
    }
}

/// Every width decision needed to read or write table rows.
///
/// Built once all row counts and heap sizes are final. Simple table indexes are 4 bytes if the target
/// table has more than 65535 rows; heap indexes follow the [`HeapSizes`] flags; each coded index kind
/// is 4 bytes if any table it can reference has `2^(16 - tag_bits)` rows or more.
///
/// Row counts may include tables that are not stored in the same stream: a Portable PDB image sizes
/// its references into the type system tables by the counts recorded in its `#Pdb` stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableInfo {
    rows: [TableRowInfo; TABLE_SLOTS],
    coded_indexes: [bool; CodedIndexType::COUNT],
    heap_sizes: HeapSizes,
}

impl Default for TableInfo {
    fn default() -> Self {
        TableInfo::new(&[0; TABLE_SLOTS], HeapSizes::empty())
    }
}

impl TableInfo {
    /// Compute the width decisions for the given per-slot row counts and heap flags
    #[must_use]
    pub fn new(row_counts: &[u32; TABLE_SLOTS], heap_sizes: HeapSizes) -> Self {
        let mut rows = [TableRowInfo::default(); TABLE_SLOTS];
        for (slot, count) in row_counts.iter().enumerate() {
            rows[slot] = TableRowInfo::new(*count);
        }

        let mut table_info = TableInfo {
            rows,
            coded_indexes: [false; CodedIndexType::COUNT],
            heap_sizes,
        };
        table_info.calculate_coded_index_sizes();
        table_info
    }

    /// Convenience constructor from `(table, rows)` pairs
    #[must_use]
    pub fn from_rows(tables: &[(TableId, u32)], heap_sizes: HeapSizes) -> Self {
        let mut row_counts = [0u32; TABLE_SLOTS];
        for (table, rows) in tables {
            row_counts[*table as usize] = *rows;
        }

        TableInfo::new(&row_counts, heap_sizes)
    }

    fn calculate_coded_index_sizes(&mut self) {
        for kind in CodedIndexType::iter() {
            let threshold = kind.large_threshold();
            self.coded_indexes[kind as usize] =
                kind.tables().any(|table| self.rows(table) >= threshold);
        }
    }

    /// Row count of `table`
    #[must_use]
    pub fn rows(&self, table: TableId) -> u32 {
        self.rows[table as usize].rows
    }

    /// Row counts for every table slot
    #[must_use]
    pub fn row_counts(&self) -> [u32; TABLE_SLOTS] {
        let mut counts = [0u32; TABLE_SLOTS];
        for (slot, info) in self.rows.iter().enumerate() {
            counts[slot] = info.rows;
        }
        counts
    }

    /// The heap size flags these widths were derived from
    #[must_use]
    pub fn heap_sizes(&self) -> HeapSizes {
        self.heap_sizes
    }

    /// `true` if indexes into `table` are 4 bytes
    #[must_use]
    pub fn is_large(&self, table: TableId) -> bool {
        self.rows[table as usize].is_large
    }

    /// `true` if `#Strings` indexes are 4 bytes
    #[must_use]
    pub fn is_large_str(&self) -> bool {
        self.heap_sizes.contains(HeapSizes::LARGE_STRINGS)
    }

    /// `true` if `#GUID` indexes are 4 bytes
    #[must_use]
    pub fn is_large_guid(&self) -> bool {
        self.heap_sizes.contains(HeapSizes::LARGE_GUID)
    }

    /// `true` if `#Blob` indexes are 4 bytes
    #[must_use]
    pub fn is_large_blob(&self) -> bool {
        self.heap_sizes.contains(HeapSizes::LARGE_BLOB)
    }

    /// `true` if coded indexes of `kind` are 4 bytes
    #[must_use]
    pub fn is_large_coded(&self, kind: CodedIndexType) -> bool {
        self.coded_indexes[kind as usize]
    }

    /// Width in bytes of a column of `kind`
    #[must_use]
    pub fn column_bytes(&self, kind: ColumnKind) -> usize {
        let is_large = match kind {
            ColumnKind::U8 => return 1,
            ColumnKind::U16 => return 2,
            ColumnKind::U32 => return 4,
            ColumnKind::String => self.is_large_str(),
            ColumnKind::Guid => self.is_large_guid(),
            ColumnKind::Blob => self.is_large_blob(),
            ColumnKind::Table(table) => self.is_large(table),
            ColumnKind::Coded(coded) => self.is_large_coded(coded),
        };

        if is_large {
            4
        } else {
            2
        }
    }

    /// Width in bytes of one row of `table`
    #[must_use]
    pub fn row_size(&self, table: TableId) -> usize {
        table
            .columns()
            .iter()
            .map(|column| self.column_bytes(column.kind))
            .sum()
    }
}
