use std::ops::Range;

use rayon::prelude::*;

use crate::{
    file::{
        io::{read_le_at, read_le_at_dyn},
        writer::ByteWriter,
    },
    metadata::{
        streams::{Blob, Guid, Strings},
        tables::{CodedIndexType, ColumnKind, TableId, TableInfo},
        token::Token,
    },
    Error, Result,
};

/// Read one cell of `kind`.
///
/// Coded indexes are decoded into token values so that they survive changes of the column width.
pub(crate) fn read_cell(data: &[u8], offset: &mut usize, kind: ColumnKind, info: &TableInfo) -> Result<u32> {
    match kind {
        ColumnKind::U8 => Ok(u32::from(read_le_at::<u8>(data, offset)?)),
        ColumnKind::U16 => Ok(u32::from(read_le_at::<u16>(data, offset)?)),
        ColumnKind::U32 => read_le_at::<u32>(data, offset),
        ColumnKind::Coded(coded) => {
            let raw = read_le_at_dyn(data, offset, info.is_large_coded(coded))?;
            Ok(coded.decode(raw)?.value())
        }
        _ => read_le_at_dyn(data, offset, info.column_bytes(kind) == 4),
    }
}

/// Write one cell of `kind`.
///
/// # Errors
/// Returns [`Error::UnresolvedPseudoToken`] if a reference cell still holds a pseudo-token and
/// [`Error::LimitExceeded`] if the value does not fit the column.
pub(crate) fn write_cell(writer: &mut ByteWriter, value: u32, kind: ColumnKind, info: &TableInfo) -> Result<()> {
    match kind {
        ColumnKind::U8 => {
            let Ok(byte) = u8::try_from(value) else {
                return Err(limit_error!("1-byte column", value, u8::MAX));
            };
            writer.write_le(byte);
            Ok(())
        }
        ColumnKind::U16 => {
            let Ok(short) = u16::try_from(value) else {
                return Err(limit_error!("2-byte column", value, u16::MAX));
            };
            writer.write_le(short);
            Ok(())
        }
        ColumnKind::U32 => {
            writer.write_le(value);
            Ok(())
        }
        ColumnKind::Coded(coded) => {
            let packed = coded.encode(Token::new(value))?;
            writer.write_dyn(packed, info.is_large_coded(coded))
        }
        ColumnKind::Table(table) => {
            let token = Token::new(value);
            if token.is_pseudo() {
                return Err(Error::UnresolvedPseudoToken(token));
            }
            writer.write_dyn(value, info.is_large(table))
        }
        _ => writer.write_dyn(value, info.column_bytes(kind) == 4),
    }
}

/// Ordering value of a cell in a sorted column: the packed coded index, or the plain value.
pub(crate) fn key_value(kind: ColumnKind, cell: u32) -> u64 {
    match kind {
        ColumnKind::Coded(coded) => coded_key(coded, Token::new(cell)),
        _ => u64::from(cell),
    }
}

fn coded_key(coded: CodedIndexType, token: Token) -> u64 {
    let tag = token
        .table_id()
        .and_then(|table| coded.tag_of(table))
        .unwrap_or(0);
    (u64::from(token.row()) << coded.tag_bits()) | u64::from(tag)
}

/// A frozen table: fixed rows, readable from any number of threads.
///
/// Cells are kept decoded as `u32`: fixed columns hold their value, heap columns their offset or
/// index, simple table indexes their row, and coded indexes the token they reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetadataTable {
    id: TableId,
    width: usize,
    cells: Vec<u32>,
}

impl MetadataTable {
    pub(crate) fn from_cells(id: TableId, cells: Vec<u32>) -> Self {
        MetadataTable {
            id,
            width: id.columns().len(),
            cells,
        }
    }

    /// Decode `rows` rows of table `id` from `data`, starting at `offset`.
    ///
    /// # Errors
    /// Returns [`Error::OutOfBounds`] if the rows run past `data`, or [`Error::Malformed`] for an
    /// invalid coded index.
    pub fn read(id: TableId, data: &[u8], offset: &mut usize, rows: u32, info: &TableInfo) -> Result<Self> {
        let columns = id.columns();
        let row_size = info.row_size(id);
        let Some(total) = (rows as usize).checked_mul(row_size) else {
            return Err(out_of_bounds_error!());
        };
        if offset.checked_add(total).is_none_or(|end| end > data.len()) {
            return Err(out_of_bounds_error!());
        }

        let mut cells = Vec::with_capacity(rows as usize * columns.len());
        for _ in 0..rows {
            for column in columns {
                cells.push(read_cell(data, offset, column.kind, info)?);
            }
        }

        Ok(MetadataTable::from_cells(id, cells))
    }

    /// Encode every row with the widths in `info`.
    ///
    /// # Errors
    /// See [`write_cell`].
    pub fn write(&self, writer: &mut ByteWriter, info: &TableInfo) -> Result<()> {
        let columns = self.id.columns();
        for row in self.cells.chunks_exact(self.width) {
            for (value, column) in row.iter().zip(columns) {
                write_cell(writer, *value, column.kind, info)?;
            }
        }

        Ok(())
    }

    /// The table this is
    #[must_use]
    pub fn id(&self) -> TableId {
        self.id
    }

    /// Number of rows
    #[must_use]
    pub fn row_count(&self) -> u32 {
        (self.cells.len() / self.width) as u32
    }

    /// `true` if the table has no rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Access row `rid` (1-based)
    #[must_use]
    pub fn get(&self, rid: u32) -> Option<RowRef<'_>> {
        if rid == 0 || rid > self.row_count() {
            return None;
        }

        let start = (rid as usize - 1) * self.width;
        Some(RowRef {
            table: self.id,
            rid,
            cells: &self.cells[start..start + self.width],
        })
    }

    /// Iterate all rows in order
    pub fn iter(&self) -> impl ExactSizeIterator<Item = RowRef<'_>> + '_ {
        let table = self.id;
        self.cells
            .chunks_exact(self.width)
            .enumerate()
            .map(move |(index, cells)| RowRef {
                table,
                rid: index as u32 + 1,
                cells,
            })
    }

    /// Iterate all rows in parallel
    pub fn par_iter(&self) -> impl IndexedParallelIterator<Item = RowRef<'_>> + '_ {
        let table = self.id;
        self.cells
            .par_chunks_exact(self.width)
            .enumerate()
            .map(move |(index, cells)| RowRef {
                table,
                rid: index as u32 + 1,
                cells,
            })
    }

    /// `true` if the rows respect this table's sort key. Unsorted tables always pass.
    #[must_use]
    pub fn is_sorted(&self) -> bool {
        let Some(key) = self.id.sort_key() else {
            return true;
        };
        let columns = self.id.columns();

        let order = |row: &[u32]| {
            let primary = key_value(columns[key.primary].kind, row[key.primary]);
            let secondary = key
                .secondary
                .map_or(0, |column| key_value(columns[column].kind, row[column]));
            (primary, secondary)
        };

        self.cells
            .chunks_exact(self.width)
            .zip(self.cells.chunks_exact(self.width).skip(1))
            .all(|(previous, next)| order(previous) <= order(next))
    }

    /// Rows whose sort-key column references `target`, found by binary search.
    ///
    /// Returns an empty range for unsorted tables and for a `target` this table cannot reference.
    #[must_use]
    pub fn find_by_key(&self, target: Token) -> Range<u32> {
        let Some(key) = self.id.sort_key() else {
            return 0..0;
        };
        let kind = self.id.columns()[key.primary].kind;
        let wanted = match kind {
            ColumnKind::Coded(coded) => {
                if target.table_id().and_then(|table| coded.tag_of(table)).is_none() {
                    return 0..0;
                }
                coded_key(coded, target)
            }
            ColumnKind::Table(table) => {
                if target.table_id() != Some(table) {
                    return 0..0;
                }
                u64::from(target.row())
            }
            _ => return 0..0,
        };

        let rows: Vec<&[u32]> = self.cells.chunks_exact(self.width).collect();
        let start = rows.partition_point(|row| key_value(kind, row[key.primary]) < wanted);
        let end = rows.partition_point(|row| key_value(kind, row[key.primary]) <= wanted);

        (start as u32 + 1)..(end as u32 + 1)
    }

    /// The rows of `target` owned by row `rid` through a list column such as `TypeDef.FieldList`.
    ///
    /// A list runs from this row's value up to the next row's value, the last one up to the end of
    /// `target_rows`.
    #[must_use]
    pub fn list_range(&self, rid: u32, column: usize, target_rows: u32) -> Range<u32> {
        let Some(row) = self.get(rid) else {
            return 0..0;
        };

        let start = row.get(column).max(1);
        let end = match self.get(rid + 1) {
            Some(next) => next.get(column),
            None => target_rows + 1,
        };

        start.min(target_rows + 1)..end.clamp(start, target_rows + 1)
    }
}

/// A borrowed row of a [`MetadataTable`].
#[derive(Clone, Copy, Debug)]
pub struct RowRef<'a> {
    table: TableId,
    rid: u32,
    cells: &'a [u32],
}

impl<'a> RowRef<'a> {
    /// The 1-based row index
    #[must_use]
    pub fn rid(&self) -> u32 {
        self.rid
    }

    /// The token of this row
    #[must_use]
    pub fn token(&self) -> Token {
        Token::from_parts(self.table, self.rid)
    }

    /// Raw cells of this row
    #[must_use]
    pub fn cells(&self) -> &'a [u32] {
        self.cells
    }

    /// Raw value of `column`
    #[must_use]
    pub fn get(&self, column: usize) -> u32 {
        self.cells[column]
    }

    /// The row referenced by a table or coded-index column, `None` for a null reference
    #[must_use]
    pub fn reference(&self, column: usize) -> Option<Token> {
        let value = self.cells[column];
        let token = match self.table.columns()[column].kind {
            ColumnKind::Table(table) => Token::from_parts(table, value),
            ColumnKind::Coded(_) => Token::new(value),
            _ => return None,
        };

        if token.is_null() {
            None
        } else {
            Some(token)
        }
    }

    /// The string a `#Strings` column points at.
    ///
    /// # Errors
    /// Returns an error if the offset is out of bounds or the string is not UTF-8.
    pub fn string<'h>(&self, column: usize, strings: &'h Strings<'_>) -> Result<&'h str> {
        strings.get(self.cells[column] as usize)
    }

    /// The blob a `#Blob` column points at.
    ///
    /// # Errors
    /// Returns an error if the offset is out of bounds or the blob is truncated.
    pub fn blob<'h>(&self, column: usize, blobs: &'h Blob<'_>) -> Result<&'h [u8]> {
        blobs.get(self.cells[column] as usize)
    }

    /// The GUID a `#GUID` column points at, `None` for index 0.
    ///
    /// # Errors
    /// Returns an error if the index is out of bounds.
    pub fn guid(&self, column: usize, guids: &Guid<'_>) -> Result<Option<uguid::Guid>> {
        match self.cells[column] {
            0 => Ok(None),
            index => guids.get(index as usize).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tables::HeapSizes;

    #[test]
    fn crafted_short() {
        #[rustfmt::skip]
        let data = vec![
            0x01, 0x00, 0x10, 0x00, // flags
            0x02, 0x00,             // type_name
            0x03, 0x00,             // type_namespace
            0x0D, 0x00,             // extends: TypeRef row 3
            0x01, 0x00,             // field_list
            0x01, 0x00,             // method_list
        ];

        let info = TableInfo::from_rows(&[(TableId::TypeDef, 1)], HeapSizes::empty());
        let mut offset = 0;
        let table = MetadataTable::read(TableId::TypeDef, &data, &mut offset, 1, &info).unwrap();
        assert_eq!(offset, data.len());

        let row = table.get(1).unwrap();
        assert_eq!(row.token(), Token::new(0x0200_0001));
        assert_eq!(row.get(0), 0x0010_0001);
        assert_eq!(row.get(1), 2);
        assert_eq!(row.reference(3), Some(Token::new(0x0100_0003)));
        assert_eq!(row.reference(4), Some(Token::new(0x0400_0001)));

        let mut writer = ByteWriter::new();
        table.write(&mut writer, &info).unwrap();
        assert_eq!(writer.data(), data.as_slice());
    }

    #[test]
    fn crafted_long() {
        #[rustfmt::skip]
        let data = vec![
            0x01, 0x00, 0x10, 0x00,     // flags
            0x02, 0x00, 0x00, 0x00,     // type_name
            0x03, 0x00, 0x00, 0x00,     // type_namespace
            0x0D, 0x00, 0x00, 0x00,     // extends: TypeRef row 3
            0x01, 0x00, 0x00, 0x00,     // field_list
            0x01, 0x00, 0x00, 0x00,     // method_list
        ];

        let info = TableInfo::from_rows(
            &[
                (TableId::TypeDef, 1),
                (TableId::TypeRef, 0x4000),
                (TableId::Field, 0x1_0000),
                (TableId::MethodDef, 0x1_0000),
            ],
            HeapSizes::LARGE_STRINGS,
        );
        let mut offset = 0;
        let table = MetadataTable::read(TableId::TypeDef, &data, &mut offset, 1, &info).unwrap();
        assert_eq!(table.get(1).unwrap().reference(3), Some(Token::new(0x0100_0003)));

        let mut writer = ByteWriter::new();
        table.write(&mut writer, &info).unwrap();
        assert_eq!(writer.data(), data.as_slice());
    }

    #[test]
    fn truncated() {
        let data = [0u8; 10];
        let info = TableInfo::default();
        let mut offset = 0;
        assert!(MetadataTable::read(TableId::TypeDef, &data, &mut offset, 1, &info).is_err());
        assert_eq!(offset, 0);
    }

    fn custom_attributes(parents: &[Token]) -> MetadataTable {
        let mut cells = Vec::new();
        for parent in parents {
            cells.extend_from_slice(&[parent.value(), TableId::MemberRef.token(1).value(), 0]);
        }
        MetadataTable::from_cells(TableId::CustomAttribute, cells)
    }

    #[test]
    fn find_by_key() {
        // Packed HasCustomAttribute order: MethodDef(tag 0) < TypeDef(tag 3) for the same row
        let table = custom_attributes(&[
            TableId::MethodDef.token(1),
            TableId::TypeDef.token(1),
            TableId::TypeDef.token(1),
            TableId::MethodDef.token(2),
            TableId::Field.token(5),
        ]);
        assert!(table.is_sorted());

        assert_eq!(table.find_by_key(TableId::TypeDef.token(1)), 2..4);
        assert_eq!(table.find_by_key(TableId::MethodDef.token(2)), 4..5);
        assert_eq!(table.find_by_key(TableId::Field.token(5)), 5..6);
        assert!(table.find_by_key(TableId::Field.token(1)).is_empty());
        assert!(table.find_by_key(TableId::Document.token(1)).is_empty());
    }

    #[test]
    fn unsorted_detected() {
        let table = custom_attributes(&[TableId::MethodDef.token(2), TableId::MethodDef.token(1)]);
        assert!(!table.is_sorted());
    }

    #[test]
    fn list_range() {
        // Three types owning fields 1..3, none, 3..=4
        let mut cells = Vec::new();
        for field_list in [1u32, 3, 3] {
            cells.extend_from_slice(&[0, 0, 0, 0, field_list, 1]);
        }
        let table = MetadataTable::from_cells(TableId::TypeDef, cells);

        assert_eq!(table.list_range(1, 4, 4), 1..3);
        assert_eq!(table.list_range(2, 4, 4), 3..3);
        assert_eq!(table.list_range(3, 4, 4), 3..5);
        assert_eq!(table.list_range(4, 4, 4), 0..0);
    }

    #[test]
    fn pseudo_tokens_refuse_to_write() {
        let mut cells = vec![0u32; 6];
        cells[4] = 0x8000_0001;
        let table = MetadataTable::from_cells(TableId::TypeDef, cells);
        let mut writer = ByteWriter::new();
        let err = table.write(&mut writer, &TableInfo::default()).unwrap_err();
        assert!(matches!(err, Error::UnresolvedPseudoToken(_)));
    }

    #[test]
    fn parallel_iteration() {
        let table = custom_attributes(&[TableId::MethodDef.token(1), TableId::MethodDef.token(2)]);
        let rids: Vec<u32> = table.par_iter().map(|row| row.rid()).collect();
        assert_eq!(rids, vec![1, 2]);
    }
}
