use crate::{
    metadata::{
        tables::{table::key_value, ColumnKind, MetadataTable, TableId},
        token::Token,
    },
    Error, Result,
};

/// Largest row count a table can hold: tokens keep the row in 24 bits.
pub const MAX_TABLE_ROWS: u32 = 0x00FF_FFFF;

/// An open table: rows are appended and patched until [`TableBuilder::freeze`] turns it into a
/// [`MetadataTable`].
///
/// Reference cells may hold pseudo-tokens while open. Freezing refuses them.
#[derive(Clone, Debug)]
pub struct TableBuilder {
    id: TableId,
    width: usize,
    cells: Vec<u32>,
}

impl TableBuilder {
    /// An empty table
    #[must_use]
    pub fn new(id: TableId) -> Self {
        TableBuilder {
            id,
            width: id.columns().len(),
            cells: Vec::new(),
        }
    }

    /// Reopen a frozen table, e.g. to rewrite an existing image
    #[must_use]
    pub fn from_table(table: &MetadataTable) -> Self {
        let mut builder = TableBuilder::new(table.id());
        for row in table.iter() {
            builder.cells.extend_from_slice(row.cells());
        }
        builder
    }

    /// The table being built
    #[must_use]
    pub fn id(&self) -> TableId {
        self.id
    }

    /// Number of rows so far
    #[must_use]
    pub fn row_count(&self) -> u32 {
        (self.cells.len() / self.width) as u32
    }

    /// `true` if no row was pushed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Append a row and return its 1-based row index.
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] if `cells` does not match the column count and
    /// [`Error::LimitExceeded`] once the table is full.
    pub fn push(&mut self, cells: &[u32]) -> Result<u32> {
        if cells.len() != self.width {
            return Err(malformed_error!(
                "{} rows have {} columns, got {}",
                self.id,
                self.width,
                cells.len()
            ));
        }

        let rid = self.row_count() + 1;
        if rid > MAX_TABLE_ROWS {
            return Err(limit_error!("table rows", rid, MAX_TABLE_ROWS));
        }

        self.cells.extend_from_slice(cells);
        Ok(rid)
    }

    /// Cells of row `rid`
    #[must_use]
    pub fn get(&self, rid: u32) -> Option<&[u32]> {
        let range = self.row_range(rid)?;
        Some(&self.cells[range])
    }

    /// Mutable cells of row `rid`
    pub fn get_mut(&mut self, rid: u32) -> Option<&mut [u32]> {
        let range = self.row_range(rid)?;
        Some(&mut self.cells[range])
    }

    fn row_range(&self, rid: u32) -> Option<std::ops::Range<usize>> {
        if rid == 0 || rid > self.row_count() {
            return None;
        }
        let start = (rid as usize - 1) * self.width;
        Some(start..start + self.width)
    }

    /// Iterate the rows mutably
    pub fn rows_mut(&mut self) -> impl Iterator<Item = &mut [u32]> {
        self.cells.chunks_exact_mut(self.width)
    }

    /// Iterate the rows
    pub fn rows(&self) -> impl Iterator<Item = &[u32]> {
        self.cells.chunks_exact(self.width)
    }

    /// Visit every table and coded-index cell together with its column kind
    pub fn references_mut(&mut self) -> impl Iterator<Item = (ColumnKind, &mut u32)> {
        let columns = self.id.columns();
        self.cells
            .chunks_exact_mut(self.width)
            .flat_map(move |row| row.iter_mut().zip(columns).map(|(cell, column)| (column.kind, cell)))
            .filter(|(kind, _)| kind.is_reference())
    }

    /// Replace all rows with `rows` in the given order
    pub(crate) fn replace_rows(&mut self, rows: Vec<Vec<u32>>) {
        self.cells = rows.into_iter().flatten().collect();
    }

    /// Stable-sort the rows by this table's key columns.
    ///
    /// Returns the new 1-based row index for each old row, so `moved[old - 1] == new`. Unsorted
    /// tables are left alone and return the identity.
    pub fn sort(&mut self) -> Vec<u32> {
        let rows = self.row_count();
        let Some(key) = self.id.sort_key() else {
            return (1..=rows).collect();
        };

        let columns = self.id.columns();
        let primary = columns[key.primary].kind;
        let secondary = key.secondary.map(|column| (column, columns[column].kind));

        let mut order: Vec<usize> = (0..rows as usize).collect();
        order.sort_by_key(|&index| {
            let row = &self.cells[index * self.width..(index + 1) * self.width];
            (
                key_value(primary, row[key.primary]),
                secondary.map_or(0, |(column, kind)| key_value(kind, row[column])),
            )
        });

        let mut moved = vec![0u32; rows as usize];
        let mut cells = Vec::with_capacity(self.cells.len());
        for (new, old) in order.iter().enumerate() {
            moved[*old] = new as u32 + 1;
            cells.extend_from_slice(&self.cells[old * self.width..(old + 1) * self.width]);
        }
        self.cells = cells;

        moved
    }

    /// Freeze into a [`MetadataTable`].
    ///
    /// # Errors
    /// Returns [`Error::UnresolvedPseudoToken`] if a reference cell still holds a pseudo-token and
    /// [`Error::Malformed`] if a sorted table is out of order.
    pub fn freeze(self) -> Result<MetadataTable> {
        let columns = self.id.columns();
        for row in self.cells.chunks_exact(self.width) {
            for (cell, column) in row.iter().zip(columns) {
                let token = Token::new(*cell);
                if column.kind.is_reference() && token.is_pseudo() {
                    return Err(Error::UnresolvedPseudoToken(token));
                }
            }
        }

        let table = MetadataTable::from_cells(self.id, self.cells);
        if !table.is_sorted() {
            return Err(malformed_error!("{} rows are not sorted by their key column", table.id()));
        }

        log::debug!("froze {} with {} rows", table.id(), table.row_count());
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested(nested: u32, enclosing: u32) -> [u32; 2] {
        [nested, enclosing]
    }

    #[test]
    fn push_and_patch() {
        let mut builder = TableBuilder::new(TableId::NestedClass);
        assert_eq!(builder.push(&nested(2, 1)).unwrap(), 1);
        assert_eq!(builder.push(&nested(3, 1)).unwrap(), 2);
        assert!(builder.push(&[1]).is_err());

        builder.get_mut(2).unwrap()[1] = 2;
        assert_eq!(builder.get(2), Some(&[3, 2][..]));
        assert_eq!(builder.get(3), None);
        assert_eq!(builder.row_count(), 2);
    }

    #[test]
    fn sort_reports_moves() {
        let mut builder = TableBuilder::new(TableId::NestedClass);
        builder.push(&nested(5, 1)).unwrap();
        builder.push(&nested(2, 1)).unwrap();
        builder.push(&nested(3, 1)).unwrap();

        let moved = builder.sort();
        assert_eq!(moved, vec![3, 1, 2]);

        let table = builder.freeze().unwrap();
        let keys: Vec<u32> = table.iter().map(|row| row.get(0)).collect();
        assert_eq!(keys, vec![2, 3, 5]);
    }

    #[test]
    fn sort_is_stable_with_secondary_key() {
        // InterfaceImpl orders by class, then by interface (TypeDefOrRef coded)
        let mut builder = TableBuilder::new(TableId::InterfaceImpl);
        builder.push(&[2, TableId::TypeRef.token(1).value()]).unwrap();
        builder.push(&[1, TableId::TypeRef.token(4).value()]).unwrap();
        builder.push(&[1, TableId::TypeDef.token(4).value()]).unwrap();
        builder.sort();

        let rows: Vec<&[u32]> = builder.rows().collect();
        assert_eq!(rows[0], &[1, 0x0200_0004]);
        assert_eq!(rows[1], &[1, 0x0100_0004]);
        assert_eq!(rows[2], &[2, 0x0100_0001]);
    }

    #[test]
    fn unsorted_freeze_fails() {
        let mut builder = TableBuilder::new(TableId::NestedClass);
        builder.push(&nested(5, 1)).unwrap();
        builder.push(&nested(2, 1)).unwrap();
        assert!(builder.freeze().is_err());
    }

    #[test]
    fn pseudo_token_freeze_fails() {
        let mut builder = TableBuilder::new(TableId::NestedClass);
        builder.push(&nested(0x8000_0001, 1)).unwrap();
        assert!(matches!(
            builder.freeze(),
            Err(Error::UnresolvedPseudoToken(_))
        ));
    }

    #[test]
    fn reopen_frozen() {
        let mut builder = TableBuilder::new(TableId::ModuleRef);
        builder.push(&[7]).unwrap();
        let table = builder.freeze().unwrap();

        let reopened = TableBuilder::from_table(&table);
        assert_eq!(reopened.get(1), Some(&[7][..]));
    }
}
