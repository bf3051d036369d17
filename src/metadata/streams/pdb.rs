//! The `#Pdb` stream of a Portable PDB image.
//!
//! It identifies the debug image and carries the row counts of the type-system tables the debug
//! tables reference, which decide their index widths.
//!
//! # Reference
//! * '<https://github.com/dotnet/runtime/blob/main/docs/design/specs/PortablePdb-Metadata.md>'

use strum::IntoEnumIterator;

use crate::{
    file::{io::read_le_at, writer::ByteWriter},
    metadata::{
        tables::{TableId, TABLE_SLOTS},
        token::Token,
    },
    Result,
};

/// The decoded `#Pdb` stream
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PdbStream {
    /// 20-byte PDB id: a GUID followed by a 4-byte stamp
    pub id: [u8; 20],
    /// `MethodDef` token of the entry point, null if there is none
    pub entry_point: Token,
    /// Bitmap of the type-system tables referenced from the debug tables
    pub referenced_tables: u64,
    /// Row counts of the referenced tables, indexed by table slot
    pub row_counts: [u32; TABLE_SLOTS],
}

impl PdbStream {
    /// Describe an assembly with the given type-system row counts
    #[must_use]
    pub fn new(id: [u8; 20], entry_point: Token, row_counts: &[u32; TABLE_SLOTS]) -> Self {
        let mut referenced_tables = 0u64;
        let mut counts = [0u32; TABLE_SLOTS];
        for table in TableId::iter().filter(|table| !table.is_debug()) {
            let rows = row_counts[table as usize];
            if rows > 0 {
                referenced_tables |= table.bit();
                counts[table as usize] = rows;
            }
        }

        PdbStream {
            id,
            entry_point,
            referenced_tables,
            row_counts: counts,
        }
    }

    /// Decode the stream.
    ///
    /// # Errors
    /// Returns an error if the stream is truncated or references a debug table.
    pub fn read(data: &[u8]) -> Result<PdbStream> {
        if data.len() < 32 {
            return Err(out_of_bounds_error!());
        }

        let mut id = [0u8; 20];
        id.copy_from_slice(&data[..20]);

        let mut offset = 20;
        let entry_point = Token::new(read_le_at::<u32>(data, &mut offset)?);
        let referenced_tables = read_le_at::<u64>(data, &mut offset)?;

        let mut row_counts = [0u32; TABLE_SLOTS];
        for (slot, count) in row_counts.iter_mut().enumerate() {
            if referenced_tables & (1u64 << slot) == 0 {
                continue;
            }
            if TableId::from_u8(slot as u8).is_none_or(TableId::is_debug) {
                return Err(malformed_error!("#Pdb references table slot 0x{:02X}", slot));
            }
            *count = read_le_at::<u32>(data, &mut offset)?;
        }

        Ok(PdbStream {
            id,
            entry_point,
            referenced_tables,
            row_counts,
        })
    }

    /// Append the stream to `writer`
    pub fn write(&self, writer: &mut ByteWriter) {
        writer.write_bytes(&self.id);
        writer.write_le(self.entry_point.value());
        writer.write_le(self.referenced_tables);
        for (slot, count) in self.row_counts.iter().enumerate() {
            if self.referenced_tables & (1u64 << slot) != 0 {
                writer.write_le(*count);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let data = [
            0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A,     // pdb id
            0x0B, 0x0C, 0x0D, 0x0E, 0x0F, 0x10, 0x11, 0x12, 0x13, 0x14,
            0x01, 0x00, 0x00, 0x06,                                         // entry point
            0x45, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,                 // Module, TypeDef, MethodDef
            0x01, 0x00, 0x00, 0x00,
            0x03, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x01, 0x00,
        ];

        let pdb = PdbStream::read(&data).unwrap();
        assert_eq!(pdb.entry_point, Token::new(0x0600_0001));
        assert_eq!(pdb.row_counts[TableId::TypeDef as usize], 3);
        assert_eq!(pdb.row_counts[TableId::MethodDef as usize], 0x1_0000);

        let mut writer = ByteWriter::new();
        pdb.write(&mut writer);
        assert_eq!(writer.data(), &data);
    }

    #[test]
    fn skips_debug_and_empty_tables() {
        let mut counts = [0u32; TABLE_SLOTS];
        counts[TableId::TypeDef as usize] = 2;
        counts[TableId::Document as usize] = 9;

        let pdb = PdbStream::new([0; 20], Token::new(0), &counts);
        assert_eq!(pdb.referenced_tables, TableId::TypeDef.bit());
        assert_eq!(pdb.row_counts[TableId::Document as usize], 0);
    }

    #[test]
    fn invalid() {
        let mut data = vec![0u8; 32];
        data[30] = 0x01; // bit 0x30: Document
        data.extend_from_slice(&[0; 4]);
        assert!(PdbStream::read(&data).is_err());
        assert!(PdbStream::read(&[0; 10]).is_err());
    }
}
