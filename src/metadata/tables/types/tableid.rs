use strum::{Display, EnumCount, EnumIter, EnumString, IntoEnumIterator};

use crate::metadata::token::Token;

/// Number of table slots in the `valid`/`sorted` bitmaps of a tables stream
pub const TABLE_SLOTS: usize = 64;

/// Identifier of a metadata table, valued by its table number.
///
/// Covers the ECMA-335 tables (`0x00`-`0x2C`) and the Portable PDB tables (`0x30`-`0x37`).
/// The numeric value is the bit position in the tables stream bitmaps and the high byte of a
/// [`Token`].
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, EnumIter, EnumCount, Display, EnumString,
)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum TableId {
    Module = 0x00,
    TypeRef = 0x01,
    TypeDef = 0x02,
    FieldPtr = 0x03,
    Field = 0x04,
    MethodPtr = 0x05,
    MethodDef = 0x06,
    ParamPtr = 0x07,
    Param = 0x08,
    InterfaceImpl = 0x09,
    MemberRef = 0x0A,
    Constant = 0x0B,
    CustomAttribute = 0x0C,
    FieldMarshal = 0x0D,
    DeclSecurity = 0x0E,
    ClassLayout = 0x0F,
    FieldLayout = 0x10,
    StandAloneSig = 0x11,
    EventMap = 0x12,
    EventPtr = 0x13,
    Event = 0x14,
    PropertyMap = 0x15,
    PropertyPtr = 0x16,
    Property = 0x17,
    MethodSemantics = 0x18,
    MethodImpl = 0x19,
    ModuleRef = 0x1A,
    TypeSpec = 0x1B,
    ImplMap = 0x1C,
    FieldRVA = 0x1D,
    EncLog = 0x1E,
    EncMap = 0x1F,
    Assembly = 0x20,
    AssemblyProcessor = 0x21,
    AssemblyOS = 0x22,
    AssemblyRef = 0x23,
    AssemblyRefProcessor = 0x24,
    AssemblyRefOS = 0x25,
    File = 0x26,
    ExportedType = 0x27,
    ManifestResource = 0x28,
    NestedClass = 0x29,
    GenericParam = 0x2A,
    MethodSpec = 0x2B,
    GenericParamConstraint = 0x2C,
    Document = 0x30,
    MethodDebugInformation = 0x31,
    LocalScope = 0x32,
    LocalVariable = 0x33,
    LocalConstant = 0x34,
    ImportScope = 0x35,
    StateMachineMethod = 0x36,
    CustomDebugInformation = 0x37,
}

impl TableId {
    /// Look up a table by its table number
    #[must_use]
    pub fn from_u8(id: u8) -> Option<TableId> {
        TableId::iter().find(|table| *table as u8 == id)
    }

    /// The table a real token points into
    #[must_use]
    pub fn from_token(token: Token) -> Option<TableId> {
        if token.is_pseudo() {
            return None;
        }

        TableId::from_u8(token.table())
    }

    /// Bit of this table in the `valid` and `sorted` bitmaps
    #[must_use]
    pub fn bit(self) -> u64 {
        1u64 << (self as u8)
    }

    /// Token of `row` in this table
    #[must_use]
    pub fn token(self, row: u32) -> Token {
        Token::from_parts(self, row)
    }

    /// `true` for the Portable PDB tables, which live in a debug metadata image
    #[must_use]
    pub fn is_debug(self) -> bool {
        self as u8 >= TableId::Document as u8
    }
}
