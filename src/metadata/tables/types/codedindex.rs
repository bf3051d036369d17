//! Coded indexes (ECMA-335 II.24.2.6).
//!
//! A coded index is a reference into one of several tables, packed as
//! `(row << tag_bits) | tag`. Each [`CodedIndexType`] fixes the tag-to-table mapping and with it the
//! number of tag bits. Whether the column is 2 or 4 bytes wide is decided per kind by
//! [`crate::metadata::tables::TableInfo`] once all row counts are known.
//!
//! Inside this crate a decoded coded index is carried as a [`Token`]: the table byte preserves the
//! tag even for null references, so decode followed by encode reproduces the original value.

use strum::{EnumCount, EnumIter};

use crate::{
    metadata::{tables::TableId, token::Token},
    Error, Result,
};

/// The reference kinds that are stored as coded indexes.
#[derive(Debug, Hash, Eq, PartialEq, Clone, Copy, EnumIter, EnumCount)]
#[repr(usize)]
#[allow(missing_docs)]
pub enum CodedIndexType {
    TypeDefOrRef,
    HasConstant,
    HasCustomAttribute,
    HasFieldMarshal,
    HasDeclSecurity,
    MemberRefParent,
    HasSemantics,
    MethodDefOrRef,
    MemberForwarded,
    Implementation,
    CustomAttributeType,
    ResolutionScope,
    TypeOrMethodDef,
    HasCustomDebugInformation,
}

const HAS_CUSTOM_ATTRIBUTE: [Option<TableId>; 22] = [
    Some(TableId::MethodDef),
    Some(TableId::Field),
    Some(TableId::TypeRef),
    Some(TableId::TypeDef),
    Some(TableId::Param),
    Some(TableId::InterfaceImpl),
    Some(TableId::MemberRef),
    Some(TableId::Module),
    Some(TableId::DeclSecurity),
    Some(TableId::Property),
    Some(TableId::Event),
    Some(TableId::StandAloneSig),
    Some(TableId::ModuleRef),
    Some(TableId::TypeSpec),
    Some(TableId::Assembly),
    Some(TableId::AssemblyRef),
    Some(TableId::File),
    Some(TableId::ExportedType),
    Some(TableId::ManifestResource),
    Some(TableId::GenericParam),
    Some(TableId::GenericParamConstraint),
    Some(TableId::MethodSpec),
];

const HAS_CUSTOM_DEBUG_INFORMATION: [Option<TableId>; 27] = [
    Some(TableId::MethodDef),
    Some(TableId::Field),
    Some(TableId::TypeRef),
    Some(TableId::TypeDef),
    Some(TableId::Param),
    Some(TableId::InterfaceImpl),
    Some(TableId::MemberRef),
    Some(TableId::Module),
    Some(TableId::DeclSecurity),
    Some(TableId::Property),
    Some(TableId::Event),
    Some(TableId::StandAloneSig),
    Some(TableId::ModuleRef),
    Some(TableId::TypeSpec),
    Some(TableId::Assembly),
    Some(TableId::AssemblyRef),
    Some(TableId::File),
    Some(TableId::ExportedType),
    Some(TableId::ManifestResource),
    Some(TableId::GenericParam),
    Some(TableId::GenericParamConstraint),
    Some(TableId::MethodSpec),
    Some(TableId::Document),
    Some(TableId::LocalScope),
    Some(TableId::LocalVariable),
    Some(TableId::LocalConstant),
    Some(TableId::ImportScope),
];

impl CodedIndexType {
    /// The tag slots of this kind, indexed by tag. `None` marks a reserved tag.
    #[must_use]
    pub fn slots(&self) -> &'static [Option<TableId>] {
        match self {
            CodedIndexType::TypeDefOrRef => &[
                Some(TableId::TypeDef),
                Some(TableId::TypeRef),
                Some(TableId::TypeSpec),
            ],
            CodedIndexType::HasConstant => &[
                Some(TableId::Field),
                Some(TableId::Param),
                Some(TableId::Property),
            ],
            CodedIndexType::HasCustomAttribute => &HAS_CUSTOM_ATTRIBUTE,
            CodedIndexType::HasFieldMarshal => &[Some(TableId::Field), Some(TableId::Param)],
            CodedIndexType::HasDeclSecurity => &[
                Some(TableId::TypeDef),
                Some(TableId::MethodDef),
                Some(TableId::Assembly),
            ],
            CodedIndexType::MemberRefParent => &[
                Some(TableId::TypeDef),
                Some(TableId::TypeRef),
                Some(TableId::ModuleRef),
                Some(TableId::MethodDef),
                Some(TableId::TypeSpec),
            ],
            CodedIndexType::HasSemantics => &[Some(TableId::Event), Some(TableId::Property)],
            CodedIndexType::MethodDefOrRef => &[Some(TableId::MethodDef), Some(TableId::MemberRef)],
            CodedIndexType::MemberForwarded => &[Some(TableId::Field), Some(TableId::MethodDef)],
            CodedIndexType::Implementation => &[
                Some(TableId::File),
                Some(TableId::AssemblyRef),
                Some(TableId::ExportedType),
            ],
            CodedIndexType::CustomAttributeType => &[
                None,
                None,
                Some(TableId::MethodDef),
                Some(TableId::MemberRef),
                None,
            ],
            CodedIndexType::ResolutionScope => &[
                Some(TableId::Module),
                Some(TableId::ModuleRef),
                Some(TableId::AssemblyRef),
                Some(TableId::TypeRef),
            ],
            CodedIndexType::TypeOrMethodDef => &[Some(TableId::TypeDef), Some(TableId::MethodDef)],
            CodedIndexType::HasCustomDebugInformation => &HAS_CUSTOM_DEBUG_INFORMATION,
        }
    }

    /// The tables this kind can reference
    pub fn tables(&self) -> impl Iterator<Item = TableId> {
        self.slots().iter().flatten().copied()
    }

    /// Number of low bits that hold the tag: `ceil(log2(slots))`
    #[must_use]
    pub fn tag_bits(&self) -> u32 {
        let slots = self.slots().len() as u32;
        u32::BITS - (slots - 1).leading_zeros()
    }

    /// Rows at or above this count force the 4-byte encoding: `2^(16 - tag_bits)`
    #[must_use]
    pub fn large_threshold(&self) -> u32 {
        1 << (16 - self.tag_bits())
    }

    /// The tag used for `table`, or `None` if this kind cannot reference it
    #[must_use]
    pub fn tag_of(&self, table: TableId) -> Option<u32> {
        self.slots()
            .iter()
            .position(|slot| *slot == Some(table))
            .map(|tag| tag as u32)
    }

    /// Pack a token into its coded form.
    ///
    /// A null token of a table outside this kind packs to 0.
    ///
    /// # Errors
    /// Returns [`Error::UnresolvedPseudoToken`] for pseudo-tokens and [`Error::InvalidToken`] for a
    /// table this kind cannot reference.
    pub fn encode(&self, token: Token) -> Result<u32> {
        if token.is_pseudo() {
            return Err(Error::UnresolvedPseudoToken(token));
        }

        let Some(tag) = token.table_id().and_then(|table| self.tag_of(table)) else {
            if token.is_null() {
                return Ok(0);
            }
            return Err(Error::InvalidToken(token));
        };

        let max_row = u32::MAX >> self.tag_bits();
        if token.row() > max_row {
            return Err(limit_error!("coded index row", token.row(), max_row));
        }

        Ok((token.row() << self.tag_bits()) | tag)
    }

    /// Unpack a coded value into a token.
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] for a reserved or out-of-range tag, or a row that does not fit
    /// into a token.
    pub fn decode(&self, value: u32) -> Result<Token> {
        let tag_bits = self.tag_bits();
        let tag = (value & ((1 << tag_bits) - 1)) as usize;
        let row = value >> tag_bits;

        let Some(Some(table)) = self.slots().get(tag) else {
            return Err(malformed_error!(
                "Invalid tag {} for coded index {:?} - 0x{:X}",
                tag,
                self,
                value
            ));
        };
        if row > 0x00FF_FFFF {
            return Err(malformed_error!("Coded index row {} exceeds token range", row));
        }

        Ok(Token::from_parts(*table, row))
    }
}

/// A decoded coded index: the referenced table and 1-based row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CodedIndex {
    /// The table being referenced
    pub tag: TableId,
    /// The 1-based row, 0 for a null reference
    pub row: u32,
}

impl CodedIndex {
    /// Create a new coded index
    #[must_use]
    pub fn new(tag: TableId, row: u32) -> Self {
        CodedIndex { tag, row }
    }

    /// The token of the referenced row, `None` for a null reference
    #[must_use]
    pub fn token(&self) -> Option<Token> {
        if self.row == 0 {
            None
        } else {
            Some(Token::from_parts(self.tag, self.row))
        }
    }
}

impl TryFrom<Token> for CodedIndex {
    type Error = Error;

    fn try_from(token: Token) -> Result<Self> {
        match token.table_id() {
            Some(tag) => Ok(CodedIndex::new(tag, token.row())),
            None => Err(Error::InvalidToken(token)),
        }
    }
}
