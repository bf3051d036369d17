//! Table identifiers, column layouts and the width decisions that depend on row counts.

mod codedindex;
mod schema;
mod tableid;
mod tableinfo;

pub use codedindex::{CodedIndex, CodedIndexType, CodedIndexTypeIter};
pub use schema::{
    field, genericparam, interfaceimpl, membermap, methoddef, module, param, property, typedef,
    typeref, Column, ColumnKind, SortKey,
};
pub use tableid::{TableId, TableIdIter, TABLE_SLOTS};
pub use tableinfo::{HeapSizes, TableInfo, TableRowInfo};
