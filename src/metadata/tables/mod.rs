//! Metadata tables.
//!
//! Every table is a homogeneous array of fixed-shape rows. The shape comes from the column schema
//! in [`TableId::columns`]; the byte width of each column is decided by [`TableInfo`] once all row
//! counts are known. Rows are kept as decoded `u32` cells so one generic implementation serves all
//! tables:
//!
//! - [`MetadataTable`] - a frozen table, shared read-only between threads
//! - [`TableBuilder`] - an open table, appended to while building and frozen once
//!
//! Row indexes are 1-based, index 0 is the null reference.

mod builder;
mod flags;
mod table;
mod types;

pub use builder::{TableBuilder, MAX_TABLE_ROWS};
pub use flags::{
    EventAttributes, FieldAttributes, GenericParamAttributes, MethodAttributes,
    MethodImplAttributes, MethodSemanticsAttributes, ParamAttributes, PropertyAttributes,
    TypeAttributes,
};
pub use table::{MetadataTable, RowRef};
pub use types::*;
