//! Metadata streams.
//!
//! The metadata root is followed by named streams:
//!
//! - **`#~`** / **`#-`** - the tables stream ([`TablesStream`])
//! - **`#Strings`** - UTF-8 identifiers ([`Strings`])
//! - **`#US`** - UTF-16 string literals ([`UserStrings`])
//! - **`#GUID`** - 16-byte GUIDs ([`Guid`])
//! - **`#Blob`** - signatures and other binary values ([`Blob`])
//! - **`#Pdb`** - Portable PDB identity and external row counts ([`PdbStream`])
//!
//! Each heap has a frozen, read-only type and an open builder. A builder's `freeze` consumes it and
//! returns the frozen type, so adding to a frozen heap does not compile.
//!
//! # References
//!
//! - ECMA-335 6th Edition, Partition II, Section 24.2.2 - Stream Headers
//! - ECMA-335 6th Edition, Partition II, Section 22 - Metadata Tables

mod blob;
mod guid;
mod pdb;
mod streamheader;
mod strings;
mod tablesheader;
mod userstrings;

pub use blob::{Blob, BlobHeapBuilder, MAX_BLOB_HEAP_SIZE};
pub use guid::{Guid, GuidHeapBuilder};
pub use pdb::PdbStream;
pub use streamheader::{StreamHeader, KNOWN_STREAMS};
pub use strings::{StringHeapBuilder, Strings, MAX_STRING_HEAP_SIZE};
pub use tablesheader::{sorted_tables_bitmap, TablesHeader, TablesStream};
pub use userstrings::{
    user_string_marker, UserString, UserStringHeapBuilder, UserStrings, MAX_USER_STRING_HEAP_SIZE,
};
