//! # cilmeta Prelude
//!
//! The types most programs that read, build or write metadata need, for glob import.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all cilmeta operations
pub use crate::Error;

/// The result type used throughout cilmeta
pub use crate::Result;

/// Byte sources and cursors
pub use crate::{ByteWriter, File, Parser};

// ================================================================================================
// Reading and Writing
// ================================================================================================

/// The reader orchestrator and its options
pub use crate::metadata::image::{MetadataImage, ReaderOptions};

/// The writer orchestrator and its options
pub use crate::metadata::writer::{MetadataWriter, WriterOptions};

/// The CLI header
pub use crate::metadata::cor20header::Cor20Header;

/// The metadata root
pub use crate::metadata::root::Root;

// ================================================================================================
// Building
// ================================================================================================

/// A build session and its result
pub use crate::builder::{BuilderOptions, FinishedMetadata, MetadataBuilder, TokenMap};

/// Portable PDB construction
pub use crate::builder::{DocumentHashAlgorithm, PortablePdbBuilder};

/// Overload resolution
pub use crate::binder::{Binder, MethodCandidate, PropertyCandidate, TypeHierarchy};

// ================================================================================================
// Tokens, Tables and Heaps
// ================================================================================================

/// Metadata tokens
pub use crate::metadata::token::Token;

/// Table identifiers, tables and table builders
pub use crate::metadata::tables::{
    CodedIndexType, HeapSizes, MetadataTable, RowRef, TableBuilder, TableId,
};

/// Attribute flag sets
pub use crate::metadata::tables::{
    EventAttributes, FieldAttributes, GenericParamAttributes, MethodAttributes,
    MethodImplAttributes, MethodSemanticsAttributes, ParamAttributes, PropertyAttributes,
    TypeAttributes,
};

/// Heaps, frozen and open
pub use crate::metadata::streams::{
    Blob, BlobHeapBuilder, Guid, GuidHeapBuilder, StringHeapBuilder, Strings, TablesStream,
    UserStringHeapBuilder, UserStrings,
};

// ================================================================================================
// Signatures
// ================================================================================================

/// Signature model
pub use crate::metadata::signatures::{
    CustomModifiers, ModifierProjection, SignatureField, SignatureLocalVariables,
    SignatureMethod, SignatureMethodSpec, SignatureParameter, SignatureProperty,
    SignatureTypeSpec, StandAloneSignature, TypeSignature,
};

/// Sequence points
pub use crate::metadata::sequencepoints::{SequencePoint, SequencePoints};
