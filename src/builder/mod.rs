//! Building new metadata.
//!
//! A [`MetadataBuilder`] is one build session. Everything that has to be unique per build lives on
//! it: the open heaps and tables, the pseudo-token allocator and, at finalize, the [`TokenMap`].
//! Independent sessions can run on different threads at the same time.
//!
//! Rows that move before the image is written (members, which must be contiguous per owner, and
//! rows of sorted tables) are named by pseudo-tokens until [`MetadataBuilder::finalize`] places
//! them. Finalize replaces every pseudo-token in the tables and fails with
//! [`crate::Error::UnresolvedPseudoToken`] if one of them was never given a row. Signature blobs
//! only ever hold final tokens: the types they reference are defined with final tokens.
//!
//! A Portable PDB for the build is written afterwards by [`PortablePdbBuilder`], which translates
//! its method keys through the build's [`TokenMap`].

mod pdb;
mod session;
mod tokens;

pub use pdb::{
    decode_document_name, encode_document_name, DocumentHashAlgorithm, PortablePdbBuilder,
    LANGUAGE_CSHARP, LANGUAGE_FSHARP, LANGUAGE_VISUAL_BASIC,
};
pub use session::{BuilderOptions, FinishedMetadata, MetadataBuilder};
pub use tokens::{PseudoTokens, TokenMap};
