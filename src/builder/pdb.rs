//! Portable PDB images for a finished build.
//!
//! The debug image is a metadata blob of its own: a `#Pdb` stream naming the type-system row
//! counts of the build it describes, plus the debug tables. Method rows are keyed by the tokens the
//! build handed out, pseudo or final, and translated through the build's [`TokenMap`] when the
//! image is written.
//!
//! [`TokenMap`]: crate::builder::TokenMap

use md5::Md5;
use sha1::{Digest, Sha1};

use crate::{
    builder::session::FinishedMetadata,
    file::{parser::Parser, writer::ByteWriter},
    metadata::{
        sequencepoints::SequencePoints,
        streams::{Blob, BlobHeapBuilder, PdbStream},
        tables::TableId,
        token::Token,
        writer::{MetadataWriter, WriterOptions},
    },
    Error, Result,
};

/// `Document.Language` of C# sources
pub const LANGUAGE_CSHARP: uguid::Guid = uguid::guid!("3f5162f8-07c6-11d3-9053-00c04fa302a1");
/// `Document.Language` of Visual Basic sources
pub const LANGUAGE_VISUAL_BASIC: uguid::Guid = uguid::guid!("3a12d0b8-c26c-11d0-b442-00a0244a1dd2");
/// `Document.Language` of F# sources
pub const LANGUAGE_FSHARP: uguid::Guid = uguid::guid!("ab4f38c9-b6e6-43ba-be3b-58080b2ccce3");

/// Algorithm of a `Document.Hash`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DocumentHashAlgorithm {
    /// SHA-1
    Sha1,
    /// MD5
    Md5,
}

impl DocumentHashAlgorithm {
    /// The `Document.HashAlgorithm` GUID
    #[must_use]
    pub fn guid(self) -> uguid::Guid {
        match self {
            DocumentHashAlgorithm::Sha1 => uguid::guid!("ff1816ec-aa5e-4d10-87f7-6f4963833460"),
            DocumentHashAlgorithm::Md5 => uguid::guid!("406ea660-64cf-4c82-b6f0-42d48172a799"),
        }
    }

    /// Hash `content`
    #[must_use]
    pub fn hash(self, content: &[u8]) -> Vec<u8> {
        match self {
            DocumentHashAlgorithm::Sha1 => Sha1::digest(content).to_vec(),
            DocumentHashAlgorithm::Md5 => Md5::digest(content).to_vec(),
        }
    }
}

/// Encode a document name: the separator, then the `#Blob` index of every part.
///
/// The separator is whichever of `/` and `\` comes first in `name`; a name with neither is one
/// part behind a 0 separator.
///
/// # Errors
/// Returns [`Error::LimitExceeded`] once the heap is full.
pub fn encode_document_name(name: &str, blobs: &mut BlobHeapBuilder) -> Result<Vec<u8>> {
    let mut writer = ByteWriter::new();
    match name.chars().find(|c| *c == '/' || *c == '\\') {
        Some(separator) => {
            writer.write_le(separator as u8);
            for part in name.split(separator) {
                writer.write_compressed_uint(blobs.add(part.as_bytes())?)?;
            }
        }
        None => {
            writer.write_le(0u8);
            writer.write_compressed_uint(blobs.add(name.as_bytes())?)?;
        }
    }
    Ok(writer.into_inner())
}

/// Decode a document name blob against the image's `#Blob` heap.
///
/// # Errors
/// Returns an error if the blob is truncated or a part is not UTF-8.
pub fn decode_document_name(blob: &[u8], blobs: &Blob<'_>) -> Result<String> {
    let mut parser = Parser::new(blob);
    let separator = parser.read_le::<u8>()?;

    let mut name = String::new();
    let mut first = true;
    while parser.has_more_data() {
        if !first && separator != 0 {
            name.push(char::from(separator));
        }
        first = false;

        let part = blobs.get(parser.read_compressed_uint()? as usize)?;
        let Ok(part) = std::str::from_utf8(part) else {
            return Err(malformed_error!("Document name part is not valid UTF-8"));
        };
        name.push_str(part);
    }
    Ok(name)
}

/// Debug information for the methods of one build.
#[derive(Debug)]
pub struct PortablePdbBuilder {
    writer: MetadataWriter,
    methods: Vec<(Token, SequencePoints)>,
    entry_point: Option<Token>,
}

impl PortablePdbBuilder {
    /// An empty debug image
    #[must_use]
    pub fn new(options: WriterOptions) -> Self {
        PortablePdbBuilder {
            writer: MetadataWriter::new(options),
            methods: Vec::new(),
            entry_point: None,
        }
    }

    /// Define a source document, hashed with `hash` if given.
    ///
    /// # Errors
    /// Returns an error if a heap or the table is full.
    pub fn define_document(
        &mut self,
        name: &str,
        language: uguid::Guid,
        hash: Option<(DocumentHashAlgorithm, &[u8])>,
    ) -> Result<Token> {
        let name = encode_document_name(name, self.writer.blobs_mut())?;
        let name = self.writer.blobs_mut().add(&name)?;
        let (algorithm, hash) = match hash {
            Some((algorithm, content)) => {
                let algorithm_index = self.writer.guids_mut().add(algorithm.guid())?;
                let digest = algorithm.hash(content);
                (algorithm_index, self.writer.blobs_mut().add(&digest)?)
            }
            None => (0, 0),
        };
        let language = self.writer.guids_mut().add(language)?;

        let rid = self
            .writer
            .table_mut(TableId::Document)
            .push(&[name, algorithm, hash, language])?;
        Ok(Token::from_parts(TableId::Document, rid))
    }

    /// Attach sequence points to `method`, a pseudo or final MethodDef token of the build. The
    /// points name documents by their row.
    ///
    /// # Errors
    /// Returns [`Error::InvalidToken`] for a token of another table or an unknown document.
    pub fn define_method_debug_info(&mut self, method: Token, points: SequencePoints) -> Result<()> {
        if !method.is_pseudo() && method.table_id() != Some(TableId::MethodDef) {
            return Err(Error::InvalidToken(method));
        }
        let documents = self.writer.table(TableId::Document).map_or(0, |table| table.row_count());
        if let Some(point) = points.points.iter().find(|point| point.document == 0 || point.document > documents) {
            return Err(Error::InvalidToken(Token::from_parts(TableId::Document, point.document)));
        }

        self.methods.push((method, points));
        Ok(())
    }

    /// Set the entry point recorded in `#Pdb`
    pub fn set_entry_point(&mut self, method: Token) {
        self.entry_point = Some(method);
    }

    /// Write the debug image for `metadata`, identified by the SHA-1 of the metadata blob.
    ///
    /// # Errors
    /// See [`PortablePdbBuilder::build_with_id`].
    pub fn build(self, metadata: &FinishedMetadata) -> Result<Vec<u8>> {
        let mut id = [0u8; 20];
        id.copy_from_slice(&Sha1::digest(metadata.data()));
        self.build_with_id(metadata, id)
    }

    /// Write the debug image for `metadata` with the PDB id `id`.
    ///
    /// # Errors
    /// Returns an error if the build did not keep its row counts, a method token does not
    /// resolve, a method has debug information twice or a sequence point blob cannot be encoded.
    pub fn build_with_id(mut self, metadata: &FinishedMetadata, id: [u8; 20]) -> Result<Vec<u8>> {
        let Some(row_counts) = metadata.row_counts() else {
            return Err(malformed_error!("The build did not keep its row counts"));
        };
        let methods = row_counts[TableId::MethodDef as usize];

        let mut rows: Vec<Option<SequencePoints>> = vec![None; methods as usize];
        for (method, points) in std::mem::take(&mut self.methods) {
            let method = metadata.resolve(method)?;
            if method.table_id() != Some(TableId::MethodDef) || method.is_null() || method.row() > methods {
                return Err(Error::InvalidToken(method));
            }
            let slot = &mut rows[method.row() as usize - 1];
            if slot.is_some() {
                return Err(Error::DuplicateFixup(method));
            }
            *slot = Some(points);
        }

        for points in rows {
            let cells = match points {
                Some(points) => {
                    let document = points.single_document();
                    let blob = points.encode(document)?;
                    [document.unwrap_or(0), self.writer.blobs_mut().add(&blob)?]
                }
                None => [0, 0],
            };
            self.writer.table_mut(TableId::MethodDebugInformation).push(&cells)?;
        }

        let entry_point = self
            .entry_point
            .map(|method| metadata.resolve(method))
            .transpose()?
            .unwrap_or_default();
        log::debug!(
            "debug image for {} methods, entry point {}",
            methods,
            entry_point
        );

        self.writer.set_pdb(PdbStream::new(id, entry_point, row_counts));
        self.writer.write()
    }
}
