//! The reader side: a whole metadata blob decoded into its root, heaps and tables.
//!
//! [`MetadataImage`] borrows the input bytes. Heaps stay zero-copy views; tables are decoded into
//! cells once. After [`MetadataImage::read`] nothing mutates, so an image can be shared between
//! threads freely.
//!
//! # Examples
//!
//! ```rust,no_run
//! use cilmeta::{File, metadata::{image::MetadataImage, tables::TableId}};
//!
//! let file = File::from_file("metadata.bin".as_ref())?;
//! let image = MetadataImage::read(file.data())?;
//! for row in image.table(TableId::TypeDef).into_iter().flat_map(|table| table.iter()) {
//!     println!("{}", image.type_name(row.token())?);
//! }
//! # Ok::<(), cilmeta::Error>(())
//! ```

use crate::{
    file::writer::ByteWriter,
    metadata::{
        root::Root,
        signatures::{
            parse_field_signature, parse_method_signature, parse_property_signature,
            CustomModifiers, ModifierProjection, SignatureField, SignatureMethod,
            SignatureProperty,
        },
        streams::{Blob, Guid, PdbStream, StreamHeader, Strings, TablesStream, UserStrings},
        tables::{field, methoddef, property, typedef, typeref, MetadataTable, RowRef, TableId},
        token::Token,
    },
    Result,
};

/// Name substituted for an empty type name by the lenient reader
pub const EMPTY_NAME: &str = "<empty>";

/// Reader configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Accept the known producer quirks instead of rejecting them
    pub lenient: bool,
    /// Order of required/optional modifier groups
    pub modifier_projection: ModifierProjection,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        ReaderOptions {
            lenient: true,
            modifier_projection: ModifierProjection::Reversed,
        }
    }
}

impl ReaderOptions {
    /// Strict reading: every quirk is an error
    #[must_use]
    pub fn strict() -> Self {
        ReaderOptions {
            lenient: false,
            ..ReaderOptions::default()
        }
    }

    /// Set quirk handling
    #[must_use]
    pub fn with_lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    /// Set the modifier projection
    #[must_use]
    pub fn with_modifier_projection(mut self, projection: ModifierProjection) -> Self {
        self.modifier_projection = projection;
        self
    }
}

/// A decoded metadata blob
#[derive(Debug)]
pub struct MetadataImage<'a> {
    data: &'a [u8],
    options: ReaderOptions,
    root: Root,
    tables_stream: String,
    tables: TablesStream,
    strings: Option<Strings<'a>>,
    user_strings: Option<UserStrings<'a>>,
    guids: Option<Guid<'a>>,
    blobs: Option<Blob<'a>>,
    pdb: Option<PdbStream>,
}

impl<'a> MetadataImage<'a> {
    /// Decode `data` with the default, lenient options.
    ///
    /// # Errors
    /// Returns a format error if any part of the metadata is malformed.
    pub fn read(data: &'a [u8]) -> Result<MetadataImage<'a>> {
        Self::read_with_options(data, ReaderOptions::default())
    }

    /// Decode `data`.
    ///
    /// # Errors
    /// Returns a format error if any part of the metadata is malformed, or if a quirk is found
    /// while reading strictly.
    pub fn read_with_options(data: &'a [u8], options: ReaderOptions) -> Result<MetadataImage<'a>> {
        let root = Root::read(data, options.lenient)?;

        let mut tables_stream = None;
        let mut strings = None;
        let mut user_strings = None;
        let mut guids = None;
        let mut blobs = None;
        let mut pdb = None;

        for header in &root.stream_headers {
            let stream_data = stream_slice(data, header)?;
            match header.name.as_str() {
                "#~" => tables_stream = Some((header.name.clone(), stream_data)),
                "#-" => {
                    if !options.lenient {
                        return Err(malformed_error!("Uncompressed tables stream '#-'"));
                    }
                    log::warn!("reading uncompressed tables stream '#-' like '#~'");
                    tables_stream = Some((header.name.clone(), stream_data));
                }
                "#Strings" => {
                    strings = Some(if options.lenient {
                        Strings::from_lenient(stream_data)?
                    } else {
                        Strings::from(stream_data)?
                    });
                }
                "#US" => user_strings = Some(UserStrings::from(stream_data)?),
                "#GUID" => guids = Some(Guid::from(stream_data)?),
                "#Blob" => blobs = Some(Blob::from(stream_data)?),
                "#Pdb" => pdb = Some(PdbStream::read(stream_data)?),
                other => log::debug!("skipping unknown stream {}", other),
            }
        }

        let Some((tables_stream, tables_data)) = tables_stream else {
            return Err(malformed_error!("Metadata has no tables stream"));
        };
        let tables = TablesStream::read(tables_data, pdb.as_ref().map(|pdb| &pdb.row_counts))?;

        log::debug!(
            "read metadata {}: {} streams, {} tables",
            root.version,
            root.stream_headers.len(),
            tables.table_count()
        );

        Ok(MetadataImage {
            data,
            options,
            root,
            tables_stream,
            tables,
            strings,
            user_strings,
            guids,
            blobs,
            pdb,
        })
    }

    /// The options this image was read with
    #[must_use]
    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// The input bytes
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// The metadata root and stream directory
    #[must_use]
    pub fn root(&self) -> &Root {
        &self.root
    }

    /// The tables stream
    #[must_use]
    pub fn tables(&self) -> &TablesStream {
        &self.tables
    }

    /// Table `id`, if present
    #[must_use]
    pub fn table(&self, id: TableId) -> Option<&MetadataTable> {
        self.tables.table(id)
    }

    /// `#Strings`
    #[must_use]
    pub fn strings(&self) -> Option<&Strings<'a>> {
        self.strings.as_ref()
    }

    /// `#US`
    #[must_use]
    pub fn user_strings(&self) -> Option<&UserStrings<'a>> {
        self.user_strings.as_ref()
    }

    /// `#GUID`
    #[must_use]
    pub fn guids(&self) -> Option<&Guid<'a>> {
        self.guids.as_ref()
    }

    /// `#Blob`
    #[must_use]
    pub fn blobs(&self) -> Option<&Blob<'a>> {
        self.blobs.as_ref()
    }

    /// `#Pdb`, present in Portable PDB images
    #[must_use]
    pub fn pdb(&self) -> Option<&PdbStream> {
        self.pdb.as_ref()
    }

    /// Raw bytes of stream `name`
    #[must_use]
    pub fn stream_data(&self, name: &str) -> Option<&'a [u8]> {
        self.root
            .stream(name)
            .and_then(|header| stream_slice(self.data, header).ok())
    }

    /// The string at `index` of `#Strings`.
    ///
    /// # Errors
    /// Returns an error if the image has no `#Strings` heap or the offset is invalid.
    pub fn string(&self, index: u32) -> Result<&str> {
        match &self.strings {
            Some(strings) => strings.get(index as usize),
            None if index == 0 => Ok(""),
            None => Err(malformed_error!("Metadata has no #Strings heap")),
        }
    }

    /// The blob at `index` of `#Blob`.
    ///
    /// # Errors
    /// Returns an error if the image has no `#Blob` heap or the offset is invalid.
    pub fn blob(&self, index: u32) -> Result<&[u8]> {
        match &self.blobs {
            Some(blobs) => blobs.get(index as usize),
            None if index == 0 => Ok(&[]),
            None => Err(malformed_error!("Metadata has no #Blob heap")),
        }
    }

    fn row(&self, token: Token) -> Result<RowRef<'_>> {
        token
            .table_id()
            .and_then(|id| self.table(id))
            .and_then(|table| table.get(token.row()))
            .ok_or(crate::Error::InvalidToken(token))
    }

    /// The qualified name of a TypeDef or TypeRef, `Namespace.Name`.
    ///
    /// An empty name reads as [`EMPTY_NAME`] when reading leniently.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidToken`] for other tokens or missing rows, and a format error
    /// for an empty name when reading strictly.
    pub fn type_name(&self, token: Token) -> Result<String> {
        let (name_column, namespace_column) = match token.table_id() {
            Some(TableId::TypeDef) => (typedef::NAME, typedef::NAMESPACE),
            Some(TableId::TypeRef) => (typeref::NAME, typeref::NAMESPACE),
            _ => return Err(crate::Error::InvalidToken(token)),
        };

        let row = self.row(token)?;
        let mut name = self.string(row.get(name_column))?;
        if name.is_empty() {
            if !self.options.lenient {
                return Err(malformed_error!("Type {} has an empty name", token));
            }
            log::warn!("type {} has an empty name, reading it as {}", token, EMPTY_NAME);
            name = EMPTY_NAME;
        }

        let namespace = self.string(row.get(namespace_column))?;
        if namespace.is_empty() {
            Ok(name.to_string())
        } else {
            Ok(format!("{}.{}", namespace, name))
        }
    }

    /// The signature of MethodDef row `token`.
    ///
    /// # Errors
    /// Returns an error for a missing row or a malformed signature.
    pub fn method_signature(&self, token: Token) -> Result<SignatureMethod> {
        if token.table_id() != Some(TableId::MethodDef) {
            return Err(crate::Error::InvalidToken(token));
        }
        let row = self.row(token)?;
        parse_method_signature(self.blob(row.get(methoddef::SIGNATURE))?)
    }

    /// The signature of Field row `token`.
    ///
    /// # Errors
    /// Returns an error for a missing row or a malformed signature.
    pub fn field_signature(&self, token: Token) -> Result<SignatureField> {
        if token.table_id() != Some(TableId::Field) {
            return Err(crate::Error::InvalidToken(token));
        }
        let row = self.row(token)?;
        parse_field_signature(self.blob(row.get(field::SIGNATURE))?)
    }

    /// The signature of Property row `token`.
    ///
    /// # Errors
    /// Returns an error for a missing row or a malformed signature.
    pub fn property_signature(&self, token: Token) -> Result<SignatureProperty> {
        if token.table_id() != Some(TableId::Property) {
            return Err(crate::Error::InvalidToken(token));
        }
        let row = self.row(token)?;
        parse_property_signature(self.blob(row.get(property::SIGNATURE))?)
    }

    /// The required modifiers of `modifiers`, ordered by this image's projection
    #[must_use]
    pub fn required_modifiers(&self, modifiers: &CustomModifiers) -> Vec<Token> {
        modifiers.required(self.options.modifier_projection)
    }

    /// The optional modifiers of `modifiers`, ordered by this image's projection
    #[must_use]
    pub fn optional_modifiers(&self, modifiers: &CustomModifiers) -> Vec<Token> {
        modifiers.optional(self.options.modifier_projection)
    }

    /// Re-emit the image with its original layout.
    ///
    /// The root and the tables stream are encoded from their decoded form, the heaps and any
    /// other bytes are copied. Without modification the result equals the input.
    ///
    /// # Errors
    /// Returns an error if the re-encoded tables stream no longer fits its slot.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = ByteWriter::with_capacity(self.data.len());
        self.root.write(&mut writer)?;

        let mut headers: Vec<&StreamHeader> = self.root.stream_headers.iter().collect();
        headers.sort_by_key(|header| header.offset);

        for header in headers {
            let start = header.offset as usize;
            if start < writer.pos() {
                return Err(malformed_error!("Stream {} overlaps the previous one", header.name));
            }
            writer.write_bytes(&self.data[writer.pos()..start]);

            if header.name == self.tables_stream {
                let tables = self.tables.to_bytes()?;
                if tables.len() != header.size as usize {
                    return Err(malformed_error!(
                        "Re-encoded tables stream is {} bytes, slot holds {}",
                        tables.len(),
                        header.size
                    ));
                }
                writer.write_bytes(&tables);
            } else {
                writer.write_bytes(stream_slice(self.data, header)?);
            }
        }

        if writer.pos() < self.data.len() {
            writer.write_bytes(&self.data[writer.pos()..]);
        }
        Ok(writer.into_inner())
    }
}

fn stream_slice<'a>(data: &'a [u8], header: &StreamHeader) -> Result<&'a [u8]> {
    let start = header.offset as usize;
    let end = start.saturating_add(header.size as usize);
    data.get(start..end).ok_or_else(|| out_of_bounds_error!())
}
