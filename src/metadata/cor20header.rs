//! The CLI header (`IMAGE_COR20_HEADER`, ECMA-335 II.25.3.3).
//!
//! It is owned by the container layer. The metadata engine only fills in the metadata directory:
//! the container maps the finished metadata bytes, and hands back the RVA, which lands in
//! [`Cor20Header::meta_data_rva`] and nowhere else.

use crate::{
    file::{parser::Parser, writer::ByteWriter},
    metadata::token::Token,
    Result,
};

/// Size of the header in bytes
pub const COR20_HEADER_SIZE: u32 = 72;

/// `COMIMAGE_FLAGS_ILONLY`
pub const COMIMAGE_FLAGS_ILONLY: u32 = 0x0000_0001;

/// The CLI header
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct Cor20Header {
    pub cb: u32,
    pub major_runtime_version: u16,
    pub minor_runtime_version: u16,
    pub meta_data_rva: u32,
    pub meta_data_size: u32,
    pub flags: u32,
    pub entry_point_token: u32,
    pub resource_rva: u32,
    pub resource_size: u32,
    pub strong_name_signature_rva: u32,
    pub strong_name_signature_size: u32,
    pub code_manager_table_rva: u32,
    pub code_manager_table_size: u32,
    pub vtable_fixups_rva: u32,
    pub vtable_fixups_size: u32,
    pub export_address_table_jmp_rva: u32,
    pub export_address_table_jmp_size: u32,
    pub managed_native_header_rva: u32,
    pub managed_native_header_size: u32,
}

impl Cor20Header {
    /// A header describing metadata the container mapped at `rva`, runtime version 2.5, IL only
    #[must_use]
    pub fn for_metadata(rva: u32, size: u32, entry_point: Option<Token>) -> Self {
        Cor20Header {
            cb: COR20_HEADER_SIZE,
            major_runtime_version: 2,
            minor_runtime_version: 5,
            meta_data_rva: rva,
            meta_data_size: size,
            flags: COMIMAGE_FLAGS_ILONLY,
            entry_point_token: entry_point.map_or(0, |token| token.value()),
            ..Cor20Header::default()
        }
    }

    /// Parse the header.
    ///
    /// # Errors
    /// Returns an error if the data is too short, the size field is wrong or the metadata
    /// directory is empty.
    pub fn read(data: &[u8]) -> Result<Cor20Header> {
        if data.len() < COR20_HEADER_SIZE as usize {
            return Err(out_of_bounds_error!());
        }

        let mut parser = Parser::new(data);

        let cb = parser.read_le::<u32>()?;
        if cb != COR20_HEADER_SIZE {
            return Err(malformed_error!(
                "Invalid CLR header size: expected 72, got {}",
                cb
            ));
        }

        let header = Cor20Header {
            cb,
            major_runtime_version: parser.read_le::<u16>()?,
            minor_runtime_version: parser.read_le::<u16>()?,
            meta_data_rva: parser.read_le::<u32>()?,
            meta_data_size: parser.read_le::<u32>()?,
            flags: parser.read_le::<u32>()?,
            entry_point_token: parser.read_le::<u32>()?,
            resource_rva: parser.read_le::<u32>()?,
            resource_size: parser.read_le::<u32>()?,
            strong_name_signature_rva: parser.read_le::<u32>()?,
            strong_name_signature_size: parser.read_le::<u32>()?,
            code_manager_table_rva: parser.read_le::<u32>()?,
            code_manager_table_size: parser.read_le::<u32>()?,
            vtable_fixups_rva: parser.read_le::<u32>()?,
            vtable_fixups_size: parser.read_le::<u32>()?,
            export_address_table_jmp_rva: parser.read_le::<u32>()?,
            export_address_table_jmp_size: parser.read_le::<u32>()?,
            managed_native_header_rva: parser.read_le::<u32>()?,
            managed_native_header_size: parser.read_le::<u32>()?,
        };

        if header.meta_data_rva == 0 || header.meta_data_size == 0 {
            return Err(malformed_error!("Metadata directory is empty"));
        }

        Ok(header)
    }

    /// Append the header to `writer`
    pub fn write(&self, writer: &mut ByteWriter) {
        writer.write_le(self.cb);
        writer.write_le(self.major_runtime_version);
        writer.write_le(self.minor_runtime_version);
        for value in [
            self.meta_data_rva,
            self.meta_data_size,
            self.flags,
            self.entry_point_token,
            self.resource_rva,
            self.resource_size,
            self.strong_name_signature_rva,
            self.strong_name_signature_size,
            self.code_manager_table_rva,
            self.code_manager_table_size,
            self.vtable_fixups_rva,
            self.vtable_fixups_size,
            self.export_address_table_jmp_rva,
            self.export_address_table_jmp_size,
            self.managed_native_header_rva,
            self.managed_native_header_size,
        ] {
            writer.write_le(value);
        }
    }

    /// The entry point token, `None` if the image has none
    #[must_use]
    pub fn entry_point(&self) -> Option<Token> {
        match self.entry_point_token {
            0 => None,
            value => Some(Token::new(value)),
        }
    }
}
