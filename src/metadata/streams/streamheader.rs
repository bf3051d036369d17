use crate::{
    file::{io::read_le_at, writer::ByteWriter},
    Result,
};

/// Stream names this crate knows how to decode
pub const KNOWN_STREAMS: [&str; 7] = ["#~", "#-", "#Strings", "#US", "#GUID", "#Blob", "#Pdb"];

/// Entry of the stream directory in the metadata root: where a stream lives and what it is called.
///
/// Offsets are relative to the start of the metadata root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamHeader {
    /// Offset of the stream from the metadata root
    pub offset: u32,
    /// Size of the stream in bytes, a multiple of 4 for well-formed images
    pub size: u32,
    /// The stream name, at most 32 characters including the terminator
    pub name: String,
}

impl StreamHeader {
    /// Create a new header
    #[must_use]
    pub fn new(name: &str, offset: u32, size: u32) -> Self {
        StreamHeader {
            offset,
            size,
            name: name.to_string(),
        }
    }

    /// Parse a stream header, returning it with the number of bytes it occupied.
    ///
    /// # Errors
    /// Returns an error if the header is truncated or the name is not terminated within 32 bytes.
    pub fn from(data: &[u8]) -> Result<(StreamHeader, usize)> {
        let mut offset = 0;
        let stream_offset = read_le_at::<u32>(data, &mut offset)?;
        let size = read_le_at::<u32>(data, &mut offset)?;

        let name_bytes = &data[offset..];
        let Some(name_len) = name_bytes.iter().take(32).position(|byte| *byte == 0) else {
            return Err(malformed_error!("Stream header name is not terminated"));
        };
        let Ok(name) = std::str::from_utf8(&name_bytes[..name_len]) else {
            return Err(malformed_error!("Stream header name is not ASCII"));
        };

        let header = StreamHeader {
            offset: stream_offset,
            size,
            name: name.to_string(),
        };
        let consumed = header.encoded_size();
        if consumed > data.len() {
            return Err(out_of_bounds_error!());
        }

        Ok((header, consumed))
    }

    /// Bytes this header occupies: two `u32` and the NUL-terminated name padded to 4
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        8 + ((self.name.len() + 1 + 3) & !3)
    }

    /// Append this header to `writer`
    pub fn write(&self, writer: &mut ByteWriter) {
        writer.write_le(self.offset);
        writer.write_le(self.size);
        writer.write_bytes(self.name.as_bytes());
        writer.write_le(0u8);
        writer.align(4);
    }

    /// `true` if this crate decodes the stream's content
    #[must_use]
    pub fn is_known(&self) -> bool {
        KNOWN_STREAMS.contains(&self.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let header_bytes = [
            0x6C, 0x00, 0x00, 0x00,
            0xA4, 0x45, 0x00, 0x00,
            0x23, 0x7E, 0x00, 0x00,
        ];

        let (parsed_header, consumed) = StreamHeader::from(&header_bytes).unwrap();

        assert_eq!(parsed_header.offset, 0x6C);
        assert_eq!(parsed_header.size, 0x45A4);
        assert_eq!(parsed_header.name, "#~");
        assert_eq!(consumed, 12);
        assert!(parsed_header.is_known());

        let mut writer = ByteWriter::new();
        parsed_header.write(&mut writer);
        assert_eq!(writer.data(), &header_bytes);
    }

    #[test]
    fn padding() {
        // "#Strings\0" needs 9 bytes, padded to 12
        let header = StreamHeader::new("#Strings", 0, 0);
        assert_eq!(header.encoded_size(), 20);
        // "#GUID\0" needs 6 bytes, padded to 8
        assert_eq!(StreamHeader::new("#GUID", 0, 0).encoded_size(), 16);
    }

    #[test]
    fn crafted_invalid() {
        // Name never terminates
        let mut header_bytes = vec![0x6C, 0x00, 0x00, 0x00, 0xA4, 0x45, 0x00, 0x00];
        header_bytes.extend_from_slice(&[b'A'; 40]);
        assert!(StreamHeader::from(&header_bytes).is_err());

        // Padding missing
        let header_bytes = [0x6C, 0x00, 0x00, 0x00, 0xA4, 0x45, 0x00, 0x00, 0x23, 0x7E, 0x00];
        assert!(StreamHeader::from(&header_bytes).is_err());
    }
}
