//! The metadata root (ECMA-335 II.24.2.1): signature, versions, runtime version string and the
//! stream directory.
//!
//! The version string is kept as its raw, padded bytes so a root is written back exactly as read.

use crate::{
    file::{io::read_le_at, writer::ByteWriter},
    metadata::streams::StreamHeader,
    Result,
};

/// Signature of the metadata root, `BSJB`
pub const CIL_HEADER_MAGIC: u32 = 0x424A_5342;

/// Longest version string, padding included
pub const MAX_VERSION_LENGTH: u32 = 255;

/// The metadata root
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Root {
    /// Magic signature, 0x424A5342
    pub signature: u32,
    /// Major version, 1
    pub major_version: u16,
    /// Minor version, 1
    pub minor_version: u16,
    /// Reserved, always 0
    pub reserved: u32,
    /// The version string without its NUL padding
    pub version: String,
    /// The version string bytes exactly as stored, padding included
    pub version_raw: Vec<u8>,
    /// Reserved flags
    pub flags: u16,
    /// The stream directory
    pub stream_headers: Vec<StreamHeader>,
}

impl Root {
    /// A new root for `version`; the stream directory is filled in by the writer
    #[must_use]
    pub fn new(version: &str, major_version: u16, minor_version: u16) -> Self {
        let mut version_raw = version.as_bytes().to_vec();
        version_raw.push(0);
        while version_raw.len() % 4 != 0 {
            version_raw.push(0);
        }

        Root {
            signature: CIL_HEADER_MAGIC,
            major_version,
            minor_version,
            reserved: 0,
            version: version.to_string(),
            version_raw,
            flags: 0,
            stream_headers: Vec::new(),
        }
    }

    /// Parse the root and its stream directory.
    ///
    /// With `lenient`, a stream count larger than the headers that fit in `data` is capped
    /// instead of rejected.
    ///
    /// # Errors
    /// Returns an error for a bad signature, a truncated root or a stream that lies outside `data`.
    pub fn read(data: &[u8], lenient: bool) -> Result<Root> {
        if data.len() < 20 {
            return Err(out_of_bounds_error!());
        }

        let mut offset = 0;
        let signature = read_le_at::<u32>(data, &mut offset)?;
        if signature != CIL_HEADER_MAGIC {
            return Err(malformed_error!(
                "CIL_HEADER_MAGIC does not match - 0x{:08X}",
                signature
            ));
        }

        let major_version = read_le_at::<u16>(data, &mut offset)?;
        let minor_version = read_le_at::<u16>(data, &mut offset)?;
        let reserved = read_le_at::<u32>(data, &mut offset)?;
        let version_length = read_le_at::<u32>(data, &mut offset)?;
        if version_length > MAX_VERSION_LENGTH {
            return Err(malformed_error!("Version string length {} is too long", version_length));
        }

        let version_end = offset + version_length as usize;
        if version_end > data.len() {
            return Err(out_of_bounds_error!());
        }
        let version_raw = data[offset..version_end].to_vec();
        let text_end = version_raw
            .iter()
            .position(|byte| *byte == 0)
            .unwrap_or(version_raw.len());
        let version = String::from_utf8_lossy(&version_raw[..text_end]).into_owned();
        offset = version_end;

        let flags = read_le_at::<u16>(data, &mut offset)?;
        let stream_count = read_le_at::<u16>(data, &mut offset)?;
        if stream_count == 0 {
            return Err(malformed_error!("Metadata root declares no streams"));
        }

        let mut stream_headers = Vec::with_capacity(usize::from(stream_count));
        for index in 0..stream_count {
            let header = match StreamHeader::from(data.get(offset..).unwrap_or_default()) {
                Ok((header, consumed)) => {
                    offset += consumed;
                    header
                }
                Err(_) if lenient && index > 0 => {
                    log::warn!(
                        "metadata root declares {} streams, only {} are present",
                        stream_count,
                        index
                    );
                    break;
                }
                Err(error) => return Err(error),
            };

            match header.offset.checked_add(header.size) {
                Some(end) if end as usize <= data.len() => {}
                Some(_) => return Err(out_of_bounds_error!()),
                None => {
                    return Err(malformed_error!(
                        "Stream offset and size cause integer overflow - {} + {}",
                        header.offset,
                        header.size
                    ))
                }
            }

            if stream_headers
                .iter()
                .any(|existing: &StreamHeader| existing.name == header.name)
            {
                return Err(malformed_error!("Duplicate stream {}", header.name));
            }
            stream_headers.push(header);
        }

        Ok(Root {
            signature,
            major_version,
            minor_version,
            reserved,
            version,
            version_raw,
            flags,
            stream_headers,
        })
    }

    /// Bytes occupied by the root and its stream directory
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        20 + self.version_raw.len()
            + self
                .stream_headers
                .iter()
                .map(StreamHeader::encoded_size)
                .sum::<usize>()
    }

    /// Append the root and its stream directory to `writer`.
    ///
    /// # Errors
    /// Returns [`crate::Error::LimitExceeded`] if there are more streams than the count field holds.
    pub fn write(&self, writer: &mut ByteWriter) -> Result<()> {
        let Ok(stream_count) = u16::try_from(self.stream_headers.len()) else {
            return Err(limit_error!("stream count", self.stream_headers.len(), u16::MAX));
        };

        writer.write_le(self.signature);
        writer.write_le(self.major_version);
        writer.write_le(self.minor_version);
        writer.write_le(self.reserved);
        writer.write_le(self.version_raw.len() as u32);
        writer.write_bytes(&self.version_raw);
        writer.write_le(self.flags);
        writer.write_le(stream_count);
        for header in &self.stream_headers {
            header.write(writer);
        }

        Ok(())
    }

    /// The directory entry of stream `name`
    #[must_use]
    pub fn stream(&self, name: &str) -> Option<&StreamHeader> {
        self.stream_headers.iter().find(|header| header.name == name)
    }
}
