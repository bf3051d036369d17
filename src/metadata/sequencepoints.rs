//! Portable PDB sequence points (the `SequencePoints` blob of `MethodDebugInformation`).
//!
//! The blob maps IL offsets to source spans:
//!
//! - header: `LocalSignature` (StandAloneSig row id), then `InitialDocument` (Document row id),
//!   which is present only when the row's `Document` column is nil
//! - records, each starting with an IL offset delta:
//!   - first record: absolute IL offset; later records: a non-zero delta
//!   - a zero delta in a later record introduces a document record: the Document row id of the
//!     points that follow
//!   - `ΔLines` (unsigned), then `ΔColumns`: unsigned when `ΔLines` is 0, signed otherwise
//!   - `ΔLines == 0 && ΔColumns == 0` marks a hidden point, which has no start position
//!   - otherwise the start line and column: unsigned for the first visible point, then signed
//!     deltas from the previous visible point
//!
//! All integers use the compressed encoding of ECMA-335 II.23.2.

use crate::{
    file::{parser::Parser, writer::ByteWriter},
    Result,
};

/// Line number of a hidden sequence point
pub const HIDDEN_LINE: u32 = 0x00FE_EFEE;

/// One mapping from an IL offset to a source span
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SequencePoint {
    /// IL offset within the method body
    pub il_offset: u32,
    /// Document row id
    pub document: u32,
    /// First line, 1-based
    pub start_line: u32,
    /// First column, 1-based
    pub start_column: u32,
    /// Last line
    pub end_line: u32,
    /// Column after the span
    pub end_column: u32,
}

impl SequencePoint {
    /// A hidden point at `il_offset`
    #[must_use]
    pub fn hidden(il_offset: u32, document: u32) -> Self {
        SequencePoint {
            il_offset,
            document,
            start_line: HIDDEN_LINE,
            start_column: 0,
            end_line: HIDDEN_LINE,
            end_column: 0,
        }
    }

    /// `true` for a hidden point
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.start_line == HIDDEN_LINE && self.end_line == HIDDEN_LINE
    }
}

/// The decoded blob
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SequencePoints {
    /// StandAloneSig row id of the method's locals, 0 for none
    pub local_signature: u32,
    /// The points in IL offset order
    pub points: Vec<SequencePoint>,
}

impl SequencePoints {
    /// The document shared by every point, which then goes into the row's `Document` column
    #[must_use]
    pub fn single_document(&self) -> Option<u32> {
        let first = self.points.first()?.document;
        self.points
            .iter()
            .all(|point| point.document == first)
            .then_some(first)
    }

    /// Encode the blob. `document` is the row's `Document` column: when `Some`, the blob starts in
    /// that document and omits `InitialDocument`.
    ///
    /// # Errors
    /// Returns an error if IL offsets do not strictly increase, a span ends before it starts or a
    /// visible point has an empty single-line span (it would read back as hidden).
    pub fn encode(&self, document: Option<u32>) -> Result<Vec<u8>> {
        let mut writer = ByteWriter::new();
        writer.write_compressed_uint(self.local_signature)?;

        let Some(first) = self.points.first() else {
            if document.is_none() {
                writer.write_compressed_uint(0)?;
            }
            return Ok(writer.into_inner());
        };

        let mut current_document = match document {
            Some(document) => document,
            None => {
                writer.write_compressed_uint(first.document)?;
                first.document
            }
        };

        let mut previous_offset: Option<u32> = None;
        let mut previous_visible: Option<(u32, u32)> = None;
        for point in &self.points {
            if point.document != current_document {
                if previous_offset.is_none() {
                    return Err(malformed_error!(
                        "First sequence point is in document {}, not {}",
                        point.document,
                        current_document
                    ));
                }
                writer.write_compressed_uint(0)?;
                writer.write_compressed_uint(point.document)?;
                current_document = point.document;
            }

            match previous_offset {
                None => writer.write_compressed_uint(point.il_offset)?,
                Some(previous) if point.il_offset > previous => {
                    writer.write_compressed_uint(point.il_offset - previous)?;
                }
                Some(previous) => {
                    return Err(malformed_error!(
                        "Sequence point IL offsets must increase - {} after {}",
                        point.il_offset,
                        previous
                    ))
                }
            }
            previous_offset = Some(point.il_offset);

            if point.is_hidden() {
                writer.write_compressed_uint(0)?;
                writer.write_compressed_uint(0)?;
                continue;
            }

            let Some(delta_lines) = point.end_line.checked_sub(point.start_line) else {
                return Err(malformed_error!(
                    "Sequence point ends on line {} before it starts on {}",
                    point.end_line,
                    point.start_line
                ));
            };
            let delta_columns = i64::from(point.end_column) - i64::from(point.start_column);
            writer.write_compressed_uint(delta_lines)?;
            if delta_lines == 0 {
                if delta_columns <= 0 {
                    return Err(malformed_error!(
                        "Single-line sequence point at IL offset {} has an empty span",
                        point.il_offset
                    ));
                }
                writer.write_compressed_uint(to_u32(delta_columns)?)?;
            } else {
                writer.write_compressed_int(to_i32(delta_columns)?)?;
            }

            match previous_visible {
                None => {
                    writer.write_compressed_uint(point.start_line)?;
                    writer.write_compressed_uint(point.start_column)?;
                }
                Some((line, column)) => {
                    writer.write_compressed_int(to_i32(
                        i64::from(point.start_line) - i64::from(line),
                    )?)?;
                    writer.write_compressed_int(to_i32(
                        i64::from(point.start_column) - i64::from(column),
                    )?)?;
                }
            }
            previous_visible = Some((point.start_line, point.start_column));
        }

        Ok(writer.into_inner())
    }
}

fn to_i32(value: i64) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| limit_error!("sequence point delta", value.unsigned_abs(), i32::MAX))
}

fn to_u32(value: i64) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| limit_error!("sequence point delta", value.unsigned_abs(), u32::MAX))
}

fn apply_delta(base: u32, delta: i32) -> Result<u32> {
    base.checked_add_signed(delta).ok_or_else(|| {
        malformed_error!("Sequence point position out of range - {} {:+}", base, delta)
    })
}

/// Decode a sequence points blob. `document` is the row's `Document` column, 0 for nil.
///
/// # Errors
/// Returns an error if the blob is truncated or a position leaves the valid range.
pub fn parse_sequence_points(blob: &[u8], document: u32) -> Result<SequencePoints> {
    let mut parser = Parser::new(blob);

    let local_signature = parser.read_compressed_uint()?;
    let mut current_document = if document == 0 {
        parser.read_compressed_uint()?
    } else {
        document
    };

    let mut points = Vec::new();
    let mut il_offset = 0u32;
    let mut previous_visible: Option<(u32, u32)> = None;
    while parser.has_more_data() {
        let delta_il = parser.read_compressed_uint()?;
        if points.is_empty() {
            il_offset = delta_il;
        } else if delta_il == 0 {
            current_document = parser.read_compressed_uint()?;
            continue;
        } else {
            il_offset = il_offset
                .checked_add(delta_il)
                .ok_or_else(|| malformed_error!("Sequence point IL offset overflows"))?;
        }

        let delta_lines = parser.read_compressed_uint()?;
        let delta_columns = if delta_lines == 0 {
            i64::from(parser.read_compressed_uint()?)
        } else {
            i64::from(parser.read_compressed_int()?)
        };

        if delta_lines == 0 && delta_columns == 0 {
            points.push(SequencePoint::hidden(il_offset, current_document));
            continue;
        }

        let (start_line, start_column) = match previous_visible {
            None => (parser.read_compressed_uint()?, parser.read_compressed_uint()?),
            Some((line, column)) => (
                apply_delta(line, parser.read_compressed_int()?)?,
                apply_delta(column, parser.read_compressed_int()?)?,
            ),
        };
        previous_visible = Some((start_line, start_column));

        let end_line = start_line
            .checked_add(delta_lines)
            .ok_or_else(|| malformed_error!("Sequence point end line overflows"))?;
        let end_column = u32::try_from(i64::from(start_column) + delta_columns)
            .map_err(|_| malformed_error!("Sequence point end column out of range"))?;

        points.push(SequencePoint {
            il_offset,
            document: current_document,
            start_line,
            start_column,
            end_line,
            end_column,
        });
    }

    Ok(SequencePoints {
        local_signature,
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rustfmt::skip]
    const BLOB: [u8; 21] = [
        0x01,                         // local signature
        0x00, 0x00, 0x04, 0x0A, 0x05, // IL 0: (10,5)-(10,9)
        0x03, 0x00, 0x00,             // IL 3: hidden
        0x03, 0x00, 0x0B, 0x04, 0x08, // IL 6: (12,9)-(12,20)
        0x00, 0x02,                   // document 2
        0x02, 0x01, 0x00, 0x6B, 0x71, // IL 8: (1,1)-(2,1)
    ];

    fn expected() -> Vec<SequencePoint> {
        vec![
            SequencePoint { il_offset: 0, document: 1, start_line: 10, start_column: 5, end_line: 10, end_column: 9 },
            SequencePoint::hidden(3, 1),
            SequencePoint { il_offset: 6, document: 1, start_line: 12, start_column: 9, end_line: 12, end_column: 20 },
            SequencePoint { il_offset: 8, document: 2, start_line: 1, start_column: 1, end_line: 2, end_column: 1 },
        ]
    }

    #[test]
    fn crafted() {
        let points = parse_sequence_points(&BLOB, 1).unwrap();
        assert_eq!(points.local_signature, 1);
        assert_eq!(points.points, expected());
        assert!(points.points[1].is_hidden());
        assert_eq!(points.single_document(), None);

        assert_eq!(points.encode(Some(1)).unwrap(), BLOB);
    }

    #[test]
    fn initial_document_in_blob() {
        let points = SequencePoints {
            local_signature: 0,
            points: vec![SequencePoint { il_offset: 1, document: 3, start_line: 4, start_column: 1, end_line: 4, end_column: 2 }],
        };
        assert_eq!(points.single_document(), Some(3));

        let blob = points.encode(None).unwrap();
        assert_eq!(blob, vec![0x00, 0x03, 0x01, 0x00, 0x01, 0x04, 0x01]);
        assert_eq!(parse_sequence_points(&blob, 0).unwrap(), points);
    }

    #[test]
    fn invalid() {
        let mut points = SequencePoints { local_signature: 0, points: expected() };
        points.points.swap(0, 2);
        assert!(points.encode(Some(1)).is_err());

        let empty_span = SequencePoints {
            local_signature: 0,
            points: vec![SequencePoint { il_offset: 0, document: 1, start_line: 1, start_column: 3, end_line: 1, end_column: 3 }],
        };
        assert!(empty_span.encode(Some(1)).is_err());

        assert!(parse_sequence_points(&BLOB[..4], 1).is_err());
    }
}
