//! Framing of history records.
//!
//! ```text
//! magic "CLHS" (4) | format version u16 | type u8 | payload len u32 |
//! header crc32 u32 | payload | crc32 u32
//! ```
//!
//! All integers are little-endian. The header CRC covers the eleven bytes
//! before it, so a damaged length is caught before it is trusted. The
//! trailing CRC covers everything before it.

use crate::error::{CoreError, CoreResult};
use crate::history::instruction::{Instruction, PayloadReader};
use crate::types::VersionId;

/// Magic bytes opening every record.
pub const HISTORY_MAGIC: [u8; 4] = *b"CLHS";

/// Newest record format this build reads and writes.
pub const HISTORY_FORMAT_VERSION: u16 = 1;

/// magic (4) + version (2) + type (1) + length (4)
const HEADER_FIELDS: usize = 11;

/// Header fields plus their CRC.
pub(crate) const HEADER_SIZE: usize = HEADER_FIELDS + CRC_SIZE;

pub(crate) const CRC_SIZE: usize = 4;

/// Kind of history record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// A committed change set.
    Commit = 1,
}

impl RecordType {
    /// Converts a byte to a record type.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Commit),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// The change set of one commit.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitRecord {
    /// Version the commit produced.
    pub version: VersionId,
    /// Mutations in the order they were applied.
    pub instructions: Vec<Instruction>,
}

impl CommitRecord {
    /// Encodes the record with its envelope.
    ///
    /// # Errors
    ///
    /// `IllegalArgument` if the payload exceeds the 4 GiB length field.
    pub fn encode(&self, format_version: u16) -> CoreResult<Vec<u8>> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&self.version.as_u64().to_le_bytes());
        let count = u32::try_from(self.instructions.len()).map_err(|_| {
            CoreError::illegal_argument("too many instructions in one commit")
        })?;
        payload.extend_from_slice(&count.to_le_bytes());
        for instruction in &self.instructions {
            instruction.encode_into(&mut payload);
        }

        let len = u32::try_from(payload.len())
            .map_err(|_| CoreError::illegal_argument("history record payload too large"))?;

        let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        data.extend_from_slice(&HISTORY_MAGIC);
        data.extend_from_slice(&format_version.to_le_bytes());
        data.push(RecordType::Commit.as_byte());
        data.extend_from_slice(&len.to_le_bytes());
        let header_crc = crc32fast::hash(&data);
        data.extend_from_slice(&header_crc.to_le_bytes());
        data.extend_from_slice(&payload);
        let crc = crc32fast::hash(&data);
        data.extend_from_slice(&crc.to_le_bytes());
        Ok(data)
    }

    pub(crate) fn decode_payload(payload: &[u8], offset: u64) -> CoreResult<Self> {
        let mut r = PayloadReader::new(payload, offset);
        let version = VersionId::new(r.u64()?);
        let count = r.u32()?;
        let mut instructions = Vec::new();
        for _ in 0..count {
            instructions.push(Instruction::decode(&mut r)?);
        }
        if !r.is_empty() {
            return Err(r.corrupt("trailing bytes after last instruction"));
        }
        Ok(Self {
            version,
            instructions,
        })
    }
}

/// Parsed fixed-size header.
///
/// Only commit records exist today, so the type byte is validated but not
/// kept.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Header {
    pub(crate) format_version: u16,
    pub(crate) payload_len: usize,
}

impl Header {
    pub(crate) fn parse(bytes: &[u8], offset: u64) -> CoreResult<Self> {
        if bytes.len() < HEADER_SIZE || bytes[0..4] != HISTORY_MAGIC {
            return Err(CoreError::history_corruption(offset, "bad record magic"));
        }
        let stored = u32::from_le_bytes([bytes[11], bytes[12], bytes[13], bytes[14]]);
        let actual = crc32fast::hash(&bytes[..HEADER_FIELDS]);
        if stored != actual {
            return Err(CoreError::history_corruption(
                offset,
                format!("header checksum mismatch: expected {stored:08x}, got {actual:08x}"),
            ));
        }
        let format_version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if format_version == 0 || format_version > HISTORY_FORMAT_VERSION {
            return Err(CoreError::history_corruption(
                offset,
                format!("unsupported format version {format_version}"),
            ));
        }
        if RecordType::from_byte(bytes[6]).is_none() {
            return Err(CoreError::history_corruption(
                offset,
                format!("unknown record type {}", bytes[6]),
            ));
        }
        let payload_len = u32::from_le_bytes([bytes[7], bytes[8], bytes[9], bytes[10]]) as usize;
        Ok(Self {
            format_version,
            payload_len,
        })
    }

    pub(crate) const fn frame_len(&self) -> usize {
        HEADER_SIZE + self.payload_len + CRC_SIZE
    }
}

/// Checks the CRC of a complete frame and returns its payload slice.
pub(crate) fn verify_frame(frame: &[u8], offset: u64) -> CoreResult<&[u8]> {
    let body_len = frame.len() - CRC_SIZE;
    let expected = u32::from_le_bytes([
        frame[body_len],
        frame[body_len + 1],
        frame[body_len + 2],
        frame[body_len + 3],
    ]);
    let actual = crc32fast::hash(&frame[..body_len]);
    if expected != actual {
        return Err(CoreError::ChecksumMismatch {
            offset,
            expected,
            actual,
        });
    }
    Ok(&frame[HEADER_SIZE..body_len])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ObjKey, TableKey};

    fn record() -> CommitRecord {
        CommitRecord {
            version: VersionId::new(3),
            instructions: vec![
                Instruction::AddTable {
                    table: TableKey::new(0),
                    name: "person".into(),
                },
                Instruction::CreateObject {
                    table: TableKey::new(0),
                    key: ObjKey::new(0),
                },
            ],
        }
    }

    #[test]
    fn frame_layout() {
        let data = record().encode(HISTORY_FORMAT_VERSION).unwrap();
        assert_eq!(&data[0..4], b"CLHS");
        assert_eq!(data[6], RecordType::Commit.as_byte());
        let header = Header::parse(&data, 0).unwrap();
        assert_eq!(header.format_version, HISTORY_FORMAT_VERSION);
        assert_eq!(header.frame_len(), data.len());

        let payload = verify_frame(&data, 0).unwrap();
        assert_eq!(CommitRecord::decode_payload(payload, 0).unwrap(), record());
    }

    #[test]
    fn flipped_bit_fails_checksum() {
        let mut data = record().encode(HISTORY_FORMAT_VERSION).unwrap();
        data[HEADER_SIZE + 2] ^= 0x01;
        let err = verify_frame(&data, 64).unwrap_err();
        assert!(matches!(err, CoreError::ChecksumMismatch { offset: 64, .. }));
        assert_eq!(err.kind(), crate::error::ErrorKind::FileError);
    }

    #[test]
    fn unknown_format_version_rejected() {
        let data = record().encode(HISTORY_FORMAT_VERSION + 1).unwrap();
        assert!(Header::parse(&data, 0).is_err());
    }

    #[test]
    fn damaged_length_fails_header_checksum() {
        let mut data = record().encode(HISTORY_FORMAT_VERSION).unwrap();
        data[10] = 0x7f;
        let err = Header::parse(&data, 32).unwrap_err();
        assert!(matches!(err, CoreError::HistoryCorruption { offset: 32, .. }));
    }

    #[test]
    fn bad_magic_rejected() {
        let mut data = record().encode(HISTORY_FORMAT_VERSION).unwrap();
        data[0] = b'X';
        assert!(Header::parse(&data, 0).is_err());
    }
}
