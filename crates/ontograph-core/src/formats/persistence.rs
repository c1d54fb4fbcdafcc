//! # Record Format
//!
//! Binary serialization for stored vertices and edges.
//!
//! Format: Header (5 bytes) + postcard-serialized record.
//! - 4 bytes: Magic ("ONTG")
//! - 1 byte: Version
//!
//! The header is validated before the payload is parsed, and oversized
//! payloads are rejected before any allocation.

use crate::primitives;
use crate::types::OntographError;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Maximum accepted size of one encoded record.
pub const MAX_RECORD_SIZE: usize = 16 * 1024 * 1024;

const HEADER_LEN: usize = 5;

// =============================================================================
// RECORD HEADER
// =============================================================================

/// The header that precedes every record payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl RecordHeader {
    /// Create a header with the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    /// Validate the header.
    pub fn validate(&self) -> Result<(), OntographError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(OntographError::Deserialization(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(OntographError::Deserialization(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, OntographError> {
        if bytes.len() < HEADER_LEN {
            return Err(OntographError::Deserialization(
                "Header too short".to_string(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for RecordHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ENCODE / DECODE
// =============================================================================

/// Encode one record (header + payload).
pub fn encode_record<T: Serialize>(record: &T) -> Result<Vec<u8>, OntographError> {
    let payload =
        postcard::to_stdvec(record).map_err(|e| OntographError::Serialization(e.to_string()))?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(&RecordHeader::new().to_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Decode one record, validating size and header first.
pub fn decode_record<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, OntographError> {
    if bytes.len() > MAX_RECORD_SIZE {
        return Err(OntographError::Deserialization(format!(
            "Record size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_RECORD_SIZE
        )));
    }

    let header = RecordHeader::from_bytes(bytes)?;
    header.validate()?;

    postcard::from_bytes(&bytes[HEADER_LEN..]).map_err(|e| {
        OntographError::Deserialization(format!("Failed to decode record: {}", e))
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::VertexRecord;
    use crate::schema::PropertyKey;
    use crate::types::{ElementId, Value};
    use std::collections::BTreeMap;

    fn sample() -> VertexRecord {
        let mut properties = BTreeMap::new();
        properties.insert(PropertyKey::SchemaLabel, Value::from("person"));
        properties.insert(PropertyKey::IsAbstract, Value::Boolean(false));
        VertexRecord {
            id: ElementId(3),
            label: "ENTITY_TYPE".to_string(),
            properties,
        }
    }

    #[test]
    fn header_is_prefixed() {
        let bytes = encode_record(&sample()).expect("encode");
        let header = RecordHeader::from_bytes(&bytes).expect("header");
        assert_eq!(header, RecordHeader::new());
    }

    #[test]
    fn record_survives_encoding() {
        let bytes = encode_record(&sample()).expect("encode");
        let decoded: VertexRecord = decode_record(&bytes).expect("decode");
        assert_eq!(decoded, sample());
    }

    #[test]
    fn invalid_magic_rejected() {
        let mut bytes = encode_record(&sample()).expect("encode");
        bytes[0..4].copy_from_slice(b"XXXX");
        assert!(decode_record::<VertexRecord>(&bytes).is_err());
    }

    #[test]
    fn future_version_rejected() {
        let mut bytes = encode_record(&sample()).expect("encode");
        bytes[4] = primitives::FORMAT_VERSION + 1;
        let err = decode_record::<VertexRecord>(&bytes).expect_err("version");
        assert!(err.to_string().contains("Unsupported version"));
    }

    #[test]
    fn truncated_payload_rejected() {
        assert!(decode_record::<VertexRecord>(b"ONT").is_err());
    }
}
