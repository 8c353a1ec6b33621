//! Meeting claim payload codec
//!
//! Maps a [`Claim`] onto a meeting schema's word layout and back. The
//! recipient is not part of the payload; it travels in the attestation
//! envelope.
//!
//! The meeting identifier is stored as UTF-8 bytes in a `bytesN` field.
//! Identifiers longer than N bytes are truncated and shorter ones zero padded,
//! so decoding is lossy for long identifiers and for identifiers that end in
//! NUL bytes.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use super::abi::{self, WORD};
use super::claim::Claim;
use super::schema::{FieldType, Schema};
use crate::types::{NotaryError, Result};

/// Identifier widths a meeting schema may declare
pub const MEETING_ID_WIDTHS: [usize; 2] = [16, 32];

/// Canonical bytes of a claim under one schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    bytes: Vec<u8>,
}

impl EncodedPayload {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// The schema-encoded part of a claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingFields {
    pub meeting_id: String,
    pub meeting_type: u8,
    pub start_time: u32,
    pub end_time: u32,
}

impl Claim {
    /// Fields as they come back out of a decode under an N-byte identifier
    pub fn fields_at_width(&self, id_width: usize) -> MeetingFields {
        MeetingFields {
            meeting_id: decode_identifier(&identifier_bytes(&self.meeting_id, id_width)),
            meeting_type: self.meeting_type,
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    MeetingId(usize),
    MeetingType(usize),
    StartTime(usize),
    EndTime(usize),
}

/// Resolved positions of the meeting fields inside a schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingLayout {
    slots: Vec<Slot>,
    id_width: usize,
}

impl MeetingLayout {
    /// Check that `schema` is a meeting schema and record its slot order.
    pub fn resolve(schema: &Schema) -> Result<Self> {
        if schema.fields().len() != 4 {
            return Err(NotaryError::EncodingMismatch(format!(
                "meeting schemas declare 4 fields, `{}` declares {}",
                schema.spec(),
                schema.fields().len()
            )));
        }

        let mut slots = Vec::with_capacity(4);
        let mut id_width = 0;
        for field in schema.fields() {
            let slot = match (field.name.to_ascii_lowercase().as_str(), field.ty) {
                ("meetingid", FieldType::FixedBytes(n)) if MEETING_ID_WIDTHS.contains(&n) => {
                    id_width = n;
                    Slot::MeetingId(n)
                }
                ("meetingtype", FieldType::Uint(bits)) => Slot::MeetingType(bits),
                ("starttime", FieldType::Uint(bits)) if bits >= 32 => Slot::StartTime(bits),
                ("endtime", FieldType::Uint(bits)) if bits >= 32 => Slot::EndTime(bits),
                _ => {
                    return Err(NotaryError::EncodingMismatch(format!(
                        "field `{} {}` does not belong to a meeting schema",
                        field.ty, field.name
                    )))
                }
            };
            if slots.iter().any(|s| std::mem::discriminant(s) == std::mem::discriminant(&slot)) {
                return Err(NotaryError::EncodingMismatch(format!(
                    "field `{}` declared twice",
                    field.name
                )));
            }
            slots.push(slot);
        }

        Ok(Self { slots, id_width })
    }

    pub fn id_width(&self) -> usize {
        self.id_width
    }

    pub fn size(&self) -> usize {
        self.slots.len() * WORD
    }
}

/// Encode `claim` under `schema`
pub fn encode(schema: &Schema, claim: &Claim) -> Result<EncodedPayload> {
    claim.validate()?;
    let layout = MeetingLayout::resolve(schema)?;

    let mut bytes = Vec::with_capacity(layout.size());
    for slot in &layout.slots {
        let word = match *slot {
            Slot::MeetingId(width) => abi::left_aligned_word(&identifier_bytes(&claim.meeting_id, width)),
            Slot::MeetingType(bits) => {
                ensure_fits("meetingType", U256::from(claim.meeting_type), bits)?;
                abi::uint_word(U256::from(claim.meeting_type))
            }
            Slot::StartTime(_) => abi::uint_word(U256::from(claim.start_time)),
            Slot::EndTime(_) => abi::uint_word(U256::from(claim.end_time)),
        };
        bytes.extend_from_slice(&word);
    }

    Ok(EncodedPayload { bytes })
}

/// Decode a payload produced under `schema`
pub fn decode(schema: &Schema, payload: &[u8]) -> Result<MeetingFields> {
    let layout = MeetingLayout::resolve(schema)?;
    if payload.len() != layout.size() {
        return Err(NotaryError::EncodingMismatch(format!(
            "payload is {} bytes, schema `{}` expects {}",
            payload.len(),
            schema.spec(),
            layout.size()
        )));
    }

    let mut fields = MeetingFields {
        meeting_id: String::new(),
        meeting_type: 0,
        start_time: 0,
        end_time: 0,
    };

    for (index, slot) in layout.slots.iter().enumerate() {
        let word = abi::word_at(payload, index)
            .ok_or_else(|| NotaryError::EncodingMismatch("payload truncated".to_string()))?;
        match *slot {
            Slot::MeetingId(width) => {
                if word[width..].iter().any(|b| *b != 0) {
                    return Err(NotaryError::EncodingMismatch(format!(
                        "meetingId word has data beyond {width} bytes"
                    )));
                }
                fields.meeting_id = decode_identifier(&word[..width]);
            }
            Slot::MeetingType(bits) => fields.meeting_type = narrow(word, bits, 8, "meetingType")? as u8,
            Slot::StartTime(bits) => fields.start_time = narrow(word, bits, 32, "startTime")? as u32,
            Slot::EndTime(bits) => fields.end_time = narrow(word, bits, 32, "endTime")? as u32,
        }
    }

    Ok(fields)
}

/// UTF-8 bytes of `id`, truncated or zero padded to `width`
fn identifier_bytes(id: &str, width: usize) -> Vec<u8> {
    let mut bytes = id.as_bytes().to_vec();
    bytes.resize(width, 0);
    bytes
}

fn decode_identifier(bytes: &[u8]) -> String {
    let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn ensure_fits(field: &str, value: U256, bits: usize) -> Result<()> {
    if bits < 256 && value >= (U256::from(1u8) << bits) {
        return Err(NotaryError::validation(field, format!("{field} does not fit in uint{bits}")));
    }
    Ok(())
}

/// Read a right-aligned number that must fit both the declared width and `target_bits`
fn narrow(word: &[u8], declared_bits: usize, target_bits: usize, field: &str) -> Result<u64> {
    let value = U256::from_be_slice(word);
    let limit = declared_bits.min(target_bits);
    if value >= (U256::from(1u8) << limit) {
        return Err(NotaryError::EncodingMismatch(format!(
            "{field} word holds a value wider than {limit} bits"
        )));
    }
    Ok(value.to::<u64>())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = "bytes32 MeetingId,uint8 MeetingType,uint32 StartTime,uint32 EndTime";
    const COMPACT: &str = "bytes16 MeetingId,uint8 MeetingType,uint32 StartTime,uint32 EndTime";

    fn claim(meeting_id: &str) -> Claim {
        Claim {
            recipient: "0xA1".to_string(),
            meeting_id: meeting_id.to_string(),
            meeting_type: 2,
            start_time: 1_700_000_000,
            end_time: 1_700_003_600,
        }
    }

    #[test]
    fn test_standup_vector() {
        let schema = Schema::parse(FULL).unwrap();
        let payload = encode(&schema, &claim("standup-42")).unwrap();
        let bytes = payload.as_bytes();
        assert_eq!(bytes.len(), 4 * WORD);

        let mut expected_id = [0u8; 32];
        expected_id[..10].copy_from_slice(b"standup-42");
        assert_eq!(&bytes[0..32], &expected_id);

        assert!(bytes[32..63].iter().all(|b| *b == 0));
        assert_eq!(bytes[63], 0x02);

        assert!(bytes[64..92].iter().all(|b| *b == 0));
        assert_eq!(&bytes[92..96], &1_700_000_000u32.to_be_bytes());
        assert!(bytes[96..124].iter().all(|b| *b == 0));
        assert_eq!(&bytes[124..128], &1_700_003_600u32.to_be_bytes());

        let decoded = decode(&schema, bytes).unwrap();
        assert_eq!(decoded.meeting_id, "standup-42");
        assert_eq!(decoded.meeting_type, 2);
        assert_eq!(decoded.start_time, 1_700_000_000);
        assert_eq!(decoded.end_time, 1_700_003_600);
    }

    #[test]
    fn test_round_trip_both_widths() {
        for (spec, width) in [(FULL, 32), (COMPACT, 16)] {
            let schema = Schema::parse(spec).unwrap();
            for id in ["a", "standup-42", "exactly-sixteen!", "a-meeting-identifier-longer-than-32-bytes"] {
                let c = claim(id);
                let decoded = decode(&schema, encode(&schema, &c).unwrap().as_bytes()).unwrap();
                assert_eq!(decoded, c.fields_at_width(width), "{spec} / {id}");
            }
        }
    }

    #[test]
    fn test_long_identifier_truncated() {
        let schema = Schema::parse(COMPACT).unwrap();
        let decoded = decode(&schema, encode(&schema, &claim("0123456789abcdefXYZ")).unwrap().as_bytes()).unwrap();
        assert_eq!(decoded.meeting_id, "0123456789abcdef");
    }

    #[test]
    fn test_wide_identifier_rejected_by_compact_decode() {
        let full = Schema::parse(FULL).unwrap();
        let compact = Schema::parse(COMPACT).unwrap();
        let payload = encode(&full, &claim("a-meeting-id-with-twenty-plus-bytes")).unwrap();
        assert!(matches!(
            decode(&compact, payload.as_bytes()),
            Err(NotaryError::EncodingMismatch(_))
        ));
    }

    #[test]
    fn test_non_meeting_schemas_rejected() {
        for spec in [
            "bytes8 MeetingId,uint8 MeetingType,uint32 StartTime,uint32 EndTime",
            "bytes32 MeetingId,uint8 MeetingType,uint16 StartTime,uint32 EndTime",
            "bytes32 MeetingId,uint8 MeetingType,uint32 StartTime",
            "bytes32 MeetingId,uint8 MeetingType,uint32 StartTime,uint32 EndTime,bool Extra",
            "bytes32 Topic,uint8 MeetingType,uint32 StartTime,uint32 EndTime",
        ] {
            let schema = Schema::parse(spec).unwrap();
            assert!(
                matches!(encode(&schema, &claim("x")), Err(NotaryError::EncodingMismatch(_))),
                "{spec}"
            );
        }
    }

    #[test]
    fn test_field_order_follows_schema() {
        let schema = Schema::parse("uint32 StartTime,uint32 EndTime,uint8 MeetingType,bytes16 MeetingId").unwrap();
        let payload = encode(&schema, &claim("x")).unwrap();
        assert_eq!(&payload.as_bytes()[28..32], &1_700_000_000u32.to_be_bytes());
        assert_eq!(payload.as_bytes()[96], b'x');
        assert_eq!(decode(&schema, payload.as_bytes()).unwrap().meeting_id, "x");
    }

    #[test]
    fn test_decode_wrong_length() {
        let schema = Schema::parse(FULL).unwrap();
        assert!(matches!(decode(&schema, &[0u8; 96]), Err(NotaryError::EncodingMismatch(_))));
    }

    #[test]
    fn test_decode_rejects_oversized_numbers() {
        let schema = Schema::parse(FULL).unwrap();
        let mut bytes = encode(&schema, &claim("x")).unwrap().into_bytes();
        bytes[62] = 0x01; // meetingType word now holds 0x0102
        assert!(matches!(decode(&schema, &bytes), Err(NotaryError::EncodingMismatch(_))));
    }
}
