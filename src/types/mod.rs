//! Shared types for Notary

pub mod error;

pub use error::{NotaryError, Result, SubmissionFailure};

use alloy_primitives::{Address, B256};

/// Lowercase 0x-prefixed hex for any byte string
pub fn to_hex(bytes: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(bytes.as_ref()))
}

/// Parse 0x-prefixed (or bare) hex into bytes
pub fn from_hex(field: &str, value: &str) -> Result<Vec<u8>> {
    let trimmed = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(trimmed).map_err(|e| NotaryError::validation(field, format!("{field} is not valid hex: {e}")))
}

/// Parse a 32-byte identifier (schema UID, attestation UID, digest)
pub fn parse_b256(field: &str, value: &str) -> Result<B256> {
    let bytes = from_hex(field, value)?;
    if bytes.len() != 32 {
        return Err(NotaryError::validation(
            field,
            format!("{field} must be 32 bytes, got {}", bytes.len()),
        ));
    }
    Ok(B256::from_slice(&bytes))
}

/// Parse a ledger account identifier
pub fn parse_address(field: &str, value: &str) -> Result<Address> {
    let bytes = from_hex(field, value)?;
    if bytes.len() != 20 {
        return Err(NotaryError::validation(
            field,
            format!("{field} must be a 20-byte address, got {} bytes", bytes.len()),
        ));
    }
    Ok(Address::from_slice(&bytes))
}

/// Checksummed display form of an address
pub fn address_string(address: &Address) -> String {
    address.to_checksum(None)
}

/// Current unix time in seconds
pub fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Serialize `U256` as a decimal string (JSON numbers cannot hold it)
pub mod u256_dec {
    use alloy_primitives::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        U256::from_str_radix(&s, 10).map_err(serde::de::Error::custom)
    }
}

/// Serialize any 32-byte value as 0x-hex
pub mod b256_hex {
    use alloy_primitives::B256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &B256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::to_hex(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<B256, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_b256("value", &s).map_err(serde::de::Error::custom)
    }
}

/// Serialize byte vectors as 0x-hex
pub mod bytes_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::to_hex(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::from_hex("value", &s).map_err(serde::de::Error::custom)
    }
}

/// Serialize addresses in checksummed form
pub mod address_checksum {
    use alloy_primitives::Address;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Address, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::address_string(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Address, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_address("address", &s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address_accepts_mixed_case() {
        let input = "0x8dEa0ad941d577e356745d758b30Fa11EFa28E80";
        let addr = parse_address("recipient", input).unwrap();
        assert_eq!(address_string(&addr).to_lowercase(), input.to_lowercase());
        assert_eq!(parse_address("recipient", &input.to_lowercase()).unwrap(), addr);
    }

    #[test]
    fn test_parse_address_rejects_short_identifier() {
        let err = parse_address("recipient", "0xA1").unwrap_err();
        match err {
            NotaryError::Validation { field, .. } => assert_eq!(field, "recipient"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_b256_length() {
        assert!(parse_b256("uid", &format!("0x{}", "11".repeat(32))).is_ok());
        assert!(parse_b256("uid", "0x1234").is_err());
    }
}
