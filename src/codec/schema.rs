//! Schema field specs and schema identifiers
//!
//! A schema is declared as a comma separated list of `type name` pairs, e.g.
//! `bytes32 MeetingId,uint8 MeetingType,uint32 StartTime,uint32 EndTime`.
//! The registry derives the schema UID from the spec string itself plus the
//! resolver address and the revocable flag, so the string is kept verbatim.

use alloy_primitives::{Address, B256};
use std::fmt;

use super::abi::Packed;
use crate::types::{NotaryError, Result};

const SPEC_FIELD: &str = "schemaFieldSpec";

/// Declared type of a schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// `bytesN`, N in 1..=32
    FixedBytes(usize),
    /// `uintN`, N in 8..=256 step 8
    Uint(usize),
    /// `intN`, N in 8..=256 step 8
    Int(usize),
    Address,
    Bool,
    Bytes,
    String,
}

impl FieldType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "address" => return Some(Self::Address),
            "bool" => return Some(Self::Bool),
            "bytes" => return Some(Self::Bytes),
            "string" => return Some(Self::String),
            "uint" => return Some(Self::Uint(256)),
            "int" => return Some(Self::Int(256)),
            _ => {}
        }

        if let Some(width) = raw.strip_prefix("bytes") {
            let n: usize = width.parse().ok()?;
            return (1..=32).contains(&n).then_some(Self::FixedBytes(n));
        }
        if let Some(bits) = raw.strip_prefix("uint") {
            let n: usize = bits.parse().ok()?;
            return (n % 8 == 0 && (8..=256).contains(&n)).then_some(Self::Uint(n));
        }
        if let Some(bits) = raw.strip_prefix("int") {
            let n: usize = bits.parse().ok()?;
            return (n % 8 == 0 && (8..=256).contains(&n)).then_some(Self::Int(n));
        }
        None
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FixedBytes(n) => write!(f, "bytes{n}"),
            Self::Uint(n) => write!(f, "uint{n}"),
            Self::Int(n) => write!(f, "int{n}"),
            Self::Address => f.write_str("address"),
            Self::Bool => f.write_str("bool"),
            Self::Bytes => f.write_str("bytes"),
            Self::String => f.write_str("string"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaField {
    pub name: String,
    pub ty: FieldType,
}

/// A parsed schema field spec
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    spec: String,
    fields: Vec<SchemaField>,
}

impl Schema {
    /// Parse a field spec. The original string is preserved for UID derivation.
    pub fn parse(spec: &str) -> Result<Self> {
        if spec.trim().is_empty() {
            return Err(NotaryError::validation(SPEC_FIELD, "Schema field spec must not be empty."));
        }

        let mut fields: Vec<SchemaField> = Vec::new();
        for (position, part) in spec.split(',').enumerate() {
            let tokens: Vec<&str> = part.split_whitespace().collect();
            let [raw_type, name] = tokens.as_slice() else {
                return Err(NotaryError::validation(
                    SPEC_FIELD,
                    format!("Field {} must be declared as `type name`, got `{}`", position, part.trim()),
                ));
            };

            let ty = FieldType::parse(raw_type).ok_or_else(|| {
                NotaryError::validation(SPEC_FIELD, format!("Unsupported field type `{raw_type}`"))
            })?;

            if !is_identifier(name) {
                return Err(NotaryError::validation(SPEC_FIELD, format!("Invalid field name `{name}`")));
            }
            if fields.iter().any(|f| f.name.eq_ignore_ascii_case(name)) {
                return Err(NotaryError::validation(SPEC_FIELD, format!("Duplicate field name `{name}`")));
            }

            fields.push(SchemaField {
                name: name.to_string(),
                ty,
            });
        }

        Ok(Self {
            spec: spec.to_string(),
            fields,
        })
    }

    pub fn spec(&self) -> &str {
        &self.spec
    }

    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    /// Field lookup by name, ignoring ASCII case
    pub fn field(&self, name: &str) -> Option<(usize, &SchemaField)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, f)| f.name.eq_ignore_ascii_case(name))
    }

    /// UID as derived by the schema registry
    pub fn uid(&self, resolver: &Address, revocable: bool) -> B256 {
        schema_uid(&self.spec, resolver, revocable)
    }
}

/// `keccak256(abi.encodePacked(schema, resolver, revocable))`
pub fn schema_uid(spec: &str, resolver: &Address, revocable: bool) -> B256 {
    Packed::new()
        .bytes(spec.as_bytes())
        .address(resolver)
        .bool(revocable)
        .keccak()
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
