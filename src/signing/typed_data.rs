//! EIP-712 typed structured data hashing
//!
//! Only flat structs are needed here: every member is an atomic type or a
//! dynamic `bytes`/`string` that hashes to a single word.

use alloy_primitives::{keccak256, Address, B256, U256};
use serde::{Deserialize, Serialize};

use crate::codec::abi::{address_word, bool_word, uint_word};
use crate::types::address_checksum;

pub const DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

/// Signing domain of a verifying contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip712Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    #[serde(with = "address_checksum")]
    pub verifying_contract: Address,
}

impl Eip712Domain {
    pub fn new(name: impl Into<String>, version: impl Into<String>, chain_id: u64, verifying_contract: Address) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            chain_id,
            verifying_contract,
        }
    }

    pub fn separator(&self) -> B256 {
        struct_hash(
            DOMAIN_TYPE,
            &[
                TypedValue::String(self.name.clone()),
                TypedValue::String(self.version.clone()),
                TypedValue::Uint(U256::from(self.chain_id)),
                TypedValue::Address(self.verifying_contract),
            ],
        )
    }
}

/// A member value of a typed struct
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedValue {
    Address(Address),
    Uint(U256),
    Bool(bool),
    Bytes32(B256),
    Bytes(Vec<u8>),
    String(String),
}

impl TypedValue {
    pub fn uint(value: u64) -> Self {
        Self::Uint(U256::from(value))
    }

    fn encode(&self) -> [u8; 32] {
        match self {
            Self::Address(a) => address_word(a),
            Self::Uint(v) => uint_word(*v),
            Self::Bool(b) => bool_word(*b),
            Self::Bytes32(b) => b.0,
            Self::Bytes(b) => keccak256(b).0,
            Self::String(s) => keccak256(s.as_bytes()).0,
        }
    }
}

/// `keccak256(typeHash || encodeData(values))`
pub fn struct_hash(type_string: &str, values: &[TypedValue]) -> B256 {
    let mut buf = Vec::with_capacity(32 * (values.len() + 1));
    buf.extend_from_slice(keccak256(type_string.as_bytes()).as_slice());
    for value in values {
        buf.extend_from_slice(&value.encode());
    }
    keccak256(buf)
}

/// `keccak256(0x1901 || domainSeparator || structHash)`
pub fn digest(domain: &Eip712Domain, struct_hash: &B256) -> B256 {
    let mut buf = [0u8; 66];
    buf[0] = 0x19;
    buf[1] = 0x01;
    buf[2..34].copy_from_slice(domain.separator().as_slice());
    buf[34..].copy_from_slice(struct_hash.as_slice());
    keccak256(buf)
}

/// Member list `(type, name)` of a type string such as `Attest(uint16 version,...)`
pub fn members(type_string: &str) -> Vec<(&str, &str)> {
    let inner = type_string
        .split_once('(')
        .and_then(|(_, rest)| rest.strip_suffix(')'))
        .unwrap_or_default();
    inner
        .split(',')
        .filter_map(|member| member.split_once(' '))
        .collect()
}
