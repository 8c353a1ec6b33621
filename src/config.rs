//! Configuration for Notary
//!
//! CLI arguments and environment variables via clap, plus schema profiles.
//! A profile pins one schema field spec, resolver and revocable flag, and
//! therefore exactly one schema UID and one identifier width.

use alloy_primitives::{Address, B256};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use zeroize::Zeroizing;

use crate::codec::{MeetingLayout, Schema};
use crate::signing::{DelegationTarget, OffchainVersion};
use crate::types::{address_checksum, b256_hex, parse_address, parse_b256, NotaryError, Result};

pub const DEFAULT_SCHEMA_SPEC: &str = "bytes16 MeetingId,uint8 MeetingType,uint32 StartTime,uint32 EndTime";
pub const DEFAULT_PROFILE: &str = "default";

/// Notary - delegated attestation relay for meeting claims
#[derive(Parser, Debug, Clone)]
#[command(name = "notary")]
#[command(about = "Signs, relays and publishes schema-typed meeting attestations")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:3003")]
    pub listen: SocketAddr,

    /// JSON-RPC endpoint of the ledger node
    #[arg(long, env = "RPC_URL")]
    pub rpc_url: Option<String>,

    /// Attester private key (hex). Signs claims.
    #[arg(long, env = "ATTESTER_PRIVATE_KEY", hide_env_values = true)]
    pub attester_private_key: Option<String>,

    /// Relayer private key (hex). Submits and pays for delegated claims.
    #[arg(long, env = "RELAYER_PRIVATE_KEY", hide_env_values = true)]
    pub relayer_private_key: Option<String>,

    /// Chain id; fetched from the node when unset
    #[arg(long, env = "CHAIN_ID")]
    pub chain_id: Option<u64>,

    /// Attestation registry contract
    #[arg(long, env = "EAS_ADDRESS", default_value = "0x4200000000000000000000000000000000000021")]
    pub eas_address: String,

    /// Attestation registry version (EIP-712 domain version)
    #[arg(long, env = "EAS_VERSION", default_value = "1.3.0")]
    pub eas_version: String,

    /// Schema registry contract
    #[arg(long, env = "SCHEMA_REGISTRY_ADDRESS", default_value = "0x4200000000000000000000000000000000000020")]
    pub schema_registry_address: String,

    /// Off-ledger index (locator URLs and uploads)
    #[arg(long, env = "OFFCHAIN_BASE_URL", default_value = "https://optimism-sepolia.easscan.org")]
    pub offchain_base_url: String,

    /// Off-ledger attestation version (1 or 2)
    #[arg(long, env = "OFFCHAIN_VERSION", default_value = "2")]
    pub offchain_version: u16,

    /// JSON file with a list of schema profiles
    /// When set, the default profile flags below are ignored
    #[arg(long, env = "PROFILES_FILE")]
    pub profiles_file: Option<PathBuf>,

    /// Default profile configuration
    #[command(flatten)]
    pub profile: ProfileArgs,

    /// Delegated request deadline, seconds from signing (0 = none)
    #[arg(long, env = "DELEGATION_DEADLINE_SECS", default_value = "0")]
    pub delegation_deadline_secs: u64,

    /// Attempts for a delegated attestation that hits a stale nonce
    #[arg(long, env = "NONCE_RETRY_LIMIT", default_value = "3")]
    pub nonce_retry_limit: u32,

    /// Finalization wait in milliseconds
    #[arg(long, env = "FINALIZE_TIMEOUT_MS", default_value = "120000")]
    pub finalize_timeout_ms: u64,

    /// Receipt polling interval in milliseconds
    #[arg(long, env = "RECEIPT_POLL_MS", default_value = "2000")]
    pub receipt_poll_ms: u64,

    /// Outbound HTTP request timeout in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "15000")]
    pub request_timeout_ms: u64,

    /// Gas limit as a percentage of the node's estimate
    #[arg(long, env = "GAS_MULTIPLIER_PERCENT", default_value = "120")]
    pub gas_multiplier_percent: u64,

    /// Enable development mode (in-memory ledger, ephemeral keys when unset)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format (text, json)
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,
}

/// Flags describing the default schema profile
#[derive(Parser, Debug, Clone)]
pub struct ProfileArgs {
    /// Schema field spec
    #[arg(long, env = "SCHEMA_SPEC", default_value = DEFAULT_SCHEMA_SPEC)]
    pub schema_spec: String,

    /// Schema resolver contract (zero address = none)
    #[arg(long, env = "SCHEMA_RESOLVER")]
    pub schema_resolver: Option<String>,

    /// Whether the schema allows revocation
    #[arg(long, env = "SCHEMA_REVOCABLE", default_value = "false")]
    pub schema_revocable: bool,

    /// Expected schema UID; startup fails when the spec derives another one
    #[arg(long, env = "SCHEMA_UID")]
    pub schema_uid: Option<String>,

    /// Delegation proxy contract; delegated requests target the registry when unset
    #[arg(long, env = "DELEGATION_PROXY")]
    pub delegation_proxy: Option<String>,

    /// Delegation proxy EIP-712 domain name
    #[arg(long, env = "DELEGATION_PROXY_NAME", default_value = "EIP712Proxy")]
    pub delegation_proxy_name: String,

    /// Delegation proxy EIP-712 domain version
    #[arg(long, env = "DELEGATION_PROXY_VERSION", default_value = "1.3.0")]
    pub delegation_proxy_version: String,
}

impl Args {
    pub fn attester_key(&self) -> Option<Zeroizing<String>> {
        self.attester_private_key.clone().map(Zeroizing::new)
    }

    pub fn relayer_key(&self) -> Option<Zeroizing<String>> {
        self.relayer_private_key.clone().map(Zeroizing::new)
    }

    pub fn eas(&self) -> Result<Address> {
        parse_address("EAS_ADDRESS", &self.eas_address).map_err(config_error)
    }

    pub fn schema_registry(&self) -> Result<Address> {
        parse_address("SCHEMA_REGISTRY_ADDRESS", &self.schema_registry_address).map_err(config_error)
    }

    pub fn offchain_version(&self) -> Result<OffchainVersion> {
        OffchainVersion::try_from(self.offchain_version).map_err(NotaryError::Config)
    }

    pub fn finalize_timeout(&self) -> Duration {
        Duration::from_millis(self.finalize_timeout_ms)
    }

    pub fn receipt_poll(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Load and resolve every configured profile
    pub fn profiles(&self) -> Result<ProfileSet> {
        let specs = match &self.profiles_file {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    NotaryError::Config(format!("cannot read {}: {}", path.display(), e))
                })?;
                serde_json::from_str::<Vec<ProfileSpec>>(&raw).map_err(|e| {
                    NotaryError::Config(format!("{} is not a profile list: {}", path.display(), e))
                })?
            }
            None => vec![self.profile.to_spec()?],
        };
        ProfileSet::resolve(specs)
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.dev_mode {
            if self.rpc_url.is_none() {
                return Err("RPC_URL is required outside development mode".to_string());
            }
            if self.attester_private_key.is_none() {
                return Err("ATTESTER_PRIVATE_KEY is required outside development mode".to_string());
            }
            if self.relayer_private_key.is_none() {
                return Err("RELAYER_PRIVATE_KEY is required outside development mode".to_string());
            }
        }

        if let (Some(attester), Some(relayer)) = (&self.attester_private_key, &self.relayer_private_key) {
            let normalize = |k: &str| Zeroizing::new(k.trim().trim_start_matches("0x").to_ascii_lowercase());
            if normalize(attester) == normalize(relayer) {
                return Err("ATTESTER_PRIVATE_KEY and RELAYER_PRIVATE_KEY must differ".to_string());
            }
        }

        if !matches!(self.offchain_version, 1 | 2) {
            return Err("OFFCHAIN_VERSION must be 1 or 2".to_string());
        }
        if self.nonce_retry_limit == 0 {
            return Err("NONCE_RETRY_LIMIT must be at least 1".to_string());
        }
        if self.gas_multiplier_percent < 100 {
            return Err("GAS_MULTIPLIER_PERCENT must be at least 100".to_string());
        }
        if !matches!(self.log_format.as_str(), "text" | "json") {
            return Err("LOG_FORMAT must be `text` or `json`".to_string());
        }

        self.eas().map_err(|e| e.to_string())?;
        self.schema_registry().map_err(|e| e.to_string())?;
        Ok(())
    }
}

impl ProfileArgs {
    fn to_spec(&self) -> Result<ProfileSpec> {
        let delegation = match &self.delegation_proxy {
            Some(proxy) => DelegationTarget::Proxy {
                address: parse_address("DELEGATION_PROXY", proxy).map_err(config_error)?,
                name: self.delegation_proxy_name.clone(),
                version: self.delegation_proxy_version.clone(),
            },
            None => DelegationTarget::Eas,
        };
        let resolver = match &self.schema_resolver {
            Some(raw) => parse_address("SCHEMA_RESOLVER", raw).map_err(config_error)?,
            None => Address::ZERO,
        };
        let expected_uid = match &self.schema_uid {
            Some(raw) => Some(parse_b256("SCHEMA_UID", raw).map_err(config_error)?),
            None => None,
        };

        Ok(ProfileSpec {
            name: DEFAULT_PROFILE.to_string(),
            schema: self.schema_spec.clone(),
            resolver,
            revocable: self.schema_revocable,
            delegation,
            expected_uid,
        })
    }
}

fn config_error(err: NotaryError) -> NotaryError {
    NotaryError::Config(err.to_string())
}

// ============================================================================
// Schema profiles
// ============================================================================

/// A profile as written in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSpec {
    pub name: String,
    /// Schema field spec
    pub schema: String,
    #[serde(default, with = "address_checksum")]
    pub resolver: Address,
    #[serde(default)]
    pub revocable: bool,
    #[serde(default = "registry_target")]
    pub delegation: DelegationTarget,
    #[serde(default, with = "opt_uid")]
    pub expected_uid: Option<B256>,
}

fn registry_target() -> DelegationTarget {
    DelegationTarget::Eas
}

/// A validated profile
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaProfile {
    pub name: String,
    #[serde(rename = "schemaFieldSpec")]
    pub spec: String,
    #[serde(skip)]
    pub schema: Schema,
    #[serde(with = "address_checksum")]
    pub resolver: Address,
    pub revocable: bool,
    pub delegation: DelegationTarget,
    #[serde(rename = "schemaUID", with = "b256_hex")]
    pub uid: B256,
}

impl SchemaProfile {
    pub fn resolve(spec: ProfileSpec) -> Result<Self> {
        let schema = Schema::parse(&spec.schema)
            .map_err(|e| NotaryError::Config(format!("profile `{}`: {}", spec.name, e)))?;
        // only meeting-shaped schemas can carry claims
        MeetingLayout::resolve(&schema)?;
        let uid = schema.uid(&spec.resolver, spec.revocable);

        if let Some(expected) = spec.expected_uid {
            if expected != uid {
                return Err(NotaryError::EncodingMismatch(format!(
                    "profile `{}`: spec derives schema UID {} but {} is configured",
                    spec.name, uid, expected
                )));
            }
        }

        Ok(Self {
            name: spec.name,
            spec: spec.schema,
            schema,
            resolver: spec.resolver,
            revocable: spec.revocable,
            delegation: spec.delegation,
            uid,
        })
    }

    pub fn has_resolver(&self) -> bool {
        self.resolver != Address::ZERO
    }
}

/// Resolved profiles; the first one is the default
#[derive(Debug, Clone)]
pub struct ProfileSet {
    profiles: Vec<SchemaProfile>,
}

impl ProfileSet {
    pub fn resolve(specs: Vec<ProfileSpec>) -> Result<Self> {
        if specs.is_empty() {
            return Err(NotaryError::Config("at least one schema profile is required".to_string()));
        }
        let mut profiles: Vec<SchemaProfile> = Vec::with_capacity(specs.len());
        for spec in specs {
            if profiles.iter().any(|p| p.name == spec.name) {
                return Err(NotaryError::Config(format!("duplicate profile `{}`", spec.name)));
            }
            profiles.push(SchemaProfile::resolve(spec)?);
        }
        Ok(Self { profiles })
    }

    pub fn default_profile(&self) -> &SchemaProfile {
        &self.profiles[0]
    }

    /// Profile by name; `None` selects the default
    pub fn get(&self, name: Option<&str>) -> Result<&SchemaProfile> {
        match name {
            None | Some("") => Ok(self.default_profile()),
            Some(name) => self
                .profiles
                .iter()
                .find(|p| p.name == name)
                .ok_or_else(|| NotaryError::NotFound(format!("unknown profile `{name}`"))),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &SchemaProfile> {
        self.profiles.iter()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

mod opt_uid {
    use alloy_primitives::B256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<B256>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => crate::types::b256_hex::serialize(v, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<B256>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| crate::types::parse_b256("expectedUid", &s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::schema_uid;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["notary"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_production_requires_rpc_and_key() {
        let a = args(&[]);
        assert!(a.validate().unwrap_err().contains("RPC_URL"));

        let a = args(&["--rpc-url", "http://localhost:8545"]);
        assert!(a.validate().unwrap_err().contains("ATTESTER_PRIVATE_KEY"));

        let key = format!("0x{}", "11".repeat(32));
        let a = args(&["--rpc-url", "http://localhost:8545", "--attester-private-key", &key]);
        assert!(a.validate().unwrap_err().contains("RELAYER_PRIVATE_KEY"));

        let a = args(&["--dev-mode"]);
        assert!(a.validate().is_ok());
    }

    #[test]
    fn test_distinct_identities_required() {
        let key = format!("0x{}", "11".repeat(32));
        let upper = "11".repeat(32);
        let a = args(&[
            "--dev-mode",
            "--attester-private-key",
            &key,
            "--relayer-private-key",
            &upper,
        ]);
        assert!(a.validate().unwrap_err().contains("must differ"));
    }

    #[test]
    fn test_default_profile() {
        let a = args(&["--dev-mode"]);
        let profiles = a.profiles().unwrap();
        let profile = profiles.get(None).unwrap();
        assert_eq!(profile.name, DEFAULT_PROFILE);
        assert_eq!(MeetingLayout::resolve(&profile.schema).unwrap().id_width(), 16);
        assert_eq!(profile.uid, schema_uid(DEFAULT_SCHEMA_SPEC, &Address::ZERO, false));
        assert_eq!(profile.delegation, DelegationTarget::Eas);
        assert!(matches!(profiles.get(Some("other")), Err(NotaryError::NotFound(_))));
    }

    #[test]
    fn test_expected_uid_mismatch_fails() {
        let wrong = format!("0x{}", "00".repeat(32));
        let a = args(&["--dev-mode", "--schema-uid", &wrong]);
        assert!(matches!(a.profiles(), Err(NotaryError::EncodingMismatch(_))));

        let right = crate::types::to_hex(schema_uid(DEFAULT_SCHEMA_SPEC, &Address::ZERO, false));
        let a = args(&["--dev-mode", "--schema-uid", &right]);
        assert!(a.profiles().is_ok());
    }

    #[test]
    fn test_non_meeting_schema_rejected_at_startup() {
        let a = args(&["--dev-mode", "--schema-spec", "string name,uint8 kind"]);
        assert!(matches!(a.profiles(), Err(NotaryError::EncodingMismatch(_))));
    }

    #[test]
    fn test_proxy_profile_from_flags() {
        let a = args(&[
            "--dev-mode",
            "--delegation-proxy",
            "0x7777777777777777777777777777777777777777",
        ]);
        let profiles = a.profiles().unwrap();
        match &profiles.default_profile().delegation {
            DelegationTarget::Proxy { name, version, .. } => {
                assert_eq!(name, "EIP712Proxy");
                assert_eq!(version, "1.3.0");
            }
            other => panic!("unexpected target {other:?}"),
        }
    }

    #[test]
    fn test_profile_file_format() {
        let json = r#"[
            {"name": "compact", "schema": "bytes16 MeetingId,uint8 MeetingType,uint32 StartTime,uint32 EndTime"},
            {"name": "full", "schema": "bytes32 MeetingId,uint8 MeetingType,uint32 StartTime,uint32 EndTime",
             "revocable": true,
             "delegation": {"kind": "proxy", "address": "0x7777777777777777777777777777777777777777",
                            "name": "MeetingProxy", "version": "1.0.2"}}
        ]"#;
        let specs: Vec<ProfileSpec> = serde_json::from_str(json).unwrap();
        let set = ProfileSet::resolve(specs).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.default_profile().name, "compact");
        let full = set.get(Some("full")).unwrap();
        assert_eq!(MeetingLayout::resolve(&full.schema).unwrap().id_width(), 32);
        assert!(full.revocable);
        assert_ne!(full.uid, set.default_profile().uid);
    }
}
