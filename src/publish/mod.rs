//! Off-ledger publication
//!
//! A signed off-ledger attestation is packaged with its signer, turned into a
//! locator URL any client can decode without a server round trip, and
//! uploaded to the remote index.
//!
//! The locator is computed locally; upload is best effort. A failed upload
//! is reported but never invalidates the signature or the locator.

use alloy_primitives::{Address, B256};
use base64::prelude::*;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{info, warn};

use crate::signing::{OffchainAttestation, OffchainVersion};
use crate::types::{address_checksum, address_string, to_hex, NotaryError, Result};

pub const LOCATOR_PATH: &str = "/offchain/url/#attestation=";
pub const STORE_PATH: &str = "/offchain/store";
const STORE_FILENAME: &str = "eas.txt";

/// An attestation and the address that signed it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffchainPackage {
    pub sig: OffchainAttestation,
    #[serde(with = "address_checksum")]
    pub signer: Address,
}

impl OffchainPackage {
    /// Positional form embedded in locator URLs
    pub fn compact(&self) -> JsonValue {
        let sig = &self.sig;
        let m = &sig.message;
        let recipient = if m.recipient == Address::ZERO {
            json!("0")
        } else {
            json!(address_string(&m.recipient))
        };
        let ref_uid = if m.ref_uid == B256::ZERO {
            json!("0")
        } else {
            json!(to_hex(m.ref_uid))
        };

        let mut items = vec![
            json!(sig.domain.version),
            json!(sig.domain.chain_id.to_string()),
            json!(address_string(&sig.domain.verifying_contract)),
            json!(to_hex(sig.signature.r)),
            json!(to_hex(sig.signature.s)),
            json!(sig.signature.v),
            json!(address_string(&self.signer)),
            json!(to_hex(sig.uid)),
            json!(to_hex(m.schema)),
            recipient,
            json!(m.time),
            json!(m.expiration_time),
            ref_uid,
            json!(m.revocable),
            json!(to_hex(&m.data)),
            json!(0),
            json!(m.version.as_u16()),
        ];
        if let (OffchainVersion::V2, Some(salt)) = (m.version, m.salt) {
            items.push(json!(to_hex(salt)));
        }
        JsonValue::Array(items)
    }
}

/// Fragment appended to the base URL
pub fn locator_fragment(package: &OffchainPackage) -> Result<String> {
    let compact = serde_json::to_vec(&package.compact())
        .map_err(|e| NotaryError::Internal(format!("compact package serialization: {e}")))?;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(&compact)?;
    let deflated = encoder.finish()?;

    let encoded = BASE64_STANDARD.encode(deflated);
    Ok(format!("{}{}", LOCATOR_PATH, urlencoding::encode(&encoded)))
}

/// Inverse of [`locator_fragment`]: the compact array inside a locator URL
pub fn decode_locator(url: &str) -> Result<JsonValue> {
    let (_, encoded) = url
        .split_once("#attestation=")
        .ok_or_else(|| NotaryError::BadRequest("locator has no attestation fragment".to_string()))?;
    let encoded = urlencoding::decode(encoded)
        .map_err(|e| NotaryError::BadRequest(format!("locator is not URL encoded: {e}")))?;
    let deflated = BASE64_STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| NotaryError::BadRequest(format!("locator is not base64: {e}")))?;

    let mut json = String::new();
    ZlibDecoder::new(deflated.as_slice())
        .read_to_string(&mut json)
        .map_err(|e| NotaryError::BadRequest(format!("locator does not inflate: {e}")))?;
    Ok(serde_json::from_str(&json)?)
}

/// Result of a publication attempt
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    pub package: OffchainPackage,
    #[serde(rename = "locatorURL")]
    pub locator_url: String,
    pub upload_succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_error: Option<String>,
}

pub struct OffchainPublisher {
    client: reqwest::Client,
    base_url: String,
}

impl OffchainPublisher {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let parsed = reqwest::Url::parse(&base_url)
            .map_err(|e| NotaryError::Config(format!("off-ledger index URL `{base_url}`: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(NotaryError::Config(format!(
                "off-ledger index URL `{base_url}` must be http or https"
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("notary/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NotaryError::Config(format!("off-ledger HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    pub fn locator_url(&self, package: &OffchainPackage) -> Result<String> {
        Ok(format!("{}{}", self.base_url, locator_fragment(package)?))
    }

    /// Store `package` at the remote index
    pub async fn upload(&self, package: &OffchainPackage) -> Result<()> {
        let text_json = serde_json::to_string(package)
            .map_err(|e| NotaryError::Internal(format!("package serialization: {e}")))?;
        let body = json!({
            "filename": STORE_FILENAME,
            "textJson": text_json,
        });

        let url = format!("{}{}", self.base_url, STORE_PATH);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotaryError::Publish(format!("upload to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotaryError::Publish(format!("index answered HTTP {status}")));
        }
        let text = response
            .text()
            .await
            .map_err(|e| NotaryError::Publish(format!("reading index response: {e}")))?;
        if text.trim().is_empty() {
            return Err(NotaryError::Publish("index returned an empty response".to_string()));
        }
        Ok(())
    }

    /// Package, derive the locator, then try the upload
    pub async fn publish(&self, attestation: OffchainAttestation, signer: Address) -> Result<PublishOutcome> {
        let package = OffchainPackage { sig: attestation, signer };
        let locator_url = self.locator_url(&package)?;

        let (upload_succeeded, upload_error) = match self.upload(&package).await {
            Ok(()) => {
                info!(uid = %package.sig.uid, "off-ledger attestation stored");
                (true, None)
            }
            Err(e) => {
                warn!(uid = %package.sig.uid, error = %e, "off-ledger upload failed");
                (false, Some(e.to_string()))
            }
        };

        Ok(PublishOutcome {
            package,
            locator_url,
            upload_succeeded,
            upload_error,
        })
    }
}
