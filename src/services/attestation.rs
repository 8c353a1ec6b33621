//! Attestation service
//!
//! End-to-end flows behind the HTTP routes:
//!
//! - direct: the attester submits and pays
//! - off-ledger: the attester signs, the publisher derives a locator and uploads
//! - delegated: the attester signs, the relayer submits and pays
//! - schema registration, resolver administration and revocation
//!
//! Delegated attestations for one attester are serialized from nonce read to
//! finalization. Signatures invalidated by submitters outside this process
//! surface as stale nonces and are re-signed a bounded number of times.

use alloy_primitives::{Address, B256, U256};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::codec::{encode, Claim, Schema};
use crate::config::{ProfileSet, SchemaProfile};
use crate::ledger::{LedgerCall, LedgerGateway, PendingSubmission, Receipt};
use crate::publish::OffchainPublisher;
use crate::relay::DelegationRelay;
use crate::signing::{
    AttestationRequest, AttestationSigner, NonceTracker, OffchainAttestation, OffchainVersion, Wallet,
};
use crate::types::{b256_hex, parse_address, unix_now, NotaryError, Result};

/// Service settings
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub eas: Address,
    pub schema_registry: Address,
    pub offchain_version: OffchainVersion,
    /// Seconds added to "now" for delegated deadlines (0 = no deadline)
    pub delegation_deadline_secs: u64,
    pub nonce_retry_limit: u32,
    pub finalize_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            eas: Address::ZERO,
            schema_registry: Address::ZERO,
            offchain_version: OffchainVersion::V2,
            delegation_deadline_secs: 0,
            nonce_retry_limit: 3,
            finalize_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnchainOutcome {
    #[serde(rename = "newAttestationUID", with = "b256_hex")]
    pub uid: B256,
    #[serde(with = "b256_hex")]
    pub tx_hash: B256,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegatedOutcome {
    #[serde(rename = "newAttestationUID", with = "b256_hex")]
    pub uid: B256,
    #[serde(with = "b256_hex")]
    pub tx_hash: B256,
    #[serde(with = "crate::types::u256_dec")]
    pub nonce: U256,
    pub attempts: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OffchainOutcome {
    pub signed_attestation: OffchainAttestation,
    #[serde(rename = "locatorURL")]
    pub locator_url: String,
    pub upload_succeeded: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaOutcome {
    #[serde(rename = "schemaUID", with = "b256_hex")]
    pub schema_uid: B256,
    #[serde(with = "b256_hex")]
    pub tx_hash: B256,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxOutcome {
    #[serde(with = "b256_hex")]
    pub tx_handle: B256,
}

pub struct AttestationService {
    gateway: Arc<dyn LedgerGateway>,
    signer: AttestationSigner,
    nonces: NonceTracker,
    relay: DelegationRelay,
    publisher: OffchainPublisher,
    attester: Wallet,
    relayer: Wallet,
    profiles: ProfileSet,
    config: ServiceConfig,
}

impl AttestationService {
    /// Wire the service. Fails when attester and relayer are the same identity.
    pub async fn new(
        gateway: Arc<dyn LedgerGateway>,
        publisher: OffchainPublisher,
        attester: Wallet,
        relayer: Wallet,
        profiles: ProfileSet,
        config: ServiceConfig,
        eas_version: &str,
    ) -> Result<Self> {
        if attester.address() == relayer.address() {
            return Err(NotaryError::Config(
                "attester and relayer must be distinct identities".to_string(),
            ));
        }

        let chain_id = gateway.chain_id().await?;
        let signer = AttestationSigner::new(chain_id, config.eas, eas_version);

        Ok(Self {
            nonces: NonceTracker::new(gateway.clone(), config.eas),
            relay: DelegationRelay::new(gateway.clone(), config.eas),
            gateway,
            signer,
            publisher,
            attester,
            relayer,
            profiles,
            config,
        })
    }

    pub fn profiles(&self) -> &ProfileSet {
        &self.profiles
    }

    pub fn profile(&self, name: Option<&str>) -> Result<&SchemaProfile> {
        self.profiles.get(name)
    }

    pub fn attester(&self) -> Address {
        self.attester.address()
    }

    pub fn relayer(&self) -> Address {
        self.relayer.address()
    }

    pub fn chain_id(&self) -> u64 {
        self.signer.chain_id()
    }

    pub fn ledger_name(&self) -> &'static str {
        self.gateway.name()
    }

    pub fn nonces(&self) -> &NonceTracker {
        &self.nonces
    }

    fn request_for(&self, profile: &SchemaProfile, claim: &Claim) -> Result<AttestationRequest> {
        let recipient = parse_address("recipient", &claim.recipient)?;
        let payload = encode(&profile.schema, claim)?;
        Ok(AttestationRequest::new(profile.uid, recipient, payload, profile.revocable))
    }

    /// Deadline to sign at `now`; 0 when delegations never lapse
    fn delegation_deadline(&self, now: u64) -> u64 {
        match self.config.delegation_deadline_secs {
            0 => 0,
            secs => now.saturating_add(secs),
        }
    }

    async fn finalize(&self, pending: &PendingSubmission) -> Result<Receipt> {
        match tokio::time::timeout(self.config.finalize_timeout, self.gateway.finalize(pending)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(tx = %pending.tx_hash, call = pending.call, "finalization timed out");
                Err(NotaryError::FinalizationTimeout {
                    tx_hash: pending.tx_hash.to_string(),
                })
            }
        }
    }

    async fn submit_and_finalize(&self, call: LedgerCall, sender: &Wallet) -> Result<Receipt> {
        let pending = self.gateway.submit(call, sender).await?;
        info!(tx = %pending.tx_hash, call = pending.call, sender = %pending.sender, "submitted");
        self.finalize(&pending).await
    }

    fn attestation_uid(receipt: &Receipt) -> Result<B256> {
        receipt.attestation_uid.ok_or_else(|| {
            NotaryError::Ledger(format!("receipt for {} carries no Attested event", receipt.tx_hash))
        })
    }

    // ========================================================================
    // Attestation flows
    // ========================================================================

    /// Attester submits its own claim
    pub async fn attest_onchain(&self, profile: &SchemaProfile, claim: &Claim) -> Result<OnchainOutcome> {
        let request = self.request_for(profile, claim)?;
        let receipt = self
            .submit_and_finalize(
                LedgerCall::Attest {
                    eas: self.config.eas,
                    request,
                },
                &self.attester,
            )
            .await?;

        let uid = Self::attestation_uid(&receipt)?;
        info!(uid = %uid, profile = %profile.name, "attestation recorded");
        Ok(OnchainOutcome {
            uid,
            tx_hash: receipt.tx_hash,
        })
    }

    /// Attester signs its claim for off-ledger verification and publication
    pub async fn attest_offchain(&self, profile: &SchemaProfile, claim: &Claim) -> Result<OffchainOutcome> {
        let request = self.request_for(profile, claim)?;
        let version = self.config.offchain_version;
        let salt = match version {
            OffchainVersion::V1 => None,
            OffchainVersion::V2 => Some(B256::from(rand::random::<[u8; 32]>())),
        };

        let attestation = self
            .signer
            .sign_direct(&request, unix_now(), version, salt, &self.attester)?;
        debug!(uid = %attestation.uid, version = %version, "off-ledger attestation signed");

        let outcome = self
            .publisher
            .publish(attestation, self.attester.address())
            .await?;

        Ok(OffchainOutcome {
            signed_attestation: outcome.package.sig,
            locator_url: outcome.locator_url,
            upload_succeeded: outcome.upload_succeeded,
        })
    }

    /// Attester signs, relayer submits and pays
    pub async fn delegate_attestation(&self, profile: &SchemaProfile, claim: &Claim) -> Result<DelegatedOutcome> {
        let request = self.request_for(profile, claim)?;
        let attester = self.attester.address();
        let target = &profile.delegation;

        let _guard = self.nonces.lock(attester).await;

        let mut attempt = 0;
        loop {
            attempt += 1;

            let nonce = self.nonces.current_nonce(attester).await?;
            let deadline = self.delegation_deadline(unix_now());
            let delegated = self
                .signer
                .sign_delegated(&request, nonce, deadline, target, &self.attester)?;

            let pending = match self.relay.relay(&delegated, &self.relayer).await {
                Ok(pending) => pending,
                Err(err) => {
                    let err = self.relay.classify_rejection(err, &delegated, &self.nonces).await;
                    if err.is_retryable() && attempt < self.config.nonce_retry_limit {
                        warn!(attempt = attempt, error = %err, "re-signing delegated attestation");
                        continue;
                    }
                    return Err(err);
                }
            };

            let receipt = self.finalize(&pending).await?;
            let uid = Self::attestation_uid(&receipt)?;
            info!(
                uid = %uid,
                attester = %attester,
                nonce = %nonce,
                attempts = attempt,
                "delegated attestation recorded"
            );
            return Ok(DelegatedOutcome {
                uid,
                tx_hash: receipt.tx_hash,
                nonce,
                attempts: attempt,
            });
        }
    }

    // ========================================================================
    // Schema administration and revocation
    // ========================================================================

    pub async fn register_schema(&self, spec: &str, resolver: Address, revocable: bool) -> Result<SchemaOutcome> {
        let schema = Schema::parse(spec)?;
        let schema_uid = schema.uid(&resolver, revocable);

        let receipt = self
            .submit_and_finalize(
                LedgerCall::RegisterSchema {
                    registry: self.config.schema_registry,
                    spec: schema.spec().to_string(),
                    resolver,
                    revocable,
                },
                &self.attester,
            )
            .await?;

        info!(schema_uid = %schema_uid, "schema registered");
        Ok(SchemaOutcome {
            schema_uid,
            tx_hash: receipt.tx_hash,
        })
    }

    pub async fn update_target_attester(&self, profile: &SchemaProfile, target: Address) -> Result<TxOutcome> {
        if !profile.has_resolver() {
            return Err(NotaryError::validation(
                "newTargetAttester",
                format!("Profile `{}` has no resolver.", profile.name),
            ));
        }
        let receipt = self
            .submit_and_finalize(
                LedgerCall::SetTargetAttester {
                    resolver: profile.resolver,
                    attester: target,
                },
                &self.attester,
            )
            .await?;
        Ok(TxOutcome {
            tx_handle: receipt.tx_hash,
        })
    }

    pub async fn revoke_offchain(&self, digest: B256) -> Result<TxOutcome> {
        let receipt = self
            .submit_and_finalize(
                LedgerCall::RevokeOffchain {
                    eas: self.config.eas,
                    digest,
                },
                &self.attester,
            )
            .await?;
        Ok(TxOutcome {
            tx_handle: receipt.tx_hash,
        })
    }

    pub async fn revoke_onchain(&self, uid: B256, schema: B256) -> Result<TxOutcome> {
        let receipt = self
            .submit_and_finalize(
                LedgerCall::Revoke {
                    eas: self.config.eas,
                    schema,
                    uid,
                },
                &self.attester,
            )
            .await?;
        Ok(TxOutcome {
            tx_handle: receipt.tx_hash,
        })
    }
}
