//! In-process model of the attestation registry
//!
//! Applies the registry's rules (schema existence, per-attester nonces,
//! delegated signature checks, proxy single-use signatures, deadlines,
//! revocation) against in-memory state. Used by `--dev-mode` and tests.
//!
//! Calls are applied at submit time; a rejected call never produces a
//! pending transaction.

use alloy_primitives::{keccak256, Address, B256, U256};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

use super::{LedgerCall, LedgerGateway, PendingSubmission, Receipt};
use crate::codec::abi::Packed;
use crate::codec::schema_uid;
use crate::signing::{AttestationRequest, AttestationSigner, DelegatedAttestation, DelegationTarget, Wallet};
use crate::types::{unix_now, NotaryError, Result, SubmissionFailure};

const DEFAULT_GAS: u64 = 120_000;

#[derive(Debug, Clone)]
pub struct SchemaRecord {
    pub spec: String,
    pub resolver: Address,
    pub revocable: bool,
}

#[derive(Debug, Clone)]
pub struct AttestationRecord {
    pub schema: B256,
    pub recipient: Address,
    pub attester: Address,
    pub time: u64,
    pub expiration_time: u64,
    pub revocation_time: u64,
    pub revocable: bool,
    pub ref_uid: B256,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
struct ProxyRecord {
    name: String,
    version: String,
}

#[derive(Debug, Default)]
struct ResolverRecord {
    owner: Address,
    target_attester: Option<Address>,
}

#[derive(Default)]
struct State {
    block: u64,
    tx_count: u64,
    schemas: HashMap<B256, SchemaRecord>,
    attestations: HashMap<B256, AttestationRecord>,
    nonces: HashMap<Address, U256>,
    proxies: HashMap<Address, ProxyRecord>,
    used_signatures: HashSet<(Address, [u8; 65])>,
    offchain_revocations: HashMap<(Address, B256), u64>,
    resolvers: HashMap<Address, ResolverRecord>,
    receipts: HashMap<B256, Receipt>,
    injected_failure: Option<SubmissionFailure>,
}

/// Registry model keyed to one chain and one registry address
pub struct InMemoryLedger {
    chain_id: u64,
    eas: Address,
    registry: Address,
    eas_version: String,
    stall: AtomicBool,
    state: Mutex<State>,
}

impl InMemoryLedger {
    pub fn new(chain_id: u64, eas: Address, registry: Address, eas_version: impl Into<String>) -> Self {
        Self {
            chain_id,
            eas,
            registry,
            eas_version: eas_version.into(),
            stall: AtomicBool::new(false),
            state: Mutex::new(State::default()),
        }
    }

    /// Deploy a delegation proxy with its signing domain
    pub async fn deploy_proxy(&self, address: Address, name: &str, version: &str) {
        self.state.lock().await.proxies.insert(
            address,
            ProxyRecord {
                name: name.to_string(),
                version: version.to_string(),
            },
        );
    }

    /// Register a schema without a transaction (startup seeding)
    pub async fn seed_schema(&self, spec: &str, resolver: Address, revocable: bool) -> B256 {
        let uid = schema_uid(spec, &resolver, revocable);
        self.state.lock().await.schemas.insert(
            uid,
            SchemaRecord {
                spec: spec.to_string(),
                resolver,
                revocable,
            },
        );
        uid
    }

    /// Consume a delegation nonce as an outside submitter would
    pub async fn advance_nonce(&self, attester: Address) {
        let mut state = self.state.lock().await;
        let nonce = state.nonces.entry(attester).or_default();
        *nonce += U256::from(1);
    }

    /// Hold every finalization until released
    pub fn stall_finalization(&self, stalled: bool) {
        self.stall.store(stalled, Ordering::SeqCst);
    }

    /// Reject the next submission with `failure`
    pub async fn inject_failure(&self, failure: SubmissionFailure) {
        self.state.lock().await.injected_failure = Some(failure);
    }

    pub async fn attestation(&self, uid: &B256) -> Option<AttestationRecord> {
        self.state.lock().await.attestations.get(uid).cloned()
    }

    pub async fn schema(&self, uid: &B256) -> Option<SchemaRecord> {
        self.state.lock().await.schemas.get(uid).cloned()
    }

    pub async fn offchain_revocation(&self, revoker: Address, digest: B256) -> Option<u64> {
        self.state.lock().await.offchain_revocations.get(&(revoker, digest)).copied()
    }

    pub async fn target_attester(&self, resolver: Address) -> Option<Address> {
        self.state
            .lock()
            .await
            .resolvers
            .get(&resolver)
            .and_then(|r| r.target_attester)
    }

    fn signer(&self) -> AttestationSigner {
        AttestationSigner::new(self.chain_id, self.eas, self.eas_version.clone())
    }

    fn check_contract(&self, expected: Address, actual: Address) -> Result<()> {
        if expected != actual {
            return Err(reverted(format!("no registry deployed at {actual}")));
        }
        Ok(())
    }

    fn apply(&self, state: &mut State, call: LedgerCall, sender: Address) -> Result<Option<B256>> {
        let now = unix_now();
        match call {
            LedgerCall::Attest { eas, request } => {
                self.check_contract(self.eas, eas)?;
                attest(state, &request, sender, now).map(Some)
            }
            LedgerCall::AttestByDelegation { eas, delegated } => {
                self.check_contract(self.eas, eas)?;
                check_deadline(&delegated, now)?;

                let current = state.nonces.get(&delegated.attester).copied().unwrap_or_default();
                let domain = self.signer().delegation_domain(&DelegationTarget::Eas);
                let expected = DelegatedAttestation {
                    nonce: current,
                    domain,
                    target: DelegationTarget::Eas,
                    ..delegated.clone()
                };
                if !expected.verify() {
                    return Err(NotaryError::submission(
                        SubmissionFailure::InvalidSignature,
                        "signature does not match attester and current nonce",
                    ));
                }

                let uid = attest(state, &delegated.request, delegated.attester, now)?;
                state.nonces.insert(delegated.attester, current + U256::from(1));
                Ok(Some(uid))
            }
            LedgerCall::AttestByDelegationProxy { proxy, delegated } => {
                let record = state
                    .proxies
                    .get(&proxy)
                    .cloned()
                    .ok_or_else(|| reverted(format!("no proxy deployed at {proxy}")))?;
                check_deadline(&delegated, now)?;

                let target = DelegationTarget::Proxy {
                    address: proxy,
                    name: record.name,
                    version: record.version,
                };
                let expected = DelegatedAttestation {
                    domain: self.signer().delegation_domain(&target),
                    target,
                    ..delegated.clone()
                };
                if !expected.verify() {
                    return Err(NotaryError::submission(
                        SubmissionFailure::InvalidSignature,
                        "signature does not recover to attester",
                    ));
                }

                let key = (proxy, delegated.signature.to_bytes());
                if state.used_signatures.contains(&key) {
                    return Err(NotaryError::submission(
                        SubmissionFailure::SignatureReused,
                        "signature already used",
                    ));
                }

                // The proxy is the on-ledger attester of record
                let uid = attest(state, &delegated.request, proxy, now)?;
                state.used_signatures.insert(key);
                Ok(Some(uid))
            }
            LedgerCall::Revoke { eas, schema, uid } => {
                self.check_contract(self.eas, eas)?;
                revoke(state, schema, uid, sender, now)?;
                Ok(None)
            }
            LedgerCall::RevokeOffchain { eas, digest } => {
                self.check_contract(self.eas, eas)?;
                if state.offchain_revocations.contains_key(&(sender, digest)) {
                    return Err(NotaryError::submission(
                        SubmissionFailure::AlreadyRevoked,
                        "digest already revoked off-ledger",
                    ));
                }
                state.offchain_revocations.insert((sender, digest), now);
                Ok(None)
            }
            LedgerCall::RegisterSchema {
                registry,
                spec,
                resolver,
                revocable,
            } => {
                self.check_contract(self.registry, registry)?;
                let uid = schema_uid(&spec, &resolver, revocable);
                if state.schemas.contains_key(&uid) {
                    return Err(NotaryError::submission(
                        SubmissionFailure::AlreadyExists,
                        "schema already registered",
                    ));
                }
                state.schemas.insert(
                    uid,
                    SchemaRecord {
                        spec,
                        resolver,
                        revocable,
                    },
                );
                Ok(None)
            }
            LedgerCall::SetTargetAttester { resolver, attester } => {
                let record = state.resolvers.entry(resolver).or_insert_with(|| ResolverRecord {
                    owner: sender,
                    target_attester: None,
                });
                if record.owner != sender {
                    return Err(NotaryError::submission(
                        SubmissionFailure::AccessDenied,
                        "only the resolver owner may change the target attester",
                    ));
                }
                record.target_attester = Some(attester);
                Ok(None)
            }
        }
    }
}

fn reverted(message: String) -> NotaryError {
    NotaryError::submission(SubmissionFailure::Reverted, message)
}

fn check_deadline(delegated: &DelegatedAttestation, now: u64) -> Result<()> {
    if delegated.is_expired(now) {
        return Err(NotaryError::submission(
            SubmissionFailure::DeadlineExpired,
            format!("deadline {} passed", delegated.deadline),
        ));
    }
    Ok(())
}

fn attest(state: &mut State, request: &AttestationRequest, attester: Address, now: u64) -> Result<B256> {
    let schema = state.schemas.get(&request.schema).ok_or_else(|| {
        NotaryError::submission(SubmissionFailure::InvalidSchema, "schema is not registered")
    })?;

    if request.expiration_time != 0 && request.expiration_time <= now {
        return Err(reverted("expiration time is in the past".into()));
    }
    if request.revocable && !schema.revocable {
        return Err(NotaryError::submission(
            SubmissionFailure::Irrevocable,
            "schema does not allow revocable attestations",
        ));
    }
    if request.ref_uid != B256::ZERO && !state.attestations.contains_key(&request.ref_uid) {
        return Err(NotaryError::submission(
            SubmissionFailure::NotFound,
            "referenced attestation does not exist",
        ));
    }
    if let Some(target) = state
        .resolvers
        .get(&schema.resolver)
        .and_then(|r| r.target_attester)
    {
        if target != attester {
            return Err(NotaryError::submission(
                SubmissionFailure::AccessDenied,
                "resolver rejected attester",
            ));
        }
    }

    let record = AttestationRecord {
        schema: request.schema,
        recipient: request.recipient,
        attester,
        time: now,
        expiration_time: request.expiration_time,
        revocation_time: 0,
        revocable: request.revocable,
        ref_uid: request.ref_uid,
        data: request.data.clone(),
    };

    let mut bump = 0u32;
    let uid = loop {
        let uid = attestation_uid(&record, bump);
        if !state.attestations.contains_key(&uid) {
            break uid;
        }
        bump += 1;
    };
    state.attestations.insert(uid, record);
    Ok(uid)
}

fn revoke(state: &mut State, schema: B256, uid: B256, sender: Address, now: u64) -> Result<()> {
    let record = state
        .attestations
        .get_mut(&uid)
        .ok_or_else(|| NotaryError::submission(SubmissionFailure::NotFound, "attestation not found"))?;

    if record.schema != schema {
        return Err(NotaryError::submission(
            SubmissionFailure::InvalidSchema,
            "attestation belongs to another schema",
        ));
    }
    if record.attester != sender {
        return Err(NotaryError::submission(
            SubmissionFailure::AccessDenied,
            "only the attester may revoke",
        ));
    }
    if !record.revocable {
        return Err(NotaryError::submission(
            SubmissionFailure::Irrevocable,
            "attestation is irrevocable",
        ));
    }
    if record.revocation_time != 0 {
        return Err(NotaryError::submission(
            SubmissionFailure::AlreadyRevoked,
            "attestation already revoked",
        ));
    }
    record.revocation_time = now;
    Ok(())
}

/// Registry UID of an on-ledger attestation
pub fn attestation_uid(record: &AttestationRecord, bump: u32) -> B256 {
    Packed::new()
        .bytes(record.schema.as_slice())
        .address(&record.recipient)
        .address(&record.attester)
        .u64(record.time)
        .u64(record.expiration_time)
        .bool(record.revocable)
        .bytes(record.ref_uid.as_slice())
        .bytes(&record.data)
        .u32(bump)
        .keccak()
}

#[async_trait]
impl LedgerGateway for InMemoryLedger {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(self.chain_id)
    }

    async fn nonce(&self, eas: Address, attester: Address) -> Result<U256> {
        self.check_contract(self.eas, eas)?;
        Ok(self.state.lock().await.nonces.get(&attester).copied().unwrap_or_default())
    }

    async fn submit(&self, call: LedgerCall, sender: &Wallet) -> Result<PendingSubmission> {
        let label = call.label();
        let mut state = self.state.lock().await;

        if let Some(failure) = state.injected_failure.take() {
            return Err(NotaryError::submission(failure, "injected failure"));
        }

        let attestation_uid = self.apply(&mut state, call, sender.address())?;

        state.tx_count += 1;
        state.block += 1;
        let mut seed = sender.address().to_vec();
        seed.extend_from_slice(&state.tx_count.to_be_bytes());
        let tx_hash = keccak256(seed);

        let receipt = Receipt {
            tx_hash,
            block_number: state.block,
            gas_used: DEFAULT_GAS,
            attestation_uid,
        };
        state.receipts.insert(tx_hash, receipt);
        debug!(tx = %tx_hash, call = label, "memory ledger applied call");

        Ok(PendingSubmission {
            tx_hash,
            sender: sender.address(),
            call: label,
        })
    }

    async fn finalize(&self, pending: &PendingSubmission) -> Result<Receipt> {
        if self.stall.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
        self.state
            .lock()
            .await
            .receipts
            .get(&pending.tx_hash)
            .cloned()
            .ok_or_else(|| NotaryError::submission(SubmissionFailure::Dropped, "transaction unknown"))
    }
}
