//! JSON-RPC ledger adapter
//!
//! Translates [`LedgerCall`]s into registry contract calls generated by
//! `sol!` and drives them through an alloy provider. Calls are pre-flighted
//! with `eth_estimateGas` so reverts are reported before anything is
//! broadcast, then signed locally by the sender's wallet.
//!
//! Outgoing transactions are serialized per sender: the transaction nonce is
//! read with `pending` and held until the node has accepted the broadcast.

use alloy::network::{EthereumWallet, ReceiptResponse, TransactionBuilder};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::client::RpcClient;
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::{Revert, SolCall, SolError, SolEvent};
use alloy::transports::http::Http;
use alloy::transports::TransportError;
use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use super::{LedgerCall, LedgerGateway, PendingSubmission, Receipt};
use crate::signing::{AttestationRequest, DelegatedAttestation, Wallet};
use crate::types::{NotaryError, Result, SubmissionFailure};

mod contracts {
    alloy::sol! {
        struct AttestationRequestData {
            address recipient;
            uint64 expirationTime;
            bool revocable;
            bytes32 refUID;
            bytes data;
            uint256 value;
        }

        struct AttestationRequest {
            bytes32 schema;
            AttestationRequestData data;
        }

        struct Signature {
            uint8 v;
            bytes32 r;
            bytes32 s;
        }

        struct DelegatedAttestationRequest {
            bytes32 schema;
            AttestationRequestData data;
            Signature signature;
            address attester;
            uint64 deadline;
        }

        struct RevocationRequestData {
            bytes32 uid;
            uint256 value;
        }

        struct RevocationRequest {
            bytes32 schema;
            RevocationRequestData data;
        }

        event Attested(address indexed recipient, address indexed attester, bytes32 uid, bytes32 indexed schemaUID);

        error AccessDenied();
        error AlreadyExists();
        error AlreadyRevoked();
        error AlreadyRevokedOffchain();
        error DeadlineExpired();
        error InsufficientValue();
        error InvalidSchema();
        error InvalidSignature();
        error Irrevocable();
        error NotFound();
        error UsedSignature();

        /// Registry, and the proxy which shares its delegated entry point
        interface IEAS {
            function attest(AttestationRequest request) external payable returns (bytes32 uid);
            function attestByDelegation(DelegatedAttestationRequest delegatedRequest) external payable returns (bytes32 uid);
            function revoke(RevocationRequest request) external payable;
            function revokeOffchain(bytes32 data) external returns (uint64 timestamp);
            function getNonce(address account) external view returns (uint256 nonce);
        }

        interface ISchemaRegistry {
            function register(string schema, address resolver, bool revocable) external returns (bytes32 uid);
        }

        interface ITargetAttesterResolver {
            function setTargetAttester(address attester) external;
        }
    }
}

use contracts::{IEAS, ISchemaRegistry, ITargetAttesterResolver};

/// Registry and proxy custom errors
const REVERT_ERRORS: &[([u8; 4], &str, SubmissionFailure)] = &[
    (contracts::DeadlineExpired::SELECTOR, "DeadlineExpired", SubmissionFailure::DeadlineExpired),
    (contracts::InvalidSignature::SELECTOR, "InvalidSignature", SubmissionFailure::InvalidSignature),
    (contracts::UsedSignature::SELECTOR, "UsedSignature", SubmissionFailure::SignatureReused),
    (contracts::InvalidSchema::SELECTOR, "InvalidSchema", SubmissionFailure::InvalidSchema),
    (contracts::NotFound::SELECTOR, "NotFound", SubmissionFailure::NotFound),
    (contracts::AlreadyRevoked::SELECTOR, "AlreadyRevoked", SubmissionFailure::AlreadyRevoked),
    (contracts::AlreadyRevokedOffchain::SELECTOR, "AlreadyRevokedOffchain", SubmissionFailure::AlreadyRevoked),
    (contracts::Irrevocable::SELECTOR, "Irrevocable", SubmissionFailure::Irrevocable),
    (contracts::AccessDenied::SELECTOR, "AccessDenied", SubmissionFailure::AccessDenied),
    (contracts::AlreadyExists::SELECTOR, "AlreadyExists", SubmissionFailure::AlreadyExists),
    (contracts::InsufficientValue::SELECTOR, "InsufficientValue", SubmissionFailure::FeeTooLow),
];

/// JSON-RPC adapter settings
#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub url: String,
    /// Registry whose `Attested` events carry attestation UIDs
    pub eas: Address,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
    /// Receipt polling interval
    pub poll_interval: Duration,
    /// Gas limit = estimate * percent / 100
    pub gas_multiplier_percent: u64,
    /// Skip `eth_chainId` when known
    pub chain_id: Option<u64>,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8545".to_string(),
            eas: Address::ZERO,
            request_timeout: Duration::from_secs(15),
            poll_interval: Duration::from_secs(2),
            gas_multiplier_percent: 120,
            chain_id: None,
        }
    }
}

pub struct JsonRpcLedger {
    provider: RootProvider<Http<reqwest::Client>>,
    config: RpcConfig,
    chain_id: OnceCell<u64>,
    send_locks: DashMap<Address, Arc<Mutex<()>>>,
}

impl JsonRpcLedger {
    pub fn new(config: RpcConfig) -> Result<Self> {
        let url = reqwest::Url::parse(&config.url)
            .map_err(|e| NotaryError::Config(format!("RPC URL `{}`: {e}", config.url)))?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(format!("notary/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NotaryError::Config(format!("RPC HTTP client: {e}")))?;
        let provider = RootProvider::new(RpcClient::new(Http::with_client(client, url), false));

        let chain_id = match config.chain_id {
            Some(id) => OnceCell::new_with(Some(id)),
            None => OnceCell::new(),
        };

        Ok(Self {
            provider,
            config,
            chain_id,
            send_locks: DashMap::new(),
        })
    }

    fn send_lock(&self, sender: Address) -> Arc<Mutex<()>> {
        self.send_locks
            .entry(sender)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Pull the `Attested` UID out of a receipt, ignoring events from other contracts
    fn receipt_from_rpc(&self, receipt: &TransactionReceipt) -> Result<Receipt> {
        if !receipt.status() {
            return Err(NotaryError::submission(
                SubmissionFailure::Reverted,
                format!("transaction {} reverted", receipt.transaction_hash),
            ));
        }

        let attestation_uid = receipt
            .inner
            .logs()
            .iter()
            .filter(|log| log.inner.address == self.config.eas)
            .find_map(|log| contracts::Attested::decode_log_data(&log.inner.data, true).ok())
            .map(|event| event.uid);

        Ok(Receipt {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number.unwrap_or_default(),
            gas_used: receipt.gas_used as u64,
            attestation_uid,
        })
    }
}

#[async_trait]
impl LedgerGateway for JsonRpcLedger {
    fn name(&self) -> &'static str {
        "json-rpc"
    }

    async fn chain_id(&self) -> Result<u64> {
        let id = self
            .chain_id
            .get_or_try_init(|| async {
                self.provider
                    .get_chain_id()
                    .await
                    .map_err(|e| rpc_error("eth_chainId", e))
            })
            .await?;
        Ok(*id)
    }

    async fn nonce(&self, eas: Address, attester: Address) -> Result<U256> {
        let tx = TransactionRequest::default()
            .with_to(eas)
            .with_input(IEAS::getNonceCall { account: attester }.abi_encode());
        let output = self
            .provider
            .call(&tx)
            .await
            .map_err(|e| rpc_error("eth_call", e))?;
        let decoded = IEAS::getNonceCall::abi_decode_returns(&output, true)
            .map_err(|e| NotaryError::Ledger(format!("getNonce returned malformed data: {e}")))?;
        Ok(decoded.nonce)
    }

    async fn submit(&self, call: LedgerCall, sender: &Wallet) -> Result<PendingSubmission> {
        let chain_id = self.chain_id().await?;
        let label = call.label();
        let from = sender.address();

        let tx = TransactionRequest::default()
            .with_from(from)
            .with_to(call.to())
            .with_value(call_value(&call))
            .with_input(calldata(&call));

        // Pre-flight: reverts surface here with their custom error
        let estimate = self
            .provider
            .estimate_gas(&tx)
            .await
            .map_err(|e| rpc_error("eth_estimateGas", e))?;
        let gas_limit = u64::try_from(estimate)
            .map_err(|_| NotaryError::Ledger("gas estimate out of range".to_string()))?
            .saturating_mul(self.config.gas_multiplier_percent)
            / 100;
        let gas_price = self
            .provider
            .get_gas_price()
            .await
            .map_err(|e| rpc_error("eth_gasPrice", e))?;

        let lock = self.send_lock(from);
        let _guard = lock.lock().await;

        let tx_nonce = self
            .provider
            .get_transaction_count(from)
            .pending()
            .await
            .map_err(|e| rpc_error("eth_getTransactionCount", e))?;

        let wallet = EthereumWallet::from(PrivateKeySigner::from_signing_key(sender.signing_key().clone()));
        let envelope = tx
            .with_chain_id(chain_id)
            .with_nonce(tx_nonce)
            .with_gas_limit(gas_limit)
            .with_gas_price(gas_price)
            .build(&wallet)
            .await
            .map_err(|e| NotaryError::Signing(format!("building {label} transaction: {e}")))?;

        let broadcast = self
            .provider
            .send_tx_envelope(envelope)
            .await
            .map_err(|e| rpc_error("eth_sendRawTransaction", e))?;
        let tx_hash = *broadcast.tx_hash();

        info!(
            tx = %tx_hash,
            call = label,
            sender = %from,
            gas_limit = gas_limit,
            "transaction broadcast"
        );

        Ok(PendingSubmission {
            tx_hash,
            sender: from,
            call: label,
        })
    }

    async fn finalize(&self, pending: &PendingSubmission) -> Result<Receipt> {
        loop {
            let receipt = self
                .provider
                .get_transaction_receipt(pending.tx_hash)
                .await
                .map_err(|e| rpc_error("eth_getTransactionReceipt", e))?;

            if let Some(receipt) = receipt {
                return self.receipt_from_rpc(&receipt);
            }

            let known = self
                .provider
                .get_transaction_by_hash(pending.tx_hash)
                .await
                .map_err(|e| rpc_error("eth_getTransactionByHash", e))?;
            if known.is_none() {
                return Err(NotaryError::submission(
                    SubmissionFailure::Dropped,
                    format!("transaction {} is no longer known to the node", pending.tx_hash),
                ));
            }

            debug!(tx = %pending.tx_hash, "awaiting receipt");
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

// ============================================================================
// Call translation
// ============================================================================

fn request_data(request: &AttestationRequest) -> contracts::AttestationRequestData {
    contracts::AttestationRequestData {
        recipient: request.recipient,
        expirationTime: request.expiration_time,
        revocable: request.revocable,
        refUID: request.ref_uid,
        data: Bytes::from(request.data.clone()),
        value: request.value,
    }
}

fn delegated_request(delegated: &DelegatedAttestation) -> contracts::DelegatedAttestationRequest {
    let sig = &delegated.signature;
    contracts::DelegatedAttestationRequest {
        schema: delegated.request.schema,
        data: request_data(&delegated.request),
        signature: contracts::Signature {
            v: sig.v,
            r: sig.r,
            s: sig.s,
        },
        attester: delegated.attester,
        deadline: delegated.deadline,
    }
}

/// Contract calldata for `call`
pub fn calldata(call: &LedgerCall) -> Vec<u8> {
    match call {
        LedgerCall::Attest { request, .. } => IEAS::attestCall {
            request: contracts::AttestationRequest {
                schema: request.schema,
                data: request_data(request),
            },
        }
        .abi_encode(),
        LedgerCall::AttestByDelegation { delegated, .. } | LedgerCall::AttestByDelegationProxy { delegated, .. } => {
            IEAS::attestByDelegationCall {
                delegatedRequest: delegated_request(delegated),
            }
            .abi_encode()
        }
        LedgerCall::Revoke { schema, uid, .. } => IEAS::revokeCall {
            request: contracts::RevocationRequest {
                schema: *schema,
                data: contracts::RevocationRequestData {
                    uid: *uid,
                    value: U256::ZERO,
                },
            },
        }
        .abi_encode(),
        LedgerCall::RevokeOffchain { digest, .. } => IEAS::revokeOffchainCall { data: *digest }.abi_encode(),
        LedgerCall::RegisterSchema {
            spec,
            resolver,
            revocable,
            ..
        } => ISchemaRegistry::registerCall {
            schema: spec.clone(),
            resolver: *resolver,
            revocable: *revocable,
        }
        .abi_encode(),
        LedgerCall::SetTargetAttester { attester, .. } => {
            ITargetAttesterResolver::setTargetAttesterCall { attester: *attester }.abi_encode()
        }
    }
}

fn call_value(call: &LedgerCall) -> U256 {
    match call {
        LedgerCall::Attest { request, .. } => request.value,
        LedgerCall::AttestByDelegation { delegated, .. }
        | LedgerCall::AttestByDelegationProxy { delegated, .. } => delegated.request.value,
        _ => U256::ZERO,
    }
}

// ============================================================================
// Error mapping
// ============================================================================

/// Map a node error to a submission failure when it carries revert data
fn rpc_error(method: &str, err: TransportError) -> NotaryError {
    let Some(payload) = err.as_error_resp() else {
        return NotaryError::Ledger(format!("{method} failed: {err}"));
    };

    if let Some(data) = payload.as_revert_data() {
        return decode_revert(&data, &payload.message);
    }

    let lower = payload.message.to_ascii_lowercase();
    if lower.contains("insufficient funds") || lower.contains("underpriced") || lower.contains("fee too low") {
        return NotaryError::submission(SubmissionFailure::FeeTooLow, payload.message.to_string());
    }
    if lower.contains("execution reverted") {
        return NotaryError::submission(SubmissionFailure::Reverted, payload.message.to_string());
    }
    NotaryError::Ledger(format!("{} failed ({}): {}", method, payload.code, payload.message))
}

/// Decode revert data into a submission failure
pub fn decode_revert(data: &[u8], fallback: &str) -> NotaryError {
    let Some(prefix) = data.get(..4) else {
        return NotaryError::submission(SubmissionFailure::Reverted, fallback);
    };

    if let Some((_, name, kind)) = REVERT_ERRORS.iter().find(|(selector, ..)| selector == prefix) {
        return NotaryError::submission(*kind, *name);
    }

    match Revert::abi_decode(data, true) {
        Ok(revert) => NotaryError::submission(SubmissionFailure::Reverted, revert.reason),
        Err(_) => NotaryError::submission(SubmissionFailure::Reverted, fallback),
    }
}
