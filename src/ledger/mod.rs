//! Ledger gateway
//!
//! The service talks to the attestation registry through [`LedgerGateway`],
//! a semantic interface: callers describe *what* to record as a
//! [`LedgerCall`], adapters decide how it reaches the ledger.
//!
//! - [`rpc::JsonRpcLedger`] drives the registry contracts through an alloy
//!   provider against a JSON-RPC node.
//! - [`memory::InMemoryLedger`] models the registry in-process for
//!   development mode and tests.
//!
//! Submission and finalization are separate steps so the caller can bound
//! the wait for finality independently of the broadcast.

pub mod memory;
pub mod rpc;

pub use memory::InMemoryLedger;
pub use rpc::{JsonRpcLedger, RpcConfig};

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use serde::Serialize;

use crate::signing::{AttestationRequest, DelegatedAttestation, Wallet};
use crate::types::{b256_hex, Result};

/// A state change requested from the registry contracts
#[derive(Debug, Clone)]
pub enum LedgerCall {
    /// `EAS.attest`, attester = sender
    Attest { eas: Address, request: AttestationRequest },
    /// `EAS.attestByDelegation`, nonce checked by the registry
    AttestByDelegation { eas: Address, delegated: DelegatedAttestation },
    /// `EIP712Proxy.attestByDelegation`, single-use signatures
    AttestByDelegationProxy { proxy: Address, delegated: DelegatedAttestation },
    /// `EAS.revoke`
    Revoke { eas: Address, schema: B256, uid: B256 },
    /// `EAS.revokeOffchain`
    RevokeOffchain { eas: Address, digest: B256 },
    /// `SchemaRegistry.register`
    RegisterSchema {
        registry: Address,
        spec: String,
        resolver: Address,
        revocable: bool,
    },
    /// `resolver.setTargetAttester`
    SetTargetAttester { resolver: Address, attester: Address },
}

impl LedgerCall {
    /// Contract the call is addressed to
    pub fn to(&self) -> Address {
        match self {
            Self::Attest { eas, .. }
            | Self::AttestByDelegation { eas, .. }
            | Self::Revoke { eas, .. }
            | Self::RevokeOffchain { eas, .. } => *eas,
            Self::AttestByDelegationProxy { proxy, .. } => *proxy,
            Self::RegisterSchema { registry, .. } => *registry,
            Self::SetTargetAttester { resolver, .. } => *resolver,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Attest { .. } => "attest",
            Self::AttestByDelegation { .. } => "attestByDelegation",
            Self::AttestByDelegationProxy { .. } => "attestByDelegationProxy",
            Self::Revoke { .. } => "revoke",
            Self::RevokeOffchain { .. } => "revokeOffchain",
            Self::RegisterSchema { .. } => "register",
            Self::SetTargetAttester { .. } => "setTargetAttester",
        }
    }
}

/// A broadcast transaction awaiting finality
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSubmission {
    #[serde(with = "b256_hex")]
    pub tx_hash: B256,
    #[serde(skip)]
    pub sender: Address,
    pub call: &'static str,
}

/// Outcome of a finalized transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: B256,
    pub block_number: u64,
    pub gas_used: u64,
    /// UID from the registry's `Attested` event, when one was emitted
    pub attestation_uid: Option<B256>,
}

#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Short adapter name for logs
    fn name(&self) -> &'static str;

    async fn chain_id(&self) -> Result<u64>;

    /// The registry's current delegation nonce for `attester`
    async fn nonce(&self, eas: Address, attester: Address) -> Result<U256>;

    /// Broadcast `call` signed and paid for by `sender`.
    ///
    /// Rejections known before broadcast surface here as
    /// `NotaryError::Submission`.
    async fn submit(&self, call: LedgerCall, sender: &Wallet) -> Result<PendingSubmission>;

    /// Wait until `pending` is final. Callers bound this with a timeout.
    async fn finalize(&self, pending: &PendingSubmission) -> Result<Receipt>;
}
