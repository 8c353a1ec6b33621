//! Delegation relay
//!
//! A relayer takes an attester's signed request and submits it under its own
//! identity, paying for the transaction. The ledger records the attester as
//! the author.
//!
//! Requests that can never succeed (relayer == attester, a signature that
//! does not recover, an elapsed deadline) are refused before any ledger call.

use alloy_primitives::Address;
use std::sync::Arc;
use tracing::{info, warn};

use crate::ledger::{LedgerCall, LedgerGateway, PendingSubmission};
use crate::signing::{DelegatedAttestation, DelegationTarget, NonceTracker, Wallet};
use crate::types::{unix_now, NotaryError, Result, SubmissionFailure};

pub struct DelegationRelay {
    gateway: Arc<dyn LedgerGateway>,
    eas: Address,
}

impl DelegationRelay {
    pub fn new(gateway: Arc<dyn LedgerGateway>, eas: Address) -> Self {
        Self { gateway, eas }
    }

    /// Ledger call for `delegated`, shaped by its target
    pub fn build_call(&self, delegated: &DelegatedAttestation) -> LedgerCall {
        match &delegated.target {
            DelegationTarget::Eas => LedgerCall::AttestByDelegation {
                eas: self.eas,
                delegated: delegated.clone(),
            },
            DelegationTarget::Proxy { address, .. } => LedgerCall::AttestByDelegationProxy {
                proxy: *address,
                delegated: delegated.clone(),
            },
        }
    }

    /// Checks that need no ledger access
    pub fn precheck(&self, delegated: &DelegatedAttestation, relayer: &Wallet) -> Result<()> {
        if relayer.address() == delegated.attester {
            return Err(NotaryError::Signing(
                "relayer and attester must be distinct identities".to_string(),
            ));
        }
        if !delegated.verify() {
            return Err(NotaryError::submission(
                SubmissionFailure::InvalidSignature,
                "signature does not recover to the attester",
            ));
        }
        if delegated.is_expired(unix_now()) {
            return Err(NotaryError::submission(
                SubmissionFailure::DeadlineExpired,
                format!("deadline {} has passed", delegated.deadline),
            ));
        }
        Ok(())
    }

    /// Verify, then submit `delegated` paid for by `relayer`
    pub async fn relay(&self, delegated: &DelegatedAttestation, relayer: &Wallet) -> Result<PendingSubmission> {
        self.precheck(delegated, relayer)?;

        let call = self.build_call(delegated);
        let pending = self.gateway.submit(call, relayer).await?;
        info!(
            tx = %pending.tx_hash,
            attester = %delegated.attester,
            relayer = %relayer.address(),
            target = delegated.target.label(),
            nonce = %delegated.nonce,
            "delegated attestation relayed"
        );
        Ok(pending)
    }

    /// Re-read the nonce after a rejection to tell a stale nonce apart from a
    /// bad signature. Only registry-target submissions bind a nonce.
    pub async fn classify_rejection(
        &self,
        err: NotaryError,
        delegated: &DelegatedAttestation,
        nonces: &NonceTracker,
    ) -> NotaryError {
        let signature_rejected = matches!(
            &err,
            NotaryError::Submission {
                kind: SubmissionFailure::InvalidSignature,
                ..
            }
        );
        if !signature_rejected || !delegated.target.binds_nonce() {
            return err;
        }

        match nonces.current_nonce(delegated.attester).await {
            Ok(current) if current > delegated.nonce => {
                warn!(
                    attester = %delegated.attester,
                    signed = %delegated.nonce,
                    current = %current,
                    "delegated signature used a stale nonce"
                );
                NotaryError::StaleNonce {
                    signed: delegated.nonce.to_string(),
                    current: current.to_string(),
                }
            }
            Ok(_) => err,
            Err(lookup) => {
                warn!(error = %lookup, "nonce re-read failed while classifying rejection");
                err
            }
        }
    }
}
