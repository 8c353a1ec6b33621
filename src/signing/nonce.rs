//! Delegation nonces
//!
//! The registry owns each attester's nonce. [`NonceTracker`] never caches a
//! value: every read goes to the ledger, and callers that read-sign-submit
//! hold the attester's lock for the whole sequence.

use alloy_primitives::{Address, U256};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::ledger::LedgerGateway;
use crate::types::Result;

pub struct NonceTracker {
    gateway: Arc<dyn LedgerGateway>,
    eas: Address,
    locks: DashMap<Address, Arc<Mutex<()>>>,
}

impl NonceTracker {
    pub fn new(gateway: Arc<dyn LedgerGateway>, eas: Address) -> Self {
        Self {
            gateway,
            eas,
            locks: DashMap::new(),
        }
    }

    /// The attester's nonce as the registry sees it right now
    pub async fn current_nonce(&self, attester: Address) -> Result<U256> {
        let nonce = self.gateway.nonce(self.eas, attester).await?;
        debug!(attester = %attester, nonce = %nonce, "read delegation nonce");
        Ok(nonce)
    }

    /// Exclusive hold on `attester` until the guard drops
    pub async fn lock(&self, attester: Address) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(attester)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    pub fn tracked_attesters(&self) -> usize {
        self.locks.len()
    }
}
