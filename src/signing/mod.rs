//! Signing identities, typed-data hashing, attestation signing and nonces

pub mod nonce;
pub mod signer;
pub mod typed_data;
pub mod wallet;

pub use nonce::NonceTracker;
pub use signer::{
    offchain_uid, AttestationRequest, AttestationSigner, DelegatedAttestation, DelegationTarget,
    OffchainAttestation, OffchainVersion,
};
pub use typed_data::Eip712Domain;
pub use wallet::{recover, verify, Signature, Wallet};
