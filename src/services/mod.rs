//! Services for Notary

pub mod attestation;

pub use attestation::{
    AttestationService, DelegatedOutcome, OffchainOutcome, OnchainOutcome, SchemaOutcome, ServiceConfig, TxOutcome,
};
