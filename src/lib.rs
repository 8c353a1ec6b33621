//! Notary - delegated attestation relay for meeting claims
//!
//! Notary turns meeting claims into schema-typed attestations and records
//! them three ways:
//!
//! - **Direct**: the attester signs and submits its own transaction
//! - **Off-ledger**: the attester signs, the claim is published to an index
//!   and addressed by a self-contained locator URL
//! - **Delegated**: the attester signs, a separate relayer submits and pays
//!
//! Schema registration, resolver administration and revocation are exposed
//! beside the attestation flows.

pub mod codec;
pub mod config;
pub mod ledger;
pub mod publish;
pub mod relay;
pub mod routes;
pub mod server;
pub mod services;
pub mod signing;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{NotaryError, Result};
