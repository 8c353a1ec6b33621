//! Schema codec
//!
//! Turns validated meeting claims into the canonical byte layout a registered
//! schema expects. Any deviation in width or field order yields bytes that
//! belong to a different schema, so layouts are resolved from the schema spec
//! and never guessed.

pub mod abi;
pub mod claim;
pub mod encoder;
pub mod schema;

pub use claim::Claim;
pub use encoder::{decode, encode, EncodedPayload, MeetingFields, MeetingLayout};
pub use schema::{schema_uid, FieldType, Schema, SchemaField};
