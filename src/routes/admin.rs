//! Schema administration and revocation routes

use alloy_primitives::Address;
use bytes::Bytes;
use http_body_util::Full;
use hyper::Response;
use serde::Deserialize;
use std::sync::Arc;

use super::{parse_body, require_field, respond, ProfileQuery};
use crate::server::AppState;
use crate::services::{SchemaOutcome, TxOutcome};
use crate::types::{parse_address, parse_b256, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterSchemaBody {
    schema_field_spec: Option<String>,
    resolver_address: Option<String>,
    #[serde(default)]
    revocable: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetAttesterBody {
    new_target_attester: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RevokeOffchainBody {
    attestation_digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RevokeOnchainBody {
    #[serde(rename = "attestationUID")]
    attestation_uid: Option<String>,
    #[serde(rename = "schemaId")]
    schema_id: Option<String>,
}

async fn register_schema(state: &AppState, body: &Bytes) -> Result<SchemaOutcome> {
    let body: RegisterSchemaBody = parse_body(body)?;
    let spec = require_field("schemaFieldSpec", body.schema_field_spec)?;
    let resolver = match body.resolver_address.as_deref() {
        None | Some("") => Address::ZERO,
        Some(raw) => parse_address("resolverAddress", raw)?,
    };
    state.service.register_schema(&spec, resolver, body.revocable).await
}

async fn update_target_attester(state: &AppState, query: Option<&str>, body: &Bytes) -> Result<TxOutcome> {
    let query = ProfileQuery::parse(query)?;
    let body: TargetAttesterBody = parse_body(body)?;
    let raw = require_field("newTargetAttester", body.new_target_attester)?;
    let target = parse_address("newTargetAttester", &raw)?;
    let profile = state.service.profile(query.profile.as_deref())?;
    state.service.update_target_attester(profile, target).await
}

async fn revoke_offchain(state: &AppState, body: &Bytes) -> Result<TxOutcome> {
    let body: RevokeOffchainBody = parse_body(body)?;
    let raw = require_field("attestationDigest", body.attestation_digest)?;
    let digest = parse_b256("attestationDigest", &raw)?;
    state.service.revoke_offchain(digest).await
}

async fn revoke_onchain(state: &AppState, body: &Bytes) -> Result<TxOutcome> {
    let body: RevokeOnchainBody = parse_body(body)?;
    let uid = parse_b256("attestationUID", &require_field("attestationUID", body.attestation_uid)?)?;
    let schema = parse_b256("schemaId", &require_field("schemaId", body.schema_id)?)?;
    state.service.revoke_onchain(uid, schema).await
}

pub async fn handle_register_schema(state: Arc<AppState>, body: Bytes) -> Response<Full<Bytes>> {
    respond(register_schema(&state, &body).await)
}

pub async fn handle_update_target_attester(
    state: Arc<AppState>,
    query: Option<&str>,
    body: Bytes,
) -> Response<Full<Bytes>> {
    respond(update_target_attester(&state, query, &body).await)
}

pub async fn handle_revoke_offchain(state: Arc<AppState>, body: Bytes) -> Response<Full<Bytes>> {
    respond(revoke_offchain(&state, &body).await)
}

pub async fn handle_revoke_onchain(state: Arc<AppState>, body: Bytes) -> Response<Full<Bytes>> {
    respond(revoke_onchain(&state, &body).await)
}
