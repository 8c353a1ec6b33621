//! Claim routes
//!
//! `/attestOnchain`, `/attestOffchain` and `/delegateAttestationOnchain`
//! share one shape: validate the claim, pick the profile, run the flow.

use bytes::Bytes;
use http_body_util::Full;
use hyper::Response;
use serde_json::Value as JsonValue;
use std::sync::Arc;

use super::{parse_body, respond, ProfileQuery};
use crate::codec::Claim;
use crate::config::SchemaProfile;
use crate::server::AppState;
use crate::types::Result;

fn prepare<'a>(state: &'a AppState, query: Option<&str>, body: &Bytes) -> Result<(&'a SchemaProfile, Claim)> {
    let query = ProfileQuery::parse(query)?;
    let json: JsonValue = parse_body(body)?;
    let claim = Claim::from_json(&json)?;
    let profile = state.service.profile(query.profile.as_deref())?;
    Ok((profile, claim))
}

pub async fn handle_attest_onchain(state: Arc<AppState>, query: Option<&str>, body: Bytes) -> Response<Full<Bytes>> {
    let result = match prepare(&state, query, &body) {
        Ok((profile, claim)) => state.service.attest_onchain(profile, &claim).await,
        Err(e) => Err(e),
    };
    respond(result)
}

pub async fn handle_attest_offchain(state: Arc<AppState>, query: Option<&str>, body: Bytes) -> Response<Full<Bytes>> {
    let result = match prepare(&state, query, &body) {
        Ok((profile, claim)) => state.service.attest_offchain(profile, &claim).await,
        Err(e) => Err(e),
    };
    respond(result)
}

pub async fn handle_delegate_attestation(
    state: Arc<AppState>,
    query: Option<&str>,
    body: Bytes,
) -> Response<Full<Bytes>> {
    let result = match prepare(&state, query, &body) {
        Ok((profile, claim)) => state.service.delegate_attestation(profile, &claim).await,
        Err(e) => Err(e),
    };
    respond(result)
}
