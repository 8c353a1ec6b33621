//! Liveness, build info and profile listing
//!
//! - /health, /healthz - Liveness probe, plus the identities in use
//! - /version - Build metadata captured by build.rs
//! - /profiles - Configured schema profiles and their UIDs

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::config::SchemaProfile;
use crate::server::AppState;
use crate::types::address_string;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    /// Uptime in seconds
    pub uptime: u64,
    pub timestamp: String,
    /// Ledger adapter in use (`json-rpc` or `memory`)
    pub ledger: &'static str,
    pub chain_id: u64,
    pub attester: String,
    pub relayer: String,
    pub dev_mode: bool,
    pub profiles: usize,
}

#[derive(Serialize)]
pub struct VersionResponse {
    pub version: &'static str,
    pub commit: &'static str,
    pub commit_full: &'static str,
    pub build_time: &'static str,
    pub service: &'static str,
}

#[derive(Serialize)]
struct ProfilesResponse<'a> {
    success: bool,
    default: &'a str,
    profiles: Vec<&'a SchemaProfile>,
}

fn ok_json(body: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

pub fn health_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let service = &state.service;
    let response = HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        ledger: service.ledger_name(),
        chain_id: service.chain_id(),
        attester: address_string(&service.attester()),
        relayer: address_string(&service.relayer()),
        dev_mode: state.args.dev_mode,
        profiles: service.profiles().len(),
    };

    let body = serde_json::to_string(&response).unwrap_or_else(|_| r#"{"healthy":true}"#.to_string());
    ok_json(body)
}

pub fn version_info() -> Response<Full<Bytes>> {
    let response = VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
        commit_full: option_env!("GIT_COMMIT_FULL").unwrap_or("unknown"),
        build_time: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
        service: "notary",
    };

    let body = serde_json::to_string(&response)
        .unwrap_or_else(|_| r#"{"version":"unknown","commit":"unknown"}"#.to_string());
    ok_json(body)
}

pub fn list_profiles(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let profiles = state.service.profiles();
    let response = ProfilesResponse {
        success: true,
        default: &profiles.default_profile().name,
        profiles: profiles.iter().collect(),
    };

    let body = serde_json::to_string(&response).unwrap_or_else(|_| r#"{"success":false}"#.to_string());
    ok_json(body)
}
