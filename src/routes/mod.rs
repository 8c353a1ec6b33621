//! HTTP routes for Notary
//!
//! Every JSON route answers with an envelope carrying `success`. Handlers
//! take the already collected body so they can be driven without a socket.

pub mod admin;
pub mod attest;
pub mod health;

pub use admin::{handle_register_schema, handle_revoke_offchain, handle_revoke_onchain, handle_update_target_attester};
pub use attest::{handle_attest_offchain, handle_attest_onchain, handle_delegate_attestation};
pub use health::{health_check, list_profiles, version_info};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use tracing::{error, warn};

use crate::types::{NotaryError, Result};

/// Query string accepted by profile-aware routes
#[derive(Debug, Default, Deserialize)]
pub struct ProfileQuery {
    pub profile: Option<String>,
}

impl ProfileQuery {
    pub fn parse(query: Option<&str>) -> Result<Self> {
        match query {
            None | Some("") => Ok(Self::default()),
            Some(raw) => serde_urlencoded::from_str(raw)
                .map_err(|e| NotaryError::BadRequest(format!("invalid query string: {e}"))),
        }
    }
}

/// Parse a request body as JSON
pub fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T> {
    if body.is_empty() {
        return Err(NotaryError::BadRequest("request body is empty".to_string()));
    }
    Ok(serde_json::from_slice(body)?)
}

/// Require a non-empty string member
pub fn require_field(field: &str, value: Option<String>) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(NotaryError::validation(field, format!("{field} is required."))),
    }
}

pub fn json_response(status: StatusCode, body: &JsonValue) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

/// 200 with the outcome's members next to `success: true`
pub fn success_response<T: Serialize>(outcome: &T) -> Response<Full<Bytes>> {
    let mut body = match serde_json::to_value(outcome) {
        Ok(JsonValue::Object(map)) => JsonValue::Object(map),
        Ok(other) => json!({ "result": other }),
        Err(e) => return error_response(&NotaryError::Internal(format!("response serialization: {e}"))),
    };
    body["success"] = JsonValue::Bool(true);
    json_response(StatusCode::OK, &body)
}

/// Failure envelope for `err`
pub fn error_response(err: &NotaryError) -> Response<Full<Bytes>> {
    let status = err.status_code();
    let body = match err {
        NotaryError::Validation { field, message } => json!({
            "success": false,
            "error": message,
            "field": field,
        }),
        other => json!({
            "success": false,
            "error": other.to_string(),
            "kind": other.kind(),
        }),
    };

    if status.is_server_error() {
        error!(kind = err.kind(), error = %err, "request failed");
    } else {
        warn!(kind = err.kind(), error = %err, "request rejected");
    }
    json_response(status, &body)
}

/// Collapse a handler result into a response
pub fn respond<T: Serialize>(result: Result<T>) -> Response<Full<Bytes>> {
    match result {
        Ok(outcome) => success_response(&outcome),
        Err(err) => error_response(&err),
    }
}
