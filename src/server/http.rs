//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo. Each connection is served on its own task;
//! requests are routed on (method, path) after the body has been collected.

use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::header::HeaderValue;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::Args;
use crate::routes;
use crate::services::AttestationService;
use crate::types::NotaryError;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Largest accepted request body
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Signing identities, ledger gateway and publisher, built once at startup
    pub service: Arc<AttestationService>,
    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    pub fn new(args: Args, service: Arc<AttestationService>) -> Self {
        Self {
            args,
            service,
            started_at: Instant::now(),
        }
    }
}

/// Run the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), NotaryError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Notary listening on {} (ledger: {}, chain {})",
        state.args.listen,
        state.service.ledger_name(),
        state.service.chain_id()
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - in-memory ledger, keys may be ephemeral");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);
    let request_id = uuid::Uuid::new_v4();

    info!("[{}] {} {} ({})", addr, method, path, request_id);

    let body = if method == Method::POST {
        match Limited::new(req.into_body(), MAX_BODY_BYTES).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!("[{}] unreadable request body: {}", addr, e);
                return Ok(to_boxed(payload_error_response()));
            }
        }
    } else {
        Bytes::new()
    };

    let mut response = route(state, &method, &path, query.as_deref(), body).await;
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert("X-Request-Id", value);
    }
    Ok(to_boxed(response))
}

/// Dispatch one request with its collected body
pub async fn route(
    state: Arc<AppState>,
    method: &Method,
    path: &str,
    query: Option<&str>,
    body: Bytes,
) -> Response<Full<Bytes>> {
    match (method, path) {
        (&Method::OPTIONS, _) => preflight_response(),

        (&Method::GET, "/health") | (&Method::GET, "/healthz") => routes::health_check(state),
        (&Method::GET, "/version") => routes::version_info(),
        (&Method::GET, "/profiles") => routes::list_profiles(state),

        (&Method::POST, "/attestOnchain") => routes::handle_attest_onchain(state, query, body).await,
        (&Method::POST, "/attestOffchain") => routes::handle_attest_offchain(state, query, body).await,
        (&Method::POST, "/delegateAttestationOnchain") => {
            routes::handle_delegate_attestation(state, query, body).await
        }
        (&Method::POST, "/registerSchema") => routes::handle_register_schema(state, body).await,
        (&Method::POST, "/updateTargetAttester") => {
            routes::handle_update_target_attester(state, query, body).await
        }
        (&Method::POST, "/revokeOffchain") => routes::handle_revoke_offchain(state, body).await,
        (&Method::POST, "/revokeOnchain") => routes::handle_revoke_onchain(state, body).await,

        _ => not_found_response(path),
    }
}

fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "success": false,
        "error": "Not Found",
        "path": path,
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

fn payload_error_response() -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "success": false,
        "error": format!("request body unreadable or larger than {} bytes", MAX_BODY_BYTES),
        "kind": "bad_request",
    });

    Response::builder()
        .status(StatusCode::PAYLOAD_TOO_LARGE)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
