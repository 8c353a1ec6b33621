//! Error types for Notary
//!
//! Every failure surfaced over HTTP is one of these variants. Validation
//! problems map to 400; everything past validation is a server-side status.

use hyper::StatusCode;
use std::fmt;

/// Reason a ledger (or registry) refused a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionFailure {
    /// Gas price or balance insufficient for the transaction
    FeeTooLow,
    /// Delegated deadline is in the past
    DeadlineExpired,
    /// Signature does not recover to the claimed attester
    InvalidSignature,
    /// Delegation proxy already consumed this signature
    SignatureReused,
    /// Schema UID is not registered
    InvalidSchema,
    /// Attestation UID does not exist
    NotFound,
    /// Attestation (or off-ledger digest) already revoked
    AlreadyRevoked,
    /// Schema or attestation is not revocable
    Irrevocable,
    /// Caller is not allowed to perform the operation
    AccessDenied,
    /// Schema already registered
    AlreadyExists,
    /// Transaction disappeared from the pending pool
    Dropped,
    /// Any other revert
    Reverted,
}

impl SubmissionFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FeeTooLow => "fee_too_low",
            Self::DeadlineExpired => "deadline_expired",
            Self::InvalidSignature => "invalid_signature",
            Self::SignatureReused => "signature_reused",
            Self::InvalidSchema => "invalid_schema",
            Self::NotFound => "not_found",
            Self::AlreadyRevoked => "already_revoked",
            Self::Irrevocable => "irrevocable",
            Self::AccessDenied => "access_denied",
            Self::AlreadyExists => "already_exists",
            Self::Dropped => "dropped",
            Self::Reverted => "reverted",
        }
    }
}

impl fmt::Display for SubmissionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for Notary operations
#[derive(Debug, thiserror::Error)]
pub enum NotaryError {
    #[error("{message}")]
    Validation { field: String, message: String },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Encoding mismatch: {0}")]
    EncodingMismatch(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Stale nonce: signed with {signed}, ledger is at {current}")]
    StaleNonce { signed: String, current: String },

    #[error("Submission rejected ({kind}): {message}")]
    Submission {
        kind: SubmissionFailure,
        message: String,
    },

    #[error("Transaction {tx_hash} not finalized before timeout")]
    FinalizationTimeout { tx_hash: String },

    #[error("Publish error: {0}")]
    Publish(String),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl NotaryError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn submission(kind: SubmissionFailure, message: impl Into<String>) -> Self {
        Self::Submission {
            kind,
            message: message.into(),
        }
    }

    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::EncodingMismatch(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::StaleNonce { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Submission { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::FinalizationTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Publish(_) => StatusCode::BAD_GATEWAY,
            Self::Ledger(_) => StatusCode::BAD_GATEWAY,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable kind, echoed in failure envelopes
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::BadRequest(_) => "bad_request",
            Self::NotFound(_) => "not_found",
            Self::EncodingMismatch(_) => "encoding_mismatch",
            Self::Signing(_) => "signing",
            Self::StaleNonce { .. } => "stale_nonce",
            Self::Submission { kind, .. } => kind.as_str(),
            Self::FinalizationTimeout { .. } => "finalization_timeout",
            Self::Publish(_) => "publish",
            Self::Ledger(_) => "ledger",
            Self::Config(_) => "config",
            Self::Internal(_) => "internal",
        }
    }

    /// Only a stale nonce is worth re-signing and resubmitting
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StaleNonce { .. })
    }
}

impl From<std::io::Error> for NotaryError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for NotaryError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<hyper::Error> for NotaryError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

/// Result type alias for Notary operations
pub type Result<T> = std::result::Result<T, NotaryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_is_client_error() {
        let err = NotaryError::validation("meetingType", "MeetingType must be a number between 0 and 5.");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "MeetingType must be a number between 0 and 5.");
    }

    #[test]
    fn test_internal_failures_are_server_errors() {
        let errors = [
            NotaryError::Signing("no key".into()),
            NotaryError::EncodingMismatch("width".into()),
            NotaryError::submission(SubmissionFailure::InvalidSignature, "bad sig"),
            NotaryError::StaleNonce { signed: "1".into(), current: "2".into() },
            NotaryError::FinalizationTimeout { tx_hash: "0x01".into() },
            NotaryError::Publish("down".into()),
        ];
        for err in errors {
            assert!(err.status_code().is_server_error(), "{err:?}");
        }
    }

    #[test]
    fn test_only_stale_nonce_retries() {
        assert!(NotaryError::StaleNonce { signed: "0".into(), current: "1".into() }.is_retryable());
        assert!(!NotaryError::submission(SubmissionFailure::DeadlineExpired, "late").is_retryable());
        assert_eq!(
            NotaryError::submission(SubmissionFailure::DeadlineExpired, "late").kind(),
            "deadline_expired"
        );
    }
}
