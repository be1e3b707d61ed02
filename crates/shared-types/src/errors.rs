//! # Error Taxonomy
//!
//! The common error sum type propagated across the peer-messaging
//! subsystems. Handlers never panic on peer input: every error here either
//! becomes a typed response status or causes the offending message to be
//! dropped.

use thiserror::Error;

/// Errors surfaced by the peer-messaging core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum P2pError {
    /// Malformed peer identifier bytes.
    #[error("invalid peer id")]
    InvalidPeerId,

    /// Public key parse failure or id/key mismatch.
    #[error("invalid key")]
    InvalidKey,

    /// Certificate field out of range: bad time window, empty addresses or
    /// an unparsable field.
    #[error("invalid certificate field")]
    InvalidCertField,

    /// Unknown certificate version.
    #[error("invalid certificate version")]
    InvalidCertVersion,

    /// Certificate signature mismatch.
    #[error("certificate verification failed")]
    VerificationFailed,

    /// Body schema decode failure.
    #[error("failed to parse message body: {0}")]
    ParseError(String),

    /// Handler permit unavailable.
    #[error("resource exhausted")]
    ResourceExhausted,

    /// Requested block or hash absent.
    #[error("not found")]
    NotFound,

    /// Chain accessor or other internal failure.
    #[error("internal error: {0}")]
    Internal(String),

    /// Deadline expired.
    #[error("timeout")]
    Timeout,

    /// IP or DNS name syntax invalid.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// Status code carried in typed responses, mirroring the error taxonomy on
/// the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ResultStatus {
    Ok,
    NotFound,
    ResourceExhausted,
    PermissionDenied,
    Unavailable,
    Internal,
    Aborted,
}

impl ResultStatus {
    pub fn is_ok(self) -> bool {
        matches!(self, ResultStatus::Ok)
    }
}
