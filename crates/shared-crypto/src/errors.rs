//! Crypto error types.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Signature verification failed
    #[error("Signature verification failed")]
    SignatureVerificationFailed,

    /// DER signature could not be parsed
    #[error("Invalid signature format")]
    InvalidSignatureFormat,

    /// Compressed public key could not be parsed
    #[error("Invalid public key")]
    InvalidPublicKey,

    /// Private key bytes out of range
    #[error("Invalid private key")]
    InvalidPrivateKey,

    /// Key or ID file could not be read or written
    #[error("Key file error: {0}")]
    KeyFile(String),
}
