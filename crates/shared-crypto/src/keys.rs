//! # Node Keys (secp256k1)
//!
//! Keypair and public-key wrappers used for peer identity and agent
//! certificate signing.
//!
//! ## Security Properties
//!
//! - RFC 6979 deterministic nonces (no RNG dependency for signing)
//! - Signatures travel in DER form on the wire
//! - Secret key material is zeroized on drop

use k256::ecdsa::{
    signature::{Signer, Verifier},
    Signature, SigningKey, VerifyingKey,
};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::CryptoError;
use shared_types::PeerId;

/// Compressed secp256k1 public key (33 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodePublicKey([u8; 33]);

impl NodePublicKey {
    /// Create from compressed SEC1 bytes (33 bytes, starting 0x02 or 0x03).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; 33] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        // Validate it's a valid compressed point
        VerifyingKey::from_sec1_bytes(&arr).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self(arr))
    }

    /// Raw compressed bytes, as hashed into certificate digests.
    pub fn as_bytes(&self) -> &[u8; 33] {
        &self.0
    }

    /// Verify a DER-encoded ECDSA signature over `message`.
    ///
    /// The message is hashed with SHA-256 before verification, matching
    /// [`NodeKeyPair::sign_der`].
    pub fn verify_der(&self, message: &[u8], der_signature: &[u8]) -> Result<(), CryptoError> {
        let verifying_key =
            VerifyingKey::from_sec1_bytes(&self.0).map_err(|_| CryptoError::InvalidPublicKey)?;
        let sig = Signature::from_der(der_signature)
            .map_err(|_| CryptoError::InvalidSignatureFormat)?;
        verifying_key
            .verify(message, &sig)
            .map_err(|_| CryptoError::SignatureVerificationFailed)
    }
}

/// Derive the peer identity from a public key.
///
/// The derivation is stable across implementations: SHA-256 over the
/// compressed key bytes.
pub fn peer_id_from_pub_key(key: &NodePublicKey) -> PeerId {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let digest: [u8; 32] = hasher.finalize().into();
    // 32 non-empty bytes always form a valid id
    PeerId::from_bytes(&digest).expect("sha256 digest is never empty")
}

/// secp256k1 node keypair.
pub struct NodeKeyPair {
    signing_key: SigningKey,
}

impl NodeKeyPair {
    /// Generate a random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut rand::thread_rng());
        Self { signing_key }
    }

    /// Create from secret key bytes (32 bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidPrivateKey)?;
        let signing_key =
            SigningKey::from_bytes((&arr).into()).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    /// Compressed public key (33 bytes).
    pub fn public_key(&self) -> NodePublicKey {
        let verifying_key = self.signing_key.verifying_key();
        let sec1_bytes = verifying_key.to_sec1_bytes();
        // SEC1 compressed form is always exactly 33 bytes
        let mut bytes = [0u8; 33];
        bytes.copy_from_slice(&sec1_bytes[..33]);
        NodePublicKey(bytes)
    }

    /// Peer identity of this key.
    pub fn peer_id(&self) -> PeerId {
        peer_id_from_pub_key(&self.public_key())
    }

    /// Sign `message` (SHA-256 + RFC 6979 ECDSA), returning the DER form.
    pub fn sign_der(&self, message: &[u8]) -> Vec<u8> {
        let sig: Signature = self.signing_key.sign(message);
        sig.to_der().as_bytes().to_vec()
    }

    /// Secret key bytes, for serialization.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes().into()
    }
}

impl Drop for NodeKeyPair {
    fn drop(&mut self) {
        // Zeroize secret key material
        let mut bytes: [u8; 32] = self.signing_key.to_bytes().into();
        bytes.zeroize();
    }
}
