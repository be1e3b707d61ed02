//! # Shared Crypto - Node Identity and Signing
//!
//! secp256k1 keys for Helix-Chain peers: identity derivation, DER ECDSA
//! signing for agent certificates, and the on-disk key/ID files.
//!
//! ## Components
//!
//! | Module | Use Case |
//! |--------|----------|
//! | `keys` | Keypair generation, compressed pubkeys, DER sign/verify |
//! | `keyfile` | `<prefix>.key` / `<prefix>.id` persistence |
//!
//! ## Security Properties
//!
//! - **secp256k1**: RFC 6979 deterministic nonces, low-S normalization
//! - Secret key material is zeroized on drop

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod keyfile;
pub mod keys;

pub use errors::CryptoError;
pub use keyfile::{load_node_key, save_node_key};
pub use keys::{peer_id_from_pub_key, NodeKeyPair, NodePublicKey};
