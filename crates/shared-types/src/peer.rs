//! # Peer Identity and Metadata
//!
//! A [`PeerId`] is a stable opaque byte-string identifier with a canonical
//! base58 textual form. Peers additionally carry an immutable [`PeerMeta`]
//! fixed at admission time and an externally-driven [`PeerState`] that the
//! messaging core only reads.

use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::errors::P2pError;

/// Opaque identifier of a network participant, derived from its public key.
///
/// Equality is byte equality. `Display` renders the canonical base58 form.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(Vec<u8>);

impl PeerId {
    /// Wrap raw identifier bytes. Rejects empty input.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, P2pError> {
        if bytes.is_empty() {
            return Err(P2pError::InvalidPeerId);
        }
        Ok(Self(bytes.to_vec()))
    }

    /// Parse the canonical base58 textual form.
    pub fn from_base58(text: &str) -> Result<Self, P2pError> {
        let bytes = bs58::decode(text)
            .into_vec()
            .map_err(|_| P2pError::InvalidPeerId)?;
        Self::from_bytes(&bytes)
    }

    /// Raw identifier bytes, as hashed into certificates.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Canonical base58 textual form.
    pub fn to_base58(&self) -> String {
        bs58::encode(&self.0).into_string()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", short_form(self))
    }
}

/// Process-level switch disabling short-form rendering. Loaded once at
/// startup and read-only thereafter.
static USE_FULL_ID: OnceLock<bool> = OnceLock::new();

/// Configure whether log output uses full peer IDs. May only take effect
/// once; later calls are ignored.
pub fn set_use_full_id(full: bool) {
    let _ = USE_FULL_ID.set(full);
}

/// Abbreviated peer ID for logging: `first2..last6` of the base58 form.
///
/// IDs whose textual form is 10 characters or shorter are rendered whole, as
/// is everything when the process is configured with `set_use_full_id(true)`.
pub fn short_form(id: &PeerId) -> String {
    let full = id.to_base58();
    if *USE_FULL_ID.get_or_init(|| false) || full.len() <= 10 {
        return full;
    }
    format!("{}..{}", &full[..2], &full[full.len() - 6..])
}

/// Role a peer plays in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeerRole {
    /// Block producer; authorized to issue block-produced notices.
    Producer,
    /// Delegated proxy for one or more producers, backed by certificates.
    Agent,
    /// Non-privileged observer.
    Watcher,
    /// Peer speaking an older protocol version; treated as its own identity.
    LegacyVersion,
}

/// Peer lifecycle state. Transitions are driven by the peer manager; the
/// messaging core only reads this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum PeerState {
    Running = 0,
    Stopping = 1,
    Handshaking = 2,
    Stopped = 3,
}

impl PeerState {
    /// Decode the atomic representation written by `as_u8`.
    pub fn from_u8(v: u8) -> PeerState {
        match v {
            0 => PeerState::Running,
            1 => PeerState::Stopping,
            2 => PeerState::Handshaking,
            _ => PeerState::Stopped,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Immutable description of a peer, fixed when the peer is admitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerMeta {
    pub id: PeerId,
    /// Ordered dial addresses; never empty for an admitted peer.
    pub addresses: Vec<String>,
    pub role: PeerRole,
    /// Producers this peer acts for; meaningful for agents, usually empty
    /// otherwise.
    pub producer_ids: Vec<PeerId>,
    pub version: String,
}

impl PeerMeta {
    pub fn new(id: PeerId, addresses: Vec<String>, role: PeerRole) -> Self {
        Self {
            id,
            addresses,
            role,
            producer_ids: Vec::new(),
            version: String::new(),
        }
    }
}
