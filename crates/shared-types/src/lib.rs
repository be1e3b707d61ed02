//! # Shared Types Crate
//!
//! This crate contains the domain entities and wire types shared across the
//! peer-messaging subsystems: peer identity, the message envelope, payload
//! bodies and the common error taxonomy.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-subsystem types are defined here.
//! - **Opaque Identity**: A [`PeerId`] is an opaque byte string; equality is
//!   byte equality and the canonical textual form is base58.
//! - **Stable Envelope**: Every on-wire message carries a [`MsgHeader`];
//!   bodies are encoded separately per subprotocol.

pub mod envelope;
pub mod errors;
pub mod payload;
pub mod peer;

pub use envelope::{MsgHeader, MsgId, SubProtocol};
pub use errors::{P2pError, ResultStatus};
pub use payload::*;
pub use peer::{short_form, PeerId, PeerMeta, PeerRole, PeerState};
