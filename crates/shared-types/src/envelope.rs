//! # Message Envelope
//!
//! Every on-wire message carries a fixed [`MsgHeader`]: a subprotocol tag
//! selecting the handler, a unique message id, the id of the originating
//! request for responses, the body length and a send timestamp.
//!
//! ## Correlation
//!
//! Requests carry a freshly generated [`MsgId`]; responses echo it in
//! `original_id`. Notices use [`MsgId::NIL`] as their original id.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 128-bit identifier naming one request, response or notice.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MsgId([u8; 16]);

impl MsgId {
    /// The all-zero id used as `original_id` of notices.
    pub const NIL: MsgId = MsgId([0u8; 16]);

    /// Generate a fresh random (UUIDv4) message id.
    pub fn generate() -> Self {
        Self(*Uuid::new_v4().as_bytes())
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn is_nil(&self) -> bool {
        *self == Self::NIL
    }
}

impl fmt::Display for MsgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Uuid::from_bytes(self.0))
    }
}

impl fmt::Debug for MsgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MsgId({self})")
    }
}

/// Numeric tag selecting the handler for an incoming message.
///
/// Tags form a stable namespace; new tags may be added but existing values
/// never change meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum SubProtocol {
    StatusRequest = 0x001,
    PingRequest = 0x002,
    PingResponse = 0x003,
    GoAwayNotice = 0x004,
    AddressesRequest = 0x011,
    AddressesResponse = 0x012,
    GetBlocksRequest = 0x021,
    GetBlocksResponse = 0x022,
    NewBlockNotice = 0x023,
    BlockProducedNotice = 0x024,
    NewTxNotice = 0x031,
    GetClusterRequest = 0x041,
    GetClusterResponse = 0x042,
    IssueCertRequest = 0x051,
    IssueCertResponse = 0x052,
    CertRenewedNotice = 0x053,
}

impl SubProtocol {
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Decode a wire tag; unknown tags are handled by the caller.
    pub fn from_u32(v: u32) -> Option<SubProtocol> {
        use SubProtocol::*;
        let p = match v {
            0x001 => StatusRequest,
            0x002 => PingRequest,
            0x003 => PingResponse,
            0x004 => GoAwayNotice,
            0x011 => AddressesRequest,
            0x012 => AddressesResponse,
            0x021 => GetBlocksRequest,
            0x022 => GetBlocksResponse,
            0x023 => NewBlockNotice,
            0x024 => BlockProducedNotice,
            0x031 => NewTxNotice,
            0x041 => GetClusterRequest,
            0x042 => GetClusterResponse,
            0x051 => IssueCertRequest,
            0x052 => IssueCertResponse,
            0x053 => CertRenewedNotice,
            _ => return None,
        };
        Some(p)
    }
}

impl fmt::Display for SubProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Fixed header preceding every message body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgHeader {
    pub subprotocol: SubProtocol,
    /// Unique id of this message.
    pub id: MsgId,
    /// Id of the request this message answers; `MsgId::NIL` for requests
    /// and notices.
    pub original_id: MsgId,
    /// Body length in bytes.
    pub length: u32,
    /// Send time, nanoseconds since the unix epoch.
    pub timestamp: i64,
}

impl MsgHeader {
    /// Header for a fresh request or notice.
    pub fn request(subprotocol: SubProtocol, length: u32, timestamp: i64) -> Self {
        Self {
            subprotocol,
            id: MsgId::generate(),
            original_id: MsgId::NIL,
            length,
            timestamp,
        }
    }

    /// Header for a response to `original_id`.
    pub fn response(
        subprotocol: SubProtocol,
        original_id: MsgId,
        length: u32,
        timestamp: i64,
    ) -> Self {
        Self {
            subprotocol,
            id: MsgId::generate(),
            original_id,
            length,
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msg_id_generate_unique() {
        let a = MsgId::generate();
        let b = MsgId::generate();
        assert_ne!(a, b);
        assert!(!a.is_nil());
    }

    #[test]
    fn test_nil_id() {
        assert!(MsgId::NIL.is_nil());
        assert_eq!(MsgId::from_bytes([0u8; 16]), MsgId::NIL);
    }

    #[test]
    fn test_subprotocol_tag_roundtrip() {
        for p in [
            SubProtocol::StatusRequest,
            SubProtocol::NewBlockNotice,
            SubProtocol::BlockProducedNotice,
            SubProtocol::GetClusterResponse,
            SubProtocol::CertRenewedNotice,
        ] {
            assert_eq!(SubProtocol::from_u32(p.as_u32()), Some(p));
        }
        assert_eq!(SubProtocol::from_u32(0xdead_beef), None);
    }

    #[test]
    fn test_response_header_carries_original() {
        let req = MsgHeader::request(SubProtocol::PingRequest, 0, 7);
        let rsp = MsgHeader::response(SubProtocol::PingResponse, req.id, 4, 9);
        assert_eq!(rsp.original_id, req.id);
        assert_ne!(rsp.id, req.id);
    }
}
