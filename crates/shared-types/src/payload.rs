//! # Wire Payload Bodies
//!
//! One body type per subprotocol, encoded with bincode. The transport
//! decodes the envelope header, then hands the raw body bytes to the handler
//! registered for the subprotocol tag, which parses them through
//! [`MessageBody`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::envelope::SubProtocol;
use crate::errors::{P2pError, ResultStatus};
use crate::peer::PeerMeta;

/// 32-byte transaction hash.
pub type TxHash = [u8; 32];
/// 32-byte block hash.
pub type BlockHash = [u8; 32];

/// A typed message body that can cross the wire.
///
/// `encode`/`decode` are total over the bincode schema; a failed decode is a
/// [`P2pError::ParseError`] and the message is dropped by the handler
/// framework.
pub trait MessageBody: Serialize + DeserializeOwned + Sized {
    /// The tag this body travels under.
    const SUBPROTOCOL: SubProtocol;

    fn encode(&self) -> Result<Vec<u8>, P2pError> {
        bincode::serialize(self).map_err(|e| P2pError::Internal(e.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<Self, P2pError> {
        bincode::deserialize(bytes).map_err(|e| P2pError::ParseError(e.to_string()))
    }
}

macro_rules! message_body {
    ($ty:ty, $tag:expr) => {
        impl MessageBody for $ty {
            const SUBPROTOCOL: SubProtocol = $tag;
        }
    };
}

/// Handshake status announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBody {
    pub sender: PeerMeta,
    pub best_block_hash: BlockHash,
    pub best_height: u64,
}
message_body!(StatusBody, SubProtocol::StatusRequest);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingBody {
    pub best_block_hash: BlockHash,
    pub best_height: u64,
}
message_body!(PingBody, SubProtocol::PingRequest);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PongBody {
    pub best_block_hash: BlockHash,
    pub best_height: u64,
}
message_body!(PongBody, SubProtocol::PingResponse);

/// Final notice before disconnecting a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoAwayBody {
    pub message: String,
}
message_body!(GoAwayBody, SubProtocol::GoAwayNotice);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressesRequestBody {
    pub max_size: u32,
}
message_body!(AddressesRequestBody, SubProtocol::AddressesRequest);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressesResponseBody {
    pub status: ResultStatus,
    pub peers: Vec<PeerMeta>,
}
message_body!(AddressesResponseBody, SubProtocol::AddressesResponse);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetBlocksRequestBody {
    pub hashes: Vec<BlockHash>,
}
message_body!(GetBlocksRequestBody, SubProtocol::GetBlocksRequest);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetBlocksResponseBody {
    pub status: ResultStatus,
    /// Opaque encoded blocks; the chain layer owns their schema.
    pub blocks: Vec<Vec<u8>>,
    /// True when the response was split and more parts follow.
    pub has_next: bool,
}
message_body!(GetBlocksResponseBody, SubProtocol::GetBlocksResponse);

/// Gossip notice that a new block exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBlockNoticeBody {
    pub block_hash: BlockHash,
    pub block_no: u64,
}
message_body!(NewBlockNoticeBody, SubProtocol::NewBlockNotice);

/// Privileged notice sent by a block producer (or its agent) right after
/// producing a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockProducedNoticeBody {
    /// Raw id bytes of the producer key that authored the block.
    pub producer_id: Vec<u8>,
    pub block_no: u64,
    /// Opaque encoded block.
    pub block: Vec<u8>,
}
message_body!(BlockProducedNoticeBody, SubProtocol::BlockProducedNotice);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTxNoticeBody {
    pub tx_hashes: Vec<TxHash>,
}
message_body!(NewTxNoticeBody, SubProtocol::NewTxNotice);

/// Member of a raft cluster as reported by a remote peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMember {
    pub member_id: u64,
    pub name: String,
    pub address: String,
    pub peer_id: Vec<u8>,
}

/// Raft hard-state snapshot accompanying cluster info.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardStateInfo {
    pub term: u64,
    pub commit: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetClusterRequestBody {
    pub best_block_hash: BlockHash,
}
message_body!(GetClusterRequestBody, SubProtocol::GetClusterRequest);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetClusterResponseBody {
    pub cluster_id: u64,
    pub chain_id: Vec<u8>,
    pub members: Vec<ClusterMember>,
    /// Empty when the peer answered successfully.
    pub error: String,
    pub best_block_no: u64,
    pub hard_state: Option<HardStateInfo>,
}
message_body!(GetClusterResponseBody, SubProtocol::GetClusterResponse);

/// Wire form of an agent certificate, hashed and signed as specified by the
/// certificate module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateWire {
    pub cert_version: u32,
    pub bp_id: Vec<u8>,
    /// Compressed secp256k1 public key, 33 bytes.
    pub bp_pub_key: Vec<u8>,
    /// Nanoseconds since the unix epoch.
    pub create_time: u64,
    pub expire_time: u64,
    pub agent_id: Vec<u8>,
    pub agent_addresses: Vec<Vec<u8>>,
    /// DER-encoded ECDSA signature.
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCertRequestBody {}
message_body!(IssueCertRequestBody, SubProtocol::IssueCertRequest);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCertResponseBody {
    pub status: ResultStatus,
    pub certificate: Option<CertificateWire>,
}
message_body!(IssueCertResponseBody, SubProtocol::IssueCertResponse);

/// Agent gossip that one of its certificates was renewed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertRenewedNoticeBody {
    pub certificate: CertificateWire,
}
message_body!(CertRenewedNoticeBody, SubProtocol::CertRenewedNotice);

/// Tagged union over every body type, used where messages are stored or
/// dispatched without static knowledge of the subprotocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadBody {
    Status(StatusBody),
    Ping(PingBody),
    Pong(PongBody),
    GoAway(GoAwayBody),
    AddressesRequest(AddressesRequestBody),
    AddressesResponse(AddressesResponseBody),
    GetBlocksRequest(GetBlocksRequestBody),
    GetBlocksResponse(GetBlocksResponseBody),
    NewBlockNotice(NewBlockNoticeBody),
    BlockProducedNotice(BlockProducedNoticeBody),
    NewTxNotice(NewTxNoticeBody),
    GetClusterRequest(GetClusterRequestBody),
    GetClusterResponse(GetClusterResponseBody),
    IssueCertRequest(IssueCertRequestBody),
    IssueCertResponse(IssueCertResponseBody),
    CertRenewedNotice(CertRenewedNoticeBody),
}

impl PayloadBody {
    pub fn subprotocol(&self) -> SubProtocol {
        match self {
            PayloadBody::Status(_) => SubProtocol::StatusRequest,
            PayloadBody::Ping(_) => SubProtocol::PingRequest,
            PayloadBody::Pong(_) => SubProtocol::PingResponse,
            PayloadBody::GoAway(_) => SubProtocol::GoAwayNotice,
            PayloadBody::AddressesRequest(_) => SubProtocol::AddressesRequest,
            PayloadBody::AddressesResponse(_) => SubProtocol::AddressesResponse,
            PayloadBody::GetBlocksRequest(_) => SubProtocol::GetBlocksRequest,
            PayloadBody::GetBlocksResponse(_) => SubProtocol::GetBlocksResponse,
            PayloadBody::NewBlockNotice(_) => SubProtocol::NewBlockNotice,
            PayloadBody::BlockProducedNotice(_) => SubProtocol::BlockProducedNotice,
            PayloadBody::NewTxNotice(_) => SubProtocol::NewTxNotice,
            PayloadBody::GetClusterRequest(_) => SubProtocol::GetClusterRequest,
            PayloadBody::GetClusterResponse(_) => SubProtocol::GetClusterResponse,
            PayloadBody::IssueCertRequest(_) => SubProtocol::IssueCertRequest,
            PayloadBody::IssueCertResponse(_) => SubProtocol::IssueCertResponse,
            PayloadBody::CertRenewedNotice(_) => SubProtocol::CertRenewedNotice,
        }
    }

    /// Encode the inner body the same way its `MessageBody` impl does.
    pub fn encode(&self) -> Result<Vec<u8>, P2pError> {
        match self {
            PayloadBody::Status(b) => b.encode(),
            PayloadBody::Ping(b) => b.encode(),
            PayloadBody::Pong(b) => b.encode(),
            PayloadBody::GoAway(b) => b.encode(),
            PayloadBody::AddressesRequest(b) => b.encode(),
            PayloadBody::AddressesResponse(b) => b.encode(),
            PayloadBody::GetBlocksRequest(b) => b.encode(),
            PayloadBody::GetBlocksResponse(b) => b.encode(),
            PayloadBody::NewBlockNotice(b) => b.encode(),
            PayloadBody::BlockProducedNotice(b) => b.encode(),
            PayloadBody::NewTxNotice(b) => b.encode(),
            PayloadBody::GetClusterRequest(b) => b.encode(),
            PayloadBody::GetClusterResponse(b) => b.encode(),
            PayloadBody::IssueCertRequest(b) => b.encode(),
            PayloadBody::IssueCertResponse(b) => b.encode(),
            PayloadBody::CertRenewedNotice(b) => b.encode(),
        }
    }

    /// Decode raw body bytes for a known subprotocol tag.
    pub fn decode(proto: SubProtocol, bytes: &[u8]) -> Result<PayloadBody, P2pError> {
        use SubProtocol::*;
        let body = match proto {
            StatusRequest => PayloadBody::Status(StatusBody::decode(bytes)?),
            PingRequest => PayloadBody::Ping(PingBody::decode(bytes)?),
            PingResponse => PayloadBody::Pong(PongBody::decode(bytes)?),
            GoAwayNotice => PayloadBody::GoAway(GoAwayBody::decode(bytes)?),
            AddressesRequest => {
                PayloadBody::AddressesRequest(AddressesRequestBody::decode(bytes)?)
            }
            AddressesResponse => {
                PayloadBody::AddressesResponse(AddressesResponseBody::decode(bytes)?)
            }
            GetBlocksRequest => PayloadBody::GetBlocksRequest(GetBlocksRequestBody::decode(bytes)?),
            GetBlocksResponse => {
                PayloadBody::GetBlocksResponse(GetBlocksResponseBody::decode(bytes)?)
            }
            NewBlockNotice => PayloadBody::NewBlockNotice(NewBlockNoticeBody::decode(bytes)?),
            BlockProducedNotice => {
                PayloadBody::BlockProducedNotice(BlockProducedNoticeBody::decode(bytes)?)
            }
            NewTxNotice => PayloadBody::NewTxNotice(NewTxNoticeBody::decode(bytes)?),
            GetClusterRequest => {
                PayloadBody::GetClusterRequest(GetClusterRequestBody::decode(bytes)?)
            }
            GetClusterResponse => {
                PayloadBody::GetClusterResponse(GetClusterResponseBody::decode(bytes)?)
            }
            IssueCertRequest => PayloadBody::IssueCertRequest(IssueCertRequestBody::decode(bytes)?),
            IssueCertResponse => {
                PayloadBody::IssueCertResponse(IssueCertResponseBody::decode(bytes)?)
            }
            CertRenewedNotice => {
                PayloadBody::CertRenewedNotice(CertRenewedNoticeBody::decode(bytes)?)
            }
        };
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::{PeerId, PeerRole};

    #[test]
    fn test_body_roundtrip() {
        let body = NewBlockNoticeBody {
            block_hash: [7u8; 32],
            block_no: 1234,
        };
        let bytes = body.encode().unwrap();
        let back = NewBlockNoticeBody::decode(&bytes).unwrap();
        assert_eq!(body, back);
    }

    #[test]
    fn test_decode_garbage_is_parse_error() {
        let err = GetClusterResponseBody::decode(&[0xff, 0x01]).unwrap_err();
        assert!(matches!(err, P2pError::ParseError(_)));
    }

    #[test]
    fn test_payload_dispatch_roundtrip() {
        let meta = PeerMeta::new(
            PeerId::from_bytes(&[9u8; 32]).unwrap(),
            vec!["192.168.0.9".to_string()],
            PeerRole::Watcher,
        );
        let body = PayloadBody::AddressesResponse(AddressesResponseBody {
            status: ResultStatus::Ok,
            peers: vec![meta],
        });
        let bytes = body.encode().unwrap();
        let back = PayloadBody::decode(body.subprotocol(), &bytes).unwrap();
        assert_eq!(body, back);
    }

    #[test]
    fn test_tag_mismatch_fails_parse() {
        let body = PingBody::default();
        let bytes = body.encode().unwrap();
        // A ping body is not a valid cluster response.
        assert!(PayloadBody::decode(SubProtocol::GetClusterResponse, &bytes).is_err());
    }
}
