//! Ports between the peer runtime and the rest of the node.
//!
//! The runtime consumes the peer manager, the actor bus and the network
//! writer through these traits; node-runtime adapters implement them.

use std::sync::Arc;

use async_trait::async_trait;

use hc_03_agent_cert::AgentCertificateV1;
use shared_types::{
    BlockHash, MsgId, NewBlockNoticeBody, P2pError, PayloadBody, PeerId, PeerMeta, PeerRole,
    PeerState, TxHash,
};

use crate::message::{MessageOrderFactory, MsgOrder};

/// Network zone a peer was admitted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerZone {
    Internal,
    External,
}

/// Mutable view of a remote peer beyond its immutable meta: the accepted
/// role, zone, and the certificates it presented.
#[derive(Debug, Clone)]
pub struct RemoteInfo {
    pub meta: PeerMeta,
    /// Role this node accepted for the peer; may differ from the claimed
    /// one until re-evaluated.
    pub role: PeerRole,
    pub hidden: bool,
    pub zone: PeerZone,
    pub certificates: Vec<AgentCertificateV1>,
}

impl RemoteInfo {
    pub fn new(meta: PeerMeta, zone: PeerZone) -> Self {
        Self {
            role: meta.role,
            meta,
            hidden: false,
            zone,
            certificates: Vec::new(),
        }
    }
}

/// A connected remote peer as seen by handlers and collectors.
#[async_trait]
pub trait RemotePeer: Send + Sync {
    fn id(&self) -> PeerId;
    /// Short display name: abbreviated id plus address.
    fn name(&self) -> String;
    fn meta(&self) -> PeerMeta;
    fn remote_info(&self) -> RemoteInfo;
    fn state(&self) -> PeerState;

    /// Queue an order toward this peer. Never blocks; when the writer is
    /// stalled the oldest waiting order is dropped.
    fn send_message(&self, order: MsgOrder);

    /// Queue a request and wait for its response or `timeout`.
    async fn send_and_wait_message(
        &self,
        order: MsgOrder,
        timeout: std::time::Duration,
    ) -> Result<PayloadBody, P2pError>;

    /// Clear the in-flight accounting of a request that was answered or
    /// abandoned.
    fn consume_request(&self, msg_id: MsgId);

    /// Run the receiver registered for `original_id`, if any. Returns
    /// `true` when the response was fully handled; either way the
    /// correlation is gone afterwards.
    fn invoke_receiver(&self, header: &shared_types::MsgHeader, body: &PayloadBody) -> bool;

    /// Remember the peer's latest block notice.
    fn update_last_notice(&self, block_hash: BlockHash, block_no: u64);

    /// Record a block hash; returns `true` when it was already known.
    fn update_blk_cache(&self, block_hash: BlockHash, block_no: u64) -> bool;

    /// Record tx hashes; returns the ones that were not known yet.
    fn update_tx_cache(&self, hashes: &[TxHash]) -> Vec<TxHash>;

    /// Accept a certificate this peer presented.
    fn add_certificate(&self, cert: AgentCertificateV1);

    fn mf(&self) -> MessageOrderFactory;
}

/// Observer of peer lifecycle changes, driven by the peer manager.
pub trait PeerEventListener: Send + Sync {
    fn on_peer_joined(&self, meta: &PeerMeta);
    fn on_peer_left(&self, id: &PeerId);
}

/// Registry of connected peers, owned outside this crate.
pub trait PeerManagerApi: Send + Sync {
    fn get_peer(&self, id: &PeerId) -> Option<Arc<dyn RemotePeer>>;
    fn get_peers(&self) -> Vec<Arc<dyn RemotePeer>>;
    fn add_peer_event_listener(&self, listener: Box<dyn PeerEventListener>);
    /// Hand freshly learned peer addresses to the manager.
    fn notify_peer_address_received(&self, metas: Vec<PeerMeta>);
    fn add_designated_peer(&self, meta: PeerMeta);
    fn add_new_peer(&self, meta: PeerMeta);
    /// Ask the manager to drop a misbehaving or hung peer.
    fn remove_peer(&self, id: &PeerId);
}

/// Read access to chain state, behind the actor bus.
pub trait ChainAccessor: Send + Sync {
    /// Fetch an encoded block by hash; `Ok(None)` when absent.
    fn get_block(&self, hash: &BlockHash) -> Result<Option<Vec<u8>>, P2pError>;
}

/// Synchronization orchestrator notifications.
pub trait SyncGateway: Send + Sync {
    fn on_new_block_notice(&self, from: PeerId, notice: NewBlockNoticeBody);
    fn on_block_produced(&self, from: PeerId, block_no: u64, block: Vec<u8>);
}

/// Opaque handle to the node's actor event bus.
pub trait ActorBus: Send + Sync {
    fn chain_accessor(&self) -> Arc<dyn ChainAccessor>;
    fn sync_gateway(&self) -> Arc<dyn SyncGateway>;
}

/// Sink that actually moves an order's bytes onto the network.
///
/// Called from the peer's write loop only; I/O happens outside any lock.
pub trait MsgWriter: Send + Sync {
    /// Write one order; returns the number of bytes moved.
    fn write_order(&self, order: &MsgOrder) -> Result<usize, P2pError>;
}
