//! Outbound port to the peer layer.

use shared_types::{GetClusterRequestBody, MsgId, PeerId, PeerState};

/// The slice of a remote peer the cluster collector needs.
///
/// Implemented by the peer runtime; the collector never sees transport
/// details, only send/consume and the externally-driven state.
pub trait ClusterPeer: Send + Sync {
    fn id(&self) -> PeerId;
    fn name(&self) -> String;
    fn state(&self) -> PeerState;

    /// Queue a cluster-info request under `msg_id` toward this peer.
    fn send_cluster_request(&self, msg_id: MsgId, req: &GetClusterRequestBody);

    /// Clear the in-flight accounting for a request this collector consumed.
    fn consume_request(&self, msg_id: MsgId);
}
