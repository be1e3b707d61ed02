//! Write-pipe listener that detects hung peers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use hc_01_message_pipe::PipeEventListener;
use shared_types::{short_form, PeerId};

use crate::message::MsgOrder;
use crate::ports::PeerManagerApi;

/// A stalled write pipe drops messages; a peer that keeps forcing drops, or
/// whose stalled message is very old, is assumed hung and removed.
pub struct HangResolver {
    peer_id: PeerId,
    pm: Arc<dyn PeerManagerApi>,
    consecutive_drops: AtomicU64,
}

/// Drops in a row before the peer is declared hung.
const MAX_CONSECUTIVE_DROPS: u64 = 20;
/// A dropped message older than this means the writer made no progress for
/// a very long time.
const STALE_ORDER_SECS: i64 = 60;

impl HangResolver {
    pub fn new(peer_id: PeerId, pm: Arc<dyn PeerManagerApi>) -> Self {
        Self {
            peer_id,
            pm,
            consecutive_drops: AtomicU64::new(0),
        }
    }
}

impl PipeEventListener<MsgOrder> for HangResolver {
    fn on_in(&self, _element: &MsgOrder) {}

    fn on_drop(&self, element: &MsgOrder) {
        let drops = self.consecutive_drops.fetch_add(1, Ordering::Relaxed) + 1;
        let now_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        let order_secs = element.timestamp() / 1_000_000_000;
        if drops > MAX_CONSECUTIVE_DROPS || now_secs - order_secs > STALE_ORDER_SECS {
            info!(
                peer_id = %short_form(&self.peer_id),
                "peer seems to hang, dropping peer"
            );
            self.pm.remove_peer(&self.peer_id);
        } else {
            debug!(
                peer_id = %short_form(&self.peer_id),
                msg_id = %element.msg_id(),
                proto = %element.subprotocol(),
                "peer too busy, stalled message is dropped"
            );
        }
    }

    fn on_out(&self, _element: &MsgOrder) {
        self.consecutive_drops.store(0, Ordering::Relaxed);
    }
}
