//! Concurrent cluster-info collector.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use shared_types::{
    short_form, ClusterMember, GetClusterRequestBody, GetClusterResponseBody, HardStateInfo,
    MsgHeader, MsgId, PayloadBody, PeerId, PeerState,
};

use crate::ports::ClusterPeer;

/// Merged cluster state chosen from the best response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterInfo {
    pub cluster_id: u64,
    pub chain_id: Vec<u8>,
    pub members: Vec<ClusterMember>,
    pub hard_state: Option<HardStateInfo>,
}

/// Terminal failure of one collection round.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClusterFetchError {
    /// Too few peers were in RUNNING state to even reach quorum.
    #[error("no live peers")]
    NoLivePeers,
    /// The round ended with fewer successful responses than the quorum.
    #[error("too few responses: {got}, required {required}")]
    TooFewResponses { got: usize, required: usize },
    /// The round was canceled from outside.
    #[error("canceled")]
    Canceled,
}

/// Reply delivered exactly once per collection round.
pub type ClusterReply = Result<ClusterInfo, ClusterFetchError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Waiting,
    Canceled,
    Finished,
}

struct CollectorState {
    sent: HashMap<MsgId, Arc<dyn ClusterPeer>>,
    sent_cnt: usize,
    resp_cnt: usize,
    /// Successful responses in arrival order; ties on `best_block_no` go to
    /// the earliest.
    succ_resps: Vec<(PeerId, GetClusterResponseBody)>,
    deadline: Instant,
    status: Status,
    reply_tx: Option<oneshot::Sender<ClusterReply>>,
    /// Dropped on finish so the expire timer wakes up and exits.
    finished_tx: Option<oneshot::Sender<()>>,
}

/// Collects `GetClusterInfo` responses from all live peers.
///
/// Created per request and dropped after the reply is delivered. `finish`
/// runs at most once; late or duplicate responses are silently ignored.
pub struct ClusterInfoCollector {
    self_ref: Weak<ClusterInfoCollector>,
    peers: Vec<Arc<dyn ClusterPeer>>,
    ttl: Duration,
    req: GetClusterRequestBody,
    required_resp: usize,
    state: Mutex<CollectorState>,
    finished_rx: Mutex<Option<oneshot::Receiver<()>>>,
}

impl ClusterInfoCollector {
    /// Build a collector over `peers` and hand back the reply channel.
    pub fn new(
        peers: Vec<Arc<dyn ClusterPeer>>,
        ttl: Duration,
        req: GetClusterRequestBody,
    ) -> (Arc<Self>, oneshot::Receiver<ClusterReply>) {
        let (reply_tx, reply_rx) = oneshot::channel();
        let (finished_tx, finished_rx) = oneshot::channel();
        let required_resp = peers.len() / 2 + 1;
        let collector = Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            peers,
            ttl,
            req,
            required_resp,
            state: Mutex::new(CollectorState {
                sent: HashMap::new(),
                sent_cnt: 0,
                resp_cnt: 0,
                succ_resps: Vec::new(),
                deadline: Instant::now(),
                status: Status::Waiting,
                reply_tx: Some(reply_tx),
                finished_tx: Some(finished_tx),
            }),
            finished_rx: Mutex::new(Some(finished_rx)),
        });
        (collector, reply_rx)
    }

    /// Number of successful responses required before `calculate` accepts.
    pub fn required_resp(&self) -> usize {
        self.required_resp
    }

    /// Fan the request out and arm the expire timer.
    pub fn start_get(&self) {
        let mut st = self.state.lock();
        st.deadline = Instant::now() + self.ttl;
        if !self.try_send_all_peers(&mut st) {
            self.finish_locked(&mut st, Some(ClusterFetchError::NoLivePeers));
            return;
        }
        drop(st);
        self.run_expire_timer();
    }

    fn try_send_all_peers(&self, st: &mut CollectorState) -> bool {
        debug!(
            peer_cnt = self.peers.len(),
            "sending get cluster request to connected peers"
        );
        for peer in &self.peers {
            if peer.state() == PeerState::Running {
                let msg_id = MsgId::generate();
                peer.send_cluster_request(msg_id, &self.req);
                st.sent.insert(msg_id, Arc::clone(peer));
                st.sent_cnt += 1;
            }
        }
        debug!(sent = st.sent_cnt, "sent get cluster requests");
        st.sent_cnt >= self.required_resp
    }

    fn run_expire_timer(&self) {
        let Some(finished_rx) = self.finished_rx.lock().take() else {
            return;
        };
        let Some(this) = self.self_ref.upgrade() else {
            return;
        };
        let ttl = self.ttl;
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(ttl) => {
                    let mut st = this.state.lock();
                    if st.status == Status::Waiting {
                        this.finish_locked(&mut st, None);
                    }
                }
                _ = finished_rx => {}
            }
            debug!("expire timer finished");
        });
    }

    /// Route one response into the collector.
    ///
    /// Returns `true` when the message was consumed (even if ignored), so
    /// the handler framework removes the correlation.
    pub fn receive_resp(&self, header: &MsgHeader, body: &PayloadBody) -> bool {
        let mut st = self.state.lock();
        // consume the request id first, whatever happens next
        let Some(peer) = st.sent.remove(&header.original_id) else {
            // unknown or duplicate response
            return true;
        };
        peer.consume_request(header.original_id);

        match st.status {
            Status::Waiting => {
                self.handle_in_waiting(&mut st, &peer, header, body);
                st.resp_cnt += 1;
                if st.resp_cnt >= st.sent_cnt {
                    self.finish_locked(&mut st, None);
                }
            }
            Status::Canceled | Status::Finished => {
                // silently ignore responses that are useless now
            }
        }
        true
    }

    fn handle_in_waiting(
        &self,
        st: &mut CollectorState,
        peer: &Arc<dyn ClusterPeer>,
        header: &MsgHeader,
        body: &PayloadBody,
    ) {
        if st.deadline < Instant::now() {
            self.finish_locked(st, None);
            return;
        }

        // a malformed or failed response still counts toward resp_cnt so a
        // round of garbage cannot stretch the effective timeout
        let PayloadBody::GetClusterResponse(resp) = body else {
            debug!(
                peer = %peer.name(),
                msg_id = %header.id,
                "get cluster invalid response data"
            );
            return;
        };
        if resp.members.is_empty() || !resp.error.is_empty() {
            debug!(
                peer = %peer.name(),
                msg_id = %header.id,
                error = %resp.error,
                "get cluster response empty member"
            );
            return;
        }

        debug!(
            peer = %peer.name(),
            msg_id = %header.id,
            best_block_no = resp.best_block_no,
            "received get cluster response"
        );
        st.succ_resps.push((peer.id(), resp.clone()));
    }

    /// Cancel the round; the reply carries `err`.
    pub fn cancel(&self, err: ClusterFetchError) {
        let mut st = self.state.lock();
        if st.status != Status::Waiting {
            return;
        }
        st.status = Status::Canceled;
        self.finish_locked(&mut st, Some(err));
    }

    fn finish_locked(&self, st: &mut CollectorState, err: Option<ClusterFetchError>) {
        if st.status == Status::Finished {
            warn!("redundant finish call");
            return;
        }
        st.status = Status::Finished;
        debug!("finishing cluster info receiver");
        let reply = self.calculate(st, err);
        if let Some(tx) = st.reply_tx.take() {
            let _ = tx.send(reply);
        }
        // wake the expire timer
        st.finished_tx.take();
    }

    fn calculate(&self, st: &CollectorState, err: Option<ClusterFetchError>) -> ClusterReply {
        if let Some(err) = err {
            return Err(err);
        }
        if st.succ_resps.len() < self.required_resp {
            return Err(ClusterFetchError::TooFewResponses {
                got: st.succ_resps.len(),
                required: self.required_resp,
            });
        }
        debug!(resp_cnt = st.succ_resps.len(), "calculating collected responses");
        let (best_pid, best) = st
            .succ_resps
            .iter()
            .fold(None::<&(PeerId, GetClusterResponseBody)>, |acc, cur| {
                match acc {
                    Some(best) if best.1.best_block_no >= cur.1.best_block_no => Some(best),
                    _ => Some(cur),
                }
            })
            .expect("quorum check guarantees at least one response");
        debug!(
            peer_id = %short_form(best_pid),
            best_block_no = best.best_block_no,
            "chose best response"
        );
        Ok(ClusterInfo {
            cluster_id: best.cluster_id,
            chain_id: best.chain_id.clone(),
            members: best.members.clone(),
            hard_state: best.hard_state,
        })
    }
}
