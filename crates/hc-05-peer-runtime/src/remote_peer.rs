//! Default remote-peer implementation.
//!
//! One instance per connected peer. Outbound orders flow through a bounded
//! drop-oldest pipe into a write loop; inbound messages are dispatched to
//! the handler registry. Requests are correlated to their responses by
//! message id, with stale entries pruned periodically.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use hc_01_message_pipe::{ChannelPipe, MultiListener, PipeEventListener, PressableQueue, StatListener};
use hc_03_agent_cert::AgentCertificateV1;
use shared_types::{
    short_form, BlockHash, MsgHeader, MsgId, NewTxNoticeBody, P2pError, PayloadBody, PeerId,
    PeerMeta, PeerState, SubProtocol, TxHash,
};

use crate::handler::{HandlerRegistry, MessageHandler};
use crate::hang::HangResolver;
use crate::message::{MessageOrderFactory, MsgOrder, OrderKind, ResponseReceiver};
use crate::ports::{MsgWriter, PeerManagerApi, RemoteInfo, RemotePeer};

/// Outbound orders waiting for the writer.
const WRITE_PIPE_CAPACITY: usize = 20;
/// Recently seen block hashes per peer.
const BLOCK_CACHE_SIZE: usize = 300;
/// Recently seen tx hashes per peer.
const TX_CACHE_SIZE: usize = 4096;
/// Tx hashes waiting to be batched into one notice.
const TX_NOTICE_QUEUE_SIZE: usize = 2048;
/// Cadence of tx-notice batching.
const TX_NOTICE_INTERVAL: Duration = Duration::from_secs(3);
/// Cadence of request pruning.
const CLEAN_REQUEST_INTERVAL: Duration = Duration::from_secs(60 * 60);
/// Requests unanswered this long are forgotten.
const REQUEST_MAX_AGE: Duration = Duration::from_secs(60 * 60);

struct RequestEntry {
    proto: SubProtocol,
    timestamp_ns: i64,
    receiver: Option<ResponseReceiver>,
}

/// Bounded membership cache: a hash set rotated by a pressable ring.
struct BoundedHashCache {
    set: HashSet<[u8; 32]>,
    ring: PressableQueue<[u8; 32]>,
}

impl BoundedHashCache {
    fn new(capacity: usize) -> Self {
        Self {
            set: HashSet::with_capacity(capacity),
            ring: PressableQueue::new(capacity),
        }
    }

    /// Returns `true` when the hash was already present; records it
    /// otherwise.
    fn contains_or_add(&mut self, hash: [u8; 32]) -> bool {
        if self.set.contains(&hash) {
            return true;
        }
        if let Some(evicted) = self.ring.press(hash) {
            self.set.remove(&evicted);
        }
        self.set.insert(hash);
        false
    }

    fn contains(&self, hash: &[u8; 32]) -> bool {
        self.set.contains(hash)
    }
}

/// The default [`RemotePeer`].
pub struct RemotePeerImpl {
    self_ref: Weak<RemotePeerImpl>,
    remote_info: RwLock<RemoteInfo>,
    state: AtomicU8,
    mf: MessageOrderFactory,
    pm: Arc<dyn PeerManagerApi>,
    writer: Arc<dyn MsgWriter>,

    write_pipe: Arc<ChannelPipe<MsgOrder>>,
    write_rx: Mutex<Option<mpsc::Receiver<MsgOrder>>>,
    pipe_stats: Arc<StatListener>,

    handlers: RwLock<HandlerRegistry>,
    requests: Mutex<HashMap<MsgId, RequestEntry>>,

    last_notice: Mutex<Option<(BlockHash, u64)>>,
    blk_cache: Mutex<BoundedHashCache>,
    tx_cache: Mutex<BoundedHashCache>,
    tx_notice_queue: Mutex<PressableQueue<TxHash>>,

    stop_tx: Mutex<Option<mpsc::Sender<()>>>,
}

impl RemotePeerImpl {
    /// Build a peer runtime. Must be called inside a tokio runtime; the
    /// write-pipe dispatcher starts immediately, the loops on [`run`].
    ///
    /// [`run`]: RemotePeerImpl::run
    pub fn new(
        remote_info: RemoteInfo,
        pm: Arc<dyn PeerManagerApi>,
        writer: Arc<dyn MsgWriter>,
    ) -> Arc<Self> {
        let stats = Arc::new(StatListener::new());
        let hang = HangResolver::new(remote_info.meta.id.clone(), Arc::clone(&pm));
        let listener: Arc<dyn PipeEventListener<MsgOrder>> = Arc::new(MultiListener::new(vec![
            Box::new(SharedStat(Arc::clone(&stats))),
            Box::new(hang),
        ]));
        let (write_pipe, write_rx) = ChannelPipe::open(WRITE_PIPE_CAPACITY, listener);

        Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            remote_info: RwLock::new(remote_info),
            state: AtomicU8::new(PeerState::Handshaking.as_u8()),
            mf: MessageOrderFactory,
            pm,
            writer,
            write_pipe,
            write_rx: Mutex::new(Some(write_rx)),
            pipe_stats: stats,
            handlers: RwLock::new(HandlerRegistry::new()),
            requests: Mutex::new(HashMap::new()),
            last_notice: Mutex::new(None),
            blk_cache: Mutex::new(BoundedHashCache::new(BLOCK_CACHE_SIZE)),
            tx_cache: Mutex::new(BoundedHashCache::new(TX_CACHE_SIZE)),
            tx_notice_queue: Mutex::new(PressableQueue::new(TX_NOTICE_QUEUE_SIZE)),
            stop_tx: Mutex::new(None),
        })
    }

    /// Register the handler serving one subprotocol.
    pub fn add_message_handler(&self, handler: Box<dyn MessageHandler>) {
        self.handlers.write().register(handler);
    }

    /// Counters of the write pipe, for diagnostics.
    pub fn pipe_stats(&self) -> &StatListener {
        &self.pipe_stats
    }

    /// Spawn the write loop and the maintenance loop, then mark the peer
    /// RUNNING.
    pub fn run(&self) {
        let Some(write_rx) = self.write_rx.lock().take() else {
            warn!(peer_id = %short_form(&self.id()), "peer already running");
            return;
        };
        let Some(this) = self.self_ref.upgrade() else {
            return;
        };
        debug!(peer_id = %short_form(&self.id()), "starting peer");

        tokio::spawn(Arc::clone(&this).run_write(write_rx));

        let (stop_tx, stop_rx) = mpsc::channel(1);
        *self.stop_tx.lock() = Some(stop_tx);
        tokio::spawn(this.run_maintenance(stop_rx));

        self.state
            .store(PeerState::Running.as_u8(), Ordering::Release);
    }

    async fn run_write(self: Arc<Self>, mut write_rx: mpsc::Receiver<MsgOrder>) {
        while let Some(order) = write_rx.recv().await {
            match self.writer.write_order(&order) {
                Ok(_n) => {}
                Err(e) => {
                    warn!(
                        peer_id = %short_form(&self.id()),
                        error = %e,
                        "failed to write message, removing peer"
                    );
                    self.pm.remove_peer(&self.id());
                    break;
                }
            }
            self.write_pipe.done();
        }
        debug!(peer_id = %short_form(&self.id()), "quitting write loop");
    }

    async fn run_maintenance(self: Arc<Self>, mut stop_rx: mpsc::Receiver<()>) {
        let mut tx_ticker = tokio::time::interval(TX_NOTICE_INTERVAL);
        let mut clean_ticker = tokio::time::interval(CLEAN_REQUEST_INTERVAL);
        tx_ticker.tick().await;
        clean_ticker.tick().await;
        loop {
            tokio::select! {
                _ = stop_rx.recv() => break,
                _ = tx_ticker.tick() => self.try_send_tx_notices(),
                _ = clean_ticker.tick() => self.prune_requests(SystemTime::now()),
            }
        }
    }

    /// Stop both loops and refuse further sends. Terminal.
    pub fn stop(&self) {
        info!(peer_id = %short_form(&self.id()), "finishing peer");
        self.state
            .store(PeerState::Stopped.as_u8(), Ordering::Release);
        if let Some(stop_tx) = self.stop_tx.lock().take() {
            let _ = stop_tx.try_send(());
        }
        self.write_pipe.close();
    }

    /// External lifecycle driver (the peer manager) moves the state.
    pub fn set_state(&self, state: PeerState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    /// Queue tx hashes for the next batched notice.
    pub fn push_txs_notice(&self, hashes: &[TxHash]) {
        let mut queue = self.tx_notice_queue.lock();
        for hash in hashes {
            queue.press(*hash);
        }
    }

    /// Flush queued tx hashes into one notice, skipping hashes this peer
    /// already knows.
    fn try_send_tx_notices(&self) {
        let mut queue = self.tx_notice_queue.lock();
        if queue.is_empty() {
            return;
        }
        let mut cache = self.tx_cache.lock();
        let mut hashes = Vec::with_capacity(queue.size());
        while let Some(hash) = queue.poll() {
            if cache.contains_or_add(hash) {
                continue;
            }
            hashes.push(hash);
        }
        drop(cache);
        drop(queue);
        if !hashes.is_empty() {
            let notice = PayloadBody::NewTxNotice(NewTxNoticeBody { tx_hashes: hashes });
            self.send_message(self.mf.new_notice_order(notice));
        }
    }

    /// Forget unanswered requests older than [`REQUEST_MAX_AGE`].
    pub fn prune_requests(&self, now: SystemTime) {
        let cutoff = now
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(0)
            - REQUEST_MAX_AGE.as_nanos() as i64;
        let mut requests = self.requests.lock();
        let before = requests.len();
        requests.retain(|id, entry| {
            if entry.timestamp_ns >= cutoff {
                true
            } else {
                debug!(msg_id = %id, proto = %entry.proto, "pruning unanswered request");
                false
            }
        });
        let pruned = before - requests.len();
        if pruned > 0 {
            info!(
                peer_id = %short_form(&self.id()),
                count = pruned,
                "pruned requests with no response"
            );
        }
    }

    /// Dispatch one inbound message through the handler registry.
    pub fn handle_msg(&self, header: &MsgHeader, raw: &[u8]) -> Result<(), P2pError> {
        let Some(this) = self.self_ref.upgrade() else {
            return Err(P2pError::Internal("peer is gone".to_string()));
        };
        let peer: Arc<dyn RemotePeer> = this;
        self.handlers.read().dispatch(&peer, header, raw)
    }

    /// Number of in-flight request correlations.
    pub fn pending_requests(&self) -> usize {
        self.requests.lock().len()
    }

    /// The most recent block notice this peer sent, if any.
    pub fn last_notice(&self) -> Option<(BlockHash, u64)> {
        *self.last_notice.lock()
    }
}

/// Adapter letting the shared stat listener join a multi-listener.
struct SharedStat(Arc<StatListener>);

impl PipeEventListener<MsgOrder> for SharedStat {
    fn on_in(&self, element: &MsgOrder) {
        self.0.on_in(element);
    }
    fn on_drop(&self, element: &MsgOrder) {
        self.0.on_drop(element);
    }
    fn on_out(&self, element: &MsgOrder) {
        self.0.on_out(element);
    }
}

#[async_trait]
impl RemotePeer for RemotePeerImpl {
    fn id(&self) -> PeerId {
        self.remote_info.read().meta.id.clone()
    }

    fn name(&self) -> String {
        let info = self.remote_info.read();
        let addr = info.meta.addresses.first().cloned().unwrap_or_default();
        format!("{}@{}", short_form(&info.meta.id), addr)
    }

    fn meta(&self) -> PeerMeta {
        self.remote_info.read().meta.clone()
    }

    fn remote_info(&self) -> RemoteInfo {
        self.remote_info.read().clone()
    }

    fn state(&self) -> PeerState {
        PeerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn send_message(&self, mut order: MsgOrder) {
        if self.state() != PeerState::Running {
            debug!(
                peer_id = %short_form(&self.id()),
                proto = %order.subprotocol(),
                msg_id = %order.msg_id(),
                state = ?self.state(),
                "canceling send, peer is not running"
            );
            return;
        }
        if order.is_request() {
            let receiver = order.take_receiver();
            self.requests.lock().insert(
                order.msg_id(),
                RequestEntry {
                    proto: order.subprotocol(),
                    timestamp_ns: order.timestamp(),
                    receiver,
                },
            );
        }
        if !self.write_pipe.put(order) {
            debug!(peer_id = %short_form(&self.id()), "write pipe is closed");
        }
    }

    async fn send_and_wait_message(
        &self,
        mut order: MsgOrder,
        timeout: Duration,
    ) -> Result<PayloadBody, P2pError> {
        if self.state() != PeerState::Running {
            return Err(P2pError::Internal("peer is not running".to_string()));
        }
        let msg_id = order.msg_id();
        let (tx, rx) = oneshot::channel();
        let mut tx = Some(tx);
        let receiver: ResponseReceiver = Box::new(move |_header, body| {
            if let Some(tx) = tx.take() {
                let _ = tx.send(body.clone());
            }
            true
        });
        order.kind = OrderKind::Request {
            receiver: Some(receiver),
        };
        self.send_message(order);

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(body)) => Ok(body),
            Ok(Err(_)) => Err(P2pError::Internal("reply channel closed".to_string())),
            Err(_) => {
                self.consume_request(msg_id);
                Err(P2pError::Timeout)
            }
        }
    }

    fn consume_request(&self, msg_id: MsgId) {
        self.requests.lock().remove(&msg_id);
    }

    fn invoke_receiver(&self, header: &MsgHeader, body: &PayloadBody) -> bool {
        let entry = self.requests.lock().remove(&header.original_id);
        let Some(mut entry) = entry else {
            return false;
        };
        match entry.receiver.take() {
            // call outside the lock; receivers may call back into the peer
            Some(mut receiver) => receiver(header, body),
            None => false,
        }
    }

    fn update_last_notice(&self, block_hash: BlockHash, block_no: u64) {
        *self.last_notice.lock() = Some((block_hash, block_no));
    }

    fn update_blk_cache(&self, block_hash: BlockHash, block_no: u64) -> bool {
        self.update_last_notice(block_hash, block_no);
        self.blk_cache.lock().contains_or_add(block_hash)
    }

    fn update_tx_cache(&self, hashes: &[TxHash]) -> Vec<TxHash> {
        let mut cache = self.tx_cache.lock();
        hashes
            .iter()
            .filter(|h| !cache.contains_or_add(**h))
            .copied()
            .collect()
    }

    fn add_certificate(&self, cert: AgentCertificateV1) {
        let mut info = self.remote_info.write();
        info.certificates.retain(|old| old.bp_id != cert.bp_id);
        info.certificates.push(cert);
    }

    fn mf(&self) -> MessageOrderFactory {
        self.mf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::PingHandler;
    use crate::testing::{info, pid, MockPeerManager, MockWriter};
    use shared_types::{MessageBody, PayloadBody, PeerRole, PingBody, PongBody};

    fn setup() -> (Arc<RemotePeerImpl>, Arc<MockWriter>, Arc<MockPeerManager>) {
        let pm = Arc::new(MockPeerManager::default());
        let writer = Arc::new(MockWriter::default());
        let peer = RemotePeerImpl::new(info(pid(1), PeerRole::Watcher), pm.clone(), writer.clone());
        peer.run();
        (peer, writer, pm)
    }

    async fn wait_written(writer: &MockWriter, count: usize) {
        for _ in 0..200 {
            if writer.written.lock().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("writer never saw {count} orders");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_request_written_and_correlated() {
        let (peer, writer, _pm) = setup();
        assert_eq!(peer.state(), PeerState::Running);

        let order = peer.mf().new_request_order_with_receiver(
            PayloadBody::Ping(PingBody::default()),
            Box::new(|_, _| true),
        );
        let msg_id = order.msg_id();
        peer.send_message(order);

        wait_written(&writer, 1).await;
        assert_eq!(writer.protos(), vec![SubProtocol::PingRequest]);
        assert_eq!(peer.pending_requests(), 1);

        let header = MsgHeader::response(SubProtocol::PingResponse, msg_id, 0, 1);
        assert!(peer.invoke_receiver(&header, &PayloadBody::Pong(PongBody::default())));
        assert_eq!(peer.pending_requests(), 0);

        // a second invocation finds nothing
        assert!(!peer.invoke_receiver(&header, &PayloadBody::Pong(PongBody::default())));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_send_and_wait_roundtrip() {
        let (peer, writer, _pm) = setup();
        let order = peer
            .mf()
            .new_request_order(PayloadBody::Ping(PingBody::default()));
        let msg_id = order.msg_id();

        let waiter = {
            let peer = Arc::clone(&peer);
            tokio::spawn(async move {
                peer.send_and_wait_message(order, Duration::from_secs(5)).await
            })
        };

        wait_written(&writer, 1).await;
        let header = MsgHeader::response(SubProtocol::PingResponse, msg_id, 0, 1);
        let pong = PongBody {
            best_block_hash: [3u8; 32],
            best_height: 12,
        };
        assert!(peer.invoke_receiver(&header, &PayloadBody::Pong(pong.clone())));

        let got = waiter.await.unwrap().unwrap();
        assert_eq!(got, PayloadBody::Pong(pong));
        assert_eq!(peer.pending_requests(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_send_and_wait_times_out() {
        let (peer, _writer, _pm) = setup();
        let order = peer
            .mf()
            .new_request_order(PayloadBody::Ping(PingBody::default()));
        let err = peer
            .send_and_wait_message(order, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_eq!(err, P2pError::Timeout);
        // the timed-out correlation was cleared
        assert_eq!(peer.pending_requests(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_write_failure_removes_peer() {
        let (peer, writer, pm) = setup();
        *writer.fail.lock() = true;
        peer.send_message(
            peer.mf()
                .new_notice_order(PayloadBody::Ping(PingBody::default())),
        );
        for _ in 0..200 {
            if !pm.removed.lock().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(*pm.removed.lock(), vec![peer.id()]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_handle_msg_end_to_end() {
        let (peer, writer, _pm) = setup();
        peer.add_message_handler(Box::new(PingHandler));

        let ping = PingBody {
            best_block_hash: [8u8; 32],
            best_height: 42,
        };
        let header = MsgHeader::request(SubProtocol::PingRequest, 0, 1);
        peer.handle_msg(&header, &ping.encode().unwrap()).unwrap();

        wait_written(&writer, 1).await;
        let written = writer.written.lock();
        assert_eq!(written[0].0, SubProtocol::PingResponse);
        assert_eq!(written[0].2, header.id);
        let PayloadBody::Pong(ref pong) = written[0].3 else {
            panic!("expected pong");
        };
        assert_eq!(pong.best_height, 42);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_send_refused_when_not_running() {
        let (peer, writer, _pm) = setup();
        peer.stop();
        peer.send_message(
            peer.mf()
                .new_notice_order(PayloadBody::Ping(PingBody::default())),
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(writer.written.lock().is_empty());
        assert_eq!(peer.state(), PeerState::Stopped);
    }

    #[tokio::test]
    async fn test_block_cache_deduplicates() {
        let (peer, _writer, _pm) = setup();
        assert!(!peer.update_blk_cache([7u8; 32], 5));
        assert!(peer.update_blk_cache([7u8; 32], 5));
        assert!(!peer.update_blk_cache([8u8; 32], 6));
    }

    #[tokio::test]
    async fn test_tx_cache_returns_only_new() {
        let (peer, _writer, _pm) = setup();
        let added = peer.update_tx_cache(&[[1u8; 32], [2u8; 32]]);
        assert_eq!(added.len(), 2);
        let added = peer.update_tx_cache(&[[1u8; 32], [3u8; 32]]);
        assert_eq!(added, vec![[3u8; 32]]);
    }

    #[tokio::test]
    async fn test_bounded_cache_evicts_oldest() {
        let mut cache = BoundedHashCache::new(2);
        assert!(!cache.contains_or_add([1u8; 32]));
        assert!(!cache.contains_or_add([2u8; 32]));
        assert!(!cache.contains_or_add([3u8; 32]));
        // the first entry was rotated out
        assert!(!cache.contains(&[1u8; 32]));
        assert!(cache.contains(&[2u8; 32]));
        assert!(cache.contains(&[3u8; 32]));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_tx_notices_flushed_in_batch() {
        let (peer, writer, _pm) = setup();
        peer.push_txs_notice(&[[1u8; 32], [2u8; 32]]);
        // hashes the peer already knows are not re-announced
        peer.update_tx_cache(&[[9u8; 32]]);
        peer.push_txs_notice(&[[9u8; 32]]);

        // the batching ticker fires every few seconds
        for _ in 0..800 {
            if !writer.written.lock().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let written = writer.written.lock();
        assert_eq!(written[0].0, SubProtocol::NewTxNotice);
        let PayloadBody::NewTxNotice(ref notice) = written[0].3 else {
            panic!("expected tx notice");
        };
        assert_eq!(notice.tx_hashes, vec![[1u8; 32], [2u8; 32]]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_standard_handler_set_end_to_end() {
        use crate::handler::standard_handlers;
        use crate::testing::MockBus;
        use crate::NoticeAuthorizer;
        use hc_03_agent_cert::new_certificate_manager;
        use shared_types::NewBlockNoticeBody;

        let (peer, _writer, _pm) = setup();
        let bus = MockBus::new();
        let self_meta = shared_types::PeerMeta::new(
            pid(0x60),
            vec!["192.168.0.7".to_string()],
            PeerRole::Watcher,
        );
        struct Nothing;
        impl hc_03_agent_cert::CertActorGateway for Nothing {
            fn request_issue(&self, _bp_id: &PeerId) {}
            fn notify_cert_renewed(&self, _cert: &AgentCertificateV1) {}
        }
        let cm = new_certificate_manager(self_meta, None, Arc::new(Nothing)).unwrap();
        let handlers = standard_handlers(
            &(bus.clone() as Arc<dyn crate::ports::ActorBus>),
            Arc::new(NoticeAuthorizer::new()),
            cm,
        );
        for handler in handlers {
            peer.add_message_handler(handler);
        }

        let notice = NewBlockNoticeBody {
            block_hash: [0x44u8; 32],
            block_no: 17,
        };
        let header = MsgHeader::request(SubProtocol::NewBlockNotice, 0, 1);
        peer.handle_msg(&header, &notice.encode().unwrap()).unwrap();

        assert_eq!(bus.sync.new_blocks.lock().len(), 1);
        assert_eq!(peer.last_notice(), Some(([0x44u8; 32], 17)));
        // a repeat of the same hash stays in the cache
        peer.handle_msg(&header, &notice.encode().unwrap()).unwrap();
        assert_eq!(bus.sync.new_blocks.lock().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_prune_requests_drops_stale() {
        let (peer, writer, _pm) = setup();
        let mut old = peer
            .mf()
            .new_request_order(PayloadBody::Ping(PingBody::default()));
        old.header.timestamp -= (2 * 60 * 60) as i64 * 1_000_000_000;
        peer.send_message(old);
        peer.send_message(
            peer.mf()
                .new_request_order(PayloadBody::Ping(PingBody::default())),
        );
        wait_written(&writer, 2).await;
        assert_eq!(peer.pending_requests(), 2);

        peer.prune_requests(SystemTime::now());
        assert_eq!(peer.pending_requests(), 1);
    }
}
