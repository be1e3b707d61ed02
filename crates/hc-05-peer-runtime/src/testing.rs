//! Mock ports shared by this crate's tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use hc_03_agent_cert::AgentCertificateV1;
use shared_types::{
    BlockHash, MsgHeader, MsgId, NewBlockNoticeBody, P2pError, PayloadBody, PeerId, PeerMeta,
    PeerRole, PeerState, SubProtocol, TxHash,
};

use crate::message::{MessageOrderFactory, MsgOrder, ResponseReceiver};
use crate::ports::{
    ChainAccessor, MsgWriter, PeerManagerApi, PeerZone, RemoteInfo, RemotePeer, SyncGateway,
};

pub fn pid(b: u8) -> PeerId {
    PeerId::from_bytes(&[b; 32]).unwrap()
}

pub fn info(id: PeerId, role: PeerRole) -> RemoteInfo {
    RemoteInfo::new(
        PeerMeta::new(id, vec!["192.168.0.7".to_string()], role),
        PeerZone::Internal,
    )
}

/// Records written orders; optionally fails every write.
#[derive(Default)]
pub struct MockWriter {
    pub written: Mutex<Vec<(SubProtocol, MsgId, MsgId, PayloadBody)>>,
    pub fail: Mutex<bool>,
}

impl MockWriter {
    pub fn protos(&self) -> Vec<SubProtocol> {
        self.written.lock().iter().map(|w| w.0).collect()
    }
}

impl MsgWriter for MockWriter {
    fn write_order(&self, order: &MsgOrder) -> Result<usize, P2pError> {
        if *self.fail.lock() {
            return Err(P2pError::Internal("broken wire".to_string()));
        }
        let bytes = order.encode_body()?.len();
        self.written.lock().push((
            order.subprotocol(),
            order.msg_id(),
            order.header.original_id,
            order.body.clone(),
        ));
        Ok(bytes)
    }
}

#[derive(Default)]
pub struct MockPeerManager {
    pub removed: Mutex<Vec<PeerId>>,
}

impl PeerManagerApi for MockPeerManager {
    fn get_peer(&self, _id: &PeerId) -> Option<Arc<dyn RemotePeer>> {
        None
    }
    fn get_peers(&self) -> Vec<Arc<dyn RemotePeer>> {
        Vec::new()
    }
    fn add_peer_event_listener(&self, _listener: Box<dyn crate::ports::PeerEventListener>) {}
    fn notify_peer_address_received(&self, _metas: Vec<PeerMeta>) {}
    fn add_designated_peer(&self, _meta: PeerMeta) {}
    fn add_new_peer(&self, _meta: PeerMeta) {}
    fn remove_peer(&self, id: &PeerId) {
        self.removed.lock().push(id.clone());
    }
}

/// Chain accessor backed by a hash map; optionally slow or failing.
#[derive(Default)]
pub struct MockChain {
    pub blocks: Mutex<HashMap<BlockHash, Vec<u8>>>,
    pub fail: Mutex<bool>,
    pub delay: Mutex<Option<Duration>>,
}

impl ChainAccessor for MockChain {
    fn get_block(&self, hash: &BlockHash) -> Result<Option<Vec<u8>>, P2pError> {
        if let Some(delay) = *self.delay.lock() {
            std::thread::sleep(delay);
        }
        if *self.fail.lock() {
            return Err(P2pError::Internal("chain down".to_string()));
        }
        Ok(self.blocks.lock().get(hash).cloned())
    }
}

/// Actor bus handing out the mock chain and sync gateways.
pub struct MockBus {
    pub chain: Arc<MockChain>,
    pub sync: Arc<MockSync>,
}

impl MockBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            chain: Arc::new(MockChain::default()),
            sync: Arc::new(MockSync::default()),
        })
    }
}

impl crate::ports::ActorBus for MockBus {
    fn chain_accessor(&self) -> Arc<dyn ChainAccessor> {
        self.chain.clone()
    }
    fn sync_gateway(&self) -> Arc<dyn crate::ports::SyncGateway> {
        self.sync.clone()
    }
}

#[derive(Default)]
pub struct MockSync {
    pub new_blocks: Mutex<Vec<(PeerId, NewBlockNoticeBody)>>,
    pub produced: Mutex<Vec<(PeerId, u64)>>,
}

impl SyncGateway for MockSync {
    fn on_new_block_notice(&self, from: PeerId, notice: NewBlockNoticeBody) {
        self.new_blocks.lock().push((from, notice));
    }
    fn on_block_produced(&self, from: PeerId, block_no: u64, _block: Vec<u8>) {
        self.produced.lock().push((from, block_no));
    }
}

/// Scriptable peer double for handler tests.
pub struct MockRemotePeer {
    pub info: RemoteInfo,
    pub state: PeerState,
    pub sent: Mutex<Vec<(SubProtocol, MsgId, PayloadBody)>>,
    pub consumed: Mutex<Vec<MsgId>>,
    pub certs: Mutex<Vec<AgentCertificateV1>>,
    pub receivers: Mutex<HashMap<MsgId, ResponseReceiver>>,
    pub known_blocks: Mutex<Vec<BlockHash>>,
}

impl MockRemotePeer {
    pub fn new(info: RemoteInfo) -> Arc<Self> {
        Arc::new(Self {
            info,
            state: PeerState::Running,
            sent: Mutex::new(Vec::new()),
            consumed: Mutex::new(Vec::new()),
            certs: Mutex::new(Vec::new()),
            receivers: Mutex::new(HashMap::new()),
            known_blocks: Mutex::new(Vec::new()),
        })
    }

    pub fn register_receiver(&self, msg_id: MsgId, receiver: ResponseReceiver) {
        self.receivers.lock().insert(msg_id, receiver);
    }

    pub fn sent_protos(&self) -> Vec<SubProtocol> {
        self.sent.lock().iter().map(|s| s.0).collect()
    }
}

#[async_trait]
impl RemotePeer for MockRemotePeer {
    fn id(&self) -> PeerId {
        self.info.meta.id.clone()
    }
    fn name(&self) -> String {
        "mock".to_string()
    }
    fn meta(&self) -> PeerMeta {
        self.info.meta.clone()
    }
    fn remote_info(&self) -> RemoteInfo {
        let mut info = self.info.clone();
        info.certificates = self.certs.lock().clone();
        info
    }
    fn state(&self) -> PeerState {
        self.state
    }
    fn send_message(&self, order: MsgOrder) {
        self.sent
            .lock()
            .push((order.subprotocol(), order.header.original_id, order.body));
    }
    async fn send_and_wait_message(
        &self,
        order: MsgOrder,
        _timeout: Duration,
    ) -> Result<PayloadBody, P2pError> {
        self.send_message(order);
        Err(P2pError::Timeout)
    }
    fn consume_request(&self, msg_id: MsgId) {
        self.consumed.lock().push(msg_id);
    }
    fn invoke_receiver(&self, header: &MsgHeader, body: &PayloadBody) -> bool {
        match self.receivers.lock().remove(&header.original_id) {
            Some(mut receiver) => receiver(header, body),
            None => false,
        }
    }
    fn update_last_notice(&self, _block_hash: BlockHash, _block_no: u64) {}
    fn update_blk_cache(&self, block_hash: BlockHash, _block_no: u64) -> bool {
        let mut known = self.known_blocks.lock();
        if known.contains(&block_hash) {
            true
        } else {
            known.push(block_hash);
            false
        }
    }
    fn update_tx_cache(&self, hashes: &[TxHash]) -> Vec<TxHash> {
        hashes.to_vec()
    }
    fn add_certificate(&self, cert: AgentCertificateV1) {
        self.certs.lock().push(cert);
    }
    fn mf(&self) -> MessageOrderFactory {
        MessageOrderFactory
    }
}
