//! Subprotocol handler framework.
//!
//! Every inbound message type has a handler with three operations: parse
//! the raw body, check the sender's authority, handle. Handlers never
//! panic on peer input: a parse or auth failure drops the message (and may
//! cost the peer a penalty), everything else turns into a typed response
//! status.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use tracing::{debug, warn};

use hc_03_agent_cert::{check_wire_cert, CertificateManager, IssueError};
use shared_types::{
    short_form, GetBlocksResponseBody, IssueCertResponseBody, MsgHeader, P2pError, PayloadBody,
    PeerId, ResultStatus, SubProtocol,
};

use crate::permit::AsyncPermit;
use crate::ports::{ChainAccessor, RemotePeer, SyncGateway};
use crate::NoticeAuthorizer;

/// Handler for one subprotocol.
pub trait MessageHandler: Send + Sync {
    /// The tag this handler serves.
    fn protocol(&self) -> SubProtocol;

    /// Decode the raw body bytes.
    fn parse_payload(&self, raw: &[u8]) -> Result<PayloadBody, P2pError> {
        PayloadBody::decode(self.protocol(), raw)
    }

    /// Reject messages the sender has no authority for. Default: allow.
    fn check_auth(
        &self,
        _peer: &Arc<dyn RemotePeer>,
        _header: &MsgHeader,
        _body: &PayloadBody,
    ) -> Result<(), P2pError> {
        Ok(())
    }

    fn handle(&self, peer: &Arc<dyn RemotePeer>, header: &MsgHeader, body: &PayloadBody);
}

/// Advice wrapper logging how long a handler took.
pub struct WithTimeLog<H> {
    inner: H,
}

impl<H: MessageHandler> WithTimeLog<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

impl<H: MessageHandler> MessageHandler for WithTimeLog<H> {
    fn protocol(&self) -> SubProtocol {
        self.inner.protocol()
    }

    fn parse_payload(&self, raw: &[u8]) -> Result<PayloadBody, P2pError> {
        self.inner.parse_payload(raw)
    }

    fn check_auth(
        &self,
        peer: &Arc<dyn RemotePeer>,
        header: &MsgHeader,
        body: &PayloadBody,
    ) -> Result<(), P2pError> {
        self.inner.check_auth(peer, header, body)
    }

    fn handle(&self, peer: &Arc<dyn RemotePeer>, header: &MsgHeader, body: &PayloadBody) {
        let started = Instant::now();
        self.inner.handle(peer, header, body);
        debug!(
            proto = %self.protocol(),
            msg_id = %header.id,
            elapsed_us = started.elapsed().as_micros() as u64,
            "handler finished"
        );
    }
}

/// Mapping `subprotocol → handler`, owned by each peer.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<SubProtocol, Box<dyn MessageHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Box<dyn MessageHandler>) {
        self.handlers.insert(handler.protocol(), handler);
    }

    /// Parse, authorize and handle one inbound message.
    pub fn dispatch(
        &self,
        peer: &Arc<dyn RemotePeer>,
        header: &MsgHeader,
        raw: &[u8],
    ) -> Result<(), P2pError> {
        let Some(handler) = self.handlers.get(&header.subprotocol) else {
            debug!(
                peer_id = %short_form(&peer.id()),
                proto = %header.subprotocol,
                "no handler for protocol"
            );
            return Err(P2pError::Internal(format!(
                "invalid protocol {}",
                header.subprotocol
            )));
        };
        let body = match handler.parse_payload(raw) {
            Ok(body) => body,
            Err(e) => {
                warn!(
                    peer_id = %short_form(&peer.id()),
                    msg_id = %header.id,
                    proto = %header.subprotocol,
                    error = %e,
                    "invalid message data"
                );
                return Err(e);
            }
        };
        if let Err(e) = handler.check_auth(peer, header, &body) {
            warn!(
                peer_id = %short_form(&peer.id()),
                msg_id = %header.id,
                proto = %header.subprotocol,
                error = %e,
                "failed to authorize message"
            );
            return Err(e);
        }
        handler.handle(peer, header, &body);
        Ok(())
    }
}

/// The handler set every ordinary peer gets, wired against the node's
/// actor bus. Blocking handlers and privileged notices are wrapped with
/// timing advice.
pub fn standard_handlers(
    bus: &Arc<dyn crate::ports::ActorBus>,
    authorizer: Arc<NoticeAuthorizer>,
    cm: Arc<dyn CertificateManager>,
) -> Vec<Box<dyn MessageHandler>> {
    vec![
        Box::new(PingHandler),
        Box::new(WithTimeLog::new(GetBlocksRequestHandler::new(
            bus.chain_accessor(),
        ))),
        Box::new(GetBlocksResponseHandler),
        Box::new(NewBlockNoticeHandler::new(bus.sync_gateway())),
        Box::new(WithTimeLog::new(BlockProducedNoticeHandler::new(
            Arc::clone(&authorizer),
            bus.sync_gateway(),
        ))),
        Box::new(CertRenewedNoticeHandler::new(authorizer)),
        Box::new(IssueCertRequestHandler::new(Arc::clone(&cm))),
        Box::new(IssueCertResponseHandler::new(cm)),
    ]
}

// ---------------------------------------------------------------------------
// Concrete handlers
// ---------------------------------------------------------------------------

/// Answers pings with the mirror pong.
pub struct PingHandler;

impl MessageHandler for PingHandler {
    fn protocol(&self) -> SubProtocol {
        SubProtocol::PingRequest
    }

    fn handle(&self, peer: &Arc<dyn RemotePeer>, header: &MsgHeader, body: &PayloadBody) {
        let PayloadBody::Ping(ping) = body else { return };
        let pong = shared_types::PongBody {
            best_block_hash: ping.best_block_hash,
            best_height: ping.best_height,
        };
        peer.send_message(
            peer.mf()
                .new_response_order(header.id, PayloadBody::Pong(pong)),
        );
    }
}

/// Serves block bodies from the chain, one request in flight at a time.
///
/// Block assembly can block on chain I/O, so the work runs in a spawned
/// task under a single-slot permit; a second request while the slot is
/// taken is answered with `ResourceExhausted` immediately.
pub struct GetBlocksRequestHandler {
    chain: Arc<dyn ChainAccessor>,
    permit: AsyncPermit,
}

impl GetBlocksRequestHandler {
    pub fn new(chain: Arc<dyn ChainAccessor>) -> Self {
        Self {
            chain,
            permit: AsyncPermit::new(),
        }
    }
}

impl MessageHandler for GetBlocksRequestHandler {
    fn protocol(&self) -> SubProtocol {
        SubProtocol::GetBlocksRequest
    }

    fn handle(&self, peer: &Arc<dyn RemotePeer>, header: &MsgHeader, body: &PayloadBody) {
        let PayloadBody::GetBlocksRequest(req) = body else { return };

        let Some(guard) = self.permit.issue() else {
            debug!(
                peer_id = %short_form(&peer.id()),
                "get blocks already in progress, rejecting"
            );
            let resp = GetBlocksResponseBody {
                status: ResultStatus::ResourceExhausted,
                blocks: Vec::new(),
                has_next: false,
            };
            peer.send_message(
                peer.mf()
                    .new_response_order(header.id, PayloadBody::GetBlocksResponse(resp)),
            );
            return;
        };

        let chain = Arc::clone(&self.chain);
        let peer = Arc::clone(peer);
        let hashes = req.hashes.clone();
        let original_id = header.id;
        tokio::spawn(async move {
            let _guard = guard;
            let mut blocks = Vec::with_capacity(hashes.len());
            let mut status = ResultStatus::Ok;
            for hash in &hashes {
                match chain.get_block(hash) {
                    Ok(Some(block)) => blocks.push(block),
                    Ok(None) => {
                        if blocks.is_empty() {
                            status = ResultStatus::NotFound;
                        }
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "chain accessor failed");
                        status = ResultStatus::Internal;
                        blocks.clear();
                        break;
                    }
                }
            }
            let resp = GetBlocksResponseBody {
                status,
                blocks,
                has_next: false,
            };
            peer.send_message(
                peer.mf()
                    .new_response_order(original_id, PayloadBody::GetBlocksResponse(resp)),
            );
        });
    }
}

/// Routes block responses to the receiver registered at request time.
pub struct GetBlocksResponseHandler;

impl MessageHandler for GetBlocksResponseHandler {
    fn protocol(&self) -> SubProtocol {
        SubProtocol::GetBlocksResponse
    }

    fn handle(&self, peer: &Arc<dyn RemotePeer>, header: &MsgHeader, body: &PayloadBody) {
        if !peer.invoke_receiver(header, body) {
            // no live receiver; clear accounting and let it fall through
            peer.consume_request(header.original_id);
            debug!(
                peer_id = %short_form(&peer.id()),
                original_id = %header.original_id,
                "unhandled get blocks response"
            );
        }
    }
}

/// Feeds fresh block announcements to the sync orchestrator.
pub struct NewBlockNoticeHandler {
    sync: Arc<dyn SyncGateway>,
}

impl NewBlockNoticeHandler {
    pub fn new(sync: Arc<dyn SyncGateway>) -> Self {
        Self { sync }
    }
}

impl MessageHandler for NewBlockNoticeHandler {
    fn protocol(&self) -> SubProtocol {
        SubProtocol::NewBlockNotice
    }

    fn handle(&self, peer: &Arc<dyn RemotePeer>, _header: &MsgHeader, body: &PayloadBody) {
        let PayloadBody::NewBlockNotice(notice) = body else { return };
        if !peer.update_blk_cache(notice.block_hash, notice.block_no) {
            self.sync.on_new_block_notice(peer.id(), notice.clone());
        }
    }
}

/// Accepts block-produced notices only from an authorized producer or its
/// certified agent.
pub struct BlockProducedNoticeHandler {
    authorizer: Arc<NoticeAuthorizer>,
    sync: Arc<dyn SyncGateway>,
}

impl BlockProducedNoticeHandler {
    pub fn new(authorizer: Arc<NoticeAuthorizer>, sync: Arc<dyn SyncGateway>) -> Self {
        Self { authorizer, sync }
    }
}

impl MessageHandler for BlockProducedNoticeHandler {
    fn protocol(&self) -> SubProtocol {
        SubProtocol::BlockProducedNotice
    }

    fn check_auth(
        &self,
        peer: &Arc<dyn RemotePeer>,
        _header: &MsgHeader,
        body: &PayloadBody,
    ) -> Result<(), P2pError> {
        let PayloadBody::BlockProducedNotice(notice) = body else {
            return Err(P2pError::ParseError("unexpected body".to_string()));
        };
        let bp_id = PeerId::from_bytes(&notice.producer_id)?;
        let info = peer.remote_info();
        if self
            .authorizer
            .authorize_block_produced(&info, &bp_id, SystemTime::now())
        {
            Ok(())
        } else {
            Err(P2pError::VerificationFailed)
        }
    }

    fn handle(&self, peer: &Arc<dyn RemotePeer>, _header: &MsgHeader, body: &PayloadBody) {
        let PayloadBody::BlockProducedNotice(notice) = body else { return };
        self.sync
            .on_block_produced(peer.id(), notice.block_no, notice.block.clone());
    }
}

/// Verifies and stores certificates renewed by an agent peer.
pub struct CertRenewedNoticeHandler {
    authorizer: Arc<NoticeAuthorizer>,
}

impl CertRenewedNoticeHandler {
    pub fn new(authorizer: Arc<NoticeAuthorizer>) -> Self {
        Self { authorizer }
    }
}

impl MessageHandler for CertRenewedNoticeHandler {
    fn protocol(&self) -> SubProtocol {
        SubProtocol::CertRenewedNotice
    }

    fn handle(&self, peer: &Arc<dyn RemotePeer>, _header: &MsgHeader, body: &PayloadBody) {
        let PayloadBody::CertRenewedNotice(notice) = body else { return };
        let now = SystemTime::now();
        let cert = match check_wire_cert(&notice.certificate, now) {
            Ok(cert) => cert,
            Err(e) => {
                debug!(
                    peer_id = %short_form(&peer.id()),
                    error = %e,
                    "cert verification failed"
                );
                return;
            }
        };
        let info = peer.remote_info();
        if self.authorizer.authorize_cert_renewed(&info, &cert, now) {
            peer.add_certificate(cert);
        }
    }
}

/// Issues a certificate when a managed agent asks for one.
pub struct IssueCertRequestHandler {
    cm: Arc<dyn CertificateManager>,
}

impl IssueCertRequestHandler {
    pub fn new(cm: Arc<dyn CertificateManager>) -> Self {
        Self { cm }
    }
}

impl MessageHandler for IssueCertRequestHandler {
    fn protocol(&self) -> SubProtocol {
        SubProtocol::IssueCertRequest
    }

    fn handle(&self, peer: &Arc<dyn RemotePeer>, header: &MsgHeader, body: &PayloadBody) {
        let PayloadBody::IssueCertRequest(_) = body else { return };

        let resp = match self.cm.create_certificate(&peer.meta()) {
            Ok(cert) => match cert.to_wire() {
                Ok(wire) => IssueCertResponseBody {
                    status: ResultStatus::Ok,
                    certificate: Some(wire),
                },
                Err(_) => IssueCertResponseBody {
                    status: ResultStatus::Internal,
                    certificate: None,
                },
            },
            Err(IssueError::InvalidRole) => IssueCertResponseBody {
                status: ResultStatus::PermissionDenied,
                certificate: None,
            },
            Err(_) => IssueCertResponseBody {
                status: ResultStatus::Unavailable,
                certificate: None,
            },
        };
        peer.send_message(
            peer.mf()
                .new_response_order(header.id, PayloadBody::IssueCertResponse(resp)),
        );
    }
}

/// Stores certificates issued to this node.
pub struct IssueCertResponseHandler {
    cm: Arc<dyn CertificateManager>,
}

impl IssueCertResponseHandler {
    pub fn new(cm: Arc<dyn CertificateManager>) -> Self {
        Self { cm }
    }
}

impl MessageHandler for IssueCertResponseHandler {
    fn protocol(&self) -> SubProtocol {
        SubProtocol::IssueCertResponse
    }

    fn handle(&self, peer: &Arc<dyn RemotePeer>, header: &MsgHeader, body: &PayloadBody) {
        let PayloadBody::IssueCertResponse(resp) = body else { return };
        peer.consume_request(header.original_id);
        if resp.status != ResultStatus::Ok {
            debug!(
                peer_id = %short_form(&peer.id()),
                status = ?resp.status,
                "certificate issue refused"
            );
            return;
        }
        let Some(wire) = &resp.certificate else { return };
        match check_wire_cert(wire, SystemTime::now()) {
            Ok(cert) => self.cm.add_certificate(cert),
            Err(e) => {
                debug!(
                    peer_id = %short_form(&peer.id()),
                    error = %e,
                    "failed to convert issued certificate"
                );
            }
        }
    }
}
