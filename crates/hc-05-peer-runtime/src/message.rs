//! Message orders: units of outbound work queued toward one peer.

use std::time::{SystemTime, UNIX_EPOCH};

use shared_types::{MsgHeader, MsgId, P2pError, PayloadBody, SubProtocol};

/// Closure invoked when the response to a request arrives.
///
/// Returns `true` when it fully handled the response; `false` lets the
/// synchronous default handler take over.
pub type ResponseReceiver = Box<dyn FnMut(&MsgHeader, &PayloadBody) -> bool + Send>;

/// What kind of exchange an order participates in.
pub enum OrderKind {
    /// Expects a response; may carry a receiver to be registered at send
    /// time.
    Request { receiver: Option<ResponseReceiver> },
    /// Answers the request named by the header's `original_id`.
    Response,
    /// One-way gossip.
    Notice,
}

/// One outbound message: header, body and its exchange kind.
pub struct MsgOrder {
    pub header: MsgHeader,
    pub body: PayloadBody,
    pub kind: OrderKind,
}

impl MsgOrder {
    pub fn msg_id(&self) -> MsgId {
        self.header.id
    }

    pub fn subprotocol(&self) -> SubProtocol {
        self.header.subprotocol
    }

    pub fn timestamp(&self) -> i64 {
        self.header.timestamp
    }

    pub fn is_request(&self) -> bool {
        matches!(self.kind, OrderKind::Request { .. })
    }

    /// Detach the response receiver for registration, leaving the order
    /// itself ready for the write queue.
    pub fn take_receiver(&mut self) -> Option<ResponseReceiver> {
        match &mut self.kind {
            OrderKind::Request { receiver } => receiver.take(),
            _ => None,
        }
    }

    /// Encode the body for the wire.
    pub fn encode_body(&self) -> Result<Vec<u8>, P2pError> {
        self.body.encode()
    }
}

impl std::fmt::Debug for MsgOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MsgOrder")
            .field("proto", &self.header.subprotocol)
            .field("id", &self.header.id)
            .field("original_id", &self.header.original_id)
            .finish()
    }
}

fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

/// Builds message orders with fresh ids and send timestamps.
#[derive(Debug, Default, Clone, Copy)]
pub struct MessageOrderFactory;

impl MessageOrderFactory {
    /// A request that nobody waits for in-line; the synchronous default
    /// handler deals with its response.
    pub fn new_request_order(&self, body: PayloadBody) -> MsgOrder {
        MsgOrder {
            header: MsgHeader::request(body.subprotocol(), 0, now_nanos()),
            body,
            kind: OrderKind::Request { receiver: None },
        }
    }

    /// A request whose response is routed to `receiver` first.
    pub fn new_request_order_with_receiver(
        &self,
        body: PayloadBody,
        receiver: ResponseReceiver,
    ) -> MsgOrder {
        MsgOrder {
            header: MsgHeader::request(body.subprotocol(), 0, now_nanos()),
            body,
            kind: OrderKind::Request {
                receiver: Some(receiver),
            },
        }
    }

    /// The response to the request named by `original_id`.
    pub fn new_response_order(&self, original_id: MsgId, body: PayloadBody) -> MsgOrder {
        MsgOrder {
            header: MsgHeader::response(body.subprotocol(), original_id, 0, now_nanos()),
            body,
            kind: OrderKind::Response,
        }
    }

    /// A one-way notice.
    pub fn new_notice_order(&self, body: PayloadBody) -> MsgOrder {
        MsgOrder {
            header: MsgHeader::request(body.subprotocol(), 0, now_nanos()),
            body,
            kind: OrderKind::Notice,
        }
    }
}
