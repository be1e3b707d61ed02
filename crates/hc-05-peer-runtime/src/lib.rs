//! # Peer Runtime Subsystem (hc-05)
//!
//! The per-peer messaging runtime: message orders and their factory, the
//! remote-peer write loop over a bounded pipe, request/response
//! correlation, the subprotocol handler framework, notice authorization
//! and the single-slot async permit that bounds handler concurrency.
//!
//! ## Architecture Role
//!
//! ```text
//! transport read ──→ RemotePeerImpl::handle_msg ──→ handler registry
//!                                                       │ may fan out
//!                                                       ▼
//!                    write pipe (drop-oldest) ←── send_message / responses
//!                         │ dispatcher
//!                         ▼
//!                    MsgWriter (network)
//! ```
//!
//! The outer peer manager drives peer lifecycle; this crate only reads
//! peer state and reports misbehaving peers back through its ports.

pub mod authorizer;
pub mod handler;
pub mod hang;
pub mod message;
pub mod permit;
pub mod ports;
pub mod remote_peer;
#[cfg(test)]
pub mod testing;

pub use authorizer::NoticeAuthorizer;
pub use handler::{standard_handlers, HandlerRegistry, MessageHandler, WithTimeLog};
pub use hang::HangResolver;
pub use message::{MessageOrderFactory, MsgOrder, OrderKind, ResponseReceiver};
pub use permit::AsyncPermit;
pub use ports::{
    ActorBus, ChainAccessor, MsgWriter, PeerEventListener, PeerManagerApi, PeerZone, RemoteInfo,
    RemotePeer, SyncGateway,
};
pub use remote_peer::RemotePeerImpl;
