//! Authorization of privileged gossip notices.

use std::sync::Arc;
use std::time::SystemTime;

use tracing::debug;

use hc_03_agent_cert::{AgentCertificateV1, TIME_ERROR_TOLERANCE};
use shared_types::{short_form, PeerId, PeerRole, SubProtocol};

use crate::ports::RemoteInfo;

/// Hook for scoring peers that send unauthorized notices. Pluggable; the
/// default does nothing.
pub trait PenaltyHook: Send + Sync {
    fn on_unauthorized(&self, peer_id: &PeerId, proto: SubProtocol);
}

struct NoPenalty;

impl PenaltyHook for NoPenalty {
    fn on_unauthorized(&self, _peer_id: &PeerId, _proto: SubProtocol) {}
}

/// Decides whether privileged notices are acceptable from a given peer.
pub struct NoticeAuthorizer {
    penalty: Arc<dyn PenaltyHook>,
}

impl Default for NoticeAuthorizer {
    fn default() -> Self {
        Self::new()
    }
}

impl NoticeAuthorizer {
    pub fn new() -> Self {
        Self {
            penalty: Arc::new(NoPenalty),
        }
    }

    pub fn with_penalty_hook(penalty: Arc<dyn PenaltyHook>) -> Self {
        Self { penalty }
    }

    /// A block-produced notice signed by `bp_id` arrived on the peer
    /// described by `info`.
    ///
    /// A producer speaks for itself; an agent speaks for every producer it
    /// holds a currently valid certificate from; a legacy peer is treated
    /// as its own producer.
    pub fn authorize_block_produced(
        &self,
        info: &RemoteInfo,
        bp_id: &PeerId,
        now: SystemTime,
    ) -> bool {
        let allowed = match info.role {
            PeerRole::Agent => {
                info.meta.id == *bp_id
                    || info
                        .certificates
                        .iter()
                        .any(|c| c.bp_id == *bp_id && c.is_valid_at(now, TIME_ERROR_TOLERANCE))
            }
            PeerRole::LegacyVersion => info.meta.id == *bp_id,
            _ => info.meta.id == *bp_id,
        };
        if !allowed {
            debug!(
                peer_id = %short_form(&info.meta.id),
                bp_id = %short_form(bp_id),
                "unauthorized block produced notice"
            );
            self.penalty
                .on_unauthorized(&info.meta.id, SubProtocol::BlockProducedNotice);
        }
        allowed
    }

    /// A certificate-renewed notice carrying `cert` arrived on the peer
    /// described by `info`. The certificate itself must already have passed
    /// wire verification.
    pub fn authorize_cert_renewed(
        &self,
        info: &RemoteInfo,
        cert: &AgentCertificateV1,
        now: SystemTime,
    ) -> bool {
        let allowed = info.meta.role == PeerRole::Agent
            && info.meta.producer_ids.contains(&cert.bp_id)
            && cert.agent_id == info.meta.id
            && cert.is_valid_at(now, TIME_ERROR_TOLERANCE);
        if !allowed {
            debug!(
                peer_id = %short_form(&info.meta.id),
                bp_id = %short_form(&cert.bp_id),
                "unauthorized certificate renewed notice"
            );
            self.penalty
                .on_unauthorized(&info.meta.id, SubProtocol::CertRenewedNotice);
        }
        allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::PeerZone;
    use hc_03_agent_cert::{new_agent_cert_v1, DEFAULT_CERT_TTL};
    use parking_lot::Mutex;
    use shared_crypto::NodeKeyPair;
    use shared_types::PeerMeta;

    fn pid(b: u8) -> PeerId {
        PeerId::from_bytes(&[b; 32]).unwrap()
    }

    fn info(id: PeerId, role: PeerRole) -> RemoteInfo {
        let meta = PeerMeta::new(id, vec!["192.168.0.9".to_string()], role);
        RemoteInfo::new(meta, PeerZone::Internal)
    }

    fn cert_for(bp_key: &NodeKeyPair, agent_id: PeerId) -> AgentCertificateV1 {
        new_agent_cert_v1(
            bp_key.peer_id(),
            agent_id,
            bp_key,
            vec!["192.168.0.9".to_string()],
            DEFAULT_CERT_TTL,
        )
        .unwrap()
    }

    #[test]
    fn test_agent_with_cert_speaks_for_bp() {
        let bp_a = NodeKeyPair::generate();
        let bp_b = NodeKeyPair::generate();
        let agent_id = pid(0x10);
        let mut agent = info(agent_id.clone(), PeerRole::Agent);
        agent.certificates = vec![
            cert_for(&bp_a, agent_id.clone()),
            cert_for(&bp_b, agent_id),
        ];

        let auth = NoticeAuthorizer::new();
        let now = SystemTime::now();
        assert!(auth.authorize_block_produced(&agent, &bp_a.peer_id(), now));
        assert!(auth.authorize_block_produced(&agent, &bp_b.peer_id(), now));

        // no certificate from this producer
        let bp_c = NodeKeyPair::generate();
        assert!(!auth.authorize_block_produced(&agent, &bp_c.peer_id(), now));
    }

    #[test]
    fn test_bp_speaks_for_itself() {
        let bp_id = pid(0x20);
        let watcher = info(bp_id.clone(), PeerRole::Watcher);
        let auth = NoticeAuthorizer::new();
        let now = SystemTime::now();
        assert!(auth.authorize_block_produced(&watcher, &bp_id, now));

        let other = info(pid(0x21), PeerRole::Watcher);
        assert!(!auth.authorize_block_produced(&other, &bp_id, now));
    }

    #[test]
    fn test_legacy_peer_is_its_own_producer() {
        let bp_id = pid(0x30);
        let legacy = info(bp_id.clone(), PeerRole::LegacyVersion);
        let auth = NoticeAuthorizer::new();
        assert!(auth.authorize_block_produced(&legacy, &bp_id, SystemTime::now()));
        assert!(!auth.authorize_block_produced(&legacy, &pid(0x31), SystemTime::now()));
    }

    #[test]
    fn test_expired_cert_does_not_authorize() {
        let bp = NodeKeyPair::generate();
        let agent_id = pid(0x40);
        let mut agent = info(agent_id.clone(), PeerRole::Agent);
        agent.certificates = vec![cert_for(&bp, agent_id)];

        let auth = NoticeAuthorizer::new();
        let far_future = SystemTime::now() + DEFAULT_CERT_TTL * 2;
        assert!(!auth.authorize_block_produced(&agent, &bp.peer_id(), far_future));
    }

    #[test]
    fn test_cert_renewed_requires_matching_fields() {
        let bp = NodeKeyPair::generate();
        let agent_id = pid(0x50);
        let mut agent = info(agent_id.clone(), PeerRole::Agent);
        agent.meta.producer_ids = vec![bp.peer_id()];
        let cert = cert_for(&bp, agent_id.clone());

        let auth = NoticeAuthorizer::new();
        let now = SystemTime::now();
        assert!(auth.authorize_cert_renewed(&agent, &cert, now));

        // wrong role
        let mut watcher = info(agent_id.clone(), PeerRole::Watcher);
        watcher.meta.producer_ids = vec![bp.peer_id()];
        assert!(!auth.authorize_cert_renewed(&watcher, &cert, now));

        // producer not in the peer's managed set
        let mut other_agent = info(agent_id, PeerRole::Agent);
        other_agent.meta.producer_ids = vec![pid(0x51)];
        assert!(!auth.authorize_cert_renewed(&other_agent, &cert, now));

        // certificate naming a different agent
        let stray = cert_for(&bp, pid(0x52));
        assert!(!auth.authorize_cert_renewed(&agent, &stray, now));
    }

    struct CountingPenalty(Mutex<Vec<(PeerId, SubProtocol)>>);

    impl PenaltyHook for CountingPenalty {
        fn on_unauthorized(&self, peer_id: &PeerId, proto: SubProtocol) {
            self.0.lock().push((peer_id.clone(), proto));
        }
    }

    #[test]
    fn test_penalty_hook_fires_on_rejection() {
        let hook = Arc::new(CountingPenalty(Mutex::new(Vec::new())));
        let auth = NoticeAuthorizer::with_penalty_hook(hook.clone());

        let watcher = info(pid(0x60), PeerRole::Watcher);
        assert!(!auth.authorize_block_produced(&watcher, &pid(0x61), SystemTime::now()));

        let recorded = hook.0.lock();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].1, SubProtocol::BlockProducedNotice);
    }
}
