//! Role-specific certificate management.
//!
//! A producer issues certificates for the agents it admits; an agent holds
//! the certificates issued to it and keeps them fresh; a watcher has no
//! business with certificates at all. The factory picks the implementation
//! from the node's own role.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use shared_crypto::NodeKeyPair;
use shared_types::{short_form, P2pError, PeerId, PeerMeta, PeerRole};

use crate::certificate::{
    new_agent_cert_v1, AgentCertificateV1, DEFAULT_CERT_TTL, DEFAULT_EXPIRE_BUF,
    TIME_ERROR_TOLERANCE,
};

/// How often an agent re-examines its certificates.
const RENEWAL_CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Why a certificate could not be issued.
#[derive(Debug, Error)]
pub enum IssueError {
    /// This node's role does not issue certificates.
    #[error("peer role may not issue certificates")]
    InvalidRole,
    #[error(transparent)]
    Cert(#[from] P2pError),
}

/// Outbound link to the rest of the node, used by the agent manager to ask
/// for re-issue and to announce renewals. Message-passing only; the manager
/// never holds references back into the peer layer.
pub trait CertActorGateway: Send + Sync {
    /// Ask the producer `bp_id` (via the peer layer) to issue a fresh
    /// certificate for this agent.
    fn request_issue(&self, bp_id: &PeerId);
    /// Announce a renewed certificate to connected peers.
    fn notify_cert_renewed(&self, cert: &AgentCertificateV1);
}

/// Certificate duties of one node, depending on its role.
pub trait CertificateManager: Send + Sync {
    fn start(&self);
    fn stop(&self);

    /// Issue a certificate for a remote agent. Producers only.
    fn create_certificate(&self, remote_meta: &PeerMeta)
        -> Result<AgentCertificateV1, IssueError>;

    /// Producers this node is an agent for.
    fn get_producers(&self) -> Vec<PeerId>;

    /// Certificates currently held. Agents only; empty otherwise.
    fn get_certificates(&self) -> Vec<AgentCertificateV1>;

    /// Accept a certificate issued to this node.
    fn add_certificate(&self, cert: AgentCertificateV1);

    /// A peer connected; agents use this to chase missing certificates.
    fn on_peer_connect(&self, pid: &PeerId);

    fn on_peer_disconnect(&self, pid: &PeerId);
}

/// Pick the manager implementation for the node's own role.
pub fn new_certificate_manager(
    self_meta: PeerMeta,
    node_key: Option<Arc<NodeKeyPair>>,
    gateway: Arc<dyn CertActorGateway>,
) -> Option<Arc<dyn CertificateManager>> {
    match self_meta.role {
        PeerRole::Producer => {
            let key = node_key?;
            Some(Arc::new(ProducerCertManager {
                self_meta,
                key,
            }))
        }
        PeerRole::Agent => Some(Arc::new(AgentCertManager {
            inner: Arc::new(AgentInner {
                self_meta,
                gateway,
                certs: Mutex::new(Vec::new()),
            }),
            ticker: Mutex::new(None),
        })),
        PeerRole::Watcher | PeerRole::LegacyVersion => {
            Some(Arc::new(WatcherCertManager { self_meta }))
        }
    }
}

/// A producer signs certificates for admitted agents.
struct ProducerCertManager {
    self_meta: PeerMeta,
    key: Arc<NodeKeyPair>,
}

impl CertificateManager for ProducerCertManager {
    fn start(&self) {}
    fn stop(&self) {}

    fn create_certificate(
        &self,
        remote_meta: &PeerMeta,
    ) -> Result<AgentCertificateV1, IssueError> {
        let cert = new_agent_cert_v1(
            self.self_meta.id.clone(),
            remote_meta.id.clone(),
            &self.key,
            remote_meta.addresses.clone(),
            DEFAULT_CERT_TTL,
        )?;
        Ok(cert)
    }

    fn get_producers(&self) -> Vec<PeerId> {
        Vec::new()
    }

    fn get_certificates(&self) -> Vec<AgentCertificateV1> {
        Vec::new()
    }

    fn add_certificate(&self, _cert: AgentCertificateV1) {}

    fn on_peer_connect(&self, _pid: &PeerId) {}

    fn on_peer_disconnect(&self, _pid: &PeerId) {}
}

struct TickerHandle {
    stop_tx: mpsc::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

/// An agent holds the certificates issued to it and keeps them fresh.
struct AgentCertManager {
    inner: Arc<AgentInner>,
    ticker: Mutex<Option<TickerHandle>>,
}

struct AgentInner {
    self_meta: PeerMeta,
    gateway: Arc<dyn CertActorGateway>,
    certs: Mutex<Vec<AgentCertificateV1>>,
}

impl AgentInner {
    /// Ask for re-issue of soon-expiring certificates and drop the ones
    /// that are no longer valid at all.
    fn refresh_certificates(&self) {
        let now = SystemTime::now();
        let mut certs = self.certs.lock();
        certs.retain(|cert| {
            if cert.needs_update(now, DEFAULT_EXPIRE_BUF) {
                self.gateway.request_issue(&cert.bp_id);
                if !cert.is_valid_at(now, TIME_ERROR_TOLERANCE) {
                    info!(
                        bp_id = %short_form(&cert.bp_id),
                        "dropping expired certificate"
                    );
                    return false;
                }
            }
            true
        });
    }
}

impl CertificateManager for AgentCertManager {
    fn start(&self) {
        let mut guard = self.ticker.lock();
        if guard.is_some() {
            warn!("certificate manager already running");
            return;
        }
        info!("starting agent certificate manager");
        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(RENEWAL_CHECK_INTERVAL);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = stop_rx.recv() => break,
                    _ = ticker.tick() => inner.refresh_certificates(),
                }
            }
        });
        *guard = Some(TickerHandle { stop_tx, task });
    }

    fn stop(&self) {
        if let Some(handle) = self.ticker.lock().take() {
            info!("finishing agent certificate manager");
            let _ = handle.stop_tx.try_send(());
            handle.task.abort();
        }
    }

    fn create_certificate(
        &self,
        _remote_meta: &PeerMeta,
    ) -> Result<AgentCertificateV1, IssueError> {
        Err(IssueError::InvalidRole)
    }

    fn get_producers(&self) -> Vec<PeerId> {
        self.inner.self_meta.producer_ids.clone()
    }

    fn get_certificates(&self) -> Vec<AgentCertificateV1> {
        self.inner.certs.lock().clone()
    }

    fn add_certificate(&self, cert: AgentCertificateV1) {
        let inner = &self.inner;
        if !inner.self_meta.producer_ids.contains(&cert.bp_id) {
            info!(
                bp_id = %short_form(&cert.bp_id),
                "dropping issued certificate, issuer is not a managed producer"
            );
            return;
        }
        if cert.agent_id != inner.self_meta.id {
            info!(
                bp_id = %short_form(&cert.bp_id),
                agent_id = %short_form(&cert.agent_id),
                "dropping issued certificate, agent id is not me"
            );
            return;
        }

        let mut certs = inner.certs.lock();
        // replace an older certificate from the same issuer
        certs.retain(|old| old.bp_id != cert.bp_id);
        info!(
            bp_id = %short_form(&cert.bp_id),
            expire = cert.expire_time,
            "issued certificate added"
        );
        certs.push(cert.clone());
        drop(certs);

        inner.gateway.notify_cert_renewed(&cert);
    }

    fn on_peer_connect(&self, pid: &PeerId) {
        let inner = &self.inner;
        if !inner.self_meta.producer_ids.contains(pid) {
            return;
        }
        let now = SystemTime::now();
        let certs = inner.certs.lock();
        let current = certs.iter().find(|c| &c.bp_id == pid);
        let wants_issue = match current {
            None => true,
            Some(cert) => cert.needs_update(now, DEFAULT_EXPIRE_BUF),
        };
        drop(certs);
        if wants_issue {
            inner.gateway.request_issue(pid);
        }
    }

    fn on_peer_disconnect(&self, _pid: &PeerId) {}
}

/// A watcher neither issues nor holds certificates.
struct WatcherCertManager {
    #[allow(dead_code)]
    self_meta: PeerMeta,
}

impl CertificateManager for WatcherCertManager {
    fn start(&self) {}
    fn stop(&self) {}

    fn create_certificate(
        &self,
        _remote_meta: &PeerMeta,
    ) -> Result<AgentCertificateV1, IssueError> {
        Err(IssueError::InvalidRole)
    }

    fn get_producers(&self) -> Vec<PeerId> {
        Vec::new()
    }

    fn get_certificates(&self) -> Vec<AgentCertificateV1> {
        Vec::new()
    }

    fn add_certificate(&self, _cert: AgentCertificateV1) {}

    fn on_peer_connect(&self, _pid: &PeerId) {}

    fn on_peer_disconnect(&self, _pid: &PeerId) {}
}
