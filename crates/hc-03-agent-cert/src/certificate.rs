//! Agent certificate creation, verification and wire conversion.
//!
//! The signature covers a deterministic preimage so independently written
//! nodes agree on it byte for byte:
//!
//! ```text
//! u32le(version) ‖ bp_id ‖ bp_pub_key(compressed) ‖ u64le(create_time)
//!               ‖ u64le(expire_time) ‖ agent_id ‖ addresses in order
//! ```
//!
//! hashed with SHA-256 and signed with the producer key (DER ECDSA).

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use shared_crypto::{peer_id_from_pub_key, CryptoError, NodeKeyPair, NodePublicKey};
use shared_types::{CertificateWire, P2pError, PeerId};

use crate::address::check_address;

/// The only certificate version currently issued.
pub const CERT_VERSION_V1: u32 = 1;

/// Allowed clock error between issuer and verifier.
pub const TIME_ERROR_TOLERANCE: Duration = Duration::from_secs(10);

/// Validity of a freshly issued certificate.
pub const DEFAULT_CERT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// An agent asks for re-issue when its certificate expires within this.
pub const DEFAULT_EXPIRE_BUF: Duration = Duration::from_secs(60 * 60);

/// A verified (or freshly created) version-1 agent certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentCertificateV1 {
    pub version: u32,
    pub bp_id: PeerId,
    pub bp_pub_key: NodePublicKey,
    /// Nanoseconds since the unix epoch.
    pub create_time: u64,
    pub expire_time: u64,
    pub agent_id: PeerId,
    pub agent_addresses: Vec<String>,
    /// DER-encoded ECDSA signature by the producer key.
    pub signature: Vec<u8>,
}

impl AgentCertificateV1 {
    /// Whether `now` falls inside the validity window, widened by
    /// `tolerance` on both ends.
    pub fn is_valid_at(&self, now: SystemTime, tolerance: Duration) -> bool {
        let now_ns = unix_nanos(now);
        let tol_ns = tolerance.as_nanos() as u64;
        let lower = self.create_time.saturating_sub(tol_ns);
        let upper = self.expire_time.saturating_add(tol_ns);
        now_ns >= lower && now_ns <= upper
    }

    /// Whether the certificate expires within `buf` and should be renewed.
    pub fn needs_update(&self, now: SystemTime, buf: Duration) -> bool {
        let now_ns = unix_nanos(now);
        self.expire_time.saturating_sub(now_ns) < buf.as_nanos() as u64
    }

    /// Convert to the wire form. Fails on a certificate that could never
    /// verify (no addresses).
    pub fn to_wire(&self) -> Result<CertificateWire, P2pError> {
        if self.agent_addresses.is_empty() {
            return Err(P2pError::InvalidCertField);
        }
        Ok(CertificateWire {
            cert_version: self.version,
            bp_id: self.bp_id.as_bytes().to_vec(),
            bp_pub_key: self.bp_pub_key.as_bytes().to_vec(),
            create_time: self.create_time,
            expire_time: self.expire_time,
            agent_id: self.agent_id.as_bytes().to_vec(),
            agent_addresses: self
                .agent_addresses
                .iter()
                .map(|a| a.as_bytes().to_vec())
                .collect(),
            signature: self.signature.clone(),
        })
    }

    fn signing_preimage(&self) -> Vec<u8> {
        signing_preimage(
            self.version,
            &self.bp_id,
            &self.bp_pub_key,
            self.create_time,
            self.expire_time,
            &self.agent_id,
            &self.agent_addresses,
        )
    }
}

fn unix_nanos(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

fn signing_preimage(
    version: u32,
    bp_id: &PeerId,
    bp_pub_key: &NodePublicKey,
    create_time: u64,
    expire_time: u64,
    agent_id: &PeerId,
    addresses: &[String],
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(128);
    buf.extend_from_slice(&version.to_le_bytes());
    buf.extend_from_slice(bp_id.as_bytes());
    buf.extend_from_slice(bp_pub_key.as_bytes());
    buf.extend_from_slice(&create_time.to_le_bytes());
    buf.extend_from_slice(&expire_time.to_le_bytes());
    buf.extend_from_slice(agent_id.as_bytes());
    for addr in addresses {
        buf.extend_from_slice(addr.as_bytes());
    }
    buf
}

/// Create and sign a version-1 certificate delegating `bp_id` to
/// `agent_id` for `ttl`, reachable at `addrs`.
pub fn new_agent_cert_v1(
    bp_id: PeerId,
    agent_id: PeerId,
    bp_key: &NodeKeyPair,
    addrs: Vec<String>,
    ttl: Duration,
) -> Result<AgentCertificateV1, P2pError> {
    if addrs.is_empty() {
        return Err(P2pError::InvalidCertField);
    }
    let create_time = unix_nanos(SystemTime::now());
    let expire_time = create_time + ttl.as_nanos() as u64;
    let bp_pub_key = bp_key.public_key();

    let preimage = signing_preimage(
        CERT_VERSION_V1,
        &bp_id,
        &bp_pub_key,
        create_time,
        expire_time,
        &agent_id,
        &addrs,
    );
    let signature = bp_key.sign_der(&preimage);

    Ok(AgentCertificateV1 {
        version: CERT_VERSION_V1,
        bp_id,
        bp_pub_key,
        create_time,
        expire_time,
        agent_id,
        agent_addresses: addrs,
        signature,
    })
}

/// Verify a wire certificate of any known version.
pub fn check_wire_cert(
    wire: &CertificateWire,
    now: SystemTime,
) -> Result<AgentCertificateV1, P2pError> {
    match wire.cert_version {
        CERT_VERSION_V1 => check_and_get_v1(wire, now),
        _ => Err(P2pError::InvalidCertVersion),
    }
}

/// Verify a version-1 wire certificate and return the typed form.
///
/// Checks run in a fixed order: producer id, producer key, id/key binding,
/// validity window, agent id, addresses, signature encoding, signature.
pub fn check_and_get_v1(
    wire: &CertificateWire,
    now: SystemTime,
) -> Result<AgentCertificateV1, P2pError> {
    let bp_id = PeerId::from_bytes(&wire.bp_id).map_err(|_| P2pError::InvalidPeerId)?;
    let bp_pub_key =
        NodePublicKey::from_bytes(&wire.bp_pub_key).map_err(|_| P2pError::InvalidKey)?;
    if peer_id_from_pub_key(&bp_pub_key) != bp_id {
        return Err(P2pError::InvalidKey);
    }

    let now_ns = unix_nanos(now);
    let tol_ns = TIME_ERROR_TOLERANCE.as_nanos() as u64;
    if now_ns < wire.create_time.saturating_sub(tol_ns)
        || now_ns > wire.expire_time.saturating_add(tol_ns)
    {
        return Err(P2pError::InvalidCertField);
    }

    let cert = AgentCertificateV1 {
        version: wire.cert_version,
        bp_id,
        bp_pub_key,
        create_time: wire.create_time,
        expire_time: wire.expire_time,
        agent_id: PeerId::from_bytes(&wire.agent_id).map_err(|_| P2pError::InvalidPeerId)?,
        agent_addresses: parse_addresses(&wire.agent_addresses)?,
        signature: wire.signature.clone(),
    };

    match bp_pub_key.verify_der(&cert.signing_preimage(), &cert.signature) {
        Ok(()) => Ok(cert),
        Err(CryptoError::InvalidSignatureFormat) => Err(P2pError::InvalidCertField),
        Err(_) => Err(P2pError::VerificationFailed),
    }
}

fn parse_addresses(raw: &[Vec<u8>]) -> Result<Vec<String>, P2pError> {
    if raw.is_empty() {
        return Err(P2pError::InvalidCertField);
    }
    let mut out = Vec::with_capacity(raw.len());
    for bytes in raw {
        let addr = String::from_utf8(bytes.clone()).map_err(|_| P2pError::InvalidCertField)?;
        check_address(&addr).map_err(|_| P2pError::InvalidCertField)?;
        out.push(addr);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (NodeKeyPair, PeerId, PeerId, AgentCertificateV1) {
        let bp_key = NodeKeyPair::generate();
        let bp_id = bp_key.peer_id();
        let agent_id = PeerId::from_bytes(&[0x42u8; 32]).unwrap();
        let cert = new_agent_cert_v1(
            bp_id.clone(),
            agent_id.clone(),
            &bp_key,
            vec![
                "192.168.0.2".to_string(),
                "2001:db8::1".to_string(),
                "tester.example.com".to_string(),
            ],
            DEFAULT_CERT_TTL,
        )
        .unwrap();
        (bp_key, bp_id, agent_id, cert)
    }

    #[test]
    fn test_create_convert_verify_roundtrip() {
        let (_, bp_id, agent_id, cert) = fixture();
        let wire = cert.to_wire().unwrap();
        let verified = check_wire_cert(&wire, SystemTime::now()).unwrap();

        assert_eq!(verified, cert);
        assert_eq!(verified.bp_id, bp_id);
        assert_eq!(verified.agent_id, agent_id);
    }

    #[test]
    fn test_empty_addresses_refused_at_create() {
        let bp_key = NodeKeyPair::generate();
        let err = new_agent_cert_v1(
            bp_key.peer_id(),
            PeerId::from_bytes(&[1u8; 32]).unwrap(),
            &bp_key,
            vec![],
            DEFAULT_CERT_TTL,
        )
        .unwrap_err();
        assert_eq!(err, P2pError::InvalidCertField);
    }

    #[test]
    fn test_unknown_version_rejected() {
        let (_, _, _, cert) = fixture();
        let mut wire = cert.to_wire().unwrap();
        wire.cert_version = 2;
        assert_eq!(
            check_wire_cert(&wire, SystemTime::now()).unwrap_err(),
            P2pError::InvalidCertVersion
        );
    }

    #[test]
    fn test_tampered_signature_fails() {
        let (_, _, _, cert) = fixture();
        let mut wire = cert.to_wire().unwrap();
        let last = wire.signature.len() - 1;
        wire.signature[last] ^= 0x01;
        let err = check_wire_cert(&wire, SystemTime::now()).unwrap_err();
        assert!(
            err == P2pError::VerificationFailed || err == P2pError::InvalidCertField,
            "got {err:?}"
        );
    }

    #[test]
    fn test_tampered_address_fails_verification() {
        let (_, _, _, cert) = fixture();
        let mut wire = cert.to_wire().unwrap();
        wire.agent_addresses[0] = b"192.168.0.3".to_vec();
        assert_eq!(
            check_wire_cert(&wire, SystemTime::now()).unwrap_err(),
            P2pError::VerificationFailed
        );
    }

    #[test]
    fn test_tampered_bp_id_fails_key_binding() {
        let (_, _, _, cert) = fixture();
        let mut wire = cert.to_wire().unwrap();
        wire.bp_id[0] ^= 0xff;
        assert_eq!(
            check_wire_cert(&wire, SystemTime::now()).unwrap_err(),
            P2pError::InvalidKey
        );
    }

    #[test]
    fn test_foreign_key_fails_id_binding() {
        // certificate claims bp_id of one key but carries another pubkey
        let (_, _, _, cert) = fixture();
        let other = NodeKeyPair::generate();
        let mut wire = cert.to_wire().unwrap();
        wire.bp_pub_key = other.public_key().as_bytes().to_vec();
        assert_eq!(
            check_wire_cert(&wire, SystemTime::now()).unwrap_err(),
            P2pError::InvalidKey
        );
    }

    #[test]
    fn test_garbage_pubkey_rejected() {
        let (_, _, _, cert) = fixture();
        let mut wire = cert.to_wire().unwrap();
        wire.bp_pub_key = vec![0u8; 33];
        assert_eq!(
            check_wire_cert(&wire, SystemTime::now()).unwrap_err(),
            P2pError::InvalidKey
        );
    }

    #[test]
    fn test_validity_window_with_tolerance() {
        let (_, _, _, cert) = fixture();
        let create = UNIX_EPOCH + Duration::from_nanos(cert.create_time);
        let expire = UNIX_EPOCH + Duration::from_nanos(cert.expire_time);

        assert!(cert.is_valid_at(create, TIME_ERROR_TOLERANCE));
        assert!(cert.is_valid_at(create - Duration::from_secs(5), TIME_ERROR_TOLERANCE));
        assert!(!cert.is_valid_at(create - Duration::from_secs(30), TIME_ERROR_TOLERANCE));
        assert!(cert.is_valid_at(expire + Duration::from_secs(5), TIME_ERROR_TOLERANCE));
        assert!(!cert.is_valid_at(expire + Duration::from_secs(30), TIME_ERROR_TOLERANCE));
    }

    #[test]
    fn test_expired_certificate_rejected() {
        let (_, _, _, cert) = fixture();
        let wire = cert.to_wire().unwrap();
        let after = UNIX_EPOCH + Duration::from_nanos(cert.expire_time) + Duration::from_secs(60);
        assert_eq!(
            check_wire_cert(&wire, after).unwrap_err(),
            P2pError::InvalidCertField
        );
    }

    #[test]
    fn test_invalid_address_syntax_rejected() {
        let (_, _, _, cert) = fixture();
        let mut wire = cert.to_wire().unwrap();
        wire.agent_addresses.push(b"not an address!".to_vec());
        assert_eq!(
            check_wire_cert(&wire, SystemTime::now()).unwrap_err(),
            P2pError::InvalidCertField
        );
    }

    #[test]
    fn test_needs_update_inside_buffer() {
        let (_, _, _, cert) = fixture();
        let expire = UNIX_EPOCH + Duration::from_nanos(cert.expire_time);
        assert!(!cert.needs_update(SystemTime::now(), DEFAULT_EXPIRE_BUF));
        assert!(cert.needs_update(expire - Duration::from_secs(60), DEFAULT_EXPIRE_BUF));
    }
}
