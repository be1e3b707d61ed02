//! # Agent Certificate Subsystem (hc-03)
//!
//! A block producer delegates its gossip privileges to an agent by signing
//! an [`AgentCertificateV1`]: a binding of `(bp_id, agent_id, addresses,
//! validity window)` under the producer's secp256k1 key. The messaging
//! layer verifies these certificates when privileged notices arrive.
//!
//! ## Modules
//!
//! - [`certificate`]: create / sign / verify and the bit-exact wire digest
//! - [`address`]: IP and DNS syntax validation for certified addresses
//! - [`manager`]: role-specific certificate management and renewal

pub mod address;
pub mod certificate;
pub mod manager;

pub use address::{check_address, AddressType};
pub use certificate::{
    check_and_get_v1, check_wire_cert, new_agent_cert_v1, AgentCertificateV1, CERT_VERSION_V1,
    DEFAULT_CERT_TTL, DEFAULT_EXPIRE_BUF, TIME_ERROR_TOLERANCE,
};
pub use manager::{new_certificate_manager, CertActorGateway, CertificateManager, IssueError};
