//! Syntax validation for certified agent addresses.

use std::net::IpAddr;

use shared_types::P2pError;

/// Kind of address a string was recognized as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    Ip,
    Dns,
}

const MAX_NAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// Validate an address string as an IP literal or a DNS name.
///
/// DNS labels follow the hostname grammar: up to 63 characters each,
/// alphanumeric or underscore first, alphanumeric, `-` or `_` afterwards.
pub fn check_address(addr: &str) -> Result<AddressType, P2pError> {
    if addr.parse::<IpAddr>().is_ok() {
        return Ok(AddressType::Ip);
    }
    if is_dns_name(addr) {
        return Ok(AddressType::Dns);
    }
    Err(P2pError::InvalidAddress(addr.to_string()))
}

fn is_dns_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return false;
    }
    // one trailing dot is allowed
    let name = name.strip_suffix('.').unwrap_or(name);
    if name.is_empty() {
        return false;
    }
    name.split('.').all(is_dns_label)
}

fn is_dns_label(label: &str) -> bool {
    if label.is_empty() || label.len() > MAX_LABEL_LEN {
        return false;
    }
    let mut chars = label.chars();
    let first = chars.next().expect("label checked non-empty");
    if !(first.is_ascii_alphanumeric() || first == '_') {
        return false;
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
