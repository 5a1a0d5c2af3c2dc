//! Client fingerprints stored on session rows.
//!
//! Raw user agents and IP addresses never reach storage: the user agent is
//! reduced to a short hash and the IP to its network, which is enough for
//! "same device / same network" checks without retaining identifying detail.

use std::net::IpAddr;

use sha2::{Digest, Sha256};

/// Hex length of the stored device hash (16 hex chars = 64 bits)
const DEVICE_HASH_LEN: usize = 16;

/// Hash a user-agent string into the short device fingerprint
pub fn device_hash(user_agent: &str) -> String {
    let digest = Sha256::digest(user_agent.as_bytes());
    let mut out = String::with_capacity(DEVICE_HASH_LEN);
    for byte in digest.iter().take(DEVICE_HASH_LEN / 2) {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Reduce an IP address to its network: /24 for IPv4, /64 for IPv6.
///
/// Unparseable input yields `"unknown"` rather than an error; the fingerprint
/// is advisory and must not block authentication.
pub fn ip_cidr(ip: &str) -> String {
    match ip.trim().parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => {
            let octets = v4.octets();
            format!("{}.{}.{}.0/24", octets[0], octets[1], octets[2])
        }
        Ok(IpAddr::V6(v6)) => {
            let segments = v6.segments();
            format!(
                "{:x}:{:x}:{:x}:{:x}::/64",
                segments[0], segments[1], segments[2], segments[3]
            )
        }
        Err(_) => "unknown".to_string(),
    }
}
