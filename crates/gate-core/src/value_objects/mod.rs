//! Value objects - immutable types that represent domain concepts

mod fingerprint;

pub use fingerprint::{device_hash, ip_cidr};
