//! Identity types used for trust decisions.
//!
//! - [`Fingerprint`] - SHA-256 of a certificate's public key, lowercase hex
//! - [`HostIdentity`] - Remote peer identity derived from its network address

mod fingerprint;
mod host;

pub use fingerprint::Fingerprint;
pub use host::{HostIdentity, HostIdentityError};

/// Errors that can occur when parsing key material.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum KeyError {
    /// The fingerprint string has an invalid format.
    #[error("invalid fingerprint format (expected {} lowercase hex characters)", Fingerprint::HEX_LEN)]
    InvalidFingerprint,
}
