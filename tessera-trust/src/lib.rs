//! Pure trust-establishment library for Tessera nodes.
//!
//! This crate is intentionally IO-free:
//! - No filesystem operations
//! - No network calls
//! - No logging
//!
//! It defines what a peer is ([`HostIdentity`]), what it presented
//! ([`Fingerprint`]), what the node remembers about it ([`LedgerRecord`]),
//! and how each [`TrustMode`] turns those into a [`TrustDecision`].
//! Persistence and TLS plumbing live in `tessera-node`.
//!
//! # Example
//!
//! ```
//! use tessera_trust::{validator_for, Fingerprint, Presented, Role, TrustMode};
//!
//! let mode = TrustMode::parse("tofu", Role::Server).unwrap();
//! let validator = validator_for(mode);
//!
//! let fingerprint = Fingerprint::from_hash_bytes([0xab; 32]);
//! let decision = validator.evaluate(
//!     &Presented { fingerprint: &fingerprint, ca_verified: false },
//!     None,
//! );
//! assert!(decision.is_accept());
//! ```

pub mod cert;
pub mod identity;
pub mod ledger;
pub mod trust;

pub use cert::{extract_spki_from_cert, subject_common_name, CertError};
pub use identity::{Fingerprint, HostIdentity, HostIdentityError, KeyError};
pub use ledger::{LedgerRecord, LineError, Provenance};
pub use trust::{
    validator_for, LedgerEffect, ModeError, Presented, RejectReason, Role, TrustDecision,
    TrustMode, TrustValidator, Verdict,
};
