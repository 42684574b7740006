//! Trust decisions and their ledger effects.

use crate::ledger::Provenance;

/// Whether the handshake may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(RejectReason),
}

/// Why a peer was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum RejectReason {
    /// No ledger record exists and the mode does not admit new hosts.
    UnknownHost,
    /// The ledger holds a different fingerprint for this host.
    FingerprintMismatch,
    /// The mode requires a CA-valid chain and the chain did not verify.
    NotCaVerified,
    /// The leaf certificate could not be parsed.
    BadCertificate,
    /// The ledger write this acceptance depends on could not be made durable.
    LedgerUnavailable,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RejectReason::UnknownHost => "unknown host",
            RejectReason::FingerprintMismatch => "fingerprint mismatch",
            RejectReason::NotCaVerified => "certificate chain not CA-verified",
            RejectReason::BadCertificate => "unparseable certificate",
            RejectReason::LedgerUnavailable => "ledger write failed",
        })
    }
}

/// Ledger mutation attached to a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEffect {
    None,
    /// Record the fingerprint for a host that has no record.
    Insert(Provenance),
    /// Replace the host's existing record.
    Overwrite(Provenance),
}

/// Result of evaluating a presented certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustDecision {
    pub verdict: Verdict,
    pub effect: LedgerEffect,
}

impl TrustDecision {
    /// Accept without touching the ledger.
    #[must_use]
    pub const fn accept() -> Self {
        Self {
            verdict: Verdict::Accept,
            effect: LedgerEffect::None,
        }
    }

    /// Accept and apply a ledger effect.
    #[must_use]
    pub const fn accept_with(effect: LedgerEffect) -> Self {
        Self {
            verdict: Verdict::Accept,
            effect,
        }
    }

    #[must_use]
    pub const fn reject(reason: RejectReason) -> Self {
        Self {
            verdict: Verdict::Reject(reason),
            effect: LedgerEffect::None,
        }
    }

    #[must_use]
    pub fn is_accept(&self) -> bool {
        self.verdict == Verdict::Accept
    }

    /// The rejection reason, if rejected.
    #[must_use]
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self.verdict {
            Verdict::Accept => None,
            Verdict::Reject(reason) => Some(reason),
        }
    }
}
