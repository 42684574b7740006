//! One validator per trust mode.
//!
//! Validators are pure: they see the presented fingerprint, whether the
//! chain verified against the configured trust anchors, and the current
//! ledger record for the peer. They return a decision and the ledger
//! effect that must be made durable before the decision counts.
//!
//! Whenever both a CA path and a ledger path apply, the CA path wins and
//! its write supersedes a self-signed record. A self-signed certificate
//! never supersedes a record in the mismatch-rejecting modes.

use super::decision::{LedgerEffect, RejectReason, TrustDecision};
use super::mode::TrustMode;
use crate::identity::Fingerprint;
use crate::ledger::{LedgerRecord, Provenance};

/// What the peer presented during the handshake.
#[derive(Debug, Clone, Copy)]
pub struct Presented<'a> {
    /// Fingerprint of the leaf certificate's public key.
    pub fingerprint: &'a Fingerprint,
    /// Whether the chain verified against the trust anchors.
    ///
    /// Only computed for modes where [`TrustMode::consults_ca`] holds;
    /// `false` otherwise.
    pub ca_verified: bool,
}

/// A trust policy.
pub trait TrustValidator: Send + Sync + std::fmt::Debug {
    /// The mode this validator implements.
    fn mode(&self) -> TrustMode;

    /// Decide whether to trust `presented`, given the current record for the peer.
    fn evaluate(&self, presented: &Presented<'_>, recorded: Option<&LedgerRecord>) -> TrustDecision;
}

/// Build the validator for a mode.
#[must_use]
pub fn validator_for(mode: TrustMode) -> Box<dyn TrustValidator> {
    match mode {
        TrustMode::Whitelist => Box::new(WhitelistValidator),
        TrustMode::Ca => Box::new(CaValidator),
        TrustMode::CaOrWhitelist => Box::new(CaOrWhitelistValidator),
        TrustMode::Tofu => Box::new(TofuValidator),
        TrustMode::CaOrTofu => Box::new(CaOrTofuValidator),
        TrustMode::NoValidation => Box::new(NoValidation),
        TrustMode::RecordAll => Box::new(RecordAllValidator),
        TrustMode::CaOrRecordAll => Box::new(CaOrRecordAllValidator),
    }
}

/// Ledger lookup outcome for the presented fingerprint.
enum Known {
    Unknown,
    Matches,
    Differs,
}

fn classify(fingerprint: &Fingerprint, recorded: Option<&LedgerRecord>) -> Known {
    match recorded {
        None => Known::Unknown,
        Some(record) if record.fingerprint == *fingerprint => Known::Matches,
        Some(_) => Known::Differs,
    }
}

/// Write needed so the ledger holds `fingerprint` with `provenance`.
fn record_effect(
    fingerprint: &Fingerprint,
    provenance: Provenance,
    recorded: Option<&LedgerRecord>,
) -> LedgerEffect {
    match recorded {
        None => LedgerEffect::Insert(provenance),
        Some(record) if record.fingerprint == *fingerprint && record.provenance == provenance => {
            LedgerEffect::None
        }
        Some(_) => LedgerEffect::Overwrite(provenance),
    }
}

/// Only hosts already in the ledger with a matching fingerprint.
#[derive(Debug)]
pub struct WhitelistValidator;

impl TrustValidator for WhitelistValidator {
    fn mode(&self) -> TrustMode {
        TrustMode::Whitelist
    }

    fn evaluate(&self, presented: &Presented<'_>, recorded: Option<&LedgerRecord>) -> TrustDecision {
        match classify(presented.fingerprint, recorded) {
            Known::Matches => TrustDecision::accept(),
            Known::Differs => TrustDecision::reject(RejectReason::FingerprintMismatch),
            Known::Unknown => TrustDecision::reject(RejectReason::UnknownHost),
        }
    }
}

/// Only CA-valid chains; the ledger is never read or written.
#[derive(Debug)]
pub struct CaValidator;

impl TrustValidator for CaValidator {
    fn mode(&self) -> TrustMode {
        TrustMode::Ca
    }

    fn evaluate(&self, presented: &Presented<'_>, _recorded: Option<&LedgerRecord>) -> TrustDecision {
        if presented.ca_verified {
            TrustDecision::accept()
        } else {
            TrustDecision::reject(RejectReason::NotCaVerified)
        }
    }
}

/// CA-valid chains, or whitelisted fingerprints. Never writes.
#[derive(Debug)]
pub struct CaOrWhitelistValidator;

impl TrustValidator for CaOrWhitelistValidator {
    fn mode(&self) -> TrustMode {
        TrustMode::CaOrWhitelist
    }

    fn evaluate(&self, presented: &Presented<'_>, recorded: Option<&LedgerRecord>) -> TrustDecision {
        if presented.ca_verified {
            return TrustDecision::accept();
        }
        match classify(presented.fingerprint, recorded) {
            Known::Matches => TrustDecision::accept(),
            Known::Differs => TrustDecision::reject(RejectReason::FingerprintMismatch),
            Known::Unknown => TrustDecision::reject(RejectReason::NotCaVerified),
        }
    }
}

/// First fingerprint seen for a host is pinned; anything else is rejected.
#[derive(Debug)]
pub struct TofuValidator;

impl TrustValidator for TofuValidator {
    fn mode(&self) -> TrustMode {
        TrustMode::Tofu
    }

    fn evaluate(&self, presented: &Presented<'_>, recorded: Option<&LedgerRecord>) -> TrustDecision {
        match classify(presented.fingerprint, recorded) {
            Known::Unknown => TrustDecision::accept_with(LedgerEffect::Insert(Provenance::SelfSigned)),
            Known::Matches => TrustDecision::accept(),
            Known::Differs => TrustDecision::reject(RejectReason::FingerprintMismatch),
        }
    }
}

/// CA-valid chains are always accepted and recorded; otherwise TOFU.
#[derive(Debug)]
pub struct CaOrTofuValidator;

impl TrustValidator for CaOrTofuValidator {
    fn mode(&self) -> TrustMode {
        TrustMode::CaOrTofu
    }

    fn evaluate(&self, presented: &Presented<'_>, recorded: Option<&LedgerRecord>) -> TrustDecision {
        if presented.ca_verified {
            return TrustDecision::accept_with(record_effect(
                presented.fingerprint,
                Provenance::CaVerified,
                recorded,
            ));
        }
        TofuValidator.evaluate(presented, recorded)
    }
}

/// Accepts everything and records nothing.
#[derive(Debug)]
pub struct NoValidation;

impl TrustValidator for NoValidation {
    fn mode(&self) -> TrustMode {
        TrustMode::NoValidation
    }

    fn evaluate(&self, _presented: &Presented<'_>, _recorded: Option<&LedgerRecord>) -> TrustDecision {
        TrustDecision::accept()
    }
}

/// Accepts everything and records the latest fingerprint per host.
#[derive(Debug)]
pub struct RecordAllValidator;

impl TrustValidator for RecordAllValidator {
    fn mode(&self) -> TrustMode {
        TrustMode::RecordAll
    }

    fn evaluate(&self, presented: &Presented<'_>, recorded: Option<&LedgerRecord>) -> TrustDecision {
        match classify(presented.fingerprint, recorded) {
            Known::Matches => TrustDecision::accept(),
            Known::Unknown | Known::Differs => TrustDecision::accept_with(record_effect(
                presented.fingerprint,
                Provenance::SelfSigned,
                recorded,
            )),
        }
    }
}

/// Accepts everything; records with CA provenance when the chain verifies.
///
/// Any mismatch overwrites, so a self-signed certificate replaces a CA record.
#[derive(Debug)]
pub struct CaOrRecordAllValidator;

impl TrustValidator for CaOrRecordAllValidator {
    fn mode(&self) -> TrustMode {
        TrustMode::CaOrRecordAll
    }

    fn evaluate(&self, presented: &Presented<'_>, recorded: Option<&LedgerRecord>) -> TrustDecision {
        if presented.ca_verified {
            return TrustDecision::accept_with(record_effect(
                presented.fingerprint,
                Provenance::CaVerified,
                recorded,
            ));
        }
        RecordAllValidator.evaluate(presented, recorded)
    }
}
