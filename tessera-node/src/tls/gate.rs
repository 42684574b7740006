//! Connection gate: the per-handshake trust decision.

use rustls::pki_types::{CertificateDer, UnixTime};
use tessera_trust::{
    subject_common_name, Fingerprint, HostIdentity, LedgerEffect, LedgerRecord, Presented,
    Provenance, RejectReason, TrustDecision,
};

use crate::ledger::{UpdateOutcome, UpdatePolicy};
use crate::tls::context::TlsContext;

/// A lost insert race is re-evaluated against the winner once; the second
/// evaluation sees a record and never asks for another insert.
const MAX_ATTEMPTS: usize = 2;

impl TlsContext {
    /// Decide whether `host`, presenting `chain` (leaf first), may connect.
    ///
    /// Any ledger write the decision depends on is durable before this
    /// returns. If the write fails the peer is rejected.
    ///
    /// The rustls verifiers call this before the peer's CertificateVerify
    /// is checked. Under the recording modes a peer replaying another
    /// node's public certificate can therefore get its fingerprint written
    /// even though the handshake then fails for lack of the private key.
    pub fn decide(&self, chain: &[CertificateDer<'_>], host: &HostIdentity) -> TrustDecision {
        self.decide_at(chain, host, UnixTime::now())
    }

    /// [`decide`](Self::decide) with an explicit verification time.
    pub fn decide_at(
        &self,
        chain: &[CertificateDer<'_>],
        host: &HostIdentity,
        now: UnixTime,
    ) -> TrustDecision {
        let fingerprint = match Fingerprint::from_leaf(chain) {
            Ok(fp) => fp,
            Err(e) => {
                tracing::warn!(
                    endpoint = %self.endpoint,
                    host = %host,
                    mode = self.mode.as_str(),
                    error = %e,
                    "Rejecting peer: unusable certificate"
                );
                return TrustDecision::reject(RejectReason::BadCertificate);
            }
        };

        let ca_verified = self.mode.consults_ca() && self.chain_verifier.verify(chain, host, now);
        let presented = Presented {
            fingerprint: &fingerprint,
            ca_verified,
        };

        let mut recorded = self.ledger.lookup(host);
        for _ in 0..MAX_ATTEMPTS {
            let decision = self.validator.evaluate(&presented, recorded.as_ref());
            let (provenance, policy) = match decision.effect {
                LedgerEffect::None => {
                    self.log_outcome(&decision, chain, host, &fingerprint, ca_verified);
                    return decision;
                }
                LedgerEffect::Insert(p) => (p, UpdatePolicy::InsertIfAbsent),
                LedgerEffect::Overwrite(p) => (p, UpdatePolicy::Overwrite),
            };

            match self.ledger.try_update(host, fingerprint, provenance, policy) {
                Ok(UpdateOutcome::Inserted) => {
                    self.log_write(host, &fingerprint, provenance, None);
                    return TrustDecision::accept_with(LedgerEffect::Insert(provenance));
                }
                Ok(UpdateOutcome::Overwritten { previous }) => {
                    self.log_write(host, &fingerprint, provenance, Some(&previous));
                    return TrustDecision::accept_with(LedgerEffect::Overwrite(provenance));
                }
                Ok(UpdateOutcome::Unchanged) => return TrustDecision::accept(),
                Ok(UpdateOutcome::Conflict { existing }) => {
                    tracing::debug!(
                        endpoint = %self.endpoint,
                        host = %host,
                        "Lost first-contact race, re-evaluating against recorded fingerprint"
                    );
                    recorded = Some(existing);
                }
                Err(e) => {
                    tracing::error!(
                        endpoint = %self.endpoint,
                        host = %host,
                        fingerprint = %fingerprint,
                        error = %e,
                        "Rejecting peer: ledger update not durable"
                    );
                    return TrustDecision::reject(RejectReason::LedgerUnavailable);
                }
            }
        }

        TrustDecision::reject(RejectReason::LedgerUnavailable)
    }

    fn log_outcome(
        &self,
        decision: &TrustDecision,
        chain: &[CertificateDer<'_>],
        host: &HostIdentity,
        fingerprint: &Fingerprint,
        ca_verified: bool,
    ) {
        match decision.reject_reason() {
            Some(reason) => {
                let subject = chain.first().and_then(|leaf| subject_common_name(leaf));
                tracing::warn!(
                    endpoint = %self.endpoint,
                    host = %host,
                    fingerprint = %fingerprint,
                    mode = self.mode.as_str(),
                    reason = %reason,
                    subject = subject.as_deref().unwrap_or("-"),
                    "Rejecting peer"
                );
            }
            None => {
                tracing::debug!(
                    endpoint = %self.endpoint,
                    host = %host,
                    fingerprint = %fingerprint,
                    mode = self.mode.as_str(),
                    ca_verified,
                    "Peer accepted"
                );
            }
        }
    }

    fn log_write(
        &self,
        host: &HostIdentity,
        fingerprint: &Fingerprint,
        provenance: Provenance,
        previous: Option<&LedgerRecord>,
    ) {
        match previous {
            None => tracing::info!(
                endpoint = %self.endpoint,
                host = %host,
                fingerprint = %fingerprint,
                provenance = %provenance,
                mode = self.mode.as_str(),
                "Recorded new peer"
            ),
            Some(previous) => tracing::info!(
                endpoint = %self.endpoint,
                host = %host,
                fingerprint = %fingerprint,
                provenance = %provenance,
                previous_fingerprint = %previous.fingerprint,
                previous_provenance = %previous.provenance,
                mode = self.mode.as_str(),
                "Replaced recorded peer"
            ),
        }
    }
}
