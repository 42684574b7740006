//! Connection gate behaviour across trust modes.
//!
//! These drive `TlsContext::decide` directly with minted certificates; the
//! handshake tests cover the rustls wiring.

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use common::{endpoint, self_signed, TestCa};
use rustls::pki_types::{CertificateDer, UnixTime};
use tessera_node::tls::{ChainVerifier, TlsContext};
use tessera_node::Endpoint;
use tessera_trust::{
    Fingerprint, HostIdentity, LedgerEffect, LedgerRecord, Provenance, RejectReason,
};

fn peer(ip: &str) -> HostIdentity {
    HostIdentity::parse(ip).unwrap()
}

fn fingerprint(cert: &CertificateDer<'_>) -> Fingerprint {
    Fingerprint::from_cert_der(cert).unwrap()
}

fn server_context(dir: &std::path::Path, mode: &str) -> TlsContext {
    TlsContext::build(&endpoint(dir, Endpoint::NodeServer, mode, None)).unwrap()
}

// ============================================================================
// Ledger-only modes
// ============================================================================

#[test]
fn test_tofu_first_contact_then_pinned() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = server_context(dir.path(), "tofu");
    let host = peer("10.0.0.7");
    let cert_a = self_signed("node-a");

    let first = ctx.decide(&[cert_a.clone()], &host);
    assert!(first.is_accept());
    assert_eq!(first.effect, LedgerEffect::Insert(Provenance::SelfSigned));

    let again = ctx.decide(&[cert_a.clone()], &host);
    assert!(again.is_accept());
    assert_eq!(again.effect, LedgerEffect::None);

    let impostor = ctx.decide(&[self_signed("node-a")], &host);
    assert_eq!(impostor.reject_reason(), Some(RejectReason::FingerprintMismatch));
    assert_eq!(
        ctx.ledger().lookup(&host).unwrap().fingerprint,
        fingerprint(&cert_a)
    );

    // The pin survives a restart.
    drop(ctx);
    let restarted = server_context(dir.path(), "tofu");
    assert!(restarted.decide(&[cert_a], &host).is_accept());
    assert!(!restarted.decide(&[self_signed("node-a")], &host).is_accept());
}

#[test]
fn test_whitelist_never_writes() {
    let dir = tempfile::tempdir().unwrap();
    let known = self_signed("known");
    let ledger_path = dir.path().join("ledger").join("known-peers");
    std::fs::create_dir_all(ledger_path.parent().unwrap()).unwrap();
    let line = LedgerRecord::new(peer("10.0.0.7"), fingerprint(&known), Provenance::SelfSigned)
        .to_line();
    std::fs::write(&ledger_path, format!("{line}\n")).unwrap();
    let before = std::fs::read(&ledger_path).unwrap();

    let ctx = server_context(dir.path(), "whitelist");

    assert!(ctx.decide(&[known.clone()], &peer("10.0.0.7")).is_accept());
    assert_eq!(
        ctx.decide(&[self_signed("other")], &peer("10.0.0.7")).reject_reason(),
        Some(RejectReason::FingerprintMismatch)
    );
    assert_eq!(
        ctx.decide(&[known], &peer("10.0.0.8")).reject_reason(),
        Some(RejectReason::UnknownHost)
    );

    assert_eq!(std::fs::read(&ledger_path).unwrap(), before);
}

#[test]
fn test_whitelist_matches_hand_written_forms() {
    let dir = tempfile::tempdir().unwrap();
    let inbound = self_signed("inbound");
    let outbound = self_signed("outbound");
    let ledger_path = dir.path().join("ledger").join("known-peers");
    std::fs::create_dir_all(ledger_path.parent().unwrap()).unwrap();
    std::fs::write(
        &ledger_path,
        format!(
            "::ffff:10.0.0.7 {}\nNode-B.example:8080 {}\n",
            fingerprint(&inbound),
            fingerprint(&outbound)
        ),
    )
    .unwrap();

    let server = server_context(dir.path(), "whitelist");
    let mapped = HostIdentity::from_ip("::ffff:10.0.0.7".parse().unwrap());
    assert!(server.decide(&[inbound], &mapped).is_accept());

    let client =
        TlsContext::build(&endpoint(dir.path(), Endpoint::NodeClient, "whitelist", None)).unwrap();
    let dialed = HostIdentity::for_remote_server("Node-B.example", 8080).unwrap();
    assert!(client.decide(&[outbound], &dialed).is_accept());
}

#[test]
fn test_record_all_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = server_context(dir.path(), "insecure-record");
    let host = peer("10.0.0.7");

    let first = ctx.decide(&[self_signed("a")], &host);
    assert_eq!(first.effect, LedgerEffect::Insert(Provenance::SelfSigned));

    let replacement = self_signed("b");
    let second = ctx.decide(&[replacement.clone()], &host);
    assert!(second.is_accept());
    assert_eq!(second.effect, LedgerEffect::Overwrite(Provenance::SelfSigned));
    assert_eq!(
        ctx.ledger().lookup(&host).unwrap().fingerprint,
        fingerprint(&replacement)
    );
}

#[test]
fn test_no_validation_leaves_no_trace() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = server_context(dir.path(), "insecure-no-validation");

    let decision = ctx.decide(&[self_signed("anyone")], &peer("10.0.0.7"));
    assert!(decision.is_accept());
    assert_eq!(decision.effect, LedgerEffect::None);
    assert!(!ctx.ledger().path().exists());
}

#[test]
fn test_unparseable_leaf_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = server_context(dir.path(), "insecure-no-validation");

    let garbage = CertificateDer::from(vec![0u8; 16]);
    assert_eq!(
        ctx.decide(&[garbage], &peer("10.0.0.7")).reject_reason(),
        Some(RejectReason::BadCertificate)
    );
    assert_eq!(
        ctx.decide(&[], &peer("10.0.0.7")).reject_reason(),
        Some(RejectReason::BadCertificate)
    );
}

// ============================================================================
// CA modes
// ============================================================================

#[test]
fn test_ca_mode_accepts_only_chained() {
    let ca = TestCa::new();
    let dir = tempfile::tempdir().unwrap();
    let ctx = TlsContext::build(&endpoint(
        dir.path(),
        Endpoint::NodeServer,
        "ca",
        Some(ca.anchor_dir()),
    ))
    .unwrap();
    let host = peer("10.0.0.7");

    let chained = ctx.decide(&[ca.issue("node-a.example")], &host);
    assert!(chained.is_accept());
    assert_eq!(chained.effect, LedgerEffect::None);

    assert_eq!(
        ctx.decide(&[self_signed("node-a")], &host).reject_reason(),
        Some(RejectReason::NotCaVerified)
    );
    assert!(ctx.ledger().is_empty());
}

#[test]
fn test_ca_or_tofu_supersedes_self_signed() {
    let ca = TestCa::new();
    let dir = tempfile::tempdir().unwrap();
    let ctx = TlsContext::build(&endpoint(
        dir.path(),
        Endpoint::NodeServer,
        "ca-or-tofu",
        Some(ca.anchor_dir()),
    ))
    .unwrap();
    let host = peer("10.0.0.7");

    let first = ctx.decide(&[self_signed("node-a")], &host);
    assert_eq!(first.effect, LedgerEffect::Insert(Provenance::SelfSigned));

    let chained = ca.issue("node-a.example");
    let upgrade = ctx.decide(&[chained.clone()], &host);
    assert!(upgrade.is_accept());
    assert_eq!(upgrade.effect, LedgerEffect::Overwrite(Provenance::CaVerified));

    // A self-signed certificate cannot take the record back.
    assert_eq!(
        ctx.decide(&[self_signed("node-a")], &host).reject_reason(),
        Some(RejectReason::FingerprintMismatch)
    );
    let record = ctx.ledger().lookup(&host).unwrap();
    assert_eq!(record.fingerprint, fingerprint(&chained));
    assert_eq!(record.provenance, Provenance::CaVerified);
}

#[test]
fn test_client_role_ca_checks_dialed_name() {
    let ca = TestCa::new();
    let dir = tempfile::tempdir().unwrap();
    let ctx = TlsContext::build(&endpoint(
        dir.path(),
        Endpoint::NodeClient,
        "ca",
        Some(ca.anchor_dir()),
    ))
    .unwrap();
    let cert = ca.issue("node-a.example");

    let right = HostIdentity::for_remote_server("node-a.example", 8080).unwrap();
    let wrong = HostIdentity::for_remote_server("node-b.example", 8080).unwrap();
    assert!(ctx.decide(&[cert.clone()], &right).is_accept());
    assert_eq!(
        ctx.decide(&[cert], &wrong).reject_reason(),
        Some(RejectReason::NotCaVerified)
    );
}

#[derive(Debug)]
struct AlwaysValid;

impl ChainVerifier for AlwaysValid {
    fn verify(&self, chain: &[CertificateDer<'_>], _: &HostIdentity, _: UnixTime) -> bool {
        !chain.is_empty()
    }
}

#[test]
fn test_ca_or_record_all_tags_provenance() {
    let dir = tempfile::tempdir().unwrap();
    let host = peer("10.0.0.7");

    let plain = server_context(dir.path(), "insecure-ca-or-record");
    let first = plain.decide(&[self_signed("a")], &host);
    assert_eq!(first.effect, LedgerEffect::Insert(Provenance::SelfSigned));
    drop(plain);

    let trusting = server_context(dir.path(), "insecure-ca-or-record")
        .with_chain_verifier(Arc::new(AlwaysValid));
    let second = trusting.decide(&[self_signed("b")], &host);
    assert_eq!(second.effect, LedgerEffect::Overwrite(Provenance::CaVerified));
    assert_eq!(
        trusting.ledger().lookup(&host).unwrap().provenance,
        Provenance::CaVerified
    );
    drop(trusting);

    // A self-signed certificate replaces the CA record in this mode.
    let replacement = self_signed("c");
    let plain = server_context(dir.path(), "insecure-ca-or-record");
    let third = plain.decide(&[replacement.clone()], &host);
    assert_eq!(third.effect, LedgerEffect::Overwrite(Provenance::SelfSigned));
    let record = plain.ledger().lookup(&host).unwrap();
    assert_eq!(record.fingerprint, fingerprint(&replacement));
    assert_eq!(record.provenance, Provenance::SelfSigned);
}

// ============================================================================
// Concurrency and durability
// ============================================================================

#[test]
fn test_concurrent_first_contact_single_winner() {
    const RACERS: usize = 8;

    let dir = tempfile::tempdir().unwrap();
    let ctx = Arc::new(server_context(dir.path(), "tofu"));
    let barrier = Arc::new(Barrier::new(RACERS));
    let host = peer("10.0.0.7");

    let handles: Vec<_> = (0..RACERS)
        .map(|i| {
            let ctx = ctx.clone();
            let barrier = barrier.clone();
            let host = host.clone();
            let cert = self_signed(&format!("racer-{i}"));
            thread::spawn(move || {
                barrier.wait();
                let decision = ctx.decide(&[cert.clone()], &host);
                (fingerprint(&cert), decision)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners: Vec<_> = results.iter().filter(|(_, d)| d.is_accept()).collect();
    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].1.effect, LedgerEffect::Insert(Provenance::SelfSigned));

    for (_, decision) in results.iter().filter(|(_, d)| !d.is_accept()) {
        assert_eq!(decision.reject_reason(), Some(RejectReason::FingerprintMismatch));
    }
    assert_eq!(ctx.ledger().lookup(&host).unwrap().fingerprint, winners[0].0);
}

#[test]
fn test_concurrent_distinct_hosts_all_recorded() {
    const PEERS: usize = 16;

    let dir = tempfile::tempdir().unwrap();
    let ctx = Arc::new(server_context(dir.path(), "tofu"));
    let barrier = Arc::new(Barrier::new(PEERS));

    let handles: Vec<_> = (0..PEERS)
        .map(|i| {
            let ctx = ctx.clone();
            let barrier = barrier.clone();
            let cert = self_signed(&format!("peer-{i}"));
            thread::spawn(move || {
                barrier.wait();
                ctx.decide(&[cert], &peer(&format!("10.0.1.{i}")))
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap().is_accept());
    }
    assert_eq!(ctx.ledger().len(), PEERS);

    let reopened = server_context(dir.path(), "tofu");
    assert_eq!(reopened.ledger().len(), PEERS);
}

#[test]
fn test_unflushable_ledger_rejects() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = server_context(dir.path(), "tofu");

    // Replace the ledger directory with a regular file so the rewrite fails.
    let ledger_dir = ctx.ledger().path().parent().unwrap().to_path_buf();
    let _ = std::fs::remove_dir_all(&ledger_dir);
    std::fs::write(&ledger_dir, b"").unwrap();

    let host = peer("10.0.0.7");
    let decision = ctx.decide(&[self_signed("a")], &host);
    assert_eq!(decision.reject_reason(), Some(RejectReason::LedgerUnavailable));
    assert!(ctx.ledger().lookup(&host).is_none());
}
