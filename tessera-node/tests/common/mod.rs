//! Shared fixtures: a throwaway CA, peer certificates and endpoint configs.

#![allow(dead_code)]

use std::path::Path;

use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
    KeyUsagePurpose,
};
use rustls::pki_types::CertificateDer;
use tempfile::TempDir;
use tessera_node::{Endpoint, EndpointConfig};

/// A certificate authority whose root lives in its own anchor directory.
pub struct TestCa {
    cert: rcgen::Certificate,
    key: KeyPair,
    anchors: TempDir,
}

impl TestCa {
    pub fn new() -> Self {
        let key = KeyPair::generate().expect("CA key");
        let mut params = CertificateParams::new(Vec::<String>::new()).expect("CA params");
        params
            .distinguished_name
            .push(DnType::CommonName, "tessera test root");
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
        let cert = params.self_signed(&key).expect("CA cert");

        let anchors = tempfile::tempdir().expect("anchor dir");
        std::fs::write(anchors.path().join("root.pem"), cert.pem()).expect("write root");

        Self { cert, key, anchors }
    }

    /// Directory holding only this CA's root, for `trust_anchor_dir`.
    pub fn anchor_dir(&self) -> &Path {
        self.anchors.path()
    }

    /// Issue a leaf for `dns_name` with a fresh key.
    pub fn issue(&self, dns_name: &str) -> CertificateDer<'static> {
        let key = KeyPair::generate().expect("leaf key");
        let mut params =
            CertificateParams::new(vec![dns_name.to_string()]).expect("leaf params");
        params.distinguished_name.push(DnType::CommonName, dns_name);
        params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
        params.extended_key_usages = vec![
            ExtendedKeyUsagePurpose::ServerAuth,
            ExtendedKeyUsagePurpose::ClientAuth,
        ];
        params
            .signed_by(&key, &self.cert, &self.key)
            .expect("sign leaf")
            .der()
            .clone()
    }
}

/// A self-signed certificate with a fresh key.
pub fn self_signed(common_name: &str) -> CertificateDer<'static> {
    let key = KeyPair::generate().expect("key");
    let mut params = CertificateParams::new(vec!["localhost".to_string()]).expect("params");
    params.distinguished_name.push(DnType::CommonName, common_name);
    params.self_signed(&key).expect("self-signed").der().clone()
}

/// Endpoint config with every file inside `dir`.
pub fn endpoint(
    dir: &Path,
    endpoint: Endpoint,
    mode: &str,
    anchors: Option<&Path>,
) -> EndpointConfig {
    EndpointConfig {
        endpoint,
        trust_mode: mode.to_string(),
        cert_path: dir.join("cert.pem"),
        key_path: dir.join("key.pem"),
        chain_paths: Vec::new(),
        ledger_path: dir.join("ledger").join("known-peers"),
        trust_anchor_dir: anchors.map(Path::to_path_buf),
    }
}
