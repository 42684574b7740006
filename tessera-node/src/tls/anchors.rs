//! CA trust anchors and chain verification.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::client::danger::ServerCertVerifier;
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::server::danger::ClientCertVerifier;
use rustls::server::WebPkiClientVerifier;
use rustls::RootCertStore;
use tessera_trust::{HostIdentity, Role};

/// Checks a presented chain against configured trust anchors.
pub trait ChainVerifier: Send + Sync + std::fmt::Debug {
    /// Whether `chain` (leaf first) verifies for `host` at `now`.
    fn verify(&self, chain: &[CertificateDer<'_>], host: &HostIdentity, now: UnixTime) -> bool;
}

/// Load trust anchors from `dir`, or the bundled Mozilla roots if `None`.
///
/// Files that hold no parseable certificate are logged and skipped. A
/// directory that cannot be listed is an error.
pub fn load_trust_anchors(dir: Option<&Path>) -> Result<RootCertStore, AnchorError> {
    let mut roots = RootCertStore::empty();

    match dir {
        Some(dir) => {
            let entries = std::fs::read_dir(dir).map_err(|source| AnchorError::Directory {
                path: dir.to_path_buf(),
                source,
            })?;
            for entry in entries.filter_map(Result::ok) {
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                let certs: Vec<CertificateDer<'static>> = match CertificateDer::pem_file_iter(&path)
                {
                    Ok(iter) => iter.filter_map(Result::ok).collect(),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Skipping trust anchor file");
                        continue;
                    }
                };
                if certs.is_empty() {
                    tracing::warn!(path = %path.display(), "No certificates in trust anchor file");
                    continue;
                }
                let (added, ignored) = roots.add_parsable_certificates(certs);
                if ignored > 0 {
                    tracing::warn!(path = %path.display(), ignored, "Skipped unusable trust anchors");
                }
                tracing::debug!(path = %path.display(), added, "Loaded trust anchors");
            }
        }
        None => {
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            tracing::debug!(added = roots.len(), "Loaded bundled trust anchors");
        }
    }

    if roots.is_empty() {
        tracing::warn!("No trust anchors loaded; CA verification will reject every peer");
    }
    Ok(roots)
}

/// Chain verification backed by rustls' webpki verifiers.
#[derive(Debug)]
pub enum WebPkiChainVerifier {
    /// Verifies client chains; no name check.
    Server(Arc<dyn ClientCertVerifier>),
    /// Verifies server chains and that the leaf is valid for the dialed host.
    Client(Arc<WebPkiServerVerifier>),
    /// No usable anchors: nothing verifies.
    Disabled,
}

impl WebPkiChainVerifier {
    /// Build a verifier for `role` over `roots`.
    ///
    /// An empty root store yields [`WebPkiChainVerifier::Disabled`].
    pub fn new(
        role: Role,
        roots: RootCertStore,
        provider: Arc<CryptoProvider>,
    ) -> Result<Self, AnchorError> {
        if roots.is_empty() {
            return Ok(Self::Disabled);
        }
        let roots = Arc::new(roots);
        let verifier = match role {
            Role::Server => Self::Server(
                WebPkiClientVerifier::builder_with_provider(roots, provider)
                    .build()
                    .map_err(|e| AnchorError::Verifier(e.to_string()))?,
            ),
            Role::Client => Self::Client(
                WebPkiServerVerifier::builder_with_provider(roots, provider)
                    .build()
                    .map_err(|e| AnchorError::Verifier(e.to_string()))?,
            ),
        };
        Ok(verifier)
    }
}

impl ChainVerifier for WebPkiChainVerifier {
    fn verify(&self, chain: &[CertificateDer<'_>], host: &HostIdentity, now: UnixTime) -> bool {
        let Some((end_entity, intermediates)) = chain.split_first() else {
            return false;
        };
        match self {
            Self::Server(verifier) => verifier
                .verify_client_cert(end_entity, intermediates, now)
                .is_ok(),
            Self::Client(verifier) => {
                let Ok(server_name) = ServerName::try_from(host.host().to_string()) else {
                    return false;
                };
                verifier
                    .verify_server_cert(end_entity, intermediates, &server_name, &[], now)
                    .is_ok()
            }
            Self::Disabled => false,
        }
    }
}

/// Errors that can occur while loading trust anchors.
#[derive(Debug, thiserror::Error)]
pub enum AnchorError {
    #[error("cannot list trust anchor directory {path}: {source}")]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to build chain verifier: {0}")]
    Verifier(String),
}
