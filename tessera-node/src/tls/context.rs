//! Per-endpoint TLS context factory.

use std::sync::Arc;

use rustls::client::ResolvesClientCert;
use rustls::crypto::CryptoProvider;
use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use rustls::{ClientConfig, ServerConfig, SignatureScheme};
use tessera_trust::{validator_for, Fingerprint, HostIdentity, ModeError, Role, TrustMode, TrustValidator};

use crate::config::{Endpoint, EndpointConfig};
use crate::ledger::{FingerprintLedger, LedgerError};
use crate::tls::anchors::{load_trust_anchors, AnchorError, ChainVerifier, WebPkiChainVerifier};
use crate::tls::provision::{CertificateIdentity, ProvisionError};
use crate::tls::verifier::{GatedClientVerifier, GatedServerVerifier};

/// Everything one endpoint needs to gate handshakes.
///
/// Built once at startup. The ledger inside is the only state shared
/// between concurrent handshakes.
pub struct TlsContext {
    pub(crate) endpoint: Endpoint,
    pub(crate) mode: TrustMode,
    pub(crate) local_fingerprint: Fingerprint,
    pub(crate) certified_key: Arc<CertifiedKey>,
    pub(crate) ledger: FingerprintLedger,
    pub(crate) validator: Box<dyn TrustValidator>,
    pub(crate) chain_verifier: Arc<dyn ChainVerifier>,
    pub(crate) provider: Arc<CryptoProvider>,
}

impl TlsContext {
    /// Provision the identity, open the ledger and select the validator.
    ///
    /// Trust anchors are only loaded for modes that consult CA validity.
    pub fn build(config: &EndpointConfig) -> Result<Self, ContextError> {
        let role = config.role();
        let mode = TrustMode::parse(&config.trust_mode, role)?;
        let provider = Arc::new(rustls::crypto::ring::default_provider());

        let identity = CertificateIdentity::ensure(config)?;
        let ledger = FingerprintLedger::open(&config.ledger_path)?;

        let chain_verifier: Arc<dyn ChainVerifier> = if mode.consults_ca() {
            let roots = load_trust_anchors(config.trust_anchor_dir.as_deref())?;
            Arc::new(WebPkiChainVerifier::new(role, roots, provider.clone())?)
        } else {
            Arc::new(WebPkiChainVerifier::Disabled)
        };

        let local_fingerprint = identity.fingerprint;
        let signing_key = provider
            .key_provider
            .load_private_key(identity.key)
            .map_err(ContextError::Tls)?;
        let certified_key = Arc::new(CertifiedKey::new(identity.chain, signing_key));

        tracing::info!(
            endpoint = %config.endpoint,
            mode = mode.as_str(),
            fingerprint = %local_fingerprint,
            ledger = %config.ledger_path.display(),
            known_hosts = ledger.len(),
            "TLS context ready"
        );

        Ok(Self {
            endpoint: config.endpoint,
            mode,
            local_fingerprint,
            certified_key,
            ledger,
            validator: validator_for(mode),
            chain_verifier,
            provider,
        })
    }

    /// Replace the CA chain verifier.
    #[must_use]
    pub fn with_chain_verifier(mut self, verifier: Arc<dyn ChainVerifier>) -> Self {
        self.chain_verifier = verifier;
        self
    }

    /// rustls server config whose client verifier gates on `peer`.
    pub fn server_config_for(
        self: &Arc<Self>,
        peer: HostIdentity,
    ) -> Result<Arc<ServerConfig>, ContextError> {
        self.expect_role(Role::Server)?;
        let verifier = Arc::new(GatedClientVerifier::new(Arc::clone(self), peer));
        let config = ServerConfig::builder_with_provider(self.provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(ContextError::Tls)?
            .with_client_cert_verifier(verifier)
            .with_cert_resolver(Arc::new(FixedCert(self.certified_key.clone())));
        Ok(Arc::new(config))
    }

    /// rustls client config whose server verifier gates on `peer`.
    pub fn client_config_for(
        self: &Arc<Self>,
        peer: HostIdentity,
    ) -> Result<Arc<ClientConfig>, ContextError> {
        self.expect_role(Role::Client)?;
        let verifier = Arc::new(GatedServerVerifier::new(Arc::clone(self), peer));
        let config = ClientConfig::builder_with_provider(self.provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(ContextError::Tls)?
            .dangerous()
            .with_custom_certificate_verifier(verifier)
            .with_client_cert_resolver(Arc::new(FixedCert(self.certified_key.clone())));
        Ok(Arc::new(config))
    }

    fn expect_role(&self, role: Role) -> Result<(), ContextError> {
        if self.endpoint.role() == role {
            Ok(())
        } else {
            Err(ContextError::WrongRole {
                endpoint: self.endpoint,
                role,
            })
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    #[must_use]
    pub fn mode(&self) -> TrustMode {
        self.mode
    }

    /// Fingerprint of this endpoint's own leaf certificate.
    #[must_use]
    pub fn local_fingerprint(&self) -> Fingerprint {
        self.local_fingerprint
    }

    #[must_use]
    pub fn ledger(&self) -> &FingerprintLedger {
        &self.ledger
    }
}

impl std::fmt::Debug for TlsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsContext")
            .field("endpoint", &self.endpoint)
            .field("mode", &self.mode)
            .field("local_fingerprint", &self.local_fingerprint)
            .field("ledger", &self.ledger)
            .field("chain_verifier", &self.chain_verifier)
            .finish_non_exhaustive()
    }
}

/// Presents the endpoint's certificate regardless of SNI or CA hints.
#[derive(Debug)]
struct FixedCert(Arc<CertifiedKey>);

impl ResolvesServerCert for FixedCert {
    fn resolve(&self, _client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        Some(self.0.clone())
    }
}

impl ResolvesClientCert for FixedCert {
    fn resolve(
        &self,
        _root_hint_subjects: &[&[u8]],
        _sigschemes: &[SignatureScheme],
    ) -> Option<Arc<CertifiedKey>> {
        Some(self.0.clone())
    }

    fn has_certs(&self) -> bool {
        true
    }
}

/// Errors that can occur while building a TLS context.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error(transparent)]
    Mode(#[from] ModeError),
    #[error(transparent)]
    Provision(#[from] ProvisionError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Anchors(#[from] AnchorError),
    #[error("TLS setup failed: {0}")]
    Tls(rustls::Error),
    #[error("{endpoint} endpoint cannot act in the {role} role")]
    WrongRole { endpoint: Endpoint, role: Role },
}
