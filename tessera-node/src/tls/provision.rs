//! Certificate identity provisioning.
//!
//! Each endpoint owns one certificate/key pair on disk. A missing pair is
//! generated as a self-signed ECDSA P-256 certificate; an existing pair is
//! loaded untouched.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};

use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair, SanType};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tessera_trust::{CertError, Fingerprint};
use zeroize::Zeroizing;

use crate::config::EndpointConfig;
use crate::persist::write_atomic;

/// Parameters for generated certificates.
#[derive(Debug, Clone)]
pub struct CertParams {
    /// Subject common name
    pub common_name: String,
    /// Validity period in days
    pub validity_days: u32,
    pub san_dns: Vec<String>,
    pub san_ips: Vec<IpAddr>,
}

impl Default for CertParams {
    fn default() -> Self {
        Self {
            common_name: "tessera".to_string(),
            validity_days: 365,
            san_dns: vec!["localhost".to_string()],
            san_ips: vec![
                IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(Ipv6Addr::LOCALHOST),
            ],
        }
    }
}

/// The certificate chain and private key an endpoint presents.
pub struct CertificateIdentity {
    /// Leaf first, then configured chain certificates in order.
    pub chain: Vec<CertificateDer<'static>>,
    pub key: PrivateKeyDer<'static>,
    /// Fingerprint of the leaf, as peers will record it.
    pub fingerprint: Fingerprint,
    /// Whether this call generated the pair.
    pub generated: bool,
}

impl std::fmt::Debug for CertificateIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateIdentity")
            .field("fingerprint", &self.fingerprint)
            .field("chain_len", &self.chain.len())
            .field("generated", &self.generated)
            .finish_non_exhaustive()
    }
}

impl CertificateIdentity {
    /// Load the endpoint's pair, generating it first if neither file exists.
    ///
    /// Refuses to touch a half-present pair: if only the certificate or only
    /// the key exists, this fails rather than overwrite what is there.
    pub fn ensure(config: &EndpointConfig) -> Result<Self, ProvisionError> {
        Self::ensure_with(config, &CertParams::default())
    }

    pub fn ensure_with(config: &EndpointConfig, params: &CertParams) -> Result<Self, ProvisionError> {
        let cert_exists = config.cert_path.exists();
        let key_exists = config.key_path.exists();

        let generated = match (cert_exists, key_exists) {
            (true, true) => false,
            (false, false) => {
                generate_pair(&config.cert_path, &config.key_path, params)?;
                tracing::info!(
                    endpoint = %config.endpoint,
                    cert = %config.cert_path.display(),
                    key = %config.key_path.display(),
                    "Generated self-signed certificate"
                );
                true
            }
            (true, false) => {
                return Err(ProvisionError::Incomplete {
                    present: config.cert_path.clone(),
                    missing: config.key_path.clone(),
                })
            }
            (false, true) => {
                return Err(ProvisionError::Incomplete {
                    present: config.key_path.clone(),
                    missing: config.cert_path.clone(),
                })
            }
        };

        let mut chain = load_certs(&config.cert_path)?;
        let fingerprint = Fingerprint::from_leaf(&chain).map_err(|source| ProvisionError::Cert {
            path: config.cert_path.clone(),
            source,
        })?;
        for path in &config.chain_paths {
            chain.extend(load_certs(path)?);
        }

        let key = PrivateKeyDer::from_pem_file(&config.key_path).map_err(|e| {
            ProvisionError::Read {
                path: config.key_path.clone(),
                message: e.to_string(),
            }
        })?;

        tracing::debug!(
            endpoint = %config.endpoint,
            fingerprint = %fingerprint,
            chain_len = chain.len(),
            "Certificate identity loaded"
        );

        Ok(Self {
            chain,
            key,
            fingerprint,
            generated,
        })
    }

    /// The leaf certificate.
    #[must_use]
    pub fn leaf(&self) -> &CertificateDer<'static> {
        &self.chain[0]
    }
}

/// Generate a self-signed certificate and write both PEM files.
///
/// The key is written before the certificate, so an interrupted run leaves
/// at most a key file, which the next start reports instead of reusing.
pub fn generate_pair(
    cert_path: &Path,
    key_path: &Path,
    params: &CertParams,
) -> Result<(), ProvisionError> {
    let key_pair = KeyPair::generate().map_err(|e| ProvisionError::Generation(e.to_string()))?;

    let mut cert_params = CertificateParams::default();
    cert_params.distinguished_name = DistinguishedName::new();
    cert_params
        .distinguished_name
        .push(DnType::CommonName, &params.common_name);

    cert_params.not_before = time::OffsetDateTime::now_utc() - time::Duration::minutes(5);
    cert_params.not_after =
        time::OffsetDateTime::now_utc() + time::Duration::days(i64::from(params.validity_days));

    for dns in &params.san_dns {
        if let Ok(san) = dns.clone().try_into() {
            cert_params.subject_alt_names.push(SanType::DnsName(san));
        }
    }
    for ip in &params.san_ips {
        cert_params.subject_alt_names.push(SanType::IpAddress(*ip));
    }

    let cert = cert_params
        .self_signed(&key_pair)
        .map_err(|e| ProvisionError::Generation(e.to_string()))?;

    let key_pem = Zeroizing::new(key_pair.serialize_pem());
    write_atomic(key_path, key_pem.as_bytes(), true).map_err(|source| ProvisionError::Write {
        path: key_path.to_path_buf(),
        source,
    })?;
    write_atomic(cert_path, cert.pem().as_bytes(), false).map_err(|source| {
        ProvisionError::Write {
            path: cert_path.to_path_buf(),
            source,
        }
    })?;

    Ok(())
}

/// Load every certificate in a PEM file, in file order.
pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, ProvisionError> {
    let read_err = |e: rustls::pki_types::pem::Error| ProvisionError::Read {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let certs = CertificateDer::pem_file_iter(path)
        .map_err(read_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(read_err)?;

    if certs.is_empty() {
        return Err(ProvisionError::NoCertificate(path.to_path_buf()));
    }
    Ok(certs)
}

/// Errors that can occur while provisioning an identity.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("{present} exists but {missing} does not; restore or remove it before starting")]
    Incomplete { present: PathBuf, missing: PathBuf },
    #[error("failed to generate certificate: {0}")]
    Generation(String),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read {path}: {message}")]
    Read { path: PathBuf, message: String },
    #[error("no certificate found in {0}")]
    NoCertificate(PathBuf),
    #[error("invalid certificate in {path}: {source}")]
    Cert { path: PathBuf, source: CertError },
}
