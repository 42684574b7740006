//! Certificate utilities for X.509 parsing.
//!
//! # Security
//!
//! - Input is limited to 16KB to prevent DoS
//! - The x509_parser library handles ASN.1 parsing safely

use thiserror::Error;
use x509_parser::prelude::*;

/// Maximum certificate size (16KB is generous for a single cert)
pub const MAX_CERT_SIZE: usize = 16 * 1024;

/// Errors that can occur during certificate parsing.
#[derive(Debug, Error)]
pub enum CertError {
    #[error("certificate too large: {0} bytes (max {MAX_CERT_SIZE})")]
    TooLarge(usize),

    #[error("failed to parse X.509 certificate: {0}")]
    ParseError(String),

    #[error("peer presented no certificate")]
    Empty,
}

/// Extract the DER-encoded SubjectPublicKeyInfo from a DER-encoded X.509 certificate.
///
/// The full SPKI (algorithm identifier plus key bits) is returned so that
/// two keys of different algorithms can never collide on the same bytes.
///
/// # Errors
///
/// Returns `CertError::TooLarge` if certificate exceeds 16KB.
/// Returns `CertError::ParseError` if the certificate is malformed.
pub fn extract_spki_from_cert(cert_der: &[u8]) -> Result<Vec<u8>, CertError> {
    if cert_der.len() > MAX_CERT_SIZE {
        return Err(CertError::TooLarge(cert_der.len()));
    }

    let (_, cert) = X509Certificate::from_der(cert_der)
        .map_err(|e| CertError::ParseError(format!("{:?}", e)))?;

    Ok(cert.public_key().raw.to_vec())
}

/// Subject common name of a certificate, for log context only.
///
/// Never use the result as an identity: the subject of a self-signed
/// certificate is chosen by whoever minted it.
pub fn subject_common_name(cert_der: &[u8]) -> Option<String> {
    let (_, cert) = X509Certificate::from_der(cert_der).ok()?;
    let cn = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(str::to_string);
    cn
}
