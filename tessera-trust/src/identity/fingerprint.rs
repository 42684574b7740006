//! Public-key fingerprints.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::KeyError;
use crate::cert::{extract_spki_from_cert, CertError};

/// A SHA-256 fingerprint of a certificate's SubjectPublicKeyInfo.
///
/// Format: 64 lowercase hex characters.
///
/// Fingerprints are taken over the public key rather than the certificate
/// DER, so a certificate re-issued for the same key keeps its identity.
///
/// # Security
///
/// Comparisons use constant-time equality to prevent timing attacks.
/// Hash is derived: the digest is public, only equality is timing-sensitive.
#[derive(Clone, Copy, Eq, Hash)]
#[allow(clippy::derived_hash_with_manual_eq)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Length of the hex form.
    pub const HEX_LEN: usize = 64;

    /// Fingerprint of a DER-encoded SubjectPublicKeyInfo.
    #[must_use]
    pub fn from_spki_der(spki_der: &[u8]) -> Self {
        Self(Sha256::digest(spki_der).into())
    }

    /// Fingerprint of the public key inside a DER-encoded certificate.
    ///
    /// # Errors
    ///
    /// Returns `CertError` if the certificate cannot be parsed.
    pub fn from_cert_der(cert_der: &[u8]) -> Result<Self, CertError> {
        let spki = extract_spki_from_cert(cert_der)?;
        Ok(Self::from_spki_der(&spki))
    }

    /// Fingerprint of the leaf certificate of a presented chain.
    ///
    /// # Errors
    ///
    /// Returns `CertError::Empty` for an empty chain.
    pub fn from_leaf<C: AsRef<[u8]>>(chain: &[C]) -> Result<Self, CertError> {
        let leaf = chain.first().ok_or(CertError::Empty)?;
        Self::from_cert_der(leaf.as_ref())
    }

    /// Create a fingerprint from raw hash bytes.
    #[must_use]
    pub fn from_hash_bytes(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    /// Parse the lowercase hex form.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::InvalidFingerprint` unless the input is exactly
    /// 64 lowercase hex characters.
    pub fn parse(s: &str) -> Result<Self, KeyError> {
        if s.len() != Self::HEX_LEN
            || !s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return Err(KeyError::InvalidFingerprint);
        }
        let mut hash = [0u8; 32];
        hex::decode_to_slice(s, &mut hash).map_err(|_| KeyError::InvalidFingerprint)?;
        Ok(Self(hash))
    }

    /// Get the raw hash bytes.
    #[must_use]
    pub fn hash_bytes(&self) -> [u8; 32] {
        self.0
    }

    /// Lowercase hex form, as stored in the ledger.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl PartialEq for Fingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl std::str::FromStr for Fingerprint {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
