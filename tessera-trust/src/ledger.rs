//! Ledger records and their on-disk line format.
//!
//! One record per line:
//!
//! ```text
//! <host-identity> <64 lowercase hex fingerprint> [ca|self-signed] [free text...]
//! ```
//!
//! Blank lines and lines starting with `#` carry no record. A missing
//! provenance token means the record was self-signed. Anything after the
//! provenance token is a comment and is not preserved.

use crate::identity::{Fingerprint, HostIdentity, HostIdentityError, KeyError};

/// How a recorded fingerprint came to be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provenance {
    /// The certificate chained to a configured trust anchor.
    CaVerified,
    /// The certificate was recorded without CA validation.
    SelfSigned,
}

impl Provenance {
    /// Token written in the ledger file.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Provenance::CaVerified => "ca",
            Provenance::SelfSigned => "self-signed",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "ca" => Some(Provenance::CaVerified),
            "self-signed" => Some(Provenance::SelfSigned),
            _ => None,
        }
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The current trusted fingerprint for one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRecord {
    pub host: HostIdentity,
    pub fingerprint: Fingerprint,
    pub provenance: Provenance,
}

impl LedgerRecord {
    #[must_use]
    pub fn new(host: HostIdentity, fingerprint: Fingerprint, provenance: Provenance) -> Self {
        Self {
            host,
            fingerprint,
            provenance,
        }
    }

    /// Encode as a ledger line (without trailing newline).
    #[must_use]
    pub fn to_line(&self) -> String {
        format!("{} {} {}", self.host, self.fingerprint, self.provenance)
    }

    /// Decode one ledger line.
    ///
    /// Returns `Ok(None)` for blank and comment lines.
    ///
    /// # Errors
    ///
    /// Returns `LineError` if the line is neither empty, a comment, nor a
    /// well-formed record.
    pub fn parse_line(line: &str) -> Result<Option<Self>, LineError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let mut tokens = line.split_whitespace();
        let host = tokens.next().ok_or(LineError::MissingFingerprint)?;
        let host = HostIdentity::parse(host)?;
        let fingerprint = tokens.next().ok_or(LineError::MissingFingerprint)?;
        let fingerprint = Fingerprint::parse(fingerprint)?;
        let provenance = tokens
            .next()
            .and_then(Provenance::from_token)
            .unwrap_or(Provenance::SelfSigned);

        Ok(Some(Self::new(host, fingerprint, provenance)))
    }
}

/// Why a ledger line could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum LineError {
    #[error("missing fingerprint")]
    MissingFingerprint,

    #[error("bad host identity: {0}")]
    Host(#[from] HostIdentityError),

    #[error("bad fingerprint: {0}")]
    Fingerprint(#[from] KeyError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(byte: u8) -> Fingerprint {
        Fingerprint::from_hash_bytes([byte; 32])
    }

    #[test]
    fn test_line_roundtrip() {
        let record = LedgerRecord::new(
            HostIdentity::parse("node-a.example:8080").unwrap(),
            fp(0xab),
            Provenance::CaVerified,
        );

        let line = record.to_line();
        assert_eq!(line, format!("node-a.example:8080 {} ca", "ab".repeat(32)));
        assert_eq!(LedgerRecord::parse_line(&line).unwrap(), Some(record));
    }

    #[test]
    fn test_missing_provenance_is_self_signed() {
        let line = format!("10.0.0.7 {}", "cd".repeat(32));
        let record = LedgerRecord::parse_line(&line).unwrap().unwrap();
        assert_eq!(record.provenance, Provenance::SelfSigned);
    }

    #[test]
    fn test_free_text_comment_ignored() {
        let line = format!("10.0.0.7 {} self-signed added by ops 2024-01-02", "cd".repeat(32));
        let record = LedgerRecord::parse_line(&line).unwrap().unwrap();
        assert_eq!(record.fingerprint, fp(0xcd));

        let line = format!("10.0.0.7 {} alice's laptop", "cd".repeat(32));
        let record = LedgerRecord::parse_line(&line).unwrap().unwrap();
        assert_eq!(record.provenance, Provenance::SelfSigned);
    }

    #[test]
    fn test_blank_and_comment_lines() {
        assert_eq!(LedgerRecord::parse_line("").unwrap(), None);
        assert_eq!(LedgerRecord::parse_line("   ").unwrap(), None);
        assert_eq!(LedgerRecord::parse_line("# known clients").unwrap(), None);
    }

    #[test]
    fn test_hand_written_hosts_canonicalised() {
        let line = format!("::ffff:10.0.0.7 {}", "cd".repeat(32));
        let record = LedgerRecord::parse_line(&line).unwrap().unwrap();
        assert_eq!(record.host.as_str(), "10.0.0.7");

        let line = format!("Node-B.example:8080 {} ca", "cd".repeat(32));
        let record = LedgerRecord::parse_line(&line).unwrap().unwrap();
        assert_eq!(record.host.as_str(), "node-b.example:8080");

        assert!(matches!(
            LedgerRecord::parse_line(&format!("[node-b]:8080 {}", "cd".repeat(32))),
            Err(LineError::Host(HostIdentityError::Malformed(_)))
        ));
    }

    #[test]
    fn test_malformed_lines() {
        assert_eq!(
            LedgerRecord::parse_line("10.0.0.7"),
            Err(LineError::MissingFingerprint)
        );
        assert!(matches!(
            LedgerRecord::parse_line("10.0.0.7 not-a-fingerprint"),
            Err(LineError::Fingerprint(_))
        ));
        assert!(matches!(
            LedgerRecord::parse_line(&format!("10.0.0.7 {}", "ab".repeat(31))),
            Err(LineError::Fingerprint(_))
        ));
    }
}
