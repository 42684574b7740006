//! Trust-mode identifiers.

/// Which side of the handshake an endpoint plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Accepts inbound peers and verifies their client certificates.
    Server,
    /// Initiates outbound connections and verifies server certificates.
    Client,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Role::Server => "server",
            Role::Client => "client",
        })
    }
}

/// Canonical trust policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrustMode {
    Whitelist,
    Ca,
    CaOrWhitelist,
    Tofu,
    CaOrTofu,
    NoValidation,
    RecordAll,
    CaOrRecordAll,
}

/// Identifier table: (identifier, mode, accepted for client role).
///
/// `insecure-tofa` and `insecure-ca-or-tofa` are input aliases and only
/// exist for server-role endpoints.
const IDENTIFIERS: &[(&str, TrustMode, bool)] = &[
    ("whitelist", TrustMode::Whitelist, true),
    ("ca", TrustMode::Ca, true),
    ("ca-or-whitelist", TrustMode::CaOrWhitelist, true),
    ("tofu", TrustMode::Tofu, true),
    ("insecure-tofa", TrustMode::Tofu, false),
    ("ca-or-tofu", TrustMode::CaOrTofu, true),
    ("insecure-ca-or-tofa", TrustMode::CaOrTofu, false),
    ("insecure-no-validation", TrustMode::NoValidation, true),
    ("insecure-record", TrustMode::RecordAll, true),
    ("insecure-ca-or-record", TrustMode::CaOrRecordAll, true),
];

impl TrustMode {
    /// Parse a configured identifier for an endpoint of the given role.
    ///
    /// Matching is case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns `ModeError::Unknown` for unrecognized identifiers and
    /// `ModeError::NotAllowedForRole` for aliases the role does not accept.
    pub fn parse(identifier: &str, role: Role) -> Result<Self, ModeError> {
        let wanted = identifier.trim().to_ascii_lowercase();
        let (_, mode, client_ok) = IDENTIFIERS
            .iter()
            .find(|(name, _, _)| *name == wanted)
            .ok_or_else(|| ModeError::Unknown {
                identifier: identifier.to_string(),
                allowed: Self::allowed_identifiers(role).join(", "),
            })?;

        if role == Role::Client && !client_ok {
            return Err(ModeError::NotAllowedForRole {
                identifier: identifier.to_string(),
                role,
                allowed: Self::allowed_identifiers(role).join(", "),
            });
        }
        Ok(*mode)
    }

    /// Identifiers accepted for a role, in documentation order.
    #[must_use]
    pub fn allowed_identifiers(role: Role) -> Vec<&'static str> {
        IDENTIFIERS
            .iter()
            .filter(|(_, _, client_ok)| role == Role::Server || *client_ok)
            .map(|(name, _, _)| *name)
            .collect()
    }

    /// Canonical identifier.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TrustMode::Whitelist => "whitelist",
            TrustMode::Ca => "ca",
            TrustMode::CaOrWhitelist => "ca-or-whitelist",
            TrustMode::Tofu => "tofu",
            TrustMode::CaOrTofu => "ca-or-tofu",
            TrustMode::NoValidation => "insecure-no-validation",
            TrustMode::RecordAll => "insecure-record",
            TrustMode::CaOrRecordAll => "insecure-ca-or-record",
        }
    }

    /// Whether the mode's decision depends on CA chain validity.
    ///
    /// Modes that return `false` never have their chain checked against
    /// trust anchors.
    #[must_use]
    pub fn consults_ca(self) -> bool {
        matches!(
            self,
            TrustMode::Ca | TrustMode::CaOrWhitelist | TrustMode::CaOrTofu | TrustMode::CaOrRecordAll
        )
    }
}

impl std::fmt::Display for TrustMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from parsing a trust-mode identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ModeError {
    #[error("unknown trust mode {identifier:?} (expected one of: {allowed})")]
    Unknown { identifier: String, allowed: String },

    #[error("trust mode {identifier:?} is not available for {role} endpoints (expected one of: {allowed})")]
    NotAllowedForRole {
        identifier: String,
        role: Role,
        allowed: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_identifiers_roundtrip() {
        for mode in [
            TrustMode::Whitelist,
            TrustMode::Ca,
            TrustMode::CaOrWhitelist,
            TrustMode::Tofu,
            TrustMode::CaOrTofu,
            TrustMode::NoValidation,
            TrustMode::RecordAll,
            TrustMode::CaOrRecordAll,
        ] {
            assert_eq!(TrustMode::parse(mode.as_str(), Role::Server), Ok(mode));
            assert_eq!(TrustMode::parse(mode.as_str(), Role::Client), Ok(mode));
        }
    }

    #[test]
    fn test_aliases_map_to_canonical_modes() {
        assert_eq!(TrustMode::parse("insecure-tofa", Role::Server), Ok(TrustMode::Tofu));
        assert_eq!(
            TrustMode::parse("insecure-ca-or-tofa", Role::Server),
            Ok(TrustMode::CaOrTofu)
        );
    }

    #[test]
    fn test_aliases_rejected_for_client_role() {
        let err = TrustMode::parse("insecure-tofa", Role::Client).unwrap_err();
        assert!(matches!(err, ModeError::NotAllowedForRole { .. }));
        assert!(!err.to_string().contains("insecure-tofa,"));
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(TrustMode::parse("CA-or-TOFU", Role::Client), Ok(TrustMode::CaOrTofu));
    }

    #[test]
    fn test_unknown_lists_allowed() {
        let err = TrustMode::parse("trust-everyone", Role::Server).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("trust-everyone"));
        assert!(message.contains("insecure-ca-or-record"));
    }

    #[test]
    fn test_allowed_identifier_counts() {
        assert_eq!(TrustMode::allowed_identifiers(Role::Server).len(), 10);
        assert_eq!(TrustMode::allowed_identifiers(Role::Client).len(), 8);
    }
}
