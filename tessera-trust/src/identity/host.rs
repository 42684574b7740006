//! Remote host identities.

use std::net::{IpAddr, SocketAddr};

/// Errors from constructing or parsing a [`HostIdentity`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum HostIdentityError {
    #[error("host identity is empty")]
    Empty,

    #[error("host identity {0:?} contains whitespace or '#'")]
    InvalidCharacter(String),

    #[error("host identity {0:?} is not an address, host or host:port")]
    Malformed(String),
}

/// Canonical network identity of a remote peer.
///
/// Always derived from the authenticated connection's network address,
/// never from certificate subject fields, so a self-signed certificate
/// cannot claim someone else's ledger entry.
///
/// - Inbound peers (server role): the peer's IP address. The source port
///   is ephemeral and is dropped; IPv4-mapped IPv6 is collapsed to IPv4.
/// - Outbound peers (client role): `host:port` as dialed, host lowercased.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostIdentity(String);

impl HostIdentity {
    /// Identity of an inbound peer from its socket address.
    #[must_use]
    pub fn from_peer_addr(addr: SocketAddr) -> Self {
        Self::from_ip(addr.ip())
    }

    /// Identity of an inbound peer from its IP address.
    #[must_use]
    pub fn from_ip(ip: IpAddr) -> Self {
        Self(canonical_ip(ip).to_string())
    }

    /// Identity of an outbound peer from the dialed host and port.
    ///
    /// # Errors
    ///
    /// Returns an error if `host` is empty or contains characters that
    /// cannot be stored in a ledger line.
    pub fn for_remote_server(host: &str, port: u16) -> Result<Self, HostIdentityError> {
        let host = host.trim_start_matches('[').trim_end_matches(']');
        validate(host)?;
        let host = match host.parse::<IpAddr>().map(canonical_ip) {
            Ok(IpAddr::V6(v6)) => format!("[{v6}]"),
            Ok(v4) => v4.to_string(),
            Err(_) => host.to_ascii_lowercase(),
        };
        Ok(Self(format!("{host}:{port}")))
    }

    /// Parse an identity as written in a ledger line.
    ///
    /// Accepts `ip`, `host`, `host:port` and `[ip]:port`, canonicalised the
    /// same way as [`HostIdentity::from_ip`] and
    /// [`HostIdentity::for_remote_server`], so hand-edited entries match
    /// the identities connections produce.
    ///
    /// # Errors
    ///
    /// Returns an error if `s` is empty, contains whitespace or `#`, or is
    /// none of the accepted forms.
    pub fn parse(s: &str) -> Result<Self, HostIdentityError> {
        validate(s)?;
        if let Ok(ip) = s.parse::<IpAddr>() {
            return Ok(Self::from_ip(ip));
        }

        let malformed = || HostIdentityError::Malformed(s.to_string());
        if let Some(rest) = s.strip_prefix('[') {
            let (ip, port) = rest.split_once("]:").ok_or_else(malformed)?;
            if ip.parse::<IpAddr>().is_err() {
                return Err(malformed());
            }
            let port = port.parse::<u16>().map_err(|_| malformed())?;
            return Self::for_remote_server(ip, port);
        }

        match s.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') => {
                let port = port.parse::<u16>().map_err(|_| malformed())?;
                Self::for_remote_server(host, port)
            }
            Some(_) => Err(malformed()),
            None => Ok(Self(s.to_ascii_lowercase())),
        }
    }

    /// Host part without any port, usable as a TLS server name.
    #[must_use]
    pub fn host(&self) -> &str {
        if let Some(rest) = self.0.strip_prefix('[') {
            return rest.split(']').next().unwrap_or(rest);
        }
        match self.0.rsplit_once(':') {
            Some((host, port)) if port.parse::<u16>().is_ok() && !host.contains(':') => host,
            _ => &self.0,
        }
    }

    /// Get the identity as a string reference.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn canonical_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        },
        v4 => v4,
    }
}

fn validate(s: &str) -> Result<(), HostIdentityError> {
    if s.is_empty() {
        return Err(HostIdentityError::Empty);
    }
    if s.chars().any(|c| c.is_whitespace() || c == '#') {
        return Err(HostIdentityError::InvalidCharacter(s.to_string()));
    }
    Ok(())
}

impl std::fmt::Display for HostIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Debug for HostIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HostIdentity({})", self.0)
    }
}
