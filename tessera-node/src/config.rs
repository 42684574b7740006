//! Node configuration.
//!
//! Loaded once at startup from a TOML file. Keys keep the flat lowercase
//! names operators already use (`tlsservertrust`, `tlsknownclients`, ...).
//! Relative paths are resolved against `workdir`.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tessera_trust::Role;

/// Environment variable overriding the CA trust-anchor directory.
pub const TRUST_ANCHOR_ENV: &str = "SYSTEM_CERTIFICATE_PATH";

/// Whether mutually authenticated TLS is used on a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsStatus {
    Off,
    Strict,
}

/// The three independently configured TLS endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Public node API, accepting other nodes.
    NodeServer,
    /// Outbound connections to other nodes' public APIs.
    NodeClient,
    /// Internal API for the paired client application.
    ClientConnectionServer,
}

impl Endpoint {
    #[must_use]
    pub fn role(self) -> Role {
        match self {
            Endpoint::NodeServer | Endpoint::ClientConnectionServer => Role::Server,
            Endpoint::NodeClient => Role::Client,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Endpoint::NodeServer => "node-server",
            Endpoint::NodeClient => "node-client",
            Endpoint::ClientConnectionServer => "client-connection-server",
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Settings for one TLS endpoint.
///
/// Endpoints never share certificate files or ledgers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub endpoint: Endpoint,
    /// Trust-mode identifier as configured; parsed by the context factory.
    pub trust_mode: String,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    /// Intermediate certificates, presented after the leaf in this order.
    pub chain_paths: Vec<PathBuf>,
    pub ledger_path: PathBuf,
    /// Directory of PEM trust anchors replacing the platform store.
    pub trust_anchor_dir: Option<PathBuf>,
}

impl EndpointConfig {
    #[must_use]
    pub fn role(&self) -> Role {
        self.endpoint.role()
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub workdir: PathBuf,
    pub nodeurl: Option<String>,
    pub nodeport: u16,
    pub nodenetworkinterface: String,
    pub clientport: u16,
    pub clientnetworkinterface: String,
    pub verbosity: u8,

    pub tls: TlsStatus,
    #[serde(rename = "tlsservercert")]
    pub tls_server_cert: PathBuf,
    #[serde(rename = "tlsserverkey")]
    pub tls_server_key: PathBuf,
    #[serde(rename = "tlsserverchain")]
    pub tls_server_chain: Vec<PathBuf>,
    #[serde(rename = "tlsservertrust")]
    pub tls_server_trust: String,
    #[serde(rename = "tlsknownclients")]
    pub tls_known_clients: PathBuf,
    #[serde(rename = "tlsclientcert")]
    pub tls_client_cert: PathBuf,
    #[serde(rename = "tlsclientkey")]
    pub tls_client_key: PathBuf,
    #[serde(rename = "tlsclientchain")]
    pub tls_client_chain: Vec<PathBuf>,
    #[serde(rename = "tlsclienttrust")]
    pub tls_client_trust: String,
    #[serde(rename = "tlsknownservers")]
    pub tls_known_servers: PathBuf,

    #[serde(rename = "clientconnectiontls")]
    pub client_connection_tls: TlsStatus,
    #[serde(rename = "clientconnectiontlsservercert")]
    pub client_connection_tls_server_cert: PathBuf,
    #[serde(rename = "clientconnectiontlsserverkey")]
    pub client_connection_tls_server_key: PathBuf,
    #[serde(rename = "clientconnectiontlsserverchain")]
    pub client_connection_tls_server_chain: Vec<PathBuf>,
    #[serde(rename = "clientconnectiontlsservertrust")]
    pub client_connection_tls_server_trust: String,
    #[serde(rename = "clientconnectiontlsknownclients")]
    pub client_connection_tls_known_clients: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from("."),
            nodeurl: None,
            nodeport: 8080,
            nodenetworkinterface: "127.0.0.1".to_string(),
            clientport: 8888,
            clientnetworkinterface: "127.0.0.1".to_string(),
            verbosity: 2,

            tls: TlsStatus::Off,
            tls_server_cert: PathBuf::from("tls-server-cert.pem"),
            tls_server_key: PathBuf::from("tls-server-key.pem"),
            tls_server_chain: Vec::new(),
            tls_server_trust: "tofu".to_string(),
            tls_known_clients: PathBuf::from("tls-known-clients"),
            tls_client_cert: PathBuf::from("tls-client-cert.pem"),
            tls_client_key: PathBuf::from("tls-client-key.pem"),
            tls_client_chain: Vec::new(),
            tls_client_trust: "ca-or-tofu".to_string(),
            tls_known_servers: PathBuf::from("tls-known-servers"),

            client_connection_tls: TlsStatus::Off,
            client_connection_tls_server_cert: PathBuf::from(
                "client-connection-tls-server-cert.pem",
            ),
            client_connection_tls_server_key: PathBuf::from("client-connection-tls-server-key.pem"),
            client_connection_tls_server_chain: Vec::new(),
            client_connection_tls_server_trust: "tofu".to_string(),
            client_connection_tls_known_clients: PathBuf::from(
                "client-connection-tls-known-clients",
            ),
        }
    }
}

impl Config {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: Some(path.to_path_buf()),
                message,
            },
            other => other,
        })?;
        Ok(config)
    }

    /// Parse and validate configuration text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: None,
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();
        if self.nodeport != 0 && self.nodeport == self.clientport {
            problems.push("'nodeport' must be different to 'clientport'".to_string());
        }
        if self.verbosity > 4 {
            problems.push(format!("'verbosity' must be between 0 and 4, got {}", self.verbosity));
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }

    /// Resolve a configured path against `workdir`.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workdir.join(path)
        }
    }

    /// Settings for one endpoint, whether or not it is enabled.
    #[must_use]
    pub fn endpoint(&self, endpoint: Endpoint, trust_anchor_dir: Option<PathBuf>) -> EndpointConfig {
        let (trust, cert, key, chain, ledger) = match endpoint {
            Endpoint::NodeServer => (
                &self.tls_server_trust,
                &self.tls_server_cert,
                &self.tls_server_key,
                &self.tls_server_chain,
                &self.tls_known_clients,
            ),
            Endpoint::NodeClient => (
                &self.tls_client_trust,
                &self.tls_client_cert,
                &self.tls_client_key,
                &self.tls_client_chain,
                &self.tls_known_servers,
            ),
            Endpoint::ClientConnectionServer => (
                &self.client_connection_tls_server_trust,
                &self.client_connection_tls_server_cert,
                &self.client_connection_tls_server_key,
                &self.client_connection_tls_server_chain,
                &self.client_connection_tls_known_clients,
            ),
        };

        EndpointConfig {
            endpoint,
            trust_mode: trust.clone(),
            cert_path: self.resolve(cert),
            key_path: self.resolve(key),
            chain_paths: chain.iter().map(|p| self.resolve(p)).collect(),
            ledger_path: self.resolve(ledger),
            trust_anchor_dir,
        }
    }

    /// Settings for every endpoint enabled by `tls` / `clientconnectiontls`.
    #[must_use]
    pub fn enabled_endpoints(&self, trust_anchor_dir: Option<PathBuf>) -> Vec<EndpointConfig> {
        let mut endpoints = Vec::new();
        if self.tls == TlsStatus::Strict {
            endpoints.push(self.endpoint(Endpoint::NodeServer, trust_anchor_dir.clone()));
            endpoints.push(self.endpoint(Endpoint::NodeClient, trust_anchor_dir.clone()));
        }
        if self.client_connection_tls == TlsStatus::Strict {
            endpoints.push(self.endpoint(Endpoint::ClientConnectionServer, trust_anchor_dir));
        }
        endpoints
    }
}

/// Trust-anchor override from [`TRUST_ANCHOR_ENV`], if set and non-empty.
#[must_use]
pub fn trust_anchor_dir_from_env() -> Option<PathBuf> {
    std::env::var_os(TRUST_ANCHOR_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config{}: {message}", .path.as_ref().map(|p| format!(" file {}", p.display())).unwrap_or_default())]
    Parse {
        path: Option<PathBuf>,
        message: String,
    },
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}
