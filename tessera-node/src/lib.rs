//! Tessera node: TLS trust establishment for node and client surfaces.
//!
//! Each enabled endpoint gets a [`TlsContext`](tls::TlsContext) at startup.
//! Every handshake then passes through the connection gate, which checks
//! the peer's leaf fingerprint against the endpoint's
//! [`FingerprintLedger`](ledger::FingerprintLedger) under the configured
//! trust mode.

pub mod config;
pub mod ledger;
pub mod logging;
pub mod persist;
pub mod startup;
pub mod tls;

pub use config::{Config, ConfigError, Endpoint, EndpointConfig, TlsStatus};
pub use ledger::{FingerprintLedger, LedgerError, UpdateOutcome, UpdatePolicy};
pub use startup::{provision_all, NodeContexts, StartupError};
