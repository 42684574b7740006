//! TLS plumbing for node endpoints.
//!
//! Provides certificate provisioning, CA trust anchors, the per-endpoint
//! context factory, the connection gate and gated accept/connect helpers.

mod anchors;
mod context;
mod gate;
mod provision;
mod transport;
mod verifier;

pub use anchors::{load_trust_anchors, AnchorError, ChainVerifier, WebPkiChainVerifier};
pub use context::{ContextError, TlsContext};
pub use provision::{generate_pair, load_certs, CertParams, CertificateIdentity, ProvisionError};
pub use transport::{
    accept_gated, accept_with_backoff, connect_gated, TransportError, ACCEPT_BACKOFF,
    TLS_HANDSHAKE_TIMEOUT,
};
pub use verifier::{GatedClientVerifier, GatedServerVerifier};
