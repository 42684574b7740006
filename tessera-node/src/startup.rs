//! Startup wiring for every enabled endpoint.

use std::sync::Arc;

use crate::config::{Endpoint, EndpointConfig};
use crate::tls::{CertificateIdentity, ContextError, ProvisionError, TlsContext};

/// Built contexts, one per enabled endpoint.
#[derive(Debug, Default)]
pub struct NodeContexts {
    pub node_server: Option<Arc<TlsContext>>,
    pub node_client: Option<Arc<TlsContext>>,
    pub client_connection: Option<Arc<TlsContext>>,
}

impl NodeContexts {
    /// Build every endpoint, collecting all failures before giving up.
    pub fn build(endpoints: &[EndpointConfig]) -> Result<Self, StartupError> {
        let mut contexts = Self::default();
        let mut failures = Vec::new();

        for config in endpoints {
            match TlsContext::build(config) {
                Ok(context) => {
                    let context = Some(Arc::new(context));
                    match config.endpoint {
                        Endpoint::NodeServer => contexts.node_server = context,
                        Endpoint::NodeClient => contexts.node_client = context,
                        Endpoint::ClientConnectionServer => contexts.client_connection = context,
                    }
                }
                Err(e) => failures.push((config.endpoint, e)),
            }
        }

        if failures.is_empty() {
            Ok(contexts)
        } else {
            Err(StartupError::Contexts(failures))
        }
    }
}

/// Provision identities for every endpoint without building contexts.
pub fn provision_all(
    endpoints: &[EndpointConfig],
) -> Result<Vec<(Endpoint, CertificateIdentity)>, StartupError> {
    let mut identities = Vec::new();
    let mut failures = Vec::new();

    for config in endpoints {
        match CertificateIdentity::ensure(config) {
            Ok(identity) => identities.push((config.endpoint, identity)),
            Err(e) => failures.push((config.endpoint, e)),
        }
    }

    if failures.is_empty() {
        Ok(identities)
    } else {
        Err(StartupError::Provision(failures))
    }
}

/// Aggregated startup failure across endpoints.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("TLS setup failed:{}", list(.0))]
    Contexts(Vec<(Endpoint, ContextError)>),
    #[error("certificate provisioning failed:{}", list(.0))]
    Provision(Vec<(Endpoint, ProvisionError)>),
}

fn list<E: std::fmt::Display>(failures: &[(Endpoint, E)]) -> String {
    failures
        .iter()
        .map(|(endpoint, e)| format!("\n  {endpoint}: {e}"))
        .collect()
}
