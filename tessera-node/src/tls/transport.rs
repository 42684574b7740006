//! Gated TLS accept and connect over tokio.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::ServerName;
use tessera_trust::{HostIdentity, HostIdentityError};
use tokio::net::TcpStream;
use tokio_rustls::{client, server, TlsAcceptor, TlsConnector};

use crate::tls::context::{ContextError, TlsContext};

/// Handshake timeout. A handshake that times out never reaches the gate.
pub const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause after a failed `accept` before trying again.
pub const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Call `accept` until it succeeds, sleeping [`ACCEPT_BACKOFF`] after each
/// failure.
///
/// Errors such as `EMFILE` persist until a descriptor frees up, so retrying
/// at once would only spin.
pub async fn accept_with_backoff<F, Fut, T>(context: &TlsContext, mut accept: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<T>>,
{
    loop {
        match accept().await {
            Ok(conn) => return conn,
            Err(e) => {
                tracing::warn!(endpoint = %context.endpoint(), error = %e, "Accept failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

/// Run the server side of a handshake on an accepted TCP stream.
///
/// The peer's host identity is its IP address.
pub async fn accept_gated(
    context: &Arc<TlsContext>,
    stream: TcpStream,
) -> Result<server::TlsStream<TcpStream>, TransportError> {
    let peer = stream.peer_addr()?;
    let host = HostIdentity::from_peer_addr(peer);
    let acceptor = TlsAcceptor::from(context.server_config_for(host)?);

    tokio::time::timeout(TLS_HANDSHAKE_TIMEOUT, acceptor.accept(stream))
        .await
        .map_err(|_| TransportError::Timeout)?
        .map_err(TransportError::Io)
}

/// Dial `host:port` and run the client side of a handshake.
///
/// The peer's host identity is the dialed `host:port`.
pub async fn connect_gated(
    context: &Arc<TlsContext>,
    host: &str,
    port: u16,
) -> Result<client::TlsStream<TcpStream>, TransportError> {
    let identity = HostIdentity::for_remote_server(host, port)?;
    let bare_host = host.trim_start_matches('[').trim_end_matches(']');
    let server_name = ServerName::try_from(bare_host.to_string())
        .map_err(|_| TransportError::InvalidServerName(bare_host.to_string()))?;
    let connector = TlsConnector::from(context.client_config_for(identity)?);

    let tcp = tokio::time::timeout(TLS_HANDSHAKE_TIMEOUT, TcpStream::connect((bare_host, port)))
        .await
        .map_err(|_| TransportError::Timeout)??;

    tokio::time::timeout(TLS_HANDSHAKE_TIMEOUT, connector.connect(server_name, tcp))
        .await
        .map_err(|_| TransportError::Timeout)?
        .map_err(TransportError::Io)
}

/// Errors from gated accept/connect.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TLS handshake timed out")]
    Timeout,
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    Host(#[from] HostIdentityError),
    #[error("invalid server name: {0}")]
    InvalidServerName(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Endpoint, EndpointConfig};

    #[tokio::test]
    async fn test_accept_errors_back_off() {
        let dir = tempfile::tempdir().unwrap();
        let context = TlsContext::build(&EndpointConfig {
            endpoint: Endpoint::NodeServer,
            trust_mode: "tofu".to_string(),
            cert_path: dir.path().join("cert.pem"),
            key_path: dir.path().join("key.pem"),
            chain_paths: Vec::new(),
            ledger_path: dir.path().join("known"),
            trust_anchor_dir: None,
        })
        .unwrap();

        let mut failures = 2;
        let started = tokio::time::Instant::now();
        let accepted = accept_with_backoff(&context, || {
            let result = if failures > 0 {
                failures -= 1;
                Err(std::io::Error::from_raw_os_error(24))
            } else {
                Ok(7)
            };
            async move { result }
        })
        .await;

        assert_eq!(accepted, 7);
        assert_eq!(failures, 0);
        assert!(started.elapsed() >= ACCEPT_BACKOFF * 2);
    }
}
