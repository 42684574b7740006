//! rustls verifier adapters that route certificate checks through the gate.
//!
//! One verifier is built per connection, bound to the peer's host identity,
//! so the gate sees who is connecting before any application data flows.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::{CertificateError, DigitallySignedStruct, DistinguishedName, SignatureScheme};
use tessera_trust::{HostIdentity, RejectReason, TrustDecision};

use crate::tls::context::TlsContext;

fn presented_chain<'a>(
    end_entity: &CertificateDer<'a>,
    intermediates: &[CertificateDer<'a>],
) -> Vec<CertificateDer<'a>> {
    let mut chain = Vec::with_capacity(1 + intermediates.len());
    chain.push(end_entity.clone());
    chain.extend(intermediates.iter().cloned());
    chain
}

fn to_rustls(decision: TrustDecision) -> Result<(), rustls::Error> {
    match decision.reject_reason() {
        None => Ok(()),
        Some(RejectReason::BadCertificate) => {
            Err(rustls::Error::InvalidCertificate(CertificateError::BadEncoding))
        }
        Some(_) => Err(rustls::Error::InvalidCertificate(
            CertificateError::ApplicationVerificationFailure,
        )),
    }
}

/// Server-role verifier for client certificates.
#[derive(Debug)]
pub struct GatedClientVerifier {
    context: Arc<TlsContext>,
    peer: HostIdentity,
}

impl GatedClientVerifier {
    pub fn new(context: Arc<TlsContext>, peer: HostIdentity) -> Self {
        Self { context, peer }
    }
}

impl ClientCertVerifier for GatedClientVerifier {
    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        now: UnixTime,
    ) -> Result<ClientCertVerified, rustls::Error> {
        let chain = presented_chain(end_entity, intermediates);
        to_rustls(self.context.decide_at(&chain, &self.peer, now))?;
        Ok(ClientCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.context.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.context.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.context
            .provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Client-role verifier for server certificates.
///
/// The gate keys on the dialed `host:port`, not on the SNI name rustls
/// passes in.
#[derive(Debug)]
pub struct GatedServerVerifier {
    context: Arc<TlsContext>,
    peer: HostIdentity,
}

impl GatedServerVerifier {
    pub fn new(context: Arc<TlsContext>, peer: HostIdentity) -> Self {
        Self { context, peer }
    }
}

impl ServerCertVerifier for GatedServerVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let chain = presented_chain(end_entity, intermediates);
        to_rustls(self.context.decide_at(&chain, &self.peer, now))?;
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.context.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.context.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.context
            .provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
