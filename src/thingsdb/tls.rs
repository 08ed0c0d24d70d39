//! TLS client configuration for ThingsDB connections.
//!
//! Connections are always encrypted. `insecure` only disables certificate
//! chain and hostname validation; handshake signatures are still checked.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

use super::error::ThingsDbError;

/// Build a client configuration.
///
/// With `insecure == false` the node certificate is validated against the
/// platform trust store.
pub fn client_config(insecure: bool) -> Result<Arc<ClientConfig>, ThingsDbError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| ThingsDbError::tls(format!("invalid TLS protocol configuration: {e}")))?;

    let config = if insecure {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate { provider }))
            .with_no_client_auth()
    } else {
        builder.with_root_certificates(native_roots()?).with_no_client_auth()
    };

    Ok(Arc::new(config))
}

fn native_roots() -> Result<RootCertStore, ThingsDbError> {
    let loaded = rustls_native_certs::load_native_certs();
    for error in &loaded.errors {
        warn!(error = %error, "Failed to load a platform root certificate");
    }

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(loaded.certs);
    debug!(added, ignored, "Loaded platform root certificates");

    if roots.is_empty() {
        return Err(ThingsDbError::tls("no usable root certificates found in the platform store"));
    }
    Ok(roots)
}

/// Wrap an established TCP stream in a TLS session for `host`.
pub async fn handshake(
    stream: TcpStream,
    host: &str,
    insecure: bool,
) -> Result<TlsStream<TcpStream>, ThingsDbError> {
    let server_name = ServerName::try_from(host.to_owned())
        .map_err(|e| ThingsDbError::tls(format!("invalid server name '{host}': {e}")))?;

    let connector = TlsConnector::from(client_config(insecure)?);
    Ok(connector.connect(server_name, stream).await?)
}

/// Verifier used when `insecure` is set.
#[derive(Debug)]
struct AcceptAnyCertificate {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}
