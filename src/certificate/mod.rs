//! Certificate providers.
//!
//! A [`CertificateProvider`] turns a set of requested domains into a
//! [`TlsConfig`], or declines by returning `Ok(None)`, which means the server
//! should run without TLS. Two providers ship with the crate:
//! - [`temporary::TemporaryProvider`]: mints a fresh self-signed certificate per call
//! - [`insecure::InsecureProvider`]: always declines

pub mod insecure;
pub mod temporary;

use std::sync::Arc;

use async_trait::async_trait;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::{ClientConfig, DigitallySignedStruct, ProtocolVersion, ServerConfig, SignatureScheme};
use rustls_pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};

pub use insecure::InsecureProvider;
pub use temporary::{TemporaryConfig, TemporaryProvider};

/// Boxed error used to carry the underlying cause of a construction failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Protocol versions offered by every [`TlsConfig`], newest first. TLS 1.2 is the floor.
static PROTOCOL_VERSIONS: &[&rustls::SupportedProtocolVersion] =
    &[&rustls::version::TLS13, &rustls::version::TLS12];

/// Certificate provisioning error
#[derive(Debug, thiserror::Error)]
pub enum CertificateError {
    #[error("unable to generate key")]
    KeyGeneration(#[source] rcgen::Error),

    #[error("unable to generate certificate")]
    CertificateConstruction(#[source] BoxError),

    #[error("certificate task failed")]
    Task(#[from] tokio::task::JoinError),
}

/// Provides TLS configuration for a set of domains.
///
/// Returning `Ok(None)` is not a failure: it asks the server to serve plain
/// HTTP. Implementations must not share mutable state between calls; every
/// call hands back an independently owned value.
///
/// Cancellation follows the usual async rules: dropping the returned future
/// (for example through `tokio::time::timeout`) abandons the call.
#[async_trait]
pub trait CertificateProvider: Send + Sync {
    /// Provide TLS config for the given domains.
    async fn provide(&self, domains: &[String]) -> Result<Option<TlsConfig>, CertificateError>;
}

#[async_trait]
impl<P: CertificateProvider + ?Sized> CertificateProvider for Arc<P> {
    async fn provide(&self, domains: &[String]) -> Result<Option<TlsConfig>, CertificateError> {
        (**self).provide(domains).await
    }
}

#[async_trait]
impl<P: CertificateProvider + ?Sized> CertificateProvider for Box<P> {
    async fn provide(&self, domains: &[String]) -> Result<Option<TlsConfig>, CertificateError> {
        (**self).provide(domains).await
    }
}

/// Key material and protocol parameters needed to terminate TLS.
///
/// Minimum protocol version is TLS 1.2, no client certificate is requested,
/// and clients built from [`TlsConfig::client_config`] skip peer verification.
/// The value is immutable once built; clones share the same read-only data.
pub struct TlsConfig {
    certificates: Vec<CertificateDer<'static>>,
    private_key: PrivateKeyDer<'static>,
    server: Arc<ServerConfig>,
}

impl TlsConfig {
    /// Build a TLS configuration serving `certificates` with `private_key`.
    pub fn new(
        certificates: Vec<CertificateDer<'static>>,
        private_key: PrivateKeyDer<'static>,
    ) -> Result<Self, rustls::Error> {
        let server = ServerConfig::builder_with_provider(crypto_provider())
            .with_protocol_versions(PROTOCOL_VERSIONS)?
            .with_no_client_auth()
            .with_single_cert(certificates.clone(), private_key.clone_key())?;

        Ok(Self {
            certificates,
            private_key,
            server: Arc::new(server),
        })
    }

    /// The certificate chain, leaf first.
    pub fn certificates(&self) -> &[CertificateDer<'static>] {
        &self.certificates
    }

    /// The private key matching the leaf certificate.
    pub fn private_key(&self) -> &PrivateKeyDer<'static> {
        &self.private_key
    }

    /// Lowest protocol version this configuration negotiates.
    pub fn min_protocol_version(&self) -> ProtocolVersion {
        ProtocolVersion::TLSv1_2
    }

    /// Whether clients built from this configuration skip peer verification. Always true.
    pub fn insecure_skip_verify(&self) -> bool {
        true
    }

    /// Whether the server asks connecting clients for a certificate. Always false.
    pub fn requires_client_auth(&self) -> bool {
        false
    }

    /// The rustls server configuration used to terminate connections.
    pub fn server_config(&self) -> Arc<ServerConfig> {
        Arc::clone(&self.server)
    }

    /// A client configuration that accepts any server certificate.
    pub fn client_config(&self) -> Result<ClientConfig, rustls::Error> {
        let provider = crypto_provider();
        let verifier = SkipVerification(Arc::clone(&provider));
        Ok(ClientConfig::builder_with_provider(provider)
            .with_protocol_versions(PROTOCOL_VERSIONS)?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(verifier))
            .with_no_client_auth())
    }
}

impl Clone for TlsConfig {
    fn clone(&self) -> Self {
        Self {
            certificates: self.certificates.clone(),
            private_key: self.private_key.clone_key(),
            server: Arc::clone(&self.server),
        }
    }
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("certificates", &self.certificates.len())
            .field("min_protocol_version", &self.min_protocol_version())
            .field("insecure_skip_verify", &self.insecure_skip_verify())
            .finish_non_exhaustive()
    }
}

fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::aws_lc_rs::default_provider())
}

/// Accepts any server certificate while still checking handshake signatures.
#[derive(Debug)]
struct SkipVerification(Arc<CryptoProvider>);

impl ServerCertVerifier for SkipVerification {
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
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
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
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
