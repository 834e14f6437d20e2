//! Generated, short-lived certificates.
//!
//! Every call mints a brand new key pair and a self-signed CA certificate for
//! the requested domains. Nothing is cached, so two calls with the same input
//! never share a key or a serial number.

use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::OsRng;
use rand::RngCore;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, Ia5String, IsCa, KeyPair,
    SanType, SerialNumber, SignatureAlgorithm,
};
use rustls_pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use time::OffsetDateTime;

use super::{CertificateError, CertificateProvider, TlsConfig};

/// Organization written into the subject of every generated certificate.
pub const CERTIFICATE_ORGANIZATION: &str = "Messr";

/// Size of the random serial number in bytes (128 bits).
pub const SERIAL_NUMBER_BYTES: usize = 16;

/// Default validity of a generated certificate.
pub const DEFAULT_VALID_FOR: Duration = Duration::from_secs(24 * 60 * 60);

/// Settings for [`TemporaryProvider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporaryConfig {
    /// How long the certificate stays valid, starting at generation time.
    pub valid_for: Duration,
    /// Use Ed25519 keys instead of RSA-2048.
    pub use_ed25519: bool,
}

impl Default for TemporaryConfig {
    fn default() -> Self {
        Self {
            valid_for: DEFAULT_VALID_FOR,
            use_ed25519: false,
        }
    }
}

/// Generates a temporary self-signed certificate for the given domains.
#[derive(Debug, Clone, Default)]
pub struct TemporaryProvider {
    config: TemporaryConfig,
}

impl TemporaryProvider {
    /// Returns a new temporary certificate provider.
    pub fn new(config: TemporaryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TemporaryConfig {
        &self.config
    }

    fn signature_algorithm(&self) -> &'static SignatureAlgorithm {
        if self.config.use_ed25519 {
            &rcgen::PKCS_ED25519
        } else {
            &rcgen::PKCS_RSA_SHA256
        }
    }

    /// Generate the certificate and wrap it into a [`TlsConfig`].
    ///
    /// This is CPU bound (RSA key generation in particular); from async code
    /// prefer [`CertificateProvider::provide`], which runs it on the blocking pool.
    pub fn generate(&self, domains: &[String]) -> Result<TlsConfig, CertificateError> {
        let key_pair = KeyPair::generate_for(self.signature_algorithm())
            .map_err(CertificateError::KeyGeneration)?;

        let params = self.certificate_params(domains)?;
        let certificate = params
            .self_signed(&key_pair)
            .map_err(|e| CertificateError::CertificateConstruction(e.into()))?;

        let private_key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));
        let tls = TlsConfig::new(vec![certificate.der().clone()], private_key)
            .map_err(|e| CertificateError::CertificateConstruction(e.into()))?;

        tracing::debug!(
            domains = ?domains,
            valid_for_secs = self.config.valid_for.as_secs(),
            ed25519 = self.config.use_ed25519,
            "Generated temporary certificate"
        );

        Ok(tls)
    }

    fn certificate_params(&self, domains: &[String]) -> Result<CertificateParams, CertificateError> {
        let construction = |e: rcgen::Error| CertificateError::CertificateConstruction(e.into());

        // X.509 validity has second precision; truncate so the window is exact.
        let not_before = OffsetDateTime::now_utc()
            .replace_nanosecond(0)
            .map_err(|e| CertificateError::CertificateConstruction(e.into()))?;
        let valid_for = time::Duration::try_from(self.config.valid_for)
            .map_err(|e| CertificateError::CertificateConstruction(e.into()))?;
        let not_after = not_before.checked_add(valid_for).ok_or_else(|| {
            CertificateError::CertificateConstruction("validity period out of range".into())
        })?;

        let mut distinguished_name = DistinguishedName::new();
        distinguished_name.push(DnType::OrganizationName, CERTIFICATE_ORGANIZATION);

        let subject_alt_names = domains
            .iter()
            .map(|domain| Ia5String::try_from(domain.as_str()).map(SanType::DnsName))
            .collect::<Result<Vec<_>, _>>()
            .map_err(construction)?;

        let mut params = CertificateParams::default();
        params.distinguished_name = distinguished_name;
        params.subject_alt_names = subject_alt_names;
        params.serial_number = Some(random_serial_number());
        params.not_before = not_before;
        params.not_after = not_after;
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);

        Ok(params)
    }
}

fn random_serial_number() -> SerialNumber {
    let mut bytes = [0u8; SERIAL_NUMBER_BYTES];
    OsRng.fill_bytes(&mut bytes);
    SerialNumber::from_slice(&bytes)
}

#[async_trait]
impl CertificateProvider for TemporaryProvider {
    async fn provide(&self, domains: &[String]) -> Result<Option<TlsConfig>, CertificateError> {
        let provider = self.clone();
        let domains = domains.to_vec();
        let tls = tokio::task::spawn_blocking(move || provider.generate(&domains)).await??;
        Ok(Some(tls))
    }
}
