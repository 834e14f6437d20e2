//! Provider that opts out of TLS.

use async_trait::async_trait;

use super::{CertificateError, CertificateProvider, TlsConfig};

/// Provides no TLS configuration, so the server runs on plain HTTP.
#[derive(Debug, Clone, Copy, Default)]
pub struct InsecureProvider;

impl InsecureProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CertificateProvider for InsecureProvider {
    async fn provide(&self, _domains: &[String]) -> Result<Option<TlsConfig>, CertificateError> {
        Ok(None)
    }
}
