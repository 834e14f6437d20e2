use std::io;

use crate::certificate::CertificateError;

/// Server construction and runtime error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid server configuration: {0}")]
    Configuration(String),

    #[error("Unable to listen on port {port}")]
    Listen {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("Server on port {port} stopped")]
    Serve {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("Certificate provisioning failed")]
    Certificate(#[from] CertificateError),
}

impl ServerError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}
