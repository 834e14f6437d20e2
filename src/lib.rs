//! webserver - a single-listener HTTP(S) server bootstrap
//!
//! A [`CertificateProvider`] yields a TLS configuration for a set of domains,
//! or declines. The [`Server`] is then assembled from options and serves
//! either plain HTTP or TLS on one port, depending only on whether a TLS
//! configuration was supplied.
//!
//! ```no_run
//! use axum::routing::get;
//! use webserver::certificate::{CertificateProvider, TemporaryConfig, TemporaryProvider};
//! use webserver::http::{handlers, tls_config};
//! use webserver::Server;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = TemporaryProvider::new(TemporaryConfig::default());
//! let tls = provider.provide(&["localhost".to_string()]).await?;
//!
//! let server = Server::new([
//!     handlers([("/health", get(|| async { "ok" }))]),
//!     tls_config(tls),
//! ])?;
//! server.run(8443).await?;
//! # Ok(())
//! # }
//! ```

pub mod certificate;
pub mod config;
pub mod error;
pub mod http;
pub mod middleware;
pub mod service;

pub use crate::certificate::{CertificateError, CertificateProvider, TlsConfig};
pub use crate::error::ServerError;
pub use crate::http::{Server, ServerOption};
pub use crate::middleware::Middleware;
pub use crate::service::Service;
