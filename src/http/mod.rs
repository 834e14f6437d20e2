//! HTTP server bootstrap.
//!
//! The server runs on a single port, in one of two modes decided when
//! [`Server::run`] is called:
//! - **TLS**: a [`TlsConfig`](crate::certificate::TlsConfig) was supplied
//! - **None**: plain HTTP
//!
//! Graceful shutdown on SIGTERM/SIGINT is available through [`shutdown`].

pub mod options;
mod server;
pub mod shutdown;

pub use options::{
    handlers, logger, middleware, read_timeout, services, tls_config, write_timeout,
    ServerOption, Settings,
};
pub use server::Server;
