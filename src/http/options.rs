//! Options overriding the default behaviour of the [`Server`](super::Server).
//!
//! Options are applied in order; for every concern the last option wins.
//! Any option may fail, which aborts server construction.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use axum::routing::MethodRouter;
use tracing::Dispatch;

use crate::certificate::TlsConfig;
use crate::error::ServerError;
use crate::middleware::{self, Middleware};
use crate::service::Service;

/// Default read timeout, see [`read_timeout`].
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Default write timeout, see [`write_timeout`].
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Everything the options may change before the server is built.
pub struct Settings {
    pub(crate) handlers: BTreeMap<String, MethodRouter>,
    pub(crate) middleware: Vec<Middleware>,
    pub(crate) tls: Option<TlsConfig>,
    pub(crate) read_timeout: Duration,
    pub(crate) write_timeout: Duration,
    pub(crate) logger: Dispatch,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            handlers: BTreeMap::new(),
            // By default enable cors for all.
            middleware: vec![middleware::cors(&[])],
            tls: None,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            logger: tracing::dispatcher::get_default(Dispatch::clone),
        }
    }
}

impl Settings {
    /// Run `f` with this server's logger as the default dispatcher.
    pub fn in_logger<R>(&self, f: impl FnOnce() -> R) -> R {
        tracing::dispatcher::with_default(&self.logger, f)
    }

    pub fn handler_paths(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn middleware(&self) -> &[Middleware] {
        &self.middleware
    }

    pub fn tls(&self) -> Option<&TlsConfig> {
        self.tls.as_ref()
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    fn register(&mut self, path: String, handler: MethodRouter) -> Result<(), ServerError> {
        validate_path(&path)?;
        self.handlers.insert(path, handler);
        Ok(())
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("middleware", &self.middleware)
            .field("tls", &self.tls.is_some())
            .field("read_timeout", &self.read_timeout)
            .field("write_timeout", &self.write_timeout)
            .finish_non_exhaustive()
    }
}

type ApplyFn = dyn FnOnce(&mut Settings) -> Result<(), ServerError> + Send;

/// A single, possibly failing, change to the server [`Settings`].
pub struct ServerOption(Box<ApplyFn>);

impl ServerOption {
    pub fn new<F>(apply: F) -> Self
    where
        F: FnOnce(&mut Settings) -> Result<(), ServerError> + Send + 'static,
    {
        Self(Box::new(apply))
    }

    pub(crate) fn apply(self, settings: &mut Settings) -> Result<(), ServerError> {
        (self.0)(settings)
    }
}

impl fmt::Debug for ServerOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ServerOption")
    }
}

/// Logger overrides the default logger in the server.
pub fn logger(dispatch: impl Into<Dispatch>) -> ServerOption {
    let dispatch = dispatch.into();
    ServerOption::new(move |settings| {
        settings.logger = dispatch;
        Ok(())
    })
}

/// Register handlers by path. A later registration for the same path replaces
/// the earlier one.
pub fn handlers<I, P>(handlers: I) -> ServerOption
where
    I: IntoIterator<Item = (P, MethodRouter)>,
    P: Into<String>,
{
    let handlers: Vec<(String, MethodRouter)> = handlers
        .into_iter()
        .map(|(path, handler)| (path.into(), handler))
        .collect();
    ServerOption::new(move |settings| {
        for (path, handler) in handlers {
            settings.register(path, handler)?;
        }
        Ok(())
    })
}

/// Services provides the server with the list of services which should be served.
pub fn services(services: impl IntoIterator<Item = Service>) -> ServerOption {
    let services: Vec<Service> = services.into_iter().collect();
    ServerOption::new(move |settings| {
        for service in services {
            let Service {
                name,
                path,
                handler,
            } = service;
            settings.register(path.clone(), handler)?;
            settings.in_logger(|| tracing::info!(service = %name, %path, "Registered service"));
        }
        Ok(())
    })
}

/// Serve TLS with the given configuration, or plain HTTP when `None`.
///
/// Takes a provider's output as is.
pub fn tls_config(tls: Option<TlsConfig>) -> ServerOption {
    ServerOption::new(move |settings| {
        settings.tls = tls;
        Ok(())
    })
}

/// Replace the middleware chain. The first middleware is the outermost.
pub fn middleware(chain: impl IntoIterator<Item = Middleware>) -> ServerOption {
    let chain: Vec<Middleware> = chain.into_iter().collect();
    ServerOption::new(move |settings| {
        settings.middleware = chain;
        Ok(())
    })
}

/// Maximum time allowed for a client to send the request headers.
pub fn read_timeout(timeout: Duration) -> ServerOption {
    ServerOption::new(move |settings| {
        settings.read_timeout = non_zero(timeout, "read")?;
        Ok(())
    })
}

/// Maximum time allowed to produce the response.
pub fn write_timeout(timeout: Duration) -> ServerOption {
    ServerOption::new(move |settings| {
        settings.write_timeout = non_zero(timeout, "write")?;
        Ok(())
    })
}

fn non_zero(timeout: Duration, kind: &str) -> Result<Duration, ServerError> {
    if timeout.is_zero() {
        return Err(ServerError::configuration(format!(
            "{kind} timeout must be greater than zero"
        )));
    }
    Ok(timeout)
}

/// Paths follow `net/http` mux conventions, so route parameters are not allowed.
fn validate_path(path: &str) -> Result<(), ServerError> {
    if !path.starts_with('/') {
        return Err(ServerError::configuration(format!(
            "handler path {path:?} must start with '/'"
        )));
    }
    if path.contains(['{', '}']) {
        return Err(ServerError::configuration(format!(
            "handler path {path:?} must not contain route parameters"
        )));
    }
    Ok(())
}
