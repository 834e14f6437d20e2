//! Middleware applied around the request dispatcher.
//!
//! A [`Middleware`] wraps a [`Router`] in some way, usually by adding a
//! tower layer. The server applies its chain so that the first middleware in
//! the list is the outermost one: it sees the request first and the response
//! last.

mod cors;
mod request_id;

use std::borrow::Cow;
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use axum::extract::Request;
use axum::response::IntoResponse;
use axum::routing::Route;
use axum::Router;
use tower::{Layer, Service};

pub use cors::{cors, cors_layer, CORS_ALLOWED_METHODS, CORS_EXPOSED_HEADERS};
pub use request_id::{request_id, request_id_layer, RequestId};

type WrapFn = dyn Fn(Router) -> Router + Send + Sync;

/// Transforms the request or response in some way.
#[derive(Clone)]
pub struct Middleware {
    name: Cow<'static, str>,
    wrap: Arc<WrapFn>,
}

impl Middleware {
    /// Create a middleware from a function wrapping the router.
    pub fn new<F>(name: impl Into<Cow<'static, str>>, wrap: F) -> Self
    where
        F: Fn(Router) -> Router + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            wrap: Arc::new(wrap),
        }
    }

    /// Create a middleware from any layer accepted by [`Router::layer`].
    pub fn from_layer<L>(name: impl Into<Cow<'static, str>>, layer: L) -> Self
    where
        L: Layer<Route> + Clone + Send + Sync + 'static,
        L::Service: Service<Request> + Clone + Send + Sync + 'static,
        <L::Service as Service<Request>>::Response: IntoResponse + 'static,
        <L::Service as Service<Request>>::Error: Into<Infallible> + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        Self::new(name, move |router: Router| router.layer(layer.clone()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wrap `router`, returning the wrapped router.
    pub fn apply(&self, router: Router) -> Router {
        (self.wrap)(router)
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Middleware")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Wrap `router` with `chain`, first element outermost.
pub fn apply_chain(router: Router, chain: &[Middleware]) -> Router {
    // Each Router::layer call wraps everything added before it, so the
    // outermost wrapper has to be applied last.
    chain
        .iter()
        .rev()
        .fold(router, |router, middleware| middleware.apply(router))
}
