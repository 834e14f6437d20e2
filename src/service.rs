//! Named services registered with the server.

use axum::routing::MethodRouter;

/// A service knows its own name and the path it is served on.
#[derive(Debug, Clone)]
pub struct Service {
    pub name: String,
    pub path: String,
    pub handler: MethodRouter,
}

impl Service {
    pub fn new(name: impl Into<String>, path: impl Into<String>, handler: MethodRouter) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            handler,
        }
    }
}
