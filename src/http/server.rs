//! HTTP/HTTPS server construction and startup logic.

use std::collections::BTreeMap;
use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use std::time::Duration;

use axum::routing::MethodRouter;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use hyper_util::rt::TokioTimer;
use tower_http::timeout::TimeoutLayer;
use tracing::instrument::WithSubscriber;
use tracing::Dispatch;

use super::options::{ServerOption, Settings};
use crate::certificate::TlsConfig;
use crate::error::ServerError;
use crate::middleware::apply_chain;

/// Hosts the registered handlers on a single port.
///
/// Built once by [`Server::new`] and consumed by [`Server::run`]; there is no
/// way to reconfigure or restart it.
pub struct Server {
    router: Router,
    tls: Option<TlsConfig>,
    read_timeout: Duration,
    logger: Dispatch,
    handle: Handle,
}

impl Server {
    /// Creates a new server, applying `options` in order.
    ///
    /// The first failing option aborts construction and its error is returned
    /// as is.
    pub fn new(options: impl IntoIterator<Item = ServerOption>) -> Result<Self, ServerError> {
        let mut settings = Settings::default();
        for option in options {
            option.apply(&mut settings)?;
        }

        let Settings {
            handlers,
            middleware,
            tls,
            read_timeout,
            write_timeout,
            logger,
        } = settings;

        let router = tracing::dispatcher::with_default(&logger, || {
            for m in &middleware {
                tracing::info!(middleware = m.name(), "Using middleware");
            }
            apply_chain(dispatcher(handlers), &middleware).layer(TimeoutLayer::new(write_timeout))
        });

        Ok(Self {
            router,
            tls,
            read_timeout,
            logger,
            handle: Handle::new(),
        })
    }

    /// Whether [`Server::run`] will serve TLS.
    pub fn is_tls(&self) -> bool {
        self.tls.is_some()
    }

    /// The fully assembled handler, middleware included.
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Handle controlling the listener: shutdown and the bound address.
    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    /// Run the server. If a TLS configuration was provided the server runs
    /// securely, otherwise it runs on plain HTTP.
    ///
    /// The listener binds `0.0.0.0:port`, so it accepts IPv4 only. Port `0`
    /// picks a free port, reported by [`Handle::listening`].
    ///
    /// Blocks until the listener is shut down through the [`Handle`] or fails.
    pub async fn run(self, port: u16) -> Result<(), ServerError> {
        let Self {
            router,
            tls,
            read_timeout,
            logger,
            handle,
        } = self;

        serve(router, tls, read_timeout, handle, port)
            .with_subscriber(logger)
            .await
    }
}

async fn serve(
    router: Router,
    tls: Option<TlsConfig>,
    read_timeout: Duration,
    handle: Handle,
    port: u16,
) -> Result<(), ServerError> {
    let listener = bind(port)?;
    let app = router.into_make_service();

    let result = match tls {
        None => {
            tracing::info!(port, tls = false, "Starting server");
            let mut server = axum_server::from_tcp(listener).handle(handle);
            server
                .http_builder()
                .http1()
                .timer(TokioTimer::new())
                .header_read_timeout(read_timeout);
            server.serve(app).await
        }
        Some(tls) => {
            tracing::info!(port, tls = true, "Starting server");
            let config = RustlsConfig::from_config(tls.server_config());
            let mut server =
                axum_server::tls_rustls::from_tcp_rustls(listener, config).handle(handle);
            server
                .http_builder()
                .http1()
                .timer(TokioTimer::new())
                .header_read_timeout(read_timeout);
            server.serve(app).await
        }
    };

    result.map_err(|source| {
        tracing::error!(port, error = %source, "Server stopped");
        ServerError::Serve { port, source }
    })
}

fn bind(port: u16) -> Result<TcpListener, ServerError> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    let listener = TcpListener::bind(addr).map_err(|source| ServerError::Listen { port, source })?;
    listener
        .set_nonblocking(true)
        .map_err(|source| ServerError::Listen { port, source })?;
    Ok(listener)
}

/// Build the request dispatcher.
///
/// Paths follow `net/http` mux conventions: `/` catches everything not
/// matched elsewhere, a trailing `/` registers the whole subtree, anything
/// else matches exactly. Segments starting with `:` or `*` are literal.
fn dispatcher(handlers: BTreeMap<String, MethodRouter>) -> Router {
    let router = Router::new().without_v07_checks();
    handlers
        .into_iter()
        .fold(router, |router, (path, handler)| match path.as_str() {
            "/" => router.fallback_service(handler),
            subtree if subtree.ends_with('/') => router
                .route(subtree, handler.clone())
                .route(&format!("{subtree}{{*rest}}"), handler),
            exact => router.route(exact, handler),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::options::{handlers, middleware, tls_config, write_timeout};
    use crate::middleware::Middleware;
    use axum::body::Body;
    use axum::extract::Request;
    use axum::routing::get;
    use http::StatusCode;
    use tower::ServiceExt;

    async fn get_path(server: &Server, path: &str) -> (StatusCode, String) {
        let response = server
            .router()
            .clone()
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_exact_and_subtree_paths() {
        let server = Server::new([handlers([
            ("/health", get(|| async { "health" })),
            ("/api/", get(|| async { "api" })),
        ])])
        .unwrap();

        assert_eq!(get_path(&server, "/health").await, (StatusCode::OK, "health".into()));
        assert_eq!(get_path(&server, "/api/").await, (StatusCode::OK, "api".into()));
        assert_eq!(get_path(&server, "/api/v1/items").await, (StatusCode::OK, "api".into()));
        assert_eq!(get_path(&server, "/health/extra").await.0, StatusCode::NOT_FOUND);
        assert_eq!(get_path(&server, "/missing").await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_colon_and_star_segments_are_literal() {
        let server = Server::new([handlers([
            ("/:id", get(|| async { "colon" })),
            ("/files/*", get(|| async { "star" })),
        ])])
        .unwrap();

        assert_eq!(get_path(&server, "/:id").await, (StatusCode::OK, "colon".into()));
        assert_eq!(get_path(&server, "/files/*").await, (StatusCode::OK, "star".into()));
        assert_eq!(get_path(&server, "/42").await.0, StatusCode::NOT_FOUND);
        assert_eq!(get_path(&server, "/files/report").await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_root_catches_everything_else() {
        let server = Server::new([handlers([
            ("/", get(|| async { "root" })),
            ("/health", get(|| async { "health" })),
        ])])
        .unwrap();

        assert_eq!(get_path(&server, "/").await, (StatusCode::OK, "root".into()));
        assert_eq!(get_path(&server, "/anything/else").await, (StatusCode::OK, "root".into()));
        assert_eq!(get_path(&server, "/health").await, (StatusCode::OK, "health".into()));
    }

    #[tokio::test]
    async fn test_last_registration_wins() {
        let server = Server::new([
            handlers([("/v", get(|| async { "first" }))]),
            handlers([("/v", get(|| async { "second" }))]),
        ])
        .unwrap();

        assert_eq!(get_path(&server, "/v").await, (StatusCode::OK, "second".into()));
    }

    #[test]
    fn test_failing_option_aborts_construction() {
        let result = Server::new([
            handlers([("/ok", get(|| async { "ok" }))]),
            ServerOption::new(|_| Err(ServerError::configuration("boom"))),
            handlers([("/never", get(|| async { "never" }))]),
        ]);

        match result {
            Err(ServerError::Configuration(message)) => assert_eq!(message, "boom"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("construction should fail"),
        }
    }

    #[test]
    fn test_tls_presence() {
        let server = Server::new([tls_config(None)]).unwrap();
        assert!(!server.is_tls());

        let tls = crate::certificate::TemporaryProvider::new(crate::certificate::TemporaryConfig {
            use_ed25519: true,
            ..Default::default()
        })
        .generate(&["localhost".to_string()])
        .unwrap();
        let server = Server::new([tls_config(Some(tls))]).unwrap();
        assert!(server.is_tls());
    }

    #[tokio::test]
    async fn test_write_timeout_cuts_slow_handlers() {
        let server = Server::new([
            write_timeout(Duration::from_millis(50)),
            middleware(Vec::<Middleware>::new()),
            handlers([(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            )]),
        ])
        .unwrap();

        assert_eq!(get_path(&server, "/slow").await.0, StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn test_default_cors_applied() {
        let server = Server::new([handlers([("/v", get(|| async { "v" }))])]).unwrap();

        let response = server
            .router()
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/v")
                    .header(http::header::ORIGIN, "https://anywhere.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers()[http::header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://anywhere.example"
        );
    }

    #[tokio::test]
    async fn test_listen_error_on_taken_port() {
        let taken = std::net::TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0)).unwrap();
        let port = taken.local_addr().unwrap().port();

        let err = Server::new(Vec::<ServerOption>::new())
            .unwrap()
            .run(port)
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Listen { port: p, .. } if p == port));
    }
}
