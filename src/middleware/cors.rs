//! Cross-origin resource sharing.

use http::header::HeaderName;
use http::request::Parts;
use http::{HeaderValue, Method};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};

use super::Middleware;

/// Methods allowed for cross-origin requests: the preflight itself, metrics
/// scraping and connect RPCs.
pub const CORS_ALLOWED_METHODS: [Method; 3] = [Method::OPTIONS, Method::GET, Method::POST];

/// Response headers exposed to browsers. Listed explicitly because a `*`
/// wildcard is taken literally on requests with credentials.
pub const CORS_EXPOSED_HEADERS: [&str; 5] = [
    "grpc-status",
    "grpc-message",
    "grpc-status-details-bin",
    "x-grpc-test-echo-initial",
    "trailer-x-grpc-test-echo-trailing-bin",
];

/// Cors allows only the known domains.
///
/// An empty `domains` list mirrors every request origin, which effectively
/// disables the same-origin protection.
pub fn cors(domains: &[String]) -> Middleware {
    Middleware::from_layer("cors", cors_layer(domains))
}

/// The [`CorsLayer`] behind [`cors`].
pub fn cors_layer(domains: &[String]) -> CorsLayer {
    let allow_origin = if domains.is_empty() {
        AllowOrigin::mirror_request()
    } else {
        let allowed = domains.to_vec();
        AllowOrigin::predicate(move |origin: &HeaderValue, _: &Parts| {
            origin
                .to_str()
                .map(|origin| allowed.iter().any(|domain| domain == origin))
                .unwrap_or(false)
        })
    };

    CorsLayer::new()
        .allow_methods(CORS_ALLOWED_METHODS)
        .allow_origin(allow_origin)
        .allow_headers(AllowHeaders::mirror_request())
        .expose_headers(CORS_EXPOSED_HEADERS.map(HeaderName::from_static))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::Request;
    use axum::routing::post;
    use axum::Router;
    use http::header::{
        ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
        ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_REQUEST_HEADERS,
        ACCESS_CONTROL_REQUEST_METHOD, ORIGIN,
    };
    use http::Response;
    use tower::ServiceExt;

    fn app(domains: &[&str]) -> Router {
        let domains: Vec<String> = domains.iter().map(|d| d.to_string()).collect();
        cors(&domains).apply(Router::new().route("/rpc", post(|| async { "ok" })))
    }

    async fn request(app: Router, origin: &str) -> Response<Body> {
        app.oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/rpc")
                .header(ORIGIN, origin)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
    }

    async fn preflight(app: Router, origin: &str, headers: &str) -> Response<Body> {
        app.oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/rpc")
                .header(ORIGIN, origin)
                .header(ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .header(ACCESS_CONTROL_REQUEST_HEADERS, headers)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_empty_allow_list_mirrors_any_origin() {
        for origin in ["https://a.example", "https://c.example", "null"] {
            let response = request(app(&[]), origin).await;
            assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], origin);
        }
    }

    #[tokio::test]
    async fn test_allow_list_filters_origins() {
        let allowed = ["https://a.example", "https://b.example"];

        for origin in allowed {
            let response = request(app(&allowed), origin).await;
            assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], origin);
        }

        let response = request(app(&allowed), "https://c.example").await;
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[tokio::test]
    async fn test_preflight_contract() {
        let response = preflight(app(&[]), "https://a.example", "x-custom, connect-protocol-version").await;

        let headers = response.headers();
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "https://a.example");
        assert_eq!(
            headers[ACCESS_CONTROL_ALLOW_HEADERS],
            "x-custom, connect-protocol-version"
        );

        let methods = headers[ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
        for method in ["OPTIONS", "GET", "POST"] {
            assert!(methods.contains(method), "{method} missing from {methods}");
        }
        assert!(!methods.contains("PUT"));
    }

    #[tokio::test]
    async fn test_preflight_rejected_origin() {
        let response = preflight(app(&["https://a.example"]), "https://c.example", "x-custom").await;
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[tokio::test]
    async fn test_exposes_rpc_trailer_headers() {
        let response = request(app(&[]), "https://a.example").await;
        let exposed = response.headers()[ACCESS_CONTROL_EXPOSE_HEADERS]
            .to_str()
            .unwrap()
            .to_ascii_lowercase();

        for header in CORS_EXPOSED_HEADERS {
            assert!(exposed.contains(header), "{header} missing from {exposed}");
        }
    }
}
