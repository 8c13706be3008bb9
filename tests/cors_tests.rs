//! CORS behavior of the security filter chain.
//!
//! Preflight and simple cross-origin requests against a router wrapped in
//! the chain, checking the headers browsers act upon.

use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    routing::get,
    Router,
};
use dashboard_security::config::CorsSettings;
use dashboard_security::security::SecurityFilterChainBuilder;
use tower::ServiceExt;

const DEV_ORIGIN: &str = "http://localhost:3002";

fn app(settings: CorsSettings) -> Router {
    let chain = SecurityFilterChainBuilder::new(settings)
        .build_filter_chain()
        .unwrap();

    chain.apply(
        Router::new()
            .route("/topic/list.query", get(|| async { "topics" }))
            .route("/actuator/health", get(|| async { "UP" })),
    )
}

async fn preflight(settings: CorsSettings, path: &str, origin: &str) -> Response<Body> {
    app(settings)
        .oneshot(
            Request::options(path)
                .header(header::ORIGIN, origin)
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "x-xsrf-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

fn header_str<'a>(response: &'a Response<Body>, name: header::HeaderName) -> Option<&'a str> {
    response.headers().get(name).map(|v| v.to_str().unwrap())
}

fn configured_origin() -> CorsSettings {
    CorsSettings {
        allowed_origins: vec!["https://ops.example.com".to_string()],
        ..CorsSettings::default()
    }
}

mod preflight_tests {
    use super::*;

    #[tokio::test]
    async fn test_default_origin_preflight() {
        let response = preflight(CorsSettings::default(), "/topic/list.query", DEV_ORIGIN).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            header_str(&response, header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(DEV_ORIGIN)
        );
        assert_eq!(
            header_str(&response, header::ACCESS_CONTROL_ALLOW_CREDENTIALS),
            Some("true")
        );
        assert_eq!(
            header_str(&response, header::ACCESS_CONTROL_MAX_AGE),
            Some("3600")
        );

        let methods = header_str(&response, header::ACCESS_CONTROL_ALLOW_METHODS).unwrap();
        for method in ["GET", "POST", "PUT", "DELETE", "OPTIONS"] {
            assert!(methods.contains(method), "missing {} in {}", method, methods);
        }

        let headers = header_str(&response, header::ACCESS_CONTROL_ALLOW_HEADERS)
            .unwrap()
            .to_ascii_lowercase();
        for name in ["content-type", "authorization", "x-requested-with", "x-xsrf-token"] {
            assert!(headers.contains(name), "missing {} in {}", name, headers);
        }
    }

    #[tokio::test]
    async fn test_configured_origin_is_added_to_defaults() {
        let response = preflight(configured_origin(), "/topic/list.query", "https://ops.example.com").await;
        assert_eq!(
            header_str(&response, header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some("https://ops.example.com")
        );

        let response = preflight(configured_origin(), "/topic/list.query", DEV_ORIGIN).await;
        assert_eq!(
            header_str(&response, header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(DEV_ORIGIN)
        );
    }

    #[tokio::test]
    async fn test_unknown_origin_preflight_is_forbidden() {
        let response = preflight(configured_origin(), "/topic/list.query", "https://evil.example").await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(header_str(&response, header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        assert!(header_str(&response, header::ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());
        assert!(header_str(&response, header::ACCESS_CONTROL_ALLOW_METHODS).is_none());
    }

    #[tokio::test]
    async fn test_method_names_are_not_origins() {
        let response = preflight(configured_origin(), "/topic/list.query", "GET").await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_configured_origin_with_trailing_slash_matches() {
        let settings = CorsSettings {
            allowed_origins: vec!["https://ops.example.com/".to_string()],
            ..CorsSettings::default()
        };
        let response = preflight(settings, "/topic/list.query", "https://ops.example.com").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            header_str(&response, header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some("https://ops.example.com")
        );
    }

    #[tokio::test]
    async fn test_preflight_for_disallowed_method_is_forbidden() {
        let response = app(CorsSettings::default())
            .oneshot(
                Request::options("/topic/list.query")
                    .header(header::ORIGIN, DEV_ORIGIN)
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "PATCH")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_preflight_for_disallowed_header_is_forbidden() {
        let response = app(CorsSettings::default())
            .oneshot(
                Request::options("/topic/list.query")
                    .header(header::ORIGIN, DEV_ORIGIN)
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "x-tenant")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_plain_options_to_metrics_is_challenged() {
        let response = app(CorsSettings::default())
            .oneshot(
                Request::options("/actuator/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    }

    #[tokio::test]
    async fn test_configured_credentials_and_max_age() {
        let settings = CorsSettings {
            allow_credentials: false,
            max_age_seconds: 600,
            ..CorsSettings::default()
        };
        let response = preflight(settings, "/topic/list.query", DEV_ORIGIN).await;

        assert!(header_str(&response, header::ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());
        assert_eq!(
            header_str(&response, header::ACCESS_CONTROL_MAX_AGE),
            Some("600")
        );
    }

    #[tokio::test]
    async fn test_preflight_to_metrics_is_not_challenged() {
        let response = preflight(CorsSettings::default(), "/actuator/health", DEV_ORIGIN).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            header_str(&response, header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(DEV_ORIGIN)
        );
    }
}

mod simple_request_tests {
    use super::*;

    #[tokio::test]
    async fn test_cross_origin_get_carries_cors_headers() {
        let response = app(CorsSettings::default())
            .oneshot(
                Request::get("/topic/list.query")
                    .header(header::ORIGIN, DEV_ORIGIN)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            header_str(&response, header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(DEV_ORIGIN)
        );
        assert_eq!(
            header_str(&response, header::ACCESS_CONTROL_ALLOW_CREDENTIALS),
            Some("true")
        );
    }

    #[tokio::test]
    async fn test_cross_origin_get_from_unknown_origin_is_forbidden() {
        let response = app(CorsSettings::default())
            .oneshot(
                Request::get("/topic/list.query")
                    .header(header::ORIGIN, "https://evil.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(header_str(&response, header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[tokio::test]
    async fn test_origin_matching_host_is_not_cross_origin() {
        let response = app(CorsSettings::default())
            .oneshot(
                Request::get("/topic/list.query")
                    .header(header::HOST, "dashboard.internal:8082")
                    .header(header::ORIGIN, "http://dashboard.internal:8082")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_same_origin_get_has_no_cors_headers() {
        let response = app(CorsSettings::default())
            .oneshot(
                Request::get("/topic/list.query")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(header_str(&response, header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }
}
