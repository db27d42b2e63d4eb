//! Shared utilities for integration tests.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use basket_bff::config::GatewayConfig;
use basket_bff::session::{FavoriteCountries, GuestSession, SessionCookie};
use basket_bff::HttpServer;
use bytes::Bytes;
use serde_json::Value;
use tower::ServiceExt;
use wiremock::MockServer;

/// A gateway wired to a mock upstream.
pub struct Harness {
    pub upstream: MockServer,
    pub router: Router,
}

impl Harness {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    /// Starts with `adjust` applied on top of [`config_for`].
    pub async fn start_with(adjust: impl FnOnce(&mut GatewayConfig)) -> Self {
        let upstream = MockServer::start().await;
        let mut config = config_for(&upstream.uri());
        adjust(&mut config);
        let router = HttpServer::new(config).expect("gateway builds").router();
        Self { upstream, router }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Requests upstream received, in order.
    pub async fn received(&self) -> Vec<wiremock::Request> {
        self.upstream.received_requests().await.unwrap_or_default()
    }
}

/// Configuration pointing every outbound host at `uri`.
pub fn config_for(uri: &str) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.upstream.base_url = uri.to_string();
    config.upstream.request_timeout_secs = 5;
    config.upstream.cart_timeout_secs = 5;
    config.geo.geocoding_url = format!("{uri}/search");
    config
        .geo
        .tile_styles
        .insert("standard".into(), format!("{uri}/osm/{{z}}/{{x}}/{{y}}.{{ext}}"));
    config.client_app.url = "http://app.test".into();
    config
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response is JSON")
    }

    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect()
    }

    /// The session handed back in the last `GuestProfile` Set-Cookie line.
    pub fn session_cookie(&self) -> Option<GuestSession> {
        let codec = SessionCookie::default();
        self.set_cookies()
            .iter()
            .rev()
            .find(|line| codec.is_session_set_cookie(line))
            .and_then(|line| codec.from_set_cookie(line).ok())
    }
}

pub fn session(identity: &str, basket: &str, locale: &str, favorites: &[&str]) -> GuestSession {
    GuestSession::new(identity, basket, locale, FavoriteCountries::new(favorites))
}

/// `GuestProfile=...` pair for a request `Cookie` header.
pub fn cookie_pair(session: &GuestSession) -> String {
    SessionCookie::default().request_pair(session)
}

/// `Set-Cookie` line as upstream would send it.
pub fn upstream_set_cookie(session: &GuestSession) -> String {
    SessionCookie::default().set_cookie(session)
}

/// The session upstream received in its `Cookie` header.
pub fn upstream_session(request: &wiremock::Request) -> Option<GuestSession> {
    SessionCookie::default()
        .from_request_headers(&request.headers)
        .and_then(Result::ok)
}

pub fn get(uri: &str) -> axum::http::request::Builder {
    Request::builder().method("GET").uri(uri)
}

pub fn post(uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
}

pub fn json_body(value: Value) -> Body {
    Body::from(value.to_string())
}
