//! Endpoint handlers.
//!
//! # Data Flow
//! ```text
//! axum extractors (headers, query, JSON body)
//!     → guard clauses (400 before any upstream call)
//!     → SessionResolver (per-endpoint ResolvePolicy)
//!     → UpstreamRequest → UpstreamClient
//!     → Reconciler → JsonWithCookies / streamed body
//! ```
//!
//! # Design Decisions
//! - Handlers hold no state of their own; `AppState` is cheap to clone
//! - Each handler names its `routing::table` entry directly

pub mod auth;
pub mod basket;
pub mod catalog;
pub mod geo;
pub mod health;
pub mod passthrough;
pub mod profile;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;

use crate::config::GatewayConfig;
use crate::http::response::{GatewayError, JsonWithCookies};
use crate::observability::metrics;
use crate::reconcile::Reconciler;
use crate::routing::{Endpoint, TimeoutClass};
use crate::session::{GuestSession, SessionCookie, SessionPatch, SessionResolver};
use crate::upstream::{UpstreamClient, UpstreamRequest, UpstreamResponse};

/// Shared, immutable state injected into every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub upstream: UpstreamClient,
    pub resolver: Arc<SessionResolver>,
    pub reconciler: Arc<Reconciler>,
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    pub fn new(
        upstream: UpstreamClient,
        resolver: SessionResolver,
        config: GatewayConfig,
    ) -> Self {
        let reconciler = Reconciler::new(resolver.cookie().clone());
        Self {
            upstream,
            resolver: Arc::new(resolver),
            reconciler: Arc::new(reconciler),
            config: Arc::new(config),
        }
    }

    pub fn cookie(&self) -> &SessionCookie {
        self.resolver.cookie()
    }

    /// Resolves the session under the endpoint's policy.
    pub fn resolve(
        &self,
        endpoint: &Endpoint,
        headers: &HeaderMap,
        explicit: SessionPatch,
    ) -> GuestSession {
        self.resolver
            .resolve(&endpoint.resolve_policy(), headers, explicit)
    }

    /// Applies the endpoint's timeout class to `request`.
    fn with_timeout(&self, endpoint: &Endpoint, request: UpstreamRequest) -> UpstreamRequest {
        match endpoint.timeout {
            TimeoutClass::Default => request,
            TimeoutClass::Cart => request.timeout(self.upstream.cart_timeout()),
        }
    }

    /// Issues the call for `endpoint` and buffers the response.
    pub async fn call(
        &self,
        endpoint: &Endpoint,
        request: UpstreamRequest,
    ) -> Result<UpstreamResponse, GatewayError> {
        let request = self.with_timeout(endpoint, request);
        Ok(self.upstream.send(endpoint.name, request).await?)
    }

    /// Issues the call and returns the unbuffered response.
    pub async fn call_streaming(
        &self,
        endpoint: &Endpoint,
        request: UpstreamRequest,
    ) -> Result<reqwest::Response, GatewayError> {
        let request = self.with_timeout(endpoint, request);
        Ok(self.upstream.send_streaming(endpoint.name, request).await?)
    }

    /// Calls upstream and reconciles the response against `session`.
    pub async fn relay(
        &self,
        endpoint: &Endpoint,
        session: &GuestSession,
        request: UpstreamRequest,
    ) -> Result<JsonWithCookies, GatewayError> {
        let response = self.call(endpoint, request).await?;
        let reconciled = self
            .reconciler
            .reconcile(&endpoint.plan, session, &response)?;
        Ok(reconciled.into_response())
    }
}

/// Rejects the request before any upstream call when a required value is absent.
pub(crate) fn require(
    endpoint: &Endpoint,
    checks: &[(&'static str, bool)],
) -> Result<(), GatewayError> {
    let missing: Vec<&str> = checks
        .iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| *name)
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    metrics::record_guard_rejection(endpoint.name);
    Err(GatewayError::missing(format!(
        "Missing required parameters: {}",
        missing.join(", ")
    )))
}

/// Headers never copied between the two hops.
pub(crate) const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "proxy-connection",
];

pub(crate) fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

/// Streams an upstream body back to the client.
///
/// Only the content type is copied unless `copy_headers` is set, in which
/// case every end-to-end header is.
pub(crate) fn stream_response(
    response: reqwest::Response,
    copy_headers: bool,
) -> Response {
    let status = StatusCode::from_u16(response.status().as_u16())
        .unwrap_or(StatusCode::BAD_GATEWAY);
    let mut headers = HeaderMap::new();
    for (name, value) in response.headers() {
        let keep = if copy_headers {
            !is_hop_by_hop(name.as_str()) && name != header::CONTENT_LENGTH
        } else {
            name == header::CONTENT_TYPE
        };
        if keep {
            headers.append(name.clone(), value.clone());
        }
    }

    let mut out = Response::new(Body::from_stream(response.bytes_stream()));
    *out.status_mut() = status;
    *out.headers_mut() = headers;
    out
}

/// Sets a header on a built response, skipping unrepresentable values.
pub(crate) fn set_header(response: &mut Response, name: header::HeaderName, value: &str) {
    match HeaderValue::try_from(value) {
        Ok(value) => {
            response.headers_mut().insert(name, value);
        }
        Err(e) => tracing::warn!(header = %name, error = %e, "Dropping unrepresentable header"),
    }
}
