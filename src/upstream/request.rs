//! Outbound request description.
//!
//! # Responsibilities
//! - Describe one upstream call independent of the HTTP client
//! - Carry the serialized session cookie and any extra cookie pairs
//! - Select the `Accept` value and per-call timeout class

use std::time::Duration;

use bytes::Bytes;
use reqwest::Method;
use serde_json::Value;
use url::Url;

use crate::session::{GuestSession, SessionCookie};

/// `Accept` value for JSON endpoints.
pub const ACCEPT_JSON: &str = "application/json";
/// `Accept` value for the project PDF export.
pub const ACCEPT_PDF: &str = "application/pdf";
/// `Accept` value for image passthroughs.
pub const ACCEPT_IMAGE: &str = "image/webp,image/apng,image/*,*/*;q=0.8";

/// Where the call goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Path on the configured upstream host (e.g. `/api/flags`).
    Upstream(String),
    /// A fully qualified third-party URL (tiles, geocoding, images).
    External(Url),
}

/// A single call to the upstream (or an auxiliary host).
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub target: Target,
    pub query: Vec<(String, String)>,
    pub cookies: Vec<String>,
    pub body: Option<Value>,
    pub raw_body: Option<Bytes>,
    /// `None` leaves `Accept` to the forwarded headers.
    pub accept: Option<&'static str>,
    pub timeout: Option<Duration>,
    pub forward_headers: Vec<(String, String)>,
}

impl UpstreamRequest {
    pub fn new(method: Method, target: Target) -> Self {
        Self {
            method,
            target,
            query: Vec::new(),
            cookies: Vec::new(),
            body: None,
            raw_body: None,
            accept: Some(ACCEPT_JSON),
            timeout: None,
            forward_headers: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, Target::Upstream(path.into()))
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, Target::Upstream(path.into()))
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, Target::Upstream(path.into()))
    }

    pub fn external(url: Url) -> Self {
        Self::new(Method::GET, Target::External(url))
    }

    /// Appends a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Appends a query parameter only when `value` is non-empty.
    pub fn query_if_present(self, key: impl Into<String>, value: &str) -> Self {
        if value.is_empty() {
            self
        } else {
            self.query(key, value)
        }
    }

    /// Attaches the session cookie, serialized by `codec`.
    pub fn session(mut self, codec: &SessionCookie, session: &GuestSession) -> Self {
        self.cookies.insert(0, codec.request_pair(session));
        self
    }

    /// Adds a raw `name=value` cookie pair.
    pub fn cookie(mut self, pair: impl Into<String>) -> Self {
        let pair = pair.into();
        if !pair.is_empty() {
            self.cookies.push(pair);
        }
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Sends the body verbatim (passthrough only).
    pub fn bytes(mut self, body: Bytes) -> Self {
        self.raw_body = Some(body);
        self
    }

    pub fn accept(mut self, accept: &'static str) -> Self {
        self.accept = Some(accept);
        self
    }

    /// Leaves `Accept` to the forwarded client headers.
    pub fn inherit_accept(mut self) -> Self {
        self.accept = None;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Forwards a client header verbatim (passthrough only).
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.forward_headers.push((name.into(), value.into()));
        self
    }

    /// The `Cookie` header value, if any cookie is attached.
    pub fn cookie_header(&self) -> Option<String> {
        (!self.cookies.is_empty()).then(|| self.cookies.join("; "))
    }
}
