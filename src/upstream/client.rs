//! HTTP client for the upstream commerce API.

use std::borrow::Cow;
use std::time::{Duration, Instant};

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use bytes::Bytes;
use thiserror::Error;
use url::Url;

use crate::config::UpstreamConfig;
use crate::observability::metrics;
use crate::upstream::request::{Target, UpstreamRequest};

/// Failure to complete an upstream call.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("invalid upstream URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),

    #[error("upstream request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// A fully buffered upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Every `Set-Cookie` line, in upstream order.
    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect()
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Pooled client bound to one upstream host.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: Url,
    default_timeout: Duration,
    cart_timeout: Duration,
}

impl UpstreamClient {
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(UpstreamError::Client)?;

        Ok(Self {
            http,
            base_url: Url::parse(&config.base_url)?,
            default_timeout: Duration::from_secs(config.request_timeout_secs),
            cart_timeout: Duration::from_secs(config.cart_timeout_secs),
        })
    }

    /// Timeout for cart mutations.
    pub fn cart_timeout(&self) -> Duration {
        self.cart_timeout
    }

    /// Absolute URL for a path (and optional query) on the upstream host.
    pub fn upstream_url(&self, path: &str) -> Result<Url, UpstreamError> {
        Ok(self.base_url.join(path)?)
    }

    fn resolve_url(&self, request: &UpstreamRequest) -> Result<Url, UpstreamError> {
        let mut url = match &request.target {
            Target::Upstream(path) => self.upstream_url(path)?,
            Target::External(url) => url.clone(),
        };
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        Ok(url)
    }

    /// Issues the call and returns the unbuffered response.
    ///
    /// `endpoint` labels the metrics and log lines.
    pub async fn send_streaming(
        &self,
        endpoint: &'static str,
        request: UpstreamRequest,
    ) -> Result<reqwest::Response, UpstreamError> {
        let url = self.resolve_url(&request)?;
        let timeout = request.timeout.unwrap_or(self.default_timeout);
        let started = Instant::now();

        let mut builder = self
            .http
            .request(request.method.clone(), url.clone())
            .timeout(timeout);
        if let Some(accept) = request.accept {
            builder = builder.header(header::ACCEPT, accept);
        }

        for (name, value) in &request.forward_headers {
            match (
                HeaderName::try_from(name.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                (Ok(name), Ok(value)) => builder = builder.header(name, value),
                _ => tracing::debug!(header = %name, "Skipping unforwardable header"),
            }
        }
        if let Some(cookie) = request.cookie_header() {
            builder = builder.header(header::COOKIE, cookie);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        } else if let Some(raw) = &request.raw_body {
            builder = builder.body(raw.clone());
        }

        tracing::debug!(
            endpoint,
            method = %request.method,
            url = %url,
            timeout_ms = timeout.as_millis() as u64,
            "Calling upstream"
        );

        match builder.send().await {
            Ok(response) => {
                metrics::record_upstream(endpoint, response.status().as_u16(), started);
                Ok(response)
            }
            Err(e) => {
                metrics::record_upstream_failure(endpoint, started);
                Err(classify(e, timeout))
            }
        }
    }

    /// Issues the call and buffers the whole body.
    pub async fn send(
        &self,
        endpoint: &'static str,
        request: UpstreamRequest,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let timeout = request.timeout.unwrap_or(self.default_timeout);
        let response = self.send_streaming(endpoint, request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| classify(e, timeout))?;

        tracing::debug!(
            endpoint,
            status = status.as_u16(),
            bytes = body.len(),
            "Upstream responded"
        );

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}

fn classify(error: reqwest::Error, timeout: Duration) -> UpstreamError {
    if error.is_timeout() {
        UpstreamError::Timeout(timeout)
    } else {
        UpstreamError::Transport(error)
    }
}
