//! Response handling and error mapping.
//!
//! # Responsibilities
//! - Map gateway failures to HTTP status codes
//! - Render the `{success:false, error, message, details?}` envelope
//! - Attach `Set-Cookie` lines to successful JSON responses
//!
//! # Design Decisions
//! - Client input errors are 400 and never reach upstream
//! - Upstream non-2xx statuses pass through unchanged
//! - Transport failures and timeouts are 500

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;

use crate::upstream::UpstreamError;

/// Any failure the gateway reports to the client.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Required request fields are absent.
    #[error("{0}")]
    MissingField(String),

    /// The request is present but unusable.
    #[error("{0}")]
    InvalidInput(String),

    /// No session at all where one is required.
    #[error("{0}")]
    Unauthenticated(String),

    /// Upstream answered with a non-success status.
    #[error("upstream returned {status}")]
    UpstreamStatus { status: StatusCode, details: Value },

    /// Upstream answered 2xx with a body that is not the expected JSON.
    #[error("invalid upstream response")]
    InvalidUpstreamResponse { status: StatusCode, raw: String },

    /// Upstream returned a JSON error where a document was expected.
    #[error("{message}")]
    UpstreamRejected {
        status: StatusCode,
        message: String,
        details: Value,
    },

    /// Nothing to export for an empty basket.
    #[error("basket is empty")]
    EmptyBasket,

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl GatewayError {
    pub fn missing(message: impl Into<String>) -> Self {
        Self::MissingField(message.into())
    }

    /// Builds an upstream-status error, embedding the raw body as JSON when it parses.
    pub fn upstream_status(status: StatusCode, body: &str) -> Self {
        let details = serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()));
        Self::UpstreamStatus { status, details }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingField(_) | Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::UpstreamStatus { status, .. }
            | Self::InvalidUpstreamResponse { status, .. }
            | Self::UpstreamRejected { status, .. } => *status,
            Self::EmptyBasket => StatusCode::NOT_FOUND,
            Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The JSON envelope returned to the client.
    pub fn envelope(&self) -> Value {
        let (error, details) = match self {
            Self::MissingField(_) => ("Missing parameters", None),
            Self::InvalidInput(_) => ("Invalid request", None),
            Self::Unauthenticated(_) => ("Not authenticated", None),
            Self::UpstreamStatus { details, .. } => ("Upstream API error", Some(details.clone())),
            Self::InvalidUpstreamResponse { raw, .. } => {
                ("Invalid JSON response from upstream", Some(Value::String(raw.clone())))
            }
            Self::UpstreamRejected { details, .. } => ("Upstream API error", Some(details.clone())),
            Self::EmptyBasket => ("Empty basket", None),
            Self::Upstream(e) => ("Upstream request failed", Some(Value::String(error_chain(e)))),
        };

        let message = match self {
            Self::UpstreamStatus { status, .. } => format!(
                "Error {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            ),
            Self::EmptyBasket => "No article in the basket to export".to_string(),
            other => other.to_string(),
        };

        let mut body = json!({
            "success": false,
            "error": error,
            "message": message,
        });
        if let Some(details) = details {
            body["details"] = details;
        }
        body
    }
}

/// The error and its causes, without repeating text a parent already shows.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut parts = vec![error.to_string()];
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !parts.iter().any(|part| part.contains(&text)) {
            parts.push(text);
        }
        source = cause.source();
    }
    parts.join(": ")
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self, "Request rejected");
        }
        (status, Json(self.envelope())).into_response()
    }
}

/// A JSON body with the `Set-Cookie` lines to hand back.
#[derive(Debug, Clone)]
pub struct JsonWithCookies {
    pub status: StatusCode,
    pub body: Value,
    pub set_cookies: Vec<String>,
}

impl JsonWithCookies {
    pub fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
            set_cookies: Vec::new(),
        }
    }

    pub fn with_cookies(mut self, set_cookies: Vec<String>) -> Self {
        self.set_cookies = set_cookies;
        self
    }
}

impl IntoResponse for JsonWithCookies {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body)).into_response();
        let headers = response.headers_mut();
        for line in self.set_cookies {
            match HeaderValue::try_from(line) {
                Ok(value) => {
                    headers.append(header::SET_COOKIE, value);
                }
                Err(e) => tracing::warn!(error = %e, "Dropping unrepresentable Set-Cookie line"),
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_is_bad_request() {
        let err = GatewayError::missing("sCodeArticle is required");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.envelope(),
            json!({
                "success": false,
                "error": "Missing parameters",
                "message": "sCodeArticle is required",
            })
        );
    }

    #[test]
    fn transport_failure_carries_details() {
        let err = GatewayError::from(UpstreamError::Timeout(std::time::Duration::from_secs(1)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = err.envelope();
        assert_eq!(body["error"], "Upstream request failed");
        assert_eq!(body["details"], "upstream did not respond within 1s");
    }

    #[test]
    fn upstream_status_passes_through_with_details() {
        let err = GatewayError::upstream_status(StatusCode::NOT_FOUND, r#"{"reason":"gone"}"#);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        let body = err.envelope();
        assert_eq!(body["details"], json!({ "reason": "gone" }));
        assert_eq!(body["message"], "Error 404: Not Found");
    }

    #[test]
    fn plain_text_details_stay_text() {
        let err = GatewayError::upstream_status(StatusCode::BAD_GATEWAY, "oops");
        assert_eq!(err.envelope()["details"], "oops");
    }

    #[test]
    fn set_cookie_lines_are_appended() {
        let response = JsonWithCookies::ok(json!({}))
            .with_cookies(vec!["a=1; Path=/".into(), "b=2".into()])
            .into_response();
        let cookies: Vec<_> = response.headers().get_all(header::SET_COOKIE).iter().collect();
        assert_eq!(cookies.len(), 2);
    }
}
