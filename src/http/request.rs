//! Request handling helpers.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) and echo it on the response
//! - Read JSON bodies leniently (missing body reads as `{}`)
//! - Pull string, identifier and favorites fields out of loosely typed input
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Body fields accept strings or numbers since clients are not consistent

use std::collections::HashMap;

use axum::extract::{FromRequest, Request};
use axum::http::{header, HeaderMap, HeaderName};
use bytes::Bytes;
use cookie::Cookie;
use serde_json::Value;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::http::response::GatewayError;
use crate::reconcile::identifier_value;
use crate::session::model::FavoriteCountriesWire;
use crate::session::FavoriteCountries;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Layers that set a request ID when absent and copy it to the response.
pub fn request_id_layers() -> (SetRequestIdLayer<MakeRequestUuid>, PropagateRequestIdLayer) {
    let header_name = HeaderName::from_static(X_REQUEST_ID);
    (
        SetRequestIdLayer::new(header_name.clone(), MakeRequestUuid),
        PropagateRequestIdLayer::new(header_name),
    )
}

/// Extension trait for extracting the request ID from headers.
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&str>;
}

impl RequestIdExt for HeaderMap {
    fn request_id(&self) -> Option<&str> {
        self.get(X_REQUEST_ID)?.to_str().ok()
    }
}

/// A JSON request body where an empty body means `{}`.
#[derive(Debug, Clone)]
pub struct JsonBody(pub Value);

impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| GatewayError::InvalidInput(e.body_text()))?;
        parse_json_body(&bytes).map(JsonBody)
    }
}

fn parse_json_body(bytes: &[u8]) -> Result<Value, GatewayError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_slice(bytes)
        .map_err(|e| GatewayError::InvalidInput(format!("request body is not valid JSON: {e}")))
}

/// A trimmed, non-empty string or number field of a JSON body.
pub fn field(body: &Value, key: &str) -> Option<String> {
    body.get(key)
        .and_then(identifier_value)
        .filter(|value| !value.is_empty())
}

/// A string field, or the empty string.
pub fn field_or_default(body: &Value, key: &str) -> String {
    field(body, key).unwrap_or_default()
}

/// A favorites field given as a list or a comma separated string.
pub fn favorites_field(body: &Value, key: &str) -> FavoriteCountries {
    body.get(key)
        .cloned()
        .and_then(|value| serde_json::from_value::<FavoriteCountriesWire>(value).ok())
        .map(FavoriteCountries::from)
        .unwrap_or_default()
}

/// A trimmed, non-empty query parameter.
pub fn query_param<'a>(query: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    query
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

/// A trimmed, non-empty header value.
pub fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// The `name=value` pair of an inbound cookie, if the client sent one.
pub fn request_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|line| Cookie::split_parse(line.to_string()))
        .filter_map(Result::ok)
        .find(|c| c.name() == name)
        .map(|c| format!("{}={}", c.name(), c.value()))
}
