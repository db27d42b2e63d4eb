//! Generic passthrough for `/api/*` paths without a dedicated handler.
//!
//! # Design Decisions
//! - Method, path, query and body are forwarded unchanged
//! - Hop-by-hop headers are dropped in both directions
//! - No session handling: the client's cookies go through as sent

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::http::handlers::{is_hop_by_hop, stream_response, AppState};
use crate::http::response::GatewayError;
use crate::routing::table;
use crate::upstream::{Target, UpstreamRequest};

/// Label for passthrough metrics and logs.
const PASSTHROUGH: &str = "passthrough";

/// Router fallback.
pub async fn passthrough(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let path = uri.path();
    if !path.starts_with("/api/") {
        return Ok(status_only(StatusCode::NOT_FOUND, "Not found"));
    }
    if table::is_dedicated(path) {
        return Ok(status_only(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"));
    }

    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| path.to_string());
    tracing::debug!(method = %method, target = %target, "Passing request through");

    let mut request = UpstreamRequest::new(method, Target::Upstream(target)).inherit_accept();
    for (name, value) in &headers {
        if forwardable(name) {
            if let Ok(value) = value.to_str() {
                request = request.header(name.as_str(), value);
            }
        }
    }
    if !body.is_empty() {
        request = request.bytes(body);
    }

    let response = state.upstream.send_streaming(PASSTHROUGH, request).await?;
    Ok(stream_response(response, true))
}

fn forwardable(name: &header::HeaderName) -> bool {
    !is_hop_by_hop(name.as_str()) && name != header::HOST && name != header::CONTENT_LENGTH
}

fn status_only(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "success": false, "message": message }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_host_and_framing_headers() {
        assert!(!forwardable(&header::HOST));
        assert!(!forwardable(&header::CONTENT_LENGTH));
        assert!(!forwardable(&header::TRANSFER_ENCODING));
        assert!(forwardable(&header::COOKIE));
        assert!(forwardable(&header::ACCEPT));
    }
}
