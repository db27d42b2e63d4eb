//! Store locator, map tiles, geocoding and image passthroughs.
//!
//! Apart from the store list these talk to third-party hosts and carry no
//! session.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::Response;
use url::Url;

use crate::http::handlers::{require, set_header, stream_response, AppState};
use crate::http::request::query_param;
use crate::http::response::{GatewayError, JsonWithCookies};
use crate::routing::{table, Endpoint};
use crate::session::{is_sentinel, SessionPatch};
use crate::upstream::request::ACCEPT_IMAGE;
use crate::upstream::{UpstreamError, UpstreamRequest};

/// Cache lifetime for tiles and images.
const IMAGE_CACHE_CONTROL: &str = "public, max-age=86400";
/// Some image hosts refuse non-browser agents.
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// `GET /api/get-ikea-store-list?lat=&lng=`
///
/// The client's own cookies are forwarded; the session cookie is added
/// from the identity header only when the client did not send one.
pub async fn store_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Result<JsonWithCookies, GatewayError> {
    let endpoint = &table::STORE_LIST;
    let session = state.resolve(endpoint, &headers, SessionPatch::default());

    let mut request = UpstreamRequest::get(endpoint.upstream_path)
        .query("lat", query.get("lat").map(String::as_str).unwrap_or_default())
        .query("lng", query.get("lng").map(String::as_str).unwrap_or_default());
    if !is_sentinel(&session.identity) && state.cookie().from_request_headers(&headers).is_none() {
        request = request.session(state.cookie(), &session);
    }
    for line in headers.get_all(header::COOKIE) {
        if let Ok(line) = line.to_str() {
            request = request.cookie(line.trim());
        }
    }
    state.relay(endpoint, &session, request).await
}

/// A validated `{z}/{x}/{y}.{ext}` tile address.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TileAddress {
    z: String,
    x: String,
    y: String,
    ext: String,
}

impl TileAddress {
    fn parse(z: String, x: String, tile: &str) -> Option<Self> {
        let (y, ext) = tile.split_once('.')?;
        let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        let valid_ext = !ext.is_empty() && ext.bytes().all(|b| b.is_ascii_alphanumeric());
        (digits(&z) && digits(&x) && digits(y) && valid_ext).then(|| Self {
            z,
            x,
            y: y.to_string(),
            ext: ext.to_string(),
        })
    }

    fn render(&self, template: &str) -> String {
        template
            .replace("{z}", &self.z)
            .replace("{x}", &self.x)
            .replace("{y}", &self.y)
            .replace("{ext}", &self.ext)
    }
}

/// `GET /api/tiles/{z}/{x}/{y}.{ext}?style=`
pub async fn tiles(
    State(state): State<AppState>,
    Path((z, x, tile)): Path<(String, String, String)>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response, GatewayError> {
    let endpoint = &table::MAP_TILES;
    let address = TileAddress::parse(z, x, &tile)
        .ok_or_else(|| GatewayError::InvalidInput(format!("invalid tile address: {tile}")))?;

    let geo = &state.config.geo;
    let template = query_param(&query, "style")
        .and_then(|style| geo.tile_styles.get(style))
        .or_else(|| geo.tile_styles.get(&geo.default_tile_style))
        .ok_or_else(|| GatewayError::InvalidInput("no tile style configured".to_string()))?;
    let url = Url::parse(&address.render(template)).map_err(UpstreamError::from)?;

    let request = UpstreamRequest::external(url).accept(ACCEPT_IMAGE);
    image_passthrough(&state, endpoint, request, "image/png").await
}

/// `GET /api/nominatim/search?q=&limit=`
pub async fn geocoding(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<JsonWithCookies, GatewayError> {
    let endpoint = &table::GEOCODING;
    let q = query_param(&query, "q");
    require(endpoint, &[("q", q.is_some())])?;

    let url = Url::parse(&state.config.geo.geocoding_url).map_err(UpstreamError::from)?;
    let request = UpstreamRequest::external(url)
        .query("format", "json")
        .query("q", q.unwrap_or_default())
        .query("limit", query_param(&query, "limit").unwrap_or("5"));
    let response = state.call(endpoint, request).await?;
    state.reconciler.check_status(&response)?;
    let body = state.reconciler.parse_body(&endpoint.plan, &response)?;
    Ok(JsonWithCookies::ok(body))
}

/// `GET /proxy-image?url=`
///
/// Relative URLs are resolved against the upstream host.
pub async fn proxy_image(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response, GatewayError> {
    let endpoint = &table::IMAGE_PROXY;
    let raw = query_param(&query, "url");
    require(endpoint, &[("url", raw.is_some())])?;
    let url = image_url(&state, raw.unwrap_or_default())?;

    let request = UpstreamRequest::external(url)
        .accept(ACCEPT_IMAGE)
        .header(header::USER_AGENT.as_str(), BROWSER_USER_AGENT);
    image_passthrough(&state, endpoint, request, "application/octet-stream").await
}

fn image_url(state: &AppState, raw: &str) -> Result<Url, GatewayError> {
    if raw.starts_with('/') {
        return Ok(state.upstream.upstream_url(raw)?);
    }
    let url = Url::parse(raw)
        .map_err(|e| GatewayError::InvalidInput(format!("invalid image URL: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(GatewayError::InvalidInput(format!(
            "unsupported image URL scheme: {other}"
        ))),
    }
}

async fn image_passthrough(
    state: &AppState,
    endpoint: &Endpoint,
    request: UpstreamRequest,
    fallback_type: &str,
) -> Result<Response, GatewayError> {
    let response = state.call_streaming(endpoint, request).await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(GatewayError::upstream_status(status, &body));
    }

    let has_type = response.headers().contains_key(header::CONTENT_TYPE);
    let mut out = stream_response(response, false);
    if !has_type {
        set_header(&mut out, header::CONTENT_TYPE, fallback_type);
    }
    set_header(&mut out, header::CACHE_CONTROL, IMAGE_CACHE_CONTROL);
    Ok(out)
}
