//! Product comparison, search and flags.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::HeaderMap;

use crate::http::handlers::{require, AppState};
use crate::http::request::query_param;
use crate::http::response::{GatewayError, JsonWithCookies};
use crate::routing::table;
use crate::session::SessionPatch;
use crate::upstream::UpstreamRequest;

/// `GET /api/comparaison-by-code-30041025`
///
/// Identity and basket travel only in the cookie; the query carries the
/// article code and quantity.
pub async fn product_comparison(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Result<JsonWithCookies, GatewayError> {
    let endpoint = &table::PRODUCT_COMPARISON;
    let code = query_param(&query, "sCodeArticle");
    require(endpoint, &[("sCodeArticle", code.is_some())])?;

    let explicit = SessionPatch::default()
        .with_identity(query_param(&query, "iProfile").unwrap_or_default())
        .with_basket_id(query_param(&query, "iBasket").unwrap_or_default());
    let session = state.resolve(endpoint, &headers, explicit);

    let request = UpstreamRequest::get(endpoint.upstream_path)
        .query("sCodeArticle", code.unwrap_or_default())
        .query("iQuantite", query_param(&query, "iQuantite").unwrap_or("1"))
        .session(state.cookie(), &session);
    state.relay(endpoint, &session, request).await
}

/// `GET /api/search-article`
///
/// The `token` query parameter, when present, is the caller's identity.
pub async fn search_article(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Result<JsonWithCookies, GatewayError> {
    let endpoint = &table::SEARCH_ARTICLE;
    let search = query_param(&query, "search");
    require(endpoint, &[("search", search.is_some())])?;

    let explicit =
        SessionPatch::default().with_identity(query_param(&query, "token").unwrap_or_default());
    let session = state.resolve(endpoint, &headers, explicit);

    let request = UpstreamRequest::get(endpoint.upstream_path)
        .query("search", search.unwrap_or_default())
        .query("limit", query_param(&query, "limit").unwrap_or("10"))
        .session(state.cookie(), &session);
    state.relay(endpoint, &session, request).await
}

/// `GET /api/flags`
pub async fn flags(State(state): State<AppState>) -> Result<JsonWithCookies, GatewayError> {
    let endpoint = &table::FLAGS;
    let response = state
        .call(endpoint, UpstreamRequest::get(endpoint.upstream_path))
        .await?;
    state.reconciler.check_status(&response)?;
    let body = state.reconciler.parse_body(&endpoint.plan, &response)?;
    Ok(JsonWithCookies::ok(body))
}
