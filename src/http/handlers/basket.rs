//! Wishlist and basket endpoints.
//!
//! # Responsibilities
//! - Guard cart mutations on identity, basket and article code
//! - Resolve the session from body, query or headers per endpoint
//! - Stream the project PDF export
//!
//! # Design Decisions
//! - Cart mutations never reach upstream without a real basket id
//! - The PDF export reads identity and basket from the cookie only

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use serde_json::{json, Value};

use crate::http::handlers::{require, set_header, stream_response, AppState};
use crate::http::request::{favorites_field, field, header_value, query_param, JsonBody};
use crate::http::response::{GatewayError, JsonWithCookies};
use crate::routing::table;
use crate::session::{is_sentinel, FavoriteCountries, SessionPatch};
use crate::upstream::request::ACCEPT_PDF;
use crate::upstream::{UpstreamError, UpstreamRequest};

/// Header some clients use to send favorites on basket reads.
const FAVORITES_HEADER: &str = "x-spaysfav";
/// Header carrying favorites on country selection.
const PAYS_FAV_HEADER: &str = "x-pays-fav";

/// Identity and basket ids carried in a JSON body.
fn body_ids(body: &Value) -> SessionPatch {
    SessionPatch::default()
        .with_identity(field(body, "iProfile").unwrap_or_default())
        .with_basket_id(field(body, "iBasket").unwrap_or_default())
}

/// `POST /api/add-product-to-wishlist`
///
/// The body is forwarded as-is; the session is taken from it first.
pub async fn wishlist_add(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(body): JsonBody,
) -> Result<JsonWithCookies, GatewayError> {
    let endpoint = &table::WISHLIST_ADD;
    require(endpoint, &[("sCodeArticle", field(&body, "sCodeArticle").is_some())])?;

    let explicit = SessionPatch::default()
        .with_identity(field(&body, "iProfile").unwrap_or_default())
        .with_basket_id(field(&body, "currenentibasket").unwrap_or_default())
        .with_country_language(field(&body, "sPaysLangue").unwrap_or_default())
        .with_favorite_countries(favorites_field(&body, "sPaysFav"));
    let session = state.resolve(endpoint, &headers, explicit);

    let request = UpstreamRequest::post(endpoint.upstream_path)
        .session(state.cookie(), &session)
        .json(body);
    state.relay(endpoint, &session, request).await
}

/// `GET /api/get-basket-list-article`
pub async fn basket_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Result<JsonWithCookies, GatewayError> {
    let endpoint = &table::BASKET_LIST;
    let favorites = header_value(&headers, FAVORITES_HEADER)
        .or_else(|| query_param(&query, "sPaysFav"))
        .map(FavoriteCountries::parse_delimited)
        .unwrap_or_default();
    let explicit = SessionPatch::default()
        .with_identity(query_param(&query, "iProfile").unwrap_or_default())
        .with_basket_id(query_param(&query, "iBasket").unwrap_or_default())
        .with_favorite_countries(favorites);
    let session = state.resolve(endpoint, &headers, explicit);

    let action = query_param(&query, "sAction")
        .or_else(|| query_param(&query, "action"))
        .unwrap_or_default();
    let request = UpstreamRequest::get(endpoint.upstream_path)
        .query_if_present("iProfile", &session.identity)
        .query_if_present("iBasket", &session.basket_id)
        .query_if_present("sAction", action)
        .session(state.cookie(), &session);
    state.relay(endpoint, &session, request).await
}

/// `GET /api/get-infos-status`
pub async fn infos_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Result<JsonWithCookies, GatewayError> {
    let endpoint = &table::INFOS_STATUS;
    let explicit =
        SessionPatch::default().with_identity(query_param(&query, "iProfile").unwrap_or_default());
    let session = state.resolve(endpoint, &headers, explicit);

    let request = UpstreamRequest::get(endpoint.upstream_path).session(state.cookie(), &session);
    state.relay(endpoint, &session, request).await
}

/// `POST /api/delete-article-wishlistBasket`
pub async fn wishlist_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(body): JsonBody,
) -> Result<JsonWithCookies, GatewayError> {
    let endpoint = &table::WISHLIST_DELETE;
    let code = field(&body, "sCodeArticle");
    let session = state.resolve(endpoint, &headers, body_ids(&body));
    require(
        endpoint,
        &[
            ("sCodeArticle", code.is_some()),
            ("iProfile", !is_sentinel(&session.identity)),
            ("iBasket", !is_sentinel(&session.basket_id)),
        ],
    )?;

    let request = UpstreamRequest::post(endpoint.upstream_path)
        .session(state.cookie(), &session)
        .json(json!({ "sCodeArticle": code }));
    state.relay(endpoint, &session, request).await
}

/// `POST /api/update-country-wishlistBasket`
///
/// `sPaysListe` replaces the session's favorites.
pub async fn wishlist_countries(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(body): JsonBody,
) -> Result<JsonWithCookies, GatewayError> {
    let endpoint = &table::WISHLIST_COUNTRIES;
    let countries = favorites_field(&body, "sPaysListe");
    let mut session = state.resolve(endpoint, &headers, body_ids(&body));
    require(
        endpoint,
        &[
            ("iBasket", !is_sentinel(&session.basket_id)),
            ("sPaysListe", !countries.is_empty()),
        ],
    )?;

    session.favorite_countries = countries.clone();
    let request = UpstreamRequest::post(endpoint.upstream_path)
        .session(state.cookie(), &session)
        .json(json!({ "sPaysListe": countries.to_delimited() }));
    state.relay(endpoint, &session, request).await
}

/// `POST /api/update-quantity-articleBasket`
pub async fn basket_quantity(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(body): JsonBody,
) -> Result<JsonWithCookies, GatewayError> {
    let endpoint = &table::BASKET_QUANTITY;
    let code = field(&body, "sCodeArticle");
    let quantity = body.get("iQte").filter(|v| !v.is_null()).cloned();
    let session = state.resolve(endpoint, &headers, body_ids(&body));
    require(
        endpoint,
        &[
            ("sCodeArticle", code.is_some()),
            ("iQte", quantity.is_some()),
            ("iProfile", !is_sentinel(&session.identity)),
            ("iBasket", !is_sentinel(&session.basket_id)),
        ],
    )?;

    let request = UpstreamRequest::post(endpoint.upstream_path)
        .session(state.cookie(), &session)
        .json(json!({ "sCodeArticle": code, "iQte": quantity }));
    state.relay(endpoint, &session, request).await
}

/// `POST /api/update-country-selected`
pub async fn country_selected(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(body): JsonBody,
) -> Result<JsonWithCookies, GatewayError> {
    let endpoint = &table::COUNTRY_SELECTED;
    let basket = field(&body, "iBasket");
    let code = field(&body, "sCodeArticle");
    let country = field(&body, "sNewPaysSelected");
    require(
        endpoint,
        &[
            ("iBasket", basket.as_deref().is_some_and(|id| !is_sentinel(id))),
            ("sCodeArticle", code.is_some()),
            ("sNewPaysSelected", country.is_some()),
        ],
    )?;

    let favorites = header_value(&headers, PAYS_FAV_HEADER)
        .map(FavoriteCountries::parse_delimited)
        .unwrap_or_default();
    let explicit = body_ids(&body).with_favorite_countries(favorites);
    let session = state.resolve(endpoint, &headers, explicit);

    let request = UpstreamRequest::post(endpoint.upstream_path)
        .session(state.cookie(), &session)
        .json(json!({
            "iProfile": session.identity,
            "iBasket": session.basket_id,
            "sCodeArticle": code,
            "sNewPaysSelected": country,
            "sAction": "CHANGEPAYS",
        }));
    state.relay(endpoint, &session, request).await
}

/// `GET /api/projet-download`
///
/// Streams the PDF when upstream produces one; an empty JSON array means
/// the basket is empty.
pub async fn project_download(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, GatewayError> {
    let endpoint = &table::PROJECT_DOWNLOAD;
    let session = state.resolve(endpoint, &headers, SessionPatch::default());
    require(
        endpoint,
        &[
            ("iProfile", !is_sentinel(&session.identity)),
            ("iBasket", !is_sentinel(&session.basket_id)),
        ],
    )?;

    let request = UpstreamRequest::get(endpoint.upstream_path)
        .accept(ACCEPT_PDF)
        .session(state.cookie(), &session);
    let response = state.call_streaming(endpoint, request).await?;
    let status = response.status();

    let is_pdf = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains(ACCEPT_PDF));
    if status.is_success() && is_pdf {
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| format!("attachment; filename=\"projet_{}.pdf\"", session.basket_id));

        tracing::info!(basket_id = %session.basket_id, "Streaming project PDF");
        let mut out = stream_response(response, false);
        set_header(&mut out, header::CONTENT_DISPOSITION, &disposition);
        set_header(&mut out, header::CACHE_CONTROL, "no-cache");
        return Ok(out);
    }

    let body = response.bytes().await.map_err(UpstreamError::Transport)?;
    let text = String::from_utf8_lossy(&body);
    if !status.is_success() {
        return Err(GatewayError::upstream_status(status, &text));
    }
    Err(classify_non_pdf(&text))
}

/// Maps a 2xx non-PDF export body to the client error.
fn classify_non_pdf(text: &str) -> GatewayError {
    if text.trim() == "[]" {
        return GatewayError::EmptyBasket;
    }
    match serde_json::from_str::<Value>(text) {
        Ok(details) => {
            let message = ["message", "statusMessage"]
                .iter()
                .find_map(|key| details.get(key).and_then(Value::as_str))
                .unwrap_or("Upstream returned an error instead of a PDF")
                .to_string();
            GatewayError::UpstreamRejected {
                status: StatusCode::BAD_REQUEST,
                message,
                details,
            }
        }
        Err(_) => GatewayError::InvalidUpstreamResponse {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            raw: text.to_string(),
        },
    }
}
