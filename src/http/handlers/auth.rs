//! Authentication flows.
//!
//! # Responsibilities
//! - Profile initialization with client-owned locale correction
//! - Credential-code and magic-link login with session rotation
//! - Logout with fresh anonymous identifiers
//! - OAuth redirects to upstream and back to the client app
//!
//! # Data Flow
//! ```text
//! login-with-code:
//!     session (header → cookie, "0" placeholder)
//!     → xXml fragment → upstream
//!     → Reconciler (rotation, locale correction)
//!     → ProfileEnricher (best effort)
//!     → body + GuestProfile / Guest_basket_init cookies
//! ```
//!
//! # Design Decisions
//! - Passwords and codes are never logged
//! - Enrichment failure never fails the login

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use cookie::Cookie;
use serde_json::{json, Map, Value};

use crate::http::handlers::{require, AppState};
use crate::http::request::{favorites_field, field, field_or_default, query_param, JsonBody};
use crate::http::response::{GatewayError, JsonWithCookies};
use crate::observability::metrics;
use crate::reconcile::{identifier_value, ProfileEnricher, Reconciled};
use crate::routing::{table, Endpoint};
use crate::session::model::FavoriteShape;
use crate::session::{is_sentinel, GuestSession, SessionPatch};
use crate::upstream::xml::LoginFragment;
use crate::upstream::UpstreamRequest;

/// Cookie the web client reads to pick up the basket after login.
const BASKET_INIT_COOKIE: &str = "Guest_basket_init";
/// Cookie remembering where to return after a magic link.
const CALLBACK_URL_COOKIE: &str = "callback_url";

/// `POST /api/auth/init`
///
/// Upstream is called without a session cookie; the locale the client sent
/// wins over the one upstream echoes back.
pub async fn init(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(body): JsonBody,
) -> Result<JsonWithCookies, GatewayError> {
    let endpoint = &table::AUTH_INIT;
    let explicit = SessionPatch::default()
        .with_country_language(field_or_default(&body, "sPaysLangue"))
        .with_favorite_countries(favorites_field(&body, "sPaysFav"));
    let session = state.resolve(endpoint, &headers, explicit);

    let request = UpstreamRequest::post(endpoint.upstream_path).json(init_document(&body));
    state.relay(endpoint, &session, request).await
}

fn init_document(body: &Value) -> Value {
    let mut doc = Map::new();
    doc.insert(
        "sPaysLangue".into(),
        Value::String(field_or_default(body, "sPaysLangue")),
    );
    // Upstream accepts either shape; keep the one the client used.
    let shape = if body.get("sPaysFav").is_some_and(Value::is_array) {
        FavoriteShape::List
    } else {
        FavoriteShape::Delimited
    };
    doc.insert(
        "sPaysFav".into(),
        serde_json::to_value(favorites_field(body, "sPaysFav").to_wire(shape))
            .unwrap_or_default(),
    );
    doc.insert(
        "bGeneralConditionAgree".into(),
        Value::Bool(
            body.get("bGeneralConditionAgree")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        ),
    );
    for key in ["iUserIp", "iBrowser", "iDevice", "iPlatform", "iUserAgent"] {
        doc.insert(key.into(), Value::String(field_or_default(body, key)));
    }
    Value::Object(doc)
}

/// `POST /api/auth/login-with-code`
///
/// An empty `password` requests a code; a non-empty one validates it.
pub async fn login_with_code(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(body): JsonBody,
) -> Result<JsonWithCookies, GatewayError> {
    let endpoint = &table::LOGIN_WITH_CODE;
    let email = field(&body, "email");
    require(endpoint, &[("email", email.is_some())])?;
    let email = email.unwrap_or_default();
    let code = body
        .get("password")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let validating = !code.trim().is_empty();
    let language = field(&body, "sLangue").unwrap_or_else(|| "fr".to_string());

    let session = state.resolve(endpoint, &headers, SessionPatch::default());
    let xml = LoginFragment {
        session: &session,
        email: &email,
        code,
        current_language: &language,
    }
    .render();

    tracing::info!(identity = %session.identity, validating, "Login with code");
    let request = UpstreamRequest::post(endpoint.upstream_path)
        .session(state.cookie(), &session)
        .json(json!({
            "email": email,
            "sLangue": language,
            "password": code,
            "xXml": xml,
        }));
    let response = state.call(endpoint, request).await?;
    let mut reconciled = state
        .reconciler
        .reconcile(&endpoint.plan, &session, &response)?;

    let accepted = reconciled.body.get("status").and_then(Value::as_str) == Some("OK");
    if validating && accepted {
        let updated = reconciled.upstream_session.is_some();
        expose_session(&mut reconciled, updated);
        enrich(&state, &mut reconciled, &email).await;
        if !is_sentinel(&reconciled.session.basket_id) {
            reconciled
                .set_cookies
                .push(basket_init_cookie(&reconciled.session.basket_id));
        }
        tracing::info!(
            identity = %reconciled.session.identity,
            basket_id = %reconciled.session.basket_id,
            "Code validated"
        );
    }
    Ok(reconciled.into_response())
}

/// `POST /api/auth/login` (magic link)
pub async fn magic_link_login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    JsonBody(body): JsonBody,
) -> Result<JsonWithCookies, GatewayError> {
    let endpoint = &table::MAGIC_LINK_LOGIN;
    let email = field_or_default(&body, "email");
    let password = body
        .get("password")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let session = state.resolve(endpoint, &headers, SessionPatch::default());

    let request = UpstreamRequest::post(endpoint.upstream_path)
        .session(state.cookie(), &session)
        .json(json!({ "email": email, "password": password }));
    let response = state.call(endpoint, request).await?;
    let mut reconciled = state
        .reconciler
        .reconcile(&endpoint.plan, &session, &response)?;

    if !password.is_empty() && reconciled.upstream_session.is_some() {
        expose_session(&mut reconciled, false);
        enrich(&state, &mut reconciled, &email).await;
    }

    let callback = query_param(&query, "callBackUrl")
        .map(str::to_string)
        .or_else(|| field(&body, "callBackUrl"));
    if let Some(callback) = callback {
        reconciled.set_cookies.push(callback_cookie(&callback));
    }
    Ok(reconciled.into_response())
}

/// Copies the reconciled session into the body.
fn expose_session(reconciled: &mut Reconciled, with_rotation_fields: bool) {
    let session = &reconciled.session;
    let Some(body) = reconciled.body.as_object_mut() else {
        return;
    };
    let identity = Value::String(session.identity.clone());
    let basket = Value::String(session.basket_id.clone());
    if with_rotation_fields {
        body.insert("newIProfile".into(), identity.clone());
        body.insert("newIBasket".into(), basket.clone());
    }
    body.insert("iProfile".into(), identity);
    body.insert("iBasket".into(), basket);
    body.insert(
        "sPaysLangue".into(),
        Value::String(session.country_language.clone()),
    );
    body.insert(
        "sPaysFav".into(),
        Value::String(session.favorite_countries.to_delimited()),
    );
}

async fn enrich(state: &AppState, reconciled: &mut Reconciled, email: &str) {
    ProfileEnricher::new(&state.upstream, state.cookie())
        .enrich(
            &reconciled.session,
            reconciled.auth_token.as_deref(),
            email,
            &mut reconciled.body,
        )
        .await;
}

fn basket_init_cookie(basket_id: &str) -> String {
    let value = json!({ "iBasket": basket_id }).to_string();
    Cookie::build((BASKET_INIT_COOKIE, urlencoding::encode(&value).into_owned()))
        .path("/")
        .max_age(cookie::time::Duration::days(365))
        .http_only(false)
        .build()
        .to_string()
}

fn callback_cookie(url: &str) -> String {
    Cookie::build((CALLBACK_URL_COOKIE, urlencoding::encode(url).into_owned()))
        .path("/")
        .max_age(cookie::time::Duration::days(10))
        .http_only(false)
        .build()
        .to_string()
}

/// `POST /api/auth/disconnect`
///
/// Upstream answers with fresh anonymous ids; the client keeps its locale.
pub async fn disconnect(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<JsonWithCookies, GatewayError> {
    let endpoint = &table::DISCONNECT;
    let session = state.resolve(endpoint, &headers, SessionPatch::default());

    let request = UpstreamRequest::post(endpoint.upstream_path).session(state.cookie(), &session);
    let response = state.call(endpoint, request).await?;
    state.reconciler.check_status(&response)?;
    let data = state.reconciler.parse_body(&endpoint.plan, &response)?;

    let mut set_cookies: Vec<String> = response
        .set_cookies()
        .into_iter()
        .filter(|line| !state.cookie().is_session_set_cookie(line))
        .collect();

    let succeeded = data.get("success").and_then(Value::as_bool) == Some(true);
    let identity = data.get("iProfile").and_then(identifier_value).unwrap_or_default();
    let basket_id = data.get("iBasket").and_then(identifier_value).unwrap_or_default();

    if !(succeeded && !identity.is_empty() && !basket_id.is_empty()) {
        tracing::warn!(succeeded, "Logout did not return new identifiers");
        return Ok(JsonWithCookies::ok(json!({
            "success": false,
            "message": "Logout incomplete",
            "data": data,
        }))
        .with_cookies(set_cookies));
    }

    let next = GuestSession::new(
        identity.clone(),
        basket_id.clone(),
        session.country_language.clone(),
        session.favorite_countries.clone(),
    );
    metrics::record_rotation(endpoint.name);
    tracing::info!(
        previous_identity = %session.identity,
        identity = %next.identity,
        basket_id = %next.basket_id,
        "Logged out"
    );
    set_cookies.push(state.cookie().set_cookie(&next));
    Ok(JsonWithCookies::ok(json!({
        "success": true,
        "iProfile": identity,
        "iBasket": basket_id,
        "message": "Logged out",
    }))
    .with_cookies(set_cookies))
}

/// 302 to `location`.
fn found(location: &str) -> Response {
    match header::HeaderValue::try_from(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(e) => GatewayError::InvalidInput(format!("invalid redirect target: {e}")).into_response(),
    }
}

fn upstream_redirect(state: &AppState, endpoint: &Endpoint) -> Result<Response, GatewayError> {
    let url = state.upstream.upstream_url(endpoint.path)?;
    tracing::info!(endpoint = endpoint.name, location = %url, "Redirecting to upstream OAuth");
    Ok(found(url.as_str()))
}

/// `GET /api/auth/google-mobile`
pub async fn google_oauth(State(state): State<AppState>) -> Result<Response, GatewayError> {
    upstream_redirect(&state, &table::GOOGLE_OAUTH)
}

/// `GET /api/auth/facebook`
pub async fn facebook_oauth(State(state): State<AppState>) -> Result<Response, GatewayError> {
    upstream_redirect(&state, &table::FACEBOOK_OAUTH)
}

/// `GET /api/auth/oauth-callback`
pub async fn oauth_callback(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let provider = query_param(&query, "provider").unwrap_or("unknown");
    let error = query_param(&query, "error");
    let succeeded = query_param(&query, "success") == Some("true") || error.is_none();
    let client = state.config.client_app.url.trim_end_matches('/');

    let location = if succeeded {
        success_location(client, provider)
    } else {
        format!(
            "{client}/#/login?oauth=error&provider={}&error={}",
            urlencoding::encode(provider),
            urlencoding::encode(error.unwrap_or("unknown"))
        )
    };
    found(&location)
}

/// `GET /api/auth/oauth-success`
pub async fn oauth_success(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let provider = query_param(&query, "provider").unwrap_or("unknown");
    let client = state.config.client_app.url.trim_end_matches('/');
    found(&success_location(client, provider))
}

fn success_location(client: &str, provider: &str) -> String {
    format!(
        "{client}/#/home?oauth=success&provider={}",
        urlencoding::encode(provider)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::FavoriteCountries;

    #[test]
    fn init_document_fills_defaults() {
        let doc = init_document(&json!({ "sPaysLangue": "BE/FR", "sPaysFav": ["BE"] }));
        assert_eq!(doc["sPaysLangue"], "BE/FR");
        assert_eq!(doc["sPaysFav"], json!(["BE"]));
        assert_eq!(doc["bGeneralConditionAgree"], false);
        assert_eq!(doc["iUserAgent"], "");
    }

    #[test]
    fn basket_init_cookie_carries_encoded_json() {
        let line = basket_init_cookie("B9");
        assert!(line.starts_with("Guest_basket_init=%7B%22iBasket%22%3A%22B9%22%7D"));
        assert!(line.contains("Path=/"));
        assert!(line.contains("Max-Age=31536000"));
    }

    #[test]
    fn exposes_rotated_session() {
        let session = GuestSession::new("P2", "B2", "BE/FR", FavoriteCountries::new(["BE", "FR"]));
        let mut reconciled = Reconciled {
            body: json!({ "status": "OK" }),
            session: session.clone(),
            upstream_session: Some(session),
            rotated: true,
            set_cookies: Vec::new(),
            auth_token: None,
        };
        expose_session(&mut reconciled, true);
        assert_eq!(reconciled.body["newIProfile"], "P2");
        assert_eq!(reconciled.body["iBasket"], "B2");
        assert_eq!(reconciled.body["sPaysFav"], "BE,FR");
    }

    #[test]
    fn success_location_encodes_provider() {
        assert_eq!(
            success_location("http://localhost:3000", "google oauth"),
            "http://localhost:3000/#/home?oauth=success&provider=google%20oauth"
        );
    }
}
