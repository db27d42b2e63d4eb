//! Profile read and update.

use axum::extract::State;
use axum::http::HeaderMap;
use serde_json::{json, Value};

use crate::http::handlers::{require, AppState};
use crate::http::request::{field_or_default, request_cookie, JsonBody};
use crate::http::response::{GatewayError, JsonWithCookies};
use crate::reconcile::AUTH_SESSION_COOKIE;
use crate::routing::table;
use crate::session::{is_sentinel, GuestSession, SessionPatch};
use crate::upstream::UpstreamRequest;

/// Maps the client's profile form onto the upstream profile document.
fn profile_document(form: &Value, session: &GuestSession) -> Value {
    json!({
        "sNom": field_or_default(form, "Nom"),
        "sPrenom": field_or_default(form, "Prenom"),
        "sPhoto": "",
        "sRue": field_or_default(form, "rue"),
        "sZip": field_or_default(form, "zip"),
        "sCity": field_or_default(form, "city"),
        "iPays": -1,
        "sTel": field_or_default(form, "tel"),
        "sPaysFav": session.favorite_countries.to_delimited(),
        "sPaysLangue": session.country_language,
        "sEmail": field_or_default(form, "email"),
        "sTypeAccount": "EMAIL",
        "sLangue": session.language().unwrap_or("FR"),
        "iProfile": session.identity,
    })
}

/// `POST /api/profile/update` → `PUT /api/update-info-profil/{identity}`
pub async fn update_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(form): JsonBody,
) -> Result<JsonWithCookies, GatewayError> {
    let endpoint = &table::PROFILE_UPDATE;
    let session = state.resolve(endpoint, &headers, SessionPatch::default());
    require(endpoint, &[("iProfile", !is_sentinel(&session.identity))])?;

    let path = format!(
        "{}/{}",
        endpoint.upstream_path,
        urlencoding::encode(&session.identity)
    );
    tracing::info!(identity = %session.identity, "Updating profile");

    let request = UpstreamRequest::put(path)
        .session(state.cookie(), &session)
        .json(profile_document(&form, &session));
    state.relay(endpoint, &session, request).await
}

/// `GET /api/get-info-profil`
///
/// Identity and basket in the returned document are the caller's, not
/// whatever upstream stored last.
pub async fn profile_info(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<JsonWithCookies, GatewayError> {
    let endpoint = &table::PROFILE_INFO;
    if !state.resolver.carries_session(&headers) {
        return Err(GatewayError::Unauthenticated(
            "No profile found in cookies or headers".to_string(),
        ));
    }
    let session = state.resolve(endpoint, &headers, SessionPatch::default());
    require(endpoint, &[("iProfile", !is_sentinel(&session.identity))])?;

    let mut request = UpstreamRequest::get(endpoint.upstream_path).session(state.cookie(), &session);
    if let Some(token) = request_cookie(&headers, AUTH_SESSION_COOKIE) {
        request = request.cookie(token);
    }

    let response = state.call(endpoint, request).await?;
    let mut reconciled = state
        .reconciler
        .reconcile(&endpoint.plan, &session, &response)?;
    if let Some(body) = reconciled.body.as_object_mut() {
        body.insert("iProfile".into(), Value::String(session.identity.clone()));
        if !is_sentinel(&session.basket_id) {
            body.insert("iBasket".into(), Value::String(session.basket_id.clone()));
        }
    }
    Ok(reconciled.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::FavoriteCountries;

    #[test]
    fn maps_form_fields() {
        let session = GuestSession::new("P1", "B1", "BE/NL", FavoriteCountries::new(["BE", "FR"]));
        let form = json!({
            "Nom": "Doe",
            "Prenom": "Jane",
            "email": "jane@example.com",
            "tel": "0470",
            "rue": "Main 1",
            "zip": "1000",
            "city": "Brussels",
            "token": "secret",
        });
        let doc = profile_document(&form, &session);
        assert_eq!(doc["sNom"], "Doe");
        assert_eq!(doc["sPrenom"], "Jane");
        assert_eq!(doc["sEmail"], "jane@example.com");
        assert_eq!(doc["iPays"], -1);
        assert_eq!(doc["sPaysFav"], "BE,FR");
        assert_eq!(doc["sLangue"], "NL");
        assert_eq!(doc["iProfile"], "P1");
        assert!(doc.get("token").is_none());
    }

    #[test]
    fn language_defaults_to_fr() {
        let session = GuestSession::new("P1", "", "", FavoriteCountries::default());
        assert_eq!(profile_document(&json!({}), &session)["sLangue"], "FR");
    }
}
