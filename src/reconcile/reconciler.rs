//! Response reconciliation.
//!
//! # Responsibilities
//! - Turn upstream failures into error envelopes
//! - Decode the session upstream sets, then restore client-owned locale fields
//! - Detect identity/basket rotation and surface it in the JSON body
//! - Pick up basket ids upstream reports in the body instead of a cookie
//! - Produce the `Set-Cookie` lines for the client
//!
//! # Design Decisions
//! - A session cookie that fails to decode is forwarded untouched
//! - Body pointers update the cookie only; the body is returned as upstream sent it
//! - Rotation fields are added only when the body is a JSON object

use axum::http::StatusCode;
use serde_json::Value;

use crate::http::response::{GatewayError, JsonWithCookies};
use crate::observability::metrics;
use crate::session::cookie::cookie_pair;
use crate::session::{is_sentinel, GuestSession, SessionCookie};
use crate::upstream::UpstreamResponse;

/// Name of upstream's authentication cookie.
pub const AUTH_SESSION_COOKIE: &str = "auth.session-token";

/// Per-endpoint reconciliation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Label used in logs and metrics.
    pub endpoint: &'static str,
    /// JSON pointers where upstream may report a new basket id, first match wins.
    pub basket_pointers: &'static [&'static str],
    /// Status used when a 2xx body is not valid JSON.
    pub invalid_json_status: StatusCode,
    /// Treat an empty 2xx body as `{}` instead of invalid.
    pub allow_empty_body: bool,
}

impl ReconcilePlan {
    pub const fn new(endpoint: &'static str) -> Self {
        Self {
            endpoint,
            basket_pointers: &[],
            invalid_json_status: StatusCode::INTERNAL_SERVER_ERROR,
            allow_empty_body: false,
        }
    }

    pub const fn with_basket_pointers(mut self, pointers: &'static [&'static str]) -> Self {
        self.basket_pointers = pointers;
        self
    }

    pub const fn with_invalid_json_status(mut self, status: StatusCode) -> Self {
        self.invalid_json_status = status;
        self
    }

    pub const fn allowing_empty_body(mut self) -> Self {
        self.allow_empty_body = true;
        self
    }
}

/// Outcome of a successful reconciliation.
#[derive(Debug, Clone)]
pub struct Reconciled {
    /// The JSON body for the client.
    pub body: Value,
    /// The session the client should persist.
    pub session: GuestSession,
    /// The (corrected) session upstream set, if any.
    pub upstream_session: Option<GuestSession>,
    /// Whether upstream's session cookie changed identity or basket.
    pub rotated: bool,
    /// `Set-Cookie` lines for the client, session cookie already corrected.
    pub set_cookies: Vec<String>,
    /// `auth.session-token=...` pair, when upstream issued one.
    pub auth_token: Option<String>,
}

impl Reconciled {
    pub fn into_response(self) -> JsonWithCookies {
        JsonWithCookies::ok(self.body).with_cookies(self.set_cookies)
    }
}

/// Applies the reconciliation steps to upstream responses.
#[derive(Debug, Clone)]
pub struct Reconciler {
    cookie: SessionCookie,
}

impl Reconciler {
    pub fn new(cookie: SessionCookie) -> Self {
        Self { cookie }
    }

    pub fn cookie(&self) -> &SessionCookie {
        &self.cookie
    }

    /// Non-2xx responses become a pass-through error envelope.
    pub fn check_status(&self, response: &UpstreamResponse) -> Result<(), GatewayError> {
        if response.is_success() {
            Ok(())
        } else {
            Err(GatewayError::upstream_status(response.status, &response.text()))
        }
    }

    /// Parses the 2xx body as JSON per the plan.
    pub fn parse_body(
        &self,
        plan: &ReconcilePlan,
        response: &UpstreamResponse,
    ) -> Result<Value, GatewayError> {
        if plan.allow_empty_body && response.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Object(Default::default()));
        }
        response.json().map_err(|e| {
            tracing::warn!(endpoint = plan.endpoint, error = %e, "Upstream body is not valid JSON");
            GatewayError::InvalidUpstreamResponse {
                status: plan.invalid_json_status,
                raw: response.text().into_owned(),
            }
        })
    }

    /// Runs the full pipeline for one response.
    ///
    /// `request` is the session resolved before the call.
    pub fn reconcile(
        &self,
        plan: &ReconcilePlan,
        request: &GuestSession,
        response: &UpstreamResponse,
    ) -> Result<Reconciled, GatewayError> {
        self.check_status(response)?;
        let mut body = self.parse_body(plan, response)?;

        let mut session = request.clone();
        let mut upstream_session = None;
        let mut session_line = None;
        let mut auth_token = None;
        let mut set_cookies = Vec::new();

        for line in response.set_cookies() {
            if self.cookie.is_session_set_cookie(&line) {
                match self.cookie.from_set_cookie(&line) {
                    Ok(mut updated) => {
                        keep_real_identifiers(&mut updated, request);
                        restore_client_locale(&mut updated, request);
                        session = updated.clone();
                        upstream_session = Some(updated);
                        session_line = Some(set_cookies.len());
                    }
                    Err(e) => {
                        tracing::warn!(
                            endpoint = plan.endpoint,
                            error = %e,
                            "Forwarding undecodable session cookie unchanged"
                        );
                    }
                }
            } else if cookie_name(&line) == AUTH_SESSION_COOKIE {
                auth_token = Some(cookie_pair(&line).to_string());
            }
            set_cookies.push(line);
        }

        let rotated = upstream_session.is_some() && session.rotated_from(request);
        if rotated {
            metrics::record_rotation(plan.endpoint);
            tracing::info!(
                endpoint = plan.endpoint,
                previous_identity = %request.identity,
                identity = %session.identity,
                previous_basket = %request.basket_id,
                basket_id = %session.basket_id,
                "Upstream rotated the session"
            );
            surface_rotation(&mut body, &session);
        }

        if let Some(basket_id) = plan
            .basket_pointers
            .iter()
            .find_map(|pointer| body.pointer(pointer).and_then(identifier_value))
            .filter(|id| !is_sentinel(id))
        {
            if basket_id != session.basket_id {
                tracing::info!(
                    endpoint = plan.endpoint,
                    previous_basket = %session.basket_id,
                    basket_id = %basket_id,
                    "Upstream reported a new basket in the body"
                );
                session.basket_id = basket_id;
            }
        }

        match session_line {
            Some(index) => set_cookies[index] = self.cookie.set_cookie(&session),
            None if session.rotated_from(request) => {
                set_cookies.push(self.cookie.set_cookie(&session));
            }
            None => {}
        }

        Ok(Reconciled {
            body,
            session,
            upstream_session,
            rotated,
            set_cookies,
            auth_token,
        })
    }
}

/// A placeholder from upstream never replaces an identifier the client already holds.
fn keep_real_identifiers(updated: &mut GuestSession, request: &GuestSession) {
    if is_sentinel(&updated.identity) && !is_sentinel(&request.identity) {
        updated.identity = request.identity.clone();
    }
    if is_sentinel(&updated.basket_id) && !is_sentinel(&request.basket_id) {
        updated.basket_id = request.basket_id.clone();
    }
}

/// Client-owned fields win over whatever upstream echoes back.
fn restore_client_locale(updated: &mut GuestSession, request: &GuestSession) {
    if !request.country_language.is_empty() {
        updated.country_language = request.country_language.clone();
    }
    if !request.favorite_countries.is_empty() {
        updated.favorite_countries = request.favorite_countries.clone();
    }
}

fn surface_rotation(body: &mut Value, session: &GuestSession) {
    if let Some(object) = body.as_object_mut() {
        object.insert("newIProfile".into(), Value::String(session.identity.clone()));
        object.insert("newIBasket".into(), Value::String(session.basket_id.clone()));
    }
}

fn cookie_name(line: &str) -> &str {
    cookie_pair(line)
        .split_once('=')
        .map(|(name, _)| name.trim())
        .unwrap_or_default()
}

/// Reads an identifier that upstream may send as a string or a number.
pub fn identifier_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
