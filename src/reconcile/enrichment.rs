//! Best-effort profile enrichment after a credential login.
//!
//! After upstream accepts a code or magic-link token, the login response
//! only carries identifiers. A second call to `get-info-profil`, made with
//! the new session cookie and upstream's auth token, fills in the name,
//! contact and address fields. Any failure leaves the login response intact
//! apart from `sEmail`.

use serde_json::{Map, Value};

use crate::session::{GuestSession, SessionCookie};
use crate::upstream::{UpstreamClient, UpstreamRequest};

/// Upstream path of the profile lookup.
pub const PROFILE_PATH: &str = "/api/get-info-profil";

/// Profile fields copied into the login response, besides `sEmail`.
pub const PROFILE_FIELDS: [&str; 7] = ["sNom", "sPrenom", "sPhoto", "sTel", "sRue", "sCity", "sZip"];

/// Fetches the profile and merges it into login responses.
#[derive(Debug, Clone, Copy)]
pub struct ProfileEnricher<'a> {
    client: &'a UpstreamClient,
    cookie: &'a SessionCookie,
}

impl<'a> ProfileEnricher<'a> {
    pub fn new(client: &'a UpstreamClient, cookie: &'a SessionCookie) -> Self {
        Self { client, cookie }
    }

    /// Merges profile fields into `body`.
    ///
    /// `email` is the address the user logged in with.
    pub async fn enrich(
        &self,
        session: &GuestSession,
        auth_token: Option<&str>,
        email: &str,
        body: &mut Value,
    ) {
        let Some(target) = body.as_object_mut() else {
            return;
        };

        match self.fetch(session, auth_token).await {
            Some(profile) => merge_profile(target, &profile, email),
            None => {
                target.insert("sEmail".into(), Value::String(email.to_string()));
            }
        }
    }

    async fn fetch(&self, session: &GuestSession, auth_token: Option<&str>) -> Option<Value> {
        let mut request = UpstreamRequest::get(PROFILE_PATH).session(self.cookie, session);
        if let Some(token) = auth_token {
            request = request.cookie(token);
        }

        let response = match self.client.send("profile-enrichment", request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Profile enrichment call failed");
                return None;
            }
        };
        if !response.is_success() {
            tracing::warn!(status = response.status.as_u16(), "Profile enrichment rejected");
            return None;
        }
        match response.json() {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::warn!(error = %e, "Profile enrichment returned invalid JSON");
                None
            }
        }
    }
}

/// Copies the profile fields, defaulting missing ones to empty strings.
pub fn merge_profile(target: &mut Map<String, Value>, profile: &Value, email: &str) {
    let email = non_empty_str(profile, "sEmail").unwrap_or(email);
    target.insert("sEmail".into(), Value::String(email.to_string()));
    for field in PROFILE_FIELDS {
        let value = non_empty_str(profile, field).unwrap_or_default();
        target.insert(field.into(), Value::String(value.to_string()));
    }
}

fn non_empty_str<'v>(value: &'v Value, key: &str) -> Option<&'v str> {
    value.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}
