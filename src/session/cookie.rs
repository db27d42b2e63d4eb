//! `GuestProfile` cookie codec.
//!
//! # Responsibilities
//! - Encode a session as URL-encoded JSON for the outbound `Cookie` header
//! - Build the client-facing `Set-Cookie` line (Path=/, fixed max age, not HTTP-only)
//! - Find and decode the session in inbound `Cookie` and upstream `Set-Cookie` headers

use axum::http::{header, HeaderMap};
use cookie::Cookie;
use thiserror::Error;

use crate::session::model::GuestSession;

/// Name of the session cookie shared with the upstream.
pub const GUEST_PROFILE_COOKIE: &str = "GuestProfile";

/// Failure to decode a session blob.
#[derive(Debug, Error)]
pub enum SessionCodecError {
    #[error("session value is not valid UTF-8 after URL decoding: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    #[error("session value is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed cookie: {0}")]
    Cookie(#[from] cookie::ParseError),
}

/// Cookie name and lifetime used for the session cookie.
#[derive(Debug, Clone)]
pub struct SessionCookie {
    name: String,
    max_age_days: i64,
}

impl Default for SessionCookie {
    fn default() -> Self {
        Self::new(GUEST_PROFILE_COOKIE, 10)
    }
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, max_age_days: u32) -> Self {
        Self {
            name: name.into(),
            max_age_days: i64::from(max_age_days),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// URL-encoded JSON of the four session fields.
    pub fn encode_value(&self, session: &GuestSession) -> String {
        // Serializing a struct of strings cannot fail.
        let json = serde_json::to_string(session).unwrap_or_else(|_| "{}".to_string());
        urlencoding::encode(&json).into_owned()
    }

    pub fn decode_value(&self, raw: &str) -> Result<GuestSession, SessionCodecError> {
        let decoded = urlencoding::decode(raw.trim_matches('"'))?;
        Ok(serde_json::from_str(&decoded)?)
    }

    /// `name=value` pair for an outbound `Cookie` header.
    pub fn request_pair(&self, session: &GuestSession) -> String {
        format!("{}={}", self.name, self.encode_value(session))
    }

    /// Full `Set-Cookie` value handed back to the client.
    pub fn set_cookie(&self, session: &GuestSession) -> String {
        Cookie::build((self.name.clone(), self.encode_value(session)))
            .path("/")
            .max_age(cookie::time::Duration::days(self.max_age_days))
            .http_only(false)
            .build()
            .to_string()
    }

    /// Reads the session from the inbound `Cookie` header(s).
    ///
    /// `None` when no session cookie is present.
    pub fn from_request_headers(
        &self,
        headers: &HeaderMap,
    ) -> Option<Result<GuestSession, SessionCodecError>> {
        let raw = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|line| Cookie::split_parse(line.to_string()))
            .filter_map(Result::ok)
            .find(|c| c.name() == self.name)
            .map(|c| c.value().to_string())?;
        Some(self.decode_value(&raw))
    }

    /// Whether a `Set-Cookie` line sets this cookie.
    pub fn is_session_set_cookie(&self, line: &str) -> bool {
        line.trim_start()
            .split_once('=')
            .map(|(name, _)| name.trim() == self.name)
            .unwrap_or(false)
    }

    /// Decodes the session carried by an upstream `Set-Cookie` line.
    pub fn from_set_cookie(&self, line: &str) -> Result<GuestSession, SessionCodecError> {
        let parsed = Cookie::parse(line.to_string())?;
        self.decode_value(parsed.value())
    }
}

/// Extracts the `name=value` pair of a `Set-Cookie` line, dropping attributes.
pub fn cookie_pair(line: &str) -> &str {
    line.split(';').next().unwrap_or_default().trim()
}
