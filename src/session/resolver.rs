//! Session resolution.
//!
//! # Responsibilities
//! - Read a partial session from each source (dedicated headers, the
//!   consolidated `X-Guest-Profile` header, the `GuestProfile` cookie,
//!   caller-supplied body/query values)
//! - Merge them field by field in the order an endpoint's policy names
//! - Fall back to the endpoint's anonymous placeholder
//!
//! # Design Decisions
//! - First non-sentinel value wins; later sources only fill gaps
//! - A source that fails to decode is logged and skipped, never fatal
//! - Policies are `const` values so the endpoint table stays declarative

use axum::http::{HeaderMap, HeaderName};

use crate::config::SessionConfig;
use crate::session::cookie::{SessionCodecError, SessionCookie};
use crate::session::model::{GuestSession, SessionPatch};

/// Where a session value can come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSource {
    /// `X-IProfile` / `X-IBasket`. Identity and basket only.
    DedicatedHeaders,
    /// `X-Guest-Profile`: the client's persisted session as JSON.
    ProfileHeader,
    /// `GuestProfile` cookie: the browser's persisted session.
    Cookie,
    /// Values the caller passed for this operation (body or query).
    Explicit,
}

/// Which sources an endpoint consults, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvePolicy {
    pub sources: &'static [SessionSource],
    /// Value used when no source yields an identifier.
    pub anonymous_placeholder: &'static str,
}

impl ResolvePolicy {
    /// Dedicated headers, consolidated header, cookie, then caller values.
    pub const DEFAULT: Self = Self::new(&[
        SessionSource::DedicatedHeaders,
        SessionSource::ProfileHeader,
        SessionSource::Cookie,
        SessionSource::Explicit,
    ]);

    /// Dedicated headers, then caller values, then persisted state.
    ///
    /// Caller locale and favorites beat whatever the client has persisted.
    pub const HEADERS_THEN_EXPLICIT: Self = Self::new(&[
        SessionSource::DedicatedHeaders,
        SessionSource::Explicit,
        SessionSource::ProfileHeader,
        SessionSource::Cookie,
    ]);

    /// Persisted client state only (consolidated header, then cookie).
    pub const PERSISTED: Self =
        Self::new(&[SessionSource::ProfileHeader, SessionSource::Cookie]);

    /// Request headers only; the cookie is forwarded separately.
    pub const HEADERS_ONLY: Self =
        Self::new(&[SessionSource::DedicatedHeaders, SessionSource::ProfileHeader]);

    pub const fn new(sources: &'static [SessionSource]) -> Self {
        Self {
            sources,
            anonymous_placeholder: "",
        }
    }

    /// Uses `placeholder` instead of the empty string for missing identifiers.
    pub const fn with_anonymous_placeholder(mut self, placeholder: &'static str) -> Self {
        self.anonymous_placeholder = placeholder;
        self
    }
}

impl Default for ResolvePolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Builds a [`GuestSession`] from an inbound request.
#[derive(Debug, Clone)]
pub struct SessionResolver {
    cookie: SessionCookie,
    identity_header: HeaderName,
    basket_header: HeaderName,
    profile_header: HeaderName,
}

impl SessionResolver {
    pub fn new(
        cookie: SessionCookie,
        identity_header: HeaderName,
        basket_header: HeaderName,
        profile_header: HeaderName,
    ) -> Self {
        Self {
            cookie,
            identity_header,
            basket_header,
            profile_header,
        }
    }

    /// Builds a resolver from validated configuration.
    pub fn from_config(config: &SessionConfig) -> Result<Self, axum::http::header::InvalidHeaderName> {
        Ok(Self::new(
            SessionCookie::new(&config.cookie_name, config.max_age_days),
            HeaderName::try_from(config.identity_header.as_str())?,
            HeaderName::try_from(config.basket_header.as_str())?,
            HeaderName::try_from(config.profile_header.as_str())?,
        ))
    }

    pub fn cookie(&self) -> &SessionCookie {
        &self.cookie
    }

    /// Resolves the session for one request.
    pub fn resolve(
        &self,
        policy: &ResolvePolicy,
        headers: &HeaderMap,
        explicit: SessionPatch,
    ) -> GuestSession {
        let mut explicit = Some(explicit);
        let mut merged = SessionPatch::default();

        for source in policy.sources {
            let patch = match source {
                SessionSource::Explicit => explicit.take().unwrap_or_default(),
                other => self.read(*other, headers),
            };
            merged.fill_missing(patch);
        }

        let session = GuestSession {
            identity: merged
                .identity
                .unwrap_or_else(|| policy.anonymous_placeholder.to_string()),
            basket_id: merged
                .basket_id
                .unwrap_or_else(|| policy.anonymous_placeholder.to_string()),
            country_language: merged.country_language.unwrap_or_default(),
            favorite_countries: merged.favorite_countries.unwrap_or_default(),
        };

        tracing::debug!(
            identity = %session.identity,
            basket_id = %session.basket_id,
            country_language = %session.country_language,
            "Session resolved"
        );
        session
    }

    /// Reads one request-carried source.
    pub fn read(&self, source: SessionSource, headers: &HeaderMap) -> SessionPatch {
        match source {
            SessionSource::DedicatedHeaders => SessionPatch::default()
                .with_identity(header_str(headers, &self.identity_header).unwrap_or_default())
                .with_basket_id(header_str(headers, &self.basket_header).unwrap_or_default()),
            SessionSource::ProfileHeader => self
                .profile_header_session(headers)
                .map(SessionPatch::from_session)
                .unwrap_or_default(),
            SessionSource::Cookie => match self.cookie.from_request_headers(headers) {
                Some(Ok(session)) => SessionPatch::from_session(session),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, cookie = self.cookie.name(), "Ignoring malformed session cookie");
                    SessionPatch::default()
                }
                None => SessionPatch::default(),
            },
            SessionSource::Explicit => SessionPatch::default(),
        }
    }

    /// Whether the request carries a persisted session at all, decodable or not.
    pub fn carries_session(&self, headers: &HeaderMap) -> bool {
        headers.contains_key(&self.profile_header)
            || self.cookie.from_request_headers(headers).is_some()
    }

    /// Decodes the consolidated session header, if present and well formed.
    pub fn profile_header_session(&self, headers: &HeaderMap) -> Option<GuestSession> {
        let raw = header_str(headers, &self.profile_header)?;
        match decode_profile_header(raw) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!(error = %e, header = %self.profile_header, "Ignoring malformed session header");
                None
            }
        }
    }
}

/// The header carries plain JSON; some clients URL-encode it.
fn decode_profile_header(raw: &str) -> Result<GuestSession, SessionCodecError> {
    match serde_json::from_str(raw) {
        Ok(session) => Ok(session),
        Err(e) if raw.contains('%') => {
            tracing::trace!(error = %e, "Retrying session header as URL-encoded JSON");
            let decoded = urlencoding::decode(raw)?;
            Ok(serde_json::from_str(&decoded)?)
        }
        Err(e) => Err(e.into()),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::model::FavoriteCountries;
    use axum::http::{header, HeaderValue};

    fn resolver() -> SessionResolver {
        SessionResolver::from_config(&SessionConfig::default()).unwrap()
    }

    fn cookie_header(session: &GuestSession) -> HeaderValue {
        let pair = SessionCookie::default().request_pair(session);
        HeaderValue::from_str(&pair).unwrap()
    }

    #[test]
    fn dedicated_header_wins_over_everything() {
        let mut headers = HeaderMap::new();
        headers.insert("x-iprofile", HeaderValue::from_static("P-HEADER"));
        headers.insert(
            "x-guest-profile",
            HeaderValue::from_static(r#"{"iProfile":"P-JSON","iBasket":"B-JSON"}"#),
        );
        headers.insert(
            header::COOKIE,
            cookie_header(&GuestSession::new("P-COOKIE", "B-COOKIE", "", FavoriteCountries::default())),
        );

        let session = resolver().resolve(
            &ResolvePolicy::DEFAULT,
            &headers,
            SessionPatch::default().with_identity("P-BODY"),
        );
        assert_eq!(session.identity, "P-HEADER");
        assert_eq!(session.basket_id, "B-JSON");
    }

    #[test]
    fn sentinel_cookie_resolves_to_empty() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            cookie_header(&GuestSession::new("guest_123", "basket_456", "", FavoriteCountries::default())),
        );

        let session = resolver().resolve(&ResolvePolicy::DEFAULT, &headers, SessionPatch::default());
        assert_eq!(session.identity, "");
        assert_eq!(session.basket_id, "");
    }

    #[test]
    fn sentinel_header_does_not_hide_real_cookie_value() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-guest-profile",
            HeaderValue::from_static(r#"{"iProfile":"0","iBasket":"basket_tmp"}"#),
        );
        headers.insert(
            header::COOKIE,
            cookie_header(&GuestSession::new("P9", "B9", "FR/FR", FavoriteCountries::default())),
        );

        let session = resolver().resolve(&ResolvePolicy::DEFAULT, &headers, SessionPatch::default());
        assert_eq!(session.identity, "P9");
        assert_eq!(session.basket_id, "B9");
        assert_eq!(session.country_language, "FR/FR");
    }

    #[test]
    fn malformed_profile_header_falls_back() {
        let mut headers = HeaderMap::new();
        headers.insert("x-guest-profile", HeaderValue::from_static("{not json"));
        headers.insert(
            header::COOKIE,
            cookie_header(&GuestSession::new("P2", "B2", "BE/FR", FavoriteCountries::default())),
        );

        let session = resolver().resolve(&ResolvePolicy::DEFAULT, &headers, SessionPatch::default());
        assert_eq!(session.identity, "P2");
        assert_eq!(session.country_language, "BE/FR");
    }

    #[test]
    fn url_encoded_profile_header_is_accepted() {
        let encoded = urlencoding::encode(r#"{"iProfile":"P3","sPaysLangue":"DE/DE"}"#).into_owned();
        let mut headers = HeaderMap::new();
        headers.insert("x-guest-profile", HeaderValue::from_str(&encoded).unwrap());

        let session = resolver().resolve(&ResolvePolicy::DEFAULT, &headers, SessionPatch::default());
        assert_eq!(session.identity, "P3");
        assert_eq!(session.country_language, "DE/DE");
    }

    #[test]
    fn caller_values_beat_persisted_state() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-guest-profile",
            HeaderValue::from_static(r#"{"iProfile":"P-JSON","sPaysLangue":"BE/FR"}"#),
        );

        let session = resolver().resolve(
            &ResolvePolicy::HEADERS_THEN_EXPLICIT,
            &headers,
            SessionPatch::default()
                .with_identity("P-BODY")
                .with_country_language("NL/NL"),
        );
        assert_eq!(session.identity, "P-BODY");
        assert_eq!(session.country_language, "NL/NL");
    }

    #[test]
    fn dedicated_header_beats_caller_values() {
        let mut headers = HeaderMap::new();
        headers.insert("x-iprofile", HeaderValue::from_static("P-HEADER"));
        headers.insert(
            "x-guest-profile",
            HeaderValue::from_static(r#"{"sPaysLangue":"BE/FR"}"#),
        );

        let session = resolver().resolve(
            &ResolvePolicy::HEADERS_THEN_EXPLICIT,
            &headers,
            SessionPatch::default()
                .with_identity("P-BODY")
                .with_basket_id("B-BODY")
                .with_country_language("NL/NL"),
        );
        assert_eq!(session.identity, "P-HEADER");
        assert_eq!(session.basket_id, "B-BODY");
        assert_eq!(session.country_language, "NL/NL");
    }

    #[test]
    fn explicit_values_fill_gaps_last() {
        let session = resolver().resolve(
            &ResolvePolicy::DEFAULT,
            &HeaderMap::new(),
            SessionPatch::default().with_basket_id("B-BODY"),
        );
        assert_eq!(session.identity, "");
        assert_eq!(session.basket_id, "B-BODY");
    }

    #[test]
    fn placeholder_applies_when_nothing_is_known() {
        let policy = ResolvePolicy::PERSISTED.with_anonymous_placeholder("0");
        let session = resolver().resolve(&policy, &HeaderMap::new(), SessionPatch::default());
        assert_eq!(session.identity, "0");
        assert_eq!(session.basket_id, "0");
    }

    #[test]
    fn persisted_policy_ignores_dedicated_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-iprofile", HeaderValue::from_static("P-HEADER"));
        let session = resolver().resolve(&ResolvePolicy::PERSISTED, &headers, SessionPatch::default());
        assert_eq!(session.identity, "");
    }
}
