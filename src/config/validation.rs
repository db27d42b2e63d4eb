//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check header and cookie names are usable on the wire
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    #[error("invalid URL for {field}: '{value}'")]
    Url { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("invalid header name for {field}: '{value}'")]
    HeaderName { field: &'static str, value: String },

    #[error("cookie name must not be empty")]
    CookieName,

    #[error("default tile style '{0}' has no template")]
    TileStyle(String),
}

/// Validate the whole configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::Zero("listener.max_body_bytes"));
    }

    check_http_url(&mut errors, "upstream.base_url", &config.upstream.base_url);
    check_http_url(&mut errors, "client_app.url", &config.client_app.url);
    check_http_url(&mut errors, "geo.geocoding_url", &config.geo.geocoding_url);

    for (field, value) in [
        ("upstream.request_timeout_secs", config.upstream.request_timeout_secs),
        ("upstream.cart_timeout_secs", config.upstream.cart_timeout_secs),
        ("upstream.connect_timeout_secs", config.upstream.connect_timeout_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }
    if config.session.max_age_days == 0 {
        errors.push(ValidationError::Zero("session.max_age_days"));
    }

    for (field, value) in [
        ("session.identity_header", &config.session.identity_header),
        ("session.basket_header", &config.session.basket_header),
        ("session.profile_header", &config.session.profile_header),
    ] {
        if axum::http::HeaderName::try_from(value.as_str()).is_err() {
            errors.push(ValidationError::HeaderName {
                field,
                value: value.clone(),
            });
        }
    }

    let cookie_name = config.session.cookie_name.trim();
    if cookie_name.is_empty() || cookie_name.contains(['=', ';', ' ']) {
        errors.push(ValidationError::CookieName);
    }

    if !config.geo.tile_styles.contains_key(&config.geo.default_tile_style) {
        errors.push(ValidationError::TileStyle(config.geo.default_tile_style.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_http_url(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    let valid = Url::parse(value)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
        .unwrap_or(false);
    if !valid {
        errors.push(ValidationError::Url {
            field,
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(validate_config(&GatewayConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.upstream.base_url = "ftp://example.com".into();
        config.upstream.cart_timeout_secs = 0;
        config.session.identity_header = "bad header".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::Zero("upstream.cart_timeout_secs")));
    }

    #[test]
    fn rejects_unknown_default_tile_style() {
        let mut config = GatewayConfig::default();
        config.geo.default_tile_style = "watercolor".into();
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::TileStyle("watercolor".into())])
        );
    }
}
