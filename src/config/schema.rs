//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// The upstream commerce API.
    pub upstream: UpstreamConfig,

    /// Session cookie and header names.
    pub session: SessionConfig,

    /// Client application URLs used for OAuth redirects.
    pub client_app: ClientAppConfig,

    /// Map tiles and geocoding passthroughs.
    pub geo: GeoConfig,

    /// Cross-origin settings for browser clients.
    pub cors: CorsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3001").
    pub bind_address: String,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3001".to_string(),
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

impl ListenerConfig {
    /// Replaces the port of the bind address, keeping the host.
    pub fn set_port(&mut self, port: u16) {
        let host = self
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        self.bind_address = format!("{}:{}", host, port);
    }
}

/// Upstream API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the upstream host (scheme + authority).
    pub base_url: String,

    /// Synthetic User-Agent identifying the client category.
    pub user_agent: String,

    /// Default per-call timeout in seconds.
    pub request_timeout_secs: u64,

    /// Timeout for cart mutations in seconds.
    pub cart_timeout_secs: u64,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://jirig.be".to_string(),
            user_agent: "Mobile-Flutter-App/1.0".to_string(),
            request_timeout_secs: 30,
            cart_timeout_secs: 60,
            connect_timeout_secs: 10,
        }
    }
}

/// Session propagation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name of the session cookie.
    pub cookie_name: String,

    /// Session cookie lifetime in days.
    pub max_age_days: u32,

    /// Dedicated identity header.
    pub identity_header: String,

    /// Dedicated basket header.
    pub basket_header: String,

    /// Consolidated session header carrying the JSON session.
    pub profile_header: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "GuestProfile".to_string(),
            max_age_days: 10,
            identity_header: "x-iprofile".to_string(),
            basket_header: "x-ibasket".to_string(),
            profile_header: "x-guest-profile".to_string(),
        }
    }
}

/// Client application settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientAppConfig {
    /// Base URL of the client app that OAuth flows return to.
    pub url: String,
}

impl Default for ClientAppConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:3000".to_string(),
        }
    }
}

/// Map tile and geocoding passthroughs.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeoConfig {
    /// Tile URL template per style; `{z}`, `{x}`, `{y}` and `{ext}` are substituted.
    pub tile_styles: BTreeMap<String, String>,

    /// Style used when none or an unknown one is requested.
    pub default_tile_style: String,

    /// Geocoding search endpoint.
    pub geocoding_url: String,
}

impl Default for GeoConfig {
    fn default() -> Self {
        let mut tile_styles = BTreeMap::new();
        tile_styles.insert(
            "standard".to_string(),
            "https://tile.openstreetmap.org/{z}/{x}/{y}.{ext}".to_string(),
        );
        tile_styles.insert(
            "satellite".to_string(),
            "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}".to_string(),
        );
        tile_styles.insert(
            "carto_light".to_string(),
            "https://cartodb-basemaps-a.global.ssl.fastly.net/light_all/{z}/{x}/{y}.png".to_string(),
        );
        tile_styles.insert(
            "dark".to_string(),
            "https://cartodb-basemaps-a.global.ssl.fastly.net/dark_all/{z}/{x}/{y}.png".to_string(),
        );
        Self {
            tile_styles,
            default_tile_style: "standard".to_string(),
            geocoding_url: "https://nominatim.openstreetmap.org/search".to_string(),
        }
    }
}

/// Cross-origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Enable the CORS layer.
    pub enabled: bool,

    /// Request headers browsers may send.
    pub allowed_headers: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_headers: [
                "content-type",
                "authorization",
                "x-requested-with",
                "accept",
                "x-iprofile",
                "x-ibasket",
                "x-spaysfav",
                "x-pays-langue",
                "x-pays-fav",
                "x-guest-profile",
            ]
            .iter()
            .map(|h| h.to_string())
            .collect(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error), overridden by RUST_LOG.
    pub log_level: String,

    /// Human readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_uses_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [upstream]
            base_url = "http://127.0.0.1:9000"
            "#,
        )
        .unwrap();
        assert_eq!(config.upstream.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.upstream.cart_timeout_secs, 60);
        assert_eq!(config.session.cookie_name, "GuestProfile");
        assert_eq!(config.listener.bind_address, "0.0.0.0:3001");
        assert!(config.geo.tile_styles.contains_key("satellite"));
    }

    #[test]
    fn set_port_keeps_host() {
        let mut listener = ListenerConfig {
            bind_address: "127.0.0.1:3001".to_string(),
            ..Default::default()
        };
        listener.set_port(8080);
        assert_eq!(listener.bind_address, "127.0.0.1:8080");
    }

    #[test]
    fn log_format_parses_lowercase() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }
}
