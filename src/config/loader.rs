//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {var}: '{value}'")]
    Env { var: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parses a TOML configuration file. Validation happens after overrides.
fn read_config_file(path: &Path) -> Result<GatewayConfig, ConfigError> {
    tracing::info!(path = %path.display(), "Loading configuration file");
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Builds the runtime configuration: optional `GATEWAY_CONFIG` file,
/// then environment overrides, then validation.
pub fn load_from_env() -> Result<GatewayConfig, ConfigError> {
    let lookup = |name: &str| std::env::var(name).ok();
    let mut config = match lookup("GATEWAY_CONFIG") {
        Some(path) => read_config_file(Path::new(&path))?,
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Applies `PORT`, `CLIENT_APP_URL`, `UPSTREAM_BASE_URL` and `LOG_FORMAT`.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup("PORT") {
        let parsed = port.trim().parse::<u16>().map_err(|_| ConfigError::Env {
            var: "PORT",
            value: port.clone(),
        })?;
        config.listener.set_port(parsed);
    }
    if let Some(url) = lookup("CLIENT_APP_URL") {
        config.client_app.url = url.trim_end_matches('/').to_string();
    }
    if let Some(url) = lookup("UPSTREAM_BASE_URL") {
        config.upstream.base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(format) = lookup("LOG_FORMAT") {
        config.observability.log_format = match format.to_ascii_lowercase().as_str() {
            "json" => crate::config::schema::LogFormat::Json,
            "pretty" => crate::config::schema::LogFormat::Pretty,
            _ => {
                return Err(ConfigError::Env {
                    var: "LOG_FORMAT",
                    value: format,
                })
            }
        };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("PORT", "8080"),
                ("CLIENT_APP_URL", "https://app.example.com/"),
                ("UPSTREAM_BASE_URL", "http://127.0.0.1:9999"),
            ]),
        )
        .unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.client_app.url, "https://app.example.com");
        assert_eq!(config.upstream.base_url, "http://127.0.0.1:9999");
    }

    #[test]
    fn bad_port_is_rejected() {
        let mut config = GatewayConfig::default();
        let err = apply_env_overrides(&mut config, env(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "PORT", .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_config_file(Path::new("/nonexistent/gateway.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
