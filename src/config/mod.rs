//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! optional TOML file (GATEWAY_CONFIG)
//!     → loader.rs (parse & deserialize)
//!     → environment overrides (PORT, CLIENT_APP_URL, UPSTREAM_BASE_URL)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_from_env, ConfigError};
pub use schema::{
    ClientAppConfig, CorsConfig, GatewayConfig, GeoConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, SessionConfig, UpstreamConfig,
};
pub use validation::ValidationError;
