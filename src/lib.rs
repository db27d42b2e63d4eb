//! Backend-for-frontend gateway that reconciles guest sessions between a
//! mobile/web client and the upstream commerce API.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod reconcile;
pub mod routing;
pub mod session;
pub mod upstream;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
