//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, route per endpoint)
//!     → request.rs (request ID, lenient body and field extraction)
//!     → handlers/ (session resolution, upstream call, reconciliation)
//!     → response.rs (error envelope, Set-Cookie lines)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use handlers::AppState;
pub use request::{RequestIdExt, X_REQUEST_ID};
pub use response::{GatewayError, JsonWithCookies};
pub use server::{HttpServer, ServerError};
