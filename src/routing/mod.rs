//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → axum Router (dedicated endpoints from table.rs)
//!     → fallback: generic passthrough for other /api/* paths
//! ```
//!
//! # Design Decisions
//! - Endpoint table compiled in, immutable at runtime
//! - Deterministic: same input always matches same endpoint
//! - Dedicated paths never fall through to the passthrough

pub mod table;

pub use table::{Endpoint, TimeoutClass, ENDPOINTS};
