//! Upstream API access.
//!
//! # Data Flow
//! ```text
//! resolved GuestSession + endpoint parameters
//!     → request.rs (UpstreamRequest: method, target, query, cookies, body)
//!     → xml.rs (embedded XML fragment for credential-code login)
//!     → client.rs (reqwest call with timeout, User-Agent, metrics)
//!     → UpstreamResponse (status, headers, buffered body)
//! ```
//!
//! # Design Decisions
//! - One pooled `reqwest::Client`, shared immutably across requests
//! - Redirects are never followed; upstream redirects reach the caller as-is
//! - Timeouts are per call, not per client, so cart mutations can wait longer

pub mod client;
pub mod request;
pub mod xml;

pub use client::{UpstreamClient, UpstreamError, UpstreamResponse};
pub use request::{Target, UpstreamRequest};
