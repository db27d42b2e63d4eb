//! Response reconciliation subsystem.
//!
//! # Data Flow
//! ```text
//! UpstreamResponse + pre-call GuestSession
//!     → reconciler.rs (status check, JSON parse, Set-Cookie correction,
//!                      rotation, body pointers)
//!     → enrichment.rs (credential logins only, best effort)
//!     → JsonWithCookies (body + Set-Cookie lines)
//! ```
//!
//! # Design Decisions
//! - Stateless: every input arrives with the request
//! - Enrichment failures never fail the primary response

pub mod enrichment;
pub mod reconciler;

pub use enrichment::ProfileEnricher;
pub use reconciler::{identifier_value, ReconcilePlan, Reconciled, Reconciler, AUTH_SESSION_COOKIE};
