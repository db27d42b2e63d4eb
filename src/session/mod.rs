//! Guest session subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → resolver.rs (merge dedicated headers, X-Guest-Profile, cookie, caller values)
//!     → GuestSession (canonical, per request)
//!     → cookie.rs (serialize into the upstream `GuestProfile` cookie)
//!
//! Upstream response
//!     → cookie.rs (decode `GuestProfile` from Set-Cookie)
//!     → reconcile (correct, detect rotation, re-encode)
//! ```
//!
//! # Design Decisions
//! - A session lives for exactly one request; nothing is stored server-side
//! - Sentinel identifiers are treated as absent in every source
//! - Favorite countries are normalized to one list form right after decoding

pub mod cookie;
pub mod model;
pub mod resolver;

pub use cookie::{SessionCookie, GUEST_PROFILE_COOKIE};
pub use model::{is_sentinel, FavoriteCountries, GuestSession, SessionPatch};
pub use resolver::{ResolvePolicy, SessionResolver, SessionSource};
