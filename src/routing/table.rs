//! Endpoint table.
//!
//! # Responsibilities
//! - Name every dedicated endpoint with its inbound and upstream paths
//! - Bind each endpoint to its session policy and reconciliation plan
//! - Tell the passthrough which paths it must never forward
//!
//! # Design Decisions
//! - Declared as `const` items: the table is fixed at compile time
//! - Handlers reference their entry directly instead of looking it up

use axum::http::{Method, StatusCode};

use crate::reconcile::ReconcilePlan;
use crate::session::ResolvePolicy;

/// Which per-call timeout applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutClass {
    Default,
    /// Cart mutations that upstream may take long to commit.
    Cart,
}

/// One dedicated endpoint.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Label for logs and metrics.
    pub name: &'static str,
    pub method: Method,
    /// Inbound route, in axum path syntax.
    pub path: &'static str,
    /// Upstream path; empty when the endpoint never calls upstream.
    pub upstream_path: &'static str,
    /// `None` when the endpoint carries no session.
    pub policy: Option<ResolvePolicy>,
    pub plan: ReconcilePlan,
    pub timeout: TimeoutClass,
}

impl Endpoint {
    const fn new(name: &'static str, method: Method, path: &'static str) -> Self {
        Self {
            name,
            method,
            path,
            upstream_path: path,
            policy: Some(ResolvePolicy::DEFAULT),
            plan: ReconcilePlan::new(name),
            timeout: TimeoutClass::Default,
        }
    }

    const fn upstream(mut self, path: &'static str) -> Self {
        self.upstream_path = path;
        self
    }

    const fn policy(mut self, policy: ResolvePolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    const fn sessionless(mut self) -> Self {
        self.policy = None;
        self
    }

    const fn plan(mut self, plan: ReconcilePlan) -> Self {
        self.plan = plan;
        self
    }

    const fn timeout(mut self, timeout: TimeoutClass) -> Self {
        self.timeout = timeout;
        self
    }

    /// The resolve policy, or the default for sessionless endpoints.
    pub fn resolve_policy(&self) -> ResolvePolicy {
        self.policy.unwrap_or_default()
    }
}

pub const PRODUCT_COMPARISON: Endpoint = Endpoint::new(
    "product-comparison",
    Method::GET,
    "/api/comparaison-by-code-30041025",
)
.policy(ResolvePolicy::HEADERS_THEN_EXPLICIT);

pub const SEARCH_ARTICLE: Endpoint =
    Endpoint::new("search-article", Method::GET, "/api/search-article")
        .policy(ResolvePolicy::HEADERS_THEN_EXPLICIT);

pub const WISHLIST_ADD: Endpoint =
    Endpoint::new("wishlist-add", Method::POST, "/api/add-product-to-wishlist")
        .policy(ResolvePolicy::HEADERS_THEN_EXPLICIT)
        .plan(ReconcilePlan::new("wishlist-add").with_basket_pointers(&["/data/0/iBasket"]))
        .timeout(TimeoutClass::Cart);

pub const BASKET_LIST: Endpoint =
    Endpoint::new("basket-list", Method::GET, "/api/get-basket-list-article")
        .policy(ResolvePolicy::HEADERS_THEN_EXPLICIT)
        .plan(
            ReconcilePlan::new("basket-list")
                .with_basket_pointers(&["/data/meta/iBasket", "/data/meta/basketId"]),
        );

pub const INFOS_STATUS: Endpoint =
    Endpoint::new("infos-status", Method::GET, "/api/get-infos-status");

pub const WISHLIST_DELETE: Endpoint = Endpoint::new(
    "wishlist-delete",
    Method::POST,
    "/api/delete-article-wishlistBasket",
);

pub const WISHLIST_COUNTRIES: Endpoint = Endpoint::new(
    "wishlist-countries",
    Method::POST,
    "/api/update-country-wishlistBasket",
);

pub const BASKET_QUANTITY: Endpoint = Endpoint::new(
    "basket-quantity",
    Method::POST,
    "/api/update-quantity-articleBasket",
);

pub const COUNTRY_SELECTED: Endpoint =
    Endpoint::new("country-selected", Method::POST, "/api/update-country-selected")
        .policy(ResolvePolicy::HEADERS_THEN_EXPLICIT);

pub const AUTH_INIT: Endpoint = Endpoint::new("auth-init", Method::POST, "/api/auth/init")
    .policy(ResolvePolicy::HEADERS_THEN_EXPLICIT);

pub const PROJECT_DOWNLOAD: Endpoint =
    Endpoint::new("project-download", Method::GET, "/api/projet-download");

pub const FLAGS: Endpoint = Endpoint::new("flags", Method::GET, "/api/flags").sessionless();

pub const PROFILE_UPDATE: Endpoint =
    Endpoint::new("profile-update", Method::POST, "/api/profile/update")
        .upstream("/api/update-info-profil")
        .policy(ResolvePolicy::PERSISTED)
        .plan(
            ReconcilePlan::new("profile-update")
                .with_invalid_json_status(StatusCode::BAD_GATEWAY)
                .allowing_empty_body(),
        );

pub const LOGIN_WITH_CODE: Endpoint =
    Endpoint::new("login-with-code", Method::POST, "/api/auth/login-with-code")
        .policy(ResolvePolicy::PERSISTED.with_anonymous_placeholder("0"));

pub const MAGIC_LINK_LOGIN: Endpoint =
    Endpoint::new("magic-link-login", Method::POST, "/api/auth/login");

pub const DISCONNECT: Endpoint = Endpoint::new("disconnect", Method::POST, "/api/auth/disconnect")
    .policy(ResolvePolicy::PERSISTED);

pub const PROFILE_INFO: Endpoint =
    Endpoint::new("profile-info", Method::GET, "/api/get-info-profil")
        .policy(ResolvePolicy::PERSISTED);

pub const STORE_LIST: Endpoint =
    Endpoint::new("store-list", Method::GET, "/api/get-ikea-store-list")
        .policy(ResolvePolicy::HEADERS_ONLY);

pub const MAP_TILES: Endpoint =
    Endpoint::new("map-tiles", Method::GET, "/api/tiles/{z}/{x}/{tile}")
        .upstream("")
        .sessionless();

pub const GEOCODING: Endpoint = Endpoint::new("geocoding", Method::GET, "/api/nominatim/search")
    .upstream("")
    .sessionless();

pub const IMAGE_PROXY: Endpoint = Endpoint::new("image-proxy", Method::GET, "/proxy-image")
    .upstream("")
    .sessionless();

pub const GOOGLE_OAUTH: Endpoint =
    Endpoint::new("google-oauth", Method::GET, "/api/auth/google-mobile").sessionless();

pub const FACEBOOK_OAUTH: Endpoint =
    Endpoint::new("facebook-oauth", Method::GET, "/api/auth/facebook").sessionless();

pub const OAUTH_CALLBACK: Endpoint =
    Endpoint::new("oauth-callback", Method::GET, "/api/auth/oauth-callback")
        .upstream("")
        .sessionless();

pub const OAUTH_SUCCESS: Endpoint =
    Endpoint::new("oauth-success", Method::GET, "/api/auth/oauth-success")
        .upstream("")
        .sessionless();

pub const HEALTH: Endpoint = Endpoint::new("health", Method::GET, "/health")
    .upstream("")
    .sessionless();

/// Every dedicated endpoint, in registration order.
pub const ENDPOINTS: &[Endpoint] = &[
    PRODUCT_COMPARISON,
    SEARCH_ARTICLE,
    WISHLIST_ADD,
    BASKET_LIST,
    INFOS_STATUS,
    WISHLIST_DELETE,
    WISHLIST_COUNTRIES,
    BASKET_QUANTITY,
    COUNTRY_SELECTED,
    AUTH_INIT,
    PROJECT_DOWNLOAD,
    FLAGS,
    PROFILE_UPDATE,
    LOGIN_WITH_CODE,
    MAGIC_LINK_LOGIN,
    DISCONNECT,
    PROFILE_INFO,
    STORE_LIST,
    MAP_TILES,
    GEOCODING,
    IMAGE_PROXY,
    GOOGLE_OAUTH,
    FACEBOOK_OAUTH,
    OAUTH_CALLBACK,
    OAUTH_SUCCESS,
    HEALTH,
];

/// Whether `path` belongs to a dedicated endpoint and must not be passed through.
pub fn is_dedicated(path: &str) -> bool {
    ENDPOINTS.iter().any(|endpoint| matches_path(endpoint.path, path))
}

/// Segment-wise match where `{param}` segments match anything non-empty.
fn matches_path(pattern: &str, path: &str) -> bool {
    let mut pattern_segments = pattern.trim_end_matches('/').split('/');
    let mut path_segments = path.trim_end_matches('/').split('/');
    loop {
        match (pattern_segments.next(), path_segments.next()) {
            (None, None) => return true,
            (Some(p), Some(s)) if p.starts_with('{') && p.ends_with('}') => {
                if s.is_empty() {
                    return false;
                }
            }
            (Some(p), Some(s)) if p == s => {}
            _ => return false,
        }
    }
}
