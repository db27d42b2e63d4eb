//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with one route per dedicated endpoint
//! - Fall back to the `/api/*` passthrough for everything else
//! - Wire up middleware (request ID, tracing, CORS, limits, timeout)
//! - Serve on a bound listener until shutdown is signalled

use std::time::Duration;

use axum::body::Body;
use axum::handler::Handler;
use axum::http::{HeaderName, Method, Request};
use axum::routing::{on, MethodFilter};
use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::{CorsConfig, GatewayConfig};
use crate::http::handlers::{
    auth, basket, catalog, geo, health, passthrough, profile, AppState,
};
use crate::http::request::{request_id_layers, RequestIdExt};
use crate::routing::{table, Endpoint};
use crate::session::SessionResolver;
use crate::upstream::{UpstreamClient, UpstreamError};

/// Slack on top of the longest upstream timeout before the whole request is cut.
const REQUEST_TIMEOUT_SLACK: Duration = Duration::from_secs(5);

/// Failure to assemble the server from configuration.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("invalid header name in configuration: {0}")]
    InvalidHeaderName(#[from] axum::http::header::InvalidHeaderName),

    #[error("endpoint {endpoint} uses unsupported method {method}")]
    UnsupportedMethod {
        endpoint: &'static str,
        method: Method,
    },
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, ServerError> {
        let upstream = UpstreamClient::from_config(&config.upstream)?;
        let resolver = SessionResolver::from_config(&config.session)?;
        let router = Self::build_router(&config, AppState::new(upstream, resolver, config.clone()))?;
        Ok(Self { router })
    }

    /// The fully layered router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Result<Router, ServerError> {
        let routes = Router::new();
        let routes = route(routes, &table::PRODUCT_COMPARISON, catalog::product_comparison)?;
        let routes = route(routes, &table::SEARCH_ARTICLE, catalog::search_article)?;
        let routes = route(routes, &table::FLAGS, catalog::flags)?;
        let routes = route(routes, &table::WISHLIST_ADD, basket::wishlist_add)?;
        let routes = route(routes, &table::BASKET_LIST, basket::basket_list)?;
        let routes = route(routes, &table::INFOS_STATUS, basket::infos_status)?;
        let routes = route(routes, &table::WISHLIST_DELETE, basket::wishlist_delete)?;
        let routes = route(routes, &table::WISHLIST_COUNTRIES, basket::wishlist_countries)?;
        let routes = route(routes, &table::BASKET_QUANTITY, basket::basket_quantity)?;
        let routes = route(routes, &table::COUNTRY_SELECTED, basket::country_selected)?;
        let routes = route(routes, &table::PROJECT_DOWNLOAD, basket::project_download)?;
        let routes = route(routes, &table::AUTH_INIT, auth::init)?;
        let routes = route(routes, &table::LOGIN_WITH_CODE, auth::login_with_code)?;
        let routes = route(routes, &table::MAGIC_LINK_LOGIN, auth::magic_link_login)?;
        let routes = route(routes, &table::DISCONNECT, auth::disconnect)?;
        let routes = route(routes, &table::GOOGLE_OAUTH, auth::google_oauth)?;
        let routes = route(routes, &table::FACEBOOK_OAUTH, auth::facebook_oauth)?;
        let routes = route(routes, &table::OAUTH_CALLBACK, auth::oauth_callback)?;
        let routes = route(routes, &table::OAUTH_SUCCESS, auth::oauth_success)?;
        let routes = route(routes, &table::PROFILE_UPDATE, profile::update_profile)?;
        let routes = route(routes, &table::PROFILE_INFO, profile::profile_info)?;
        let routes = route(routes, &table::STORE_LIST, geo::store_list)?;
        let routes = route(routes, &table::MAP_TILES, geo::tiles)?;
        let routes = route(routes, &table::GEOCODING, geo::geocoding)?;
        let routes = route(routes, &table::IMAGE_PROXY, geo::proxy_image)?;
        let routes = route(routes, &table::HEALTH, health::health)?;

        let timeout = Duration::from_secs(
            config
                .upstream
                .cart_timeout_secs
                .max(config.upstream.request_timeout_secs),
        ) + REQUEST_TIMEOUT_SLACK;

        let mut router = routes
            .fallback(passthrough::passthrough)
            .with_state(state)
            .layer(TimeoutLayer::new(timeout))
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes));
        if config.cors.enabled {
            router = router.layer(cors_layer(&config.cors)?);
        }

        let (set_request_id, propagate_request_id) = request_id_layers();
        Ok(router.layer(
            ServiceBuilder::new()
                .layer(set_request_id)
                .layer(
                    TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                        tracing::info_span!(
                            "request",
                            method = %request.method(),
                            uri = %request.uri(),
                            request_id = request.headers().request_id().unwrap_or("-"),
                        )
                    }),
                )
                .layer(propagate_request_id),
        ))
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Registers `handler` for the endpoint's method and path.
fn route<H, T>(
    router: Router<AppState>,
    endpoint: &Endpoint,
    handler: H,
) -> Result<Router<AppState>, ServerError>
where
    H: Handler<T, AppState>,
    T: 'static,
{
    let filter = MethodFilter::try_from(endpoint.method.clone()).map_err(|_| {
        ServerError::UnsupportedMethod {
            endpoint: endpoint.name,
            method: endpoint.method.clone(),
        }
    })?;
    Ok(router.route(endpoint.path, on(filter, handler)))
}

fn cors_layer(config: &CorsConfig) -> Result<CorsLayer, ServerError> {
    let headers = config
        .allowed_headers
        .iter()
        .map(|name| HeaderName::try_from(name.as_str()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_headers(headers)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ]))
}
