//! basket-bff
//!
//! Session-reconciling gateway in front of the upstream commerce API.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server (request id, trace, CORS, limits)
//!                         │
//!                         ▼
//!                     http::handlers ──▶ session::resolver (headers, cookie, body)
//!                         │
//!                         ▼
//!                     upstream::client ──────────────────────────▶ upstream API
//!                         │
//!                         ▼
//!                     reconcile (rotation, locale correction, enrichment)
//!     Client Response     │
//!     ◀───────────────────┘  JSON body + corrected GuestProfile cookie
//! ```

use clap::Parser;

use basket_bff::config::load_from_env;
use basket_bff::lifecycle::{startup, Shutdown};
use basket_bff::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "basket-bff")]
#[command(about = "Session-reconciling gateway for the basket API", long_about = None)]
struct Cli {
    /// Listen port, overriding configuration.
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_from_env()?;
    if let Some(port) = cli.port {
        config.listener.set_port(port);
    }

    init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "basket-bff starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        request_timeout_secs = config.upstream.request_timeout_secs,
        cart_timeout_secs = config.upstream.cart_timeout_secs,
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();
    startup::run(config, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
