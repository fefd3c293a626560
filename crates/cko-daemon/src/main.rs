//! cko-daemon entry point.
//!
//! Sets up tracing, loads layered config, builds the shared state, wires
//! middleware, and serves until Ctrl-C. Handlers live in `routes.rs`; shared
//! state lives in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use cko_client::HttpCheckoutApi;
use cko_config::CheckoutSettings;
use cko_daemon::{routes, state};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

/// Comma-separated layered YAML paths; later files override earlier ones.
const ENV_CONFIG_PATHS: &str = "CKO_CONFIG";
const ENV_DAEMON_ADDR: &str = "CKO_DAEMON_ADDR";
const DEFAULT_CACHE_PATH: &str = "cko-order-cache.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience). Silent if missing.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let settings = load_settings()?;
    let api = HttpCheckoutApi::new(&settings.backend.base_url)
        .with_context(|| format!("backend.base_url '{}'", settings.backend.base_url))?;
    let cache = cko_cache::open_from_env(DEFAULT_CACHE_PATH).context("order cache open failed")?;
    info!(
        backend = %settings.backend.base_url,
        cache = %cache.path().display(),
        "checkout backend configured"
    );

    let health_every = Duration::from_millis(settings.health.poll_interval_ms);
    let shared = Arc::new(state::AppState::new(
        settings,
        Arc::new(api),
        Box::new(cache),
    ));

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));
    state::spawn_backend_health(Arc::clone(&shared), health_every);

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8898)));
    info!("cko-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    shared.shutdown_sessions().await;
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn load_settings() -> anyhow::Result<CheckoutSettings> {
    let settings = match std::env::var(ENV_CONFIG_PATHS) {
        Ok(raw) if !raw.trim().is_empty() => {
            let paths: Vec<&str> = raw.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
            let loaded = cko_config::load_layered_yaml(&paths)?;
            info!(config_hash = %loaded.config_hash, paths = ?paths, "config loaded");
            let unused = loaded.unused_keys();
            if !unused.is_empty() {
                warn!(keys = ?unused, "config keys not read by any setting");
            }
            loaded.settings()?
        }
        _ => CheckoutSettings::default(),
    };
    let settings = settings.with_env_overrides();
    settings.validate()?;
    Ok(settings)
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var(ENV_DAEMON_ADDR).ok()?.parse().ok()
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown requested");
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
