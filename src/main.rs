//! PTZ Hold Controller - main entry point

use ptz_hold_control::{
    state::{AppConfig, AppState},
    web_api,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ptz_hold_control=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting PTZ hold controller v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::default();
    config.controller.validate()?;
    tracing::info!(
        actuator = ?config.actuator,
        step_fraction = config.controller.step_fraction,
        ramp_multiplier = config.controller.ramp_multiplier,
        apply_timeout_ms = config.controller.apply_timeout_ms,
        rotation = config.controller.rotation,
        "Configuration loaded"
    );

    let state = AppState::new(config)?;

    // A failed connect is surfaced once; movement stays disabled until
    // POST /api/ptz/connect succeeds
    if let Err(e) = state.controller.connect().await {
        tracing::error!(error = %e, "Initial actuator connection failed");
    }

    let app = web_api::create_router(state.clone())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    let controller = state.controller.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown requested");
        })
        .await?;

    // Teardown halts any active loop and releases the actuator track
    controller.disconnect().await;
    Ok(())
}
